//! RML mapping model: triple maps, subject/predicate-object maps, and
//! reference-object joins (spec.md §3 "Mapping").
//!
//! Reference-object maps point to a parent triple-map by id. Rather than an
//! owning/cyclic reference (the shape the original Python `pyrml` model
//! uses — see `examples/original_source/awudima/pyrml/model.py`), triple
//! maps live in a flat arena keyed by a stable [`TripleMapId`]
//! (spec.md §9 "Catalog parent-child references").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripleMapId(pub u32);

/// A triple-map's logical source: a table name, an arbitrary `rml:query`
/// sub-select, or a file with an iterator expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalSource {
    Table(String),
    Query(String),
    File { path: String, iterator: String },
}

impl LogicalSource {
    /// A deterministic name usable as a SQL `FROM` alias / sub-select name,
    /// grounded on spec.md §4.3.2's "a deterministic hash of the source
    /// filename" rule for file-backed logical sources.
    pub fn alias(&self) -> String {
        match self {
            LogicalSource::Table(name) => name.clone(),
            LogicalSource::Query(q) => format!("q_{:08x}", fnv1a(q)),
            LogicalSource::File { path, .. } => format!("f_{:08x}", fnv1a(path)),
        }
    }
}

fn fnv1a(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in s.bytes() {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// A term map built from a template (with `{column}` captures), a constant
/// value, or a direct column reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermMap {
    Template(String),
    Constant(String),
    Reference(String),
}

impl TermMap {
    /// Splits a template like `http://ex.org/city/{id}` into alternating
    /// literal segments and column captures, used by both the subject-map
    /// projection builder and its reverse-match for constant subjects.
    pub fn template_segments(template: &str) -> Vec<TemplateSegment> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' {
                if !literal.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                }
                let mut col = String::new();
                for c2 in chars.by_ref() {
                    if c2 == '}' {
                        break;
                    }
                    col.push(c2);
                }
                segments.push(TemplateSegment::Column(col));
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }
        segments
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectMap {
    pub term: TermMap,
    #[serde(default)]
    pub rdf_types: Vec<String>,
}

/// An object map is either a term map, or a reference-object map joining to
/// another triple-map by column equalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectMap {
    Term(TermMap),
    ReferenceObject {
        parent: TripleMapId,
        /// `(child_column, parent_column)` equality pairs.
        join: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateObjectMap {
    pub predicate: String,
    pub object: ObjectMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleMap {
    pub id: TripleMapId,
    pub logical_source: LogicalSource,
    pub subject_map: SubjectMap,
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TripleMap {
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.predicate_object_maps.iter().map(|m| m.predicate.as_str())
    }

    pub fn object_map_for(&self, predicate: &str) -> Option<&ObjectMap> {
        self.predicate_object_maps
            .iter()
            .find(|m| m.predicate == predicate)
            .map(|m| &m.object)
    }
}

/// Flat arena of triple-maps keyed by [`TripleMapId`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingArena {
    maps: Vec<TripleMap>,
}

impl MappingArena {
    pub fn new() -> Self {
        MappingArena::default()
    }

    pub fn insert(&mut self, mut map: TripleMap) -> TripleMapId {
        let id = TripleMapId(self.maps.len() as u32);
        map.id = id;
        self.maps.push(map);
        id
    }

    pub fn get(&self, id: TripleMapId) -> Option<&TripleMap> {
        self.maps.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TripleMap> {
        self.maps.iter()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
