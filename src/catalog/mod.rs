//! Federation + data-source + RDF-MT registry.
//!
//! Indexes `predicate -> molecules` and `molecule-id -> molecule`
//! (spec.md §2 "Catalog", §3 "Molecule (RDF-MT)", §3 "Catalog invariants").
//!
//! The catalog is built once per federation configuration and is
//! immutable (read-only) afterwards — borrowed concurrently by every
//! planner and translator in a query's task tree (spec.md §5 "Shared-resource
//! policy"). We use `Arc` + `DashMap`-free plain maps internally since no
//! mutation happens after [`Catalog::build`] returns; concurrent readers
//! just share the `Arc<Catalog>`.

pub mod error;

use crate::mapping::{MappingArena, TripleMapId};
use error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub type DataSourceId = String;
pub type MtId = String;
pub type PredicateId = String;

const XSD_DATATYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#string",
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#decimal",
    "http://www.w3.org/2001/XMLSchema#double",
    "http://www.w3.org/2001/XMLSchema#float",
    "http://www.w3.org/2001/XMLSchema#boolean",
    "http://www.w3.org/2001/XMLSchema#dateTime",
    "http://www.w3.org/2001/XMLSchema#date",
    "http://www.w3.org/2001/XMLSchema#anyURI",
];

fn is_xsd_datatype(iri: &str) -> bool {
    XSD_DATATYPES.contains(&iri) || iri.starts_with("http://www.w3.org/2001/XMLSchema#")
}

/// A backend's storage kind. Only `SparqlEndpoint`, the SQL family, and
/// `MongoLdFlat` have translators/wrappers; the rest round-trip through the
/// catalog for plan-construction symmetry (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    SparqlEndpoint,
    Mysql,
    Postgres,
    SqlServer,
    MongoGeneric,
    MongoLdFlat,
    Neo4j,
    TabularFile,
    JsonFile,
    XmlFile,
    DistributedFile,
    Rest,
}

impl DataSourceKind {
    pub fn is_sql(self) -> bool {
        matches!(
            self,
            DataSourceKind::Mysql | DataSourceKind::Postgres | DataSourceKind::SqlServer
        )
    }

    pub fn is_supported(self) -> bool {
        matches!(
            self,
            DataSourceKind::SparqlEndpoint | DataSourceKind::MongoLdFlat
        ) || self.is_sql()
    }
}

/// `{id, url, kind, params, mappings, typing_predicate, labeling_property}`
/// (spec.md §3 "DataSource").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub url: String,
    pub kind: DataSourceKind,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    /// Triple-map ids (into the catalog's shared [`MappingArena`]) that this
    /// source's RML mappings contributed.
    #[serde(default)]
    pub mapping_ids: Vec<TripleMapId>,
    #[serde(default)]
    pub typing_predicate: Option<String>,
    #[serde(default)]
    pub labeling_property: Option<String>,
}

/// Either a concrete XSD datatype URI or an existing `mt_id` (spec.md §3
/// "Range references name either a concrete XSD datatype URI or an
/// existing `mt_id`").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeRef {
    Datatype(String),
    Mt(MtId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    pub pred_id: PredicateId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub cardinality: u64,
    #[serde(default)]
    pub ranges: HashSet<RangeRef>,
}

/// A reference to the RML source(s) backing a predicate for a given
/// molecule, `predicate_rml_sources: map<PredicateId, set<RmlSourceRef>>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RmlSourceRef {
    pub datasource: DataSourceId,
    pub triple_map: TripleMapId,
}

/// RDF-MT: an abstract class description (spec.md §3 "Molecule (RDF-MT)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Molecule {
    pub mt_id: MtId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub cardinality: u64,
    #[serde(default)]
    pub subclass_of: Vec<MtId>,
    pub predicates: HashMap<PredicateId, Predicate>,
    pub datasources: HashSet<DataSourceId>,
    #[serde(default)]
    pub predicate_sources: HashMap<DataSourceId, HashSet<PredicateId>>,
    #[serde(default)]
    pub predicate_rml_sources: HashMap<PredicateId, HashSet<RmlSourceRef>>,
    #[serde(default)]
    pub instance_prefixes: Vec<String>,
    /// `map<DataSourceId, map<TripleMapId, set<RdfType>>>`
    #[serde(default)]
    pub mapping_ids: HashMap<DataSourceId, HashMap<TripleMapId, HashSet<String>>>,
}

impl Molecule {
    /// Merging two molecules with equal `mt_id`: union of predicates, data
    /// sources, mapping ids, instance prefixes; numeric cardinalities
    /// additive; `subclass_of` unioned (spec.md §3 "Catalog invariants").
    pub fn merge(mut self, other: Molecule) -> Self {
        debug_assert_eq!(self.mt_id, other.mt_id);
        self.cardinality += other.cardinality;
        for (k, v) in other.predicates {
            self.predicates
                .entry(k)
                .and_modify(|p| {
                    p.ranges.extend(v.ranges.clone());
                    p.cardinality += v.cardinality;
                })
                .or_insert(v);
        }
        self.datasources.extend(other.datasources);
        for (ds, preds) in other.predicate_sources {
            self.predicate_sources.entry(ds).or_default().extend(preds);
        }
        for (pred, srcs) in other.predicate_rml_sources {
            self.predicate_rml_sources
                .entry(pred)
                .or_default()
                .extend(srcs);
        }
        for prefix in other.instance_prefixes {
            if !self.instance_prefixes.contains(&prefix) {
                self.instance_prefixes.push(prefix);
            }
        }
        for (ds, maps) in other.mapping_ids {
            let entry = self.mapping_ids.entry(ds).or_default();
            for (tm, types) in maps {
                entry.entry(tm).or_default().extend(types);
            }
        }
        for sc in other.subclass_of {
            if !self.subclass_of.contains(&sc) {
                self.subclass_of.push(sc);
            }
        }
        self
    }
}

/// Federation config JSON deserialization root (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Federation {
    #[serde(rename = "fedId")]
    pub fed_id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub sources: HashMap<DataSourceId, DataSource>,
    pub rdfmts: Vec<Molecule>,
    /// The RML triple-maps referenced by `Molecule::mapping_ids` /
    /// `DataSource::mapping_ids`, ingested ahead of time by the (out-of-scope)
    /// RML-document parser and serialized alongside the federation config
    /// (spec.md §1 "Out of scope... the RML-document parser used to ingest
    /// mapping files at catalog-build time").
    #[serde(default)]
    pub mappings: MappingArena,
}

impl Federation {
    /// Restricts Mongo data sources to a single named collection, leaving
    /// every other backend kind untouched. `collection` is an explicit
    /// per-request scope hint threaded in from the HTTP layer rather than
    /// read off implicit process-global state (spec.md §9 "Global process
    /// state (prefix/collection scope)" redesign note).
    pub fn scoped_to_collection(&self, collection: &str) -> Federation {
        let sources: HashMap<DataSourceId, DataSource> = self
            .sources
            .iter()
            .filter(|(id, ds)| {
                !matches!(ds.kind, DataSourceKind::MongoLdFlat | DataSourceKind::MongoGeneric)
                    || id.as_str() == collection
            })
            .map(|(id, ds)| (id.clone(), ds.clone()))
            .collect();

        let rdfmts = self
            .rdfmts
            .iter()
            .cloned()
            .map(|mut m| {
                m.datasources.retain(|id| sources.contains_key(id));
                m.predicate_sources.retain(|id, _| sources.contains_key(id));
                m
            })
            .collect();

        Federation {
            fed_id: self.fed_id.clone(),
            name: self.name.clone(),
            desc: self.desc.clone(),
            sources,
            rdfmts,
            mappings: self.mappings.clone(),
        }
    }
}

/// The built, indexed, query-ready catalog (spec.md §2 "Catalog").
#[derive(Debug, Clone)]
pub struct Catalog {
    pub fed_id: String,
    pub name: String,
    sources: HashMap<DataSourceId, DataSource>,
    molecules: HashMap<MtId, Molecule>,
    predicate_index: HashMap<PredicateId, HashSet<MtId>>,
    pub mappings: MappingArena,
}

impl Catalog {
    pub fn build(federation: Federation) -> ConfigResult<Self> {
        let mut molecules: HashMap<MtId, Molecule> = HashMap::new();
        for m in federation.rdfmts {
            molecules
                .entry(m.mt_id.clone())
                .and_modify(|existing| {
                    let taken = std::mem::replace(
                        existing,
                        Molecule {
                            mt_id: m.mt_id.clone(),
                            label: String::new(),
                            cardinality: 0,
                            subclass_of: vec![],
                            predicates: HashMap::new(),
                            datasources: HashSet::new(),
                            predicate_sources: HashMap::new(),
                            predicate_rml_sources: HashMap::new(),
                            instance_prefixes: vec![],
                            mapping_ids: HashMap::new(),
                        },
                    );
                    *existing = taken.merge(m.clone());
                })
                .or_insert(m);
        }

        let catalog = Catalog {
            fed_id: federation.fed_id,
            name: federation.name,
            sources: federation.sources,
            molecules,
            predicate_index: HashMap::new(),
            mappings: federation.mappings,
        };
        catalog.validate_and_index()
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let federation: Federation = serde_json::from_str(json)?;
        Catalog::build(federation)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Catalog::from_json_str(&data)
    }

    fn validate_and_index(mut self) -> ConfigResult<Self> {
        for m in self.molecules.values() {
            for ds in &m.datasources {
                if !self.sources.contains_key(ds) {
                    return Err(ConfigError::UnknownDataSource(ds.clone()));
                }
            }
            for (ds, preds) in &m.predicate_sources {
                for p in preds {
                    if !m.predicates.contains_key(p) {
                        return Err(ConfigError::PredicateSourceNotInPredicates {
                            molecule: m.mt_id.clone(),
                            source: ds.clone(),
                            predicate: p.clone(),
                        });
                    }
                }
            }
            for p in m.predicates.values() {
                for r in &p.ranges {
                    match r {
                        RangeRef::Datatype(dt) if is_xsd_datatype(dt) => {}
                        RangeRef::Mt(mt) if self.molecules.contains_key(mt) => {}
                        RangeRef::Datatype(dt) => {
                            return Err(ConfigError::DanglingRange {
                                molecule: m.mt_id.clone(),
                                predicate: p.pred_id.clone(),
                                range: dt.clone(),
                            })
                        }
                        RangeRef::Mt(mt) => {
                            return Err(ConfigError::DanglingRange {
                                molecule: m.mt_id.clone(),
                                predicate: p.pred_id.clone(),
                                range: mt.clone(),
                            })
                        }
                    }
                }
            }
        }
        self.rebuild_predicate_index();
        Ok(self)
    }

    /// Predicate-to-molecule index is derivable from the molecules; it
    /// must be consistent after any mutation (spec.md §3 "Catalog
    /// invariants"). Called once at build time; the catalog is read-only
    /// afterwards so no further rebuilds are needed.
    fn rebuild_predicate_index(&mut self) {
        self.predicate_index.clear();
        for (mt_id, m) in &self.molecules {
            for pred in m.predicates.keys() {
                self.predicate_index
                    .entry(pred.clone())
                    .or_default()
                    .insert(mt_id.clone());
            }
        }
    }

    pub fn molecule(&self, mt_id: &str) -> Option<&Molecule> {
        self.molecules.get(mt_id)
    }

    pub fn molecules(&self) -> impl Iterator<Item = &Molecule> {
        self.molecules.values()
    }

    pub fn data_source(&self, id: &str) -> Option<&DataSource> {
        self.sources.get(id)
    }

    /// Molecules carrying the given predicate, per `predicate_index`.
    pub fn molecules_for_predicate(&self, predicate: &str) -> HashSet<MtId> {
        self.predicate_index
            .get(predicate)
            .cloned()
            .unwrap_or_default()
    }

    /// All molecules transitively reachable via `rdf:type` -> superclass
    /// lookup (the one property-path form this system supports, spec.md §1
    /// Non-goals).
    pub fn superclasses_of(&self, mt_id: &str) -> HashSet<MtId> {
        let mut out = HashSet::new();
        let mut stack = vec![mt_id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(m) = self.molecules.get(&current) {
                for sc in &m.subclass_of {
                    if out.insert(sc.clone()) {
                        stack.push(sc.clone());
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_federation() -> Federation {
        let mut sources = HashMap::new();
        sources.insert(
            "E1".to_string(),
            DataSource {
                id: "E1".into(),
                url: "http://example.org/sparql".into(),
                kind: DataSourceKind::SparqlEndpoint,
                params: HashMap::new(),
                mapping_ids: vec![],
                typing_predicate: None,
                labeling_property: None,
            },
        );

        let mut predicates = HashMap::new();
        predicates.insert(
            "http://example.org/name".to_string(),
            Predicate {
                pred_id: "http://example.org/name".into(),
                label: "name".into(),
                cardinality: 10,
                ranges: HashSet::from([RangeRef::Datatype(
                    "http://www.w3.org/2001/XMLSchema#string".into(),
                )]),
            },
        );
        let mut predicate_sources = HashMap::new();
        predicate_sources.insert(
            "E1".to_string(),
            HashSet::from(["http://example.org/name".to_string()]),
        );

        let molecule = Molecule {
            mt_id: "http://example.org/Country".into(),
            label: "Country".into(),
            cardinality: 10,
            subclass_of: vec![],
            predicates,
            datasources: HashSet::from(["E1".to_string()]),
            predicate_sources,
            predicate_rml_sources: HashMap::new(),
            instance_prefixes: vec![],
            mapping_ids: HashMap::new(),
        };

        Federation {
            fed_id: "fed1".into(),
            name: "Test Federation".into(),
            desc: String::new(),
            sources,
            rdfmts: vec![molecule],
            mappings: MappingArena::new(),
        }
    }

    #[test]
    fn build_indexes_predicates() {
        let catalog = Catalog::build(sample_federation()).unwrap();
        let mts = catalog.molecules_for_predicate("http://example.org/name");
        assert_eq!(mts.len(), 1);
        assert!(mts.contains("http://example.org/Country"));
    }

    #[test]
    fn dangling_range_is_rejected() {
        let mut fed = sample_federation();
        fed.rdfmts[0]
            .predicates
            .get_mut("http://example.org/name")
            .unwrap()
            .ranges
            .insert(RangeRef::Mt("http://example.org/NoSuchClass".into()));
        let err = Catalog::build(fed).unwrap_err();
        assert!(matches!(err, ConfigError::DanglingRange { .. }));
    }

    #[test]
    fn predicate_source_not_in_predicates_is_rejected() {
        let mut fed = sample_federation();
        fed.rdfmts[0]
            .predicate_sources
            .get_mut("E1")
            .unwrap()
            .insert("http://example.org/unknownPred".to_string());
        let err = Catalog::build(fed).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PredicateSourceNotInPredicates { .. }
        ));
    }

    #[test]
    fn merge_unions_predicates_and_adds_cardinality() {
        let mut fed = sample_federation();
        let dup = fed.rdfmts[0].clone();
        fed.rdfmts.push(dup);
        let catalog = Catalog::build(fed).unwrap();
        let m = catalog.molecule("http://example.org/Country").unwrap();
        assert_eq!(m.cardinality, 20);
    }

    #[test]
    fn unknown_data_source_rejected() {
        let mut fed = sample_federation();
        fed.rdfmts[0].datasources.insert("GHOST".to_string());
        let err = Catalog::build(fed).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDataSource(_)));
    }

    #[test]
    fn scoping_to_a_collection_leaves_non_mongo_sources_untouched() {
        let fed = sample_federation();
        let scoped = fed.scoped_to_collection("some-other-collection");
        assert!(scoped.sources.contains_key("E1"));
        assert_eq!(scoped.rdfmts.len(), fed.rdfmts.len());
    }
}
