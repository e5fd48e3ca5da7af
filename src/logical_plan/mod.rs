//! Builds a bushy join tree from the decomposer's star/source-assignment
//! output (spec.md §2 "Logical planner", §4.2 "Bushy-tree assembly").
//!
//! Two passes, grounded on `push_down_join` and `create_plan_tree`
//! (`examples/original_source/awudima/mediator/utilities.py`,
//! `awudima/mediator/decomposer/QueryDecomposer.py`):
//!
//! 1. merge stars that hit the *same* data source and share a join variable
//!    into a single [`LogicalNode::Service`] (one round-trip instead of two);
//! 2. fold the remaining leaves pairwise into a binary join tree, smallest
//!    leaf label first, so the tree stays left-leaning and deterministic.

use crate::algebra::Expr;
use crate::catalog::{Catalog, DataSourceId};
use crate::decomposer::{Decomposed, Star};

/// A logical operator tree node. `physical_plan` attaches execution
/// strategy (symmetric-hash vs bind-join) on top of this shape.
#[derive(Debug, Clone)]
pub enum LogicalNode {
    /// One round-trip to `datasource` answering every star in `stars`
    /// (after same-source push-down merging, `stars.len()` may be > 1).
    Service {
        datasource: DataSourceId,
        stars: Vec<Star>,
    },
    Join(Box<LogicalNode>, Box<LogicalNode>),
    Union(Vec<LogicalNode>),
    Optional(Box<LogicalNode>, Box<LogicalNode>),
    Filter(Box<LogicalNode>, Expr),
}

impl LogicalNode {
    pub fn variables(&self) -> std::collections::HashSet<String> {
        match self {
            LogicalNode::Service { stars, .. } => stars
                .iter()
                .flat_map(|s| s.triples.iter())
                .flat_map(crate::algebra::TriplePattern::variables)
                .collect(),
            LogicalNode::Join(l, r) | LogicalNode::Optional(l, r) => {
                let mut v = l.variables();
                v.extend(r.variables());
                v
            }
            LogicalNode::Union(children) => {
                children.iter().flat_map(LogicalNode::variables).collect()
            }
            LogicalNode::Filter(child, _) => child.variables(),
        }
    }

    /// Deterministic sort key used for bushy-tree fold ordering and tests —
    /// not semantically meaningful beyond giving a stable, reproducible
    /// plan shape.
    fn sort_key(&self) -> String {
        match self {
            LogicalNode::Service { datasource, stars } => {
                let mut subs: Vec<String> = stars.iter().map(|s| s.subject.to_string()).collect();
                subs.sort();
                format!("{datasource}:{}", subs.join(","))
            }
            LogicalNode::Join(l, r) => format!("J({},{})", l.sort_key(), r.sort_key()),
            LogicalNode::Union(children) => {
                let mut keys: Vec<String> = children.iter().map(LogicalNode::sort_key).collect();
                keys.sort();
                format!("U({})", keys.join(","))
            }
            LogicalNode::Optional(l, r) => format!("O({},{})", l.sort_key(), r.sort_key()),
            LogicalNode::Filter(child, _) => format!("F({})", child.sort_key()),
        }
    }
}

pub fn build(decomposed: &Decomposed, catalog: &Catalog) -> LogicalNode {
    match decomposed {
        Decomposed::Stars(stars, leftover) => build_star_block(stars, leftover, catalog),
        Decomposed::Join(children) => {
            let built: Vec<LogicalNode> = children.iter().map(|c| build(c, catalog)).collect();
            fold_bushy(built)
        }
        Decomposed::Union(children) => {
            LogicalNode::Union(children.iter().map(|c| build(c, catalog)).collect())
        }
        Decomposed::Optional { required, optional } => LogicalNode::Optional(
            Box::new(build(required, catalog)),
            Box::new(build(optional, catalog)),
        ),
        Decomposed::Empty => LogicalNode::Union(Vec::new()),
    }
}

fn build_star_block(stars: &[Star], leftover: &[Expr], _catalog: &Catalog) -> LogicalNode {
    let mut leaves: Vec<LogicalNode> = stars
        .iter()
        .map(|star| {
            if star.sources.len() == 1 {
                LogicalNode::Service {
                    datasource: star.sources[0].datasource.clone(),
                    stars: vec![star.clone()],
                }
            } else {
                LogicalNode::Union(
                    star.sources
                        .iter()
                        .map(|src| {
                            let mut single = star.clone();
                            single.sources = vec![src.clone()];
                            LogicalNode::Service {
                                datasource: src.datasource.clone(),
                                stars: vec![single],
                            }
                        })
                        .collect(),
                )
            }
        })
        .collect();

    push_down_same_source(&mut leaves);

    let mut root = fold_bushy(leaves);
    for f in leftover {
        root = LogicalNode::Filter(Box::new(root), f.clone());
    }
    root
}

/// Merges adjacent `Service` leaves hitting the same data source whose
/// stars share a join variable, one pass, repeated until no merge applies —
/// mirrors `push_down_join`'s single-endpoint combination loop.
fn push_down_same_source(leaves: &mut Vec<LogicalNode>) {
    loop {
        let mut merged_any = false;
        let mut i = 0;
        'outer: while i < leaves.len() {
            let mut j = i + 1;
            while j < leaves.len() {
                if let (
                    LogicalNode::Service {
                        datasource: d1,
                        stars: s1,
                    },
                    LogicalNode::Service {
                        datasource: d2,
                        stars: s2,
                    },
                ) = (&leaves[i], &leaves[j])
                {
                    if d1 == d2 && shares_variable(s1, s2) {
                        let datasource = d1.clone();
                        let mut stars = s1.clone();
                        stars.extend(s2.clone());
                        let right = leaves.remove(j);
                        let _ = right;
                        leaves[i] = LogicalNode::Service { datasource, stars };
                        merged_any = true;
                        continue 'outer;
                    }
                }
                j += 1;
            }
            i += 1;
        }
        if !merged_any {
            break;
        }
    }
}

fn shares_variable(a: &[Star], b: &[Star]) -> bool {
    let a_vars: std::collections::HashSet<String> = a
        .iter()
        .flat_map(|s| s.triples.iter())
        .flat_map(crate::algebra::TriplePattern::variables)
        .collect();
    b.iter()
        .flat_map(|s| s.triples.iter())
        .flat_map(crate::algebra::TriplePattern::variables)
        .any(|v| a_vars.contains(&v))
}

/// Folds a flat leaf list into a left-leaning bushy binary tree: repeatedly
/// takes the two lexicographically-smallest remaining nodes and joins them
/// (spec.md §4.2 "lexicographic tie-break").
fn fold_bushy(mut nodes: Vec<LogicalNode>) -> LogicalNode {
    if nodes.is_empty() {
        return LogicalNode::Union(Vec::new());
    }
    nodes.sort_by_key(LogicalNode::sort_key);
    while nodes.len() > 1 {
        let right = nodes.remove(1);
        let left = nodes.remove(0);
        let joined = LogicalNode::Join(Box::new(left), Box::new(right));
        nodes.insert(0, joined);
        nodes.sort_by_key(LogicalNode::sort_key);
    }
    nodes.into_iter().next().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataSource, DataSourceKind, Federation, Molecule, Predicate, RangeRef};
    use crate::decomposer::decompose;
    use crate::sparql_parser::parse_query;
    use std::collections::{HashMap, HashSet};

    fn test_catalog() -> Catalog {
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
            "http://example.org/p".to_string(),
            Predicate {
                pred_id: "http://example.org/p".into(),
                label: String::new(),
                cardinality: 1,
                ranges: HashSet::from([RangeRef::Datatype(
                    "http://www.w3.org/2001/XMLSchema#string".into(),
                )]),
            },
        );
        let mut predicate_sources = HashMap::new();
        predicate_sources.insert(
            "E1".to_string(),
            HashSet::from(["http://example.org/p".to_string()]),
        );
        let molecule = Molecule {
            mt_id: "http://example.org/C".into(),
            label: String::new(),
            cardinality: 5,
            subclass_of: vec![],
            predicates,
            datasources: HashSet::from(["E1".to_string()]),
            predicate_sources,
            predicate_rml_sources: HashMap::new(),
            instance_prefixes: vec![],
            mapping_ids: HashMap::new(),
        };
        Catalog::build(Federation {
            fed_id: "f".into(),
            name: "f".into(),
            desc: String::new(),
            sources,
            rdfmts: vec![molecule],
            mappings: crate::mapping::MappingArena::new(),
        })
        .unwrap()
    }

    #[test]
    fn two_stars_same_source_merge_into_one_service() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C . ?o a ex:C . ?s ex:p ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        let plan = build(&decomposed, &catalog);
        assert!(matches!(plan, LogicalNode::Service { ref stars, .. } if stars.len() == 2));
    }

    #[test]
    fn single_star_is_a_bare_service() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C ; ex:p ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        let plan = build(&decomposed, &catalog);
        assert!(matches!(plan, LogicalNode::Service { .. }));
    }
}
