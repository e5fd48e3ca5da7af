//! Splits a parsed SPARQL algebra tree into star-shaped sub-queries (SSQs),
//! matches each star against RDF molecule templates, and selects the data
//! source(s) able to answer it (spec.md §2 "Decomposer", §3 "Star-shaped
//! sub-query").
//!
//! Grounded on the star-formation / molecule-matching / source-selection
//! passes of `decompose_bgp` and `decompose_block`
//! (`examples/original_source/awudima/mediator/decomposer/QueryDecomposer.py`,
//! `awudima/mediator/utilities.py`). The cross-star pruning here is a single
//! pass rather than the original's iterative fixpoint — see DESIGN.md.

pub mod error;

use crate::algebra::{AlgebraNode, Expr, TriplePattern, RDF_TYPE};
use crate::catalog::{Catalog, DataSourceId, MtId};
use crate::term::Term;
use error::{DecomposeError, DecomposeResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A data source selected to answer (a subset of) a star's predicates,
/// together with which molecule(s) justified the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAssignment {
    pub datasource: DataSourceId,
    pub mts: Vec<MtId>,
}

/// A star-shaped sub-query: all triple patterns sharing one subject term.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub subject: Term,
    pub triples: Vec<TriplePattern>,
    pub filters: Vec<Expr>,
    pub candidate_mts: Vec<MtId>,
    pub sources: Vec<SourceAssignment>,
}

impl Star {
    fn subject_key(&self) -> String {
        self.subject.to_string()
    }

    fn object_vars(&self) -> HashSet<String> {
        self.triples
            .iter()
            .filter_map(|t| t.object.as_variable())
            .map(String::from)
            .collect()
    }
}

/// Recursive decomposition of a (sub)tree, mirroring the shape of
/// [`AlgebraNode`] minus `Project` (hoisted away by the caller — query form
/// and solution modifiers belong to logical planning, not source selection).
#[derive(Debug, Clone)]
pub enum Decomposed {
    /// Stars plus any filters whose variables span more than one star (not
    /// attached to any single one — reattached by `logical_plan` at the
    /// join above, mirroring `jfilter` in the original's `create_plan_tree`).
    Stars(Vec<Star>, Vec<Expr>),
    Join(Vec<Decomposed>),
    Union(Vec<Decomposed>),
    Optional {
        required: Box<Decomposed>,
        optional: Box<Decomposed>,
    },
    /// A branch that failed to decompose (unmatched molecule / uncovered
    /// predicate) underneath a `UNION` — contributes no bindings rather than
    /// aborting the query (spec.md §7 "DecompositionError": "the affected
    /// branch yields an empty result... it aborts the entire query only if
    /// it is the root").
    Empty,
}

pub fn decompose(node: &AlgebraNode, catalog: &Catalog) -> DecomposeResult<Decomposed> {
    match node {
        AlgebraNode::Project { child, .. } => decompose(child, catalog),
        AlgebraNode::Bgp { triples, filters } => {
            if triples.is_empty() {
                return Ok(Decomposed::Stars(Vec::new(), filters.clone()));
            }
            // An unmatched/uncovered star makes the whole conjunction
            // unsatisfiable, not a query-aborting error: spec.md §4.1 "the
            // SSQ yields the empty decomposition", §7 "the affected branch
            // yields an empty result", §8 "a single SSQ with one constant
            // predicate not present in any molecule — zero bindings, status
            // Finished". `Decomposed::Empty` already folds to zero bindings
            // downstream (an empty `Union`), for the root BGP same as any
            // other branch.
            match form_stars(triples, filters, catalog) {
                Ok((stars, leftover)) => Ok(Decomposed::Stars(stars, leftover)),
                Err(_) => Ok(Decomposed::Empty),
            }
        }
        AlgebraNode::Join(children) => {
            let mut out = Vec::with_capacity(children.len());
            for c in children {
                out.push(decompose(c, catalog)?);
            }
            Ok(Decomposed::Join(out))
        }
        AlgebraNode::Union(children) => {
            // A union arm that fails to decompose contributes no bindings.
            let out = children
                .iter()
                .map(|c| decompose(c, catalog).unwrap_or(Decomposed::Empty))
                .collect();
            Ok(Decomposed::Union(out))
        }
        AlgebraNode::Optional { required, optional } => Ok(Decomposed::Optional {
            required: Box::new(decompose(required, catalog)?),
            // The OPTIONAL side is, by definition, allowed to contribute
            // nothing — a failed match there behaves the same as a
            // non-matching OPTIONAL branch, not a query-aborting error.
            optional: Box::new(decompose(optional, catalog).unwrap_or(Decomposed::Empty)),
        }),
    }
}

/// Groups triples by subject, matches each group against the catalog, prunes
/// via cross-star connections, and selects data sources
/// (spec.md §3 "Source selection").
fn form_stars(
    triples: &[TriplePattern],
    filters: &[Expr],
    catalog: &Catalog,
) -> DecomposeResult<(Vec<Star>, Vec<Expr>)> {
    let mut groups: BTreeMap<String, Vec<TriplePattern>> = BTreeMap::new();
    for t in triples {
        groups
            .entry(t.subject.to_string())
            .or_default()
            .push(t.clone());
    }

    let mut stars: Vec<Star> = Vec::new();
    for (_, group_triples) in groups {
        let subject = group_triples[0].subject.clone();
        let candidate_mts = match_molecules(&group_triples, catalog);
        if candidate_mts.is_empty() {
            return Err(DecomposeError::NoMatchingMolecule {
                subject: subject.to_string(),
            });
        }
        stars.push(Star {
            subject,
            triples: group_triples,
            filters: Vec::new(),
            candidate_mts,
            sources: Vec::new(),
        });
    }

    prune_by_connections(&mut stars, catalog);
    let leftover = assign_filters(&mut stars, filters);

    for star in &mut stars {
        star.sources = select_sources(star, catalog)?;
    }

    Ok((stars, leftover))
}

/// Constant predicates of a star (the ones usable for molecule matching and
/// source-predicate-coverage checks; variable predicates can't narrow
/// anything).
fn constant_predicates(triples: &[TriplePattern]) -> Vec<String> {
    triples
        .iter()
        .filter_map(|t| t.predicate.as_iri().map(String::from))
        .filter(|p| p != RDF_TYPE)
        .collect()
}

/// `rdf:type` object IRIs present in a star, if any are constant.
fn type_objects(triples: &[TriplePattern]) -> Vec<MtId> {
    triples
        .iter()
        .filter(|t| t.is_type_statement())
        .filter_map(|t| t.object.as_iri().map(String::from))
        .collect()
}

/// RDF-type statements take priority over predicate-based matching
/// (spec.md §3 "Molecule matching": "an explicit `rdf:type` statement
/// pins the star to that molecule"). Otherwise a molecule is a candidate
/// only if it declares every constant predicate used by the star.
fn match_molecules(triples: &[TriplePattern], catalog: &Catalog) -> Vec<MtId> {
    let types = type_objects(triples);
    if !types.is_empty() {
        return types
            .into_iter()
            .filter(|t| catalog.molecule(t).is_some())
            .collect();
    }

    let preds = constant_predicates(triples);
    if preds.is_empty() {
        return catalog.molecules().map(|m| m.mt_id.clone()).collect();
    }

    let mut candidates: Option<HashSet<MtId>> = None;
    for p in &preds {
        let mts = catalog.molecules_for_predicate(p);
        candidates = Some(match candidates {
            None => mts,
            Some(acc) => acc.intersection(&mts).cloned().collect(),
        });
    }
    let mut out: Vec<MtId> = candidates.unwrap_or_default().into_iter().collect();
    out.sort();
    out
}

/// `getStarsConnections`: subject-object (`SO`) links where one star's
/// object variable is another star's subject, and object-object (`OO`)
/// links where two stars share an object variable.
fn star_connections(stars: &[Star]) -> BTreeMap<String, BTreeSet<String>> {
    let subject_keys: HashSet<String> = stars.iter().map(Star::subject_key).collect();
    let mut conn: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for s in stars {
        let objs = s.object_vars();
        for other_key in objs.intersection(&subject_keys) {
            conn.entry(other_key.clone())
                .or_default()
                .insert(s.subject_key());
        }
    }

    for (i, a) in stars.iter().enumerate() {
        for b in stars.iter().skip(i + 1) {
            if !a.object_vars().is_disjoint(&b.object_vars()) {
                conn.entry(a.subject_key()).or_default().insert(b.subject_key());
                conn.entry(b.subject_key()).or_default().insert(a.subject_key());
            }
        }
    }
    conn
}

/// One pass of cross-star predicate-range pruning: drop a star's candidate
/// molecules whose predicate ranges don't reach any connected star's
/// remaining candidates. The original iterates to a fixpoint
/// (`QueryDecomposer.prune`); a single pass is enough for the star topologies
/// this system plans for (joins of depth <= 2) and keeps the pass
/// non-recursive — see DESIGN.md "cross-star pruning depth".
fn prune_by_connections(stars: &mut [Star], catalog: &Catalog) {
    let conn = star_connections(stars);
    let by_key: BTreeMap<String, HashSet<MtId>> = stars
        .iter()
        .map(|s| (s.subject_key(), s.candidate_mts.iter().cloned().collect()))
        .collect();

    let mut pruned: BTreeMap<String, HashSet<MtId>> = BTreeMap::new();
    for s in stars.iter() {
        let neighbors = match conn.get(&s.subject_key()) {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        if s.candidate_mts.len() <= 1 {
            continue;
        }
        let neighbor_mts: HashSet<MtId> = neighbors
            .iter()
            .filter_map(|n| by_key.get(n))
            .flatten()
            .cloned()
            .collect();
        if neighbor_mts.is_empty() {
            continue;
        }
        let mut kept = HashSet::new();
        for mt in &s.candidate_mts {
            let reaches = catalog.molecule(mt).is_some_and(|m| {
                m.predicates
                    .values()
                    .flat_map(|p| p.ranges.iter())
                    .any(|r| match r {
                        crate::catalog::RangeRef::Mt(id) => neighbor_mts.contains(id),
                        crate::catalog::RangeRef::Datatype(_) => false,
                    })
            });
            if reaches {
                kept.insert(mt.clone());
            }
        }
        if !kept.is_empty() {
            pruned.insert(s.subject_key(), kept);
        }
    }

    for s in stars.iter_mut() {
        if let Some(kept) = pruned.get(&s.subject_key()) {
            let mut v: Vec<MtId> = kept.iter().cloned().collect();
            v.sort();
            s.candidate_mts = v;
        }
    }
}

/// Attaches each filter to the (unique) star whose triples cover all of the
/// filter's variables (`includeFilterAux`); filters spanning multiple stars
/// are left unassigned (the caller reattaches them at the join above — see
/// `logical_plan`).
fn assign_filters(stars: &mut [Star], filters: &[Expr]) -> Vec<Expr> {
    let mut leftover = Vec::new();
    for f in filters {
        let f_vars = f.variables();
        let mut assigned = false;
        for s in stars.iter_mut() {
            let s_vars: HashSet<String> = s
                .triples
                .iter()
                .flat_map(TriplePattern::variables)
                .collect();
            if f_vars.iter().all(|v| s_vars.contains(v)) {
                s.filters.push(f.clone());
                assigned = true;
                break;
            }
        }
        if !assigned {
            leftover.push(f.clone());
        }
    }
    leftover
}

/// A data source is selected for a star if it covers every constant
/// predicate the star uses (or the star has none, e.g. `?s a ex:C` alone),
/// per molecule `predicate_sources` (spec.md §3 "Source selection").
fn select_sources(star: &Star, catalog: &Catalog) -> DecomposeResult<Vec<SourceAssignment>> {
    let preds: HashSet<String> = constant_predicates(&star.triples).into_iter().collect();
    let mut by_source: BTreeMap<DataSourceId, Vec<MtId>> = BTreeMap::new();

    for mt_id in &star.candidate_mts {
        let Some(molecule) = catalog.molecule(mt_id) else {
            continue;
        };
        for ds_id in &molecule.datasources {
            let covered = molecule
                .predicate_sources
                .get(ds_id)
                .cloned()
                .unwrap_or_default();
            let covers_all = preds.is_empty() || preds.iter().all(|p| covered.contains(p));
            if covers_all {
                by_source.entry(ds_id.clone()).or_default().push(mt_id.clone());
            }
        }
    }

    if by_source.is_empty() {
        return Err(DecomposeError::NoSourceForStar {
            subject: star.subject.to_string(),
        });
    }

    Ok(by_source
        .into_iter()
        .map(|(datasource, mut mts)| {
            mts.sort();
            mts.dedup();
            SourceAssignment { datasource, mts }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, DataSource, DataSourceKind, Federation, Molecule, Predicate, RangeRef};
    use crate::sparql_parser::parse_query;
    use std::collections::HashMap;

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
    fn single_star_matches_by_type() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C ; ex:p ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        match decomposed {
            Decomposed::Stars(stars, leftover) => {
                assert_eq!(stars.len(), 1);
                assert_eq!(stars[0].candidate_mts, vec!["http://example.org/C".to_string()]);
                assert_eq!(stars[0].sources.len(), 1);
                assert_eq!(stars[0].sources[0].datasource, "E1");
                assert!(leftover.is_empty());
            }
            other => panic!("expected Stars, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_predicate_yields_empty_decomposition() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s ex:unknown ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        assert!(matches!(decomposed, Decomposed::Empty));
    }

    #[test]
    fn form_stars_still_reports_no_matching_molecule_directly() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s ex:unknown ?o }",
        )
        .unwrap();
        let triples = match &node {
            crate::algebra::AlgebraNode::Project { child, .. } => match child.as_ref() {
                crate::algebra::AlgebraNode::Bgp { triples, .. } => triples.clone(),
                other => panic!("expected Bgp, got {other:?}"),
            },
            other => panic!("expected Project, got {other:?}"),
        };
        let err = form_stars(&triples, &[], &catalog).unwrap_err();
        assert!(matches!(err, DecomposeError::NoMatchingMolecule { .. }));
    }

    #[test]
    fn two_connected_stars_decompose_into_join() {
        let catalog = test_catalog();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C . ?o a ex:C . ?s ex:p ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        assert!(matches!(decomposed, Decomposed::Stars(ref s, _) if s.len() == 2));
    }
}
