//! Translates a star-shaped sub-query into a MongoDB aggregation pipeline
//! against the "JSON-LD flattened" RML profile (spec.md §4.3.3).
//!
//! Each document has shape `{ @context: {...}, @graph: [ { @id, @type,
//! <compact-prop>: value, ... } ] }`. Grounded on the pipeline assembly and
//! filter-compilation rules of `Star2MongoLDF.translate_to_mongo_ld_flat`
//! (`examples/original_source/awudima/mongoql/ld_flat/Star2MongoLDF.py`);
//! this translator works in terms of local (suffix) property/type names
//! rather than resolving the document's own `@context` prefix table — see
//! DESIGN.md "JSON-LD-flat property naming".

use super::error::TranslationResult;
use super::{ResultTemplate, ValueSource, VariablePlan};
use crate::algebra::{BinaryOp, Expr, UnaryOp};
use crate::algebra::RDF_TYPE;
use crate::catalog::Catalog;
use crate::decomposer::Star;
use crate::mapping::TripleMap;
use crate::term::{BindingType, Term};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

fn local_name(iri: &str) -> &str {
    let tail = iri.rsplit(['#', '/']).next().unwrap_or(iri);
    if tail.is_empty() {
        iri
    } else {
        tail
    }
}

fn var_alias(var: &str) -> String {
    var.trim_start_matches('?').to_string()
}

/// Compiled plan for one data source: the collection to aggregate against
/// and its pipeline stages. `None` means no collection's RML mapping covers
/// every predicate of every star — per spec.md §4.3.3 this contributes no
/// bindings rather than erroring.
pub struct MongoPlan {
    pub collection: String,
    pub pipeline: Vec<Value>,
    pub template: ResultTemplate,
}

pub fn translate(stars: &[Star], catalog: &Catalog, datasource_id: &str) -> TranslationResult<Option<MongoPlan>> {
    // This system merges same-source stars at the logical-planning layer
    // before reaching a translator, so in practice exactly one star is
    // passed per data source; multiple stars would require a $lookup-based
    // join, which the JSON-LD-flat profile does not attempt (spec.md §4.3.3
    // Non-goals).
    let Some(star) = stars.first() else {
        return Ok(None);
    };

    let constant_preds = star_constant_predicates(star);
    let candidates = candidate_triple_maps(star, catalog, datasource_id);
    let full_match = candidates
        .into_iter()
        .find(|tm| covers_all(tm, &constant_preds));

    let Some(tm) = full_match else {
        return Ok(None);
    };

    let (pipeline, template) = compile_pipeline(tm, star);
    Ok(Some(MongoPlan {
        collection: tm.logical_source.alias(),
        pipeline,
        template,
    }))
}

fn star_constant_predicates(star: &Star) -> Vec<String> {
    star.triples
        .iter()
        .filter(|t| t.predicate.as_iri() != Some(RDF_TYPE))
        .filter_map(|t| t.predicate.as_iri().map(String::from))
        .collect()
}

fn candidate_triple_maps<'c>(star: &Star, catalog: &'c Catalog, datasource_id: &str) -> Vec<&'c TripleMap> {
    let mut ids = HashSet::new();
    for mt in &star.candidate_mts {
        if let Some(m) = catalog.molecule(mt) {
            if let Some(maps) = m.mapping_ids.get(datasource_id) {
                ids.extend(maps.keys().copied());
            }
        }
    }
    ids.into_iter().filter_map(|id| catalog.mappings.get(id)).collect()
}

fn covers_all(tm: &TripleMap, preds: &[String]) -> bool {
    let have: HashSet<&str> = tm.predicates().collect();
    preds.iter().all(|p| have.contains(p.as_str()))
}

fn compile_pipeline(tm: &TripleMap, star: &Star) -> (Vec<Value>, ResultTemplate) {
    let mut pipeline = vec![json!({"$unwind": "$@graph"})];
    let mut template = ResultTemplate::default();
    let mut field_for_var: HashMap<String, String> = HashMap::new();
    let mut exists_guards: Vec<String> = Vec::new();
    let mut match_doc = serde_json::Map::new();
    let mut projections = serde_json::Map::new();
    projections.insert("_id".to_string(), json!(0));

    let subject_alias = var_alias(&star.subject.to_string());
    match &star.subject {
        Term::Variable(_) => {
            field_for_var.insert(subject_alias.clone(), "@graph.@id".to_string());
            projections.insert(subject_alias.clone(), json!("$@graph.@id"));
            template.variables.insert(
                subject_alias.clone(),
                VariablePlan {
                    kind: BindingType::Uri,
                    datatype: None,
                    source: ValueSource::Field(subject_alias),
                },
            );
        }
        Term::Iri(iri) => {
            match_doc.insert("@graph.@id".to_string(), json!(iri));
        }
        _ => {}
    }

    let type_forms: Vec<String> = tm.subject_map.rdf_types.iter().map(|t| local_name(t).to_string()).collect();
    if !type_forms.is_empty() {
        match_doc.insert("@graph.@type".to_string(), json!({"$in": type_forms}));
    }

    for triple in &star.triples {
        let Some(pred) = triple.predicate.as_iri() else { continue };
        if pred == RDF_TYPE {
            continue;
        }
        if tm.object_map_for(pred).is_none() {
            continue;
        }
        let field = format!("@graph.{}", local_name(pred));
        exists_guards.push(field.clone());

        match &triple.object {
            Term::Variable(v) => {
                let alias = var_alias(v);
                field_for_var.insert(alias.clone(), field.clone());
                projections.insert(alias.clone(), json!(format!("${field}")));
                template.variables.insert(
                    alias.clone(),
                    VariablePlan {
                        kind: BindingType::Literal,
                        datatype: None,
                        source: ValueSource::Field(alias),
                    },
                );
            }
            Term::Iri(iri) => {
                match_doc.insert(field, json!(iri));
            }
            Term::Literal { lexical, .. } => {
                match_doc.insert(field, json!(lexical));
            }
            Term::BlankNode(b) => {
                match_doc.insert(field, json!(b));
            }
        }
    }

    if !exists_guards.is_empty() {
        let guard_conditions: Vec<Value> = exists_guards
            .iter()
            .flat_map(|f| {
                [
                    json!({"$ne": [format!("${f}"), Value::Null]}),
                    json!({"$ne": [format!("${f}"), ""]}),
                ]
            })
            .collect();
        match_doc.insert("$expr".to_string(), json!({"$and": guard_conditions}));
    }

    pipeline.push(json!({"$match": Value::Object(match_doc)}));

    for filter in &star.filters {
        let mut addfields = serde_json::Map::new();
        if let Some(cond) = compile_filter(filter, &field_for_var, &mut addfields) {
            if !addfields.is_empty() {
                pipeline.push(json!({"$addFields": Value::Object(addfields)}));
            }
            pipeline.push(json!({"$match": {"$expr": cond}}));
        }
    }

    pipeline.push(json!({"$project": Value::Object(projections)}));
    (pipeline, template)
}

fn is_xsd_datetime(dt: &str) -> bool {
    dt == XSD_DATE_TIME
}

fn mongo_comparator(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Eq => "$eq",
        BinaryOp::Ne => "$ne",
        BinaryOp::Lt => "$lt",
        BinaryOp::Le => "$lte",
        BinaryOp::Gt => "$gt",
        BinaryOp::Ge => "$gte",
        _ => return None,
    })
}

fn term_value(term: &Term) -> Value {
    match term {
        Term::Iri(i) => json!(i),
        Term::Literal { lexical, .. } => json!(lexical),
        Term::BlankNode(b) => json!(b),
        Term::Variable(_) => Value::Null,
    }
}

/// Compiles one comparison side: a bound variable becomes a field
/// reference (casting the field to a date via `$addFields` + `$toDate` the
/// first time an `xsd:dateTime` comparison touches it), a constant becomes
/// its literal value (or `$dateFromString` when compared against a cast
/// date field).
fn compile_operand(
    expr: &Expr,
    field_for_var: &HashMap<String, String>,
    needs_date: bool,
    addfields: &mut serde_json::Map<String, Value>,
) -> Option<Value> {
    match expr {
        Expr::Term(Term::Variable(v)) => {
            let field = field_for_var.get(v)?;
            if needs_date && !addfields.contains_key(field) {
                addfields.insert(field.clone(), json!({"$toDate": format!("${field}")}));
            }
            Some(json!(format!("${field}")))
        }
        Expr::Term(Term::Literal { lexical, datatype, .. }) => {
            if needs_date || datatype.as_deref().is_some_and(is_xsd_datetime) {
                Some(json!({"$dateFromString": {"dateString": lexical}}))
            } else {
                Some(json!(lexical))
            }
        }
        Expr::Term(term) => Some(term_value(term)),
        _ => None,
    }
}

fn compile_filter(expr: &Expr, field_for_var: &HashMap<String, String>, addfields: &mut serde_json::Map<String, Value>) -> Option<Value> {
    match expr {
        Expr::Binary { op: BinaryOp::And, left, right } => {
            let l = compile_filter(left, field_for_var, addfields)?;
            let r = compile_filter(right, field_for_var, addfields)?;
            Some(json!({"$and": [l, r]}))
        }
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            let l = compile_filter(left, field_for_var, addfields)?;
            let r = compile_filter(right, field_for_var, addfields)?;
            Some(json!({"$or": [l, r]}))
        }
        Expr::Binary { op, left, right } => {
            let comparator = mongo_comparator(*op)?;
            let needs_date = is_datetime_operand(left) || is_datetime_operand(right);
            let l = compile_operand(left, field_for_var, needs_date, addfields)?;
            let r = compile_operand(right, field_for_var, needs_date, addfields)?;
            Some(json!({comparator: [l, r]}))
        }
        Expr::Unary { op: UnaryOp::Not, arg } => {
            let c = compile_filter(arg, field_for_var, addfields)?;
            Some(json!({"$not": [c]}))
        }
        _ => None,
    }
}

fn is_datetime_operand(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Term(Term::Literal { datatype: Some(dt), .. }) if is_xsd_datetime(dt)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::TriplePattern;
    use crate::catalog::{DataSource, DataSourceKind, Federation, Molecule, Predicate, RangeRef};
    use crate::decomposer::SourceAssignment;
    use crate::mapping::{LogicalSource, MappingArena, ObjectMap, PredicateObjectMap, SubjectMap, TermMap, TripleMapId};
    use std::collections::HashMap;

    fn catalog_with_temp_collection() -> Catalog {
        let mut mappings = MappingArena::new();
        let tm_id = mappings.insert(TripleMap {
            id: TripleMapId(0),
            logical_source: LogicalSource::Table("sensors".into()),
            subject_map: SubjectMap {
                term: TermMap::Reference("@id".into()),
                rdf_types: vec!["http://ex.org/Temp".into()],
            },
            predicate_object_maps: vec![PredicateObjectMap {
                predicate: "http://ex.org/measuredAt".into(),
                object: ObjectMap::Term(TermMap::Reference("measuredAt".into())),
            }],
        });

        let mut sources = HashMap::new();
        sources.insert(
            "M1".to_string(),
            DataSource {
                id: "M1".into(),
                url: "mongodb://localhost/lake".into(),
                kind: DataSourceKind::MongoLdFlat,
                params: HashMap::new(),
                mapping_ids: vec![tm_id],
                typing_predicate: None,
                labeling_property: None,
            },
        );

        let mut predicates = HashMap::new();
        predicates.insert(
            "http://ex.org/measuredAt".to_string(),
            Predicate {
                pred_id: "http://ex.org/measuredAt".into(),
                label: String::new(),
                cardinality: 1,
                ranges: HashSet::from([RangeRef::Datatype(XSD_DATE_TIME.to_string())]),
            },
        );
        let mut predicate_sources = HashMap::new();
        predicate_sources.insert("M1".to_string(), HashSet::from(["http://ex.org/measuredAt".to_string()]));
        let mut mapping_ids = HashMap::new();
        let mut inner = HashMap::new();
        inner.insert(tm_id, HashSet::from(["http://ex.org/Temp".to_string()]));
        mapping_ids.insert("M1".to_string(), inner);

        let molecule = Molecule {
            mt_id: "http://ex.org/Temp".into(),
            label: String::new(),
            cardinality: 1,
            subclass_of: vec![],
            predicates,
            datasources: HashSet::from(["M1".to_string()]),
            predicate_sources,
            predicate_rml_sources: HashMap::new(),
            instance_prefixes: vec![],
            mapping_ids,
        };

        let catalog = Catalog::build(Federation {
            fed_id: "f".into(),
            name: "f".into(),
            desc: String::new(),
            sources,
            rdfmts: vec![molecule],
            mappings,
        })
        .unwrap();
        catalog
    }

    fn temp_star_with_range_filter() -> Star {
        Star {
            subject: Term::variable("x"),
            triples: vec![
                TriplePattern::new(Term::variable("x"), Term::iri(RDF_TYPE), Term::iri("http://ex.org/Temp")),
                TriplePattern::new(
                    Term::variable("x"),
                    Term::iri("http://ex.org/measuredAt"),
                    Term::variable("t"),
                ),
            ],
            filters: vec![Expr::and(
                Expr::Binary {
                    op: BinaryOp::Ge,
                    left: Box::new(Expr::Term(Term::variable("t"))),
                    right: Box::new(Expr::Term(Term::typed_literal(
                        "2021-06-07T17:35:19Z",
                        XSD_DATE_TIME,
                    ))),
                },
                Expr::Binary {
                    op: BinaryOp::Le,
                    left: Box::new(Expr::Term(Term::variable("t"))),
                    right: Box::new(Expr::Term(Term::typed_literal(
                        "2021-06-07T19:35:19Z",
                        XSD_DATE_TIME,
                    ))),
                },
            )],
            candidate_mts: vec!["http://ex.org/Temp".into()],
            sources: vec![SourceAssignment {
                datasource: "M1".into(),
                mts: vec!["http://ex.org/Temp".into()],
            }],
        }
    }

    #[test]
    fn produces_unwind_match_filter_project_pipeline() {
        let catalog = catalog_with_temp_collection();
        let star = temp_star_with_range_filter();
        let plan = translate(&[star], &catalog, "M1").unwrap().expect("full match");
        assert_eq!(plan.collection, "sensors");
        assert_eq!(plan.pipeline[0], json!({"$unwind": "$@graph"}));
        assert!(plan.pipeline.iter().any(|s| s.get("$addFields").is_some()));
        assert!(plan.pipeline.last().unwrap().get("$project").is_some());
        assert!(plan.template.variables.contains_key("x"));
        assert!(plan.template.variables.contains_key("t"));
    }

    #[test]
    fn no_covering_collection_is_none() {
        let catalog = catalog_with_temp_collection();
        let mut star = temp_star_with_range_filter();
        star.triples.push(TriplePattern::new(
            Term::variable("x"),
            Term::iri("http://ex.org/unmapped"),
            Term::variable("z"),
        ));
        let result = translate(&[star], &catalog, "M1").unwrap();
        assert!(result.is_none());
    }
}
