//! Translates a star-shaped sub-query into SQL against the RML mappings
//! backing a relational data source (spec.md §4.3.2 "SQL translator").
//!
//! Grounded on `SQLTranslator.translate`/`translate_star`
//! (`examples/original_source/awudima/sql/translator.py`) and the
//! subject/predicate-object map compilation rules of
//! `awudima/sql/rml2sql/triple_map.py`. The original resolves arbitrarily
//! deep reference-object chains via a recursive sub-select builder; this
//! translator compiles one level of reference-object indirection (inline
//! equi-join when parent and child share a logical source, else a
//! `LEFT JOIN` against a parent sub-select) — see DESIGN.md "SQL translator
//! join depth".

use super::{ResultTemplate, ValueSource, VariablePlan};
use crate::algebra::{BinaryOp, Expr, UnaryOp};
use crate::catalog::Catalog;
use crate::decomposer::Star;
use crate::mapping::{LogicalSource, ObjectMap, TemplateSegment, TermMap, TripleMap, TripleMapId};
use crate::term::{BindingType, Term};
use crate::algebra::RDF_TYPE;
use super::error::{TranslationError, TranslationResult};
use std::collections::{HashMap, HashSet};

/// Translate every star of a (possibly push-down-merged) service against a
/// single relational data source. Each star compiles independently; the
/// caller is responsible for deciding whether multiple stars should be
/// joined at the SQL level (logical_plan already merges same-source stars
/// sharing a join variable, so in practice this receives 1 star per call
/// from `physical_plan`).
pub fn translate(
    stars: &[Star],
    catalog: &Catalog,
    datasource_id: &str,
    limit: Option<u64>,
) -> TranslationResult<(String, ResultTemplate)> {
    let mut selects = Vec::new();
    let mut template = ResultTemplate::default();

    for star in stars {
        let candidates = candidate_triple_maps(star, catalog, datasource_id);
        if candidates.is_empty() {
            return Err(TranslationError::NoMappingForStar {
                subject: star.subject.to_string(),
                datasource: datasource_id.to_string(),
            });
        }

        let constant_preds = star_constant_predicates(star);
        let full_matches: Vec<&TripleMap> = candidates
            .iter()
            .copied()
            .filter(|tm| covers_all(tm, &constant_preds))
            .collect();
        // (closure receives `&&TripleMap`; auto-deref coercion lets
        // `covers_all(&TripleMap)` accept it directly.)

        let chosen = if full_matches.is_empty() {
            vec![*candidates
                .iter()
                .max_by_key(|tm| covered_count(**tm, &constant_preds))
                .expect("candidates non-empty")]
        } else {
            full_matches
        };

        // every constant predicate must be covered by at least one of the
        // union's branches, otherwise the whole star is untranslatable.
        let covered_by_union: HashSet<&str> = chosen
            .iter()
            .flat_map(|tm| tm.predicates())
            .collect();
        if constant_preds.iter().any(|p| !covered_by_union.contains(p.as_str())) {
            return Err(TranslationError::NoMappingForStar {
                subject: star.subject.to_string(),
                datasource: datasource_id.to_string(),
            });
        }

        for tm in chosen {
            let (select, frag) = compile_triple_map(tm, star, catalog)?;
            selects.push(select);
            template.merge(frag);
        }
    }

    let mut sql = if selects.len() == 1 {
        selects.into_iter().next().unwrap()
    } else {
        selects.join("\nUNION\n")
    };
    if let Some(limit) = limit {
        sql.push_str(&format!("\nLIMIT {limit}"));
    }
    Ok((sql, template))
}

fn star_constant_predicates(star: &Star) -> Vec<String> {
    star.triples
        .iter()
        .filter(|t| t.predicate.as_iri() != Some(RDF_TYPE))
        .filter_map(|t| t.predicate.as_iri().map(String::from))
        .collect()
}

fn candidate_triple_maps<'c>(star: &Star, catalog: &'c Catalog, datasource_id: &str) -> Vec<&'c TripleMap> {
    let mut ids: HashSet<TripleMapId> = HashSet::new();
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

fn covered_count(tm: &TripleMap, preds: &[String]) -> usize {
    let have: HashSet<&str> = tm.predicates().collect();
    preds.iter().filter(|p| have.contains(p.as_str())).count()
}

/// SQL-quote a literal value (single-quote escaping only — values in this
/// system come from trusted catalog/mapping sources, not end-user input, so
/// no driver-level placeholder binding is attempted here).
fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn var_alias(var: &str) -> String {
    var.trim_start_matches('?').to_string()
}

/// A term map rendered against the *current* logical source's columns,
/// either as a `SELECT` projection expression or, for a constant SPARQL
/// term, a `WHERE` equality predicate (spec.md §4.3.2 "reverse-match the
/// template").
enum Rendered {
    Projection(String),
    Condition(String),
    /// The template has more/fewer captures than the constant's literal
    /// segments allow — the query can never match (spec.md "if no template
    /// matches, the query is contradictory").
    Contradiction,
}

fn render_term_map(term_map: &TermMap, target: &Term) -> Rendered {
    match target {
        Term::Variable(_) => match term_map {
            TermMap::Template(t) => {
                let segs = TermMap::template_segments(t);
                let mut parts = Vec::new();
                for s in segs {
                    match s {
                        TemplateSegment::Literal(l) => parts.push(sql_quote(&l)),
                        TemplateSegment::Column(c) => parts.push(c),
                    }
                }
                Rendered::Projection(format!("CONCAT({})", parts.join(", ")))
            }
            TermMap::Constant(c) => Rendered::Projection(sql_quote(c)),
            TermMap::Reference(col) => Rendered::Projection(col.clone()),
        },
        _ => {
            let constant_value = match target {
                Term::Iri(i) => i.clone(),
                Term::Literal { lexical, .. } => lexical.clone(),
                Term::BlankNode(b) => b.clone(),
                Term::Variable(_) => unreachable!(),
            };
            match term_map {
                TermMap::Constant(c) => {
                    if *c == constant_value {
                        Rendered::Condition("1=1".to_string())
                    } else {
                        Rendered::Contradiction
                    }
                }
                TermMap::Reference(col) => {
                    Rendered::Condition(format!("{col} = {}", sql_quote(&constant_value)))
                }
                TermMap::Template(t) => match reverse_match_template(t, &constant_value) {
                    Some(captures) if captures.is_empty() => Rendered::Condition("1=1".to_string()),
                    Some(captures) => Rendered::Condition(
                        captures
                            .into_iter()
                            .map(|(col, val)| format!("{col} = {}", sql_quote(&val)))
                            .collect::<Vec<_>>()
                            .join(" AND "),
                    ),
                    None => Rendered::Contradiction,
                },
            }
        }
    }
}

/// Matches a constant string against a template's literal/column segments,
/// returning captured `(column, value)` pairs, or `None` if the literal
/// segments don't appear in order within the constant.
fn reverse_match_template(template: &str, constant: &str) -> Option<Vec<(String, String)>> {
    let segments = TermMap::template_segments(template);
    let mut remaining = constant;
    let mut captures = Vec::new();
    let mut pending_col: Option<String> = None;

    for seg in segments {
        match seg {
            TemplateSegment::Literal(lit) => {
                if let Some(col) = pending_col.take() {
                    let idx = remaining.find(&lit)?;
                    captures.push((col, remaining[..idx].to_string()));
                    remaining = &remaining[idx + lit.len()..];
                } else {
                    remaining = remaining.strip_prefix(lit.as_str())?;
                }
            }
            TemplateSegment::Column(col) => {
                pending_col = Some(col);
            }
        }
    }
    if let Some(col) = pending_col {
        captures.push((col, remaining.to_string()));
    } else if !remaining.is_empty() {
        return None;
    }
    Some(captures)
}

fn rdf_type_rendered(tm: &TripleMap, object: &Term) -> Rendered {
    match object {
        Term::Variable(_) => {
            let joined = tm.subject_map.rdf_types.join(",");
            Rendered::Projection(sql_quote(&joined))
        }
        Term::Iri(iri) => {
            if tm.subject_map.rdf_types.iter().any(|t| t == iri) {
                Rendered::Condition("1=1".to_string())
            } else {
                Rendered::Contradiction
            }
        }
        _ => Rendered::Contradiction,
    }
}

fn from_clause(source: &LogicalSource) -> String {
    match source {
        LogicalSource::Table(name) => name.clone(),
        LogicalSource::Query(q) => format!("({q}) AS {}", source.alias()),
        LogicalSource::File { .. } => source.alias(),
    }
}

fn compile_triple_map(tm: &TripleMap, star: &Star, catalog: &Catalog) -> TranslationResult<(String, ResultTemplate)> {
    let mut projections = Vec::new();
    let mut conditions = Vec::new();
    let mut joins = Vec::new();
    let mut template = ResultTemplate::default();
    let mut contradictory = false;
    let mut var_exprs: HashMap<String, String> = HashMap::new();

    let subject_alias = var_alias(&star.subject.to_string());
    match render_term_map(&tm.subject_map.term, &star.subject) {
        Rendered::Projection(expr) => {
            var_exprs.insert(subject_alias.clone(), expr.clone());
            projections.push(format!("{expr} AS {subject_alias}"));
            template.variables.insert(
                subject_alias.clone(),
                VariablePlan {
                    kind: BindingType::Uri,
                    datatype: None,
                    source: ValueSource::Field(subject_alias.clone()),
                },
            );
        }
        Rendered::Condition(c) => conditions.push(c),
        Rendered::Contradiction => contradictory = true,
    }

    for triple in &star.triples {
        let Some(pred) = triple.predicate.as_iri() else { continue };

        let rendered = if pred == RDF_TYPE {
            rdf_type_rendered(tm, &triple.object)
        } else {
            match tm.object_map_for(pred) {
                None => continue,
                Some(ObjectMap::Term(term_map)) => render_term_map(term_map, &triple.object),
                Some(ObjectMap::ReferenceObject { parent, join }) => {
                    render_reference_object(*parent, join, &triple.object, catalog, &tm.logical_source, &mut joins)?
                }
            }
        };

        match rendered {
            Rendered::Projection(expr) => {
                if let Some(obj_var) = triple.object.as_variable() {
                    let alias = var_alias(obj_var);
                    var_exprs.insert(alias.clone(), expr.clone());
                    projections.push(format!("{expr} AS {alias}"));
                    template.variables.insert(
                        alias.clone(),
                        VariablePlan {
                            kind: BindingType::Literal,
                            datatype: None,
                            source: ValueSource::Field(alias),
                        },
                    );
                }
            }
            Rendered::Condition(c) => conditions.push(c),
            Rendered::Contradiction => contradictory = true,
        }
    }

    if projections.is_empty() {
        projections.push("1 AS present".to_string());
    }
    if contradictory {
        conditions.push("1=0".to_string());
    }

    // Filters over variables this triple-map binds translate directly into
    // the WHERE clause; filters reaching outside this map's variables (e.g.
    // over a predicate this map doesn't cover) are left for a join-level
    // re-check rather than dropped silently.
    for filter in &star.filters {
        if filter.variables().iter().all(|v| var_exprs.contains_key(v)) {
            if let Some(sql_cond) = expr_to_sql(filter, &var_exprs) {
                conditions.push(sql_cond);
            }
        }
    }

    let mut sql = format!(
        "SELECT DISTINCT {}\nFROM {}",
        sorted_projection_list(&projections),
        from_clause(&tm.logical_source)
    );
    for j in &joins {
        sql.push('\n');
        sql.push_str(j);
    }
    if !conditions.is_empty() {
        sql.push_str("\nWHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    Ok((sql, template))
}

fn binary_op_sql(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "<>",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
    })
}

/// Compiles a filter expression to SQL when every leaf is a bound variable
/// or a constant term; returns `None` for function calls (`regex`, `bound`,
/// ...), which this translator doesn't push down — the caller leaves those
/// filters unattached so a post-fetch check (not yet wired at this layer)
/// could apply them (spec.md §4.3.2 "filters the backend can't express").
fn expr_to_sql(expr: &Expr, var_exprs: &HashMap<String, String>) -> Option<String> {
    match expr {
        Expr::Term(Term::Variable(v)) => var_exprs.get(v).cloned(),
        Expr::Term(Term::Iri(i)) => Some(sql_quote(i)),
        Expr::Term(Term::Literal { lexical, .. }) => Some(sql_quote(lexical)),
        Expr::Term(Term::BlankNode(b)) => Some(sql_quote(b)),
        Expr::Binary { op, left, right } => {
            let l = expr_to_sql(left, var_exprs)?;
            let r = expr_to_sql(right, var_exprs)?;
            let op_sql = binary_op_sql(*op)?;
            Some(format!("({l} {op_sql} {r})"))
        }
        Expr::Unary { op: UnaryOp::Not, arg } => Some(format!("(NOT {})", expr_to_sql(arg, var_exprs)?)),
        Expr::Unary { op: UnaryOp::Neg, arg } => Some(format!("(-{})", expr_to_sql(arg, var_exprs)?)),
        Expr::Call(_) => None,
    }
}

/// Orders projections by their output alias so parallel `UNION` branches
/// stay union-compatible (spec.md §4.3.2 "sorted by variable name").
fn sorted_projection_list(projections: &[String]) -> String {
    let mut sorted = projections.to_vec();
    sorted.sort();
    sorted.join(", ")
}

fn render_reference_object(
    parent: TripleMapId,
    join: &[(String, String)],
    object: &Term,
    catalog: &Catalog,
    child_source: &LogicalSource,
    joins: &mut Vec<String>,
) -> TranslationResult<Rendered> {
    let parent_tm = catalog
        .mappings
        .get(parent)
        .ok_or(TranslationError::UnknownParentTripleMap(parent))?;

    let Term::Variable(obj_var) = object else {
        // A constant object against a reference-object map has no direct
        // representation without resolving the parent row; treat as
        // contradictory rather than silently dropping the predicate.
        return Ok(Rendered::Contradiction);
    };
    let alias = var_alias(obj_var);

    let parent_subject_column = match &parent_tm.subject_map.term {
        TermMap::Reference(col) => col.clone(),
        TermMap::Template(t) => TermMap::template_segments(t)
            .into_iter()
            .filter_map(|s| match s {
                TemplateSegment::Column(c) => Some(c),
                TemplateSegment::Literal(_) => None,
            })
            .next()
            .unwrap_or_else(|| "id".to_string()),
        TermMap::Constant(c) => return Ok(Rendered::Projection(sql_quote(c))),
    };

    if parent_tm.logical_source == *child_source {
        // Same table: the parent's subject is computable directly off the
        // current row without a join (spec.md "inline as an equi-join" —
        // degenerates to a same-row reference when source and target
        // coincide).
        Ok(Rendered::Projection(parent_subject_column))
    } else {
        // Cross-table: LEFT JOIN a sub-select of the parent on the
        // reference-object's column equalities, then project the parent's
        // subject expression through the join alias.
        let parent_alias = format!("ref_{alias}");
        let parent_sql = format!(
            "SELECT DISTINCT {parent_subject_column}, {} FROM {}",
            join.iter()
                .map(|(_, parent_col)| parent_col.clone())
                .collect::<Vec<_>>()
                .join(", "),
            from_clause(&parent_tm.logical_source)
        );
        let on: Vec<String> = join
            .iter()
            .map(|(child_col, parent_col)| format!("{parent_alias}.{parent_col} = {child_col}"))
            .collect();
        joins.push(format!(
            "LEFT JOIN ({parent_sql}) AS {parent_alias} ON {}",
            on.join(" AND ")
        ));
        Ok(Rendered::Projection(format!(
            "{parent_alias}.{parent_subject_column}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataSource, DataSourceKind, Federation, Molecule, Predicate, RangeRef};
    use crate::decomposer::SourceAssignment;
    use crate::mapping::{MappingArena, PredicateObjectMap, SubjectMap};
    use std::collections::{HashMap, HashSet};

    fn catalog_with_city_mapping() -> Catalog {
        let mut mappings = MappingArena::new();
        let tm_id = mappings.insert(TripleMap {
            id: TripleMapId(0),
            logical_source: LogicalSource::Table("city".into()),
            subject_map: SubjectMap {
                term: TermMap::Template("http://ex.org/city/{id}".into()),
                rdf_types: vec!["http://ex.org/City".into()],
            },
            predicate_object_maps: vec![PredicateObjectMap {
                predicate: "http://ex.org/name".into(),
                object: ObjectMap::Term(TermMap::Reference("name".into())),
            }],
        });

        let mut sources = HashMap::new();
        sources.insert(
            "DB1".to_string(),
            DataSource {
                id: "DB1".into(),
                url: "postgres://localhost/db".into(),
                kind: DataSourceKind::Postgres,
                params: HashMap::new(),
                mapping_ids: vec![tm_id],
                typing_predicate: None,
                labeling_property: None,
            },
        );

        let mut predicates = HashMap::new();
        predicates.insert(
            "http://ex.org/name".to_string(),
            Predicate {
                pred_id: "http://ex.org/name".into(),
                label: String::new(),
                cardinality: 1,
                ranges: HashSet::from([RangeRef::Datatype("http://www.w3.org/2001/XMLSchema#string".into())]),
            },
        );
        let mut predicate_sources = HashMap::new();
        predicate_sources.insert("DB1".to_string(), HashSet::from(["http://ex.org/name".to_string()]));
        let mut mapping_ids = HashMap::new();
        let mut inner = HashMap::new();
        inner.insert(tm_id, HashSet::from(["http://ex.org/City".to_string()]));
        mapping_ids.insert("DB1".to_string(), inner);

        let molecule = Molecule {
            mt_id: "http://ex.org/City".into(),
            label: String::new(),
            cardinality: 1,
            subclass_of: vec![],
            predicates,
            datasources: HashSet::from(["DB1".to_string()]),
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

    fn city_star() -> Star {
        Star {
            subject: Term::variable("x"),
            triples: vec![
                crate::algebra::TriplePattern::new(
                    Term::variable("x"),
                    Term::iri(RDF_TYPE),
                    Term::iri("http://ex.org/City"),
                ),
                crate::algebra::TriplePattern::new(
                    Term::variable("x"),
                    Term::iri("http://ex.org/name"),
                    Term::variable("n"),
                ),
            ],
            filters: vec![],
            candidate_mts: vec!["http://ex.org/City".into()],
            sources: vec![SourceAssignment {
                datasource: "DB1".into(),
                mts: vec!["http://ex.org/City".into()],
            }],
        }
    }

    #[test]
    fn translates_star_into_select() {
        let catalog = catalog_with_city_mapping();
        let star = city_star();
        let (sql, template) = translate(&[star], &catalog, "DB1", None).unwrap();
        assert!(sql.contains("SELECT DISTINCT"));
        assert!(sql.contains("FROM city"));
        assert!(template.variables.contains_key("x"));
        assert!(template.variables.contains_key("n"));
    }

    #[test]
    fn missing_predicate_mapping_is_an_error() {
        let catalog = catalog_with_city_mapping();
        let mut star = city_star();
        star.triples.push(crate::algebra::TriplePattern::new(
            Term::variable("x"),
            Term::iri("http://ex.org/unmapped"),
            Term::variable("z"),
        ));
        let err = translate(&[star], &catalog, "DB1", None).unwrap_err();
        assert!(matches!(err, TranslationError::NoMappingForStar { .. }));
    }

    #[test]
    fn reverse_match_extracts_capture() {
        let captures = reverse_match_template("http://ex.org/city/{id}", "http://ex.org/city/42").unwrap();
        assert_eq!(captures, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn reverse_match_fails_on_literal_mismatch() {
        assert!(reverse_match_template("http://ex.org/city/{id}", "http://other.org/city/42").is_none());
    }
}
