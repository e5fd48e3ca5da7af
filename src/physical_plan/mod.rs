//! Attaches execution strategy to the logical join tree: symmetric vs.
//! bind-hash join selection, union/optional folding, and the
//! project/distinct/order/offset/limit wrapper (spec.md §4.4 "Physical
//! Planner").
//!
//! Grounded on `AwudimaPlanner.create_physical_plan` / `make_joins`
//! (`examples/original_source/awudima/mediator/planner/QueryPlanner.py`),
//! reshaped per spec.md §9 "Operator tree as tagged variant" into a single
//! `Plan` enum instead of one class per operator.

use crate::algebra::{Expr, Modifiers, QueryForm, TriplePattern};
use crate::catalog::{Catalog, DataSourceId, DataSourceKind};
use crate::decomposer::Star;
use crate::logical_plan::LogicalNode;
use std::collections::HashSet;

/// One data-source round trip: the star(s) it answers and an optional
/// per-leaf row cap (raised to the bind-join ceiling when this leaf serves
/// as a dependent join's inner side).
#[derive(Debug, Clone)]
pub struct ServiceLeaf {
    pub datasource: DataSourceId,
    pub stars: Vec<Star>,
    pub limit: Option<u64>,
}

/// The physical operator a [`Plan::Inner`] node executes (spec.md §4.4
/// operator table).
#[derive(Debug, Clone)]
pub enum OpKind {
    SymmetricHashJoin,
    /// `outer_is_left` says which child is drained first to accumulate
    /// distinct join-key bindings; the other child is the one
    /// re-instantiated per binding (spec.md §4.5 "Bind hash join algorithm").
    BindHashJoin { outer_is_left: bool },
    Union,
    /// Symmetric when both sides are low-selective services, dependent
    /// (nested-loop) otherwise (spec.md §4.4 "OptionalJoin").
    Optional { symmetric: bool },
    Filter(Expr),
    Project(Vec<String>),
    Distinct,
    OrderBy(Vec<(String, bool)>),
    Offset(u64),
    Limit(u64),
    Construct(Vec<TriplePattern>),
    Ask,
}

/// Tagged union replacing the original's per-operator class hierarchy
/// (spec.md §9). `right` is `None` for unary operators (Filter, Project,
/// Distinct, OrderBy, Offset, Limit, Construct, Ask).
#[derive(Debug, Clone)]
pub enum Plan {
    Leaf(ServiceLeaf),
    Inner {
        op: OpKind,
        left: Box<Plan>,
        right: Option<Box<Plan>>,
        vars: HashSet<String>,
    },
    /// A branch with no data to contribute (spec.md §8 round-trip laws
    /// `Union(A, ∅) ≡ A`, `Join(A, ∅) ≡ ∅`, `Optional(A, ∅) ≡ A`) — folded
    /// away eagerly by [`build_join_tree`] rather than carried as a
    /// no-op node the engine has to special-case at execution time.
    Empty,
}

impl Plan {
    pub fn variables(&self) -> HashSet<String> {
        match self {
            Plan::Leaf(leaf) => leaf
                .stars
                .iter()
                .flat_map(|s| s.triples.iter())
                .flat_map(TriplePattern::variables)
                .collect(),
            Plan::Inner { vars, .. } => vars.clone(),
            Plan::Empty => HashSet::new(),
        }
    }
}

fn as_leaf(plan: &Plan) -> Option<&ServiceLeaf> {
    match plan {
        Plan::Leaf(leaf) => Some(leaf),
        _ => None,
    }
}

fn has_constant_subject(leaf: &ServiceLeaf) -> bool {
    leaf.stars.iter().any(|s| s.subject.is_constant())
}

fn constant_percentage(leaf: &ServiceLeaf) -> f64 {
    let mut constants = 0usize;
    let mut total = 0usize;
    for star in &leaf.stars {
        for t in &star.triples {
            total += 3;
            constants += t.constant_positions();
        }
    }
    if total == 0 {
        0.0
    } else {
        constants as f64 / total as f64
    }
}

/// "high-selective" per spec.md §4.4: constant-percentage > 0.5 OR the
/// subject is constant. `is_low_selective` is its negation.
fn is_low_selective(leaf: &ServiceLeaf) -> bool {
    !has_constant_subject(leaf) && constant_percentage(leaf) <= 0.5
}

fn is_sparql_endpoint(leaf: &ServiceLeaf, catalog: &Catalog) -> bool {
    catalog
        .data_source(&leaf.datasource)
        .is_some_and(|ds| ds.kind == DataSourceKind::SparqlEndpoint)
}

/// Operator-selection heuristic, spec.md §4.4 rules 1-5, evaluated in
/// order — the first matching rule wins.
fn choose_join_op(left: &Plan, right: &Plan, catalog: &Catalog) -> OpKind {
    if let Some(right_leaf) = as_leaf(right) {
        if has_constant_subject(right_leaf) {
            return OpKind::BindHashJoin { outer_is_left: true };
        }
    }
    if let Some(left_leaf) = as_leaf(left) {
        if has_constant_subject(left_leaf) {
            return OpKind::BindHashJoin { outer_is_left: false };
        }
    }
    if let (Some(left_leaf), Some(right_leaf)) = (as_leaf(left), as_leaf(right)) {
        if is_sparql_endpoint(left_leaf, catalog)
            && is_sparql_endpoint(right_leaf, catalog)
            && is_low_selective(left_leaf)
            && is_low_selective(right_leaf)
        {
            return OpKind::SymmetricHashJoin;
        }
    }
    let left_low = as_leaf(left).map(is_low_selective);
    let right_low = as_leaf(right).map(is_low_selective);
    if let (Some(left_low), Some(right_low)) = (left_low, right_low) {
        if left_low != right_low {
            // The selective (not low-selective) side becomes the outer —
            // its bindings are cheap to inject into the other side.
            return OpKind::BindHashJoin { outer_is_left: !left_low };
        }
    }
    OpKind::SymmetricHashJoin
}

fn optional_is_symmetric(left: &Plan, right: &Plan) -> bool {
    match (as_leaf(left), as_leaf(right)) {
        (Some(l), Some(r)) => is_low_selective(l) && is_low_selective(r),
        _ => false,
    }
}

fn union_vars(left: &Plan, right: &Plan) -> HashSet<String> {
    let mut v = left.variables();
    v.extend(right.variables());
    v
}

/// Builds the join/union/optional/filter tree, raising a bind-join inner
/// leaf's row cap and folding away `Empty` branches per the round-trip laws.
pub fn build_join_tree(node: &LogicalNode, catalog: &Catalog, bind_join_raised_limit: u64) -> Plan {
    match node {
        LogicalNode::Service { datasource, stars } => Plan::Leaf(ServiceLeaf {
            datasource: datasource.clone(),
            stars: stars.clone(),
            limit: None,
        }),
        LogicalNode::Join(l, r) => {
            let mut left = build_join_tree(l, catalog, bind_join_raised_limit);
            let mut right = build_join_tree(r, catalog, bind_join_raised_limit);
            if matches!(left, Plan::Empty) || matches!(right, Plan::Empty) {
                return Plan::Empty;
            }
            let op = choose_join_op(&left, &right, catalog);
            if let OpKind::BindHashJoin { outer_is_left } = op {
                let inner = if outer_is_left { &mut right } else { &mut left };
                if let Plan::Leaf(leaf) = inner {
                    leaf.limit = Some(bind_join_raised_limit);
                }
            }
            let vars = union_vars(&left, &right);
            Plan::Inner {
                op,
                left: Box::new(left),
                right: Some(Box::new(right)),
                vars,
            }
        }
        LogicalNode::Union(children) => {
            let built: Vec<Plan> = children
                .iter()
                .map(|c| build_join_tree(c, catalog, bind_join_raised_limit))
                .filter(|p| !matches!(p, Plan::Empty))
                .collect();
            fold_union(built)
        }
        LogicalNode::Optional(required, optional) => {
            let left = build_join_tree(required, catalog, bind_join_raised_limit);
            let right = build_join_tree(optional, catalog, bind_join_raised_limit);
            if matches!(right, Plan::Empty) {
                return left;
            }
            let symmetric = optional_is_symmetric(&left, &right);
            let vars = union_vars(&left, &right);
            Plan::Inner {
                op: OpKind::Optional { symmetric },
                left: Box::new(left),
                right: Some(Box::new(right)),
                vars,
            }
        }
        LogicalNode::Filter(child, expr) => {
            let child_plan = build_join_tree(child, catalog, bind_join_raised_limit);
            if matches!(child_plan, Plan::Empty) {
                return Plan::Empty;
            }
            let vars = child_plan.variables();
            Plan::Inner {
                op: OpKind::Filter(expr.clone()),
                left: Box::new(child_plan),
                right: None,
                vars,
            }
        }
    }
}

fn fold_union(mut plans: Vec<Plan>) -> Plan {
    if plans.is_empty() {
        return Plan::Empty;
    }
    let mut acc = plans.remove(0);
    for next in plans {
        let vars = union_vars(&acc, &next);
        acc = Plan::Inner {
            op: OpKind::Union,
            left: Box::new(acc),
            right: Some(Box::new(next)),
            vars,
        };
    }
    acc
}

fn wrap_unary(child: Plan, op: OpKind) -> Plan {
    let vars = child.variables();
    Plan::Inner {
        op,
        left: Box::new(child),
        right: None,
        vars,
    }
}

/// Wraps a built join tree with the query form (Project/Construct/Ask) and
/// solution modifiers, in spec.md §4.4's exact order:
/// form → Distinct? → OrderBy? → Offset? → Limit?.
pub fn wrap_query(
    joined: Plan,
    form: QueryForm,
    project_vars: &[String],
    construct_template: &[TriplePattern],
    modifiers: &Modifiers,
) -> Plan {
    let mut plan = match form {
        QueryForm::Select => wrap_unary(joined, OpKind::Project(project_vars.to_vec())),
        QueryForm::Construct => wrap_unary(joined, OpKind::Construct(construct_template.to_vec())),
        QueryForm::Ask => wrap_unary(joined, OpKind::Ask),
    };
    if modifiers.distinct {
        plan = wrap_unary(plan, OpKind::Distinct);
    }
    if !modifiers.order_by.is_empty() {
        plan = wrap_unary(plan, OpKind::OrderBy(modifiers.order_by.clone()));
    }
    if let Some(offset) = modifiers.offset {
        plan = wrap_unary(plan, OpKind::Offset(offset));
    }
    if let Some(limit) = modifiers.limit {
        plan = wrap_unary(plan, OpKind::Limit(limit));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataSource, Federation, Molecule, Predicate, RangeRef};
    use crate::decomposer::{decompose, SourceAssignment};
    use crate::sparql_parser::parse_query;
    use crate::term::Term;
    use std::collections::HashMap;

    fn catalog_with_two_endpoints() -> Catalog {
        let mut sources = HashMap::new();
        sources.insert(
            "E1".to_string(),
            DataSource {
                id: "E1".into(),
                url: "http://e1.org/sparql".into(),
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
                ranges: HashSet::from([RangeRef::Datatype("http://www.w3.org/2001/XMLSchema#string".into())]),
            },
        );
        let mut predicate_sources = HashMap::new();
        predicate_sources.insert("E1".to_string(), HashSet::from(["http://example.org/p".to_string()]));
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

    fn leaf(datasource: &str, subject: crate::term::Term) -> Plan {
        Plan::Leaf(ServiceLeaf {
            datasource: datasource.to_string(),
            stars: vec![Star {
                subject,
                triples: vec![],
                filters: vec![],
                candidate_mts: vec![],
                sources: vec![SourceAssignment {
                    datasource: datasource.to_string(),
                    mts: vec![],
                }],
            }],
            limit: None,
        })
    }

    #[test]
    fn constant_subject_on_right_triggers_bind_hash_join() {
        let catalog = catalog_with_two_endpoints();
        let left = leaf("E1", Term::variable("x"));
        let right = leaf("E1", Term::iri("http://example.org/fixed"));
        let op = choose_join_op(&left, &right, &catalog);
        assert!(matches!(op, OpKind::BindHashJoin { outer_is_left: true }));
    }

    #[test]
    fn raises_inner_leaf_limit_for_bind_hash_join() {
        let catalog = catalog_with_two_endpoints();
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C ; ex:p ?o . <http://example.org/fixed> ex:p ?o }",
        )
        .unwrap();
        let decomposed = decompose(&node, &catalog).unwrap();
        let logical = crate::logical_plan::build(&decomposed, &catalog);
        let plan = build_join_tree(&logical, &catalog, 10_000);
        let has_raised_limit = contains_raised_limit(&plan);
        assert!(has_raised_limit);
    }

    fn contains_raised_limit(plan: &Plan) -> bool {
        match plan {
            Plan::Leaf(leaf) => leaf.limit == Some(10_000),
            Plan::Inner { left, right, .. } => {
                contains_raised_limit(left) || right.as_ref().is_some_and(|r| contains_raised_limit(r))
            }
            Plan::Empty => false,
        }
    }

    #[test]
    fn empty_union_branch_is_dropped() {
        let plans = vec![leaf("E1", Term::variable("x")), Plan::Empty];
        let folded = fold_union(plans);
        assert!(matches!(folded, Plan::Leaf(_)));
    }
}
