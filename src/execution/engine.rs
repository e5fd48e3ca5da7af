//! Recursive plan-spawning engine (spec.md §4.5 "Execution engine"): walks a
//! [`Plan`] tree, spawns one tokio task per node, and wires
//! [`super::queue`]'s bounded channels between parent and child tasks.
//!
//! [`BindHashJoin`](OpKind::BindHashJoin) and the `Optional` fallback live
//! here rather than in [`super::operators`] because re-instantiating the
//! inner subtree per outer binding (spec.md §4.5 "Bind hash join algorithm")
//! needs to call back into [`spawn_plan`] itself.

use super::context::QueryContext;
use super::operators;
use super::queue::{bounded, Binding, BindingReceiver, BindingSender};
use crate::algebra::Expr;
use crate::backend::{mongo_wrapper, sparql_wrapper, sql_wrapper, BackendPools};
use crate::catalog::error::ConfigError;
use crate::catalog::{Catalog, DataSourceKind};
use crate::error::FedQpError;
use crate::physical_plan::{OpKind, Plan, ServiceLeaf};
use crate::term::{BindingType, Term};
use crate::translate::{mongo, sparql, sql};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Tunables the engine needs but that don't belong on [`Plan`] itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub queue_depth: usize,
    pub bind_join_raised_limit: u64,
}

type SpawnFuture = Pin<Box<dyn Future<Output = Result<BindingReceiver, FedQpError>> + Send>>;

/// Spawns the whole operator tree rooted at `plan`, returning the receiver
/// the caller (the `/sparql` handler) reads the final result stream from.
/// Translation errors for a leaf surface synchronously here; backend I/O
/// errors are logged and close that leaf's queue early instead of failing
/// the whole query (spec.md §5 "partial results on backend failure").
pub fn spawn_plan(
    plan: Plan,
    catalog: Arc<Catalog>,
    pools: Arc<BackendPools>,
    ctx: QueryContext,
    config: Arc<EngineConfig>,
) -> SpawnFuture {
    Box::pin(async move {
        match plan {
            Plan::Empty => {
                let (tx, rx) = bounded(config.queue_depth);
                drop(tx);
                Ok(rx)
            }
            Plan::Leaf(leaf) => spawn_leaf(leaf, catalog, pools, ctx, config).await,
            Plan::Inner { op, left, right, .. } => {
                spawn_inner(op, *left, right.map(|b| *b), catalog, pools, ctx, config).await
            }
        }
    })
}

async fn spawn_leaf(
    leaf: ServiceLeaf,
    catalog: Arc<Catalog>,
    pools: Arc<BackendPools>,
    ctx: QueryContext,
    config: Arc<EngineConfig>,
) -> Result<BindingReceiver, FedQpError> {
    let source = catalog
        .data_source(&leaf.datasource)
        .ok_or_else(|| ConfigError::UnknownDataSource(leaf.datasource.clone()))?
        .clone();

    let (tx, rx) = bounded(config.queue_depth);

    if !source.kind.is_supported() {
        tracing::warn!(
            datasource = %leaf.datasource,
            kind = ?source.kind,
            "data source kind has no translator; leaf produces no rows"
        );
        drop(tx);
        return Ok(rx);
    }

    match source.kind {
        DataSourceKind::SparqlEndpoint => {
            let (query, template) = sparql::translate(&leaf.stars, None);
            let datasource = leaf.datasource.clone();
            let url = source.url.clone();
            let limit = leaf.limit;
            let pools = pools.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Err(err) =
                    sparql_wrapper::execute(&datasource, &url, &query, &template, limit, 0, &pools, &tx, &ctx).await
                {
                    tracing::error!(%err, datasource = %datasource, "sparql backend failed");
                    ctx.mark_interrupted();
                }
            });
        }
        kind if kind.is_sql() => {
            let (query, template) = sql::translate(&leaf.stars, &catalog, &leaf.datasource, None)?;
            let datasource = leaf.datasource.clone();
            let url = source.url.clone();
            let limit = leaf.limit;
            let pools = pools.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Err(err) =
                    sql_wrapper::execute(&datasource, &url, &query, &template, limit, 0, &pools, &tx, &ctx).await
                {
                    tracing::error!(%err, datasource = %datasource, "sql backend failed");
                    ctx.mark_interrupted();
                }
            });
        }
        DataSourceKind::MongoLdFlat => match mongo::translate(&leaf.stars, &catalog, &leaf.datasource)? {
            Some(plan) => {
                let datasource = leaf.datasource.clone();
                let url = source.url.clone();
                let params = source.params.clone();
                let limit = leaf.limit;
                let pools = pools.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        mongo_wrapper::execute(&datasource, &url, &params, &plan, limit, 0, &pools, &tx, &ctx).await
                    {
                        tracing::error!(%err, datasource = %datasource, "mongo backend failed");
                        ctx.mark_interrupted();
                    }
                });
            }
            // No triple map covers every constant predicate in this star:
            // the star can never match a document, not a translation error
            // (spec.md §9 "zero-candidate-molecule" resolution — empty
            // result, not a hard failure).
            None => drop(tx),
        },
        _ => unreachable!("is_supported() already filtered this kind"),
    }

    Ok(rx)
}

fn intersecting_vars(a: &HashSet<String>, b: &HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = a.intersection(b).cloned().collect();
    v.sort();
    v
}

async fn spawn_inner(
    op: OpKind,
    left: Plan,
    right: Option<Plan>,
    catalog: Arc<Catalog>,
    pools: Arc<BackendPools>,
    ctx: QueryContext,
    config: Arc<EngineConfig>,
) -> Result<BindingReceiver, FedQpError> {
    let (tx, rx) = bounded(config.queue_depth);

    match op {
        OpKind::SymmetricHashJoin => {
            let right = right.expect("SymmetricHashJoin always has a right child");
            let left_vars: Vec<String> = left.variables().into_iter().collect();
            let right_vars: Vec<String> = right.variables().into_iter().collect();
            let (left_rx, right_rx) = tokio::try_join!(
                spawn_plan(left, catalog.clone(), pools.clone(), ctx.clone(), config.clone()),
                spawn_plan(right, catalog, pools, ctx.clone(), config),
            )?;
            tokio::spawn(operators::run_symmetric_hash_join(
                left_rx, right_rx, left_vars, right_vars, tx, ctx,
            ));
        }
        OpKind::BindHashJoin { outer_is_left } => {
            let right = right.expect("BindHashJoin always has a right child");
            let (outer_plan, inner_plan) = if outer_is_left { (left, right) } else { (right, left) };
            let join_vars = intersecting_vars(&outer_plan.variables(), &inner_plan.variables());
            let outer_rx = spawn_plan(outer_plan, catalog.clone(), pools.clone(), ctx.clone(), config.clone()).await?;
            tokio::spawn(run_bind_hash_join(outer_rx, inner_plan, join_vars, catalog, pools, ctx, config, tx));
        }
        OpKind::Union => {
            let right = right.expect("Union always has a right child");
            let left_rx = spawn_plan(left, catalog.clone(), pools.clone(), ctx.clone(), config.clone()).await?;
            let right_rx = spawn_plan(right, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_union(vec![left_rx, right_rx], tx, ctx));
        }
        // The planner's `symmetric` flag only chose which physical strategy
        // would have been fastest; both reduce to materialize-then-match
        // here rather than a streaming left-outer algorithm, since spec.md
        // only pins down SymmetricHashJoin's step-by-step streaming shape
        // (see DESIGN.md "Optional execution strategy").
        OpKind::Optional { symmetric: _ } => {
            let right = right.expect("Optional always has a right child");
            let required_vars: Vec<String> = left.variables().into_iter().collect();
            let optional_vars: Vec<String> = right.variables().into_iter().collect();
            let (required_rx, optional_rx) = tokio::try_join!(
                spawn_plan(left, catalog.clone(), pools.clone(), ctx.clone(), config.clone()),
                spawn_plan(right, catalog, pools, ctx.clone(), config),
            )?;
            tokio::spawn(operators::run_optional(
                required_rx,
                optional_rx,
                required_vars,
                optional_vars,
                tx,
                ctx,
            ));
        }
        OpKind::Filter(expr) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_filter(child_rx, expr, tx, ctx));
        }
        OpKind::Project(vars) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_project(child_rx, vars, tx, ctx));
        }
        OpKind::Distinct => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_distinct(child_rx, tx, ctx));
        }
        OpKind::OrderBy(keys) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_order_by(child_rx, keys, tx, ctx));
        }
        OpKind::Offset(n) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_offset(child_rx, n, tx, ctx));
        }
        OpKind::Limit(n) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_limit(child_rx, n, tx, ctx));
        }
        OpKind::Construct(template) => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_construct(child_rx, template, tx, ctx));
        }
        OpKind::Ask => {
            let child_rx = spawn_plan(left, catalog, pools, ctx.clone(), config).await?;
            tokio::spawn(operators::run_ask(child_rx, tx, ctx));
        }
    }

    Ok(rx)
}

fn key_term(bv: &crate::term::BoundValue) -> Term {
    match bv.ty {
        BindingType::Uri => Term::Iri(bv.value.clone()),
        BindingType::Bnode => Term::BlankNode(bv.value.clone()),
        BindingType::Literal => Term::Literal {
            lexical: bv.value.clone(),
            datatype: bv.datatype.clone(),
            language: bv.language.clone(),
        },
    }
}

/// Builds `?v1 = <bound-term-1> && ?v2 = <bound-term-2> && ...` for one
/// outer binding's join-key values, `None` if it doesn't bind every join
/// variable (can't re-instantiate the inner side for an incomplete key).
fn build_key_filter(sample: &Binding, join_vars: &[String]) -> Option<Expr> {
    let mut exprs = join_vars.iter().filter_map(|v| {
        sample
            .get(v)
            .map(|bv| Expr::eq(Expr::Term(Term::Variable(v.clone())), Expr::Term(key_term(bv))))
    });
    let first = exprs.next()?;
    Some(exprs.fold(first, Expr::and))
}

fn wrap_with_filter(plan: Plan, expr: Expr) -> Plan {
    let vars = plan.variables();
    Plan::Inner {
        op: OpKind::Filter(expr),
        left: Box::new(plan),
        right: None,
        vars,
    }
}

/// Drains the outer side to accumulate distinct join-key bindings, then
/// re-instantiates `inner_plan` once per key (wrapped in a `Filter` pinning
/// the join variables to that key's values) and joins its rows against
/// every outer row sharing the key (spec.md §4.5 "Bind hash join
/// algorithm").
#[allow(clippy::too_many_arguments)]
async fn run_bind_hash_join(
    mut outer_rx: BindingReceiver,
    inner_plan: Plan,
    join_vars: Vec<String>,
    catalog: Arc<Catalog>,
    pools: Arc<BackendPools>,
    ctx: QueryContext,
    config: Arc<EngineConfig>,
    out: BindingSender,
) {
    let mut groups: std::collections::HashMap<String, Vec<Binding>> = std::collections::HashMap::new();
    while let Some(row) = outer_rx.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        if let Some(key) = operators::join_key(&row, &join_vars) {
            groups.entry(key).or_default().push(row);
        }
    }

    for rows in groups.into_values() {
        if ctx.is_cancelled() {
            return;
        }
        let Some(sample) = rows.first() else { continue };
        let Some(filter_expr) = build_key_filter(sample, &join_vars) else {
            continue;
        };
        let wrapped = wrap_with_filter(inner_plan.clone(), filter_expr);

        let mut inner_rx =
            match spawn_plan(wrapped, catalog.clone(), pools.clone(), ctx.clone(), config.clone()).await {
                Ok(rx) => rx,
                Err(err) => {
                    tracing::error!(%err, "bind join inner re-instantiation failed");
                    continue;
                }
            };

        let mut inner_rows = Vec::new();
        while let Some(row) = inner_rx.recv().await {
            inner_rows.push(row);
        }

        for outer_row in &rows {
            for inner_row in &inner_rows {
                let merged = operators::merge_bindings(outer_row.clone(), inner_row);
                if out.send(merged).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::BoundValue;

    #[test]
    fn intersecting_vars_is_sorted_and_deduped() {
        let a: HashSet<String> = ["x".into(), "y".into()].into_iter().collect();
        let b: HashSet<String> = ["y".into(), "z".into()].into_iter().collect();
        assert_eq!(intersecting_vars(&a, &b), vec!["y".to_string()]);
    }

    #[test]
    fn build_key_filter_combines_every_join_var() {
        let mut sample = Binding::new();
        sample.insert("s".to_string(), BoundValue::uri("http://ex.org/1", "E1"));
        sample.insert("t".to_string(), BoundValue::literal("42", "E1"));
        let expr = build_key_filter(&sample, &["s".to_string(), "t".to_string()]).unwrap();
        assert!(matches!(
            expr,
            Expr::Binary {
                op: crate::algebra::BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn build_key_filter_is_none_when_key_partially_unbound() {
        let sample = Binding::new();
        assert!(build_key_filter(&sample, &["missing".to_string()]).is_none());
    }

    #[tokio::test]
    async fn empty_plan_closes_immediately() {
        let config = Arc::new(EngineConfig {
            queue_depth: 8,
            bind_join_raised_limit: 10_000,
        });
        let catalog = Arc::new(test_catalog());
        let pools = Arc::new(BackendPools::new());
        let ctx = QueryContext::new(None);
        let mut rx = spawn_plan(Plan::Empty, catalog, pools, ctx, config).await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unary_chain_over_empty_plan_terminates_with_no_rows() {
        let config = Arc::new(EngineConfig {
            queue_depth: 8,
            bind_join_raised_limit: 10_000,
        });
        let catalog = Arc::new(test_catalog());
        let pools = Arc::new(BackendPools::new());
        let ctx = QueryContext::new(None);
        let plan = Plan::Inner {
            op: OpKind::Project(vec!["x".to_string()]),
            left: Box::new(Plan::Inner {
                op: OpKind::Distinct,
                left: Box::new(Plan::Empty),
                right: None,
                vars: HashSet::new(),
            }),
            right: None,
            vars: HashSet::new(),
        };
        let mut rx = spawn_plan(plan, catalog, pools, ctx, config).await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    fn test_catalog() -> Catalog {
        use crate::catalog::Federation;
        Catalog::build(Federation {
            fed_id: "f".into(),
            name: "f".into(),
            desc: String::new(),
            sources: std::collections::HashMap::new(),
            rdfmts: vec![],
            mappings: crate::mapping::MappingArena::new(),
        })
        .unwrap()
    }
}
