//! Top-level query-service facade tying every stage of the pipeline
//! together (spec.md §2 "Data flow": `query text -> parser -> decomposer
//! (catalog) -> logical plan -> physical plan -> executor -> ... -> result
//! sink`).
//!
//! This is the one piece of orchestration the per-stage modules
//! deliberately don't own themselves — [`crate::protocol::rest`]'s
//! `/sparql` handler is the only other caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::algebra::QueryForm;
use crate::backend::BackendPools;
use crate::catalog::Catalog;
use crate::error::FedQpError;
use crate::execution::context::QueryContext;
use crate::execution::engine::{self, EngineConfig};
use crate::execution::queue::Binding;
use crate::{decomposer, logical_plan, physical_plan, sparql_parser};

/// Message text surfaced in the HTTP response, mirroring the three
/// terminal states of spec.md §7 "Propagation policy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Finished,
    Partial,
    Interrupted,
}

impl Status {
    pub fn message(self) -> &'static str {
        match self {
            Status::Finished => "All results retrieved",
            Status::Partial => "partial results",
            Status::Interrupted => "interrupted",
        }
    }
}

/// The shape a query's result takes, independent of any particular wire
/// format — [`crate::protocol::rest::handlers`] renders this into the
/// SPARQL-JSON envelope of spec.md §6.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Select {
        vars: Vec<String>,
        bindings: Vec<Binding>,
        status: Status,
    },
    Construct {
        triples: Vec<(Binding, Binding, Binding)>,
        status: Status,
    },
    Ask {
        answer: bool,
        status: Status,
    },
}

/// Immutable, query-independent plumbing shared across every request:
/// the catalog (rebuilt wholesale by `/configure`) and the backend
/// connection pools (long-lived for the process, spec.md §5 "Backend
/// connections are pooled per data source").
pub struct FederationEngine {
    catalog: Arc<Catalog>,
    pools: Arc<BackendPools>,
    engine_config: Arc<EngineConfig>,
}

impl FederationEngine {
    pub fn new(catalog: Arc<Catalog>, pools: Arc<BackendPools>, engine_config: Arc<EngineConfig>) -> Self {
        FederationEngine {
            catalog,
            pools,
            engine_config,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Runs the full pipeline for one SPARQL query string and drains the
    /// resulting binding stream to completion (or to cancellation/timeout).
    pub async fn query(&self, sparql: &str, timeout: Option<Duration>) -> Result<QueryOutcome, FedQpError> {
        let algebra = sparql_parser::parse_query(sparql)?;

        let (form, project_vars, construct_template) = match &algebra {
            crate::algebra::AlgebraNode::Project {
                form,
                vars,
                template,
                ..
            } => (*form, vars.clone(), template.clone()),
            _ => unreachable!("parse_query always returns an outer Project node"),
        };
        let modifiers = match &algebra {
            crate::algebra::AlgebraNode::Project { modifiers, .. } => modifiers.clone(),
            _ => unreachable!(),
        };

        let decomposed = decomposer::decompose(&algebra, &self.catalog)?;
        let logical = logical_plan::build(&decomposed, &self.catalog);
        let joined = physical_plan::build_join_tree(&logical, &self.catalog, self.engine_config.bind_join_raised_limit);
        let plan = physical_plan::wrap_query(joined, form, &project_vars, &construct_template, &modifiers);

        let ctx = QueryContext::new(timeout);
        let mut rx = engine::spawn_plan(
            plan,
            self.catalog.clone(),
            self.pools.clone(),
            ctx.clone(),
            self.engine_config.clone(),
        )
        .await?;

        let mut rows = Vec::new();
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }

        let status = if ctx.is_interrupted() {
            Status::Interrupted
        } else if ctx.is_cancelled() {
            // A clean early stop (e.g. `Limit` satisfied, or the deadline
            // elapsed without any backend ever failing) still yields
            // whatever was gathered before the cutoff (spec.md §7
            // "CancellationError... no downstream error, just early
            // termination").
            Status::Partial
        } else {
            Status::Finished
        };

        Ok(match form {
            QueryForm::Select => QueryOutcome::Select {
                vars: project_vars,
                bindings: rows,
                status,
            },
            QueryForm::Construct => QueryOutcome::Construct {
                triples: rows
                    .into_iter()
                    .map(|mut b| {
                        let subject = take_component(&mut b, "subject");
                        let predicate = take_component(&mut b, "predicate");
                        let object = take_component(&mut b, "object");
                        (subject, predicate, object)
                    })
                    .collect(),
                status,
            },
            QueryForm::Ask => QueryOutcome::Ask {
                answer: rows.iter().any(|b| {
                    b.get("__ask")
                        .is_some_and(|v| v.value == "true")
                }),
                status,
            },
        })
    }
}

fn take_component(row: &mut Binding, key: &str) -> Binding {
    let mut out = HashMap::new();
    if let Some(v) = row.remove(key) {
        out.insert(key.to_string(), v);
    }
    out
}
