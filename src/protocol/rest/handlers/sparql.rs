//! `GET|POST /sparql` — execute a query against the active federation
//! (spec.md §6, grounded on the upstream service's query endpoint).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};

use crate::catalog::Catalog;
use crate::protocol::rest::AppState;
use crate::service::{QueryOutcome, Status};

fn params_from(query: &HashMap<String, String>, body: &[u8]) -> HashMap<String, String> {
    let mut params = query.clone();
    for (k, v) in url::form_urlencoded::parse(body) {
        params.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    if let Ok(as_json) = serde_json::from_slice::<Value>(body) {
        if let Value::Object(map) = as_json {
            for (k, v) in map {
                if let Value::String(s) = v {
                    params.entry(k).or_insert(s);
                }
            }
        }
    }
    params
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(query_params): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Json<Value> {
    let params = params_from(&query_params, &body);

    let Some(sparql_text) = params.get("query").filter(|q| !q.is_empty()) else {
        return Json(json!({
            "error": "No SPARQL query found in parameter 'query'"
        }));
    };

    let engine = match (params.get("collection"), state.engine_for_query().await) {
        (_, None) => {
            return Json(json!({
                "error": format!(
                    "Federation setting is not found as '{}'",
                    state.config_file.display()
                )
            }));
        }
        (Some(collection), Some(base)) if !collection.is_empty() => {
            let guard = state.active.read().await;
            match guard.as_ref() {
                Some(active) => {
                    let scoped = active.federation.scoped_to_collection(collection);
                    match Catalog::build(scoped) {
                        Ok(catalog) => crate::service::FederationEngine::new(
                            Arc::new(catalog),
                            state.pools.clone(),
                            state.engine_config.clone(),
                        ),
                        Err(err) => {
                            return Json(json!({"error": err.to_string()}));
                        }
                    }
                }
                None => base,
            }
        }
        (_, Some(base)) => base,
    };

    match engine.query(sparql_text, state.default_timeout).await {
        Ok(outcome) => Json(render_outcome(sparql_text, outcome)),
        Err(err) => Json(json!({
            "query": sparql_text,
            "error": err.to_string(),
        })),
    }
}

fn render_outcome(query: &str, outcome: QueryOutcome) -> Value {
    match outcome {
        QueryOutcome::Select { vars, bindings, status } => json!({
            "head": { "vars": vars },
            "results": { "bindings": bindings },
            "message": status.message(),
            "query": query,
        }),
        QueryOutcome::Construct { triples, status } => {
            let bindings: Vec<_> = triples
                .into_iter()
                .map(|(s, p, o)| {
                    let mut row = HashMap::new();
                    row.extend(s);
                    row.extend(p);
                    row.extend(o);
                    row
                })
                .collect();
            json!({
                "head": { "vars": ["subject", "predicate", "object"] },
                "results": { "bindings": bindings },
                "message": status.message(),
                "query": query,
            })
        }
        QueryOutcome::Ask { answer, status } => json!({
            "head": {},
            "boolean": answer,
            "message": status.message(),
            "query": query,
        }),
    }
}
