//! `GET|POST /configure` — replace the active federation
//! (spec.md §6, grounded on the upstream service's configure endpoint).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::catalog::{Catalog, Federation};
use crate::protocol::rest::{ActiveFederation, AppState};

pub async fn handle(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> Json<Value> {
    let federation_json = match extract_federation_json(&body) {
        Some(v) => v,
        None => {
            return Json(json!({
                "status": false,
                "error": "No 'federation' payload found (inline JSON or uploaded file)",
            }));
        }
    };

    let federation: Federation = match serde_json::from_value(federation_json) {
        Ok(f) => f,
        Err(err) => {
            return Json(json!({ "status": false, "error": err.to_string() }));
        }
    };

    // The upstream service bootstraps RDF-MT statistics from the live
    // sources when `rdfmts` arrives empty. Bootstrapping is explicitly out
    // of scope here (spec.md §1 "Out of scope... RDF-MT extraction"); an
    // empty `rdfmts` is accepted as-is and simply yields a catalog with no
    // molecules, not an error.
    let catalog = match Catalog::build(federation.clone()) {
        Ok(c) => c,
        Err(err) => {
            return Json(json!({ "status": false, "error": err.to_string() }));
        }
    };

    if let Ok(serialized) = serde_json::to_string_pretty(&federation) {
        if let Err(err) = std::fs::write(&state.config_file, serialized) {
            tracing::warn!(%err, path = %state.config_file.display(), "failed to persist federation config");
        }
    }

    let response = json!({
        "status": true,
        "federation": federation,
    });

    let mut guard = state.active.write().await;
    *guard = Some(ActiveFederation {
        federation,
        catalog: Arc::new(catalog),
    });

    Json(response)
}

fn extract_federation_json(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_slice::<Value>(body) {
        if let Value::Object(ref map) = v {
            if let Some(inner) = map.get("federation") {
                return Some(inner.clone());
            }
        }
        return Some(v);
    }
    let form: HashMap<String, String> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let raw = form.get("federation")?;
    serde_json::from_str(raw).ok()
}
