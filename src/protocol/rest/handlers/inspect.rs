//! `GET|POST /inspect` — read back the active federation (spec.md §6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::protocol::rest::AppState;

pub async fn handle(State(state): State<Arc<AppState>>) -> Json<Value> {
    let guard = state.active.read().await;
    match guard.as_ref() {
        Some(active) => Json(json!({ "federation": active.federation })),
        None => Json(json!({ "federation": Value::Null })),
    }
}
