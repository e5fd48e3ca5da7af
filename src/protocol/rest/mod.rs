//! Axum router and shared application state for the three HTTP endpoints
//! (spec.md §6 "HTTP surface").

pub mod error;
pub mod handlers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::backend::BackendPools;
use crate::catalog::{Catalog, Federation};
use crate::execution::engine::EngineConfig;
use crate::service::FederationEngine;

/// The federation currently loaded, or `None` before the first successful
/// `/configure` / on-disk config load (spec.md §6 "`/inspect`... or
/// `{federation: null}`").
pub struct ActiveFederation {
    pub federation: Federation,
    pub catalog: Arc<Catalog>,
}

/// State shared by every handler, behind an `Arc` the axum `Router` clones
/// per connection. The federation is swapped out wholesale by `/configure`
/// (spec.md §5 "the catalog is rebuilt, never mutated in place").
pub struct AppState {
    pub active: RwLock<Option<ActiveFederation>>,
    pub pools: Arc<BackendPools>,
    pub engine_config: Arc<EngineConfig>,
    pub config_file: PathBuf,
    pub default_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        config_file: PathBuf,
        pools: Arc<BackendPools>,
        engine_config: Arc<EngineConfig>,
        default_timeout: Option<Duration>,
    ) -> Self {
        let contents = match std::fs::read_to_string(&config_file) {
            Ok(s) => s,
            Err(_) => return AppState::empty(config_file, pools, engine_config, default_timeout),
        };
        let active = serde_json::from_str::<Federation>(&contents)
            .ok()
            .and_then(|federation| {
                Catalog::build(federation.clone())
                    .ok()
                    .map(|catalog| ActiveFederation {
                        federation,
                        catalog: Arc::new(catalog),
                    })
            });

        AppState {
            active: RwLock::new(active),
            pools,
            engine_config,
            config_file,
            default_timeout,
        }
    }

    fn empty(
        config_file: PathBuf,
        pools: Arc<BackendPools>,
        engine_config: Arc<EngineConfig>,
        default_timeout: Option<Duration>,
    ) -> Self {
        AppState {
            active: RwLock::new(None),
            pools,
            engine_config,
            config_file,
            default_timeout,
        }
    }

    /// Builds a throwaway [`FederationEngine`] against whatever catalog is
    /// currently active, for a single query.
    pub async fn engine_for_query(&self) -> Option<FederationEngine> {
        let guard = self.active.read().await;
        guard.as_ref().map(|active| {
            FederationEngine::new(active.catalog.clone(), self.pools.clone(), self.engine_config.clone())
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sparql", get(handlers::sparql::handle).post(handlers::sparql::handle))
        .route(
            "/configure",
            get(handlers::configure::handle).post(handlers::configure::handle),
        )
        .route("/inspect", get(handlers::inspect::handle).post(handlers::inspect::handle))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(16 * 1024 * 1024))
        .with_state(state)
}
