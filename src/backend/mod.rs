//! Backend wrappers: the leaf-level code that actually talks to a SPARQL
//! endpoint, a SQL database, or a MongoDB collection and turns rows/documents
//! into [`Binding`]s (spec.md §4.6 "Backend Wrappers").
//!
//! Every wrapper implements the same contract: windowed pagination
//! (`limit`/`offset`, stopping once a window returns fewer rows than
//! `limit`), per-row mapping through a [`ResultTemplate`], and pushing `EOF`
//! (closing the outbound queue) on completion or fatal error. Connections
//! are pooled per data source and shared across queries (spec.md §5
//! "Shared-resource policy").

pub mod mongo_wrapper;
pub mod sparql_wrapper;
pub mod sql_wrapper;

use crate::catalog::DataSourceId;
use crate::execution::queue::BindingSender;
use dashmap::DashMap;
use percent_encoding::{AsciiSet, CONTROLS};
use thiserror::Error;

const IRI_ESCAPES: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`').add(b'\\').add(b'{').add(b'}');

/// Failures a backend wrapper can surface (spec.md §7 "BackendError —
/// connection / auth / query failure"). Never propagated as a panic; the
/// leaf task maps any of these into an immediate queue close.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connecting to data source '{0}' failed: {1}")]
    Connection(DataSourceId, String),

    #[error("query against data source '{0}' failed: {1}")]
    Query(DataSourceId, String),

    #[error("http request to SPARQL endpoint '{0}' failed: {1}")]
    Http(DataSourceId, #[source] reqwest::Error),

    #[error("malformed response from data source '{0}': {1}")]
    MalformedResponse(DataSourceId, String),

    #[error("sql backend error on data source '{0}': {1}")]
    Sql(DataSourceId, #[source] sqlx::Error),

    #[error("mongo backend error on data source '{0}': {1}")]
    Mongo(DataSourceId, #[source] mongodb::error::Error),
}

/// Connection pools keyed by [`DataSourceId`], built lazily and cached for
/// the process lifetime (spec.md §5 "Backend connection pooling").
/// `Catalog` stays an immutable, read-only snapshot; this is its runtime
/// companion, held separately by the server/engine so the catalog itself
/// never needs interior mutability.
#[derive(Default)]
pub struct BackendPools {
    sql: DashMap<DataSourceId, sqlx::AnyPool>,
    mongo: DashMap<DataSourceId, mongodb::Client>,
    http: reqwest::Client,
}

impl BackendPools {
    pub fn new() -> Self {
        BackendPools {
            sql: DashMap::new(),
            mongo: DashMap::new(),
            http: reqwest::Client::new(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns the pool for `source`, establishing and caching it on first
    /// use (spec.md §5 "built lazily and cached").
    pub async fn sql_pool(&self, source: &DataSourceId, url: &str) -> Result<sqlx::AnyPool, BackendError> {
        if let Some(pool) = self.sql.get(source) {
            return Ok(pool.clone());
        }
        sqlx::any::install_default_drivers();
        let pool = sqlx::AnyPool::connect(url)
            .await
            .map_err(|e| BackendError::Connection(source.clone(), e.to_string()))?;
        self.sql.insert(source.clone(), pool.clone());
        Ok(pool)
    }

    pub async fn mongo_client(&self, source: &DataSourceId, url: &str) -> Result<mongodb::Client, BackendError> {
        if let Some(client) = self.mongo.get(source) {
            return Ok(client.clone());
        }
        let client = mongodb::Client::with_uri_str(url)
            .await
            .map_err(|e| BackendError::Connection(source.clone(), e.to_string()))?;
        self.mongo.insert(source.clone(), client.clone());
        Ok(client)
    }
}

/// Shared plumbing every wrapper's `execute` loop uses: push through
/// `queue`, stop immediately once the consumer has disappeared or the query
/// context is cancelled.
pub(crate) async fn push_or_stop(
    queue: &BindingSender,
    binding: crate::execution::queue::Binding,
    ctx: &crate::execution::context::QueryContext,
) -> bool {
    if ctx.is_cancelled() {
        return false;
    }
    queue.send(binding).await.is_ok()
}

/// Size of one pagination window when a leaf has no tighter row cap
/// (spec.md §4.6 "Pagination... repeated windowed fetches of size limit").
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Clamps the window size for one pagination round to whatever budget is
/// left under an optional overall row cap.
pub(crate) fn window_size(page_size: u64, cap: Option<u64>, already_emitted: u64) -> Option<u64> {
    match cap {
        Some(cap) if already_emitted >= cap => None,
        Some(cap) => Some(page_size.min(cap - already_emitted)),
        None => Some(page_size),
    }
}

/// Turns one raw scalar value off the wire (a SQL column, a Mongo document
/// field, or an already-typed SPARQL-JSON binding) into a [`BoundValue`],
/// per spec.md §4.6's mapping rule. Returns `None` for the literal string
/// `"null"` or the empty string, which the wrapper must skip rather than
/// bind (spec.md §4.6 "skipping rows whose value is the literal string
/// `null` or the empty string").
pub(crate) fn bind_scalar(
    kind: crate::term::BindingType,
    raw: &str,
    datatype: Option<&str>,
    language: Option<&str>,
    source: &str,
) -> Option<crate::term::BoundValue> {
    use crate::term::{BindingType, BoundValue};

    if raw.is_empty() || raw == "null" {
        return None;
    }

    let value = match kind {
        // Escape only what isn't legal inside an IRI reference (whitespace,
        // quotes, angle brackets); leave `:`, `/`, `#`, `?` untouched so
        // already-valid IRIs pass through unchanged.
        BindingType::Uri => percent_encoding::utf8_percent_encode(raw, IRI_ESCAPES).to_string(),
        BindingType::Bnode => {
            if let Some(stripped) = raw.strip_prefix("_:") {
                stripped.to_string()
            } else {
                raw.to_string()
            }
        }
        BindingType::Literal => raw.to_string(),
    };

    Some(BoundValue {
        ty: kind,
        value,
        datatype: datatype.map(String::from),
        language: language.map(String::from),
        source: vec![source.to_string()],
    })
}
