//! Query Execution Module
//!
//! The non-blocking, pipeline-parallel operator engine (spec.md §2
//! "Execution engine", §4.5, §5 "Concurrency / resource model"):
//! - [`queue`] — bounded channels carrying bindings between operator tasks,
//!   closed (not sentinel-valued) at end-of-stream
//! - [`operators`] — the physical operator tree's runtime implementations
//! - [`engine`] — spawns one tokio task per operator and wires the queues
//! - [`context`] — per-query id, cancellation, and deadline plumbing
//! - Timeout enforcement ([`timeout`]) and resource limits ([`limits`])
//! - Query/result caching ([`cache`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use fedqp::execution::{ExecutionConfig, ResourceLimits};
//! use std::time::Duration;
//!
//! let config = ExecutionConfig::default()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_max_results(100_000);
//! ```

pub mod cache;
pub mod context;
pub mod engine;
mod limits;
pub mod operators;
pub mod queue;
mod timeout;

pub use cache::{CacheEntry, CacheStats, QueryCache};
pub use context::QueryContext;
pub use limits::{MemoryTracker, ResourceError, ResourceLimits};
pub use timeout::{CancelHandle, QueryTimeout, TimeoutError};

use std::time::Duration;

/// Configuration for query execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Query timeout duration (None = no timeout)
    pub timeout: Option<Duration>,

    /// Resource limits
    pub limits: ResourceLimits,

    /// Whether to cache compiled queries
    pub enable_query_cache: bool,

    /// Whether to cache query results
    pub enable_result_cache: bool,

    /// Maximum cache size (number of entries)
    pub max_cache_entries: usize,

    /// Result cache TTL (time-to-live)
    pub result_cache_ttl: Duration,

    /// Bound on each operator's inbound channel (spec.md §5 "bounded
    /// queues" — applies backpressure so a fast producer can't outrun a
    /// slow consumer).
    pub max_queue_depth: usize,

    /// Row count an inner bind-join SERVICE query is raised to internally
    /// (spec.md §4.5 "bind join... raises the per-batch inner LIMIT").
    pub bind_join_raised_limit: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            timeout: Some(Duration::from_secs(30)),
            limits: ResourceLimits::default(),
            enable_query_cache: false,
            enable_result_cache: false,
            max_cache_entries: 256,
            result_cache_ttl: Duration::from_secs(60),
            max_queue_depth: 1024,
            bind_join_raised_limit: 10_000,
        }
    }
}

impl ExecutionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.limits.max_result_size = Some(max);
        self
    }
}

