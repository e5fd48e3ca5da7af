//! Top-level error type composing the six-category taxonomy (spec.md §7
//! "Error handling design"): `ParseError`, `ConfigError`, `DecompositionError`,
//! `TranslationError`, `BackendError`, `CancellationError`.
//!
//! Each variant wraps the module-local error it's grounded on; callers that
//! need the fine-grained type (e.g. to decide whether a `UNION` arm should
//! be swallowed) match on the inner error directly. The `/sparql` handler
//! maps this into the HTTP response's `error` field.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FedQpError {
    #[error(transparent)]
    Parse(#[from] crate::sparql_parser::ParseError),

    #[error(transparent)]
    Config(#[from] crate::catalog::error::ConfigError),

    #[error(transparent)]
    Decomposition(#[from] crate::decomposer::error::DecomposeError),

    #[error(transparent)]
    Translation(#[from] crate::translate::error::TranslationError),

    #[error(transparent)]
    Backend(#[from] crate::backend::BackendError),

    #[error("query cancelled: {0}")]
    Cancellation(#[from] crate::execution::TimeoutError),
}

pub type FedQpResult<T> = Result<T, FedQpError>;

impl FedQpError {
    /// Stable machine-readable category, surfaced in the `/sparql` error
    /// JSON body (spec.md §6 "response envelope").
    pub fn category(&self) -> &'static str {
        match self {
            FedQpError::Parse(_) => "ParseError",
            FedQpError::Config(_) => "ConfigError",
            FedQpError::Decomposition(_) => "DecompositionError",
            FedQpError::Translation(_) => "TranslationError",
            FedQpError::Backend(_) => "BackendError",
            FedQpError::Cancellation(_) => "CancellationError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_match_taxonomy() {
        let err: FedQpError = crate::decomposer::error::DecomposeError::EmptyQuery.into();
        assert_eq!(err.category(), "DecompositionError");
    }
}
