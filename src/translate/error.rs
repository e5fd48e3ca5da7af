//! Translation failures shared across SPARQL rewriting, RML-to-SQL, and
//! Mongo aggregation-pipeline generation (spec.md §7 "TranslationError").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("no RML mapping found backing predicate(s) of star '{subject}' on data source '{datasource}'")]
    NoMappingForStar { subject: String, datasource: String },

    #[error("data source kind '{0:?}' has no translator implemented")]
    UnsupportedKind(crate::catalog::DataSourceKind),

    #[error("unsupported filter expression for this backend: {0}")]
    UnsupportedExpression(String),

    #[error("reference-object join referenced unknown parent triple map {0:?}")]
    UnknownParentTripleMap(crate::mapping::TripleMapId),
}

pub type TranslationResult<T> = Result<T, TranslationError>;
