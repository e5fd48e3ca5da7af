//! Catalog / federation configuration errors (spec.md §7 "ConfigError").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read federation config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse federation config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "molecule '{molecule}' data source '{source}' predicate_sources contains predicate \
         '{predicate}' not present in molecule.predicates"
    )]
    PredicateSourceNotInPredicates {
        molecule: String,
        source: String,
        predicate: String,
    },

    #[error("molecule '{molecule}' predicate '{predicate}' has range '{range}' which is neither a known XSD datatype nor a declared mt_id")]
    DanglingRange {
        molecule: String,
        predicate: String,
        range: String,
    },

    #[error("data source '{0}' referenced by a molecule is not declared in federation.sources")]
    UnknownDataSource(String),

    #[error("no federation config available")]
    NotConfigured,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
