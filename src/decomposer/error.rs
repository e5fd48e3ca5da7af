//! Source-selection / decomposition failures (spec.md §7 "DecomposeError").

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecomposeError {
    #[error("star-shaped sub-query rooted at '{subject}' matched no RDF molecule template")]
    NoMatchingMolecule { subject: String },

    #[error("star-shaped sub-query rooted at '{subject}' matched molecules but no data source covers its predicates")]
    NoSourceForStar { subject: String },

    #[error("query contains no triple patterns to decompose")]
    EmptyQuery,
}

pub type DecomposeResult<T> = Result<T, DecomposeError>;
