//! Parser error type (spec.md §7 "ParseError").

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("unexpected token {found:?} at position {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        pos: usize,
        expected: String,
    },

    #[error("unknown prefix '{0}' in prefixed name")]
    UnknownPrefix(String),

    #[error("malformed IRI or literal: {0}")]
    MalformedTerm(String),

    #[error("multi-graph dataset clauses (FROM / FROM NAMED / GRAPH) are not supported")]
    GraphClauseUnsupported,

    #[error("unsupported query construct: {0}")]
    Unsupported(String),
}
