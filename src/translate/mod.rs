//! Per-source query compilation: SPARQL endpoint rewriting, RML-backed SQL
//! generation, and JSON-LD-flat Mongo aggregation pipelines
//! (spec.md §2 "Translators").

pub mod error;
pub mod mongo;
pub mod sparql;
pub mod sql;

use crate::term::BindingType;
use std::collections::HashMap;

/// Where a projected variable's value comes from in one result row/document.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// A column alias (SQL) or dotted field path (Mongo) in the raw result.
    Field(String),
    /// The value is already known at plan time (e.g. `rdf:type` pinned by a
    /// subject's molecule), not carried in the row at all.
    Constant(String),
}

/// How a backend wrapper should turn one raw row/document field into a
/// [`crate::term::BoundValue`] (spec.md §4.6 "Result template").
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePlan {
    pub kind: BindingType,
    pub datatype: Option<String>,
    pub source: ValueSource,
}

/// Per-variable binding plan produced by a translator, consumed by the
/// matching backend wrapper when it maps rows/documents to bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTemplate {
    pub variables: HashMap<String, VariablePlan>,
}

impl ResultTemplate {
    pub fn merge(&mut self, other: ResultTemplate) {
        self.variables.extend(other.variables);
    }
}
