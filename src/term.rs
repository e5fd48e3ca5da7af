//! RDF term model: IRIs, blank nodes, literals, and query variables.
//!
//! Mirrors the term shapes used throughout the SPARQL algebra, the RML
//! mapping model, and the wire-level binding format returned to clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute or prefixed IRI. Prefix expansion happens in the parser;
/// by the time a `Term::Iri` reaches the decomposer it is always absolute.
pub type Iri = String;

/// A single RDF term appearing in a triple pattern, filter argument, or
/// binding value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Term {
    Iri(Iri),
    BlankNode(String),
    Literal {
        lexical: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<Iri>,
        #[serde(default, skip_serializing_if = "Option::is_none", rename = "lang")]
        language: Option<String>,
    },
    Variable(String),
}

impl Term {
    pub fn iri(s: impl Into<String>) -> Self {
        Term::Iri(s.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn plain_literal(lexical: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    /// A term is constant when it is not a variable (spec.md §3: "A term is
    /// *constant* when it is not a variable").
    pub fn is_constant(&self) -> bool {
        !matches!(self, Term::Variable(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(i) => Some(i),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::BlankNode(id) => write!(f, "_:{id}"),
            Term::Literal {
                lexical,
                datatype,
                language,
            } => {
                write!(f, "\"{lexical}\"")?;
                if let Some(lang) = language {
                    write!(f, "@{lang}")?;
                } else if let Some(dt) = datatype {
                    write!(f, "^^<{dt}>")?;
                }
                Ok(())
            }
            Term::Variable(name) => write!(f, "?{name}"),
        }
    }
}

/// The RDF binding shape a backend wrapper must populate per variable
/// (spec.md §3 "Tuple / binding" and §4.6 "Result template").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingType {
    Uri,
    Bnode,
    Literal,
}

/// One bound value inside a result row, shaped for SPARQL-JSON output
/// (spec.md §6 result JSON shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundValue {
    #[serde(rename = "type")]
    pub ty: BindingType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Iri>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "xml:lang")]
    pub language: Option<String>,
    /// Which data source(s) contributed this value; used for provenance and
    /// by `Union`/join operators that need to merge source tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
}

impl BoundValue {
    pub fn uri(value: impl Into<String>, source: impl Into<String>) -> Self {
        BoundValue {
            ty: BindingType::Uri,
            value: value.into(),
            datatype: None,
            language: None,
            source: vec![source.into()],
        }
    }

    pub fn literal(value: impl Into<String>, source: impl Into<String>) -> Self {
        BoundValue {
            ty: BindingType::Literal,
            value: value.into(),
            datatype: None,
            language: None,
            source: vec![source.into()],
        }
    }

    pub fn with_datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }
}
