//! # fedqp
//!
//! A federated SPARQL query processor: it takes a single SPARQL query
//! written against a virtual, unified graph and executes it across a
//! heterogeneous set of backends (SPARQL endpoints, SQL databases mapped
//! through RML, MongoDB collections) without materializing the union of
//! their data anywhere.
//!
//! ## Pipeline
//!
//! ```text
//! SPARQL text
//!     |
//! [sparql_parser]            -> AlgebraNode
//!     |
//! [decomposer] (+ catalog)   -> Decomposed (star-shaped sub-queries)
//!     |
//! [logical_plan]             -> LogicalNode (bushy join tree, same-source
//!     |                         stars merged)
//! [physical_plan]            -> Plan (join-operator choice, modifier wrap)
//!     |
//! [execution::engine]        -> spawns one task per plan node, each backed
//!     |                         by [translate] + [backend] at the leaves
//! [service]                  -> drains the result stream into a
//!     |                         `QueryOutcome`
//! [protocol::rest]           -> HTTP JSON envelope
//! ```
//!
//! [`catalog`] is the one piece of state every stage above the parser reads:
//! it describes what RDF classes ("molecules") exist, which data sources
//! provide which predicates, and how to reach each source.

pub mod algebra;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod decomposer;
pub mod error;
pub mod execution;
pub mod logical_plan;
pub mod mapping;
pub mod physical_plan;
pub mod protocol;
pub mod service;
pub mod sparql_parser;
pub mod term;
pub mod translate;

pub use error::{FedQpError, FedQpResult};
pub use service::{FederationEngine, QueryOutcome, Status};
