//! HTTP protocol layer.
//!
//! ```text
//! GET/POST /sparql     execute a SPARQL query against the active federation
//! GET/POST /configure   replace the active federation
//! GET/POST /inspect     read back the active federation
//! ```
//!
//! (spec.md §6 "HTTP surface"). All three endpoints answer with HTTP 200
//! and carry success/failure in the JSON body's `error` field, matching
//! the upstream service this crate federates queries for.

pub mod rest;
