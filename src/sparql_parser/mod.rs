//! # SPARQL Parser
//!
//! Lexes and parses a SPARQL query into the [`AlgebraNode`](crate::algebra::AlgebraNode)
//! tree: triple patterns, filters, optional, union, and join blocks
//! (spec.md §2 "SPARQL parser").

mod error;
mod grammar;
mod lexer;

pub use error::ParseError;
pub use grammar::Parser;

use crate::algebra::AlgebraNode;

/// Parse a SPARQL query string into an algebra tree.
pub fn parse_query(source: &str) -> Result<AlgebraNode, ParseError> {
    Parser::parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_passthrough_scenario_parses() {
        // spec.md §8 scenario 1
        let node = parse_query(
            "PREFIX ex: <http://example.org/>
             SELECT ?s ?o WHERE { ?s a ex:C ; ex:p ?o }",
        )
        .unwrap();
        assert!(matches!(node, AlgebraNode::Project { .. }));
    }
}
