//! SPARQL algebra: triple patterns, filter expressions, and the algebra
//! tree produced by the parser (spec.md §3 "Algebra node").

mod filter;

pub use filter::{BinaryOp, Expr, FunctionCall, UnaryOp};

use crate::term::Term;
use std::collections::HashSet;

/// `(subject, predicate, object)` of RDF terms; any position may be a
/// variable (spec.md §3 "Triple pattern").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        TriplePattern {
            subject,
            predicate,
            object,
        }
    }

    /// Variables appearing anywhere in this pattern.
    pub fn variables(&self) -> Vec<String> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(|t| t.as_variable().map(str::to_string))
            .collect()
    }

    /// True when the predicate is `rdf:type` (or its `a` shorthand already
    /// expanded by the parser) and the object is a constant IRI — contributes
    /// an explicit type hint to its star (spec.md §4.1 "SSQ formation").
    pub fn is_type_statement(&self) -> bool {
        self.predicate.as_iri() == Some(RDF_TYPE) && matches!(self.object, Term::Iri(_))
    }

    /// Count of constant (non-variable) term positions, used by the
    /// selectivity heuristic (spec.md §4.4 "high-selective").
    pub fn constant_positions(&self) -> usize {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter(|t| t.is_constant())
            .count()
    }
}

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Query form carried by a `Project` node's modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Select,
    Construct,
    Ask,
}

/// Projection / result modifiers attached to the outermost `Project` node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifiers {
    pub distinct: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// (variable, descending) pairs. Executed as a post-hoc in-memory sort
    /// over the merged stream — see SPEC_FULL.md §4 "ORDER BY".
    pub order_by: Vec<(String, bool)>,
}

/// A SPARQL algebra tree node (spec.md §3 "Algebra node").
#[derive(Debug, Clone, PartialEq)]
pub enum AlgebraNode {
    Bgp {
        triples: Vec<TriplePattern>,
        filters: Vec<Expr>,
    },
    Union(Vec<AlgebraNode>),
    Join(Vec<AlgebraNode>),
    Optional {
        required: Box<AlgebraNode>,
        optional: Box<AlgebraNode>,
    },
    Project {
        vars: Vec<String>,
        child: Box<AlgebraNode>,
        modifiers: Modifiers,
        form: QueryForm,
        /// Present only when `form == Construct`.
        template: Vec<TriplePattern>,
    },
}

impl AlgebraNode {
    /// All variables that could be bound by evaluating this node, excluding
    /// variables only inside `OPTIONAL` — used for filter placement.
    pub fn variables(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut HashSet<String>) {
        match self {
            AlgebraNode::Bgp { triples, .. } => {
                for t in triples {
                    out.extend(t.variables());
                }
            }
            AlgebraNode::Union(children) | AlgebraNode::Join(children) => {
                for c in children {
                    c.collect_variables(out);
                }
            }
            AlgebraNode::Optional { required, optional } => {
                required.collect_variables(out);
                optional.collect_variables(out);
            }
            AlgebraNode::Project { child, .. } => child.collect_variables(out),
        }
    }

    /// True when this node (and all descendants) contain no triples,
    /// filters, or children — used for the `Union(A, ∅) ≡ A`,
    /// `Join(A, ∅) ≡ ∅` round-trip laws (spec.md §8).
    pub fn is_empty(&self) -> bool {
        match self {
            AlgebraNode::Bgp { triples, filters } => triples.is_empty() && filters.is_empty(),
            AlgebraNode::Union(children) | AlgebraNode::Join(children) => children.is_empty(),
            AlgebraNode::Optional { .. } => false,
            AlgebraNode::Project { child, .. } => child.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(s: &str, p: &str, o: Term) -> TriplePattern {
        TriplePattern::new(Term::variable(s), Term::iri(p), o)
    }

    #[test]
    fn type_statement_detection() {
        let t = tp("x", RDF_TYPE, Term::iri("http://example.org/C"));
        assert!(t.is_type_statement());

        let t2 = tp("x", "http://example.org/p", Term::variable("y"));
        assert!(!t2.is_type_statement());
    }

    #[test]
    fn constant_positions_count() {
        let t = TriplePattern::new(
            Term::iri("http://example.org/s"),
            Term::iri("http://example.org/p"),
            Term::variable("o"),
        );
        assert_eq!(t.constant_positions(), 2);
    }

    #[test]
    fn bgp_variables_union() {
        let bgp = AlgebraNode::Bgp {
            triples: vec![
                tp("x", "http://example.org/p", Term::variable("y")),
                tp("y", "http://example.org/q", Term::variable("z")),
            ],
            filters: vec![],
        };
        let vars = bgp.variables();
        assert_eq!(vars.len(), 3);
        assert!(vars.contains("x") && vars.contains("y") && vars.contains("z"));
    }

    #[test]
    fn empty_bgp_is_empty() {
        let bgp = AlgebraNode::Bgp {
            triples: vec![],
            filters: vec![],
        };
        assert!(bgp.is_empty());
    }
}
