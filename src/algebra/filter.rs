//! Filter expression tree: binary/unary operators, term/variable arguments,
//! and SPARQL functional-symbol calls (spec.md §3 "Filter").

use crate::term::Term;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// SPARQL built-in functional symbols used in `FILTER` calls
/// (`bound`, `regex`, `lang`, `datatype`, `str`, `isIRI`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// An expression tree over binary/unary operators, terms/variables, and
/// function calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Term(Term),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Call(FunctionCall),
}

impl Expr {
    pub fn variables(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut HashSet<String>) {
        match self {
            Expr::Term(Term::Variable(v)) => {
                out.insert(v.clone());
            }
            Expr::Term(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Expr::Unary { arg, .. } => arg.collect_variables(out),
            Expr::Call(FunctionCall { args, .. }) => {
                for a in args {
                    a.collect_variables(out);
                }
            }
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::Eq,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_expr_collects_both_sides() {
        let e = Expr::Binary {
            op: BinaryOp::Ge,
            left: Box::new(Expr::Term(Term::variable("t"))),
            right: Box::new(Expr::Term(Term::typed_literal(
                "2021-06-07T17:35:19Z",
                "http://www.w3.org/2001/XMLSchema#dateTime",
            ))),
        };
        let vars = e.variables();
        assert_eq!(vars.len(), 1);
        assert!(vars.contains("t"));
    }

    #[test]
    fn function_call_collects_nested_vars() {
        let e = Expr::Call(FunctionCall {
            name: "bound".into(),
            args: vec![Expr::Term(Term::variable("o"))],
        });
        assert!(e.variables().contains("o"));
    }
}
