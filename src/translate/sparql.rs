//! Rewrites a star-shaped sub-query (or a push-down-merged group of them)
//! into a self-contained SPARQL `SELECT` string to send to a remote
//! endpoint, with an optional `LIMIT` injection for bind-join inner
//! services (spec.md §4.3.1 "SPARQL rewriting").
//!
//! The endpoint returns standard SPARQL-JSON results, so unlike
//! [`super::sql`]/[`super::mongo`] this translator's [`ResultTemplate`] only
//! records which variables are projected — the endpoint's own response
//! already carries each binding's `type`/`datatype`/`xml:lang`.

use super::{ResultTemplate, ValueSource, VariablePlan};
use crate::algebra::{BinaryOp, Expr, UnaryOp};
use crate::decomposer::Star;
use crate::term::{BindingType, Term};

pub fn translate(stars: &[Star], limit: Option<u64>) -> (String, ResultTemplate) {
    let mut vars: Vec<String> = stars
        .iter()
        .flat_map(|s| s.triples.iter())
        .flat_map(crate::algebra::TriplePattern::variables)
        .collect();
    vars.sort();
    vars.dedup();

    let mut body = String::new();
    for star in stars {
        for t in &star.triples {
            body.push_str(&format!(
                "{} {} {} .\n",
                t.subject, t.predicate, t.object
            ));
        }
        for f in &star.filters {
            body.push_str(&format!("FILTER({})\n", expr_to_sparql(f)));
        }
    }

    let select_vars = if vars.is_empty() {
        "*".to_string()
    } else {
        vars.iter().map(|v| format!("?{v}")).collect::<Vec<_>>().join(" ")
    };

    let mut query = format!("SELECT {select_vars} WHERE {{\n{body}}}");
    if let Some(limit) = limit {
        query.push_str(&format!("\nLIMIT {limit}"));
    }

    let mut template = ResultTemplate::default();
    for v in vars {
        template.variables.insert(
            v.clone(),
            VariablePlan {
                kind: BindingType::Uri,
                datatype: None,
                source: ValueSource::Field(v),
            },
        );
    }
    (query, template)
}

fn expr_to_sparql(e: &Expr) -> String {
    match e {
        Expr::Term(t) => term_to_sparql(t),
        Expr::Binary { op, left, right } => {
            format!("{} {} {}", expr_to_sparql(left), binary_op_str(*op), expr_to_sparql(right))
        }
        Expr::Unary { op, arg } => match op {
            UnaryOp::Not => format!("!{}", expr_to_sparql(arg)),
            UnaryOp::Neg => format!("-{}", expr_to_sparql(arg)),
        },
        Expr::Call(call) => {
            let args: Vec<String> = call.args.iter().map(expr_to_sparql).collect();
            format!("{}({})", call.name, args.join(", "))
        }
    }
}

fn term_to_sparql(t: &Term) -> String {
    t.to_string()
}

fn binary_op_str(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Eq => "=",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
    }
}
