//! Runtime implementations of each [`crate::physical_plan::OpKind`]
//! (spec.md §4.5 "Symmetric hash join algorithm" / "Bind hash join
//! algorithm"). Each `run_*` function owns one operator's task body: it
//! reads from its input queue(s) and writes to its output queue until
//! `EOF` (a closed channel) or cancellation.
//!
//! `BindHashJoin` and the dependent form of `Optional` are not here — both
//! need to re-spawn a cloned subtree of the plan per outer binding, which
//! requires the recursive plan-spawning entry point in [`super::engine`].
//! Everything in this module only ever consumes already-spawned receivers.

use super::context::QueryContext;
use super::queue::{Binding, BindingReceiver, BindingSender};
use crate::algebra::{BinaryOp, Expr, FunctionCall, TriplePattern, UnaryOp};
use crate::term::{BindingType, BoundValue, Term};
use std::collections::HashMap;

/// Encodes the bound values of `vars` in a binding into a single string key
/// for hash-join matching. `None` means at least one join variable is
/// unbound in this row, so it cannot participate in the join.
pub(crate) fn join_key(binding: &Binding, vars: &[String]) -> Option<String> {
    let mut parts = Vec::with_capacity(vars.len());
    for v in vars {
        let bv = binding.get(v)?;
        parts.push(format!("{v}\u{1}{}\u{1}{}", bv.ty as u8, bv.value));
    }
    Some(parts.join("\u{2}"))
}

/// Unions two bindings that matched on their join key; shared variables
/// keep the left value but accumulate the right's provenance.
pub(crate) fn merge_bindings(mut left: Binding, right: &Binding) -> Binding {
    for (var, rv) in right {
        match left.get_mut(var) {
            Some(lv) => {
                for s in &rv.source {
                    if !lv.source.contains(s) {
                        lv.source.push(s.clone());
                    }
                }
            }
            None => {
                left.insert(var.clone(), rv.clone());
            }
        }
    }
    left
}

fn intersecting_vars(left_vars: &[String], right_vars: &[String]) -> Vec<String> {
    let mut out: Vec<String> = left_vars
        .iter()
        .filter(|v| right_vars.contains(v))
        .cloned()
        .collect();
    out.sort();
    out
}

/// Two-hash-table symmetric join (spec.md §4.5): on a tuple from one side,
/// probe the other side's table and emit matches, then insert into this
/// side's own table. Propagates `EOF` (closes `out`) once both sides have
/// closed.
pub async fn run_symmetric_hash_join(
    mut left: BindingReceiver,
    mut right: BindingReceiver,
    left_vars: Vec<String>,
    right_vars: Vec<String>,
    out: BindingSender,
    ctx: QueryContext,
) {
    let join_vars = intersecting_vars(&left_vars, &right_vars);
    let mut left_table: HashMap<String, Vec<Binding>> = HashMap::new();
    let mut right_table: HashMap<String, Vec<Binding>> = HashMap::new();
    let mut left_open = true;
    let mut right_open = true;

    while left_open || right_open {
        if ctx.is_cancelled() {
            return;
        }
        tokio::select! {
            l = left.recv(), if left_open => {
                match l {
                    Some(b) => {
                        if let Some(key) = join_key(&b, &join_vars) {
                            if let Some(matches) = right_table.get(&key) {
                                for r in matches {
                                    if !out.send(merge_bindings(b.clone(), r)).await.is_ok() {
                                        return;
                                    }
                                }
                            }
                            left_table.entry(key).or_default().push(b);
                        }
                    }
                    None => left_open = false,
                }
            }
            r = right.recv(), if right_open => {
                match r {
                    Some(b) => {
                        if let Some(key) = join_key(&b, &join_vars) {
                            if let Some(matches) = left_table.get(&key) {
                                for l in matches {
                                    if out.send(merge_bindings(l.clone(), &b)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            right_table.entry(key).or_default().push(b);
                        }
                    }
                    None => right_open = false,
                }
            }
        }
    }
}

/// Buffers both legs to completion, then emits every required row joined
/// with its optional matches, or alone when no optional row shares its key
/// (spec.md §4.4 "OptionalJoin"). Streaming left-outer emission without
/// materializing the optional side first is underspecified by the source
/// (spec.md §9 design notes); buffering keeps the "every `?s` appears at
/// least once" invariant trivially true regardless of arrival order.
pub async fn run_optional(
    mut required: BindingReceiver,
    mut optional: BindingReceiver,
    required_vars: Vec<String>,
    optional_vars: Vec<String>,
    out: BindingSender,
    ctx: QueryContext,
) {
    let join_vars = intersecting_vars(&required_vars, &optional_vars);

    let mut optional_table: HashMap<String, Vec<Binding>> = HashMap::new();
    while let Some(b) = optional.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        if let Some(key) = join_key(&b, &join_vars) {
            optional_table.entry(key).or_default().push(b);
        }
    }

    while let Some(b) = required.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        let matches = join_key(&b, &join_vars).and_then(|k| optional_table.get(&k));
        match matches {
            Some(rows) if !rows.is_empty() => {
                for r in rows {
                    if out.send(merge_bindings(b.clone(), r)).await.is_err() {
                        return;
                    }
                }
            }
            _ => {
                if out.send(b).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Forwards every binding from every arm, unchanged (spec.md §4.4 "no
/// duplicates suppressed unless the query is `SELECT DISTINCT`").
pub async fn run_union(mut arms: Vec<BindingReceiver>, out: BindingSender, ctx: QueryContext) {
    while !arms.is_empty() {
        if ctx.is_cancelled() {
            return;
        }
        let mut finished = Vec::new();
        for (i, arm) in arms.iter_mut().enumerate() {
            match arm.recv().await {
                Some(b) => {
                    if out.send(b).await.is_err() {
                        return;
                    }
                }
                None => finished.push(i),
            }
        }
        for i in finished.into_iter().rev() {
            arms.remove(i);
        }
    }
}

/// Result of evaluating a `FILTER` (sub)expression against one binding.
/// `None`-like cases are split by *reason*, because they're handled
/// differently: a variable the BGP never bound makes the filter reject the
/// row (spec.md §8 "A SPARQL filter referencing a variable never bound by
/// the BGP — zero bindings"), while a functional form this evaluator
/// doesn't implement is left for the translator/post-fetch fallback and
/// must not reject the row on its own (spec.md §9 "Filter evaluation
/// fallback").
#[derive(Debug, Clone, PartialEq)]
enum EvalOutcome {
    Value(EvalValue),
    Unbound,
    Unsupported,
}

impl EvalOutcome {
    /// Whether `run_filter` should keep the row: a truthy value keeps it,
    /// an unbound variable drops it, and an unsupported form keeps it
    /// (deferred to post-fetch evaluation).
    fn keep_row(&self) -> bool {
        match self {
            EvalOutcome::Value(v) => v.truthy(),
            EvalOutcome::Unbound => false,
            EvalOutcome::Unsupported => true,
        }
    }
}

fn term_value(binding: &Binding, term: &Term) -> EvalOutcome {
    match term {
        Term::Variable(v) => binding
            .get(v)
            .map(|bv| EvalOutcome::Value(EvalValue::from_bound(bv)))
            .unwrap_or(EvalOutcome::Unbound),
        Term::Iri(i) => EvalOutcome::Value(EvalValue::Str(i.clone())),
        Term::BlankNode(b) => EvalOutcome::Value(EvalValue::Str(b.clone())),
        Term::Literal { lexical, .. } => EvalOutcome::Value(EvalValue::from_lexical(lexical)),
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum EvalValue {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl EvalValue {
    fn from_bound(bv: &BoundValue) -> Self {
        Self::from_lexical(&bv.value)
    }

    fn from_lexical(lexical: &str) -> Self {
        if let Ok(n) = lexical.parse::<f64>() {
            EvalValue::Num(n)
        } else if let Ok(b) = lexical.parse::<bool>() {
            EvalValue::Bool(b)
        } else {
            EvalValue::Str(lexical.to_string())
        }
    }

    fn truthy(&self) -> bool {
        match self {
            EvalValue::Bool(b) => *b,
            EvalValue::Num(n) => *n != 0.0,
            EvalValue::Str(s) => !s.is_empty(),
        }
    }
}

fn eval_function(call: &FunctionCall, binding: &Binding) -> EvalOutcome {
    match call.name.as_str() {
        "bound" => match call.args.first() {
            Some(Expr::Term(Term::Variable(v))) => EvalOutcome::Value(EvalValue::Bool(binding.contains_key(v))),
            _ => EvalOutcome::Unsupported,
        },
        "str" => match call.args.first() {
            Some(a) => match eval_expr(a, binding) {
                EvalOutcome::Value(v) => EvalOutcome::Value(EvalValue::Str(match v {
                    EvalValue::Str(s) => s,
                    EvalValue::Num(n) => n.to_string(),
                    EvalValue::Bool(b) => b.to_string(),
                })),
                other => other,
            },
            None => EvalOutcome::Unsupported,
        },
        _ => EvalOutcome::Unsupported,
    }
}

/// `AND`'s identity is `true`: a side this evaluator can't resolve
/// (unbound variable or unsupported function) doesn't force the result,
/// it defers to the other side — unless that side is already `false`.
fn combine_and(l: EvalOutcome, r: EvalOutcome) -> EvalOutcome {
    match (l, r) {
        (EvalOutcome::Value(lv), _) if !lv.truthy() => EvalOutcome::Value(EvalValue::Bool(false)),
        (_, EvalOutcome::Value(rv)) if !rv.truthy() => EvalOutcome::Value(EvalValue::Bool(false)),
        (EvalOutcome::Unbound, _) | (_, EvalOutcome::Unbound) => EvalOutcome::Unbound,
        (EvalOutcome::Unsupported, _) | (_, EvalOutcome::Unsupported) => EvalOutcome::Unsupported,
        (EvalOutcome::Value(_), EvalOutcome::Value(_)) => EvalOutcome::Value(EvalValue::Bool(true)),
    }
}

/// `OR`'s identity is `false`: mirrors [`combine_and`], short-circuiting on
/// a `true` side instead of a `false` one.
fn combine_or(l: EvalOutcome, r: EvalOutcome) -> EvalOutcome {
    match (l, r) {
        (EvalOutcome::Value(lv), _) if lv.truthy() => EvalOutcome::Value(EvalValue::Bool(true)),
        (_, EvalOutcome::Value(rv)) if rv.truthy() => EvalOutcome::Value(EvalValue::Bool(true)),
        (EvalOutcome::Unsupported, _) | (_, EvalOutcome::Unsupported) => EvalOutcome::Unsupported,
        _ => EvalOutcome::Value(EvalValue::Bool(false)),
    }
}

/// Evaluates a `FILTER` expression against one binding. This stays the
/// engine's fallback evaluator, applied whether or not a translator already
/// pushed the same filter down to its backend.
fn eval_expr(expr: &Expr, binding: &Binding) -> EvalOutcome {
    match expr {
        Expr::Term(t) => term_value(binding, t),
        Expr::Unary { op: UnaryOp::Not, arg } => match eval_expr(arg, binding) {
            EvalOutcome::Value(v) => EvalOutcome::Value(EvalValue::Bool(!v.truthy())),
            other => other,
        },
        Expr::Unary { op: UnaryOp::Neg, arg } => match eval_expr(arg, binding) {
            EvalOutcome::Value(EvalValue::Num(n)) => EvalOutcome::Value(EvalValue::Num(-n)),
            other => other,
        },
        Expr::Call(call) => eval_function(call, binding),
        Expr::Binary { op: BinaryOp::And, left, right } => {
            combine_and(eval_expr(left, binding), eval_expr(right, binding))
        }
        Expr::Binary { op: BinaryOp::Or, left, right } => {
            combine_or(eval_expr(left, binding), eval_expr(right, binding))
        }
        Expr::Binary { op, left, right } => match (eval_expr(left, binding), eval_expr(right, binding)) {
            (EvalOutcome::Value(l), EvalOutcome::Value(r)) => {
                eval_comparison(*op, &l, &r).map_or(EvalOutcome::Unsupported, EvalOutcome::Value)
            }
            (EvalOutcome::Unbound, _) | (_, EvalOutcome::Unbound) => EvalOutcome::Unbound,
            _ => EvalOutcome::Unsupported,
        },
    }
}

fn eval_comparison(op: BinaryOp, l: &EvalValue, r: &EvalValue) -> Option<EvalValue> {
    let ordering = match (l, r) {
        (EvalValue::Num(a), EvalValue::Num(b)) => a.partial_cmp(b),
        (EvalValue::Str(a), EvalValue::Str(b)) => Some(a.cmp(b)),
        (EvalValue::Bool(a), EvalValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match op {
        BinaryOp::Eq => Some(EvalValue::Bool(l == r)),
        BinaryOp::Ne => Some(EvalValue::Bool(l != r)),
        BinaryOp::Lt => ordering.map(|o| EvalValue::Bool(o.is_lt())),
        BinaryOp::Le => ordering.map(|o| EvalValue::Bool(o.is_le())),
        BinaryOp::Gt => ordering.map(|o| EvalValue::Bool(o.is_gt())),
        BinaryOp::Ge => ordering.map(|o| EvalValue::Bool(o.is_ge())),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (EvalValue::Num(a), EvalValue::Num(b)) = (l, r) else {
                return None;
            };
            Some(EvalValue::Num(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => unreachable!(),
            }))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled by short-circuit arms above"),
    }
}

pub async fn run_filter(mut input: BindingReceiver, expr: Expr, out: BindingSender, ctx: QueryContext) {
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        let keep = eval_expr(&expr, &b).keep_row();
        if keep && out.send(b).await.is_err() {
            return;
        }
    }
}

pub async fn run_project(mut input: BindingReceiver, vars: Vec<String>, out: BindingSender, ctx: QueryContext) {
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        let projected: Binding = b.into_iter().filter(|(k, _)| vars.contains(k)).collect();
        if out.send(projected).await.is_err() {
            return;
        }
    }
}

pub async fn run_distinct(mut input: BindingReceiver, out: BindingSender, ctx: QueryContext) {
    let mut seen = std::collections::HashSet::new();
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        let mut vars: Vec<&String> = b.keys().collect();
        vars.sort();
        let key = join_key(&b, &vars.into_iter().cloned().collect::<Vec<_>>());
        let fingerprint = key.unwrap_or_default();
        if seen.insert(fingerprint) && out.send(b).await.is_err() {
            return;
        }
    }
}

/// `ORDER BY` is a post-hoc in-memory sort over the merged stream (spec.md
/// §9 "ORDER BY" resolution in DESIGN.md) — it must drain its input fully
/// before emitting anything, unlike every other operator here.
pub async fn run_order_by(mut input: BindingReceiver, keys: Vec<(String, bool)>, out: BindingSender, ctx: QueryContext) {
    let mut rows = Vec::new();
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        rows.push(b);
    }
    rows.sort_by(|a, b| {
        for (var, desc) in &keys {
            let av = a.get(var).map(|v| v.value.as_str()).unwrap_or("");
            let bv = b.get(var).map(|v| v.value.as_str()).unwrap_or("");
            let ord = av.cmp(bv);
            if ord != std::cmp::Ordering::Equal {
                return if *desc { ord.reverse() } else { ord };
            }
        }
        std::cmp::Ordering::Equal
    });
    for row in rows {
        if out.send(row).await.is_err() {
            return;
        }
    }
}

pub async fn run_offset(mut input: BindingReceiver, n: u64, out: BindingSender, ctx: QueryContext) {
    let mut skipped = 0u64;
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        if skipped < n {
            skipped += 1;
            continue;
        }
        if out.send(b).await.is_err() {
            return;
        }
    }
}

/// Cancels the whole query tree once `n` rows have been emitted (spec.md
/// §8 scenario 6 "Early limit" — "cancels the leaf after 5 are emitted").
pub async fn run_limit(mut input: BindingReceiver, n: u64, out: BindingSender, ctx: QueryContext) {
    if n == 0 {
        ctx.cancel();
        return;
    }
    let mut emitted = 0u64;
    while let Some(b) = input.recv().await {
        if out.send(b).await.is_err() {
            return;
        }
        emitted += 1;
        if emitted >= n {
            ctx.cancel();
            return;
        }
    }
}

fn instantiate_term(term: &Term, binding: &Binding) -> Option<BoundValue> {
    match term {
        Term::Variable(v) => binding.get(v).cloned(),
        Term::Iri(i) => Some(BoundValue {
            ty: BindingType::Uri,
            value: i.clone(),
            datatype: None,
            language: None,
            source: vec![],
        }),
        Term::BlankNode(b) => Some(BoundValue {
            ty: BindingType::Bnode,
            value: b.clone(),
            datatype: None,
            language: None,
            source: vec![],
        }),
        Term::Literal { lexical, datatype, language } => Some(BoundValue {
            ty: BindingType::Literal,
            value: lexical.clone(),
            datatype: datatype.clone(),
            language: language.clone(),
            source: vec![],
        }),
    }
}

/// Instantiates each template triple against every input binding (spec.md
/// SPEC_FULL §4 supplements, "CONSTRUCT... instantiates the template
/// against each binding"). Each produced triple is represented as a
/// three-variable binding (`subject`/`predicate`/`object`) rather than a
/// fourth term shape, reusing the same wire type the rest of the engine
/// already carries.
pub async fn run_construct(
    mut input: BindingReceiver,
    template: Vec<TriplePattern>,
    out: BindingSender,
    ctx: QueryContext,
) {
    while let Some(b) = input.recv().await {
        if ctx.is_cancelled() {
            return;
        }
        for pattern in &template {
            let (Some(s), Some(p), Some(o)) = (
                instantiate_term(&pattern.subject, &b),
                instantiate_term(&pattern.predicate, &b),
                instantiate_term(&pattern.object, &b),
            ) else {
                continue;
            };
            let mut triple = Binding::new();
            triple.insert("subject".to_string(), s);
            triple.insert("predicate".to_string(), p);
            triple.insert("object".to_string(), o);
            if out.send(triple).await.is_err() {
                return;
            }
        }
    }
}

/// `ASK` short-circuits on the first binding: emits one row under a
/// reserved `__ask` key and cancels the rest of the tree (spec.md
/// SPEC_FULL §4 supplements).
pub async fn run_ask(mut input: BindingReceiver, out: BindingSender, ctx: QueryContext) {
    let answer = input.recv().await.is_some();
    if answer {
        ctx.cancel();
    }
    let mut row = Binding::new();
    row.insert(
        "__ask".to_string(),
        BoundValue {
            ty: BindingType::Literal,
            value: answer.to_string(),
            datatype: Some("http://www.w3.org/2001/XMLSchema#boolean".to_string()),
            language: None,
            source: vec![],
        },
    );
    let _ = out.send(row).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::queue::bounded;

    fn bv(v: &str) -> BoundValue {
        BoundValue::literal(v, "test")
    }

    #[test]
    fn join_key_is_none_when_var_unbound() {
        let mut b = Binding::new();
        b.insert("x".to_string(), bv("1"));
        assert!(join_key(&b, &["y".to_string()]).is_none());
        assert!(join_key(&b, &["x".to_string()]).is_some());
    }

    #[test]
    fn merge_bindings_unions_provenance() {
        let mut left = Binding::new();
        left.insert("x".to_string(), BoundValue::uri("http://ex.org/1", "E1"));
        let mut right = Binding::new();
        right.insert("x".to_string(), BoundValue::uri("http://ex.org/1", "E2"));
        right.insert("y".to_string(), bv("2"));
        let merged = merge_bindings(left.clone(), &right);
        assert_eq!(merged["x"].source, vec!["E1".to_string(), "E2".to_string()]);
        assert!(merged.contains_key("y"));
    }

    #[tokio::test]
    async fn symmetric_join_emits_matches_from_both_directions() {
        let (ltx, lrx) = bounded(8);
        let (rtx, rrx) = bounded(8);
        let (otx, mut orx) = bounded(8);
        let ctx = QueryContext::new(None);

        let mut left_row = Binding::new();
        left_row.insert("y".to_string(), bv("k1"));
        ltx.send(left_row).await.unwrap();
        drop(ltx);

        let mut right_row = Binding::new();
        right_row.insert("y".to_string(), bv("k1"));
        right_row.insert("z".to_string(), bv("hello"));
        rtx.send(right_row).await.unwrap();
        drop(rtx);

        run_symmetric_hash_join(lrx, rrx, vec!["y".into()], vec!["y".into(), "z".into()], otx, ctx).await;

        let joined = orx.recv().await.unwrap();
        assert_eq!(joined["z"].value, "hello");
        assert!(orx.recv().await.is_none());
    }

    #[tokio::test]
    async fn optional_preserves_unmatched_required_rows() {
        let (rtx, rrx) = bounded(8);
        let (otx_opt, orx_opt) = bounded(8);
        let (out_tx, mut out_rx) = bounded(8);
        let ctx = QueryContext::new(None);

        let mut required_row = Binding::new();
        required_row.insert("s".to_string(), bv("s1"));
        rtx.send(required_row).await.unwrap();
        drop(rtx);
        drop(otx_opt);

        run_optional(rrx, orx_opt, vec!["s".into()], vec!["s".into(), "o".into()], out_tx, ctx).await;
        let row = out_rx.recv().await.unwrap();
        assert!(!row.contains_key("o"));
    }

    #[tokio::test]
    async fn limit_zero_cancels_without_emitting() {
        let (tx, rx) = bounded(8);
        let (otx, mut orx) = bounded(8);
        let ctx = QueryContext::new(None);
        drop(tx);
        run_limit(rx, 0, otx, ctx.clone()).await;
        assert!(ctx.is_cancelled());
        assert!(orx.recv().await.is_none());
    }

    #[test]
    fn eval_filter_range_comparison() {
        let mut b = Binding::new();
        b.insert("t".to_string(), bv("15"));
        let expr = Expr::Binary {
            op: BinaryOp::Ge,
            left: Box::new(Expr::Term(Term::variable("t"))),
            right: Box::new(Expr::Term(Term::typed_literal("10", "xsd:integer"))),
        };
        assert_eq!(eval_expr(&expr, &b), EvalOutcome::Value(EvalValue::Bool(true)));
    }

    #[test]
    fn unbound_variable_in_comparison_drops_the_row() {
        let b = Binding::new();
        let expr = Expr::Binary {
            op: BinaryOp::Ge,
            left: Box::new(Expr::Term(Term::variable("never_bound"))),
            right: Box::new(Expr::Term(Term::typed_literal("10", "xsd:integer"))),
        };
        assert_eq!(eval_expr(&expr, &b), EvalOutcome::Unbound);
        assert!(!eval_expr(&expr, &b).keep_row());
    }

    #[test]
    fn unsupported_function_is_kept_for_post_fetch() {
        let b = Binding::new();
        let expr = Expr::Call(FunctionCall {
            name: "regex".to_string(),
            args: vec![Expr::Term(Term::variable("s")), Expr::Term(Term::typed_literal("^a", "xsd:string"))],
        });
        assert_eq!(eval_expr(&expr, &b), EvalOutcome::Unsupported);
        assert!(eval_expr(&expr, &b).keep_row());
    }

    #[tokio::test]
    async fn run_filter_drops_rows_referencing_an_unbound_variable() {
        let (tx, rx) = bounded(8);
        let (otx, mut orx) = bounded(8);
        let ctx = QueryContext::new(None);

        let row = Binding::new();
        tx.send(row).await.unwrap();
        drop(tx);

        let expr = Expr::Binary {
            op: BinaryOp::Ge,
            left: Box::new(Expr::Term(Term::variable("never_bound"))),
            right: Box::new(Expr::Term(Term::typed_literal("10", "xsd:integer"))),
        };
        run_filter(rx, expr, otx, ctx).await;
        assert!(orx.recv().await.is_none());
    }
}
