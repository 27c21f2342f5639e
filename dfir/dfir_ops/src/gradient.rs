//! Gradient rules of the builtin operators.
//!
//! Each rule receives the call being differentiated and the variable holding the
//! adjoint of its result (`g`). It returns one partial adjoint per call argument.
//! Binary operators broadcast, so their partials are reduced back to the shape
//! of the operand with `collapse_sum_like`. Calls with the wrong number of
//! arguments get no partials at all.

use dfir::{Expr, Function, Opcode, Var};

use crate::CallInfo;

fn args<const N: usize>(call: &CallInfo) -> Option<[Expr; N]> {
    <[Expr; N]>::try_from(&*call.args).ok()
}

fn collapse_sum_like(func: &mut Function, partial: Expr, operand: Expr) -> Expr {
    func.make_call(Opcode::CollapseSumLike, [partial, operand])
}

pub(crate) fn add(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([a, b]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    vec![collapse_sum_like(func, g, a), collapse_sum_like(func, g, b)]
}

pub(crate) fn subtract(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([a, b]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let neg = func.make_call(Opcode::Negative, [g]);
    vec![collapse_sum_like(func, g, a), collapse_sum_like(func, neg, b)]
}

pub(crate) fn multiply(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([a, b]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let da = func.make_call(Opcode::Multiply, [g, b]);
    let db = func.make_call(Opcode::Multiply, [g, a]);
    vec![collapse_sum_like(func, da, a), collapse_sum_like(func, db, b)]
}

pub(crate) fn divide(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([a, b]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let da = func.make_call(Opcode::Divide, [g, b]);
    let num = func.make_call(Opcode::Multiply, [g, a]);
    let den = func.make_call(Opcode::Multiply, [b, b]);
    let quot = func.make_call(Opcode::Divide, [num, den]);
    let db = func.make_call(Opcode::Negative, [quot]);
    vec![collapse_sum_like(func, da, a), collapse_sum_like(func, db, b)]
}

pub(crate) fn negative(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([_]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    vec![func.make_call(Opcode::Negative, [g])]
}

pub(crate) fn exp(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([x]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let exp = func.make_call(Opcode::Exp, [x]);
    vec![func.make_call(Opcode::Multiply, [g, exp])]
}

pub(crate) fn log(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([x]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    vec![func.make_call(Opcode::Divide, [g, x])]
}

pub(crate) fn relu(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([x]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let relu = func.make_call(Opcode::Relu, [x]);
    let mask = func.make_call(Opcode::Sign, [relu]);
    vec![func.make_call(Opcode::Multiply, [g, mask])]
}

/// Rules for operators that are locally constant in their argument
/// (`sign`, `zeros_like`, `ones_like`).
pub(crate) fn constant(func: &mut Function, call: &CallInfo, _g: Var) -> Vec<Expr> {
    let Some([x]) = args(call) else { return Vec::new() };
    vec![func.make_call(Opcode::ZerosLike, [x])]
}

/// `zeros`/`ones` take no arguments
pub(crate) fn init(_func: &mut Function, _call: &CallInfo, _g: Var) -> Vec<Expr> {
    Vec::new()
}

pub(crate) fn sum(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([x]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let ones = func.make_call(Opcode::OnesLike, [x]);
    vec![func.make_call(Opcode::Multiply, [g, ones])]
}

pub(crate) fn matmul(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([a, b]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let b_t = func.make_call(Opcode::Transpose, [b]);
    let da = func.make_call(Opcode::Matmul, [g, b_t]);
    let a_t = func.make_call(Opcode::Transpose, [a]);
    let db = func.make_call(Opcode::Matmul, [a_t, g]);
    vec![collapse_sum_like(func, da, a), collapse_sum_like(func, db, b)]
}

pub(crate) fn transpose(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([_]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    vec![func.make_call(Opcode::Transpose, [g])]
}

pub(crate) fn cross_entropy(func: &mut Function, call: &CallInfo, g: Var) -> Vec<Expr> {
    let Some([logits, labels]) = args(call) else { return Vec::new() };
    let g = func.var_ref(g);
    let softmax = func.make_call(Opcode::Softmax, [logits]);
    let diff = func.make_call(Opcode::Subtract, [softmax, labels]);
    let dlogits = func.make_call(Opcode::Multiply, [g, diff]);
    let softmax = func.make_call(Opcode::Softmax, [logits]);
    let log = func.make_call(Opcode::Log, [softmax]);
    let neg = func.make_call(Opcode::Negative, [log]);
    let dlabels = func.make_call(Opcode::Multiply, [g, neg]);
    vec![dlogits, dlabels]
}
