//! Operator library
//!
//! An [`OpRegistry`] maps every [`Opcode`] to its type inference rule and
//! (optionally) its gradient rule. Registries are plain values owned by the
//! caller and passed explicitly to everything that needs them. They are
//! immutable while borrowed, so independent passes can share one registry.

use ahash::AHashMap;
use dfir::{Attrs, Expr, ExprData, Function, Opcode, Ty, TypeError, TypeInference, Var};

mod gradient;
mod infer;

pub use infer::broadcast_shapes;

#[cfg(test)]
mod tests;

/// Computes the result type of a call from the types of its arguments.
pub type InferFn = fn(Opcode, &[Ty], &Attrs) -> Result<Ty, TypeError>;

/// Produces one partial adjoint expression per argument of a call.
/// New expressions are allocated in the function being differentiated, the
/// adjoint of the call result is bound to the given variable.
pub type GradientFn = fn(&mut Function, &CallInfo, Var) -> Vec<Expr>;

/// A call expression handed to a [`GradientFn`]
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub expr: Expr,
    pub op: Opcode,
    pub args: Box<[Expr]>,
    pub attrs: Attrs,
}

impl CallInfo {
    pub fn new(func: &Function, expr: Expr) -> Option<CallInfo> {
        match &func.exprs[expr] {
            ExprData::Call { op, args, attrs } => {
                Some(CallInfo { expr, op: *op, args: args.clone(), attrs: attrs.clone() })
            }
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct OpRegistry {
    infer: AHashMap<Opcode, InferFn>,
    gradients: AHashMap<Opcode, GradientFn>,
}

impl OpRegistry {
    /// A registry without any rules
    pub fn new() -> OpRegistry {
        OpRegistry::default()
    }

    /// A registry with the rules of all builtin operators
    pub fn builtin() -> OpRegistry {
        let mut res = OpRegistry::new();
        for op in Opcode::ALL {
            let infer: InferFn = match op {
                Opcode::Add | Opcode::Subtract | Opcode::Multiply | Opcode::Divide | Opcode::Less => {
                    infer::broadcast
                }
                Opcode::Negative
                | Opcode::Exp
                | Opcode::Log
                | Opcode::Sign
                | Opcode::Relu
                | Opcode::Softmax
                | Opcode::ZerosLike
                | Opcode::OnesLike => infer::elementwise,
                Opcode::Sum => infer::sum,
                Opcode::Matmul => infer::matmul,
                Opcode::Transpose => infer::transpose,
                Opcode::SoftmaxCrossEntropy => infer::cross_entropy,
                Opcode::Zeros | Opcode::Ones => infer::init,
                Opcode::CollapseSumLike => infer::collapse_sum_like,
            };
            res.register_infer(op, infer);

            let gradient: GradientFn = match op {
                Opcode::Add => gradient::add,
                Opcode::Subtract => gradient::subtract,
                Opcode::Multiply => gradient::multiply,
                Opcode::Divide => gradient::divide,
                Opcode::Negative => gradient::negative,
                Opcode::Exp => gradient::exp,
                Opcode::Log => gradient::log,
                Opcode::Relu => gradient::relu,
                Opcode::Sign | Opcode::ZerosLike | Opcode::OnesLike => gradient::constant,
                Opcode::Zeros | Opcode::Ones => gradient::init,
                Opcode::Sum => gradient::sum,
                Opcode::Matmul => gradient::matmul,
                Opcode::Transpose => gradient::transpose,
                Opcode::SoftmaxCrossEntropy => gradient::cross_entropy,
                Opcode::Less | Opcode::Softmax | Opcode::CollapseSumLike => continue,
            };
            res.register_gradient(op, gradient);
        }
        res
    }

    /// Registers the type rule of `op`, returning the rule it replaces
    pub fn register_infer(&mut self, op: Opcode, rule: InferFn) -> Option<InferFn> {
        self.infer.insert(op, rule)
    }

    /// Registers the gradient rule of `op`, returning the rule it replaces
    pub fn register_gradient(&mut self, op: Opcode, rule: GradientFn) -> Option<GradientFn> {
        self.gradients.insert(op, rule)
    }

    pub fn remove_gradient(&mut self, op: Opcode) -> Option<GradientFn> {
        self.gradients.remove(&op)
    }

    pub fn gradient(&self, op: Opcode) -> Option<GradientFn> {
        self.gradients.get(&op).copied()
    }

    pub fn has_gradient(&self, op: Opcode) -> bool {
        self.gradients.contains_key(&op)
    }
}

impl TypeInference for OpRegistry {
    fn infer_call(&self, op: Opcode, args: &[Ty], attrs: &Attrs) -> Result<Ty, TypeError> {
        let rule = self.infer.get(&op).ok_or(TypeError::NoRule { op })?;
        rule(op, args, attrs)
    }
}
