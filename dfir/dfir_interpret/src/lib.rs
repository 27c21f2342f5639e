//! Reference interpreter for the dataflow IR.
//!
//! Evaluates a [`Function`] on dense `f64` tensors with numpy broadcasting
//! semantics. It is intended for testing: transformations are checked by
//! comparing the results of the original and the transformed function.

use dfir::{Binding, Expr, ExprData, Function, Opcode, Shape, Ty, Var};
use thiserror::Error;
use typed_index_collections::TiVec;

pub use crate::data::{Tensor, Value};

mod data;
mod kernels;


#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("expected {expected} arguments but {found} were provided")]
    ArgCount { expected: usize, found: usize },
    #[error("argument {param} does not match its type {ty}")]
    ArgMismatch { param: String, ty: Ty },
    #[error("{name} is used before it is defined")]
    Undefined { name: String },
    #[error("expected a tensor but found a tuple")]
    ExpectedTensor,
    #[error("expected a tuple but found a tensor")]
    ExpectedTuple,
    #[error("index {index} is out of bounds for a tuple with {len} fields")]
    IndexOutOfBounds { index: u32, len: usize },
    #[error("{op} expects {expected} arguments but {found} were provided")]
    OpArgCount { op: Opcode, expected: usize, found: usize },
    #[error("{op} can not be applied to tensors with shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch { op: Opcode, lhs: Box<[usize]>, rhs: Box<[usize]> },
    #[error("{op} requires a shape and dtype")]
    MissingInitAttrs { op: Opcode },
    #[error("function has no return value")]
    MissingReturn,
}

/// Whether `val` can be passed where `ty` is expected. Runtime shapes only
/// constrain the rank (if known).
fn matches_ty(val: &Value, ty: &Ty) -> bool {
    match (val, ty) {
        (Value::Tensor(tensor), Ty::Tensor { shape, .. }) => match shape {
            Shape::Known(dims) => {
                dims.len() == tensor.shape.len()
                    && dims.iter().zip(&*tensor.shape).all(|(&dim, &len)| dim as usize == len)
            }
            Shape::Runtime { ndim } => ndim.map_or(true, |ndim| ndim as usize == tensor.shape.len()),
        },
        (Value::Tuple(vals), Ty::Tuple(tys)) => {
            vals.len() == tys.len() && vals.iter().zip(tys.iter()).all(|(val, ty)| matches_ty(val, ty))
        }
        _ => false,
    }
}

pub struct InterpreterState {
    vals: TiVec<Var, Option<Value>>,
}

impl InterpreterState {
    pub fn write(&mut self, dst: Var, val: Value) {
        self.vals[dst] = Some(val)
    }

    pub fn read(&self, var: Var) -> Option<&Value> {
        self.vals[var].as_ref()
    }
}

pub struct Interpreter<'a> {
    pub state: InterpreterState,
    func: &'a Function,
}

impl<'a> Interpreter<'a> {
    pub fn new(func: &'a Function, args: Vec<Value>) -> Result<Interpreter<'a>, EvalError> {
        if args.len() != func.params.len() {
            return Err(EvalError::ArgCount { expected: func.params.len(), found: args.len() });
        }
        let mut state = InterpreterState { vals: func.vars.iter().map(|_| None).collect() };
        for (&param, arg) in func.params.iter().zip(args) {
            let data = &func.vars[param];
            if !matches_ty(&arg, &data.ty) {
                return Err(EvalError::ArgMismatch { param: data.name.clone(), ty: data.ty.clone() });
            }
            state.write(param, arg);
        }
        Ok(Interpreter { state, func })
    }

    /// Evaluates all bindings and returns the value of the return expression.
    pub fn run(&mut self) -> Result<Value, EvalError> {
        let func = self.func;
        for binding in func.bindings() {
            self.eval(binding)?;
        }
        let ret = func.ret.ok_or(EvalError::MissingReturn)?;
        self.eval_expr(ret)
    }

    pub fn eval(&mut self, binding: Binding) -> Result<(), EvalError> {
        let val = self.eval_expr(binding.value)?;
        self.state.write(binding.var, val);
        Ok(())
    }

    fn read(&self, var: Var) -> Result<&Value, EvalError> {
        self.state
            .read(var)
            .ok_or_else(|| EvalError::Undefined { name: self.func.vars[var].name.clone() })
    }

    fn eval_tensor(&self, expr: Expr) -> Result<Tensor, EvalError> {
        match self.eval_expr(expr)? {
            Value::Tensor(tensor) => Ok(tensor),
            Value::Tuple(_) => Err(EvalError::ExpectedTensor),
        }
    }

    pub fn eval_expr(&self, expr: Expr) -> Result<Value, EvalError> {
        let val = match self.func.exprs[expr] {
            ExprData::Var(var) => self.read(var)?.clone(),
            ExprData::Constant(val) => Tensor::scalar(val.val).into(),
            ExprData::Call { op, ref args, ref attrs } => {
                let args = args.iter().map(|&arg| self.eval_tensor(arg)).collect::<Result<Vec<_>, _>>()?;
                let args: Vec<_> = args.iter().collect();
                kernels::call(op, &args, attrs)?.into()
            }
            ExprData::Tuple(ref fields) => Value::Tuple(
                fields.iter().map(|&field| self.eval_expr(field)).collect::<Result<_, _>>()?,
            ),
            ExprData::TupleGetItem { tuple, index } => {
                let Value::Tuple(fields) = self.eval_expr(tuple)? else {
                    return Err(EvalError::ExpectedTuple);
                };
                let len = fields.len();
                let mut fields = fields.into_vec();
                if index as usize >= len {
                    return Err(EvalError::IndexOutOfBounds { index, len });
                }
                fields.swap_remove(index as usize)
            }
        };
        Ok(val)
    }
}

/// Evaluates `func` with the given arguments
pub fn evaluate(func: &Function, args: Vec<Value>) -> Result<Value, EvalError> {
    Interpreter::new(func, args)?.run()
}
