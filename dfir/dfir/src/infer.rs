use thiserror::Error;

use crate::{Attrs, DType, Expr, ExprData, Function, Opcode, Shape, Ty};

/// Computes the result type of operator calls.
///
/// The IR only knows operator names. The rules themselves live in an operator
/// registry which implements this trait.
pub trait TypeInference {
    fn infer_call(&self, op: Opcode, args: &[Ty], attrs: &Attrs) -> Result<Ty, TypeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("{op} expects {expected} arguments but {found} were provided")]
    ArgCount { op: Opcode, expected: usize, found: usize },
    #[error("{op} expects a tensor as argument {pos} but found {ty}")]
    ExpectedTensor { op: Opcode, pos: usize, ty: Ty },
    #[error("{op} can not combine {lhs} and {rhs} tensors")]
    DTypeMismatch { op: Opcode, lhs: DType, rhs: DType },
    #[error("{op} can not combine tensors with shapes {lhs} and {rhs}")]
    ShapeMismatch { op: Opcode, lhs: Shape, rhs: Shape },
    #[error("{op} requires a shape and dtype")]
    MissingInitAttrs { op: Opcode },
    #[error("no type rule is registered for {op}")]
    NoRule { op: Opcode },
    #[error("{ty} is not a tuple")]
    NotATuple { ty: Ty },
    #[error("index {index} is out of bounds for {ty}")]
    IndexOutOfBounds { ty: Ty, index: u32 },
}

impl Function {
    /// Computes the type of `expr`. Variables carry their type, calls are
    /// resolved with `infer`.
    pub fn expr_ty(&self, expr: Expr, infer: &dyn TypeInference) -> Result<Ty, TypeError> {
        let ty = match self.exprs[expr] {
            ExprData::Var(var) => self.vars[var].ty.clone(),
            ExprData::Constant(val) => Ty::scalar(val.dtype),
            ExprData::Call { op, ref args, ref attrs } => {
                let args: Vec<_> =
                    args.iter().map(|&arg| self.expr_ty(arg, infer)).collect::<Result<_, _>>()?;
                infer.infer_call(op, &args, attrs)?
            }
            ExprData::Tuple(ref fields) => Ty::Tuple(
                fields.iter().map(|&field| self.expr_ty(field, infer)).collect::<Result<_, _>>()?,
            ),
            ExprData::TupleGetItem { tuple, index } => {
                let ty = self.expr_ty(tuple, infer)?;
                match ty.tuple_fields() {
                    Some(fields) => match fields.get(index as usize) {
                        Some(field) => field.clone(),
                        None => return Err(TypeError::IndexOutOfBounds { index, ty }),
                    },
                    None => return Err(TypeError::NotATuple { ty }),
                }
            }
        };
        Ok(ty)
    }
}
