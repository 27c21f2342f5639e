use crate::{
    Binding, Block, BlockKind, Expr, ExprData, Function, Ty, TypeError, TypeInference, Var,
    VarKind,
};

#[cfg(test)]
mod tests;

/// Appends bindings to a new block of a function.
///
/// Expressions passed to [`emit`](BlockBuilder::emit) are normalized first:
/// call arguments and tuple projection operands that are not atomic, and tuple
/// fields that are calls or projections, are bound to fresh `lv` variables.
/// Nested tuple literals are kept and normalized recursively.
pub struct BlockBuilder<'a> {
    pub func: &'a mut Function,
    infer: &'a dyn TypeInference,
    block: Block,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(func: &'a mut Function, infer: &'a dyn TypeInference, kind: BlockKind) -> Self {
        BlockBuilder { func, infer, block: Block::new(kind) }
    }

    pub fn dataflow(func: &'a mut Function, infer: &'a dyn TypeInference) -> Self {
        Self::new(func, infer, BlockKind::Dataflow)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.block.bindings
    }

    /// Appends a binding without normalizing its value.
    pub fn push(&mut self, binding: Binding) {
        self.block.bindings.push(binding)
    }

    /// Binds `var` to `value` and returns the normalized value.
    pub fn emit(&mut self, var: Var, value: Expr) -> Result<Expr, TypeError> {
        let value = self.normalize(value)?;
        self.push(Binding { var, value });
        Ok(value)
    }

    /// Binds `value` to a new variable whose type is inferred from `value`.
    pub fn emit_new(&mut self, name: &str, value: Expr, kind: VarKind) -> Result<Var, TypeError> {
        let value = self.normalize(value)?;
        let ty = self.ty(value)?;
        let var = self.func.make_var(name, ty, kind);
        self.push(Binding { var, value });
        Ok(var)
    }

    pub fn ty(&self, expr: Expr) -> Result<Ty, TypeError> {
        self.func.expr_ty(expr, self.infer)
    }

    /// Brings `expr` into normal form, emitting bindings for nested
    /// subexpressions. Returns `expr` itself if it already is normalized.
    pub fn normalize(&mut self, expr: Expr) -> Result<Expr, TypeError> {
        let res = match self.func.exprs[expr].clone() {
            ExprData::Var(_) | ExprData::Constant(_) => expr,
            ExprData::Call { op, args, attrs } => {
                let new_args = args
                    .iter()
                    .map(|&arg| self.atomize(arg))
                    .collect::<Result<Box<[_]>, _>>()?;
                if new_args == args {
                    expr
                } else {
                    self.func.make_expr(ExprData::Call { op, args: new_args, attrs })
                }
            }
            ExprData::Tuple(fields) => {
                let new_fields = fields
                    .iter()
                    .map(|&field| self.normalize_field(field))
                    .collect::<Result<Box<[_]>, _>>()?;
                if new_fields == fields {
                    expr
                } else {
                    self.func.make_tuple(new_fields)
                }
            }
            ExprData::TupleGetItem { tuple, index } => {
                let new_tuple = self.atomize(tuple)?;
                if new_tuple == tuple {
                    expr
                } else {
                    self.func.make_tuple_get_item(new_tuple, index)
                }
            }
        };
        Ok(res)
    }

    fn normalize_field(&mut self, field: Expr) -> Result<Expr, TypeError> {
        if matches!(self.func.exprs[field], ExprData::Tuple(_)) {
            self.normalize(field)
        } else {
            self.atomize(field)
        }
    }

    /// Ensures `expr` is a variable or a constant by binding it to a temporary.
    fn atomize(&mut self, expr: Expr) -> Result<Expr, TypeError> {
        let expr = self.normalize(expr)?;
        if self.func.exprs[expr].is_atomic() {
            return Ok(expr);
        }
        let ty = self.ty(expr)?;
        let kind = match self.block.kind {
            BlockKind::Dataflow => VarKind::Dataflow,
            BlockKind::Binding => VarKind::Output,
        };
        let tmp = self.func.make_var("lv", ty, kind);
        self.push(Binding { var: tmp, value: expr });
        Ok(self.func.var_ref(tmp))
    }

    /// Appends the block to the function.
    pub fn finish(self) {
        self.func.blocks.push(self.block)
    }
}
