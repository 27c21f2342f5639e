use dfir::{Binding, BlockBuilder, DType, Expr, ExprData, Function, Opcode, TypeError, Var, VarKind};
use dfir_ops::{CallInfo, OpRegistry};
use log::trace;

use crate::accumulate::{Accumulator, MergeError};
use crate::adjoint::AdjointVars;
use crate::AdError;

/// Builds the body of the gradient function.
///
/// The original bindings are replayed first. Afterwards the target is seeded
/// with `ones` and the bindings are visited in reverse order, binding the
/// adjoint of every variable that contributes to the target and distributing
/// it to the operands of its defining expression.
pub(crate) struct ReverseAd<'a> {
    builder: BlockBuilder<'a>,
    registry: &'a OpRegistry,
    /// name of the function being differentiated
    name: &'a str,
    target: Var,
    target_dtype: DType,
    adjoints: AdjointVars,
    acc: Accumulator,
}

impl<'a> ReverseAd<'a> {
    pub fn new(
        func: &'a mut Function,
        registry: &'a OpRegistry,
        name: &'a str,
        (target, target_dtype): (Var, DType),
        requested: &[Var],
    ) -> ReverseAd<'a> {
        let mut adjoints = AdjointVars::default();
        for param in func.params.clone() {
            adjoints.mint(func, param, !requested.contains(&param));
        }
        ReverseAd {
            builder: BlockBuilder::dataflow(func, registry),
            registry,
            name,
            target,
            target_dtype,
            adjoints,
            acc: Accumulator::default(),
        }
    }

    pub fn run(mut self, bindings: &[Binding], requested: &[Var]) -> Result<(), AdError> {
        for &binding in bindings {
            self.builder.push(binding);
        }

        let seed = self.builder.func.make_init(Opcode::Ones, &[], self.target_dtype);
        self.acc.seed(self.target, seed);

        for &binding in bindings.iter().rev() {
            self.visit(binding)?;
        }

        self.finalize(requested)
    }

    fn func(&self) -> &Function {
        self.builder.func
    }

    fn var_name(&self, var: Var) -> String {
        self.func().var_name(var).to_owned()
    }

    fn visit(&mut self, binding: Binding) -> Result<(), AdError> {
        let Binding { var, value } = binding;
        let adjoint = match self.acc.get(var) {
            Some(adjoint) => adjoint,
            None => {
                trace!("{} does not contribute to the result", self.func().var_name(var));
                return Ok(());
            }
        };

        let internal = var != self.target && self.func().vars[var].kind == VarKind::Dataflow;
        let adjoint_var = self.adjoints.mint(self.builder.func, var, internal);
        self.bind(adjoint_var, adjoint)?;

        match self.func().exprs[value].clone() {
            ExprData::Var(operand) => self.accumulate(operand, adjoint),
            ExprData::Tuple(fields) => self.distribute(var, adjoint, &fields),
            ExprData::TupleGetItem { tuple, index } => self.project(var, tuple, index, adjoint),
            ExprData::Call { op, args, attrs } => {
                let call = CallInfo { expr: value, op, args, attrs };
                self.call(var, adjoint_var, &call)
            }
            ExprData::Constant(_) => {
                Err(AdError::UnsupportedBinding { func: self.name.to_owned(), var: self.var_name(var) })
            }
        }
    }

    /// Emits `adjoint_var = value`. If `value` was bound before, the earlier
    /// variable is reused instead.
    fn bind(&mut self, adjoint_var: Var, value: Expr) -> Result<(), AdError> {
        if let Some(prev) = self.acc.bound_var(value) {
            let value = self.builder.func.var_ref(prev);
            self.builder.push(Binding { var: adjoint_var, value });
            trace!("{} = {}", self.func().var_name(adjoint_var), self.func().var_name(prev));
            return Ok(());
        }

        let resolved = self.acc.resolve_fields(self.builder.func, value);
        let start = self.builder.bindings().len();
        self.builder.emit(adjoint_var, resolved).map_err(|err| self.ill_typed(err))?;
        for binding in &self.builder.bindings()[start..] {
            self.acc.record_binding(binding.value, binding.var);
        }
        self.acc.record_binding(value, adjoint_var);
        trace!("{} = {}", self.func().var_name(adjoint_var), self.func().display_expr(value));
        Ok(())
    }

    fn accumulate(&mut self, var: Var, inc: Expr) -> Result<(), AdError> {
        self.acc.accumulate(self.builder.func, var, inc).map_err(|err| self.merge_error(err, var))
    }

    /// Splits the adjoint of a tuple literal `var = (fields...)` among its fields.
    fn distribute(&mut self, var: Var, adjoint: Expr, fields: &[Expr]) -> Result<(), AdError> {
        let parts = self
            .acc
            .expand(self.builder.func, adjoint, fields.len())
            .map_err(|err| self.merge_error(err, var))?;

        for (&field, part) in fields.iter().zip(parts) {
            match self.func().exprs[field].clone() {
                ExprData::Var(operand) => self.accumulate(operand, part)?,
                ExprData::Tuple(nested) => self.distribute(var, part, &nested)?,
                _ => {
                    return Err(AdError::InvalidTupleField {
                        func: self.name.to_owned(),
                        var: self.var_name(var),
                    })
                }
            }
        }
        Ok(())
    }

    /// Routes the adjoint of `var = tuple[index]` into a single field of the
    /// adjoint of `tuple`.
    fn project(&mut self, var: Var, tuple: Expr, index: u32, adjoint: Expr) -> Result<(), AdError> {
        let operand = self
            .func()
            .exprs[tuple]
            .as_var()
            .filter(|&operand| !self.func().vars[operand].ty.is_tensor())
            .ok_or_else(|| AdError::NonVarTupleOperand {
                func: self.name.to_owned(),
                var: self.var_name(var),
            })?;

        let ty = &self.func().vars[operand].ty;
        let len = ty.tuple_fields().map_or(0, |fields| fields.len());
        if index as usize >= len {
            let err = TypeError::IndexOutOfBounds { ty: ty.clone(), index };
            return Err(self.ill_typed(err));
        }

        self.acc
            .accumulate_field(self.builder.func, operand, index as usize, adjoint)
            .map_err(|err| self.merge_error(err, operand))
    }

    fn call(&mut self, var: Var, adjoint_var: Var, call: &CallInfo) -> Result<(), AdError> {
        let operands = call
            .args
            .iter()
            .map(|&arg| self.func().exprs[arg].as_var())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| AdError::NonVarArgument {
                func: self.name.to_owned(),
                var: self.var_name(var),
            })?;

        let rule = self.registry.gradient(call.op).ok_or_else(|| AdError::MissingGradient {
            func: self.name.to_owned(),
            var: self.var_name(var),
            op: call.op,
        })?;
        // rules may assume a well typed call
        self.builder.ty(call.expr).map_err(|err| self.ill_typed(err))?;

        let partials = rule(self.builder.func, call, adjoint_var);
        if partials.len() != operands.len() {
            return Err(AdError::PartialCountMismatch {
                func: self.name.to_owned(),
                var: self.var_name(var),
                op: call.op,
                expected: operands.len(),
                found: partials.len(),
            });
        }

        for (operand, partial) in operands.into_iter().zip(partials) {
            self.accumulate(operand, partial)?;
        }
        Ok(())
    }

    /// Binds the adjoints of the requested parameters and sets the return value
    /// `(target, (adjoints...))`.
    fn finalize(mut self, requested: &[Var]) -> Result<(), AdError> {
        let mut adjoints = Vec::with_capacity(requested.len());
        for &param in requested {
            let adjoint_var = self.adjoints.mint(self.builder.func, param, false);
            let adjoint = match self.acc.get(param) {
                Some(adjoint) => adjoint,
                None => {
                    let ty = self.func().vars[param].ty.clone();
                    self.acc.zero(self.builder.func, &ty).map_err(|err| self.merge_error(err, param))?
                }
            };
            self.bind(adjoint_var, adjoint)?;
            adjoints.push(adjoint_var);
        }

        let func = &mut *self.builder.func;
        let target = func.var_ref(self.target);
        let adjoints: Vec<_> = adjoints.into_iter().map(|var| func.var_ref(var)).collect();
        let adjoints = func.make_tuple(adjoints);
        let ret = func.make_tuple([target, adjoints]);
        let ret_ty = self.builder.ty(ret).map_err(|err| self.ill_typed(err))?;
        self.builder.func.ret = Some(ret);
        self.builder.func.ret_ty = Some(ret_ty);
        self.builder.finish();
        Ok(())
    }

    fn ill_typed(&self, err: TypeError) -> AdError {
        AdError::IllTyped { func: self.name.to_owned(), err }
    }

    fn merge_error(&self, err: MergeError, var: Var) -> AdError {
        let func = self.name.to_owned();
        let var = self.var_name(var);
        match err {
            MergeError::TupleMismatch => AdError::TupleMismatch { func, var },
            MergeError::RuntimeShape => AdError::RuntimeShape { func, var },
        }
    }
}
