use ahash::{AHashMap, AHashSet};
use dfir::{Expr, Function, Opcode, Ty, Var};
use log::trace;

pub(crate) enum MergeError {
    TupleMismatch,
    RuntimeShape,
}

/// Collects the (partial) adjoint expression of every variable.
///
/// Zeros created here are remembered by expression identity so that adding a
/// zero never produces an `add` call. Expressions that already have been bound
/// to a variable are replaced by a reference to that variable whenever they are
/// used again.
#[derive(Default)]
pub(crate) struct Accumulator {
    exprs: AHashMap<Var, Expr>,
    zeros: AHashSet<Expr>,
    bound: AHashMap<Expr, Var>,
}

impl Accumulator {
    pub fn get(&self, var: Var) -> Option<Expr> {
        self.exprs.get(&var).copied()
    }

    pub fn seed(&mut self, var: Var, expr: Expr) {
        self.exprs.insert(var, expr);
    }

    pub fn bound_var(&self, expr: Expr) -> Option<Var> {
        self.bound.get(&expr).copied()
    }

    /// Remembers that `expr` was bound to `var`. The first binding wins.
    pub fn record_binding(&mut self, expr: Expr, var: Var) {
        self.bound.entry(expr).or_insert(var);
    }

    pub fn is_zero(&self, expr: Expr) -> bool {
        self.zeros.contains(&expr)
    }

    pub fn resolve(&self, func: &mut Function, expr: Expr) -> Expr {
        match self.bound_var(expr) {
            Some(var) => func.var_ref(var),
            None => expr,
        }
    }

    /// Like [`resolve`](Accumulator::resolve) but also resolves the fields of
    /// tuple literals.
    pub fn resolve_fields(&self, func: &mut Function, expr: Expr) -> Expr {
        let expr = self.resolve(func, expr);
        let fields = match func.exprs[expr].as_tuple() {
            Some(fields) => fields.to_vec(),
            None => return expr,
        };
        let resolved: Vec<_> = fields.iter().map(|&field| self.resolve_fields(func, field)).collect();
        if resolved == fields {
            expr
        } else {
            func.make_tuple(resolved)
        }
    }

    /// Adds `inc` to the adjoint of `var`.
    pub fn accumulate(&mut self, func: &mut Function, var: Var, inc: Expr) -> Result<(), MergeError> {
        let res = match self.get(var) {
            Some(cur) => {
                let ty = func.vars[var].ty.clone();
                self.merge(func, &ty, cur, inc)?
            }
            None => inc,
        };
        self.exprs.insert(var, res);
        Ok(())
    }

    /// Adds `inc` to field `index` of the adjoint of the tuple variable `var`.
    /// The first contribution creates a zero tuple for all other fields.
    pub fn accumulate_field(
        &mut self,
        func: &mut Function,
        var: Var,
        index: usize,
        inc: Expr,
    ) -> Result<(), MergeError> {
        let ty = func.vars[var].ty.clone();
        let field_tys = ty.tuple_fields().ok_or(MergeError::TupleMismatch)?;
        let cur = match self.get(var) {
            Some(cur) => cur,
            None => self.zero(func, &ty)?,
        };
        let mut fields = self.expand(func, cur, field_tys.len())?;
        fields[index] = self.merge(func, &field_tys[index], fields[index], inc)?;
        let res = func.make_tuple(fields);
        self.exprs.insert(var, res);
        Ok(())
    }

    fn merge(&mut self, func: &mut Function, ty: &Ty, cur: Expr, inc: Expr) -> Result<Expr, MergeError> {
        if self.is_zero(inc) {
            trace!("elided addition of zero {}", func.display_expr(inc));
            return Ok(cur);
        }
        if self.is_zero(cur) {
            return Ok(inc);
        }

        match ty {
            Ty::Tuple(field_tys) => {
                let cur = self.expand(func, cur, field_tys.len())?;
                let inc = self.expand(func, inc, field_tys.len())?;
                let fields = field_tys
                    .iter()
                    .zip(cur.into_iter().zip(inc))
                    .map(|(ty, (cur, inc))| self.merge(func, ty, cur, inc))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(func.make_tuple(fields))
            }
            Ty::Tensor { .. } => {
                if func.exprs[cur].as_tuple().is_some() || func.exprs[inc].as_tuple().is_some() {
                    return Err(MergeError::TupleMismatch);
                }
                let cur = self.resolve(func, cur);
                let inc = self.resolve(func, inc);
                Ok(func.make_call(Opcode::Add, [cur, inc]))
            }
        }
    }

    /// The fields of a tuple valued expression: the fields of a tuple literal
    /// or projections `expr[i]` otherwise.
    pub fn expand(&self, func: &mut Function, expr: Expr, len: usize) -> Result<Vec<Expr>, MergeError> {
        if let Some(fields) = func.exprs[expr].as_tuple() {
            if fields.len() != len {
                return Err(MergeError::TupleMismatch);
            }
            return Ok(fields.to_vec());
        }
        let base = self.resolve(func, expr);
        Ok((0..len as u32).map(|i| func.make_tuple_get_item(base, i)).collect())
    }

    /// A structural zero of type `ty`. Tuples become tuple literals of zeros.
    pub fn zero(&mut self, func: &mut Function, ty: &Ty) -> Result<Expr, MergeError> {
        let res = match ty {
            Ty::Tensor { shape, dtype } => {
                let dims = shape.dims().ok_or(MergeError::RuntimeShape)?;
                func.make_init(Opcode::Zeros, dims, *dtype)
            }
            Ty::Tuple(fields) => {
                let fields =
                    fields.iter().map(|ty| self.zero(func, ty)).collect::<Result<Vec<_>, _>>()?;
                func.make_tuple(fields)
            }
        };
        self.zeros.insert(res);
        Ok(res)
    }
}
