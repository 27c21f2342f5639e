//! Helpers that prepare functions for training.
//!
//! [`append_loss`] joins a model (the backbone) and a loss function into a
//! single function that computes the loss of the model's prediction. The
//! result can then be differentiated with `dfir_autodiff`.

use ahash::AHashMap;
use dfir::{Binding, Block, BlockKind, Expr, ExprData, Function, Module, Ty, Var};
use log::debug;
use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppendLossError {
    #[error("function %{0} does not exist")]
    UnknownFunction(String),
    #[error("function %{0} already exists")]
    FunctionExists(String),
    #[error("%{func} must consist of exactly one dataflow block")]
    NotSingleDataflowBlock { func: String },
    #[error("%{func} must return a variable or a tuple of variables")]
    InvalidBackboneReturn { func: String },
    #[error("%{func} must return a scalar tensor variable")]
    InvalidLossReturn { func: String },
    #[error("%{func} returns {found} values but {expected} backbone outputs were requested")]
    OutputCountMismatch { func: String, expected: usize, found: usize },
    #[error("%{func} has {found} parameters but {expected} backbone outputs were requested")]
    MissingLossParams { func: String, expected: usize, found: usize },
    #[error("%{func}: parameter {param} has type {found} but the backbone output has type {expected}")]
    ParamTypeMismatch { func: String, param: String, expected: Ty, found: Ty },
    #[error("%{func}: {var} is used before it is defined")]
    UndefinedVar { func: String, var: String },
}

fn dataflow_block(func: &Function) -> Result<&Block, AppendLossError> {
    match &*func.blocks {
        [block] if block.kind == BlockKind::Dataflow => Ok(block),
        _ => Err(AppendLossError::NotSingleDataflowBlock { func: func.name.clone() }),
    }
}

/// The variables returned by the backbone
fn backbone_outputs(func: &Function) -> Result<Vec<Var>, AppendLossError> {
    let invalid = || AppendLossError::InvalidBackboneReturn { func: func.name.clone() };
    let ret = func.ret.ok_or_else(invalid)?;
    match &func.exprs[ret] {
        ExprData::Var(var) => Ok(vec![*var]),
        ExprData::Tuple(fields) => {
            fields.iter().map(|&field| func.exprs[field].as_var().ok_or_else(invalid)).collect()
        }
        _ => Err(invalid()),
    }
}

/// Appends `loss` to the function `func_name` of `module`.
///
/// The first `num_backbone_outputs` values returned by the backbone are its
/// predictions, they are passed to the first parameters of `loss`. All other
/// returned values are states, which are returned alongside the loss. The
/// remaining parameters of `loss` are appended to the parameters of the
/// backbone. The new function is called `new_func_name` (`<func_name>_loss`
/// by default) and must not exist in `module` yet.
pub fn append_loss(
    module: &Module,
    func_name: &str,
    loss: &Function,
    num_backbone_outputs: usize,
    new_func_name: Option<&str>,
) -> Result<Module, AppendLossError> {
    let backbone =
        module.get(func_name).ok_or_else(|| AppendLossError::UnknownFunction(func_name.to_owned()))?;
    let backbone_block = dataflow_block(backbone)?;
    let loss_block = dataflow_block(loss)?;

    let outputs = backbone_outputs(backbone)?;
    if num_backbone_outputs > outputs.len() {
        return Err(AppendLossError::OutputCountMismatch {
            func: backbone.name.clone(),
            expected: num_backbone_outputs,
            found: outputs.len(),
        });
    }
    if num_backbone_outputs > loss.params.len() {
        return Err(AppendLossError::MissingLossParams {
            func: loss.name.clone(),
            expected: num_backbone_outputs,
            found: loss.params.len(),
        });
    }

    let loss_ret = loss
        .ret_var()
        .filter(|&var| loss.vars[var].ty.is_scalar_tensor())
        .ok_or_else(|| AppendLossError::InvalidLossReturn { func: loss.name.clone() })?;

    let (predictions, states) = outputs.split_at(num_backbone_outputs);
    for (&param, &prediction) in loss.params.iter().zip(predictions) {
        let expected = &backbone.vars[prediction].ty;
        let found = &loss.vars[param].ty;
        if expected != found {
            return Err(AppendLossError::ParamTypeMismatch {
                func: loss.name.clone(),
                param: loss.var_name(param).to_owned(),
                expected: expected.clone(),
                found: found.clone(),
            });
        }
    }

    let name = match new_func_name {
        Some(name) => name.to_owned(),
        None => format!("{func_name}_loss"),
    };
    if module.contains(&name) {
        return Err(AppendLossError::FunctionExists(name));
    }

    let mut res = backbone.clone();
    res.name = name;
    res.blocks.clear();

    let mut import = Import { loss, dst: &mut res, vars: AHashMap::new() };
    for (&param, &prediction) in loss.params.iter().zip(predictions) {
        import.vars.insert(param, prediction);
    }
    for &param in &loss.params[num_backbone_outputs..] {
        let data = &loss.vars[param];
        let new_param = import.dst.make_param(&data.name, data.ty.clone());
        import.vars.insert(param, new_param);
    }

    let mut block = backbone_block.clone();
    for binding in &loss_block.bindings {
        let value = import.expr(binding.value)?;
        let data = &loss.vars[binding.var];
        let var = import.dst.make_var(&data.name, data.ty.clone(), data.kind);
        import.vars.insert(binding.var, var);
        block.bindings.push(Binding { var, value });
    }
    let loss_var = import.var(loss_ret)?;

    let (ret, ret_ty) = if states.is_empty() {
        (res.var_ref(loss_var), res.vars[loss_var].ty.clone())
    } else {
        let vars: Vec<_> = [loss_var].into_iter().chain(states.iter().copied()).collect();
        let fields: Vec<_> = vars.iter().map(|&var| res.var_ref(var)).collect();
        let tys = vars.iter().map(|&var| res.vars[var].ty.clone()).collect();
        (res.make_tuple(fields), Ty::Tuple(tys))
    };
    res.blocks.push(block);
    res.ret = Some(ret);
    res.ret_ty = Some(ret_ty);

    debug!(
        "appended %{} to %{} as %{} ({} states, {} new parameters)",
        loss.name,
        backbone.name,
        res.name,
        states.len(),
        loss.params.len() - num_backbone_outputs
    );
    Ok(module.with_function(res))
}

/// Copies expressions of the loss function into the new function
struct Import<'a> {
    loss: &'a Function,
    dst: &'a mut Function,
    vars: AHashMap<Var, Var>,
}

impl Import<'_> {
    fn var(&self, var: Var) -> Result<Var, AppendLossError> {
        self.vars.get(&var).copied().ok_or_else(|| AppendLossError::UndefinedVar {
            func: self.loss.name.clone(),
            var: self.loss.var_name(var).to_owned(),
        })
    }

    fn expr(&mut self, expr: Expr) -> Result<Expr, AppendLossError> {
        let loss = self.loss;
        let data = match &loss.exprs[expr] {
            ExprData::Var(var) => ExprData::Var(self.var(*var)?),
            ExprData::Constant(val) => ExprData::Constant(*val),
            ExprData::Call { op, args, attrs } => {
                let args = args.iter().map(|&arg| self.expr(arg)).collect::<Result<_, _>>()?;
                ExprData::Call { op: *op, args, attrs: attrs.clone() }
            }
            ExprData::Tuple(fields) => {
                ExprData::Tuple(fields.iter().map(|&field| self.expr(field)).collect::<Result<_, _>>()?)
            }
            ExprData::TupleGetItem { tuple, index } => {
                ExprData::TupleGetItem { tuple: self.expr(*tuple)?, index: *index }
            }
        };
        Ok(self.dst.make_expr(data))
    }
}
