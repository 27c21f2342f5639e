//! Reverse mode automatic differentiation of dataflow functions.
//!
//! [`simple_ad`] differentiates the scalar result of a function with respect to
//! (a subset of) its parameters. The result is a new function with the same
//! parameters that returns `(result, (adjoints...))`. It is added to a copy of
//! the module, the input module is never changed.
//!
//! Only functions whose body is a single dataflow block are supported. The
//! gradient rules of the operators are taken from an [`OpRegistry`].

mod accumulate;
mod adjoint;
mod error;
mod reverse;

use dfir::{BlockKind, DType, Function, Module, Var, VarKind};
use dfir_ops::OpRegistry;
use log::debug;

pub use crate::error::{AdError, ErrorKind};
use crate::reverse::ReverseAd;


/// Selects the function to differentiate and the name of the result.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AdOptions {
    pub func_name: String,
    /// Names of the parameters to compute adjoints for. Empty means all parameters.
    pub require_grads: Vec<String>,
    /// Appended to the name of the differentiated function unless `new_func_name` is set.
    pub suffix: String,
    pub new_func_name: Option<String>,
}

impl Default for AdOptions {
    fn default() -> AdOptions {
        AdOptions {
            func_name: "main".to_owned(),
            require_grads: Vec::new(),
            suffix: "_adjoint".to_owned(),
            new_func_name: None,
        }
    }
}

impl AdOptions {
    pub fn new(func_name: impl Into<String>) -> AdOptions {
        AdOptions { func_name: func_name.into(), ..AdOptions::default() }
    }

    pub fn require_grads<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.require_grads = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn new_func_name(mut self, name: impl Into<String>) -> Self {
        self.new_func_name = Some(name.into());
        self
    }
}

/// Differentiates the function selected by `opts` and returns a copy of
/// `module` that additionally contains the gradient function. Existing
/// functions are never replaced.
pub fn simple_ad(module: &Module, registry: &OpRegistry, opts: &AdOptions) -> Result<Module, AdError> {
    let func = module
        .get(&opts.func_name)
        .ok_or_else(|| AdError::UnknownFunction(opts.func_name.clone()))?;

    let require_grads = opts
        .require_grads
        .iter()
        .map(|name| {
            let var = func.var_by_name(name).ok_or_else(|| AdError::UnknownParameter {
                func: func.name.clone(),
                name: name.clone(),
            })?;
            if !func.params.contains(&var) {
                return Err(AdError::NotAParameter { func: func.name.clone(), var: name.clone() });
            }
            Ok(var)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let name = match &opts.new_func_name {
        Some(name) => name.clone(),
        None => format!("{}{}", func.name, opts.suffix),
    };
    if module.contains(&name) {
        return Err(AdError::FunctionExists(name));
    }
    let res = gradient(func, registry, &require_grads, name)?;
    Ok(module.with_function(res))
}

/// Creates the gradient function of `func` called `name`.
///
/// Adjoints are returned for the parameters in `require_grads` (all parameters
/// if it is empty) in the order they are declared in.
pub fn gradient(
    func: &Function,
    registry: &OpRegistry,
    require_grads: &[Var],
    name: impl Into<String>,
) -> Result<Function, AdError> {
    for &var in require_grads {
        if !func.params.contains(&var) {
            let var = match func.vars.get(var) {
                Some(data) => data.name.clone(),
                None => format!("{var:?}"),
            };
            return Err(AdError::NotAParameter { func: func.name.clone(), var });
        }
    }
    let requested: Vec<Var> = if require_grads.is_empty() {
        func.params.clone()
    } else {
        func.params.iter().copied().filter(|param| require_grads.contains(param)).collect()
    };

    let target = target(func)?;
    let bindings = &func.blocks[0].bindings;

    let mut res = func.clone();
    res.name = name.into();
    res.blocks.clear();
    res.ret = None;
    res.ret_ty = None;

    debug!(
        "differentiating %{} ({} bindings) with respect to {} parameters",
        func.name,
        bindings.len(),
        requested.len()
    );
    ReverseAd::new(&mut res, registry, &func.name, target, &requested).run(bindings, &requested)?;
    debug!("created %{} with {} bindings", res.name, res.bindings().count());

    Ok(res)
}

/// Checks that `func` can be differentiated and returns the variable it returns.
fn target(func: &Function) -> Result<(Var, DType), AdError> {
    match &*func.blocks {
        [block] if block.kind == BlockKind::Dataflow => (),
        _ => return Err(AdError::NotSingleDataflowBlock { func: func.name.clone() }),
    }

    let target = func.ret_var().ok_or_else(|| AdError::ReturnNotVar { func: func.name.clone() })?;
    let data = &func.vars[target];
    let invalid = |reason: String| AdError::InvalidTarget {
        func: func.name.clone(),
        var: data.name.clone(),
        reason,
    };

    if data.kind != VarKind::Output {
        return Err(invalid("it is not an output variable".to_owned()));
    }
    match data.ty.as_tensor() {
        Some((_, dtype)) if data.ty.is_scalar_tensor() => Ok((target, dtype)),
        _ => Err(invalid(format!("expected a scalar tensor but found {}", data.ty))),
    }
}
