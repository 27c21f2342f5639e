use ahash::AHashMap;
use dfir::{Function, Var, VarKind};

const ADJOINT_SUFFIX: &str = "_adjoint";

/// Maps variables of the differentiated function to the variables holding
/// their adjoint. An adjoint variable has exactly the type of its primal.
#[derive(Default)]
pub(crate) struct AdjointVars {
    vars: AHashMap<Var, Var>,
}

impl AdjointVars {
    pub fn get(&self, var: Var) -> Option<Var> {
        self.vars.get(&var).copied()
    }

    /// Returns the adjoint of `var`, creating it if necessary. Internal
    /// adjoints are dataflow variables; requesting a non internal adjoint
    /// promotes an existing one.
    pub fn mint(&mut self, func: &mut Function, var: Var, internal: bool) -> Var {
        if let Some(adjoint) = self.get(var) {
            if !internal {
                func.vars[adjoint].kind = VarKind::Output;
            }
            return adjoint;
        }

        let data = &func.vars[var];
        let name = format!("{}{ADJOINT_SUFFIX}", data.name);
        let ty = data.ty.clone();
        let kind = if internal { VarKind::Dataflow } else { VarKind::Output };
        let adjoint = func.make_var(&name, ty, kind);
        self.vars.insert(var, adjoint);
        adjoint
    }
}
