use typed_index_collections::TiVec;

use crate::{BlockKind, Expr, ExprData, Function, Var, VarKind};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Def {
    Undefined,
    Param,
    Binding { block: usize },
}

impl Function {
    /// Calls `f` for every variable referenced by `expr` (including nested expressions)
    pub fn visit_vars(&self, expr: Expr, f: &mut impl FnMut(Var)) {
        match self.exprs[expr] {
            ExprData::Var(var) => f(var),
            ExprData::Constant(_) => (),
            ExprData::Call { ref args, .. } | ExprData::Tuple(ref args) => {
                for &arg in args.iter() {
                    self.visit_vars(arg, f)
                }
            }
            ExprData::TupleGetItem { tuple, .. } => self.visit_vars(tuple, f),
        }
    }

    /// Checks that the function is well formed:
    ///
    /// * every variable is bound at most once (parameters are never bound)
    /// * every variable is defined before it is used
    /// * dataflow variables are not used outside of the block that binds them
    ///
    /// Violations are printed to stderr.
    pub fn validate(&self) -> bool {
        let errors = self.validation_errors();
        for err in &errors {
            eprintln!("{}: {err}", self.name);
        }
        errors.is_empty()
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let mut defs: TiVec<Var, Def> = self.vars.iter().map(|_| Def::Undefined).collect();

        for &param in &self.params {
            let data = &self.vars[param];
            if defs[param] != Def::Undefined {
                errors.push(format!("parameter {} is declared twice", data.name));
            }
            if data.kind != VarKind::Output {
                errors.push(format!("parameter {} is a dataflow variable", data.name));
            }
            defs[param] = Def::Param;
        }

        let check_uses = |errors: &mut Vec<String>, defs: &TiVec<Var, Def>, expr, block| {
            self.visit_vars(expr, &mut |var| {
                let name = &self.vars[var].name;
                match defs[var] {
                    Def::Undefined => errors.push(format!("{name} is used before it is defined")),
                    Def::Binding { block: def_block }
                        if self.vars[var].kind == VarKind::Dataflow && Some(def_block) != block =>
                    {
                        errors.push(format!("dataflow variable {name} escapes its block"))
                    }
                    _ => (),
                }
            })
        };

        for (i, block) in self.blocks.iter().enumerate() {
            for binding in &block.bindings {
                check_uses(&mut errors, &defs, binding.value, Some(i));
                let data = &self.vars[binding.var];
                match defs[binding.var] {
                    Def::Undefined => (),
                    Def::Param => errors.push(format!("parameter {} is rebound", data.name)),
                    Def::Binding { .. } => {
                        errors.push(format!("{} is bound more than once", data.name))
                    }
                }
                if block.kind == BlockKind::Binding && data.kind == VarKind::Dataflow {
                    errors.push(format!(
                        "dataflow variable {} is bound outside of a dataflow block",
                        data.name
                    ))
                }
                defs[binding.var] = Def::Binding { block: i };
            }
        }

        match self.ret {
            Some(ret) => check_uses(&mut errors, &defs, ret, None),
            None => errors.push("missing return value".to_owned()),
        }

        errors
    }
}
