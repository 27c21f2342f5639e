use std::fmt;
use std::sync::Arc;

use typed_indexmap::TiMap;

use crate::{FuncId, Function};

/// An ordered collection of functions addressed by name.
///
/// Functions are shared between clones of a module. Cloning a module is cheap
/// and adding a function to a clone never affects the original, so passes can
/// produce a new module without mutating their input.
#[derive(Clone, Default)]
pub struct Module {
    functions: TiMap<FuncId, String, Arc<Function>>,
}

impl Module {
    pub fn new() -> Module {
        Module::default()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.index_and_val(name).map(|(_, func)| &**func)
    }

    pub fn lookup(&self, name: &str) -> Option<FuncId> {
        self.functions.index(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Adds `func` under its name. A function with the same name is replaced
    /// (and keeps its position).
    pub fn add(&mut self, func: Function) -> FuncId {
        self.functions.insert_full(func.name.clone(), Arc::new(func)).0
    }

    /// Returns a copy of this module that additionally contains `func`.
    pub fn with_function(&self, func: Function) -> Module {
        let mut res = self.clone();
        res.add(func);
        res
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter().map(|(_, func)| &**func)
    }

    /// Whether both modules share the same function for `name`
    pub fn shares(&self, other: &Module, name: &str) -> bool {
        match (self.functions.index_and_val(name), other.functions.index_and_val(name)) {
            (Some((_, lhs)), Some((_, rhs))) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl std::ops::Index<FuncId> for Module {
    type Output = Function;

    fn index(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.functions().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            crate::write::write_function(f, func)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
