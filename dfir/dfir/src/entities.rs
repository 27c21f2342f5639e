use std::fmt;

use stdx::impl_idx_from;

/// A variable bound either as a function parameter or by a binding.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);
impl_idx_from!(Var(u32));

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An expression node. Every node allocated in the expression arena of a
/// function has a distinct identity, even if two nodes are structurally equal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expr(u32);
impl_idx_from!(Expr(u32));

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// A function in a [`Module`](crate::Module).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FuncId(u32);
impl_idx_from!(FuncId(u32));
