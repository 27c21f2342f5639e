//! Dataflow IR
//!
//! A tensor program is represented as a [`Function`] whose body consists of
//! [`Block`]s of SSA bindings `var = expr`. Each variable is bound exactly once
//! and every use follows its definition. Expressions are a small closed set of
//! constructs ([`ExprData`]): variable references, scalar constants, operator
//! calls, tuple construction and tuple projection.
//!
//! Variables and expressions live in per function arenas and are referred to by
//! typed indices ([`Var`], [`Expr`]). The index of an expression is its identity:
//! two expressions constructed independently are always distinct even if they are
//! structurally equal. Passes use this identity to remember facts about
//! expressions they created themselves (see `dfir_autodiff`).
//!
//! Operators ([`Opcode`]) are only known by name. Their type rules are supplied
//! through the [`TypeInference`] trait by an operator registry.

mod builder;
mod entities;
mod expr;
mod infer;
mod module;
mod ty;
mod validation;

pub mod write;

use ahash::AHashMap;
use typed_index_collections::TiVec;

pub use crate::builder::BlockBuilder;
pub use crate::entities::{Expr, FuncId, Var};
pub use crate::expr::{Attrs, Constant, ExprData, Opcode};
pub use crate::infer::{TypeError, TypeInference};
pub use crate::module::Module;
pub use crate::ty::{DType, Shape, Ty};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum VarKind {
    /// Only visible inside the dataflow block that binds it.
    Dataflow,
    /// Visible after the block that binds it (and inside the function return).
    /// Parameters are always output variables.
    Output,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct VarData {
    pub name: String,
    pub ty: Ty,
    pub kind: VarKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlockKind {
    /// A flat, side effect free SSA region.
    Dataflow,
    Binding,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Binding {
    pub var: Var,
    pub value: Expr,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub kind: BlockKind,
    pub bindings: Vec<Binding>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Block {
        Block { kind, bindings: Vec::new() }
    }
}

/// Functions can be cloned, the clone has the same variable and expression
/// numbers as the original.
#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub vars: TiVec<Var, VarData>,
    pub exprs: TiVec<Expr, ExprData>,
    pub params: Vec<Var>,
    pub blocks: Vec<Block>,
    pub ret: Option<Expr>,
    pub ret_ty: Option<Ty>,
    names: AHashMap<String, Var>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            vars: TiVec::new(),
            exprs: TiVec::new(),
            params: Vec::new(),
            blocks: Vec::new(),
            ret: None,
            ret_ty: None,
            names: AHashMap::new(),
        }
    }

    /// Creates a new variable. If `name` is already taken a numeric suffix
    /// is appended (`lv`, `lv1`, `lv2`, ...).
    pub fn make_var(&mut self, name: &str, ty: Ty, kind: VarKind) -> Var {
        let name = if self.names.contains_key(name) {
            (1..)
                .map(|i| format!("{name}{i}"))
                .find(|candidate| !self.names.contains_key(candidate))
                .unwrap_or_default()
        } else {
            name.to_owned()
        };
        let var = self.vars.push_and_get_key(VarData { name: name.clone(), ty, kind });
        self.names.insert(name, var);
        var
    }

    pub fn make_param(&mut self, name: &str, ty: Ty) -> Var {
        let param = self.make_var(name, ty, VarKind::Output);
        self.params.push(param);
        param
    }

    pub fn make_expr(&mut self, data: ExprData) -> Expr {
        self.exprs.push_and_get_key(data)
    }

    pub fn var_ref(&mut self, var: Var) -> Expr {
        self.make_expr(ExprData::Var(var))
    }

    pub fn make_call(&mut self, op: Opcode, args: impl Into<Box<[Expr]>>) -> Expr {
        self.make_expr(ExprData::Call { op, args: args.into(), attrs: Attrs::None })
    }

    /// Creates a `zeros`/`ones` call producing a tensor of the given shape.
    pub fn make_init(&mut self, op: Opcode, shape: &[u64], dtype: DType) -> Expr {
        let attrs = Attrs::Init { shape: shape.into(), dtype };
        self.make_expr(ExprData::Call { op, args: Box::new([]), attrs })
    }

    pub fn make_tuple(&mut self, fields: impl Into<Box<[Expr]>>) -> Expr {
        self.make_expr(ExprData::Tuple(fields.into()))
    }

    pub fn make_tuple_get_item(&mut self, tuple: Expr, index: u32) -> Expr {
        self.make_expr(ExprData::TupleGetItem { tuple, index })
    }

    pub fn var_by_name(&self, name: &str) -> Option<Var> {
        self.names.get(name).copied()
    }

    pub fn var_name(&self, var: Var) -> &str {
        &self.vars[var].name
    }

    /// All bindings of all blocks in program order
    pub fn bindings(&self) -> impl Iterator<Item = Binding> + '_ {
        self.blocks.iter().flat_map(|block| block.bindings.iter().copied())
    }

    /// The variable returned by this function, if the return value is a plain variable
    pub fn ret_var(&self) -> Option<Var> {
        self.ret.and_then(|ret| self.exprs[ret].as_var())
    }

    pub fn to_debug_string(&self) -> String {
        format!("{:?}", self)
    }
}
