use std::str::FromStr;

use stdx::impl_display;

use crate::{DType, Expr, Var};

/// The operators known to the IR. The IR only knows their names, type and
/// gradient rules are provided by an external registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Add,
    Subtract,
    Multiply,
    Divide,
    Less,
    Negative,
    Exp,
    Log,
    Sign,
    Relu,
    Sum,
    Matmul,
    Transpose,
    Softmax,
    SoftmaxCrossEntropy,
    Zeros,
    Ones,
    ZerosLike,
    OnesLike,
    CollapseSumLike,
}

impl Opcode {
    pub const ALL: [Opcode; 20] = [
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::Less,
        Opcode::Negative,
        Opcode::Exp,
        Opcode::Log,
        Opcode::Sign,
        Opcode::Relu,
        Opcode::Sum,
        Opcode::Matmul,
        Opcode::Transpose,
        Opcode::Softmax,
        Opcode::SoftmaxCrossEntropy,
        Opcode::Zeros,
        Opcode::Ones,
        Opcode::ZerosLike,
        Opcode::OnesLike,
        Opcode::CollapseSumLike,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Subtract => "subtract",
            Opcode::Multiply => "multiply",
            Opcode::Divide => "divide",
            Opcode::Less => "less",
            Opcode::Negative => "negative",
            Opcode::Exp => "exp",
            Opcode::Log => "log",
            Opcode::Sign => "sign",
            Opcode::Relu => "relu",
            Opcode::Sum => "sum",
            Opcode::Matmul => "matmul",
            Opcode::Transpose => "transpose",
            Opcode::Softmax => "softmax",
            Opcode::SoftmaxCrossEntropy => "softmax_cross_entropy",
            Opcode::Zeros => "zeros",
            Opcode::Ones => "ones",
            Opcode::ZerosLike => "zeros_like",
            Opcode::OnesLike => "ones_like",
            Opcode::CollapseSumLike => "collapse_sum_like",
        }
    }

    /// Whether this operator creates a tensor from [`Attrs::Init`] instead of arguments
    pub fn is_init(self) -> bool {
        matches!(self, Opcode::Zeros | Opcode::Ones)
    }
}

impl_display!(op @ Opcode => "{}", op.name());

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL.into_iter().find(|op| op.name() == s).ok_or(())
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Attrs {
    #[default]
    None,
    Init {
        shape: Box<[u64]>,
        dtype: DType,
    },
}

/// A scalar literal
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Constant {
    pub val: f64,
    pub dtype: DType,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ExprData {
    Var(Var),
    Constant(Constant),
    Call { op: Opcode, args: Box<[Expr]>, attrs: Attrs },
    Tuple(Box<[Expr]>),
    TupleGetItem { tuple: Expr, index: u32 },
}

impl ExprData {
    /// Variables and constants may appear as operands without being bound first.
    pub fn is_atomic(&self) -> bool {
        matches!(self, ExprData::Var(_) | ExprData::Constant(_))
    }

    pub fn as_var(&self) -> Option<Var> {
        if let ExprData::Var(var) = *self {
            Some(var)
        } else {
            None
        }
    }

    pub fn as_tuple(&self) -> Option<&[Expr]> {
        if let ExprData::Tuple(fields) = self {
            Some(fields)
        } else {
            None
        }
    }
}
