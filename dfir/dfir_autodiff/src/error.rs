use dfir::{Opcode, TypeError};
use thiserror::Error;

/// The category of an [`AdError`]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// The request itself is invalid (unknown function or parameter, name clash).
    Configuration,
    /// The function does not have the shape the transform requires.
    Structural,
    /// The function contains a construct that can not be differentiated.
    UnsupportedConstruct,
    /// An operator library rule broke its contract.
    InternalInvariant,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdError {
    #[error("function %{0} does not exist")]
    UnknownFunction(String),
    #[error("%{func} has no parameter called {name}")]
    UnknownParameter { func: String, name: String },
    #[error("%{func}: {var} is not a parameter")]
    NotAParameter { func: String, var: String },
    #[error("function %{0} already exists")]
    FunctionExists(String),

    #[error("%{func} must consist of exactly one dataflow block")]
    NotSingleDataflowBlock { func: String },
    #[error("%{func} must return a variable")]
    ReturnNotVar { func: String },
    #[error("%{func}: can not differentiate {var}, {reason}")]
    InvalidTarget { func: String, var: String, reason: String },
    #[error("%{func}: the adjoint of {var} does not match its tuple structure")]
    TupleMismatch { func: String, var: String },
    #[error("%{func}: the arguments of the call bound to {var} must be variables")]
    NonVarArgument { func: String, var: String },
    #[error("%{func}: the fields of the tuple bound to {var} must be variables or tuples")]
    InvalidTupleField { func: String, var: String },
    #[error("%{func}: the tuple projected by {var} must be a tuple variable")]
    NonVarTupleOperand { func: String, var: String },
    #[error("%{func}: the shape of {var} is only known at runtime, can not create a zero adjoint")]
    RuntimeShape { func: String, var: String },
    #[error("%{func}: {err}")]
    IllTyped { func: String, err: TypeError },

    #[error("%{func}: can not differentiate the binding of {var}")]
    UnsupportedBinding { func: String, var: String },
    #[error("%{func}: no gradient is registered for {op} (bound to {var})")]
    MissingGradient { func: String, var: String, op: Opcode },

    #[error("%{func}: the gradient of {op} (bound to {var}) produced {found} partials for {expected} arguments")]
    PartialCountMismatch { func: String, var: String, op: Opcode, expected: usize, found: usize },
}

impl AdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdError::UnknownFunction(_)
            | AdError::UnknownParameter { .. }
            | AdError::NotAParameter { .. }
            | AdError::FunctionExists(_) => ErrorKind::Configuration,
            AdError::NotSingleDataflowBlock { .. }
            | AdError::ReturnNotVar { .. }
            | AdError::InvalidTarget { .. }
            | AdError::TupleMismatch { .. }
            | AdError::NonVarArgument { .. }
            | AdError::InvalidTupleField { .. }
            | AdError::NonVarTupleOperand { .. }
            | AdError::RuntimeShape { .. }
            | AdError::IllTyped { .. } => ErrorKind::Structural,
            AdError::UnsupportedBinding { .. } | AdError::MissingGradient { .. } => {
                ErrorKind::UnsupportedConstruct
            }
            AdError::PartialCountMismatch { .. } => ErrorKind::InternalInvariant,
        }
    }
}
