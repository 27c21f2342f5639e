use std::fmt;
use std::str::FromStr;

use stdx::impl_display;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl DType {
    pub const ALL: [DType; 5] = [DType::F32, DType::F64, DType::I32, DType::I64, DType::Bool];

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::Bool => "bool",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl_display!(dtype @ DType => "{}", dtype.name());

impl FromStr for DType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let res = match s {
            "f32" => DType::F32,
            "f64" => DType::F64,
            "i32" => DType::I32,
            "i64" => DType::I64,
            "bool" => DType::Bool,
            _ => return Err(()),
        };
        Ok(res)
    }
}

/// The shape of a tensor.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Shape {
    Known(Box<[u64]>),
    /// The dimensions are only known at runtime.
    /// This is the sentinel type inference falls back to when shapes can not be
    /// checked statically.
    Runtime { ndim: Option<u32> },
}

impl Shape {
    pub fn scalar() -> Shape {
        Shape::Known(Box::new([]))
    }

    pub fn runtime(ndim: Option<u32>) -> Shape {
        // a rank 0 tensor has no dimensions that could be unknown
        if ndim == Some(0) {
            Shape::scalar()
        } else {
            Shape::Runtime { ndim }
        }
    }

    pub fn ndim(&self) -> Option<usize> {
        match self {
            Shape::Known(dims) => Some(dims.len()),
            Shape::Runtime { ndim } => ndim.map(|ndim| ndim as usize),
        }
    }

    pub fn dims(&self) -> Option<&[u64]> {
        match self {
            Shape::Known(dims) => Some(dims),
            Shape::Runtime { .. } => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Known(dims) if dims.is_empty())
    }
}

impl From<&[u64]> for Shape {
    fn from(dims: &[u64]) -> Shape {
        Shape::Known(dims.into())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Known(dims) => {
                f.write_str("(")?;
                for (i, dim) in dims.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{dim}")?;
                }
                if dims.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Shape::Runtime { ndim: None } => f.write_str("?"),
            Shape::Runtime { ndim: Some(ndim) } => write!(f, "?{ndim}"),
        }
    }
}

/// The type of a value: a tensor or an arbitrarily nested tuple of tensors.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ty {
    Tensor { shape: Shape, dtype: DType },
    Tuple(Box<[Ty]>),
}

impl Ty {
    pub fn tensor(dims: &[u64], dtype: DType) -> Ty {
        Ty::Tensor { shape: dims.into(), dtype }
    }

    pub fn scalar(dtype: DType) -> Ty {
        Ty::Tensor { shape: Shape::scalar(), dtype }
    }

    pub fn as_tensor(&self) -> Option<(&Shape, DType)> {
        match self {
            Ty::Tensor { shape, dtype } => Some((shape, *dtype)),
            Ty::Tuple(_) => None,
        }
    }

    pub fn tuple_fields(&self) -> Option<&[Ty]> {
        match self {
            Ty::Tuple(fields) => Some(fields),
            Ty::Tensor { .. } => None,
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Ty::Tensor { .. })
    }

    /// A rank 0 tensor with a statically known shape
    pub fn is_scalar_tensor(&self) -> bool {
        matches!(self, Ty::Tensor{shape, ..} if shape.is_scalar())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Tensor { shape, dtype } => write!(f, "Tensor({shape}, {dtype})"),
            Ty::Tuple(fields) => {
                f.write_str("Tuple(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(")")
            }
        }
    }
}
