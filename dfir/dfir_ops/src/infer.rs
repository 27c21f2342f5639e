use dfir::{Attrs, DType, Opcode, Shape, Ty, TypeError};

fn check_arity(op: Opcode, args: &[Ty], expected: usize) -> Result<(), TypeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(TypeError::ArgCount { op, expected, found: args.len() })
    }
}

fn tensor_arg(op: Opcode, args: &[Ty], pos: usize) -> Result<(&Shape, DType), TypeError> {
    args[pos].as_tensor().ok_or_else(|| TypeError::ExpectedTensor { op, pos, ty: args[pos].clone() })
}

fn binary_args(op: Opcode, args: &[Ty]) -> Result<((&Shape, DType), &Shape), TypeError> {
    check_arity(op, args, 2)?;
    let (lhs, lhs_dtype) = tensor_arg(op, args, 0)?;
    let (rhs, rhs_dtype) = tensor_arg(op, args, 1)?;
    if lhs_dtype != rhs_dtype {
        return Err(TypeError::DTypeMismatch { op, lhs: lhs_dtype, rhs: rhs_dtype });
    }
    Ok(((lhs, lhs_dtype), rhs))
}

/// Numpy style broadcasting. If the shapes are not both known or their
/// dimensions disagree the result is only known at runtime.
pub fn broadcast_shapes(lhs: &Shape, rhs: &Shape) -> Shape {
    let ndim = match (lhs.ndim(), rhs.ndim()) {
        (Some(lhs), Some(rhs)) => Some(lhs.max(rhs)),
        _ => None,
    };
    let (Some(lhs), Some(rhs)) = (lhs.dims(), rhs.dims()) else {
        return Shape::runtime(ndim.map(|ndim| ndim as u32));
    };

    let len = lhs.len().max(rhs.len());
    let mut dims = vec![1; len];
    for (i, dim) in dims.iter_mut().rev().enumerate() {
        let lhs = lhs.len().checked_sub(i + 1).map_or(1, |pos| lhs[pos]);
        let rhs = rhs.len().checked_sub(i + 1).map_or(1, |pos| rhs[pos]);
        *dim = match (lhs, rhs) {
            (1, dim) | (dim, 1) => dim,
            (lhs, rhs) if lhs == rhs => lhs,
            _ => return Shape::runtime(Some(len as u32)),
        };
    }
    Shape::Known(dims.into_boxed_slice())
}

pub(crate) fn broadcast(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    let ((lhs, dtype), rhs) = binary_args(op, args)?;
    let shape = broadcast_shapes(lhs, rhs);
    let dtype = if op == Opcode::Less { DType::Bool } else { dtype };
    Ok(Ty::Tensor { shape, dtype })
}

pub(crate) fn elementwise(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    check_arity(op, args, 1)?;
    tensor_arg(op, args, 0)?;
    Ok(args[0].clone())
}

pub(crate) fn sum(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    check_arity(op, args, 1)?;
    let (_, dtype) = tensor_arg(op, args, 0)?;
    Ok(Ty::scalar(dtype))
}

pub(crate) fn matmul(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    let ((lhs, dtype), rhs) = binary_args(op, args)?;
    let shape = match (lhs.dims(), rhs.dims()) {
        (Some(&[m, k]), Some(&[k2, n])) => {
            if k != k2 {
                return Err(TypeError::ShapeMismatch { op, lhs: lhs.clone(), rhs: rhs.clone() });
            }
            Shape::Known(Box::new([m, n]))
        }
        _ if lhs.ndim() == Some(2) && rhs.ndim() == Some(2) => Shape::runtime(Some(2)),
        _ => Shape::runtime(None),
    };
    Ok(Ty::Tensor { shape, dtype })
}

pub(crate) fn transpose(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    check_arity(op, args, 1)?;
    let (shape, dtype) = tensor_arg(op, args, 0)?;
    let shape = match shape {
        Shape::Known(dims) => Shape::Known(dims.iter().rev().copied().collect()),
        Shape::Runtime { ndim } => Shape::Runtime { ndim: *ndim },
    };
    Ok(Ty::Tensor { shape, dtype })
}

pub(crate) fn cross_entropy(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    let ((logits, dtype), labels) = binary_args(op, args)?;
    if let (Some(logits_dims), Some(label_dims)) = (logits.dims(), labels.dims()) {
        if logits_dims != label_dims {
            return Err(TypeError::ShapeMismatch {
                op,
                lhs: logits.clone(),
                rhs: labels.clone(),
            });
        }
    }
    Ok(Ty::scalar(dtype))
}

pub(crate) fn init(op: Opcode, args: &[Ty], attrs: &Attrs) -> Result<Ty, TypeError> {
    check_arity(op, args, 0)?;
    match attrs {
        Attrs::Init { shape, dtype } => {
            Ok(Ty::Tensor { shape: Shape::Known(shape.clone()), dtype: *dtype })
        }
        Attrs::None => Err(TypeError::MissingInitAttrs { op }),
    }
}

/// `collapse_sum_like(x, like)` has the type of `like`
pub(crate) fn collapse_sum_like(op: Opcode, args: &[Ty], _attrs: &Attrs) -> Result<Ty, TypeError> {
    binary_args(op, args)?;
    Ok(args[1].clone())
}
