use dfir::{Attrs, Opcode};

use crate::{EvalError, Tensor};

fn shape_mismatch(op: Opcode, lhs: &Tensor, rhs: &Tensor) -> EvalError {
    EvalError::ShapeMismatch { op, lhs: lhs.shape.clone(), rhs: rhs.shape.clone() }
}

pub(crate) fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Option<Vec<usize>> {
    let len = lhs.len().max(rhs.len());
    let mut res = vec![1; len];
    for (i, dim) in res.iter_mut().rev().enumerate() {
        let lhs = lhs.len().checked_sub(i + 1).map_or(1, |pos| lhs[pos]);
        let rhs = rhs.len().checked_sub(i + 1).map_or(1, |pos| rhs[pos]);
        *dim = match (lhs, rhs) {
            (1, dim) | (dim, 1) => dim,
            (lhs, rhs) if lhs == rhs => lhs,
            _ => return None,
        };
    }
    Some(res)
}

/// Strides of `input` when it is broadcast to `out`, broadcast dimensions have stride 0.
fn broadcast_strides(out: &[usize], input: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; out.len()];
    let mut stride = 1;
    for (i, &dim) in input.iter().enumerate().rev() {
        let pos = out.len() - input.len() + i;
        if dim != 1 {
            strides[pos] = stride;
        }
        stride *= dim;
    }
    strides
}

/// Maps a linear index into `shape` to the offset in a tensor with the given strides.
fn offset(mut index: usize, shape: &[usize], strides: &[usize]) -> usize {
    let mut res = 0;
    for (&dim, &stride) in shape.iter().zip(strides).rev() {
        res += (index % dim) * stride;
        index /= dim;
    }
    res
}

pub(crate) fn binary(
    op: Opcode,
    lhs: &Tensor,
    rhs: &Tensor,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Tensor, EvalError> {
    let shape = broadcast_shape(&lhs.shape, &rhs.shape).ok_or_else(|| shape_mismatch(op, lhs, rhs))?;
    let lhs_strides = broadcast_strides(&shape, &lhs.shape);
    let rhs_strides = broadcast_strides(&shape, &rhs.shape);
    Ok(Tensor::from_fn(&shape, |i| {
        f(lhs.data[offset(i, &shape, &lhs_strides)], rhs.data[offset(i, &shape, &rhs_strides)])
    }))
}

/// Sums `x` over the dimensions along which `like` was broadcast.
pub(crate) fn collapse_sum_like(x: &Tensor, like: &Tensor) -> Result<Tensor, EvalError> {
    if broadcast_shape(&x.shape, &like.shape).as_deref() != Some(&*x.shape) {
        return Err(shape_mismatch(Opcode::CollapseSumLike, x, like));
    }
    let strides = broadcast_strides(&x.shape, &like.shape);
    let mut data = vec![0.0; like.len()];
    for (i, &val) in x.data.iter().enumerate() {
        data[offset(i, &x.shape, &strides)] += val;
    }
    Ok(Tensor::new(&like.shape, data))
}

pub(crate) fn matmul(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, EvalError> {
    let (&[m, k], &[k2, n]) = (&*lhs.shape, &*rhs.shape) else {
        return Err(shape_mismatch(Opcode::Matmul, lhs, rhs));
    };
    if k != k2 {
        return Err(shape_mismatch(Opcode::Matmul, lhs, rhs));
    }
    Ok(Tensor::from_fn(&[m, n], |i| {
        let (row, col) = (i / n, i % n);
        (0..k).map(|j| lhs.data[row * k + j] * rhs.data[j * n + col]).sum()
    }))
}

/// Reverses the order of all dimensions
pub(crate) fn transpose(x: &Tensor) -> Tensor {
    let shape: Vec<_> = x.shape.iter().rev().copied().collect();
    let mut strides = vec![0; x.shape.len()];
    let mut stride = 1;
    for (i, &dim) in x.shape.iter().enumerate().rev() {
        strides[i] = stride;
        stride *= dim;
    }
    strides.reverse();
    Tensor::from_fn(&shape, |i| x.data[offset(i, &shape, &strides)])
}

/// Applies `f` to every row (the last dimension) of `x`.
fn rows(x: &Tensor, f: impl Fn(&[f64], &mut Vec<f64>)) -> Tensor {
    let row_len = x.shape.last().copied().unwrap_or(1).max(1);
    let mut data = Vec::with_capacity(x.len());
    for row in x.data.chunks(row_len) {
        f(row, &mut data);
    }
    Tensor::new(&x.shape, data)
}

fn log_softmax_row(row: &[f64], dst: &mut Vec<f64>) {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = row.iter().map(|&x| (x - max).exp()).sum::<f64>().ln() + max;
    dst.extend(row.iter().map(|&x| x - log_sum))
}

pub(crate) fn softmax(x: &Tensor) -> Tensor {
    rows(x, |row, dst| {
        let start = dst.len();
        log_softmax_row(row, dst);
        for val in &mut dst[start..] {
            *val = val.exp();
        }
    })
}

/// `-sum(labels * log(softmax(logits)))` with the softmax taken over the last dimension
pub(crate) fn cross_entropy(logits: &Tensor, labels: &Tensor) -> Result<Tensor, EvalError> {
    if logits.shape != labels.shape {
        return Err(shape_mismatch(Opcode::SoftmaxCrossEntropy, logits, labels));
    }
    let log_softmax = rows(logits, log_softmax_row);
    let res = log_softmax.data.iter().zip(&*labels.data).map(|(&x, &y)| x * y).sum::<f64>();
    Ok(Tensor::scalar(-res))
}

pub(crate) fn call(op: Opcode, args: &[&Tensor], attrs: &Attrs) -> Result<Tensor, EvalError> {
    let expected = match op {
        Opcode::Zeros | Opcode::Ones => 0,
        Opcode::Add
        | Opcode::Subtract
        | Opcode::Multiply
        | Opcode::Divide
        | Opcode::Less
        | Opcode::Matmul
        | Opcode::SoftmaxCrossEntropy
        | Opcode::CollapseSumLike => 2,
        _ => 1,
    };
    if args.len() != expected {
        return Err(EvalError::OpArgCount { op, expected, found: args.len() });
    }

    let res = match op {
        Opcode::Add => binary(op, args[0], args[1], |a, b| a + b)?,
        Opcode::Subtract => binary(op, args[0], args[1], |a, b| a - b)?,
        Opcode::Multiply => binary(op, args[0], args[1], |a, b| a * b)?,
        Opcode::Divide => binary(op, args[0], args[1], |a, b| a / b)?,
        Opcode::Less => binary(op, args[0], args[1], |a, b| if a < b { 1.0 } else { 0.0 })?,
        Opcode::Negative => args[0].map(|x| -x),
        Opcode::Exp => args[0].map(f64::exp),
        Opcode::Log => args[0].map(f64::ln),
        Opcode::Sign => args[0].map(|x| if x == 0.0 { 0.0 } else { x.signum() }),
        Opcode::Relu => args[0].map(|x| x.max(0.0)),
        Opcode::Sum => Tensor::scalar(args[0].data.iter().sum()),
        Opcode::Matmul => matmul(args[0], args[1])?,
        Opcode::Transpose => transpose(args[0]),
        Opcode::Softmax => softmax(args[0]),
        Opcode::SoftmaxCrossEntropy => cross_entropy(args[0], args[1])?,
        Opcode::Zeros | Opcode::Ones => {
            let Attrs::Init { shape, .. } = attrs else {
                return Err(EvalError::MissingInitAttrs { op });
            };
            let shape: Vec<_> = shape.iter().map(|&dim| dim as usize).collect();
            let val = if op == Opcode::Ones { 1.0 } else { 0.0 };
            Tensor::full(&shape, val)
        }
        Opcode::ZerosLike => args[0].map(|_| 0.0),
        Opcode::OnesLike => args[0].map(|_| 1.0),
        Opcode::CollapseSumLike => collapse_sum_like(args[0], args[1])?,
    };
    Ok(res)
}
