use std::fmt;

/// A dense row major tensor. All element types are evaluated as `f64`,
/// booleans are represented as `0.0`/`1.0`.
#[derive(Clone, PartialEq, Debug)]
pub struct Tensor {
    pub shape: Box<[usize]>,
    pub data: Box<[f64]>,
}

impl Tensor {
    pub fn new(shape: &[usize], data: impl Into<Box<[f64]>>) -> Tensor {
        let data = data.into();
        assert_eq!(shape.iter().product::<usize>(), data.len(), "tensor data does not match {shape:?}");
        Tensor { shape: shape.into(), data }
    }

    pub fn scalar(val: f64) -> Tensor {
        Tensor::new(&[], [val])
    }

    pub fn full(shape: &[usize], val: f64) -> Tensor {
        Tensor::from_fn(shape, |_| val)
    }

    pub fn from_fn(shape: &[usize], f: impl FnMut(usize) -> f64) -> Tensor {
        let len = shape.iter().product();
        Tensor { shape: shape.into(), data: (0..len).map(f).collect() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The value of a rank 0 tensor
    pub fn item(&self) -> Option<f64> {
        if self.shape.is_empty() {
            Some(self.data[0])
        } else {
            None
        }
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor { shape: self.shape.clone(), data: self.data.iter().map(|&x| f(x)).collect() }
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.shape, self.data)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Tensor(Tensor),
    Tuple(Box<[Value]>),
}

impl Value {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(tensor) => Some(tensor),
            Value::Tuple(_) => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(fields) => Some(fields),
            Value::Tensor(_) => None,
        }
    }
}

impl From<Tensor> for Value {
    fn from(tensor: Tensor) -> Value {
        Value::Tensor(tensor)
    }
}
