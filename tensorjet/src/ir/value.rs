//! Literal tensor payloads: constant node values and folded results.

use std::fmt;

use super::graph::DType;

/// Element types the compiler can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    F32,
    F64,
    I32,
}

impl ElemType {
    /// Collapse a dtype onto its element type. `*Ref` dtypes map to their base.
    pub fn from_dtype(dtype: DType) -> Option<Self> {
        match dtype {
            DType::F32 | DType::F32Ref => Some(ElemType::F32),
            DType::F64 | DType::F64Ref => Some(ElemType::F64),
            DType::I32 | DType::I32Ref => Some(ElemType::I32),
            DType::I64 | DType::Bool | DType::String => None,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            ElemType::F32 => DType::F32,
            ElemType::F64 => DType::F64,
            ElemType::I32 => DType::I32,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElemType::F32 | ElemType::F64)
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dtype().as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem(&self) -> ElemType {
        match self {
            TensorData::F32(_) => ElemType::F32,
            TensorData::F64(_) => ElemType::F64,
            TensorData::I32(_) => ElemType::I32,
        }
    }
}

/// Number of elements a tensor of `shape` holds; `None` if it overflows `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// A concrete tensor value, elements stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl TensorValue {
    /// Returns `None` when the element count does not match the shape.
    pub fn new(shape: Vec<usize>, data: TensorData) -> Option<Self> {
        if element_count(&shape) != Some(data.len()) {
            return None;
        }
        Some(Self { shape, data })
    }

    pub fn scalar_f32(v: f32) -> Self {
        Self {
            shape: vec![],
            data: TensorData::F32(vec![v]),
        }
    }

    pub fn f32s(shape: Vec<usize>, values: Vec<f32>) -> Option<Self> {
        Self::new(shape, TensorData::F32(values))
    }

    pub fn i32s(shape: Vec<usize>, values: Vec<i32>) -> Option<Self> {
        Self::new(shape, TensorData::I32(values))
    }

    pub fn elem(&self) -> ElemType {
        self.data.elem()
    }

    pub fn dtype(&self) -> DType {
        self.elem().dtype()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Integer view used for compile-time index parameters.
    pub fn as_indices(&self) -> Option<Vec<i64>> {
        match &self.data {
            TensorData::I32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            _ => None,
        }
    }

    /// Reinterpret under a new shape with the same element count.
    pub fn reshaped(&self, shape: Vec<usize>) -> Option<Self> {
        Self::new(shape, self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_count_must_match_shape() {
        assert!(TensorValue::f32s(vec![2, 2], vec![1.0, 2.0, 3.0]).is_none());
        let v = TensorValue::f32s(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(v.len(), 4);
        assert_eq!(v.dtype(), DType::F32);
    }

    #[test]
    fn oversized_shape_never_matches() {
        let huge: Vec<usize> = vec![1 << 32, 1 << 32];
        assert_eq!(element_count(&huge), None);
        assert!(TensorValue::f32s(huge, vec![1.0]).is_none());
        assert_eq!(element_count(&[]), Some(1));
    }

    #[test]
    fn ref_dtypes_collapse() {
        assert_eq!(ElemType::from_dtype(DType::I32Ref), Some(ElemType::I32));
        assert_eq!(ElemType::from_dtype(DType::Bool), None);
    }

    #[test]
    fn only_int_payloads_are_indices() {
        let v = TensorValue::i32s(vec![2], vec![0, 2]).unwrap();
        assert_eq!(v.as_indices(), Some(vec![0, 2]));
        assert_eq!(TensorValue::scalar_f32(1.0).as_indices(), None);
    }
}
