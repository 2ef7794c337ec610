//! (dtype, shape) → target type.

use std::fmt;

use crate::error::CompileError;
use crate::ir::{DType, ElemType, Node, OpKind};

/// Highest rank the fixed-size matrix target can express.
pub const MAX_RANK: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    Scalar(ElemType),
    Array(ElemType, Vec<usize>),
}

impl ResolvedType {
    pub fn elem(&self) -> ElemType {
        match self {
            ResolvedType::Scalar(e) | ResolvedType::Array(e, _) => *e,
        }
    }

    /// Extents of the value; empty for scalars.
    pub fn dims(&self) -> &[usize] {
        match self {
            ResolvedType::Scalar(_) => &[],
            ResolvedType::Array(_, dims) => dims,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ResolvedType::Scalar(_))
    }

    pub fn rank(&self) -> usize {
        self.dims().len()
    }

    /// `(rows, cols)` of the matrix this type is emitted as.
    /// Rank-1 arrays are column vectors.
    pub fn matrix_dims(&self) -> (usize, usize) {
        match self.dims() {
            [] => (1, 1),
            [n] => (*n, 1),
            [r, c, ..] => (*r, *c),
        }
    }

    /// True if both types are emitted as the same Rust type.
    /// `[n]` and `[n, 1]` are both `SMatrix<_, n, 1>`.
    pub fn same_target(&self, other: &ResolvedType) -> bool {
        self.elem() == other.elem()
            && self.is_scalar() == other.is_scalar()
            && self.matrix_dims() == other.matrix_dims()
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Scalar(elem) => write!(f, "{elem} scalar"),
            ResolvedType::Array(elem, dims) => write!(f, "{elem} {dims:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    UnsupportedDtype(DType),
    ZeroExtent(Vec<usize>),
}

/// An empty shape or `[1]` is a scalar, anything else an array.
pub fn resolve(dtype: DType, shape: &[usize]) -> Result<ResolvedType, ResolveError> {
    let elem = ElemType::from_dtype(dtype).ok_or(ResolveError::UnsupportedDtype(dtype))?;
    if shape.contains(&0) {
        return Err(ResolveError::ZeroExtent(shape.to_vec()));
    }
    match shape {
        [] | [1] => Ok(ResolvedType::Scalar(elem)),
        dims => Ok(ResolvedType::Array(elem, dims.to_vec())),
    }
}

/// Resolve a node's declared output type.
///
/// A missing shape annotation falls back to a scalar only when
/// `allow_missing_shape` is set; callers pass it for placeholders.
pub fn resolve_node(node: &Node, allow_missing_shape: bool) -> Result<ResolvedType, CompileError> {
    let shape = match &node.shape {
        Some(shape) => shape.as_slice(),
        None if allow_missing_shape => &[],
        None => {
            return Err(CompileError::MissingShape {
                node: node.name.clone(),
            })
        }
    };
    let ty = resolve(node.dtype, shape).map_err(|e| match e {
        ResolveError::UnsupportedDtype(dtype) => CompileError::UnsupportedDtype {
            node: node.name.clone(),
            dtype,
        },
        ResolveError::ZeroExtent(shape) => CompileError::InvalidShape {
            node: node.name.clone(),
            shape,
        },
    })?;
    if ty.rank() > MAX_RANK {
        return Err(CompileError::UnsupportedRank {
            node: node.name.clone(),
            rank: ty.rank(),
        });
    }
    Ok(ty)
}

/// `resolve_node` with the placeholder exemption applied.
pub fn resolve_declared(node: &Node) -> Result<ResolvedType, CompileError> {
    resolve_node(node, node.kind == OpKind::Placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_unit_shapes_are_scalar() {
        for dtype in [DType::F32, DType::F64, DType::I32, DType::F32Ref] {
            let elem = ElemType::from_dtype(dtype).unwrap();
            assert_eq!(resolve(dtype, &[]).unwrap(), ResolvedType::Scalar(elem));
            assert_eq!(resolve(dtype, &[1]).unwrap(), ResolvedType::Scalar(elem));
        }
    }

    #[test]
    fn other_shapes_are_arrays() {
        assert_eq!(
            resolve(DType::F32, &[3, 1]).unwrap(),
            ResolvedType::Array(ElemType::F32, vec![3, 1])
        );
        assert_eq!(
            resolve(DType::I32Ref, &[2]).unwrap(),
            ResolvedType::Array(ElemType::I32, vec![2])
        );
        assert_eq!(
            resolve(DType::F64, &[1, 1]).unwrap(),
            ResolvedType::Array(ElemType::F64, vec![1, 1])
        );
    }

    #[test]
    fn unsupported_dtype_is_an_error() {
        assert_eq!(
            resolve(DType::I64, &[]),
            Err(ResolveError::UnsupportedDtype(DType::I64))
        );
        let node = Node::placeholder("flag", DType::Bool, None);
        let err = resolve_declared(&node).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedDtype { .. }), "got: {err}");
    }

    #[test]
    fn missing_shape_only_allowed_for_placeholders() {
        let arg = Node::placeholder("b", DType::F32, None);
        assert_eq!(
            resolve_declared(&arg).unwrap(),
            ResolvedType::Scalar(ElemType::F32)
        );

        let op = Node::new("t", OpKind::Mul, &["b", "b"], DType::F32, None);
        let err = resolve_declared(&op).unwrap_err();
        assert_eq!(err, CompileError::MissingShape { node: "t".into() });
    }

    #[test]
    fn rank_three_rejected() {
        let node = Node::placeholder("x", DType::F32, Some(vec![2, 2, 2]));
        let err = resolve_declared(&node).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedRank { rank: 3, .. }));
    }

    #[test]
    fn column_vectors_share_a_target() {
        let v = ResolvedType::Array(ElemType::F32, vec![3]);
        assert!(v.same_target(&ResolvedType::Array(ElemType::F32, vec![3, 1])));
        assert!(!v.same_target(&ResolvedType::Array(ElemType::F32, vec![1, 3])));
        assert!(!v.same_target(&ResolvedType::Array(ElemType::F64, vec![3])));
        assert!(!ResolvedType::Scalar(ElemType::F32)
            .same_target(&ResolvedType::Array(ElemType::F32, vec![1, 1])));
    }

    #[test]
    fn zero_extent_rejected() {
        let node = Node::placeholder("x", DType::F32, Some(vec![0, 3]));
        let err = resolve_declared(&node).unwrap_err();
        assert!(matches!(err, CompileError::InvalidShape { .. }));
    }
}
