//! Compile-time evaluation of constant sub-expressions.
//!
//! The [`Evaluator`] trait is the seam to whatever can compute tensor values
//! for a graph. [`GraphEvaluator`] is the reference implementation: it folds
//! the arithmetic subset of the vocabulary over literal payloads.

use std::fmt;

use crate::error::CompileError;
use crate::ir::{node_name, Graph, Node, OpKind, TensorData, TensorValue};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Depends on a runtime input or on mutable state
    NotConstant { tensor: String },
    /// Referenced tensor does not exist in the graph
    Unknown { tensor: String },
    /// Kind the evaluator cannot fold
    Unsupported { tensor: String, kind: String },
    /// Inconsistent payload (dtype mix, shape mismatch, cycle, ...)
    Malformed { tensor: String, reason: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::NotConstant { tensor } => write!(f, "'{tensor}' is not constant"),
            EvalError::Unknown { tensor } => write!(f, "'{tensor}' does not exist"),
            EvalError::Unsupported { tensor, kind } => {
                write!(f, "cannot fold '{tensor}' of kind {kind}")
            }
            EvalError::Malformed { tensor, reason } => write!(f, "'{tensor}': {reason}"),
        }
    }
}

impl std::error::Error for EvalError {}

pub trait Evaluator {
    /// Compute the value of `tensor` in `graph`.
    fn evaluate(&self, graph: &Graph, tensor: &str) -> Result<TensorValue, EvalError>;
}

/// Everything constant evaluation needs, passed explicitly.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub graph: &'a Graph,
    pub evaluator: &'a dyn Evaluator,
}

/// Turns constant sub-expressions into literals for the translator.
pub struct ConstantEvaluator<'a> {
    ctx: EvalContext<'a>,
}

impl<'a> ConstantEvaluator<'a> {
    pub fn new(ctx: EvalContext<'a>) -> Self {
        Self { ctx }
    }

    /// Literal value of a `Const` node.
    pub fn literal(&self, node: &Node) -> Result<TensorValue, CompileError> {
        self.eval_input(node, &node.name)
    }

    /// Per-dimension `(start, stop)` pairs from two constant index tensors.
    pub fn slice_bounds(
        &self,
        node: &Node,
        start: &str,
        stop: &str,
    ) -> Result<Vec<(i64, i64)>, CompileError> {
        let starts = self.indices(node, start)?;
        let stops = self.indices(node, stop)?;
        if starts.len() != stops.len() {
            return Err(CompileError::InvalidSlice {
                node: node.name.clone(),
                reason: format!(
                    "{} start indices but {} stop indices",
                    starts.len(),
                    stops.len()
                ),
            });
        }
        Ok(starts.into_iter().zip(stops).collect())
    }

    fn indices(&self, node: &Node, tensor: &str) -> Result<Vec<i64>, CompileError> {
        let value = self.eval_input(node, tensor)?;
        value.as_indices().ok_or_else(|| CompileError::InvalidSlice {
            node: node.name.clone(),
            reason: format!("bounds '{tensor}' must be int32, got {}", value.dtype()),
        })
    }

    fn eval_input(&self, node: &Node, tensor: &str) -> Result<TensorValue, CompileError> {
        log::debug!("evaluate {tensor} for {}", node.name);
        self.ctx
            .evaluator
            .evaluate(self.ctx.graph, tensor)
            .map_err(|e| match e {
                EvalError::NotConstant { .. } => CompileError::NotConstant {
                    node: node.name.clone(),
                    input: tensor.to_string(),
                },
                other => CompileError::Evaluation {
                    node: node.name.clone(),
                    reason: other.to_string(),
                },
            })
    }
}

/// Folds `Const`, `Identity`, `Squeeze`, `Neg` and binary arithmetic.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphEvaluator;

impl Evaluator for GraphEvaluator {
    fn evaluate(&self, graph: &Graph, tensor: &str) -> Result<TensorValue, EvalError> {
        let mut visiting = Vec::new();
        fold(graph, node_name(tensor), &mut visiting)
    }
}

fn fold<'g>(
    graph: &'g Graph,
    name: &str,
    visiting: &mut Vec<&'g str>,
) -> Result<TensorValue, EvalError> {
    let node = graph.node(name).ok_or_else(|| EvalError::Unknown {
        tensor: name.to_string(),
    })?;
    if visiting.contains(&node.name.as_str()) {
        return Err(malformed(node, "cycle".into()));
    }
    visiting.push(&node.name);

    let result = match &node.kind {
        OpKind::Const => node
            .value
            .clone()
            .ok_or_else(|| malformed(node, "constant without a value".into())),
        OpKind::Placeholder | OpKind::Variable | OpKind::Assign => Err(EvalError::NotConstant {
            tensor: node.name.clone(),
        }),
        OpKind::Identity | OpKind::Squeeze => {
            let input = fold_input(graph, node, 0, visiting)?;
            match &node.shape {
                Some(shape) => input
                    .reshaped(shape.clone())
                    .ok_or_else(|| malformed(node, format!("cannot view as {shape:?}"))),
                None => Ok(input),
            }
        }
        OpKind::Neg => {
            let input = fold_input(graph, node, 0, visiting)?;
            let data = match input.data {
                TensorData::F32(v) => TensorData::F32(v.into_iter().map(|x| -x).collect()),
                TensorData::F64(v) => TensorData::F64(v.into_iter().map(|x| -x).collect()),
                TensorData::I32(v) => {
                    TensorData::I32(v.into_iter().map(|x| x.wrapping_neg()).collect())
                }
            };
            Ok(TensorValue {
                shape: input.shape,
                data,
            })
        }
        OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div | OpKind::Pow => {
            let lhs = fold_input(graph, node, 0, visiting)?;
            let rhs = fold_input(graph, node, 1, visiting)?;
            fold_binary(node, &lhs, &rhs)
        }
        OpKind::Slice | OpKind::Unsupported(_) => Err(EvalError::Unsupported {
            tensor: node.name.clone(),
            kind: node.kind.to_string(),
        }),
    };

    visiting.pop();
    if let Ok(value) = &result {
        log::debug!("folded {} -> shape {:?}", node.name, value.shape);
    }
    result
}

fn fold_input<'g>(
    graph: &'g Graph,
    node: &Node,
    idx: usize,
    visiting: &mut Vec<&'g str>,
) -> Result<TensorValue, EvalError> {
    let input = node
        .inputs
        .get(idx)
        .ok_or_else(|| malformed(node, format!("missing input {idx}")))?;
    fold(graph, node_name(input), visiting)
}

fn fold_binary(
    node: &Node,
    lhs: &TensorValue,
    rhs: &TensorValue,
) -> Result<TensorValue, EvalError> {
    let shape = if lhs.len() >= rhs.len() {
        lhs.shape.clone()
    } else {
        rhs.shape.clone()
    };
    let kind = &node.kind;

    let data = match (&lhs.data, &rhs.data) {
        (TensorData::F32(a), TensorData::F32(b)) => {
            TensorData::F32(broadcast(node, a, b, |x, y| float_op(kind, x, y))?)
        }
        (TensorData::F64(a), TensorData::F64(b)) => {
            TensorData::F64(broadcast(node, a, b, |x, y| float_op(kind, x, y))?)
        }
        (TensorData::I32(a), TensorData::I32(b)) => {
            let mut out = Vec::with_capacity(a.len().max(b.len()));
            for (x, y) in broadcast(node, a, b, |x, y| (x, y))? {
                let v = int_op(kind, x, y).ok_or_else(|| {
                    malformed(node, format!("{x} {kind} {y} overflows or divides by zero"))
                })?;
                out.push(v);
            }
            TensorData::I32(out)
        }
        (a, b) => {
            return Err(malformed(
                node,
                format!("operand dtypes {} and {} differ", a.elem(), b.elem()),
            ))
        }
    };

    TensorValue::new(shape, data).ok_or_else(|| malformed(node, "result shape mismatch".into()))
}

/// Element-wise zip where a single-element side is broadcast.
fn broadcast<T: Copy, R>(
    node: &Node,
    a: &[T],
    b: &[T],
    f: impl Fn(T, T) -> R,
) -> Result<Vec<R>, EvalError> {
    match (a.len(), b.len()) {
        (n, m) if n == m => Ok(a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()),
        (1, _) => Ok(b.iter().map(|&y| f(a[0], y)).collect()),
        (_, 1) => Ok(a.iter().map(|&x| f(x, b[0])).collect()),
        (n, m) => Err(malformed(node, format!("cannot broadcast {n} and {m} elements"))),
    }
}

trait Float:
    Copy
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
{
    fn powf(self, e: Self) -> Self;
}

impl Float for f32 {
    fn powf(self, e: Self) -> Self {
        f32::powf(self, e)
    }
}

impl Float for f64 {
    fn powf(self, e: Self) -> Self {
        f64::powf(self, e)
    }
}

fn float_op<T: Float>(kind: &OpKind, x: T, y: T) -> T {
    match kind {
        OpKind::Add => x + y,
        OpKind::Sub => x - y,
        OpKind::Mul => x * y,
        OpKind::Div => x / y,
        _ => x.powf(y),
    }
}

fn int_op(kind: &OpKind, x: i32, y: i32) -> Option<i32> {
    match kind {
        OpKind::Add => x.checked_add(y),
        OpKind::Sub => x.checked_sub(y),
        OpKind::Mul => x.checked_mul(y),
        OpKind::Div => x.checked_div(y),
        _ => u32::try_from(y).ok().and_then(|e| x.checked_pow(e)),
    }
}

fn malformed(node: &Node, reason: String) -> EvalError {
    EvalError::Malformed {
        tensor: node.name.clone(),
        reason,
    }
}
