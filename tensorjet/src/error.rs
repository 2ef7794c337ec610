use std::fmt;

use crate::ir::DType;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Node dtype outside {float32, float64, int32} and their ref variants
    UnsupportedDtype { node: String, dtype: DType },
    /// Operation kind with no translator
    UnsupportedOperation { node: String, kind: String },
    /// A compile-time parameter depends on a placeholder or variable
    NotConstant { node: String, input: String },
    /// An op (or a requested output) references a name not bound yet
    UndefinedIdentifier { node: String, input: String },
    /// The formatting step failed or could not be run
    FormatterFailure(String),
    /// Non-placeholder node without a static shape
    MissingShape { node: String },
    /// Shape the target types cannot express
    UnsupportedRank { node: String, rank: usize },
    /// Shape with a zero extent
    InvalidShape { node: String, shape: Vec<usize> },
    /// Wrong number of inputs for the node's kind
    Arity {
        node: String,
        kind: String,
        expected: usize,
        found: usize,
    },
    /// Slice bounds that do not describe a non-empty in-range window
    InvalidSlice { node: String, reason: String },
    /// Assign whose target is not a state field
    InvalidAssign { node: String, target: String },
    /// Element-wise operands of different extents
    ShapeMismatch {
        node: String,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    /// Operand or declared types that disagree (element type or extents)
    TypeMismatch {
        node: String,
        expected: String,
        found: String,
    },
    /// The evaluator failed for a reason other than non-constness
    Evaluation { node: String, reason: String },
    /// Unit, method or module name is not a plain identifier
    InvalidOption(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnsupportedDtype { node, dtype } => {
                write!(f, "node '{node}': unsupported dtype {dtype}")
            }
            CompileError::UnsupportedOperation { node, kind } => {
                write!(f, "node '{node}': unsupported operation '{kind}'")
            }
            CompileError::NotConstant { node, input } => write!(
                f,
                "node '{node}': input '{input}' is not a compile-time constant"
            ),
            CompileError::UndefinedIdentifier { node, input } => write!(
                f,
                "node '{node}': '{input}' is referenced before it is defined"
            ),
            CompileError::FormatterFailure(msg) => write!(f, "formatter failed: {msg}"),
            CompileError::MissingShape { node } => {
                write!(f, "node '{node}': no static shape")
            }
            CompileError::UnsupportedRank { node, rank } => {
                write!(f, "node '{node}': rank {rank} tensors are not supported")
            }
            CompileError::InvalidShape { node, shape } => {
                write!(f, "node '{node}': invalid shape {shape:?}")
            }
            CompileError::Arity {
                node,
                kind,
                expected,
                found,
            } => write!(
                f,
                "node '{node}': {kind} expects {expected} inputs, found {found}"
            ),
            CompileError::InvalidSlice { node, reason } => {
                write!(f, "node '{node}': invalid slice: {reason}")
            }
            CompileError::InvalidAssign { node, target } => write!(
                f,
                "node '{node}': assignment target '{target}' is not a state variable"
            ),
            CompileError::ShapeMismatch { node, lhs, rhs } => {
                write!(f, "node '{node}': operand shapes {lhs:?} and {rhs:?} differ")
            }
            CompileError::TypeMismatch {
                node,
                expected,
                found,
            } => write!(f, "node '{node}': expected {expected}, found {found}"),
            CompileError::Evaluation { node, reason } => {
                write!(f, "node '{node}': constant evaluation failed: {reason}")
            }
            CompileError::InvalidOption(msg) => write!(f, "invalid option: {msg}"),
        }
    }
}

impl std::error::Error for CompileError {}
