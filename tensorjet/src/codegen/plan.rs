//! Translation-unit IR
//!
//! Produced by `lower()`, consumed by `render()`. Everything in here is
//! already resolved: identifiers are sanitized, types are known and every
//! compile-time parameter is a literal.

use crate::ir::TensorValue;

use super::types::ResolvedType;

/// Where a bound identifier lives in the generated unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Method parameter
    Argument,
    /// Private field of the unit, read and written through `self`
    State,
    /// Module-level `const`
    Constant,
    /// `let` binding in the method body
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Graph node the identifier was derived from.
    pub node: String,
    pub ident: String,
    pub ty: ResolvedType,
    pub kind: BindingKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDecl {
    pub binding: Binding,
    pub value: TensorValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// How an element-wise operation meets its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementwiseForm {
    /// Both scalars: a plain infix expression
    Scalar,
    /// Both arrays of equal extents: `lhs.zip_map(&rhs, ..)`
    Zip,
    /// Array lhs, scalar rhs: `lhs.map(..)`
    MapLhs,
    /// Scalar lhs, array rhs: `rhs.map(..)`
    MapRhs,
}

/// Half-open index range `start..stop` along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    pub start: usize,
    pub stop: usize,
}

impl SliceRange {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }
}

/// Emitted shape of a slice, chosen from the source rank and the result type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceForm {
    /// Whole scalar: the source itself
    Alias,
    /// Single element of an array
    Index(Vec<usize>),
    /// `fixed_rows::<len>(start)`
    Rows { start: usize, len: usize },
    /// `fixed_view::<rows, cols>(row, col)`
    View {
        start: (usize, usize),
        size: (usize, usize),
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Binary {
        op: BinaryOp,
        lhs: Binding,
        rhs: Binding,
        form: ElementwiseForm,
    },
    Negate {
        operand: Binding,
    },
    Pow {
        base: Binding,
        exponent: Binding,
        form: ElementwiseForm,
    },
    /// In-place write of `value` into a state field.
    Assign {
        target: Binding,
        value: Binding,
    },
    /// Straight rebinding (Identity, Squeeze).
    Alias {
        source: Binding,
    },
    /// Same elements, row-major, under a different target type.
    Reshape {
        source: Binding,
        to: ResolvedType,
    },
    Slice {
        source: Binding,
        ranges: Vec<SliceRange>,
        form: SliceForm,
    },
}

/// One statement of the method body, tied to the node it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFragment {
    pub node: String,
    /// New identifier introduced by the statement; `None` for in-place writes.
    pub binds: Option<Binding>,
    pub statement: Statement,
}

impl CompiledFragment {
    /// Binding later references to this node resolve to: the new identifier,
    /// or the written state field for an assignment.
    pub fn result(&self) -> Option<&Binding> {
        match (&self.binds, &self.statement) {
            (Some(binding), _) => Some(binding),
            (None, Statement::Assign { target, .. }) => Some(target),
            (None, _) => None,
        }
    }
}

/// Complete, ordered content of one generated unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationUnit {
    pub constants: Vec<ConstantDecl>,
    pub arguments: Vec<Binding>,
    pub state: Vec<Binding>,
    pub fragments: Vec<CompiledFragment>,
    /// Method results, in the caller's output order.
    pub returns: Vec<Binding>,
}
