//! Per-kind translation of computed nodes into fragments.

use crate::error::CompileError;
use crate::ir::{element_count, Node, OpKind};

use super::eval::ConstantEvaluator;
use super::ident::sanitize;
use super::lower::Scope;
use super::plan::*;
use super::types::{resolve_declared, ResolvedType};

/// Translate one computed node. Every input it reads must already be in
/// `scope`.
pub fn translate(
    node: &Node,
    scope: &Scope,
    constants: &ConstantEvaluator,
) -> Result<CompiledFragment, CompileError> {
    match &node.kind {
        OpKind::Add => binary(node, scope, BinaryOp::Add),
        OpKind::Sub => binary(node, scope, BinaryOp::Sub),
        OpKind::Mul => binary(node, scope, BinaryOp::Mul),
        OpKind::Div => binary(node, scope, BinaryOp::Div),
        OpKind::Neg => negate(node, scope),
        OpKind::Pow => pow(node, scope),
        OpKind::Assign => assign(node, scope),
        OpKind::Identity | OpKind::Squeeze => alias(node, scope),
        OpKind::Slice => slice(node, scope, constants),
        // Declarations, never statements
        OpKind::Placeholder | OpKind::Variable | OpKind::Const | OpKind::Unsupported(_) => {
            Err(CompileError::UnsupportedOperation {
                node: node.name.clone(),
                kind: node.kind.to_string(),
            })
        }
    }
}

fn expect_inputs(node: &Node, expected: usize) -> Result<&[String], CompileError> {
    if node.inputs.len() != expected {
        return Err(CompileError::Arity {
            node: node.name.clone(),
            kind: node.kind.to_string(),
            expected,
            found: node.inputs.len(),
        });
    }
    Ok(&node.inputs)
}

/// The `let` binding a node introduces, typed from its own declaration.
fn local(node: &Node) -> Result<Binding, CompileError> {
    Ok(Binding {
        node: node.name.clone(),
        ident: sanitize(&node.name),
        ty: resolve_declared(node)?,
        kind: BindingKind::Local,
    })
}

fn fragment(node: &Node, binds: Option<Binding>, statement: Statement) -> CompiledFragment {
    log::debug!("translate {} ({}) -> {:?}", node.name, node.kind, statement);
    CompiledFragment {
        node: node.name.clone(),
        binds,
        statement,
    }
}

fn elementwise_form(
    node: &Node,
    lhs: &ResolvedType,
    rhs: &ResolvedType,
) -> Result<ElementwiseForm, CompileError> {
    match (lhs.is_scalar(), rhs.is_scalar()) {
        (true, true) => Ok(ElementwiseForm::Scalar),
        (false, true) => Ok(ElementwiseForm::MapLhs),
        (true, false) => Ok(ElementwiseForm::MapRhs),
        (false, false) if lhs.dims() == rhs.dims() => Ok(ElementwiseForm::Zip),
        (false, false) => Err(CompileError::ShapeMismatch {
            node: node.name.clone(),
            lhs: lhs.dims().to_vec(),
            rhs: rhs.dims().to_vec(),
        }),
    }
}

fn mismatch(node: &Node, expected: &ResolvedType, found: &ResolvedType) -> CompileError {
    CompileError::TypeMismatch {
        node: node.name.clone(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Fail unless `produced` is emitted as the node's declared type.
fn expect_type(
    node: &Node,
    declared: &ResolvedType,
    produced: &ResolvedType,
) -> Result<(), CompileError> {
    if declared.same_target(produced) {
        Ok(())
    } else {
        Err(mismatch(node, declared, produced))
    }
}

/// Both operands of an element-wise node must share an element type; the
/// result takes the array side's type, or either side's when both are scalars.
fn elementwise_result(
    node: &Node,
    lhs: &Binding,
    rhs: &Binding,
) -> Result<(ElementwiseForm, ResolvedType), CompileError> {
    if lhs.ty.elem() != rhs.ty.elem() {
        return Err(mismatch(node, &lhs.ty, &rhs.ty));
    }
    let form = elementwise_form(node, &lhs.ty, &rhs.ty)?;
    let produced = match form {
        ElementwiseForm::MapRhs => rhs.ty.clone(),
        ElementwiseForm::Scalar | ElementwiseForm::Zip | ElementwiseForm::MapLhs => {
            lhs.ty.clone()
        }
    };
    Ok((form, produced))
}

fn binary(node: &Node, scope: &Scope, op: BinaryOp) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 2)?;
    let lhs = scope.lookup(node, &inputs[0])?;
    let rhs = scope.lookup(node, &inputs[1])?;
    let (form, produced) = elementwise_result(node, &lhs, &rhs)?;
    let binds = local(node)?;
    expect_type(node, &binds.ty, &produced)?;
    Ok(fragment(
        node,
        Some(binds),
        Statement::Binary { op, lhs, rhs, form },
    ))
}

fn negate(node: &Node, scope: &Scope) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 1)?;
    let operand = scope.lookup(node, &inputs[0])?;
    let binds = local(node)?;
    expect_type(node, &binds.ty, &operand.ty)?;
    Ok(fragment(node, Some(binds), Statement::Negate { operand }))
}

/// Scalar `powf` when both sides are scalars, element-wise otherwise.
fn pow(node: &Node, scope: &Scope) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 2)?;
    let base = scope.lookup(node, &inputs[0])?;
    let exponent = scope.lookup(node, &inputs[1])?;
    let (form, produced) = elementwise_result(node, &base, &exponent)?;
    let binds = local(node)?;
    expect_type(node, &binds.ty, &produced)?;
    Ok(fragment(
        node,
        Some(binds),
        Statement::Pow {
            base,
            exponent,
            form,
        },
    ))
}

fn assign(node: &Node, scope: &Scope) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 2)?;
    let target = scope.lookup(node, &inputs[0])?;
    if target.kind != BindingKind::State {
        return Err(CompileError::InvalidAssign {
            node: node.name.clone(),
            target: target.node,
        });
    }
    let value = scope.lookup(node, &inputs[1])?;
    expect_type(node, &target.ty, &value.ty)?;
    Ok(fragment(node, None, Statement::Assign { target, value }))
}

/// Identity and Squeeze. A source emitted under a different type with the
/// same element count (`[1, n]` squeezed to `[n]`) is reshaped.
fn alias(node: &Node, scope: &Scope) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 1)?;
    let source = scope.lookup(node, &inputs[0])?;
    let binds = local(node)?;
    if source.ty.elem() != binds.ty.elem() {
        return Err(mismatch(node, &binds.ty, &source.ty));
    }
    if binds.ty.same_target(&source.ty) {
        return Ok(fragment(node, Some(binds), Statement::Alias { source }));
    }
    if element_count(source.ty.dims()) != element_count(binds.ty.dims()) {
        return Err(CompileError::ShapeMismatch {
            node: node.name.clone(),
            lhs: source.ty.dims().to_vec(),
            rhs: binds.ty.dims().to_vec(),
        });
    }
    let to = binds.ty.clone();
    Ok(fragment(node, Some(binds), Statement::Reshape { source, to }))
}

fn slice(
    node: &Node,
    scope: &Scope,
    constants: &ConstantEvaluator,
) -> Result<CompiledFragment, CompileError> {
    let inputs = expect_inputs(node, 3)?;
    let source = scope.lookup(node, &inputs[0])?;
    let bounds = constants.slice_bounds(node, &inputs[1], &inputs[2])?;
    let binds = local(node)?;
    if source.ty.elem() != binds.ty.elem() {
        return Err(mismatch(node, &binds.ty, &source.ty));
    }

    let invalid = |reason: String| CompileError::InvalidSlice {
        node: node.name.clone(),
        reason,
    };

    // A scalar is any shape of all-ones extents, so every range must be 0..1
    let extents: Vec<usize> = if source.ty.is_scalar() {
        vec![1; bounds.len()]
    } else {
        source.ty.dims().to_vec()
    };
    if bounds.len() != extents.len() {
        return Err(invalid(format!(
            "{} ranges for a rank {} input",
            bounds.len(),
            extents.len()
        )));
    }

    let mut ranges = Vec::with_capacity(bounds.len());
    for (&(start, stop), &extent) in bounds.iter().zip(&extents) {
        let in_range = 0 <= start && start < stop && stop <= extent as i64;
        if !in_range {
            return Err(invalid(format!(
                "range ({start}, {stop}) outside 0..{extent}"
            )));
        }
        ranges.push(SliceRange {
            start: start as usize,
            stop: stop as usize,
        });
    }

    let form = if source.ty.is_scalar() {
        expect_type(node, &binds.ty, &source.ty)?;
        SliceForm::Alias
    } else if binds.ty.is_scalar() {
        if ranges.iter().any(|r| r.len() != 1) {
            return Err(invalid("scalar result from a multi-element range".into()));
        }
        SliceForm::Index(ranges.iter().map(|r| r.start).collect())
    } else {
        let (form, produced) = match ranges.as_slice() {
            [r] => (
                SliceForm::Rows {
                    start: r.start,
                    len: r.len(),
                },
                (r.len(), 1),
            ),
            [r, c] => (
                SliceForm::View {
                    start: (r.start, c.start),
                    size: (r.len(), c.len()),
                },
                (r.len(), c.len()),
            ),
            _ => return Err(invalid(format!("rank {} input", ranges.len()))),
        };
        if produced != binds.ty.matrix_dims() {
            return Err(invalid(format!(
                "declared shape {:?} does not match the {}x{} window",
                binds.ty.dims(),
                produced.0,
                produced.1
            )));
        }
        form
    };

    Ok(fragment(
        node,
        Some(binds),
        Statement::Slice {
            source,
            ranges,
            form,
        },
    ))
}
