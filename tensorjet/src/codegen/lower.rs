use std::collections::HashMap;

use crate::error::CompileError;
use crate::ir::{element_count, node_name, Graph, Node};

use super::classify::classify;
use super::eval::{ConstantEvaluator, EvalContext, Evaluator};
use super::ident::sanitize;
use super::ops::translate;
use super::plan::*;
use super::types::resolve_declared;
use super::CompileOptions;

/// Node name → binding, for every identifier defined so far.
#[derive(Debug, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn bind(&mut self, node: &str, binding: Binding) {
        self.bindings.insert(node.to_string(), binding);
    }

    pub fn get(&self, tensor: &str) -> Option<&Binding> {
        self.bindings.get(node_name(tensor))
    }

    /// Resolve an input of `node`, failing if it has not been bound yet.
    pub fn lookup(&self, node: &Node, tensor: &str) -> Result<Binding, CompileError> {
        self.get(tensor)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedIdentifier {
                node: node.name.clone(),
                input: tensor.to_string(),
            })
    }
}

/**
 * Lower a graph into a TranslationUnit returning `outputs` in order.
 */
pub fn lower(
    outputs: &[&str],
    graph: &Graph,
    options: &CompileOptions,
    evaluator: &dyn Evaluator,
) -> Result<TranslationUnit, CompileError> {
    options.validate()?;
    let classified = classify(graph);
    log::info!(
        "classified {} nodes: {} arguments, {} state, {} constants, {} ops",
        classified.len(),
        classified.arguments.len(),
        classified.state.len(),
        classified.constants.len(),
        classified.ops.len()
    );

    let constants = ConstantEvaluator::new(EvalContext { graph, evaluator });
    let mut scope = Scope::default();
    let mut unit = TranslationUnit::default();

    for node in &classified.constants {
        let binding = declare(node, BindingKind::Constant)?;
        let value = constants.literal(node)?;
        let fits = value.elem() == binding.ty.elem()
            && element_count(binding.ty.dims()) == Some(value.len());
        if !fits {
            return Err(CompileError::Evaluation {
                node: node.name.clone(),
                reason: format!(
                    "value of {} {:?} does not fit the declared {} {:?}",
                    value.dtype(),
                    value.shape,
                    binding.ty.elem(),
                    binding.ty.dims()
                ),
            });
        }
        scope.bind(&node.name, binding.clone());
        unit.constants.push(ConstantDecl { binding, value });
    }

    for node in &classified.arguments {
        let binding = declare(node, BindingKind::Argument)?;
        scope.bind(&node.name, binding.clone());
        unit.arguments.push(binding);
    }

    for node in &classified.state {
        let binding = declare(node, BindingKind::State)?;
        scope.bind(&node.name, binding.clone());
        unit.state.push(binding);
    }

    // Graph order must already be a dependency order; `translate` fails on
    // the first input that is not bound yet.
    for node in &classified.ops {
        let fragment = translate(node, &scope, &constants)?;
        if let Some(result) = fragment.result() {
            scope.bind(&node.name, result.clone());
        }
        unit.fragments.push(fragment);
    }

    for &output in outputs {
        let binding = scope
            .get(output)
            .cloned()
            .ok_or_else(|| CompileError::UndefinedIdentifier {
                node: "return".to_string(),
                input: output.to_string(),
            })?;
        unit.returns.push(binding);
    }

    log::info!(
        "lowered {} statements returning {} values",
        unit.fragments.len(),
        unit.returns.len()
    );
    Ok(unit)
}

/// Binding for a node declared outside the method body.
fn declare(node: &Node, kind: BindingKind) -> Result<Binding, CompileError> {
    Ok(Binding {
        node: node.name.clone(),
        ident: sanitize(&node.name),
        ty: resolve_declared(node)?,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::eval::GraphEvaluator;
    use crate::codegen::types::ResolvedType;
    use crate::ir::{DType, ElemType, OpKind, TensorValue};

    fn lower_default(outputs: &[&str], graph: &Graph) -> Result<TranslationUnit, CompileError> {
        lower(outputs, graph, &CompileOptions::default(), &GraphEvaluator)
    }

    /// Helper: `t = b * b * b * b` the way a graph builder emits it.
    fn make_power_graph() -> Graph {
        Graph::from_nodes(vec![
            Node::placeholder("b", DType::F32, Some(vec![])),
            Node::new("mul", OpKind::Mul, &["b:0", "b:0"], DType::F32, Some(vec![])),
            Node::new("mul_1", OpKind::Mul, &["mul:0", "b:0"], DType::F32, Some(vec![])),
            Node::new("t", OpKind::Mul, &["mul_1:0", "b:0"], DType::F32, Some(vec![])),
        ])
        .unwrap()
    }

    #[test]
    fn power_chain_lowers_to_three_multiplications() {
        let graph = make_power_graph();
        let unit = lower_default(&["t:0"], &graph).unwrap();

        assert_eq!(unit.arguments.len(), 1);
        assert_eq!(unit.arguments[0].ident, "b");
        assert_eq!(unit.returns.len(), 1);
        assert_eq!(unit.returns[0].ty, ResolvedType::Scalar(ElemType::F32));

        let muls: Vec<_> = unit
            .fragments
            .iter()
            .filter(|f| {
                matches!(
                    f.statement,
                    Statement::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(muls.len(), 3);
        assert_eq!(unit.fragments.len(), 3);

        // b feeds the first multiplication, the last one binds t
        match &unit.fragments[0].statement {
            Statement::Binary { lhs, rhs, .. } => {
                assert_eq!(lhs.ident, "b");
                assert_eq!(rhs.ident, "b");
            }
            other => panic!("Expected Binary, got {other:?}"),
        }
        assert_eq!(unit.fragments[2].binds.as_ref().unwrap().ident, "t");
    }

    #[test]
    fn returns_follow_requested_order() {
        let graph = Graph::from_nodes(vec![
            Node::placeholder("a", DType::F32, None),
            Node::new("x", OpKind::Add, &["a", "a"], DType::F32, Some(vec![])),
            Node::new("y", OpKind::Sub, &["a", "a"], DType::F32, Some(vec![])),
        ])
        .unwrap();
        let unit = lower_default(&["y", "x"], &graph).unwrap();
        let idents: Vec<_> = unit.returns.iter().map(|b| b.ident.as_str()).collect();
        assert_eq!(idents, ["y", "x"]);
    }

    #[test]
    fn out_of_order_graph_rejected() {
        let graph = Graph::from_nodes(vec![
            Node::placeholder("a", DType::F32, None),
            Node::new("y", OpKind::Mul, &["x", "a"], DType::F32, Some(vec![])),
            Node::new("x", OpKind::Add, &["a", "a"], DType::F32, Some(vec![])),
        ])
        .unwrap();
        let err = lower_default(&["y"], &graph).unwrap_err();
        assert_eq!(
            err,
            CompileError::UndefinedIdentifier {
                node: "y".into(),
                input: "x".into()
            }
        );
    }

    #[test]
    fn unknown_output_rejected() {
        let graph = make_power_graph();
        let err = lower_default(&["nope"], &graph).unwrap_err();
        assert!(matches!(err, CompileError::UndefinedIdentifier { .. }), "got: {err}");
    }

    #[test]
    fn unsupported_op_aborts_lowering() {
        let graph = Graph::from_nodes(vec![
            Node::placeholder("a", DType::F32, None),
            Node::new("loop", OpKind::from_tag("While"), &["a"], DType::F32, None),
        ])
        .unwrap();
        let err = lower_default(&["a"], &graph).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperation { .. }));
    }

    #[test]
    fn constants_carry_their_literal() {
        let graph = Graph::from_nodes(vec![
            Node::constant(
                "scale/w",
                TensorValue::f32s(vec![2], vec![0.5, 1.5]).unwrap(),
            ),
            Node::placeholder("x", DType::F32, Some(vec![2])),
            Node::new("y", OpKind::Mul, &["x", "scale/w"], DType::F32, Some(vec![2])),
        ])
        .unwrap();
        let unit = lower_default(&["y"], &graph).unwrap();
        assert_eq!(unit.constants.len(), 1);
        assert_eq!(unit.constants[0].binding.ident, "tj__5_scale1_w");
        assert_eq!(unit.constants[0].value.len(), 2);
    }

    #[test]
    fn constant_payload_must_match_declaration() {
        let mut node = Node::constant("c", TensorValue::scalar_f32(1.0));
        node.shape = Some(vec![3]);
        let graph = Graph::from_nodes(vec![node]).unwrap();
        let err = lower_default(&[], &graph).unwrap_err();
        assert!(matches!(err, CompileError::Evaluation { .. }), "got: {err}");
    }

    #[test]
    fn constant_with_overflowing_shape_rejected() {
        let mut node = Node::constant("c", TensorValue::scalar_f32(1.0));
        node.shape = Some(vec![1 << 32, 1 << 32]);
        let graph = Graph::from_nodes(vec![node]).unwrap();
        let err = lower_default(&[], &graph).unwrap_err();
        assert!(matches!(err, CompileError::Evaluation { .. }), "got: {err}");
    }

    #[test]
    fn assign_output_resolves_to_state_field() {
        let graph = Graph::from_nodes(vec![
            Node::placeholder("x", DType::F32, None),
            Node::variable("counter", DType::F32Ref, vec![]),
            Node::new("next", OpKind::Add, &["counter", "x"], DType::F32, Some(vec![])),
            Node::new(
                "update",
                OpKind::Assign,
                &["counter", "next"],
                DType::F32Ref,
                Some(vec![]),
            ),
        ])
        .unwrap();
        let unit = lower_default(&["update:0"], &graph).unwrap();
        assert_eq!(unit.state.len(), 1);
        assert_eq!(unit.returns[0].kind, BindingKind::State);
        assert_eq!(unit.returns[0].ident, "counter");
    }

    #[test]
    fn invalid_options_rejected_before_lowering() {
        let graph = make_power_graph();
        let options = CompileOptions {
            method_name: "not a name".into(),
            ..CompileOptions::default()
        };
        let err = lower(&["t"], &graph, &options, &GraphEvaluator).unwrap_err();
        assert!(matches!(err, CompileError::InvalidOption(_)), "got: {err}");
    }

    #[test]
    fn slice_bound_from_placeholder_is_not_constant() {
        let graph = Graph::from_nodes(vec![
            Node::placeholder("x", DType::F32, Some(vec![3])),
            Node::placeholder("start", DType::I32, Some(vec![1])),
            Node::constant("stop", TensorValue::i32s(vec![1], vec![2]).unwrap()),
            Node::new("s", OpKind::Slice, &["x", "start", "stop"], DType::F32, Some(vec![2])),
        ])
        .unwrap();
        let err = lower_default(&["s"], &graph).unwrap_err();
        assert_eq!(
            err,
            CompileError::NotConstant {
                node: "s".into(),
                input: "start".into()
            }
        );
    }
}
