//! Core graph types: the read-only input of the compiler.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::value::TensorValue;

/// Element type tag carried by a node's output.
///
/// `*Ref` variants are the reference flavours produced by mutable state
/// (e.g. reading a variable); they compile to the same element type as their
/// base dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    F32Ref,
    F64Ref,
    I32Ref,
    I64,
    Bool,
    String,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::F32Ref => "float32_ref",
            DType::F64Ref => "float64_ref",
            DType::I32Ref => "int32_ref",
            DType::I64 => "int64",
            DType::Bool => "bool",
            DType::String => "string",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s {
            "float32" | "float" => DType::F32,
            "float64" | "double" => DType::F64,
            "int32" | "int" => DType::I32,
            "float32_ref" | "float_ref" => DType::F32Ref,
            "float64_ref" | "double_ref" => DType::F64Ref,
            "int32_ref" | "int_ref" => DType::I32Ref,
            "int64" => DType::I64,
            "bool" => DType::Bool,
            "string" => DType::String,
            other => return Err(format!("unknown dtype '{other}'")),
        };
        Ok(dtype)
    }
}

/// Operation-kind tag of a node.
///
/// Tags outside the supported vocabulary are kept verbatim in
/// `Unsupported` so that classification still succeeds and dispatch can
/// report the offending kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKind {
    Placeholder,
    Variable,
    Const,
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Pow,
    Assign,
    Identity,
    Squeeze,
    Slice,
    Unsupported(String),
}

impl OpKind {
    /// Parse an operation tag. Never fails: unknown tags become `Unsupported`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Placeholder" => OpKind::Placeholder,
            "Variable" | "VariableV2" => OpKind::Variable,
            "Const" => OpKind::Const,
            "Add" | "AddV2" => OpKind::Add,
            "Sub" => OpKind::Sub,
            "Mul" => OpKind::Mul,
            "Div" | "RealDiv" => OpKind::Div,
            "Neg" => OpKind::Neg,
            "Pow" => OpKind::Pow,
            "Assign" => OpKind::Assign,
            "Identity" => OpKind::Identity,
            "Squeeze" => OpKind::Squeeze,
            "Slice" => OpKind::Slice,
            other => OpKind::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OpKind::Placeholder => "Placeholder",
            OpKind::Variable => "Variable",
            OpKind::Const => "Const",
            OpKind::Add => "Add",
            OpKind::Sub => "Sub",
            OpKind::Mul => "Mul",
            OpKind::Div => "Div",
            OpKind::Neg => "Neg",
            OpKind::Pow => "Pow",
            OpKind::Assign => "Assign",
            OpKind::Identity => "Identity",
            OpKind::Squeeze => "Squeeze",
            OpKind::Slice => "Slice",
            OpKind::Unsupported(tag) => tag,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of the source graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: OpKind,
    /// Producing tensor names, in operand order. May carry an `:N` suffix.
    pub inputs: Vec<String>,
    pub dtype: DType,
    /// `None` when the node has no static shape annotation.
    pub shape: Option<Vec<usize>>,
    /// Literal payload, only meaningful for `Const` nodes.
    pub value: Option<TensorValue>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        kind: OpKind,
        inputs: &[&str],
        dtype: DType,
        shape: Option<Vec<usize>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            dtype,
            shape,
            value: None,
        }
    }

    pub fn placeholder(name: impl Into<String>, dtype: DType, shape: Option<Vec<usize>>) -> Self {
        Self::new(name, OpKind::Placeholder, &[], dtype, shape)
    }

    pub fn variable(name: impl Into<String>, dtype: DType, shape: Vec<usize>) -> Self {
        Self::new(name, OpKind::Variable, &[], dtype, Some(shape))
    }

    /// A `Const` node whose dtype and shape are taken from `value`.
    pub fn constant(name: impl Into<String>, value: TensorValue) -> Self {
        let mut node = Self::new(
            name,
            OpKind::Const,
            &[],
            value.dtype(),
            Some(value.shape.clone()),
        );
        node.value = Some(value);
        node
    }
}

/// Strip the `:N` output suffix from a tensor reference.
pub fn node_name(tensor: &str) -> &str {
    match tensor.rsplit_once(':') {
        Some((base, index)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            base
        }
        _ => tensor,
    }
}

/// An ordered, name-indexed list of nodes.
///
/// Node order is the order supplied by the producer and is expected to be a
/// valid topological order.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, String> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node)?;
        }
        Ok(graph)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), String> {
        if self.index.contains_key(&node.name) {
            return Err(format!("duplicate node name '{}'", node.name));
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up the node producing `tensor` (output suffix allowed).
    pub fn node(&self, tensor: &str) -> Option<&Node> {
        self.index
            .get(node_name(tensor))
            .map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
