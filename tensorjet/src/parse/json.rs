//! JSON graph documents → `Graph`.
//!
//! ```json
//! {"nodes": [
//!   {"name": "x", "op": "Placeholder", "dtype": "float32", "shape": [3]},
//!   {"name": "c", "op": "Const", "dtype": "float32", "value": [1, 2, 3]},
//!   {"name": "y", "op": "Mul", "inputs": ["x", "c"], "dtype": "float32", "shape": [3]}
//! ]}
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::ir::{element_count, DType, ElemType, Graph, Node, OpKind, TensorData, TensorValue};

#[derive(Debug, Deserialize)]
struct GraphDoc {
    nodes: Vec<NodeDoc>,
}

#[derive(Debug, Deserialize)]
struct NodeDoc {
    name: String,
    op: String,
    #[serde(default)]
    inputs: Vec<String>,
    dtype: String,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    #[serde(default)]
    value: Option<Value>,
}

pub fn from_path(path: impl AsRef<Path>) -> Result<Graph, String> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    from_str(&text)
}

pub fn from_str(text: &str) -> Result<Graph, String> {
    let doc: GraphDoc =
        serde_json::from_str(text).map_err(|e| format!("failed to parse graph document: {e}"))?;

    let mut graph = Graph::new();
    for node_doc in doc.nodes {
        let node = lower_node(node_doc)?;
        log::debug!("loaded {} ({})", node.name, node.kind);
        graph.add_node(node)?;
    }
    log::info!("loaded graph with {} nodes", graph.len());
    Ok(graph)
}

fn lower_node(doc: NodeDoc) -> Result<Node, String> {
    let dtype: DType = doc
        .dtype
        .parse()
        .map_err(|e| format!("node '{}': {e}", doc.name))?;

    // Control dependencies carry no data.
    let inputs: Vec<&str> = doc
        .inputs
        .iter()
        .filter(|i| !i.starts_with('^'))
        .map(String::as_str)
        .collect();

    let mut node = Node::new(
        doc.name.clone(),
        OpKind::from_tag(&doc.op),
        &inputs,
        dtype,
        doc.shape,
    );

    if let Some(raw) = &doc.value {
        // Payloads of dtypes the compiler cannot express are dropped; the
        // node itself is rejected later with a proper dtype error.
        if let Some(elem) = ElemType::from_dtype(dtype) {
            let value = parse_value(raw, elem).map_err(|e| format!("node '{}': {e}", doc.name))?;
            let value = match &node.shape {
                Some(shape) => value.reshaped(shape.clone()).ok_or_else(|| {
                    let needs = element_count(shape)
                        .map_or_else(|| "more than usize::MAX".to_string(), |n| n.to_string());
                    format!(
                        "node '{}': value has {} elements, shape {:?} needs {}",
                        doc.name,
                        value.len(),
                        shape,
                        needs
                    )
                })?,
                None => {
                    node.shape = Some(value.shape.clone());
                    value
                }
            };
            node.value = Some(value);
        }
    }

    Ok(node)
}

/// Flatten a number or nested array row-major, inferring its shape.
fn parse_value(raw: &Value, elem: ElemType) -> Result<TensorValue, String> {
    let mut shape = Vec::new();
    let mut scalars = Vec::new();
    collect(raw, 0, &mut shape, &mut scalars)?;

    let data = match elem {
        ElemType::F32 => TensorData::F32(
            scalars
                .iter()
                .map(|v| float(v).map(|x| x as f32))
                .collect::<Result<_, _>>()?,
        ),
        ElemType::F64 => {
            TensorData::F64(scalars.iter().map(|v| float(v)).collect::<Result<_, _>>()?)
        }
        ElemType::I32 => {
            TensorData::I32(scalars.iter().map(|v| int(v)).collect::<Result<_, _>>()?)
        }
    };
    TensorValue::new(shape, data).ok_or_else(|| "ragged value array".to_string())
}

fn collect<'v>(
    raw: &'v Value,
    depth: usize,
    shape: &mut Vec<usize>,
    out: &mut Vec<&'v Value>,
) -> Result<(), String> {
    match raw {
        Value::Array(items) => {
            match shape.get(depth) {
                Some(&n) if n != items.len() => return Err("ragged value array".to_string()),
                Some(_) => {}
                None if depth == shape.len() && out.is_empty() => shape.push(items.len()),
                None => return Err("ragged value array".to_string()),
            }
            for item in items {
                collect(item, depth + 1, shape, out)?;
            }
            Ok(())
        }
        _ if depth < shape.len() => Err("ragged value array".to_string()),
        _ => {
            out.push(raw);
            Ok(())
        }
    }
}

fn float(v: &Value) -> Result<f64, String> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("bad number {n}")),
        // JSON has no literal for these
        Value::String(s) => match s.as_str() {
            "NaN" | "nan" => Ok(f64::NAN),
            "Infinity" | "inf" => Ok(f64::INFINITY),
            "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
            _ => Err(format!("expected a number, got {s:?}")),
        },
        other => Err(format!("expected a number, got {other}")),
    }
}

fn int(v: &Value) -> Result<i32, String> {
    v.as_i64()
        .and_then(|x| i32::try_from(x).ok())
        .ok_or_else(|| format!("expected an int32, got {v}"))
}
