pub mod graph;
pub mod value;

pub use graph::{node_name, DType, Graph, Node, OpKind};
pub use value::{element_count, ElemType, TensorData, TensorValue};
