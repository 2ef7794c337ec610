//! Partition graph nodes by role.

use crate::ir::{Graph, Node, OpKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Runtime input → method parameter
    Argument,
    /// Mutable, persisted across calls → instance field
    State,
    /// Fixed at compile time → literal declaration
    Constant,
    /// Everything else → one statement in the method body
    Computed,
}

impl NodeRole {
    pub fn of(kind: &OpKind) -> Self {
        match kind {
            OpKind::Placeholder => NodeRole::Argument,
            OpKind::Variable => NodeRole::State,
            OpKind::Const => NodeRole::Constant,
            _ => NodeRole::Computed,
        }
    }
}

/// The four role buckets, each in graph order.
#[derive(Debug, Default)]
pub struct Classified<'g> {
    pub arguments: Vec<&'g Node>,
    pub state: Vec<&'g Node>,
    pub constants: Vec<&'g Node>,
    pub ops: Vec<&'g Node>,
}

impl Classified<'_> {
    pub fn len(&self) -> usize {
        self.arguments.len() + self.state.len() + self.constants.len() + self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single forward pass over the graph's node list.
///
/// Does not check that `ops` is topologically ordered; lowering does.
pub fn classify(graph: &Graph) -> Classified<'_> {
    let mut out = Classified::default();
    for node in graph.nodes() {
        let role = NodeRole::of(&node.kind);
        log::debug!("classify {} ({}) -> {:?}", node.name, node.kind, role);
        match role {
            NodeRole::Argument => out.arguments.push(node),
            NodeRole::State => out.state.push(node),
            NodeRole::Constant => out.constants.push(node),
            NodeRole::Computed => out.ops.push(node),
        }
    }
    out
}
