//! Arena of [`crate::node::Node`]s with a replay cursor (spec §3/§4.5,
//! "NodeStack"). Grounded on `examples/original_source/nodestack.h`'s
//! `NodeStack`, reshaped from an intrusive doubly-linked list into an
//! arena + index (spec §9's guidance for cyclic object graphs).

use crate::node::Node;

/// Arena index for a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The DPOR backtracking tree, flattened into an arena plus a replay
/// position.
///
/// During fresh exploration, `explore_action` appends a new `Node`. During
/// replay, it instead advances `pos` and returns the existing `Node` at that
/// position — the node whose recorded choice the driver is expected to
/// re-enact (spec §4.5).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "checkpoint", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeStack {
    nodes: Vec<Node>,
    /// Position of the next node to hand back during replay.
    pos: usize,
}

impl NodeStack {
    pub fn new(root_enabled: Vec<bool>) -> NodeStack {
        NodeStack {
            nodes: vec![Node::new(None, root_enabled)],
            pos: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Either creates a fresh node as a child of `current` (new exploration)
    /// or returns the id of the node already recorded at the present replay
    /// position (spec §4.5).
    pub(crate) fn explore_action(&mut self, current: NodeId, enabled: Vec<bool>) -> NodeId {
        if self.pos < self.nodes.len() {
            let id = NodeId(self.pos as u32);
            self.pos += 1;
            return id;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(Some(current), enabled));
        self.pos = self.nodes.len();
        id
    }

    /// Rewinds the replay cursor without discarding nodes, so the next
    /// execution re-walks previously created nodes instead of creating
    /// duplicates (spec §4.5).
    pub(crate) fn reset_execution(&mut self) {
        self.pos = 1;
    }

    pub fn total_nodes(&self) -> usize {
        self.nodes.len()
    }
}
