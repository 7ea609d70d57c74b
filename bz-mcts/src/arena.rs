//! Append-only node store with stable ids.
//!
//! Nodes are never removed or reallocated for the lifetime of a search, so a
//! `NodeId` handed out once stays valid; readers clone the `Arc` and drop the
//! lock before touching the node.

use std::sync::{Arc, RwLock};

use crate::node::{Node, NodeId};

pub struct NodeArena<M> {
    nodes: RwLock<Vec<Arc<Node<M>>>>,
}

impl<M: Copy> NodeArena<M> {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    pub fn push(&self, node: Arc<Node<M>>) -> NodeId {
        let mut nodes = self.nodes.write().unwrap();
        let id = nodes.len() as NodeId;
        nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Arc<Node<M>> {
        Arc::clone(&self.nodes.read().unwrap()[id as usize])
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every node currently in the arena.
    pub fn snapshot(&self) -> Vec<Arc<Node<M>>> {
        self.nodes.read().unwrap().clone()
    }
}

impl<M: Copy> Default for NodeArena<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use bz_core::Outcome;

    #[test]
    fn push_returns_sequential_ids() {
        let arena: NodeArena<u8> = NodeArena::new();
        assert!(arena.is_empty());
        let a = arena.push(Arc::new(Node::new_terminal(1, Outcome::Win)));
        let b = arena.push(Arc::new(Node::new_terminal(2, Outcome::Loss)));
        assert_eq!((a, b), (0, 1));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(b).hash(), 2);
    }
}
