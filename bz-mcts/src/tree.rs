//! The shared search tree: arena plus transposition table plus root.
//!
//! One `SearchTree` is built per search and shared by every worker thread
//! through an `Arc`. With transpositions enabled the tree is a DAG; each
//! position hash maps to a single node reachable through any number of
//! parent edges.

use std::sync::Arc;

use bz_core::{GameAdapter, Outcome};

use crate::arena::NodeArena;
use crate::node::{edge_specs, Node, NodeId};
use crate::table::TranspositionTable;

pub struct SearchTree<M> {
    arena: NodeArena<M>,
    table: TranspositionTable,
    root: NodeId,
    use_transpositions: bool,
}

impl<M: Copy> SearchTree<M> {
    /// Build a tree rooted at `root_state`. A terminal root is stored solved
    /// and makes every search round a no-op.
    pub fn new<G: GameAdapter<Move = M>>(root_state: &G, use_transpositions: bool) -> Self {
        let arena = NodeArena::new();
        let table = TranspositionTable::new();
        let hash = root_state.hash_key();
        let node = match root_state.terminal() {
            Some(outcome) => Node::new_terminal(hash, outcome),
            None => Node::new_pending(hash, edge_specs(root_state)),
        };
        let root = arena.push(Arc::new(node));
        if use_transpositions {
            table.insert(hash, root);
        }
        Self {
            arena,
            table,
            root,
            use_transpositions,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Arc<Node<M>> {
        self.arena.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn use_transpositions(&self) -> bool {
        self.use_transpositions
    }

    /// Distinct positions registered for sharing.
    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    /// Snapshot of all nodes, for inspection and invariant checks.
    pub fn nodes(&self) -> Vec<Arc<Node<M>>> {
        self.arena.snapshot()
    }

    /// Node for a newly reached unevaluated position. With transpositions
    /// enabled this dedupes on the hash; the bool is true when the node was
    /// created by this call.
    pub fn find_or_create_pending(
        &self,
        hash: u64,
        make: impl FnOnce() -> Node<M>,
    ) -> (NodeId, bool) {
        if self.use_transpositions {
            self.table.find_or_create(hash, &self.arena, make)
        } else {
            (self.arena.push(Arc::new(make())), true)
        }
    }

    /// Node for a newly reached terminal position.
    pub fn find_or_create_terminal(&self, hash: u64, outcome: Outcome) -> NodeId {
        if self.use_transpositions {
            self.table
                .find_or_create(hash, &self.arena, || Node::new_terminal(hash, outcome))
                .0
        } else {
            self.arena.push(Arc::new(Node::new_terminal(hash, outcome)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SolvedState;
    use bz_core::CountingGame;

    #[test]
    fn root_of_a_live_game_is_pending_with_edges() {
        let tree = SearchTree::new(&CountingGame::new(5), true);
        let root = tree.get(tree.root());
        assert!(root.is_pending());
        assert_eq!(root.edges().len(), 3);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.table_len(), 1);
    }

    #[test]
    fn terminal_root_is_solved() {
        let mut g = CountingGame::new(1);
        use bz_core::GameAdapter;
        g.apply(1);
        let tree = SearchTree::new(&g, true);
        assert_eq!(tree.get(tree.root()).solved(), SolvedState::Loss);
    }

    #[test]
    fn transpositions_dedupe_on_hash() {
        let tree = SearchTree::new(&CountingGame::new(5), true);
        let (a, created_a) = tree.find_or_create_pending(99, || Node::new_pending(99, vec![]));
        let (b, created_b) = tree.find_or_create_pending(99, || Node::new_pending(99, vec![]));
        assert!(created_a && !created_b);
        assert_eq!(a, b);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn without_transpositions_every_creation_is_fresh() {
        let tree = SearchTree::new(&CountingGame::new(5), false);
        let (a, _) = tree.find_or_create_pending(99, || Node::new_pending(99, vec![]));
        let (b, _) = tree.find_or_create_pending(99, || Node::new_pending(99, vec![]));
        assert_ne!(a, b);
        assert_eq!(tree.table_len(), 0);
    }
}
