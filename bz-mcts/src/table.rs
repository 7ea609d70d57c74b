//! Shared transposition table: position hash to arena id.
//!
//! Lookups dominate, so the map sits behind a read-write lock with a
//! double-checked fast path on insert. Node creation happens under the write
//! lock so a hash maps to exactly one node even when two threads reach the
//! same new position in the same round.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use crate::arena::NodeArena;
use crate::node::{Node, NodeId};

pub struct TranspositionTable {
    map: RwLock<FxHashMap<u64, NodeId>>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn lookup(&self, hash: u64) -> Option<NodeId> {
        self.map.read().unwrap().get(&hash).copied()
    }

    /// Return the node registered for `hash`, creating and registering one if
    /// absent. The bool is true when this call created the node.
    pub fn find_or_create<M: Copy>(
        &self,
        hash: u64,
        arena: &NodeArena<M>,
        make: impl FnOnce() -> Node<M>,
    ) -> (NodeId, bool) {
        if let Some(id) = self.lookup(hash) {
            return (id, false);
        }
        let mut map = self.map.write().unwrap();
        if let Some(&id) = map.get(&hash) {
            return (id, false);
        }
        let id = arena.push(Arc::new(make()));
        map.insert(hash, id);
        (id, true)
    }

    pub fn insert(&self, hash: u64, id: NodeId) {
        self.map.write().unwrap().insert(hash, id);
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}
