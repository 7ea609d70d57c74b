//! Tree nodes and edges with lock-free statistics.
//!
//! Nodes live in an append-only arena and are shared across search threads;
//! every mutable field is an atomic. Float accumulators are CAS loops over
//! the bit pattern, counters are plain fetch_add, and edge-to-child links are
//! compare-exchange so exactly one thread wins a concurrent link.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use bz_core::{GameAdapter, Outcome};

pub type NodeId = u32;

/// Sentinel for an unlinked edge.
pub const NONE_NODE: NodeId = u32::MAX;

/// f32 accumulator on top of an AtomicU32 bit pattern.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(v: f32) -> Self {
        Self {
            bits: AtomicU32::new(v.to_bits()),
        }
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn store(&self, v: f32) {
        self.bits.store(v.to_bits(), Ordering::Release);
    }

    pub fn fetch_add(&self, v: f32) {
        let mut cur = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(cur) + v).to_bits();
            match self.bits.compare_exchange_weak(
                cur,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(seen) => cur = seen,
            }
        }
    }
}

/// Proven game-theoretic status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvedState {
    Unsolved,
    Win,
    Draw,
    Loss,
}

impl SolvedState {
    pub fn from_outcome(o: Outcome) -> Self {
        match o {
            Outcome::Win => SolvedState::Win,
            Outcome::Draw => SolvedState::Draw,
            Outcome::Loss => SolvedState::Loss,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => SolvedState::Win,
            2 => SolvedState::Draw,
            3 => SolvedState::Loss,
            _ => SolvedState::Unsolved,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SolvedState::Unsolved => 0,
            SolvedState::Win => 1,
            SolvedState::Draw => 2,
            SolvedState::Loss => 3,
        }
    }

    /// Analytic backup value, side-to-move perspective.
    pub fn value(self) -> f32 {
        match self {
            SolvedState::Unsolved => 0.0,
            SolvedState::Win => 1.0,
            SolvedState::Draw => 0.0,
            SolvedState::Loss => -1.0,
        }
    }
}

const EVAL_PENDING: u8 = 0;
const EVAL_DONE: u8 = 1;

/// Move metadata captured at node creation, so prior assignment never needs
/// the game state again.
#[derive(Debug, Clone, Copy)]
pub struct EdgeSpec<M> {
    pub mv: M,
    pub policy_idx: usize,
    pub mirrored_policy_idx: usize,
}

/// Collect edge metadata for every legal move of `state`.
pub fn edge_specs<G: GameAdapter>(state: &G) -> Vec<EdgeSpec<G::Move>> {
    state
        .legal_moves()
        .into_iter()
        .map(|mv| EdgeSpec {
            mv,
            policy_idx: state.policy_index(mv),
            mirrored_policy_idx: state.mirrored_policy_index(mv),
        })
        .collect()
}

/// One parent-to-child edge. Visit, value and virtual-loss statistics live on
/// the edge so a transposed child can be reached through several parents with
/// independent edge stats.
#[derive(Debug)]
pub struct Edge<M> {
    mv: M,
    policy_idx: usize,
    mirrored_policy_idx: usize,
    prior: AtomicF32,
    visits: AtomicU32,
    w: AtomicF32,
    vl: AtomicU32,
    child: AtomicU32,
}

impl<M: Copy> Edge<M> {
    fn new(spec: EdgeSpec<M>) -> Self {
        Self {
            mv: spec.mv,
            policy_idx: spec.policy_idx,
            mirrored_policy_idx: spec.mirrored_policy_idx,
            prior: AtomicF32::new(0.0),
            visits: AtomicU32::new(0),
            w: AtomicF32::new(0.0),
            vl: AtomicU32::new(0),
            child: AtomicU32::new(NONE_NODE),
        }
    }

    pub fn mv(&self) -> M {
        self.mv
    }

    /// Policy-head index for this move, honoring the encoding mirror flag.
    pub fn policy_index(&self, mirrored: bool) -> usize {
        if mirrored {
            self.mirrored_policy_idx
        } else {
            self.policy_idx
        }
    }

    pub fn prior(&self) -> f32 {
        self.prior.load()
    }

    pub fn set_prior(&self, p: f32) {
        self.prior.store(p);
    }

    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Acquire)
    }

    pub fn virtual_visits(&self) -> u32 {
        self.vl.load(Ordering::Acquire)
    }

    /// Completed plus in-flight visits, what a selection policy should rank
    /// against to spread a mini-batch.
    pub fn effective_visits(&self) -> u32 {
        self.visits() + self.virtual_visits()
    }

    pub fn w(&self) -> f32 {
        self.w.load()
    }

    /// Mean backed-up value over completed visits, parent perspective.
    pub fn q(&self) -> f32 {
        let n = self.visits();
        if n == 0 {
            0.0
        } else {
            self.w.load() / n as f32
        }
    }

    pub fn child_id(&self) -> Option<NodeId> {
        let id = self.child.load(Ordering::Acquire);
        if id == NONE_NODE {
            None
        } else {
            Some(id)
        }
    }

    /// Link `id` as this edge's child unless another thread already linked
    /// one; returns the id that ended up linked.
    pub fn link_child(&self, id: NodeId) -> NodeId {
        match self.child.compare_exchange(
            NONE_NODE,
            id,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => id,
            Err(existing) => existing,
        }
    }

    pub fn add_virtual_loss(&self) {
        self.vl.fetch_add(1, Ordering::AcqRel);
    }

    pub fn remove_virtual_loss(&self) {
        let _ = self
            .vl
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some(v.saturating_sub(1))
            });
    }

    /// Fold one completed visit into the edge and release its reservation.
    pub fn backup(&self, v: f32) {
        self.visits.fetch_add(1, Ordering::AcqRel);
        self.w.fetch_add(v);
        self.remove_virtual_loss();
    }
}

/// A search node: position hash, outgoing edges, and aggregate statistics.
///
/// Terminal nodes carry no edges and are created already evaluated with a
/// solved state; expanded nodes are created pending and flip to evaluated
/// once priors and a first value have been assigned.
#[derive(Debug)]
pub struct Node<M> {
    hash: u64,
    edges: Vec<Edge<M>>,
    visits: AtomicU32,
    value_sum: AtomicF32,
    nn_value: AtomicF32,
    solved: AtomicU8,
    eval_state: AtomicU8,
}

impl<M: Copy> Node<M> {
    pub fn new_pending(hash: u64, specs: Vec<EdgeSpec<M>>) -> Self {
        Self {
            hash,
            edges: specs.into_iter().map(Edge::new).collect(),
            visits: AtomicU32::new(0),
            value_sum: AtomicF32::new(0.0),
            nn_value: AtomicF32::new(0.0),
            solved: AtomicU8::new(SolvedState::Unsolved.as_u8()),
            eval_state: AtomicU8::new(EVAL_PENDING),
        }
    }

    pub fn new_terminal(hash: u64, outcome: Outcome) -> Self {
        Self {
            hash,
            edges: Vec::new(),
            visits: AtomicU32::new(0),
            value_sum: AtomicF32::new(0.0),
            nn_value: AtomicF32::new(outcome.value()),
            solved: AtomicU8::new(SolvedState::from_outcome(outcome).as_u8()),
            eval_state: AtomicU8::new(EVAL_DONE),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn edges(&self) -> &[Edge<M>] {
        &self.edges
    }

    pub fn edge(&self, idx: usize) -> &Edge<M> {
        &self.edges[idx]
    }

    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::Acquire)
    }

    pub fn value_sum(&self) -> f32 {
        self.value_sum.load()
    }

    /// Mean value, side to move at this node. Before any completed visit,
    /// falls back to the raw evaluation.
    pub fn q(&self) -> f32 {
        let n = self.visits();
        if n == 0 {
            self.nn_value.load()
        } else {
            self.value_sum.load() / n as f32
        }
    }

    pub fn nn_value(&self) -> f32 {
        self.nn_value.load()
    }

    pub fn set_nn_value(&self, v: f32) {
        self.nn_value.store(v);
    }

    pub fn solved(&self) -> SolvedState {
        SolvedState::from_u8(self.solved.load(Ordering::Acquire))
    }

    /// Still waiting for its evaluation result.
    pub fn is_pending(&self) -> bool {
        self.eval_state.load(Ordering::Acquire) == EVAL_PENDING
    }

    /// Priors and nn_value must be written before this; the Release store
    /// publishes them to threads that observe the node as evaluated.
    pub fn mark_evaluated(&self) {
        self.eval_state.store(EVAL_DONE, Ordering::Release);
    }

    /// Fold one completed visit into the node aggregate.
    pub fn update(&self, v: f32) {
        self.visits.fetch_add(1, Ordering::AcqRel);
        self.value_sum.fetch_add(v);
    }
}
