//! The per-thread search loop: build a mini-batch of leaves, evaluate it in
//! one call, assign values and priors, back everything up.
//!
//! Each worker owns a `SearchThread` over one shared [`SearchTree`]. A round
//! descends from the root until the batch is full or the round's rollout
//! budget is spent, classifying every finished descent as a new leaf, a
//! terminal, a transposition or a collision. Virtual loss is applied to a
//! trajectory the moment it is finalized and released exactly once per edge
//! when the trajectory is backed up or discarded, so between rounds no
//! reservation is left anywhere in the tree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use bz_core::{GameAdapter, Outcome, SearchLimits, SearchSettings};

use crate::batch::BatchBuffers;
use crate::eval::{EvalError, Evaluator};
use crate::explore::{sample_exploration_depth, select_enhanced_edge, uniform_edge};
use crate::node::{edge_specs, Edge, Node, NodeId, SolvedState};
use crate::policy::TreePolicy;
use crate::tree::SearchTree;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid settings: {msg}")]
    InvalidSettings { msg: &'static str },
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// How a finished descent classified its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// Unseen position, scheduled into the batch.
    NewNode,
    /// Solved position with an analytic value.
    Terminal,
    /// Known evaluated position reached through a new edge; its stored value
    /// is reused without another evaluation.
    Transposition,
    /// Position still awaiting evaluation; the descent is abandoned and only
    /// its reservations are rolled back.
    Collision,
    /// Interior edge, keep descending.
    Unknown,
}

/// One step of a descent: the node left and the edge taken.
#[derive(Debug, Clone, Copy)]
struct Visit {
    node: NodeId,
    edge: usize,
}

type Trajectory = Vec<Visit>;

/// A batch slot claimed for a freshly created node.
#[derive(Debug, Clone, Copy)]
struct NewLeaf {
    node: NodeId,
    batch_idx: usize,
    mirrored: bool,
    tablebase: Option<Outcome>,
}

/// Per-thread counters, readable after (or between) rounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub rounds: u64,
    pub rollouts: u64,
    pub new_nodes: u64,
    pub terminals: u64,
    pub transpositions: u64,
    pub collisions: u64,
    pub tb_hits: u64,
    pub depth_sum: u64,
    pub depth_max: usize,
}

impl SearchStats {
    pub fn avg_depth(&self) -> f32 {
        if self.rollouts == 0 {
            0.0
        } else {
            self.depth_sum as f32 / self.rollouts as f32
        }
    }
}

pub struct SearchThread<G: GameAdapter, P: TreePolicy<G::Move>> {
    tree: Arc<SearchTree<G::Move>>,
    root_state: G,
    policy: P,
    settings: SearchSettings,
    limits: SearchLimits,
    batch: BatchBuffers,
    new_leaves: Vec<NewLeaf>,
    new_trajectories: Vec<Trajectory>,
    terminal_backups: Vec<(Trajectory, NodeId, f32)>,
    transposition_backups: Vec<(Trajectory, NodeId, f32)>,
    collision_trajectories: Vec<Trajectory>,
    rng: ChaCha8Rng,
    running: Arc<AtomicBool>,
    thread_id: u64,
    root_in_tablebase: bool,
    stats: SearchStats,
}

fn validate(s: &SearchSettings) -> Result<(), SearchError> {
    if s.batch_size == 0 {
        return Err(SearchError::InvalidSettings {
            msg: "batch_size must be positive",
        });
    }
    if !(s.virtual_loss.is_finite() && s.virtual_loss >= 0.0) {
        return Err(SearchError::InvalidSettings {
            msg: "virtual_loss must be finite and non-negative",
        });
    }
    if !(0.0..=1.0).contains(&s.epsilon_greedy) {
        return Err(SearchError::InvalidSettings {
            msg: "epsilon_greedy must be in [0, 1]",
        });
    }
    if !(s.policy_temperature.is_finite() && s.policy_temperature > 0.0) {
        return Err(SearchError::InvalidSettings {
            msg: "policy_temperature must be positive",
        });
    }
    if s.threads == 0 {
        return Err(SearchError::InvalidSettings {
            msg: "threads must be positive",
        });
    }
    Ok(())
}

impl<G: GameAdapter, P: TreePolicy<G::Move>> SearchThread<G, P> {
    pub fn new(
        tree: Arc<SearchTree<G::Move>>,
        root_state: G,
        policy: P,
        settings: SearchSettings,
        limits: SearchLimits,
        running: Arc<AtomicBool>,
        thread_id: u64,
    ) -> Result<Self, SearchError> {
        validate(&settings)?;
        let seed = settings.seed ^ thread_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let root_in_tablebase = root_state.probe_tablebase().is_some();
        let batch = BatchBuffers::new(settings.batch_size, G::PLANE_LEN, G::ACTION_SPACE, 0);
        Ok(Self {
            tree,
            root_state,
            policy,
            settings,
            limits,
            batch,
            new_leaves: Vec::new(),
            new_trajectories: Vec::new(),
            terminal_backups: Vec::new(),
            transposition_backups: Vec::new(),
            collision_trajectories: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            running,
            thread_id,
            root_in_tablebase,
            stats: SearchStats::default(),
        })
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn tree(&self) -> &SearchTree<G::Move> {
        &self.tree
    }

    /// Serializable per-thread summary for the NDJSON log.
    pub fn stats_event(&self, run_id: &str) -> bz_logging::SearchStatsEventV1 {
        bz_logging::SearchStatsEventV1 {
            event: "search_stats_v1",
            ts_ms: bz_logging::now_ms(),
            run_id: run_id.to_string(),
            thread_id: self.thread_id,
            rounds: self.stats.rounds,
            rollouts: self.stats.rollouts,
            new_nodes: self.stats.new_nodes,
            terminals: self.stats.terminals,
            transpositions: self.stats.transpositions,
            collisions: self.stats.collisions,
            tb_hits: self.stats.tb_hits,
            depth_avg: self.stats.avg_depth(),
            depth_max: self.stats.depth_max,
            node_count: self.tree.node_count(),
        }
    }

    /// Run rounds until the stop flag drops, a limit trips, the root is
    /// solved, or the tree stops growing.
    ///
    /// A saturated state space keeps producing rollouts (all terminals,
    /// transpositions and collisions) without ever tripping a node limit, so
    /// progress is measured by expansion: a run of expansion-free rounds
    /// means there is nothing left for this thread to add. The window covers
    /// rounds spent waiting on positions other threads still have pending.
    pub fn run<E: Evaluator>(&mut self, evaluator: &E) -> Result<(), SearchError> {
        const MAX_STALE_ROUNDS: u32 = 8;

        self.batch.set_aux_len(evaluator.aux_len());
        let start = Instant::now();
        let mut stale_rounds = 0u32;
        while self.running.load(Ordering::Acquire) && self.limits_allow(&start) {
            if self.tree.get(self.tree.root()).solved() != SolvedState::Unsolved {
                break;
            }
            let expanded_before = self.stats.new_nodes;
            if !self.round(evaluator)? {
                break;
            }
            if self.stats.new_nodes == expanded_before {
                stale_rounds += 1;
                if stale_rounds >= MAX_STALE_ROUNDS {
                    break;
                }
            } else {
                stale_rounds = 0;
            }
        }
        Ok(())
    }

    /// One batch round. Returns whether any rollout was attempted.
    pub fn round<E: Evaluator>(&mut self, evaluator: &E) -> Result<bool, SearchError> {
        self.batch.clear();
        self.new_leaves.clear();
        let rollouts_before = self.stats.rollouts;
        self.create_mini_batch();
        if !self.batch.is_empty() {
            let (inputs, n, out) = self.batch.eval_views();
            evaluator.evaluate(inputs, n, out)?;
            self.assign_eval_results();
        }
        self.backup_value_outputs();
        self.backup_collisions();
        self.stats.rounds += 1;
        Ok(self.stats.rollouts > rollouts_before)
    }

    fn limits_allow(&self, start: &Instant) -> bool {
        let l = &self.limits;
        if l.nodes > 0 && self.tree.node_count() as u64 >= l.nodes {
            return false;
        }
        if l.time_ms > 0 && start.elapsed().as_millis() as u64 >= l.time_ms {
            return false;
        }
        if l.max_depth > 0 && self.stats.depth_max >= l.max_depth {
            return false;
        }
        true
    }

    /// Fill the batch by distributing this round's rollout budget from the
    /// root. An unexpanded root is itself the whole first batch; a solved
    /// root leaves the round empty.
    fn create_mini_batch(&mut self) {
        let root_id = self.tree.root();
        let root = self.tree.get(root_id);
        if root.solved() != SolvedState::Unsolved {
            return;
        }
        if root.is_pending() {
            self.stats.rollouts += 1;
            self.stats.new_nodes += 1;
            let (batch_idx, slot) = self.batch.push_slot();
            let mirrored = self.root_state.encode(slot);
            let tablebase = if self.root_in_tablebase {
                self.root_state.probe_tablebase()
            } else {
                None
            };
            self.new_leaves.push(NewLeaf {
                node: root_id,
                batch_idx,
                mirrored,
                tablebase,
            });
            self.new_trajectories.push(Vec::new());
            return;
        }
        let budget = self.settings.batch_size;
        let state = self.root_state.clone();
        let mut prefix = Vec::new();
        self.split_budget(root_id, &state, budget, &mut prefix);
    }

    /// Spread `budget` rollouts below `node_id`. The budget is shared across
    /// the policy's top K edges; a share of one becomes a plain rollout, a
    /// larger share recurses through an evaluated unsolved child, and shares
    /// against anything else degrade to forced rollouts through that edge.
    fn split_budget(&mut self, node_id: NodeId, state: &G, budget: usize, prefix: &mut Trajectory) {
        if budget == 0 || self.batch.is_full() {
            return;
        }
        if budget == 1 {
            self.single_rollout(state.clone(), prefix.clone(), node_id, None);
            return;
        }
        let node = self.tree.get(node_id);
        let k = budget.min(node.edges().len());
        let picks = self.policy.select_top_k(&node, k, &self.settings);
        if picks.is_empty() {
            return;
        }
        let base = budget / picks.len();
        let extra = budget % picks.len();
        for (rank, &edge_idx) in picks.iter().enumerate() {
            if self.batch.is_full() {
                return;
            }
            let share = base + usize::from(rank < extra);
            if share == 0 {
                continue;
            }
            let continuation = node.edge(edge_idx).child_id().and_then(|cid| {
                let child = self.tree.get(cid);
                (share > 1
                    && self.handle_returns(&child, node.edge(edge_idx)) == LeafKind::Unknown
                    && !child.edges().is_empty())
                .then_some(cid)
            });
            match continuation {
                Some(cid) => {
                    let mut next = state.clone();
                    next.apply(node.edge(edge_idx).mv());
                    prefix.push(Visit {
                        node: node_id,
                        edge: edge_idx,
                    });
                    self.split_budget(cid, &next, share, prefix);
                    prefix.pop();
                }
                None => {
                    for _ in 0..share {
                        if self.batch.is_full() {
                            return;
                        }
                        self.single_rollout(
                            state.clone(),
                            prefix.clone(),
                            node_id,
                            Some(edge_idx),
                        );
                    }
                }
            }
        }
    }

    /// Descend from `start` until the trajectory terminates in a leaf class,
    /// then finalize it. `forced` pins the first edge choice.
    fn single_rollout(
        &mut self,
        mut state: G,
        mut traj: Trajectory,
        start: NodeId,
        mut forced: Option<usize>,
    ) {
        self.stats.rollouts += 1;
        let mut random_plies = 0;
        if self.settings.epsilon_greedy > 0.0
            && self.rng.gen::<f32>() < self.settings.epsilon_greedy
        {
            random_plies =
                sample_exploration_depth(&mut self.rng, self.settings.max_exploration_depth);
        }
        let mut node_id = start;
        loop {
            let node = self.tree.get(node_id);
            debug_assert!(!node.edges().is_empty());
            let edge_idx = match forced.take() {
                Some(f) => f,
                None => self.choose_edge(&node, &state, traj.len(), random_plies),
            };
            let mv = node.edge(edge_idx).mv();
            state.apply(mv);
            traj.push(Visit {
                node: node_id,
                edge: edge_idx,
            });
            let (next, kind) = self.resolve_child(&node, edge_idx, &state);
            if kind == LeafKind::Unknown {
                node_id = next;
                continue;
            }
            self.finish_rollout(kind, next, traj);
            return;
        }
    }

    /// Edge choice for one descent step: a randomized prefix while the
    /// exploration budget lasts, an unexplored forcing move on probe
    /// rollouts, otherwise the tree policy.
    fn choose_edge(
        &mut self,
        node: &Node<G::Move>,
        state: &G,
        depth: usize,
        random_plies: usize,
    ) -> usize {
        if depth < random_plies {
            return uniform_edge(&mut self.rng, node.edges().len());
        }
        let every = self.settings.enhanced_check_every;
        if every > 0 && self.stats.rollouts % every == 0 {
            if let Some(idx) = select_enhanced_edge(node, state) {
                return idx;
            }
        }
        self.policy.select(node, &self.settings)
    }

    /// Classify an already-linked child seen again through `edge`.
    /// Precedence: solved beats pending beats transposition; anything else
    /// is an interior edge.
    fn handle_returns(&self, child: &Node<G::Move>, edge: &Edge<G::Move>) -> LeafKind {
        if child.solved() != SolvedState::Unsolved {
            return LeafKind::Terminal;
        }
        if child.is_pending() {
            return LeafKind::Collision;
        }
        if self.tree.use_transpositions() && child.visits() > edge.visits() {
            return LeafKind::Transposition;
        }
        LeafKind::Unknown
    }

    /// Resolve the edge just taken: follow an existing link, or materialize
    /// the target node (terminal, table hit, or fresh batch entry).
    fn resolve_child(
        &mut self,
        node: &Node<G::Move>,
        edge_idx: usize,
        state: &G,
    ) -> (NodeId, LeafKind) {
        let edge = node.edge(edge_idx);
        if let Some(cid) = edge.child_id() {
            let child = self.tree.get(cid);
            return (cid, self.handle_returns(&child, edge));
        }
        let hash = state.hash_key();
        if let Some(outcome) = state.terminal() {
            let cid = self.tree.find_or_create_terminal(hash, outcome);
            let cid = edge.link_child(cid);
            return (cid, LeafKind::Terminal);
        }
        let (cid, created) = self
            .tree
            .find_or_create_pending(hash, || Node::new_pending(hash, edge_specs(state)));
        let linked = edge.link_child(cid);
        if linked != cid {
            // Lost the link race; classify whatever another thread put here.
            let child = self.tree.get(linked);
            return (linked, self.handle_returns(&child, edge));
        }
        if !created {
            // Known position reached through a new edge.
            let child = self.tree.get(cid);
            if child.solved() != SolvedState::Unsolved {
                return (cid, LeafKind::Terminal);
            }
            if child.is_pending() {
                return (cid, LeafKind::Collision);
            }
            return (cid, LeafKind::Transposition);
        }
        let (batch_idx, slot) = self.batch.push_slot();
        let mirrored = state.encode(slot);
        let tablebase = if self.root_in_tablebase {
            state.probe_tablebase()
        } else {
            None
        };
        self.new_leaves.push(NewLeaf {
            node: cid,
            batch_idx,
            mirrored,
            tablebase,
        });
        (cid, LeafKind::NewNode)
    }

    /// Reserve the finished trajectory with virtual loss and queue it on the
    /// list its leaf class belongs to.
    fn finish_rollout(&mut self, kind: LeafKind, leaf: NodeId, traj: Trajectory) {
        for visit in &traj {
            self.tree.get(visit.node).edge(visit.edge).add_virtual_loss();
        }
        let depth = traj.len();
        self.stats.depth_sum += depth as u64;
        self.stats.depth_max = self.stats.depth_max.max(depth);
        match kind {
            LeafKind::NewNode => {
                self.stats.new_nodes += 1;
                self.new_trajectories.push(traj);
            }
            LeafKind::Terminal => {
                self.stats.terminals += 1;
                let v = self.tree.get(leaf).solved().value();
                self.terminal_backups.push((traj, leaf, v));
            }
            LeafKind::Transposition => {
                self.stats.transpositions += 1;
                let v = self.tree.get(leaf).q();
                self.transposition_backups.push((traj, leaf, v));
            }
            LeafKind::Collision => {
                self.stats.collisions += 1;
                self.collision_trajectories.push(traj);
            }
            LeafKind::Unknown => debug_assert!(false, "interior step is not a rollout result"),
        }
    }

    /// Turn the evaluator's raw outputs into node state: tablebase-corrected
    /// values and temperature-scaled legal-masked priors, then publish each
    /// node as evaluated.
    fn assign_eval_results(&mut self) {
        for i in 0..self.new_leaves.len() {
            let leaf = self.new_leaves[i];
            let node = self.tree.get(leaf.node);
            let mut value = self.batch.value(leaf.batch_idx);
            if let Some(outcome) = leaf.tablebase {
                value = outcome.value();
                self.stats.tb_hits += 1;
                self.batch.set_value(leaf.batch_idx, value);
            }
            node.set_nn_value(value);
            let logits = self.batch.policy(leaf.batch_idx);
            assign_priors(&node, logits, leaf.mirrored, self.settings.policy_temperature);
            node.mark_evaluated();
        }
    }

    /// Back up every value-bearing trajectory of this round.
    fn backup_value_outputs(&mut self) {
        let new_trajs = std::mem::take(&mut self.new_trajectories);
        for (i, traj) in new_trajs.iter().enumerate() {
            let leaf = self.new_leaves[i];
            self.backup(traj, leaf.node, self.batch.value(leaf.batch_idx));
        }
        let terminals = std::mem::take(&mut self.terminal_backups);
        for (traj, leaf, v) in &terminals {
            self.backup(traj, *leaf, *v);
        }
        let transpositions = std::mem::take(&mut self.transposition_backups);
        for (traj, leaf, v) in &transpositions {
            self.backup(traj, *leaf, *v);
        }
    }

    /// Roll back the reservations of trajectories that ended in a collision.
    fn backup_collisions(&mut self) {
        let collisions = std::mem::take(&mut self.collision_trajectories);
        for traj in &collisions {
            for visit in traj.iter().rev() {
                self.tree
                    .get(visit.node)
                    .edge(visit.edge)
                    .remove_virtual_loss();
            }
        }
    }

    /// Propagate `leaf_value` up the trajectory, flipping sign each ply and
    /// releasing one virtual loss per edge.
    fn backup(&self, traj: &[Visit], leaf: NodeId, leaf_value: f32) {
        self.tree.get(leaf).update(leaf_value);
        let mut v = leaf_value;
        for visit in traj.iter().rev() {
            v = -v;
            let node = self.tree.get(visit.node);
            node.edge(visit.edge).backup(v);
            node.update(v);
        }
    }
}

/// Write priors for every edge of `node` from the raw policy logits:
/// temperature scaling, masking to the node's moves, stable softmax, and a
/// uniform fallback when the masked mass degenerates.
fn assign_priors<M: Copy>(node: &Node<M>, logits: &[f32], mirrored: bool, temperature: f32) {
    let edges = node.edges();
    if edges.is_empty() {
        return;
    }
    let uniform = 1.0 / edges.len() as f32;
    let mut scaled: Vec<f32> = Vec::with_capacity(edges.len());
    let mut max = f32::NEG_INFINITY;
    for edge in edges {
        let raw = logits
            .get(edge.policy_index(mirrored))
            .copied()
            .unwrap_or(f32::NEG_INFINITY);
        let s = raw / temperature;
        if s.is_finite() && s > max {
            max = s;
        }
        scaled.push(s);
    }
    if !max.is_finite() {
        for edge in edges {
            edge.set_prior(uniform);
        }
        return;
    }
    let mut sum = 0.0f32;
    for s in scaled.iter_mut() {
        *s = if s.is_finite() { (*s - max).exp() } else { 0.0 };
        sum += *s;
    }
    if !(sum.is_finite() && sum > 0.0) {
        for edge in edges {
            edge.set_prior(uniform);
        }
        return;
    }
    for (edge, s) in edges.iter().zip(&scaled) {
        edge.set_prior(s / sum);
    }
}


/// Entry point for one worker thread.
pub fn run_search_thread<G, P, E>(
    thread: &mut SearchThread<G, P>,
    evaluator: &E,
) -> Result<(), SearchError>
where
    G: GameAdapter,
    P: TreePolicy<G::Move>,
    E: Evaluator,
{
    thread.run(evaluator)
}
