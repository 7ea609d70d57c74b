//! bz-mcts: batched Monte-Carlo tree search core.
//!
//! Rollouts are gathered into fixed-size mini-batches, evaluated in one
//! external call, and backed up with per-ply sign flips. Virtual loss keeps a
//! single round (and concurrent threads) from piling onto one line, and a
//! transposition table turns the tree into a DAG when enabled. The game, the
//! evaluator and the selection formula are all seams: `bz_core::GameAdapter`,
//! [`Evaluator`] and [`TreePolicy`].

pub mod arena;
pub mod batch;
pub mod eval;
pub mod explore;
pub mod node;
pub mod policy;
pub mod searchthread;
pub mod table;
pub mod tree;

pub use batch::{BatchBuffers, EvalOutputs};
pub use eval::{EvalError, Evaluator, UniformEvaluator};
pub use node::{Edge, Node, NodeId, SolvedState, NONE_NODE};
pub use policy::{PriorUrgencyPolicy, TreePolicy};
pub use searchthread::{
    run_search_thread, LeafKind, SearchError, SearchStats, SearchThread,
};
pub use table::TranspositionTable;
pub use tree::SearchTree;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod testutil;
