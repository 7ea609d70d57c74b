//! Rules adapter: the trait the search core uses to talk to a concrete game.
//!
//! The search never inspects game state directly; it clones a state, applies
//! moves, hashes positions for the transposition table, and asks the adapter
//! to encode positions into flat input planes for batched evaluation. All
//! values flowing through the search are from the perspective of the side to
//! move, in [-1.0, 1.0].

use std::fmt::Debug;

/// Game-theoretic result of a position, from the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    /// Scalar value for backup, side-to-move perspective.
    pub fn value(self) -> f32 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Draw => 0.0,
            Outcome::Loss => -1.0,
        }
    }
}

/// Interface between the search core and a two-player zero-sum game.
///
/// Implementations must be cheap to clone; the search clones the root state
/// once per rollout and mutates the clone while descending.
pub trait GameAdapter: Clone + Send + 'static {
    /// Move representation. Copied freely into tree edges.
    type Move: Copy + PartialEq + Send + Sync + Debug + 'static;

    /// Size of the flat policy head the evaluator produces.
    const ACTION_SPACE: usize;
    /// Length of one encoded input sample.
    const PLANE_LEN: usize;

    /// All legal moves in this position. Non-terminal positions must have at
    /// least one.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// Apply a legal move in place, flipping the side to move.
    fn apply(&mut self, mv: Self::Move);

    /// Position hash. Two states with equal hashes are treated as the same
    /// node when transpositions are enabled.
    fn hash_key(&self) -> u64;

    /// `Some(outcome)` if this position is terminal by the rules.
    fn terminal(&self) -> Option<Outcome>;

    /// Exact-result probe, e.g. an endgame tablebase. The search only probes
    /// when the root itself probed successfully.
    fn probe_tablebase(&self) -> Option<Outcome> {
        None
    }

    /// Write `Self::PLANE_LEN` floats describing this position into `planes`.
    /// Returns true if the encoding mirrored the board to the side to move,
    /// in which case policy output must be read through
    /// [`mirrored_policy_index`](GameAdapter::mirrored_policy_index).
    fn encode(&self, planes: &mut [f32]) -> bool;

    /// Index of `mv` in the flat policy head.
    fn policy_index(&self, mv: Self::Move) -> usize;

    /// Index of `mv` in the policy head of the mirrored encoding.
    fn mirrored_policy_index(&self, mv: Self::Move) -> usize {
        self.policy_index(mv)
    }

    /// Whether `mv` belongs to the tactically forcing class the exploration
    /// pass may probe ahead of the tree policy (checks, captures and the
    /// like). Defaults to no such class.
    fn is_enhanced(&self, _mv: Self::Move) -> bool {
        false
    }
}
