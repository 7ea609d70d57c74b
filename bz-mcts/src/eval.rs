//! Evaluator seam: the synchronous batched-inference interface the search
//! thread blocks on once per round.

use thiserror::Error;

use crate::batch::EvalOutputs;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("inference backend failure: {0}")]
    Backend(String),
}

/// Batched position evaluator. `inputs` holds `samples` encoded positions
/// back to back; implementations fill `out.values` with one side-to-move
/// value per sample and `out.policies` with `action_space` raw logits per
/// sample.
pub trait Evaluator {
    fn evaluate(
        &self,
        inputs: &[f32],
        samples: usize,
        out: EvalOutputs<'_>,
    ) -> Result<(), EvalError>;

    /// Auxiliary floats produced per sample. Defaults to none.
    fn aux_len(&self) -> usize {
        0
    }
}

/// Baseline evaluator: zero value, flat logits. The masked softmax turns the
/// flat logits into a uniform prior over legal moves, which reduces the
/// search to uniform-prior MCTS.
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate(
        &self,
        _inputs: &[f32],
        _samples: usize,
        out: EvalOutputs<'_>,
    ) -> Result<(), EvalError> {
        out.values.fill(0.0);
        out.policies.fill(0.0);
        Ok(())
    }
}
