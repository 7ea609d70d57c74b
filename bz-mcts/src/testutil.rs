//! Deterministic stubs shared by the search tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use bz_core::SearchSettings;

use crate::batch::EvalOutputs;
use crate::eval::{EvalError, Evaluator};
use crate::node::Node;
use crate::policy::TreePolicy;

/// Evaluator returning a fixed value and flat logits for every sample.
pub struct ConstEvaluator(pub f32);

impl Evaluator for ConstEvaluator {
    fn evaluate(
        &self,
        _inputs: &[f32],
        _samples: usize,
        out: EvalOutputs<'_>,
    ) -> Result<(), EvalError> {
        out.values.fill(self.0);
        out.policies.fill(0.0);
        Ok(())
    }
}

/// Evaluator that always fails, for error-path tests.
pub struct FailingEvaluator;

impl Evaluator for FailingEvaluator {
    fn evaluate(
        &self,
        _inputs: &[f32],
        _samples: usize,
        _out: EvalOutputs<'_>,
    ) -> Result<(), EvalError> {
        Err(EvalError::Backend("backend down".to_string()))
    }
}

/// Policy replaying a scripted list of edge picks, so tests can steer every
/// descent. `select_top_k` stays deterministic: lowest indices first.
pub struct ScriptedPolicy {
    script: Mutex<VecDeque<usize>>,
}

impl ScriptedPolicy {
    pub fn new(picks: &[usize]) -> Self {
        Self {
            script: Mutex::new(picks.iter().copied().collect()),
        }
    }
}

impl<M: Copy + Send + Sync> TreePolicy<M> for ScriptedPolicy {
    fn select(&self, _node: &Node<M>, _settings: &SearchSettings) -> usize {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted policy exhausted")
    }

    fn select_top_k(&self, node: &Node<M>, k: usize, _settings: &SearchSettings) -> Vec<usize> {
        (0..node.edges().len().min(k)).collect()
    }
}
