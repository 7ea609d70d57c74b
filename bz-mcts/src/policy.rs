//! Child-selection seam. The descent asks the policy for one edge, the
//! budget splitter asks for the top K; engines plug in their PUCT (or other)
//! formula here.

use bz_core::SearchSettings;

use crate::node::Node;

pub trait TreePolicy<M>: Send + Sync {
    /// Index of the edge to descend. `node` is evaluated and has at least
    /// one edge.
    fn select(&self, node: &Node<M>, settings: &SearchSettings) -> usize;

    /// Up to `k` distinct edge indices ranked best first, used to split a
    /// round's rollout budget across subtrees.
    fn select_top_k(&self, node: &Node<M>, k: usize, settings: &SearchSettings) -> Vec<usize>;
}

/// Baseline policy: prior-weighted urgency discounted by completed plus
/// in-flight visits. In-flight visits count at virtual-loss weight, so a
/// mini-batch naturally spreads over siblings instead of piling onto one
/// edge.
pub struct PriorUrgencyPolicy;

impl PriorUrgencyPolicy {
    fn score<M: Copy>(edge: &crate::node::Edge<M>, settings: &SearchSettings) -> f32 {
        let pressure =
            edge.visits() as f32 + settings.virtual_loss * edge.virtual_visits() as f32;
        edge.prior() / (1.0 + pressure)
    }
}

impl<M: Copy + Send + Sync> TreePolicy<M> for PriorUrgencyPolicy {
    fn select(&self, node: &Node<M>, settings: &SearchSettings) -> usize {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (i, edge) in node.edges().iter().enumerate() {
            let s = Self::score(edge, settings);
            if s > best_score {
                best_score = s;
                best = i;
            }
        }
        best
    }

    fn select_top_k(&self, node: &Node<M>, k: usize, settings: &SearchSettings) -> Vec<usize> {
        let mut ranked: Vec<(usize, f32)> = node
            .edges()
            .iter()
            .enumerate()
            .map(|(i, e)| (i, Self::score(e, settings)))
            .collect();
        // total_cmp with the index as tiebreak keeps the ranking deterministic.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked.into_iter().map(|(i, _)| i).collect()
    }
}
