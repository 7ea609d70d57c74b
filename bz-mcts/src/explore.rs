//! Stochastic exploration helpers: pure functions over an explicit RNG so
//! their distributions are testable in isolation.

use rand::Rng;

use bz_core::GameAdapter;

use crate::node::Node;

/// Sample how many plies a randomized rollout prefix lasts. Mass halves per
/// ply (depth 0 with probability 1/2, depth 1 with 1/4, ...), capped at
/// `max_depth` which absorbs the tail.
pub fn sample_exploration_depth<R: Rng>(rng: &mut R, max_depth: usize) -> usize {
    let mut depth = 0;
    while depth < max_depth && rng.gen::<f32>() < 0.5 {
        depth += 1;
    }
    depth
}

/// Uniform edge pick for the randomized prefix.
pub fn uniform_edge<R: Rng>(rng: &mut R, edge_count: usize) -> usize {
    debug_assert!(edge_count > 0);
    rng.gen_range(0..edge_count)
}

/// First unexplored forcing move at `node`, if any: an edge whose move the
/// adapter classes as enhanced and that has neither visits nor a linked
/// child.
pub fn select_enhanced_edge<G: GameAdapter>(node: &Node<G::Move>, state: &G) -> Option<usize> {
    node.edges()
        .iter()
        .position(|e| e.visits() == 0 && e.child_id().is_none() && state.is_enhanced(e.mv()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{edge_specs, Node};
    use bz_core::CountingGame;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn depth_mass_halves_per_ply() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let samples = 100_000;
        let mut counts = [0u32; 7];
        for _ in 0..samples {
            counts[sample_exploration_depth(&mut rng, 6)] += 1;
        }
        let p0 = counts[0] as f64 / samples as f64;
        let p1 = counts[1] as f64 / samples as f64;
        assert!((p0 - 0.5).abs() < 0.01, "p0={p0}");
        assert!((p1 - 0.25).abs() < 0.01, "p1={p1}");
        // The cap absorbs all deeper mass.
        assert!(counts[6] > 0);
    }

    #[test]
    fn depth_never_exceeds_the_cap() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..1000 {
            assert!(sample_exploration_depth(&mut rng, 2) <= 2);
        }
        assert_eq!(sample_exploration_depth(&mut rng, 0), 0);
    }

    #[test]
    fn uniform_edge_stays_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..1000 {
            assert!(uniform_edge(&mut rng, 3) < 3);
        }
    }

    #[test]
    fn enhanced_pick_finds_the_unexplored_winning_take() {
        let state = CountingGame::new(3);
        let node = Node::new_pending(state.hash_key(), edge_specs(&state));
        // Moves are 1, 2, 3; taking 3 wins immediately.
        assert_eq!(select_enhanced_edge(&node, &state), Some(2));
        node.edge(2).backup(1.0);
        assert_eq!(select_enhanced_edge(&node, &state), None);
    }
}
