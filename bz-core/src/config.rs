//! Search configuration, loadable from YAML.
//!
//! Every field has a default so partial config files work; validation happens
//! when a search thread is constructed, not at parse time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_batch_size() -> usize {
    8
}
fn default_virtual_loss() -> f32 {
    1.0
}
fn default_use_transpositions() -> bool {
    true
}
fn default_epsilon_greedy() -> f32 {
    0.0
}
fn default_max_exploration_depth() -> usize {
    6
}
fn default_enhanced_check_every() -> u64 {
    0
}
fn default_policy_temperature() -> f32 {
    1.0
}
fn default_seed() -> u64 {
    0
}
fn default_threads() -> usize {
    1
}

/// Tunables for one search thread. Shared verbatim by all threads of a
/// search; per-thread divergence comes only from the thread id salt on the
/// RNG seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSettings {
    /// Mini-batch capacity, also the per-round rollout budget.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Magnitude of the virtual loss a selection policy should weigh
    /// reserved-but-unfinished visits with.
    #[serde(default = "default_virtual_loss")]
    pub virtual_loss: f32,
    /// Share identical positions through the transposition table.
    #[serde(default = "default_use_transpositions")]
    pub use_transpositions: bool,
    /// Probability that a rollout starts with a randomized prefix.
    #[serde(default = "default_epsilon_greedy")]
    pub epsilon_greedy: f32,
    /// Cap on the randomized-prefix length in plies.
    #[serde(default = "default_max_exploration_depth")]
    pub max_exploration_depth: usize,
    /// Probe an unvisited forcing move every Nth rollout; 0 disables.
    #[serde(default = "default_enhanced_check_every")]
    pub enhanced_check_every: u64,
    /// Temperature applied to policy logits before the masked softmax.
    #[serde(default = "default_policy_temperature")]
    pub policy_temperature: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            virtual_loss: default_virtual_loss(),
            use_transpositions: default_use_transpositions(),
            epsilon_greedy: default_epsilon_greedy(),
            max_exploration_depth: default_max_exploration_depth(),
            enhanced_check_every: default_enhanced_check_every(),
            policy_temperature: default_policy_temperature(),
            seed: default_seed(),
            threads: default_threads(),
        }
    }
}

/// Stop conditions, polled at round boundaries only. Zero means unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchLimits {
    #[serde(default)]
    pub nodes: u64,
    #[serde(default)]
    pub time_ms: u64,
    #[serde(default)]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchConfig {
    #[serde(default)]
    pub settings: SearchSettings,
    #[serde(default)]
    pub limits: SearchLimits,
}

impl SearchConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let s = SearchSettings::default();
        assert_eq!(s.batch_size, 8);
        assert!(s.use_transpositions);
        assert_eq!(s.epsilon_greedy, 0.0);
        assert_eq!(s.policy_temperature, 1.0);
        let l = SearchLimits::default();
        assert_eq!(l.nodes, 0);
        assert_eq!(l.time_ms, 0);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let raw = r#"
settings:
  batch_size: 32
  epsilon_greedy: 0.1
limits:
  nodes: 10000
"#;
        let cfg = SearchConfig::from_yaml(raw).unwrap();
        assert_eq!(cfg.settings.batch_size, 32);
        assert_eq!(cfg.settings.epsilon_greedy, 0.1);
        assert_eq!(cfg.settings.virtual_loss, 1.0);
        assert_eq!(cfg.limits.nodes, 10_000);
        assert_eq!(cfg.limits.time_ms, 0);
    }

    #[test]
    fn empty_yaml_is_all_defaults() {
        let cfg = SearchConfig::from_yaml("{}").unwrap();
        assert_eq!(cfg, SearchConfig::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "settings:\n  threads: 4\n  seed: 7").unwrap();
        let cfg = SearchConfig::load(&path).unwrap();
        assert_eq!(cfg.settings.threads, 4);
        assert_eq!(cfg.settings.seed, 7);
    }

    #[test]
    fn bad_yaml_is_an_error() {
        assert!(SearchConfig::from_yaml("settings: [not, a, map]").is_err());
    }
}
