//! Game-facing surface of the batched search core: the rules adapter trait,
//! terminal outcomes, and the search configuration types.

pub mod adapter;
pub mod config;
pub mod counting;

pub use adapter::{GameAdapter, Outcome};
pub use config::{ConfigError, SearchConfig, SearchLimits, SearchSettings};
pub use counting::CountingGame;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
