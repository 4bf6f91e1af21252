//! High-level operations.
//!
//! This module contains the entry points the `keel` commands are built on.

pub mod build_graph;
pub mod load;
pub mod shared_env;

pub use build_graph::{build_target_graph, build_targets, TargetGraph};
pub use load::{load_rule_set, parse_rule_set};
pub use shared_env::validate_shared_environment;
