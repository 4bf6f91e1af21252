//! keel - build-graph construction for large native codebases
//!
//! This crate turns evaluated module, plugin and target rules into the
//! binaries and ordered build actions of a target: module resolution,
//! compile environments, precompiled headers, unity batching and binary
//! assembly.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for keel unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides an in-memory filesystem and rule-set
/// fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildTarget, TargetPlan};
pub use core::{ModuleRule, RuleSet, RuleSource, TargetRules};
pub use ops::{build_target_graph, TargetGraph};
pub use resolver::GraphError;
pub use util::{Config, FileSystem, RealFileSystem};
