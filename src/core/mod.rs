//! Core data structures for keel.
//!
//! This module contains the typed rule inputs the graph is built from:
//! - Target rules (platform, configuration, link type, unity and PCH settings)
//! - Module rules and the `RuleSource` seam
//! - Plugin descriptors and references
//! - Path variable expansion

pub mod paths;
pub mod plugin;
pub mod rules;
pub mod target;

pub use paths::PathVariables;
pub use plugin::{ModuleDescriptor, ModuleHostType, PluginDescriptor, PluginInfo, PluginReference};
pub use rules::{CodeOptimization, ModuleKind, ModuleRule, PchUsage, RuleSet, RuleSource};
pub use target::{BuildEnvironment, Configuration, LinkType, Platform, TargetRules, TargetType};
