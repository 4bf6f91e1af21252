//! Module and plugin resolution.
//!
//! Turns rule names into the module graph of one target. Resolution is
//! deterministic: the same rule set always yields the same module order.

pub mod errors;
pub mod graph;
pub mod module;
pub mod plugins;

pub use errors::GraphError;
pub use graph::{CycleCheck, ModuleGraph, ModuleResolver, RegistryEntry};
pub use module::{DependencyState, Module, ModuleId, ModuleVariant};
pub use plugins::{Plugin, PluginResolver, PluginSet};
