//! Modules - resolved nodes of the module graph.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::binary::BinaryId;
use crate::core::rules::{ModuleRule, PchUsage};
use crate::util::interning::Symbol;

/// Index of a module inside its [`ModuleGraph`](super::graph::ModuleGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub(crate) u32);

impl ModuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Progress of a module's dependency lists.
///
/// Lists are written exactly once, on the transition to `Resolved`. A module
/// seen again while `BeingResolved` is on the current resolution stack, which
/// is how cycles are recognized without recursing forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyState {
    #[default]
    Unresolved,
    BeingResolved,
    Resolved,
}

/// Data only compiled modules carry.
#[derive(Debug, Clone, Default)]
pub struct CppModuleData {
    pub intermediate_dir: PathBuf,
    /// Translation units, in stable sorted order
    pub source_files: Vec<PathBuf>,
}

/// Compiled or external module.
#[derive(Debug, Clone)]
pub enum ModuleVariant {
    Cpp(CppModuleData),
    External,
}

/// A module in the graph.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub symbol: Symbol,
    pub name: String,
    pub rules: ModuleRule,
    pub variant: ModuleVariant,
    /// Chain of references that first created the module
    pub reference_chain: String,
    pub is_engine_module: bool,
    /// Usage mode after `PchUsage::Default` was resolved
    pub pch_usage: PchUsage,

    pub public_include_paths: Vec<PathBuf>,
    pub public_system_include_paths: Vec<PathBuf>,
    pub private_include_paths: Vec<PathBuf>,

    /// `None` until the shallow include-path walk reached this module
    pub public_include_path_modules: Option<Vec<ModuleId>>,
    pub private_include_path_modules: Vec<ModuleId>,
    pub public_dependencies: Vec<ModuleId>,
    pub private_dependencies: Vec<ModuleId>,
    pub dynamically_loaded: Vec<ModuleId>,
    pub state: DependencyState,

    pub binary: Option<BinaryId>,
    /// Problems found while composing include environments
    pub invalid_includes: Vec<String>,
}

impl Module {
    pub fn is_cpp(&self) -> bool {
        matches!(self.variant, ModuleVariant::Cpp(_))
    }

    pub fn cpp(&self) -> Option<&CppModuleData> {
        match &self.variant {
            ModuleVariant::Cpp(data) => Some(data),
            ModuleVariant::External => None,
        }
    }

    /// Name of the export macro, e.g. `CORE_API`.
    pub fn api_define(&self) -> String {
        format!("{}_API", self.name.to_ascii_uppercase())
    }

    /// Public then private dependencies.
    pub fn direct_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.public_dependencies
            .iter()
            .chain(&self.private_dependencies)
            .copied()
    }

    /// Every module this one references through any edge.
    pub fn all_references(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.direct_dependencies()
            .chain(self.dynamically_loaded.iter().copied())
            .chain(self.private_include_path_modules.iter().copied())
            .chain(self.public_include_path_modules.iter().flatten().copied())
    }

    /// Whether the rule declares `other` as a known circular partner.
    pub fn declares_circular(&self, other: &str) -> bool {
        self.rules
            .circularly_referenced
            .iter()
            .any(|n| n.eq_ignore_ascii_case(other))
    }

    pub fn uses_precompiled(&self) -> bool {
        self.rules.use_precompiled
    }
}
