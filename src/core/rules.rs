//! Module rules - the evaluated, immutable description of one module.
//!
//! Rule files are compiled by an external step; `ModuleRule` is the typed
//! result. Defaulting that depends on the target (PCH usage, default include
//! paths) happens when the module graph creates the module, not here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::plugin::PluginInfo;
use crate::core::target::TargetRules;

/// Whether a module is compiled from source or only wraps prebuilt libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModuleKind {
    #[default]
    Cpp,
    External,
}

/// Precompiled header usage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PchUsage {
    /// Resolved at module creation from where the module lives
    #[default]
    Default,
    NoPCHs,
    NoSharedPCHs,
    UseSharedPCHs,
    UseExplicitOrSharedPCHs,
}

/// Optimization mode for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeOptimization {
    Never,
    InNonDebugBuilds,
    InShippingBuildsOnly,
    Always,
    /// Optimize in non-debug builds (for engine modules) or follow the configuration
    #[default]
    Default,
}

/// A file that must be staged next to the binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDependency {
    /// Destination path; may use `$(BinaryOutputDir)` and similar variables
    pub path: String,
    /// Source to copy from; `None` means the file is expected to exist already
    #[serde(default)]
    pub source: Option<String>,
}

/// Evaluated rules for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleRule {
    pub name: String,
    pub kind: ModuleKind,
    pub directory: PathBuf,
    /// Name of the plugin that owns this module, if any
    pub plugin: Option<String>,

    pub public_include_paths: Vec<PathBuf>,
    pub public_system_include_paths: Vec<PathBuf>,
    pub private_include_paths: Vec<PathBuf>,
    pub public_definitions: Vec<String>,
    pub private_definitions: Vec<String>,

    pub public_dependencies: Vec<String>,
    pub private_dependencies: Vec<String>,
    pub dynamically_loaded: Vec<String>,
    pub public_include_path_modules: Vec<String>,
    pub private_include_path_modules: Vec<String>,
    /// Modules this module knowingly forms a cycle with
    pub circularly_referenced: Vec<String>,

    pub pch_usage: PchUsage,
    pub private_pch_header: Option<PathBuf>,
    pub shared_pch_header: Option<PathBuf>,
    pub min_files_using_precompiled_header_override: Option<usize>,

    pub optimize: CodeOptimization,
    pub use_rtti: Option<bool>,
    pub enable_exceptions: Option<bool>,
    pub shadow_variable_warnings: Option<bool>,
    pub undefined_identifier_warnings: Option<bool>,

    pub faster_without_unity: bool,
    pub min_source_files_for_unity_build_override: Option<usize>,

    /// Link against a previously built copy instead of compiling
    pub use_precompiled: bool,
    /// Write a manifest so later builds can use this module precompiled
    pub precompile: bool,
    pub treat_as_engine_module: Option<bool>,
    pub redistributable: Option<bool>,
    pub binaries_subfolder: Option<String>,
    pub add_default_include_paths: bool,

    /// Explicit source files or globs relative to `directory`; empty means enumerate
    pub sources: Vec<String>,
    pub public_libraries: Vec<String>,
    pub public_library_paths: Vec<String>,
    pub public_frameworks: Vec<String>,
    pub runtime_dependencies: Vec<RuntimeDependency>,
}

impl Default for ModuleRule {
    fn default() -> Self {
        ModuleRule {
            name: String::new(),
            kind: ModuleKind::Cpp,
            directory: PathBuf::new(),
            plugin: None,
            public_include_paths: Vec::new(),
            public_system_include_paths: Vec::new(),
            private_include_paths: Vec::new(),
            public_definitions: Vec::new(),
            private_definitions: Vec::new(),
            public_dependencies: Vec::new(),
            private_dependencies: Vec::new(),
            dynamically_loaded: Vec::new(),
            public_include_path_modules: Vec::new(),
            private_include_path_modules: Vec::new(),
            circularly_referenced: Vec::new(),
            pch_usage: PchUsage::Default,
            private_pch_header: None,
            shared_pch_header: None,
            min_files_using_precompiled_header_override: None,
            optimize: CodeOptimization::Default,
            use_rtti: None,
            enable_exceptions: None,
            shadow_variable_warnings: None,
            undefined_identifier_warnings: None,
            faster_without_unity: false,
            min_source_files_for_unity_build_override: None,
            use_precompiled: false,
            precompile: false,
            treat_as_engine_module: None,
            redistributable: None,
            binaries_subfolder: None,
            add_default_include_paths: true,
            sources: Vec::new(),
            public_libraries: Vec::new(),
            public_library_paths: Vec::new(),
            public_frameworks: Vec::new(),
            runtime_dependencies: Vec::new(),
        }
    }
}

impl ModuleRule {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        ModuleRule {
            name: name.into(),
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn external(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        ModuleRule {
            kind: ModuleKind::External,
            ..Self::new(name, directory)
        }
    }

    pub fn is_external(&self) -> bool {
        self.kind == ModuleKind::External
    }

    /// Whether this module lives in the engine tree.
    pub fn is_engine_module(&self, target: &TargetRules) -> bool {
        self.treat_as_engine_module
            .unwrap_or_else(|| crate::util::fs::is_inside(&self.directory, &target.engine_dir))
    }

    /// Every name this rule references through a compile or link edge.
    pub fn referenced_module_names(&self) -> impl Iterator<Item = &str> {
        self.public_dependencies
            .iter()
            .chain(&self.private_dependencies)
            .chain(&self.dynamically_loaded)
            .chain(&self.public_include_path_modules)
            .chain(&self.private_include_path_modules)
            .map(String::as_str)
    }

    /// Dynamically-loaded names that are also listed as normal dependencies.
    pub fn dynamic_dependency_overlap(&self) -> Vec<&str> {
        self.dynamically_loaded
            .iter()
            .filter(|name| {
                self.public_dependencies
                    .iter()
                    .chain(&self.private_dependencies)
                    .any(|dep| dep.eq_ignore_ascii_case(name))
            })
            .map(String::as_str)
            .collect()
    }

    /// Resolve a rule-relative path against the module directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.directory.join(path)
        }
    }
}

/// Supplies module rules by name.
pub trait RuleSource: Send + Sync {
    /// The rule for `name`, matched case-insensitively.
    fn module_rule(&self, name: &str) -> Option<&ModuleRule>;

    /// Plugins that may be enabled for the target.
    fn available_plugins(&self) -> &[PluginInfo];
}

/// An in-memory rule set: one target, its module rules and available plugins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub target: TargetRules,
    /// Canonical target that shared-environment targets are validated against
    pub base_target: Option<TargetRules>,
    modules: Vec<ModuleRule>,
    index: HashMap<String, usize>,
    plugins: Vec<PluginInfo>,
}

impl RuleSet {
    pub fn new(target: TargetRules) -> Self {
        RuleSet {
            target,
            ..Default::default()
        }
    }

    /// Add a module rule, replacing any earlier rule with the same name.
    pub fn add_module(&mut self, rule: ModuleRule) {
        let key = rule.name.to_ascii_lowercase();
        match self.index.get(&key) {
            Some(&i) => self.modules[i] = rule,
            None => {
                self.index.insert(key, self.modules.len());
                self.modules.push(rule);
            }
        }
    }

    pub fn add_plugin(&mut self, plugin: PluginInfo) {
        self.plugins.push(plugin);
    }

    pub fn with_base_target(mut self, base: TargetRules) -> Self {
        self.base_target = Some(base);
        self
    }

    pub fn modules(&self) -> &[ModuleRule] {
        &self.modules
    }
}

impl RuleSource for RuleSet {
    fn module_rule(&self, name: &str) -> Option<&ModuleRule> {
        self.index
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.modules[i])
    }

    fn available_plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }
}
