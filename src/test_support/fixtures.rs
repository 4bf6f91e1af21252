//! Rule-set fixtures.
//!
//! Everything lives under a fake `/ws` tree: the engine at `/ws/Engine`
//! with runtime modules in `Source/Runtime`, and a `Shooter` project at
//! `/ws/Shooter`.

use std::path::PathBuf;

use crate::builder::target::BuildTarget;
use crate::core::plugin::{PluginDescriptor, PluginInfo, PluginLoadedFrom, PluginReference};
use crate::core::rules::{ModuleRule, RuleSet};
use crate::core::target::TargetRules;
use crate::resolver::errors::GraphError;
use crate::test_support::MockFileSystem;
use crate::util::config::Config;

pub const ENGINE_DIR: &str = "/ws/Engine";
pub const PROJECT_DIR: &str = "/ws/Shooter";

/// The `Shooter` game target with no launch module yet.
pub fn engine_target() -> TargetRules {
    TargetRules {
        name: "Shooter".to_string(),
        engine_dir: PathBuf::from(ENGINE_DIR),
        project_dir: Some(PathBuf::from(PROJECT_DIR)),
        ..Default::default()
    }
}

/// A C++ engine runtime module.
pub fn module(name: &str) -> ModuleRule {
    ModuleRule::new(name, format!("{}/Source/Runtime/{}", ENGINE_DIR, name))
}

/// A C++ module of the `Shooter` project.
pub fn game_module(name: &str) -> ModuleRule {
    ModuleRule::new(name, format!("{}/Source/{}", PROJECT_DIR, name))
}

/// An engine plugin depending on `deps`, disabled by default.
pub fn plugin(name: &str, deps: &[&str]) -> PluginInfo {
    PluginInfo {
        name: name.to_string(),
        directory: PathBuf::from(format!("{}/Plugins/{}", ENGINE_DIR, name)),
        loaded_from: PluginLoadedFrom::Engine,
        descriptor: PluginDescriptor {
            plugins: deps.iter().map(|d| PluginReference::new(*d, true)).collect(),
            ..Default::default()
        },
    }
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Chainable setters for module rules.
pub trait RuleBuilder: Sized {
    fn public_deps(self, names: &[&str]) -> Self;
    fn private_deps(self, names: &[&str]) -> Self;
    fn dynamic(self, names: &[&str]) -> Self;
    fn circular(self, names: &[&str]) -> Self;
    fn public_include_modules(self, names: &[&str]) -> Self;
    fn private_include_modules(self, names: &[&str]) -> Self;
    fn public_includes(self, paths: &[&str]) -> Self;
    fn public_defs(self, defs: &[&str]) -> Self;
    fn private_defs(self, defs: &[&str]) -> Self;
    fn sources(self, entries: &[&str]) -> Self;
}

impl RuleBuilder for ModuleRule {
    fn public_deps(mut self, names: &[&str]) -> Self {
        self.public_dependencies.extend(strings(names));
        self
    }

    fn private_deps(mut self, names: &[&str]) -> Self {
        self.private_dependencies.extend(strings(names));
        self
    }

    fn dynamic(mut self, names: &[&str]) -> Self {
        self.dynamically_loaded.extend(strings(names));
        self
    }

    fn circular(mut self, names: &[&str]) -> Self {
        self.circularly_referenced.extend(strings(names));
        self
    }

    fn public_include_modules(mut self, names: &[&str]) -> Self {
        self.public_include_path_modules.extend(strings(names));
        self
    }

    fn private_include_modules(mut self, names: &[&str]) -> Self {
        self.private_include_path_modules.extend(strings(names));
        self
    }

    fn public_includes(mut self, paths: &[&str]) -> Self {
        self.public_include_paths
            .extend(paths.iter().map(PathBuf::from));
        self
    }

    fn public_defs(mut self, defs: &[&str]) -> Self {
        self.public_definitions.extend(strings(defs));
        self
    }

    fn private_defs(mut self, defs: &[&str]) -> Self {
        self.private_definitions.extend(strings(defs));
        self
    }

    fn sources(mut self, entries: &[&str]) -> Self {
        self.sources.extend(strings(entries));
        self
    }
}

/// A rule set, filesystem and config that can be assembled into a target.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub rules: RuleSet,
    pub fs: MockFileSystem,
    pub config: Config,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Fixture {
            rules: RuleSet::new(engine_target()),
            fs: MockFileSystem::new(),
            config: Config::default(),
        }
    }

    pub fn with_module(mut self, rule: ModuleRule) -> Self {
        self.rules.add_module(rule);
        self
    }

    /// Add `rule` and make it the launch module.
    pub fn with_launch(mut self, rule: ModuleRule) -> Self {
        self.rules.target.launch_module = rule.name.clone();
        self.rules.add_module(rule);
        self
    }

    pub fn with_plugin(mut self, plugin: PluginInfo) -> Self {
        self.rules.add_plugin(plugin);
        self
    }

    /// Assemble the target's binaries.
    pub fn assemble(&self) -> Result<BuildTarget<'_>, GraphError> {
        let mut target = BuildTarget::new(&self.rules, &self.rules.target, &self.fs, &self.config);
        target.assemble()?;
        Ok(target)
    }

    /// Assemble the target, panicking on failure.
    pub fn assembled(&self) -> BuildTarget<'_> {
        match self.assemble() {
            Ok(target) => target,
            Err(e) => panic!("failed to assemble `{}`: {}", self.rules.target.name, e),
        }
    }
}
