//! Loading rule sets from TOML.
//!
//! ```toml
//! [target]
//! name = "Shooter"
//! launch_module = "Launch"
//! engine_dir = "Engine"
//!
//! [[modules]]
//! name = "Launch"
//! directory = "Engine/Source/Runtime/Launch"
//! private_dependencies = ["Core"]
//!
//! [[plugins]]
//! name = "Paper2D"
//! directory = "Engine/Plugins/Paper2D"
//! ```
//!
//! Relative directories are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::core::plugin::PluginInfo;
use crate::core::rules::{ModuleRule, RuleSet, RuleSource};
use crate::core::target::TargetRules;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    target: TargetRules,
    #[serde(default)]
    base_target: Option<TargetRules>,
    #[serde(default)]
    modules: Vec<ModuleRule>,
    #[serde(default)]
    plugins: Vec<PluginInfo>,
}

/// Read a rule set from `path`.
pub fn load_rule_set(path: &Path) -> Result<RuleSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule set: {}", path.display()))?;
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let base = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
    parse_rule_set(&text, &base).with_context(|| format!("invalid rule set: {}", path.display()))
}

/// Parse a rule set, resolving relative directories against `base`.
pub fn parse_rule_set(text: &str, base: &Path) -> Result<RuleSet> {
    let file: RuleFile = toml::from_str(text)?;

    if file.target.name.is_empty() {
        bail!("`target.name` must be set");
    }

    let mut rules = RuleSet::new(resolve_target(file.target, base));
    if let Some(base_target) = file.base_target {
        rules = rules.with_base_target(resolve_target(base_target, base));
    }

    for mut module in file.modules {
        if module.name.is_empty() {
            bail!("module without a `name`");
        }
        module.directory = resolve(base, &module.directory);
        rules.add_module(module);
    }
    for mut plugin in file.plugins {
        plugin.directory = resolve(base, &plugin.directory);
        rules.add_plugin(plugin);
    }

    debug!(
        "loaded `{}`: {} modules, {} plugins",
        rules.target.name,
        rules.modules().len(),
        rules.available_plugins().len()
    );
    Ok(rules)
}

fn resolve_target(mut target: TargetRules, base: &Path) -> TargetRules {
    target.engine_dir = resolve(base, &target.engine_dir);
    target.project_dir = target.project_dir.map(|p| resolve(base, &p));
    target.output_dir = target.output_dir.map(|p| resolve(base, &p));
    target.working_set = target
        .working_set
        .iter()
        .map(|p| resolve(base, p))
        .collect();
    target
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
