//! Command implementations

pub mod check;
pub mod modules;
pub mod plan;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::cli::GraphArgs;
use keel::ops::{build_target_graph, load_rule_set, TargetGraph};
use keel::util::config::{global_config_path, load_config, project_config_path, Config};
use keel::util::diagnostic::emit;
use keel::RealFileSystem;

/// Global config merged with the project config, or with `--config`.
fn load_merged_config(args: &GraphArgs) -> Config {
    let project = match &args.config {
        Some(path) => path.clone(),
        None => project_config_path(args.rules.parent().unwrap_or(Path::new("."))),
    };
    let global = global_config_path().unwrap_or_default();
    load_config(&global, &project)
}

/// Load the rule set named on the command line and build its graph.
///
/// Graph errors are printed as diagnostics before being returned.
pub fn build_graph(args: &GraphArgs, color: bool) -> Result<TargetGraph> {
    let rules = load_rule_set(&args.rules)?;
    let config = load_merged_config(args);

    build_target_graph(&rules, &RealFileSystem, &config).map_err(|e| {
        emit(&e.to_diagnostic(), color);
        anyhow!("could not build the graph of `{}`", rules.target.name)
    })
}
