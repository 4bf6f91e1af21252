//! Build the target graph of one or more rule sets.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::builder::actions::{Action, IntermediateFile};
use crate::builder::binary::BinaryManifest;
use crate::builder::target::BuildTarget;
use crate::core::rules::RuleSet;
use crate::ops::shared_env::validate_shared_environment;
use crate::resolver::errors::GraphError;
use crate::util::config::Config;
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::FileSystem;

/// Everything needed to build one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetGraph {
    pub target: String,
    /// Actions in an order that satisfies every prerequisite
    pub actions: Vec<Action>,
    pub binaries: Vec<BinaryManifest>,
    pub intermediate_files: Vec<IntermediateFile>,
    pub warnings: Vec<Diagnostic>,
}

impl TargetGraph {
    /// Output files of every binary.
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.binaries.iter().flat_map(|b| b.outputs.iter())
    }
}

/// Resolve, assemble and plan the target described by `rules`.
///
/// Warnings are logged once and returned with the graph; the first error
/// aborts construction.
pub fn build_target_graph(
    rules: &RuleSet,
    fs: &dyn FileSystem,
    config: &Config,
) -> Result<TargetGraph, GraphError> {
    validate_shared_environment(&rules.target, rules.base_target.as_ref())?;

    let mut target = BuildTarget::new(rules, &rules.target, fs, config);
    target.assemble()?;
    let plan = target.plan()?;

    let binaries = target
        .binaries
        .iter()
        .map(|b| b.manifest(&target.graph))
        .collect();
    let warnings = target.diagnostics.flush();

    info!(
        "`{}`: {} modules, {} binaries, {} actions",
        rules.target.name,
        target.graph.len(),
        target.binaries.len(),
        plan.actions.len()
    );
    Ok(TargetGraph {
        target: rules.target.name.clone(),
        actions: plan.actions,
        binaries,
        intermediate_files: plan.intermediate_files,
        warnings,
    })
}

/// Build several independent targets in parallel.
///
/// Results come back in the order of `rule_sets`.
pub fn build_targets(
    rule_sets: &[RuleSet],
    fs: &dyn FileSystem,
    config: &Config,
) -> Vec<Result<TargetGraph, GraphError>> {
    rule_sets
        .par_iter()
        .map(|rules| build_target_graph(rules, fs, config))
        .collect()
}
