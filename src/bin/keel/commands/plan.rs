//! `keel plan` command

use std::collections::BTreeMap;

use anyhow::Result;

use crate::cli::{OutputFormat, PlanArgs};
use crate::commands::build_graph;
use keel::TargetGraph;

pub fn execute(args: PlanArgs, color: bool) -> Result<()> {
    let graph = build_graph(&args.graph, color)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
        OutputFormat::Summary => print_summary(&graph),
    }
    Ok(())
}

fn print_summary(graph: &TargetGraph) {
    println!("Target `{}`", graph.target);

    println!("\nBinaries:");
    for binary in &graph.binaries {
        println!(
            "  {} ({}, {} modules)",
            binary.name,
            binary.binary_type,
            binary.modules.len()
        );
    }

    let mut kinds: BTreeMap<String, usize> = BTreeMap::new();
    for action in &graph.actions {
        *kinds.entry(format!("{:?}", action.kind)).or_default() += 1;
    }
    println!("\nActions ({}):", graph.actions.len());
    for (kind, count) in &kinds {
        println!("  {:<14} {}", kind, count);
    }
    for action in &graph.actions {
        println!("  [{}] {}", action.fingerprint, action.status);
    }

    if !graph.intermediate_files.is_empty() {
        println!("\nIntermediate files ({}):", graph.intermediate_files.len());
        for file in &graph.intermediate_files {
            println!("  {}", file.path.display());
        }
    }

    if !graph.warnings.is_empty() {
        println!("\n{} warning(s)", graph.warnings.len());
    }
}
