//! `keel check` command

use anyhow::Result;

use crate::cli::GraphArgs;
use crate::commands::build_graph;

pub fn execute(args: GraphArgs, color: bool) -> Result<()> {
    let graph = build_graph(&args, color)?;

    let modules: usize = graph.binaries.iter().map(|b| b.modules.len()).sum();
    println!(
        "`{}` is valid: {} modules in {} binaries, {} actions, {} warning(s)",
        graph.target,
        modules,
        graph.binaries.len(),
        graph.actions.len(),
        graph.warnings.len()
    );
    Ok(())
}
