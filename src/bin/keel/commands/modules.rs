//! `keel modules` command

use anyhow::Result;

use crate::cli::GraphArgs;
use crate::commands::build_graph;

pub fn execute(args: GraphArgs, color: bool) -> Result<()> {
    let graph = build_graph(&args, color)?;

    for binary in &graph.binaries {
        println!("{} ({})", binary.name, binary.binary_type);
        for output in &binary.outputs {
            println!("  -> {}", output.display());
        }
        for module in &binary.modules {
            println!("  {}", module);
        }
        for module in &binary.external_modules {
            println!("  {} (external)", module);
        }
    }
    Ok(())
}
