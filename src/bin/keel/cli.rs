//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// keel - build-graph construction for modular C++ codebases
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the action graph of a target
    Plan(PlanArgs),

    /// List the binaries of a target and the modules bound into each
    Modules(GraphArgs),

    /// Resolve and validate a target without printing actions
    Check(GraphArgs),
}

/// Inputs shared by every command.
#[derive(Args)]
pub struct GraphArgs {
    /// Rule set describing the target
    pub rules: PathBuf,

    /// Config file used instead of `.keel/config.toml` next to the rule set
    #[arg(long, env = "KEEL_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable overview
    Summary,
    /// The full target graph as JSON
    Json,
}
