//! Build graph construction.
//!
//! A [`BuildTarget`] is assembled into binaries, then planned into the
//! actions that compile and link them.

pub mod actions;
pub mod assembler;
pub mod binary;
pub mod environment;
pub mod pch;
pub mod plan;
pub mod target;
pub mod toolchain;
pub mod unity;

pub use actions::{Action, ActionGraph, ActionKind, IntermediateFile};
pub use binary::{Binary, BinaryId, BinaryManifest, BinaryType};
pub use environment::{CppCompileEnvironment, EnvironmentComposer, LinkEnvironment};
pub use plan::{PrecompiledManifest, TargetPlan};
pub use target::BuildTarget;
pub use toolchain::{toolchain_for_platform, CommandSpec, LinkMode, Toolchain, ToolchainPlatform};
