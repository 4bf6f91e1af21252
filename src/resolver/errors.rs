//! Graph construction errors and their diagnostics.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error that aborts construction of a target graph.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum GraphError {
    #[error("unable to find module `{name}`")]
    #[diagnostic(code(keel::graph::unresolved_module))]
    UnresolvedModule { name: String, chain: String },

    #[error("module `{module}` is not a C++ module")]
    #[diagnostic(code(keel::graph::not_a_cpp_module))]
    NotACppModule { module: String, chain: String },

    #[error("circular dependency between `{module}` and `{other}` is not allowed")]
    #[diagnostic(
        code(keel::graph::circular_dependency),
        help("Add the pair to `graph.allowed_cycles` if the cycle is intentional")
    )]
    CircularDependencyViolation {
        module: String,
        other: String,
        chain: String,
    },

    #[error("invalid rules for module `{module}`: {message}")]
    #[diagnostic(code(keel::graph::invalid_rules))]
    InvalidModuleRules { module: String, message: String },

    #[error("source file `{}` listed by module `{module}` does not exist", path.display())]
    #[diagnostic(code(keel::graph::missing_source))]
    MissingSourceFile { module: String, path: PathBuf },

    #[error("target `{target}` modifies settings that require a unique build environment")]
    #[diagnostic(
        code(keel::target::incompatible_shared_environment),
        help("Set `build_environment = \"Unique\"` or restore the base target's values")
    )]
    IncompatibleSharedBuildEnvironment {
        target: String,
        base_target: String,
        /// (field, this target's value, base target's value)
        differences: Vec<(String, String, String)>,
    },

    #[error("missing precompiled manifest for `{module}`")]
    #[diagnostic(
        code(keel::target::missing_precompiled_manifest),
        help("Build the module once with `precompile = true` before using it precompiled")
    )]
    MissingPrecompiledManifest { module: String, path: PathBuf },

    #[error("invalid precompiled manifest for `{module}`: {message}")]
    #[diagnostic(code(keel::target::invalid_precompiled_manifest))]
    InvalidPrecompiledManifest {
        module: String,
        path: PathBuf,
        message: String,
    },

    #[error("plugin `{plugin}` has a circular dependency on itself")]
    #[diagnostic(code(keel::plugin::self_dependency))]
    PluginSelfDependency { plugin: String, chain: String },

    #[error("unable to find plugin `{name}`")]
    #[diagnostic(code(keel::plugin::not_found))]
    PluginNotFound { name: String, chain: String },

    #[error("plugin module `{module}` must be under its plugin directory `{}`", plugin_dir.display())]
    #[diagnostic(code(keel::plugin::module_outside_plugin))]
    PluginModuleOutsidePlugin {
        module: String,
        plugin: String,
        plugin_dir: PathBuf,
    },

    #[error("shared PCH header for `{module}` can only be declared by engine modules")]
    #[diagnostic(code(keel::pch::shared_pch_not_engine))]
    SharedPchNotEngineModule { module: String },

    #[error("target `{target}` has no launch module")]
    #[diagnostic(code(keel::target::missing_launch_module))]
    MissingLaunchModule { target: String },

    #[error("`{output}` would be placed outside the restricted folder `{folder}` of its input `{module}`")]
    #[diagnostic(code(keel::target::restricted_folder))]
    RestrictedFolderViolation {
        module: String,
        folder: String,
        output: PathBuf,
    },

    #[error("engine module `{engine_module}` depends on game module `{game_module}`")]
    #[diagnostic(code(keel::target::engine_depends_on_game))]
    EngineDependsOnGameModule {
        engine_module: String,
        game_module: String,
    },

    #[error("non-redistributable module `{module}` is part of shipping target `{target}`")]
    #[diagnostic(code(keel::target::non_redistributable))]
    NonRedistributableDependency { module: String, target: String },

    #[error("undefined variable `$({variable})` in path `{path}` of module `{module}`")]
    #[diagnostic(code(keel::graph::undefined_path_variable))]
    UndefinedPathVariable {
        variable: String,
        module: String,
        path: String,
    },

    #[error("action graph contains a cycle through `{item}`")]
    #[diagnostic(code(keel::actions::cycle))]
    ActionGraphCycle { item: String },

    #[error("`{}` is produced by more than one action", item.display())]
    #[diagnostic(code(keel::actions::conflicting_output))]
    ConflictingProducedItem {
        item: PathBuf,
        first: String,
        second: String,
    },

    #[error("failed to read `{}`: {message}", path.display())]
    #[diagnostic(code(keel::io))]
    FileSystem { path: PathBuf, message: String },
}

impl GraphError {
    /// The reference chain that led to the failure, when one applies.
    pub fn reference_chain(&self) -> Option<&str> {
        match self {
            GraphError::UnresolvedModule { chain, .. }
            | GraphError::NotACppModule { chain, .. }
            | GraphError::CircularDependencyViolation { chain, .. }
            | GraphError::PluginSelfDependency { chain, .. }
            | GraphError::PluginNotFound { chain, .. } => Some(chain.as_str()),
            _ => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string());

        if let Some(chain) = self.reference_chain() {
            if !chain.is_empty() {
                diag = diag.with_context(format!("referenced via {}", chain));
            }
        }

        match self {
            GraphError::UnresolvedModule { name, .. } => diag
                .with_suggestion(suggestions::UNRESOLVED_MODULE)
                .with_suggestion(format!("Add a rule for `{}` to the rule set", name)),

            GraphError::NotACppModule { module, .. } => diag.with_suggestion(format!(
                "Reference `{}` as a dependency instead of compiling it directly",
                module
            )),

            GraphError::CircularDependencyViolation { module, other, .. } => diag
                .with_context(format!("`{}` and `{}` depend on each other", module, other))
                .with_suggestion(suggestions::CIRCULAR_DEPENDENCY)
                .with_suggestion("Break the cycle by moving shared code into a new module"),

            GraphError::InvalidModuleRules { .. } => {
                diag.with_suggestion(suggestions::RUN_VERBOSE)
            }

            GraphError::MissingSourceFile { path, .. } => diag.with_location(path.clone()),

            GraphError::IncompatibleSharedBuildEnvironment {
                base_target,
                differences,
                ..
            } => {
                for (field, ours, base) in differences {
                    diag = diag.with_context(format!(
                        "{} = {} (`{}` has {})",
                        field, ours, base_target, base
                    ));
                }
                diag.with_suggestion("Set `build_environment = \"Unique\"` on the target")
                    .with_suggestion("Restore the base target's values for the listed fields")
            }

            GraphError::MissingPrecompiledManifest { path, .. }
            | GraphError::InvalidPrecompiledManifest { path, .. } => diag
                .with_location(path.clone())
                .with_suggestion("Rebuild the module with `precompile = true`"),

            GraphError::PluginSelfDependency { .. } => {
                diag.with_suggestion("Remove one of the plugin references that closes the loop")
            }

            GraphError::PluginNotFound { name, .. } => diag
                .with_suggestion(format!("Add `{}` to the rule set's `[[plugins]]`", name))
                .with_suggestion("Mark the reference `optional = true` if it may be absent"),

            GraphError::PluginModuleOutsidePlugin { plugin_dir, .. } => {
                diag.with_location(plugin_dir.clone())
            }

            GraphError::SharedPchNotEngineModule { .. } => diag.with_suggestion(
                "Use `private_pch_header` for modules outside the engine tree",
            ),

            GraphError::MissingLaunchModule { .. } => {
                diag.with_suggestion("Set `launch_module` in the `[target]` table")
            }

            GraphError::RestrictedFolderViolation { .. } => diag
                .with_suggestion("Move the output into the same restricted folder")
                .with_suggestion("Set `license_unchecked = true` for internal builds"),

            GraphError::EngineDependsOnGameModule { .. } => {
                diag.with_suggestion("Engine modules may only depend on engine or plugin modules")
            }

            GraphError::NonRedistributableDependency { module, .. } => diag.with_suggestion(
                format!("Set `redistributable = true` on `{}` if it may ship", module),
            ),

            GraphError::UndefinedPathVariable { variable, .. } => diag.with_suggestion(format!(
                "Define the `{}` environment variable",
                variable
            )),

            GraphError::ActionGraphCycle { .. } | GraphError::ConflictingProducedItem { .. } => {
                diag.with_suggestion(suggestions::RUN_VERBOSE)
            }

            GraphError::FileSystem { path, .. } => diag.with_location(path.clone()),
        }
    }
}
