//! Build target - everything known about one target while its graph is built.

use std::fmt;
use std::path::PathBuf;

use crate::builder::binary::{Binary, BinaryId, BinaryType};
use crate::builder::environment::EnvironmentComposer;
use crate::builder::toolchain::{toolchain_for_platform, Toolchain};
use crate::core::rules::RuleSource;
use crate::core::target::TargetRules;
use crate::resolver::graph::{CycleCheck, ModuleGraph, ModuleResolver};
use crate::resolver::module::ModuleId;
use crate::resolver::plugins::PluginSet;
use crate::util::config::Config;
use crate::util::diagnostic::DiagnosticSink;
use crate::util::fs::FileSystem;

/// One target: its rules, the module graph resolved for it, and the
/// binaries the modules are bound into.
pub struct BuildTarget<'a> {
    pub rules: &'a TargetRules,
    pub(crate) source: &'a dyn RuleSource,
    pub(crate) fs: &'a dyn FileSystem,
    pub config: &'a Config,
    pub(crate) cycles: CycleCheck,
    pub graph: ModuleGraph,
    pub plugins: PluginSet,
    pub binaries: Vec<Binary>,
    /// Warnings collected while building; errors abort instead
    pub diagnostics: DiagnosticSink,
    toolchain: Box<dyn Toolchain>,
}

impl fmt::Debug for BuildTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTarget")
            .field("name", &self.rules.name)
            .field("platform", &self.rules.platform)
            .field("configuration", &self.rules.configuration)
            .field("toolchain", &self.toolchain.platform())
            .field("modules", &self.graph.len())
            .field("plugins", &self.plugins.len())
            .field("binaries", &self.binaries.len())
            .finish()
    }
}

impl<'a> BuildTarget<'a> {
    pub fn new(
        source: &'a dyn RuleSource,
        rules: &'a TargetRules,
        fs: &'a dyn FileSystem,
        config: &'a Config,
    ) -> Self {
        BuildTarget {
            rules,
            source,
            fs,
            config,
            cycles: CycleCheck {
                policy: config.graph.circular_dependencies,
                whitelist: config.graph.cycle_whitelist(),
            },
            graph: ModuleGraph::new(),
            plugins: PluginSet::default(),
            binaries: Vec::new(),
            diagnostics: DiagnosticSink::new(),
            toolchain: toolchain_for_platform(rules.platform),
        }
    }

    /// Replace the toolchain picked for the target platform.
    pub fn with_toolchain(mut self, toolchain: Box<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    /// A resolver writing into this target's module graph.
    pub fn resolver(&mut self) -> ModuleResolver<'_> {
        ModuleResolver::new(
            &mut self.graph,
            &mut self.diagnostics,
            self.source,
            self.fs,
            self.rules,
            &self.cycles,
        )
    }

    /// Environment composer over the current graph and binaries.
    pub fn composer(&self) -> EnvironmentComposer<'_> {
        EnvironmentComposer::new(&self.graph, &self.binaries, self.rules, &self.plugins)
    }

    pub fn binary(&self, id: BinaryId) -> &Binary {
        &self.binaries[id.index()]
    }

    /// The binary `module` is compiled into, once bound.
    pub fn binary_of(&self, module: ModuleId) -> Option<&Binary> {
        self.graph
            .get(module)
            .binary
            .map(|id| &self.binaries[id.index()])
    }

    /// Directory of the plugin that owns `module`.
    pub fn plugin_dir_of(&self, module: ModuleId) -> Option<PathBuf> {
        self.plugins
            .iter()
            .find(|p| p.modules.contains(&module))
            .map(|p| p.info.directory.clone())
    }

    /// On-disk file name of a binary called `base`.
    ///
    /// Libraries get the toolchain prefix; everything is decorated with
    /// platform and configuration unless the configuration is undecorated.
    pub fn binary_file_name(&self, base: &str, binary_type: BinaryType) -> String {
        let toolchain = self.toolchain();
        let (prefix, extension) = match binary_type {
            BinaryType::Executable => ("", toolchain.exe_extension()),
            BinaryType::DynamicLibrary => {
                (toolchain.shared_lib_prefix(), toolchain.shared_lib_extension())
            }
            BinaryType::StaticLibrary => {
                (toolchain.static_lib_prefix(), toolchain.static_lib_extension())
            }
        };
        format!("{}{}{}", prefix, self.rules.decorate_binary_name(base), extension)
    }
}
