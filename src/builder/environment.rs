//! Compile and link environments.
//!
//! A module's compile environment is the union of what its dependencies
//! export. The walk records, for every module it reaches, whether the module
//! is fully part of the environment or only lends its include paths; the map
//! keeps first-visit order so include paths come out in a stable order.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::builder::binary::{Binary, BinaryId, BinaryType};
use crate::core::paths::PathVariables;
use crate::core::rules::CodeOptimization;
use crate::core::target::{Configuration, Platform, TargetRules, TargetType};
use crate::resolver::errors::GraphError;
use crate::resolver::graph::ModuleGraph;
use crate::resolver::module::{Module, ModuleId};
use crate::resolver::plugins::PluginSet;

/// The compiler switches a precompiled header must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CompileFlags {
    pub optimize: bool,
    pub use_rtti: bool,
    pub enable_exceptions: bool,
    pub shadow_variable_warnings: bool,
    pub undefined_identifier_warnings: bool,
}

impl CompileFlags {
    /// Suffix naming every axis on which `self` differs from `base`.
    pub fn variant_suffix(&self, base: &CompileFlags) -> String {
        let axes = [
            (self.optimize, base.optimize, ".Optimized", ".NonOptimized"),
            (self.use_rtti, base.use_rtti, ".RTTI", ".NonRTTI"),
            (self.enable_exceptions, base.enable_exceptions, ".Exceptions", ".NoExceptions"),
            (
                self.shadow_variable_warnings,
                base.shadow_variable_warnings,
                ".Shadow",
                ".NoShadow",
            ),
            (
                self.undefined_identifier_warnings,
                base.undefined_identifier_warnings,
                ".Undef",
                ".NoUndef",
            ),
        ];

        let mut suffix = String::new();
        for (ours, theirs, on, off) in axes {
            if ours != theirs {
                suffix.push_str(if ours { on } else { off });
            }
        }
        suffix
    }
}

/// What a compile action does with a precompiled header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PchAction {
    #[default]
    None,
    /// Compile `header` into `pch_file`
    Create { header: PathBuf, pch_file: PathBuf },
    /// Compile against an existing `pch_file` built from `header`
    Include { header: PathBuf, pch_file: PathBuf },
}

/// The part of a compile environment contributed by module composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleEnvironment {
    pub include_paths: IndexSet<PathBuf>,
    pub system_include_paths: IndexSet<PathBuf>,
    pub definitions: Vec<String>,
    pub frameworks: IndexSet<String>,
}

/// Everything needed to compile one group of translation units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CppCompileEnvironment {
    pub platform: Platform,
    pub configuration: Configuration,
    pub architecture: String,
    pub include_paths: IndexSet<PathBuf>,
    pub system_include_paths: IndexSet<PathBuf>,
    pub definitions: Vec<String>,
    pub frameworks: IndexSet<String>,
    pub force_include_files: Vec<PathBuf>,
    pub flags: CompileFlags,
    pub is_building_dll: bool,
    pub is_building_library: bool,
    pub pch: PchAction,
}

impl CppCompileEnvironment {
    /// The environment shared by every module of `target`.
    pub fn for_target(target: &TargetRules) -> Self {
        let flag = |on: bool| if on { "1" } else { "0" };

        let mut definitions = target.global_definitions.clone();
        definitions.push(format!(
            "BUILD_{}=1",
            target.configuration.as_str().to_ascii_uppercase()
        ));
        definitions.push(format!("WITH_EDITOR={}", flag(target.build_editor())));
        definitions.push(format!("IS_MONOLITHIC={}", flag(target.is_monolithic())));
        definitions.push(format!(
            "IS_PROGRAM={}",
            flag(target.target_type == TargetType::Program)
        ));
        definitions.push(format!(
            "PLATFORM_{}=1",
            target.platform.as_str().to_ascii_uppercase()
        ));

        CppCompileEnvironment {
            platform: target.platform,
            configuration: target.configuration,
            architecture: target.architecture.clone(),
            include_paths: IndexSet::new(),
            system_include_paths: IndexSet::new(),
            definitions,
            frameworks: IndexSet::new(),
            force_include_files: Vec::new(),
            flags: CompileFlags {
                optimize: target.is_optimized_configuration(),
                use_rtti: target.use_rtti,
                enable_exceptions: target.enable_exceptions,
                shadow_variable_warnings: target.shadow_variable_warnings,
                undefined_identifier_warnings: target.undefined_identifier_warnings,
            },
            is_building_dll: !target.is_monolithic() || target.compile_as_dll,
            is_building_library: false,
            pch: PchAction::None,
        }
    }

    fn absorb(&mut self, composed: ModuleEnvironment) {
        self.include_paths.extend(composed.include_paths);
        self.system_include_paths.extend(composed.system_include_paths);
        self.definitions.extend(composed.definitions);
        self.frameworks.extend(composed.frameworks);
    }
}

/// Libraries and binaries a binary links against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkEnvironment {
    pub library_paths: IndexSet<PathBuf>,
    /// Library names or paths, in discovery order
    pub libraries: IndexSet<String>,
    pub frameworks: IndexSet<String>,
    pub binary_dependencies: IndexSet<BinaryId>,
}

/// Composes environments from a resolved, bound module graph.
pub struct EnvironmentComposer<'a> {
    graph: &'a ModuleGraph,
    binaries: &'a [Binary],
    target: &'a TargetRules,
    plugin_dirs: HashMap<ModuleId, PathBuf>,
}

impl<'a> EnvironmentComposer<'a> {
    pub fn new(
        graph: &'a ModuleGraph,
        binaries: &'a [Binary],
        target: &'a TargetRules,
        plugins: &PluginSet,
    ) -> Self {
        let plugin_dirs = plugins
            .iter()
            .flat_map(|p| p.modules.iter().map(|&m| (m, p.info.directory.clone())))
            .collect();
        EnvironmentComposer {
            graph,
            binaries,
            target,
            plugin_dirs,
        }
    }

    /// Directories available to `$(Variable)` references in the rules of `id`.
    pub fn path_variables(&self, id: ModuleId, binary: Option<&Binary>) -> PathVariables {
        let target_output_dir = self
            .binaries
            .first()
            .and_then(|b| b.output_path().parent())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.target.output_dir());
        let binary_output_dir = binary
            .and_then(|b| b.output_path().parent())
            .map(PathBuf::from)
            .unwrap_or_else(|| target_output_dir.clone());

        PathVariables {
            engine_dir: self.target.engine_dir.clone(),
            project_dir: self.target.project_dir.clone(),
            module_dir: self.graph.get(id).rules.directory.clone(),
            plugin_dir: self.plugin_dirs.get(&id).cloned(),
            binary_output_dir,
            target_output_dir,
        }
    }

    /// Add `id` and its public closure as fully included.
    ///
    /// A module already fully included is not walked again; one seen only for
    /// its include paths is upgraded.
    pub fn find_modules_in_public_compile_environment(
        &self,
        id: ModuleId,
        map: &mut IndexMap<ModuleId, bool>,
    ) {
        if map.get(&id) == Some(&true) {
            return;
        }
        map.insert(id, true);

        let module = self.graph.get(id);
        for &dep in &module.public_dependencies {
            self.find_modules_in_public_compile_environment(dep, map);
        }
        for &dep in module.public_include_path_modules.iter().flatten() {
            self.find_include_path_modules_in_public_compile_environment(dep, map);
        }
    }

    /// Add `id` for its include paths only, unless it is already present.
    pub fn find_include_path_modules_in_public_compile_environment(
        &self,
        id: ModuleId,
        map: &mut IndexMap<ModuleId, bool>,
    ) {
        if map.contains_key(&id) {
            return;
        }
        map.insert(id, false);

        for &dep in self.graph.get(id).public_include_path_modules.iter().flatten() {
            self.find_include_path_modules_in_public_compile_environment(dep, map);
        }
    }

    pub fn find_modules_in_private_compile_environment(
        &self,
        id: ModuleId,
        map: &mut IndexMap<ModuleId, bool>,
    ) {
        let module = self.graph.get(id);
        for &dep in &module.private_dependencies {
            self.find_modules_in_public_compile_environment(dep, map);
        }
        for &dep in &module.private_include_path_modules {
            self.find_include_path_modules_in_public_compile_environment(dep, map);
        }
        self.find_modules_in_public_compile_environment(id, map);
    }

    /// The private environment of `id` as seen when compiling it into
    /// `for_binary`.
    pub fn compose_compile_environment(
        &self,
        id: ModuleId,
        for_binary: Option<BinaryId>,
    ) -> ModuleEnvironment {
        let module = self.graph.get(id);
        let mut env = ModuleEnvironment::default();
        env.include_paths
            .extend(module.private_include_paths.iter().cloned());
        env.definitions
            .extend(module.rules.private_definitions.iter().cloned());

        let mut map = IndexMap::new();
        self.find_modules_in_private_compile_environment(id, &mut map);
        for (&member, &fully_included) in &map {
            self.add_module_to_environment(member, fully_included, for_binary, &mut env);
        }
        env
    }

    /// The environment any module including the public headers of `id` sees.
    pub fn compose_public_environment(
        &self,
        id: ModuleId,
        for_binary: Option<BinaryId>,
    ) -> ModuleEnvironment {
        let mut env = ModuleEnvironment::default();
        let mut map = IndexMap::new();
        self.find_modules_in_public_compile_environment(id, &mut map);
        for (&member, &fully_included) in &map {
            self.add_module_to_environment(member, fully_included, for_binary, &mut env);
        }
        env
    }

    fn add_module_to_environment(
        &self,
        id: ModuleId,
        fully_included: bool,
        for_binary: Option<BinaryId>,
        env: &mut ModuleEnvironment,
    ) {
        let module = self.graph.get(id);
        env.include_paths
            .extend(module.public_include_paths.iter().cloned());
        env.system_include_paths
            .extend(module.public_system_include_paths.iter().cloned());

        if !fully_included {
            return;
        }
        env.definitions
            .extend(module.rules.public_definitions.iter().cloned());
        if module.is_cpp() {
            env.definitions.push(self.api_definition(module, for_binary));
        }
        env.frameworks
            .extend(module.rules.public_frameworks.iter().cloned());
    }

    /// `<NAME>_API=<linkage>` for `module` as seen from code in `for_binary`.
    pub fn api_definition(&self, module: &Module, for_binary: Option<BinaryId>) -> String {
        let linkage = if self.target.is_monolithic() {
            if self.target.compile_as_dll && self.target.has_exports {
                "DLLEXPORT"
            } else {
                ""
            }
        } else {
            match module.binary {
                Some(binary) if Some(binary) == for_binary => {
                    if self.binaries[binary.index()].allow_exports {
                        "DLLEXPORT"
                    } else {
                        ""
                    }
                }
                _ => "DLLIMPORT",
            }
        };
        format!("{}={}", module.api_define(), linkage)
    }

    /// Compile flags of `id`: the module's overrides on top of `base`.
    pub fn module_compile_flags(&self, id: ModuleId, base: &CompileFlags) -> CompileFlags {
        let module = self.graph.get(id);
        let rules = &module.rules;
        CompileFlags {
            optimize: self.should_optimize(rules.optimize, module.is_engine_module),
            use_rtti: rules.use_rtti.unwrap_or(base.use_rtti),
            enable_exceptions: rules.enable_exceptions.unwrap_or(base.enable_exceptions),
            shadow_variable_warnings: rules
                .shadow_variable_warnings
                .unwrap_or(base.shadow_variable_warnings),
            undefined_identifier_warnings: rules
                .undefined_identifier_warnings
                .unwrap_or(base.undefined_identifier_warnings),
        }
    }

    fn should_optimize(&self, mode: CodeOptimization, is_engine_module: bool) -> bool {
        let configuration = self.target.configuration;
        match mode {
            CodeOptimization::Never => false,
            CodeOptimization::Always => true,
            CodeOptimization::InShippingBuildsOnly => configuration == Configuration::Shipping,
            CodeOptimization::Default | CodeOptimization::InNonDebugBuilds => {
                !(configuration == Configuration::Debug
                    || (configuration == Configuration::DebugGame && !is_engine_module))
            }
        }
    }

    /// Full environment for compiling the sources of `id`.
    pub fn module_compile_environment(
        &self,
        id: ModuleId,
        base: &CppCompileEnvironment,
    ) -> CppCompileEnvironment {
        let module = self.graph.get(id);
        let mut env = base.clone();
        env.flags = self.module_compile_flags(id, &base.flags);
        env.is_building_library = module
            .binary
            .is_some_and(|b| self.binaries[b.index()].binary_type == BinaryType::StaticLibrary);
        env.definitions.push(engine_module_definition(module));
        env.absorb(self.compose_compile_environment(id, module.binary));
        env
    }

    /// Environment a shared precompiled header owned by `id` is built with.
    ///
    /// Only the owner's public closure contributes, and API macros are seen
    /// from outside any binary.
    pub fn shared_pch_environment(
        &self,
        id: ModuleId,
        base: &CppCompileEnvironment,
    ) -> CppCompileEnvironment {
        let module = self.graph.get(id);
        let mut env = base.clone();
        env.flags.optimize = self.should_optimize(CodeOptimization::Default, module.is_engine_module);
        env.is_building_dll = !self.target.is_monolithic();
        env.is_building_library = false;
        env.definitions.push(engine_module_definition(module));
        env.absorb(self.compose_public_environment(id, None));
        env
    }

    /// Link environment of `binary`.
    ///
    /// Dependencies bound into other dynamic binaries become binary
    /// dependencies and are not walked further. External modules and modules
    /// in static libraries are walked through, since their own dependencies
    /// end up in this link too.
    pub fn link_environment(&self, binary: &Binary) -> Result<LinkEnvironment, GraphError> {
        let mut env = LinkEnvironment::default();
        let mut visited = HashSet::new();
        for &id in binary.modules.iter().chain(&binary.external_modules) {
            self.add_link_dependencies(id, binary, &mut env, &mut visited)?;
        }
        Ok(env)
    }

    fn add_link_dependencies(
        &self,
        id: ModuleId,
        binary: &Binary,
        env: &mut LinkEnvironment,
        visited: &mut HashSet<ModuleId>,
    ) -> Result<(), GraphError> {
        if !visited.insert(id) {
            return Ok(());
        }

        let module = self.graph.get(id);
        let vars = self.path_variables(id, Some(binary));
        for path in &module.rules.public_library_paths {
            env.library_paths.insert(vars.expand(path, &module.name)?);
        }
        for library in &module.rules.public_libraries {
            let expanded = vars.expand(library, &module.name)?;
            env.libraries.insert(expanded.to_string_lossy().into_owned());
        }
        env.frameworks
            .extend(module.rules.public_frameworks.iter().cloned());

        for dep in module.direct_dependencies() {
            match self.graph.get(dep).binary {
                Some(other) if other == binary.id => {}
                Some(other)
                    if self.binaries[other.index()].binary_type != BinaryType::StaticLibrary =>
                {
                    env.binary_dependencies.insert(other);
                }
                Some(other) => {
                    env.binary_dependencies.insert(other);
                    self.add_link_dependencies(dep, binary, env, visited)?;
                }
                None => self.add_link_dependencies(dep, binary, env, visited)?,
            }
        }
        Ok(())
    }
}

fn engine_module_definition(module: &Module) -> String {
    format!("IS_ENGINE_MODULE={}", if module.is_engine_module { 1 } else { 0 })
}
