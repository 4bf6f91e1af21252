//! Target assembly: resolve the module graph and bind modules to binaries.
//!
//! Assembly runs in a fixed order. Plugins are set up first, then the launch
//! module and its binary are created, plugin and extra modules are added, and
//! every module reachable from a binary is resolved. Binding then walks each
//! binary's dependency closure; in modular targets that creates a new DLL per
//! module, so the binary list grows while it is walked. The target is checked
//! last, once every module has a binary.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, trace};

use crate::builder::binary::{Binary, BinaryId, BinaryType};
use crate::builder::target::BuildTarget;
use crate::core::target::TargetType;
use crate::resolver::errors::GraphError;
use crate::resolver::graph::ModuleResolver;
use crate::resolver::module::ModuleId;
use crate::resolver::plugins::{create_plugin_modules, PluginResolver};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::is_inside;

impl BuildTarget<'_> {
    /// Build the module graph and bind every compiled module to a binary.
    pub fn assemble(&mut self) -> Result<(), GraphError> {
        info!(
            "assembling {} {} {} ({:?})",
            self.rules.name, self.rules.platform, self.rules.configuration, self.rules.link_type
        );

        self.plugins =
            PluginResolver::new(self.source.available_plugins(), self.rules, &mut self.diagnostics)
                .setup()?;

        let launch = self.create_launch_module()?;
        self.setup_launch_binary(launch);

        {
            let mut resolver = ModuleResolver::new(
                &mut self.graph,
                &mut self.diagnostics,
                self.source,
                self.fs,
                self.rules,
                &self.cycles,
            );
            create_plugin_modules(&mut self.plugins, &mut resolver, self.rules)?;
        }
        let plugin_modules: Vec<ModuleId> = self
            .plugins
            .iter()
            .flat_map(|p| p.modules.iter().copied())
            .collect();
        for id in plugin_modules {
            self.add_module_to_binary(id);
        }

        for name in self.rules.extra_modules.clone() {
            let chain = format!("{} -> {}", self.rules.name, name);
            let id = self.resolver().find_or_create_cpp_module(&name, &chain)?;
            self.add_module_to_binary(id);
        }

        self.create_all_dependent_modules()?;
        self.bind_dependencies();
        self.add_unbound_references();
        self.mark_import_libraries();

        self.check_restricted_folders()?;
        self.check_license_violations()?;
        self.check_engine_dependencies()?;
        self.check_plugin_dependencies();

        info!(
            "{} modules in {} binaries",
            self.graph.len(),
            self.binaries.len()
        );
        Ok(())
    }

    fn create_launch_module(&mut self) -> Result<ModuleId, GraphError> {
        let name = self.rules.launch_module.clone();
        if name.is_empty() || self.source.module_rule(&name).is_none() {
            return Err(GraphError::MissingLaunchModule {
                target: self.rules.name.clone(),
            });
        }
        let chain = format!("{} -> {}", self.rules.name, name);
        self.resolver().find_or_create_cpp_module(&name, &chain)
    }

    fn setup_launch_binary(&mut self, launch: ModuleId) {
        let rules = self.rules;
        let binary_type = if rules.compile_as_library {
            BinaryType::StaticLibrary
        } else if rules.compile_as_dll {
            BinaryType::DynamicLibrary
        } else {
            BinaryType::Executable
        };

        let launch_dir = &self.graph.get(launch).rules.directory;
        let root = if is_inside(launch_dir, &rules.engine_dir) && !rules.is_monolithic() {
            rules.engine_dir.as_path()
        } else {
            rules.root_dir()
        };
        let intermediate_dir = rules.intermediate_dir(root);
        let output_dir = rules.output_dir();

        let id = self.push_binary(
            binary_type,
            rules.app_name().to_string(),
            output_dir,
            intermediate_dir,
            launch,
        );
        let binary = &mut self.binaries[id.index()];
        binary.allow_exports = binary_type != BinaryType::StaticLibrary && rules.has_exports;
        debug!("launch binary `{}` ({})", binary.name, binary_type);
    }

    fn push_binary(
        &mut self,
        binary_type: BinaryType,
        name: String,
        output_dir: PathBuf,
        intermediate_dir: PathBuf,
        primary: ModuleId,
    ) -> BinaryId {
        let id = BinaryId(self.binaries.len() as u32);
        let file_name = self.binary_file_name(&name, binary_type);
        let mut binary = Binary::new(
            id,
            binary_type,
            name,
            output_dir.join(file_name),
            intermediate_dir,
            primary,
        );
        if binary_type == BinaryType::DynamicLibrary {
            if let Some(extension) = self.toolchain().import_lib_extension() {
                let decorated = self.rules.decorate_binary_name(&binary.name);
                binary.import_library = Some(
                    binary
                        .intermediate_dir
                        .join(format!("{}{}", decorated, extension)),
                );
            }
        }
        self.graph.get_mut(primary).binary = Some(id);
        self.binaries.push(binary);
        id
    }

    /// Bind `id` into the binary it belongs in: the primary binary of a
    /// monolithic target, or a new DLL of its own otherwise.
    fn add_module_to_binary(&mut self, id: ModuleId) -> BinaryId {
        if let Some(existing) = self.graph.get(id).binary {
            return existing;
        }

        if self.rules.is_monolithic() {
            let primary = BinaryId(0);
            self.binaries[0].add_module(id);
            self.graph.get_mut(id).binary = Some(primary);
            trace!("bound `{}` into `{}`", self.graph.name(id), self.binaries[0].name);
            return primary;
        }

        let module = self.graph.get(id);
        let name = format!("{}-{}", self.rules.app_name(), module.name);
        let use_precompiled = module.rules.use_precompiled;

        let mut output_dir = match self.plugin_dir_of(id) {
            Some(plugin_dir) => plugin_dir.join("Binaries").join(self.rules.platform.as_str()),
            None if self.rules.output_dir.is_none()
                && is_inside(&module.rules.directory, &self.rules.engine_dir) =>
            {
                self.rules
                    .engine_dir
                    .join("Binaries")
                    .join(self.rules.platform.as_str())
            }
            None => self.rules.output_dir(),
        };
        if let Some(subfolder) = &module.rules.binaries_subfolder {
            output_dir.push(subfolder);
        }

        let root = if module.is_engine_module {
            self.rules.engine_dir.as_path()
        } else {
            self.rules.root_dir()
        };
        let intermediate_dir = self.rules.intermediate_dir(root).join(&module.name);

        let id = self.push_binary(BinaryType::DynamicLibrary, name, output_dir, intermediate_dir, id);
        let binary = &mut self.binaries[id.index()];
        binary.use_precompiled = use_precompiled;
        debug!("created `{}` for modular module", binary.name);
        id
    }

    fn create_all_dependent_modules(&mut self) -> Result<(), GraphError> {
        let roots: Vec<ModuleId> = self
            .binaries
            .iter()
            .flat_map(|b| b.modules.iter().copied())
            .collect();
        for id in roots {
            let chain = self.graph.get(id).reference_chain.clone();
            self.resolver().recursively_create(id, &chain)?;
        }
        Ok(())
    }

    /// Bind every compiled module in the closure of each binary.
    ///
    /// Dynamically loaded modules are included, since they must be built even
    /// though nothing links against them.
    fn bind_dependencies(&mut self) {
        let mut index = 0;
        while index < self.binaries.len() {
            let modules: Vec<ModuleId> = self.binaries[index].modules.iter().copied().collect();
            for id in modules {
                for dep in self.graph.dependency_closure(id, true, false) {
                    let module = self.graph.get(dep);
                    if module.is_cpp() && module.binary.is_none() {
                        self.add_module_to_binary(dep);
                    }
                }
            }
            index += 1;
        }
    }

    /// Give each binary the direct dependencies of its modules that are not
    /// compiled anywhere: compiled ones join the binary, external ones are
    /// linked by it.
    fn add_unbound_references(&mut self) {
        for index in 0..self.binaries.len() {
            let modules: Vec<ModuleId> = self.binaries[index].modules.iter().copied().collect();
            for id in modules {
                let deps: Vec<ModuleId> = self.graph.get(id).direct_dependencies().collect();
                for dep in deps {
                    let module = self.graph.get(dep);
                    if module.binary.is_some() {
                        continue;
                    }
                    if module.is_cpp() {
                        self.binaries[index].add_module(dep);
                        self.graph.get_mut(dep).binary = Some(self.binaries[index].id);
                    } else {
                        self.binaries[index].external_modules.insert(dep);
                    }
                }
            }
        }
    }

    /// Decide which binaries need their import library ahead of the link.
    ///
    /// Windows-family platforms always split it out in modular targets;
    /// elsewhere only binaries of modules in a declared cycle need it.
    fn mark_import_libraries(&mut self) {
        if self.rules.is_monolithic() {
            return;
        }

        if self.rules.platform.is_windows_family() {
            for binary in &mut self.binaries {
                binary.create_import_library_separately = true;
            }
            return;
        }

        let circular: HashSet<String> = self
            .graph
            .iter()
            .flat_map(|m| m.rules.circularly_referenced.iter())
            .map(|name| name.to_ascii_lowercase())
            .collect();
        for binary in &mut self.binaries {
            let in_cycle = binary
                .modules
                .iter()
                .any(|&m| circular.contains(&self.graph.name(m).to_ascii_lowercase()));
            if in_cycle {
                debug!("`{}` creates its import library separately", binary.name);
                binary.create_import_library_separately = true;
            }
        }
    }

    /// Modules from a restricted folder may only be linked into outputs in
    /// the same folder.
    fn check_restricted_folders(&self) -> Result<(), GraphError> {
        if self.rules.license_unchecked {
            return Ok(());
        }

        let folders = &self.config.graph.restricted_folders;
        for binary in &self.binaries {
            let output = binary.output_path();
            for &id in &binary.modules {
                let module = self.graph.get(id);
                for folder in folders {
                    if has_component(&module.rules.directory, folder)
                        && !has_component(output, folder)
                    {
                        return Err(GraphError::RestrictedFolderViolation {
                            module: module.name.clone(),
                            folder: folder.clone(),
                            output: output.to_path_buf(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Shipping game targets may not contain non-redistributable modules.
    fn check_license_violations(&mut self) -> Result<(), GraphError> {
        let rules = self.rules;
        if matches!(rules.target_type, TargetType::Editor | TargetType::Program)
            || !rules.is_shipping()
            || !rules.check_license_violations
        {
            return Ok(());
        }

        let developer = rules.engine_dir.join("Source").join("Developer");
        let editor = rules.engine_dir.join("Source").join("Editor");
        let mut reported = HashSet::new();

        for binary in &self.binaries {
            for &root in &binary.modules {
                let closure = self.graph.dependency_closure(root, true, false);
                for id in std::iter::once(root).chain(closure) {
                    let module = self.graph.get(id);
                    if module.name.eq_ignore_ascii_case(rules.app_name()) {
                        continue;
                    }
                    let redistributable = module.rules.redistributable.unwrap_or_else(|| {
                        !(is_inside(&module.rules.directory, &developer)
                            || is_inside(&module.rules.directory, &editor))
                    });
                    if redistributable || !reported.insert(id) {
                        continue;
                    }

                    let err = GraphError::NonRedistributableDependency {
                        module: module.name.clone(),
                        target: rules.name.clone(),
                    };
                    if rules.break_build_on_license_violation {
                        return Err(err);
                    }
                    self.diagnostics.push(Diagnostic::warning(err.to_string()).with_location(
                        module.rules.directory.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Modules under the engine directory may not reference modules outside it.
    fn check_engine_dependencies(&self) -> Result<(), GraphError> {
        let engine_dir = &self.rules.engine_dir;
        for binary in &self.binaries {
            for &id in &binary.modules {
                let module = self.graph.get(id);
                if !is_inside(&module.rules.directory, engine_dir) {
                    continue;
                }
                for other in module.all_references() {
                    let other = self.graph.get(other);
                    if !is_inside(&other.rules.directory, engine_dir) {
                        return Err(GraphError::EngineDependsOnGameModule {
                            engine_module: module.name.clone(),
                            game_module: other.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Warn when a plugin module depends on a module of a plugin its plugin
    /// does not list.
    fn check_plugin_dependencies(&mut self) {
        let owners = self.plugins.module_owners();
        let mut warnings = Vec::new();

        for plugin in self.plugins.iter() {
            let key = plugin.name().to_ascii_lowercase();
            for &id in &plugin.modules {
                let module = self.graph.get(id);
                for dep in module.direct_dependencies() {
                    let Some(&dep_key) = owners.get(&dep) else {
                        continue;
                    };
                    if dep_key == key || plugin.depends_on(dep_key) {
                        continue;
                    }
                    let dep_plugin = self.plugins.get(dep_key).map_or(dep_key, |p| p.name());
                    warnings.push(format!(
                        "plugin `{}` does not list plugin `{}` as a dependency, but module `{}` depends on `{}`",
                        plugin.name(),
                        dep_plugin,
                        module.name,
                        self.graph.name(dep)
                    ));
                }
            }
        }

        for warning in warnings {
            self.diagnostics.warn(warning);
        }
    }
}

/// Whether any component of `path` equals `name`, ignoring ASCII case.
fn has_component(path: &Path, name: &str) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => part
            .to_str()
            .is_some_and(|part| part.eq_ignore_ascii_case(name)),
        _ => false,
    })
}
