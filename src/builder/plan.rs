//! Action planning.
//!
//! Turns an assembled target into the actions that build it: PCH creation
//! and compiles per module, then one link or archive per binary, import
//! libraries where they are split out, and copies of runtime dependencies.
//! Generated sources (unity files, PCH wrappers, definition headers,
//! precompiled manifests) are returned as intermediate files; nothing is
//! written to disk here.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::builder::actions::{Action, ActionGraph, ActionKind, IntermediateFile};
use crate::builder::binary::{Binary, BinaryId, BinaryType};
use crate::builder::environment::{CppCompileEnvironment, EnvironmentComposer, PchAction};
use crate::builder::pch::{
    append_extension, find_shared_pchs, unique_first_include, PchHandle, PchMode, PchSelection, PchSelector,
};
use crate::builder::target::BuildTarget;
use crate::builder::toolchain::{ArchiveInput, CommandSpec, CompileInput, Language, LinkInput, LinkMode};
use crate::builder::unity::{batch, CompileGroup, DedicatedPch, UnitySettings};
use crate::resolver::errors::GraphError;
use crate::resolver::module::{Module, ModuleId};
use crate::util::diagnostic::Diagnostic;
use crate::util::fs::claim_unique_path;

/// The actions and generated files of one target.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    /// Actions in dependency order
    pub actions: Vec<Action>,
    pub intermediate_files: Vec<IntermediateFile>,
}

/// Link inputs recorded for a module built with `precompile`, so later
/// builds can link it without compiling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompiledManifest {
    pub module: String,
    pub object_files: Vec<PathBuf>,
}

impl PrecompiledManifest {
    /// Where the manifest of `module` lives.
    pub fn path_for(module: &Module) -> Option<PathBuf> {
        module
            .cpp()
            .map(|cpp| cpp.intermediate_dir.join(format!("{}.precompiled", module.name)))
    }
}

impl BuildTarget<'_> {
    /// Plan the actions for an assembled target.
    pub fn plan(&mut self) -> Result<TargetPlan, GraphError> {
        let (plan, warnings, invalid_includes) = {
            let mut planner = Planner::new(self)?;
            for binary in &self.binaries {
                planner.compile_binary(binary)?;
            }
            for binary in &self.binaries {
                planner.link_binary(binary)?;
            }
            let (actions, intermediate_files) = planner.actions.finalize()?;
            (
                TargetPlan {
                    actions,
                    intermediate_files,
                },
                planner.warnings,
                planner.invalid_includes,
            )
        };

        for (id, messages) in invalid_includes {
            self.graph.get_mut(id).invalid_includes = messages;
        }
        for warning in warnings {
            self.diagnostics.push(warning);
        }

        info!(
            "planned {} actions and {} intermediate files for `{}`",
            plan.actions.len(),
            plan.intermediate_files.len(),
            self.rules.name
        );
        Ok(plan)
    }
}

struct Planner<'t, 'a> {
    target: &'t BuildTarget<'a>,
    composer: EnvironmentComposer<'t>,
    base: CppCompileEnvironment,
    selector: PchSelector,
    actions: ActionGraph,
    /// Link inputs per binary, indexed like the target's binaries
    objects: Vec<IndexSet<PathBuf>>,
    object_paths: HashSet<PathBuf>,
    cyclic_edges: HashSet<(BinaryId, BinaryId)>,
    copies: HashSet<PathBuf>,
    warnings: Vec<Diagnostic>,
    invalid_includes: Vec<(ModuleId, Vec<String>)>,
}

impl<'t, 'a> Planner<'t, 'a> {
    fn new(target: &'t BuildTarget<'a>) -> Result<Self, GraphError> {
        let composer =
            EnvironmentComposer::new(&target.graph, &target.binaries, target.rules, &target.plugins);
        let base = CppCompileEnvironment::for_target(target.rules);
        let templates = find_shared_pchs(&target.graph, &composer, &base)?;
        debug!("{} shared PCH templates", templates.len());
        let selector = PchSelector::new(templates, target.rules, &target.config.pch);

        // Archives do not link their dependencies, so they close no cycles.
        let mut dependencies = Vec::with_capacity(target.binaries.len());
        for binary in &target.binaries {
            dependencies.push(match binary.binary_type {
                BinaryType::StaticLibrary => IndexSet::new(),
                _ => composer.link_environment(binary)?.binary_dependencies,
            });
        }

        Ok(Planner {
            target,
            composer,
            base,
            selector,
            actions: ActionGraph::new(),
            objects: vec![IndexSet::new(); target.binaries.len()],
            object_paths: HashSet::new(),
            cyclic_edges: cyclic_edges(&dependencies),
            copies: HashSet::new(),
            warnings: Vec::new(),
            invalid_includes: Vec::new(),
        })
    }

    fn compile_binary(&mut self, binary: &Binary) -> Result<(), GraphError> {
        for &id in &binary.modules {
            self.compile_module(binary, id)?;
        }
        Ok(())
    }

    /// A private PCH from the header every C++ source of `module` includes
    /// first, for modules with enough C++ sources and no other PCH.
    fn first_include_pch(
        &mut self,
        module: &Module,
        sources: &[PathBuf],
        env: &CppCompileEnvironment,
    ) -> Option<PchSelection> {
        let target = self.target;
        let cpp_sources: Vec<PathBuf> = sources
            .iter()
            .filter(|s| Language::of(s) == Language::Cxx)
            .cloned()
            .collect();
        if !self.selector.wants_first_include_pch(module, cpp_sources.len()) {
            return None;
        }
        let header = unique_first_include(target.fs, &cpp_sources, env)?;
        debug!("`{}` precompiles its first include {}", module.name, header.display());
        Some(self.selector.private_pch(module, &header, env, target.toolchain()))
    }

    fn compile_module(&mut self, binary: &Binary, id: ModuleId) -> Result<(), GraphError> {
        let target = self.target;
        let toolchain = target.toolchain();
        let module = target.graph.get(id);
        let Some(cpp) = module.cpp() else {
            return Ok(());
        };

        if module.uses_precompiled() || binary.use_precompiled {
            let manifest = self.read_precompiled_manifest(module)?;
            debug!(
                "`{}` is precompiled, linking {} objects",
                module.name,
                manifest.object_files.len()
            );
            self.objects[binary.id.index()].extend(manifest.object_files);
            return Ok(());
        }

        let mut module_objects = Vec::new();
        if !cpp.source_files.is_empty() {
            self.check_include_paths(module);

            let env = self.composer.module_compile_environment(id, &self.base);
            let settings = UnitySettings::new(target.rules, &target.config.unity, &module.rules);
            let groups = batch(
                target.fs,
                &cpp.source_files,
                &module.name,
                &cpp.intermediate_dir,
                &settings,
            )?;

            let has_cpp = groups
                .iter()
                .any(|g| Language::of(g.compiled_file()) == Language::Cxx);
            let selection = if has_cpp {
                self.selector
                    .select_pch(module, &target.graph, &env, toolchain)
                    .or_else(|| self.first_include_pch(module, &cpp.source_files, &env))
            } else {
                None
            };

            let using = match selection {
                Some(selection) => {
                    if selection.created {
                        self.create_pch_action(selection.handle);
                    }
                    if let Some(object) = self
                        .selector
                        .instance(selection.handle)
                        .and_then(|i| i.object_file.clone())
                    {
                        self.objects[binary.id.index()].insert(object);
                    }
                    let (using, definitions) =
                        self.selector.using_environment(&selection, module, &env);
                    if let Some((path, contents)) = definitions {
                        self.actions.add_intermediate_file(path, contents);
                    }
                    using
                }
                None => env.clone(),
            };

            for group in &groups {
                let compile_env: Cow<'_, CppCompileEnvironment> = match group {
                    CompileGroup::Unity {
                        unity_file,
                        contents,
                        ..
                    } => {
                        self.actions
                            .add_intermediate_file(unity_file.clone(), contents.clone());
                        Cow::Borrowed(&using)
                    }
                    CompileGroup::Individual { file } if Language::of(file) == Language::C => {
                        Cow::Borrowed(&env)
                    }
                    CompileGroup::Individual { .. } => Cow::Borrowed(&using),
                    CompileGroup::Adaptive { dedicated_pch, .. } => {
                        let adaptive = self.adaptive_environment(
                            module,
                            &env,
                            &using,
                            dedicated_pch.as_ref(),
                            &mut module_objects,
                        );
                        Cow::Owned(adaptive)
                    }
                };
                let object = self.compile(group.compiled_file(), &cpp.intermediate_dir, &compile_env);
                module_objects.push(object);
            }
        } else {
            trace!("`{}` has no sources", module.name);
        }

        if module.rules.precompile {
            self.write_precompiled_manifest(module, &module_objects)?;
        }
        self.objects[binary.id.index()].extend(module_objects);
        Ok(())
    }

    /// Add a compile action for `source` and return its object file.
    fn compile(
        &mut self,
        source: &Path,
        intermediate_dir: &Path,
        env: &CppCompileEnvironment,
    ) -> PathBuf {
        let toolchain = self.target.toolchain();
        let name = file_name(source);
        let object = claim_unique_path(
            &mut self.object_paths,
            intermediate_dir,
            &name,
            toolchain.object_extension(),
        );
        let command = toolchain.compile_command(&CompileInput {
            source,
            output: &object,
            language: Language::of(source),
            environment: env,
        });

        let mut prerequisites = vec![source.to_path_buf()];
        if let PchAction::Include { pch_file, .. } = &env.pch {
            prerequisites.push(pch_file.clone());
        }
        prerequisites.extend(env.force_include_files.iter().cloned());

        self.actions.add(
            ActionKind::Compile,
            command,
            prerequisites,
            vec![object.clone()],
            name,
        );
        object
    }

    fn create_pch_action(&mut self, handle: PchHandle) {
        let Some(instance) = self.selector.instance(handle).cloned() else {
            return;
        };
        let toolchain = self.target.toolchain();

        self.actions.add_intermediate_file(
            instance.header_file.clone(),
            instance.wrapper_contents.clone(),
        );
        let command = toolchain.compile_command(&CompileInput {
            source: &instance.header_file,
            output: &instance.pch_file,
            language: Language::Cxx,
            environment: &instance.environment,
        });
        let mut produced = vec![instance.pch_file.clone()];
        produced.extend(instance.object_file.clone());

        self.actions.add(
            ActionKind::CreatePch,
            command,
            vec![instance.header_file.clone()],
            produced,
            file_name(&instance.header_file),
        );
    }

    /// Environment of a working-set file compiled outside unity.
    ///
    /// The module PCH is dropped when the target disables it for adaptive
    /// files and the module would otherwise pick one up implicitly. A
    /// dedicated PCH replaces whichever PCH remains.
    fn adaptive_environment(
        &mut self,
        module: &Module,
        env: &CppCompileEnvironment,
        using: &CppCompileEnvironment,
        dedicated_pch: Option<&DedicatedPch>,
        objects: &mut Vec<PathBuf>,
    ) -> CppCompileEnvironment {
        let rules = self.target.rules;
        let toolchain = self.target.toolchain();

        let drop_pch = rules.adaptive_unity_disables_pch
            && PchMode::from(module.pch_usage) == PchMode::ExplicitOrShared;
        let mut adaptive = if drop_pch { env.clone() } else { using.clone() };
        if rules.adaptive_unity_disables_optimizations {
            adaptive.flags.optimize = false;
        }

        let Some(dedicated) = dedicated_pch else {
            return adaptive;
        };

        self.actions
            .add_intermediate_file(dedicated.header.clone(), dedicated.contents.clone());
        let pch_file = append_extension(&dedicated.header, toolchain.pch_extension());

        let mut create = env.clone();
        create.flags = adaptive.flags;
        create.pch = PchAction::Create {
            header: dedicated.header.clone(),
            pch_file: pch_file.clone(),
        };
        let command = toolchain.compile_command(&CompileInput {
            source: &dedicated.header,
            output: &pch_file,
            language: Language::Cxx,
            environment: &create,
        });
        let mut produced = vec![pch_file.clone()];
        if toolchain.pch_produces_object() {
            let object =
                pch_file.with_extension(toolchain.object_extension().trim_start_matches('.'));
            objects.push(object.clone());
            produced.push(object);
        }
        self.actions.add(
            ActionKind::CreatePch,
            command,
            vec![dedicated.header.clone()],
            produced,
            file_name(&dedicated.header),
        );

        let mut with_dedicated = env.clone();
        with_dedicated.flags = adaptive.flags;
        with_dedicated.pch = PchAction::Include {
            header: dedicated.header.clone(),
            pch_file,
        };
        with_dedicated
    }

    fn check_include_paths(&mut self, module: &Module) {
        let fs = self.target.fs;
        let missing: Vec<String> = module
            .public_include_paths
            .iter()
            .chain(&module.private_include_paths)
            .chain(&module.public_system_include_paths)
            .filter(|path| !fs.is_dir(path))
            .map(|path| format!("include path `{}` does not exist", path.display()))
            .collect();
        if missing.is_empty() {
            return;
        }

        for message in &missing {
            self.warnings.push(
                Diagnostic::warning(format!("module `{}`: {}", module.name, message))
                    .with_location(module.rules.directory.clone()),
            );
        }
        self.invalid_includes.push((module.id, missing));
    }

    fn read_precompiled_manifest(&self, module: &Module) -> Result<PrecompiledManifest, GraphError> {
        let path = PrecompiledManifest::path_for(module).unwrap_or_default();
        let text = match self.target.fs.read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GraphError::MissingPrecompiledManifest {
                    module: module.name.clone(),
                    path,
                });
            }
            Err(e) => {
                return Err(GraphError::FileSystem {
                    path,
                    message: e.to_string(),
                });
            }
        };

        serde_json::from_str(&text).map_err(|e| GraphError::InvalidPrecompiledManifest {
            module: module.name.clone(),
            path,
            message: e.to_string(),
        })
    }

    fn write_precompiled_manifest(
        &mut self,
        module: &Module,
        objects: &[PathBuf],
    ) -> Result<(), GraphError> {
        let Some(path) = PrecompiledManifest::path_for(module) else {
            return Ok(());
        };
        let manifest = PrecompiledManifest {
            module: module.name.clone(),
            object_files: objects.to_vec(),
        };
        let contents = serde_json::to_string_pretty(&manifest).map_err(|e| {
            GraphError::InvalidPrecompiledManifest {
                module: module.name.clone(),
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        self.actions.add_intermediate_file(path, contents);
        Ok(())
    }

    fn link_binary(&mut self, binary: &Binary) -> Result<(), GraphError> {
        let target = self.target;
        let toolchain = target.toolchain();
        let link = self.composer.link_environment(binary)?;
        let objects: Vec<PathBuf> = self.objects[binary.id.index()].iter().cloned().collect();
        let output = binary.output_path().to_path_buf();

        if binary.binary_type == BinaryType::StaticLibrary {
            let command = toolchain.archive_command(&ArchiveInput {
                objects: objects.clone(),
                output: output.clone(),
            });
            self.actions.add(
                ActionKind::Archive,
                command,
                objects,
                vec![output.clone()],
                file_name(&output),
            );
            return self.copy_runtime_dependencies(binary);
        }

        // Without import libraries, a dependency that links back to this
        // binary is left out of a first partial link and picked up by a relink.
        let relink = toolchain.import_lib_extension().is_none();
        let mut prerequisites = objects.clone();
        let mut dependency_libs = Vec::new();
        let mut deferred = Vec::new();
        for &dep in &link.binary_dependencies {
            let other = target.binary(dep);
            if relink && self.cyclic_edges.contains(&(binary.id, dep)) {
                deferred.push(partial_link_path(other));
                continue;
            }
            let library = match (&other.import_library, other.binary_type) {
                (Some(import), BinaryType::DynamicLibrary) => import.clone(),
                _ => other.output_path().to_path_buf(),
            };
            dependency_libs.push(library.to_string_lossy().into_owned());
            prerequisites.push(library);
        }

        let import_library = match binary.binary_type {
            BinaryType::DynamicLibrary => binary.import_library.clone(),
            _ => None,
        };
        let mode = match binary.binary_type {
            BinaryType::DynamicLibrary => LinkMode::SharedLib,
            _ => LinkMode::Executable,
        };
        let mut input = LinkInput {
            objects: objects.clone(),
            output: output.clone(),
            lib_dirs: link.library_paths.into_iter().collect(),
            libs: dependency_libs
                .iter()
                .cloned()
                .chain(link.libraries.iter().cloned())
                .collect(),
            frameworks: link.frameworks.into_iter().collect(),
            import_library: import_library.clone(),
            allow_undefined: !deferred.is_empty(),
        };

        if !deferred.is_empty() {
            let partial = partial_link_path(binary);
            debug!(
                "`{}` links in two steps around {} circular dependencies",
                binary.name,
                deferred.len()
            );
            let first = LinkInput {
                output: partial.clone(),
                ..input.clone()
            };
            self.actions.add(
                ActionKind::Link,
                toolchain.link_command(&first, mode),
                prerequisites.clone(),
                vec![partial.clone()],
                format!("{} (partial)", file_name(&output)),
            );

            input.libs = dependency_libs
                .into_iter()
                .chain(deferred.iter().map(|p| p.to_string_lossy().into_owned()))
                .chain(link.libraries)
                .collect();
            prerequisites.push(partial);
            prerequisites.extend(deferred);
        }

        let mut produced = vec![output.clone()];
        if let Some(import) = import_library {
            let separate = if binary.create_import_library_separately {
                toolchain.import_library_command(&input)
            } else {
                None
            };
            match separate {
                Some(command) => {
                    let status = file_name(&import);
                    self.actions.add(
                        ActionKind::ImportLibrary,
                        command,
                        objects,
                        vec![import],
                        status,
                    );
                }
                None => produced.push(import),
            }
        }

        let command = toolchain.link_command(&input, mode);
        self.actions.add(
            ActionKind::Link,
            command,
            prerequisites,
            produced,
            file_name(&output),
        );

        self.copy_runtime_dependencies(binary)
    }

    fn copy_runtime_dependencies(&mut self, binary: &Binary) -> Result<(), GraphError> {
        let graph = &self.target.graph;
        for &id in binary.modules.iter().chain(&binary.external_modules) {
            let module = graph.get(id);
            if module.rules.runtime_dependencies.is_empty() {
                continue;
            }

            let vars = self.composer.path_variables(id, Some(binary));
            for dependency in &module.rules.runtime_dependencies {
                let destination = vars.expand(&dependency.path, &module.name)?;
                let Some(source) = &dependency.source else {
                    continue;
                };
                let source = vars.expand(source, &module.name)?;
                if source == destination || !self.copies.insert(destination.clone()) {
                    continue;
                }

                let command = CommandSpec::new("cmake").args([
                    "-E".to_string(),
                    "copy_if_different".to_string(),
                    source.display().to_string(),
                    destination.display().to_string(),
                ]);
                let status = file_name(&destination);
                self.actions.add(
                    ActionKind::Copy,
                    command,
                    vec![source],
                    vec![destination],
                    status,
                );
            }
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Output of the first link of a binary that is linked twice.
fn partial_link_path(binary: &Binary) -> PathBuf {
    binary.intermediate_dir.join(file_name(binary.output_path()))
}

/// Binary dependency edges `(from, to)` where `to` also reaches `from`.
fn cyclic_edges(dependencies: &[IndexSet<BinaryId>]) -> HashSet<(BinaryId, BinaryId)> {
    let mut edges = HashSet::new();
    for (index, deps) in dependencies.iter().enumerate() {
        let from = BinaryId(index as u32);
        for &to in deps {
            if reaches(dependencies, to, from) {
                edges.insert((from, to));
            }
        }
    }
    edges
}

fn reaches(dependencies: &[IndexSet<BinaryId>], start: BinaryId, goal: BinaryId) -> bool {
    let mut stack = vec![start];
    let mut seen = HashSet::new();
    while let Some(next) = stack.pop() {
        if next == goal {
            return true;
        }
        if seen.insert(next) {
            stack.extend(dependencies[next.index()].iter().copied());
        }
    }
    false
}
