//! The module graph: an arena of modules indexed by interned name.
//!
//! Resolution creates a module, registers it, and only then walks its
//! dependency lists. A re-entrant request for a module that is still being
//! resolved gets the registered, partially built module back instead of
//! recursing, which is what keeps resolution finite on cyclic rule sets.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::core::rules::{ModuleRule, PchUsage, RuleSource};
use crate::core::target::TargetRules;
use crate::resolver::errors::GraphError;
use crate::resolver::module::{CppModuleData, DependencyState, Module, ModuleId, ModuleVariant};
use crate::util::config::{CyclePolicy, CycleWhitelist};
use crate::util::diagnostic::{Diagnostic, DiagnosticSink};
use crate::util::fs::{glob_files, trim_trailing_separators, FileSystem};
use crate::util::interning::{NameTable, Symbol};

/// Registry state for a module name.
///
/// Names that were never requested have no entry at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryEntry {
    /// Created and registered, dependency lists still being walked
    InProgress(ModuleId),
    /// Dependency lists complete
    Resolved(ModuleId),
}

impl RegistryEntry {
    pub fn id(self) -> ModuleId {
        match self {
            RegistryEntry::InProgress(id) | RegistryEntry::Resolved(id) => id,
        }
    }
}

/// All modules of one target.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    names: NameTable,
    registry: HashMap<Symbol, RegistryEntry>,
    modules: Vec<Module>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn name(&self, id: ModuleId) -> &str {
        &self.modules[id.index()].name
    }

    /// Look up a module by name, case-insensitively.
    pub fn find(&self, name: &str) -> Option<ModuleId> {
        let symbol = self.names.get(name)?;
        self.registry.get(&symbol).map(|entry| entry.id())
    }

    pub fn entry(&self, name: &str) -> Option<RegistryEntry> {
        let symbol = self.names.get(name)?;
        self.registry.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    fn insert(&mut self, mut module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        module.id = id;
        self.registry.insert(module.symbol, RegistryEntry::InProgress(id));
        self.modules.push(module);
        id
    }

    fn mark_resolved(&mut self, id: ModuleId) {
        let symbol = self.modules[id.index()].symbol;
        self.modules[id.index()].state = DependencyState::Resolved;
        self.registry.insert(symbol, RegistryEntry::Resolved(id));
    }

    /// Every module `id` depends on, dependencies before dependents.
    ///
    /// With `only_direct` the walk stops after one level. `id` itself is never
    /// part of the result.
    pub fn dependency_closure(
        &self,
        id: ModuleId,
        include_dynamic: bool,
        only_direct: bool,
    ) -> Vec<ModuleId> {
        let mut visited = HashSet::from([id]);
        let mut out = Vec::new();
        self.collect_dependencies(id, include_dynamic, only_direct, &mut visited, &mut out);
        out
    }

    fn collect_dependencies(
        &self,
        id: ModuleId,
        include_dynamic: bool,
        only_direct: bool,
        visited: &mut HashSet<ModuleId>,
        out: &mut Vec<ModuleId>,
    ) {
        let module = self.get(id);
        let dynamic = if include_dynamic {
            module.dynamically_loaded.as_slice()
        } else {
            &[]
        };

        for dep in module.direct_dependencies().chain(dynamic.iter().copied()) {
            if visited.insert(dep) {
                if !only_direct {
                    self.collect_dependencies(dep, include_dynamic, false, visited, out);
                }
                out.push(dep);
            }
        }
    }
}

/// Cycle handling for one build.
#[derive(Debug, Clone, Default)]
pub struct CycleCheck {
    pub policy: CyclePolicy,
    pub whitelist: CycleWhitelist,
}

/// Resolves module names into a [`ModuleGraph`].
///
/// Borrowed from the build context for the duration of one resolution step.
pub struct ModuleResolver<'a> {
    graph: &'a mut ModuleGraph,
    diagnostics: &'a mut DiagnosticSink,
    rules: &'a dyn RuleSource,
    fs: &'a dyn FileSystem,
    target: &'a TargetRules,
    cycles: &'a CycleCheck,
    /// Modules currently being resolved, and whether each was entered
    /// through a dynamically-loaded edge
    stack: Vec<(ModuleId, bool)>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(
        graph: &'a mut ModuleGraph,
        diagnostics: &'a mut DiagnosticSink,
        rules: &'a dyn RuleSource,
        fs: &'a dyn FileSystem,
        target: &'a TargetRules,
        cycles: &'a CycleCheck,
    ) -> Self {
        ModuleResolver {
            graph,
            diagnostics,
            rules,
            fs,
            target,
            cycles,
            stack: Vec::new(),
        }
    }

    pub fn graph(&self) -> &ModuleGraph {
        &*self.graph
    }

    /// Resolve `name` and everything it depends on.
    pub fn resolve(&mut self, name: &str, chain: &str) -> Result<ModuleId, GraphError> {
        let id = self.find_or_create(name, chain)?;
        let chain = self.graph.get(id).reference_chain.clone();
        self.recursively_create(id, &chain)?;
        Ok(id)
    }

    /// Like [`resolve`](Self::resolve), but a missing rule yields `None`.
    pub fn resolve_optional(
        &mut self,
        name: &str,
        chain: &str,
    ) -> Result<Option<ModuleId>, GraphError> {
        if self.graph.find(name).is_none() && self.rules.module_rule(name).is_none() {
            debug!("optional module `{}` has no rule, skipping", name);
            return Ok(None);
        }
        self.resolve(name, chain).map(Some)
    }

    /// Resolve a module that must be compiled from source.
    pub fn find_or_create_cpp_module(
        &mut self,
        name: &str,
        chain: &str,
    ) -> Result<ModuleId, GraphError> {
        let id = self.find_or_create(name, chain)?;
        if !self.graph.get(id).is_cpp() {
            return Err(GraphError::NotACppModule {
                module: self.graph.name(id).to_string(),
                chain: chain.to_string(),
            });
        }
        Ok(id)
    }

    /// Return the registered module for `name`, creating it from its rule on
    /// first request. Dependencies are not walked.
    pub fn find_or_create(&mut self, name: &str, chain: &str) -> Result<ModuleId, GraphError> {
        if let Some(id) = self.graph.find(name) {
            return Ok(id);
        }

        let rule = self
            .rules
            .module_rule(name)
            .ok_or_else(|| GraphError::UnresolvedModule {
                name: name.to_string(),
                chain: chain.to_string(),
            })?
            .clone();

        let module = self.create_module(rule, chain)?;
        debug!("created module `{}` ({})", module.name, chain);

        let partners = module.rules.circularly_referenced.clone();
        let module_name = module.name.clone();
        let id = self.graph.insert(module);

        for partner in &partners {
            if !self.cycles.whitelist.allows(&module_name, partner) {
                self.report_cycle(&module_name, partner, chain)?;
            }
        }

        Ok(id)
    }

    fn create_module(&mut self, rule: ModuleRule, chain: &str) -> Result<Module, GraphError> {
        let overlap = rule.dynamic_dependency_overlap();
        if !overlap.is_empty() {
            return Err(GraphError::InvalidModuleRules {
                module: rule.name.clone(),
                message: format!(
                    "dynamically loaded modules may not also be dependencies: {}",
                    overlap.join(", ")
                ),
            });
        }

        let symbol = self.graph.names.intern(&rule.name);
        let name = self.graph.names.resolve(symbol).to_string();
        let is_engine_module = rule.is_engine_module(self.target);

        let pch_usage = match rule.pch_usage {
            PchUsage::Default if is_engine_module || rule.plugin.is_some() => {
                PchUsage::UseExplicitOrSharedPCHs
            }
            PchUsage::Default => PchUsage::NoSharedPCHs,
            explicit => explicit,
        };
        if is_engine_module
            && pch_usage == PchUsage::NoSharedPCHs
            && rule.private_pch_header.is_none()
            && !rule.is_external()
        {
            self.diagnostics.push(
                Diagnostic::warning(format!(
                    "engine module `{}` disables shared PCHs without declaring a private PCH",
                    name
                ))
                .with_location(rule.directory.clone()),
            );
        }

        let mut public_include_paths = self.module_paths(&rule, &rule.public_include_paths);
        let public_system_include_paths =
            self.module_paths(&rule, &rule.public_system_include_paths);
        let mut private_include_paths = self.module_paths(&rule, &rule.private_include_paths);

        let variant = if rule.is_external() {
            ModuleVariant::External
        } else {
            if rule.add_default_include_paths {
                self.add_default_include_paths(
                    &rule,
                    &mut public_include_paths,
                    &mut private_include_paths,
                );
            }
            ModuleVariant::Cpp(CppModuleData {
                intermediate_dir: self
                    .target
                    .intermediate_dir(self.target.root_dir())
                    .join(&name),
                source_files: self.find_source_files(&rule)?,
            })
        };

        Ok(Module {
            id: ModuleId(0),
            symbol,
            name,
            variant,
            reference_chain: chain.to_string(),
            is_engine_module,
            pch_usage,
            public_include_paths,
            public_system_include_paths,
            private_include_paths,
            public_include_path_modules: None,
            private_include_path_modules: Vec::new(),
            public_dependencies: Vec::new(),
            private_dependencies: Vec::new(),
            dynamically_loaded: Vec::new(),
            state: DependencyState::Unresolved,
            binary: None,
            invalid_includes: Vec::new(),
            rules: rule,
        })
    }

    fn module_paths(&self, rule: &ModuleRule, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = rule.resolve_path(&trim_trailing_separators(path));
            if !out.contains(&resolved) {
                out.push(resolved);
            }
        }
        out
    }

    fn add_default_include_paths(
        &self,
        rule: &ModuleRule,
        public: &mut Vec<PathBuf>,
        private: &mut Vec<PathBuf>,
    ) {
        let push_unique = |list: &mut Vec<PathBuf>, path: PathBuf| {
            if self.fs.is_dir(&path) && !list.contains(&path) {
                list.push(path);
            }
        };

        if let Some(parent) = rule.directory.parent() {
            push_unique(public, parent.to_path_buf());
        }
        push_unique(public, rule.directory.join("Classes"));
        push_unique(public, rule.directory.join("Public"));
        push_unique(private, rule.directory.join("Private"));
    }

    fn find_source_files(&self, rule: &ModuleRule) -> Result<Vec<PathBuf>, GraphError> {
        if rule.use_precompiled {
            return Ok(Vec::new());
        }

        let fs_error = |path: &Path, e: &dyn std::fmt::Display| GraphError::FileSystem {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut files = Vec::new();
        if rule.sources.is_empty() {
            if self.fs.is_dir(&rule.directory) {
                files = self
                    .fs
                    .enumerate_files(&rule.directory)
                    .map_err(|e| fs_error(&rule.directory, &e))?
                    .into_iter()
                    .filter(|p| is_translation_unit(p))
                    .collect();
            }
        } else {
            for entry in &rule.sources {
                if entry.contains(['*', '?', '[']) {
                    let matched = glob_files(self.fs, &rule.directory, std::slice::from_ref(entry))
                        .map_err(|e| fs_error(&rule.directory, &e))?;
                    files.extend(matched);
                } else {
                    let path = rule.resolve_path(Path::new(entry));
                    if !self.fs.exists(&path) {
                        return Err(GraphError::MissingSourceFile {
                            module: rule.name.clone(),
                            path,
                        });
                    }
                    files.push(path);
                }
            }
        }

        files.sort();
        files.dedup();
        trace!("module `{}` has {} source files", rule.name, files.len());
        Ok(files)
    }

    /// Walk the dependency lists of `id`, creating every module they name.
    ///
    /// Include-path-only modules come first and are followed shallowly; then
    /// public, private and dynamically loaded dependencies, each resolved fully.
    pub fn recursively_create(&mut self, id: ModuleId, chain: &str) -> Result<(), GraphError> {
        self.create_recursive(id, chain, false)
    }

    fn create_recursive(
        &mut self,
        id: ModuleId,
        chain: &str,
        via_dynamic: bool,
    ) -> Result<(), GraphError> {
        self.ensure_public_include_path_modules(id, chain)?;

        if self.graph.get(id).state != DependencyState::Unresolved {
            return Ok(());
        }
        self.graph.get_mut(id).state = DependencyState::BeingResolved;
        self.stack.push((id, via_dynamic));

        let rule = &self.graph.get(id).rules;
        let private_include = rule.private_include_path_modules.clone();
        let public = rule.public_dependencies.clone();
        let private = rule.private_dependencies.clone();
        let dynamic = rule.dynamically_loaded.clone();

        let private_include_path_modules = self.create_include_path_modules(&private_include, chain)?;
        let public_dependencies = self.create_dependencies(id, &public, chain, false)?;
        let private_dependencies = self.create_dependencies(id, &private, chain, false)?;
        let dynamically_loaded = self.create_dependencies(id, &dynamic, chain, true)?;

        let module = self.graph.get_mut(id);
        module.private_include_path_modules = private_include_path_modules;
        module.public_dependencies = public_dependencies;
        module.private_dependencies = private_dependencies;
        module.dynamically_loaded = dynamically_loaded;
        self.graph.mark_resolved(id);
        self.stack.pop();

        Ok(())
    }

    fn create_dependencies(
        &mut self,
        from: ModuleId,
        names: &[String],
        chain: &str,
        dynamic: bool,
    ) -> Result<Vec<ModuleId>, GraphError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let dep_chain = format!("{} -> {}", chain, name);
            let dep = self.find_or_create(name, &dep_chain)?;

            if !dynamic && dep != from && self.closes_static_cycle(dep) {
                let from_name = self.graph.name(from).to_string();
                let dep_name = self.graph.name(dep).to_string();
                if !self.cycles.whitelist.allows(&from_name, &dep_name) {
                    self.report_cycle(&from_name, &dep_name, &dep_chain)?;
                } else {
                    trace!("allowed cycle `{}` <-> `{}`", from_name, dep_name);
                }
            }

            let dep_chain = self.graph.get(dep).reference_chain.clone();
            self.create_recursive(dep, &dep_chain, dynamic)?;

            if dep != from && !out.contains(&dep) {
                out.push(dep);
            }
        }
        Ok(out)
    }

    /// Whether an edge to `dep` closes a cycle made only of public and
    /// private edges.
    fn closes_static_cycle(&self, dep: ModuleId) -> bool {
        match self.stack.iter().rposition(|&(id, _)| id == dep) {
            Some(pos) => self.stack[pos + 1..].iter().all(|&(_, dynamic)| !dynamic),
            None => false,
        }
    }

    fn ensure_public_include_path_modules(
        &mut self,
        id: ModuleId,
        chain: &str,
    ) -> Result<(), GraphError> {
        if self.graph.get(id).public_include_path_modules.is_some() {
            return Ok(());
        }
        self.graph.get_mut(id).public_include_path_modules = Some(Vec::new());

        let names = self.graph.get(id).rules.public_include_path_modules.clone();
        let ids = self.create_include_path_modules(&names, chain)?;
        self.graph.get_mut(id).public_include_path_modules = Some(ids);
        Ok(())
    }

    fn create_include_path_modules(
        &mut self,
        names: &[String],
        chain: &str,
    ) -> Result<Vec<ModuleId>, GraphError> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let dep_chain = format!("{} -> {}", chain, name);
            let dep = self.find_or_create(name, &dep_chain)?;
            self.ensure_public_include_path_modules(dep, &dep_chain)?;
            if !out.contains(&dep) {
                out.push(dep);
            }
        }
        Ok(out)
    }

    fn report_cycle(&mut self, module: &str, other: &str, chain: &str) -> Result<(), GraphError> {
        let err = GraphError::CircularDependencyViolation {
            module: module.to_string(),
            other: other.to_string(),
            chain: chain.to_string(),
        };
        match self.cycles.policy {
            CyclePolicy::Error => Err(err),
            CyclePolicy::Warn => {
                let mut diag = err.to_diagnostic();
                diag.severity = crate::util::diagnostic::Severity::Warning;
                self.diagnostics.push(diag);
                Ok(())
            }
        }
    }
}

fn is_translation_unit(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cpp" | "cc" | "cxx" | "c")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::RuleSet;
    use crate::test_support::fixtures::{engine_target, module, RuleBuilder};
    use crate::test_support::MockFileSystem;

    struct Harness {
        rules: RuleSet,
        fs: MockFileSystem,
        cycles: CycleCheck,
        graph: ModuleGraph,
        diagnostics: DiagnosticSink,
    }

    impl Harness {
        fn new(modules: Vec<ModuleRule>) -> Self {
            let mut rules = RuleSet::new(engine_target());
            for m in modules {
                rules.add_module(m);
            }
            Harness {
                rules,
                fs: MockFileSystem::new(),
                cycles: CycleCheck::default(),
                graph: ModuleGraph::new(),
                diagnostics: DiagnosticSink::new(),
            }
        }

        fn resolver(&mut self) -> ModuleResolver<'_> {
            ModuleResolver::new(
                &mut self.graph,
                &mut self.diagnostics,
                &self.rules,
                &self.fs,
                &self.rules.target,
                &self.cycles,
            )
        }
    }

    #[test]
    fn test_resolve_creates_each_module_once() {
        let mut h = Harness::new(vec![
            module("Core"),
            module("CoreUObject").public_deps(&["Core"]),
            module("Engine").public_deps(&["Core", "CoreUObject"]),
        ]);

        let engine = h.resolver().resolve("Engine", "Game").unwrap();

        assert_eq!(h.graph.len(), 3);
        let deps: Vec<&str> = h
            .graph
            .get(engine)
            .public_dependencies
            .iter()
            .map(|&d| h.graph.name(d))
            .collect();
        assert_eq!(deps, vec!["Core", "CoreUObject"]);
        assert_eq!(h.graph.entry("engine"), Some(RegistryEntry::Resolved(engine)));
    }

    #[test]
    fn test_unresolved_module_carries_chain() {
        let mut h = Harness::new(vec![module("Engine").private_deps(&["Renderer"])]);

        let err = h.resolver().resolve("Engine", "Game -> Engine").unwrap_err();
        match err {
            GraphError::UnresolvedModule { name, chain } => {
                assert_eq!(name, "Renderer");
                assert_eq!(chain, "Game -> Engine -> Renderer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_missing_module_is_absent() {
        let mut h = Harness::new(vec![]);
        assert_eq!(h.resolver().resolve_optional("Nope", "Game").unwrap(), None);
        assert!(h.graph.is_empty());
    }

    #[test]
    fn test_cycle_terminates_and_warns() {
        let mut h = Harness::new(vec![
            module("Engine").public_deps(&["UMG"]),
            module("UMG").private_deps(&["Engine"]),
        ]);

        let engine = h.resolver().resolve("Engine", "Engine").unwrap();
        let umg = h.graph.find("UMG").unwrap();

        assert_eq!(h.graph.get(engine).state, DependencyState::Resolved);
        assert_eq!(h.graph.get(umg).private_dependencies, vec![engine]);
        assert_eq!(h.diagnostics.entries().len(), 1);
        assert!(h.diagnostics.entries()[0].message.contains("circular dependency"));
    }

    #[test]
    fn test_whitelisted_cycle_is_silent() {
        let mut h = Harness::new(vec![
            module("Engine")
                .public_deps(&["UMG"])
                .circular(&["UMG"]),
            module("UMG").private_deps(&["Engine"]).circular(&["Engine"]),
        ]);
        h.cycles.whitelist = CycleWhitelist::new([("Engine", "UMG")]);
        h.cycles.policy = CyclePolicy::Error;

        h.resolver().resolve("Engine", "Engine").unwrap();
        assert!(h.diagnostics.is_empty());
    }

    #[test]
    fn test_cycle_policy_error_is_fatal() {
        let mut h = Harness::new(vec![
            module("A").public_deps(&["B"]),
            module("B").public_deps(&["A"]),
        ]);
        h.cycles.policy = CyclePolicy::Error;

        let err = h.resolver().resolve("A", "A").unwrap_err();
        assert!(matches!(err, GraphError::CircularDependencyViolation { .. }));
    }

    #[test]
    fn test_declared_partner_outside_whitelist_warns() {
        let mut h = Harness::new(vec![module("Engine").circular(&["Landscape"])]);

        h.resolver().find_or_create("Engine", "Engine").unwrap();
        assert_eq!(h.diagnostics.entries().len(), 1);
    }

    #[test]
    fn test_dynamic_edges_are_not_cycles() {
        let mut h = Harness::new(vec![
            module("Engine").dynamic(&["Renderer"]),
            module("Renderer").public_deps(&["Engine"]),
        ]);
        h.cycles.policy = CyclePolicy::Error;

        h.resolver().resolve("Engine", "Engine").unwrap();
        assert!(h.diagnostics.is_empty());
    }

    #[test]
    fn test_include_path_modules_are_shallow() {
        let mut h = Harness::new(vec![
            module("Game").private_include_modules(&["Renderer"]),
            module("Renderer")
                .public_include_modules(&["RHI"])
                .private_deps(&["Engine"]),
            module("RHI"),
            module("Engine"),
        ]);

        let game = h.resolver().resolve("Game", "Game").unwrap();
        let renderer = h.graph.find("Renderer").unwrap();

        assert_eq!(h.graph.get(game).private_include_path_modules, vec![renderer]);
        assert!(h.graph.find("RHI").is_some());
        // Renderer's own dependencies were never walked.
        assert!(h.graph.find("Engine").is_none());
        assert_eq!(h.graph.get(renderer).state, DependencyState::Unresolved);
    }

    #[test]
    fn test_dynamic_overlap_is_invalid() {
        let mut h = Harness::new(vec![
            module("Engine").public_deps(&["Core"]).dynamic(&["Core"]),
            module("Core"),
        ]);

        let err = h.resolver().resolve("Engine", "Engine").unwrap_err();
        assert!(matches!(err, GraphError::InvalidModuleRules { .. }));
    }

    #[test]
    fn test_external_module_is_not_cpp() {
        let mut h = Harness::new(vec![ModuleRule::external(
            "zlib",
            "/ws/Engine/Source/ThirdParty/zlib",
        )]);

        let err = h.resolver().find_or_create_cpp_module("zlib", "Game").unwrap_err();
        assert!(matches!(err, GraphError::NotACppModule { .. }));
    }

    #[test]
    fn test_pch_usage_default_resolution() {
        let mut game = module("Shooter");
        game.directory = PathBuf::from("/ws/Shooter/Source/Shooter");
        let mut h = Harness::new(vec![module("Core"), game]);

        let core = h.resolver().resolve("Core", "Core").unwrap();
        let shooter = h.resolver().resolve("Shooter", "Shooter").unwrap();

        assert_eq!(h.graph.get(core).pch_usage, PchUsage::UseExplicitOrSharedPCHs);
        assert_eq!(h.graph.get(shooter).pch_usage, PchUsage::NoSharedPCHs);
    }

    #[test]
    fn test_default_include_paths_and_sources() {
        let mut h = Harness::new(vec![module("Core")]);
        let dir = PathBuf::from("/ws/Engine/Source/Runtime/Core");
        h.fs.add_file(dir.join("Public/Core.h"), "#pragma once");
        h.fs.add_file(dir.join("Private/Core.cpp"), "int a;");
        h.fs.add_file(dir.join("Private/Misc.c"), "int b;");
        h.fs.add_file(dir.join("Private/Notes.txt"), "");

        let core = h.resolver().resolve("Core", "Core").unwrap();
        let m = h.graph.get(core);

        assert!(m.public_include_paths.contains(&dir.join("Public")));
        assert_eq!(m.private_include_paths, vec![dir.join("Private")]);
        assert_eq!(m.cpp().unwrap().source_files.len(), 2);
    }

    #[test]
    fn test_missing_listed_source_fails() {
        let mut core = module("Core");
        core.sources = vec!["Private/Gone.cpp".to_string()];
        let mut h = Harness::new(vec![core]);

        let err = h.resolver().resolve("Core", "Core").unwrap_err();
        assert!(matches!(err, GraphError::MissingSourceFile { .. }));
    }

    #[test]
    fn test_dependency_closure_post_order() {
        let mut h = Harness::new(vec![
            module("Core"),
            module("CoreUObject").public_deps(&["Core"]),
            module("Engine").public_deps(&["CoreUObject"]).dynamic(&["Renderer"]),
            module("Renderer").public_deps(&["Core"]),
        ]);
        let engine = h.resolver().resolve("Engine", "Engine").unwrap();

        let names = |ids: Vec<ModuleId>| -> Vec<String> {
            ids.into_iter().map(|i| h.graph.name(i).to_string()).collect()
        };

        assert_eq!(
            names(h.graph.dependency_closure(engine, false, false)),
            vec!["Core", "CoreUObject"]
        );
        assert_eq!(
            names(h.graph.dependency_closure(engine, true, false)),
            vec!["Core", "CoreUObject", "Renderer"]
        );
        assert_eq!(
            names(h.graph.dependency_closure(engine, false, true)),
            vec!["CoreUObject"]
        );
    }
}
