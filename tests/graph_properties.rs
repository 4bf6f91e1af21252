//! Cross-module properties of target graph construction.
//!
//! These run the public API against real directory trees so module source
//! discovery, include-path defaults and unity sizing see actual files.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use keel::builder::actions::ActionKind;
use keel::builder::binary::BinaryType;
use keel::builder::unity::{batch, UnitySettings};
use keel::core::plugin::{PluginDescriptor, PluginInfo, PluginLoadedFrom, PluginReference};
use keel::core::rules::CodeOptimization;
use keel::core::target::{LinkType, Platform};
use keel::util::config::CyclePolicy;
use keel::{BuildTarget, Config, GraphError, ModuleRule, RealFileSystem, RuleSet, TargetRules};
use tempfile::TempDir;

struct Workspace {
    tmp: TempDir,
    rules: RuleSet,
    config: Config,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let target = TargetRules {
            name: "Shooter".to_string(),
            platform: Platform::Linux,
            engine_dir: root.join("Engine"),
            ..Default::default()
        };
        Workspace {
            tmp,
            rules: RuleSet::new(target),
            config: Config::default(),
        }
    }

    fn root(&self) -> PathBuf {
        self.tmp.path().canonicalize().unwrap()
    }

    fn module_dir(&self, name: &str) -> PathBuf {
        self.root().join("Engine/Source/Runtime").join(name)
    }

    /// Add a module with a public header and the given private sources.
    fn module(&mut self, name: &str, sources: &[&str]) -> ModuleRule {
        let dir = self.module_dir(name);
        fs::create_dir_all(dir.join("Public")).unwrap();
        fs::write(dir.join("Public").join(format!("{}.h", name)), "#pragma once\n").unwrap();
        fs::create_dir_all(dir.join("Private")).unwrap();
        for source in sources {
            fs::write(
                dir.join("Private").join(source),
                format!("#include \"{}.h\"\nint {}_value;\n", name, name),
            )
            .unwrap();
        }
        ModuleRule::new(name, dir)
    }

    fn add(&mut self, rule: ModuleRule) {
        self.rules.add_module(rule);
    }

    fn launch(&mut self, rule: ModuleRule) {
        self.rules.target.launch_module = rule.name.clone();
        self.rules.add_module(rule);
    }

    fn target(&self) -> BuildTarget<'_> {
        BuildTarget::new(&self.rules, &self.rules.target, &RealFileSystem, &self.config)
    }

    fn assembled(&self) -> BuildTarget<'_> {
        let mut target = self.target();
        target.assemble().unwrap();
        target
    }
}

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn assert_one_binary_per_module(target: &BuildTarget<'_>) {
    let mut owners: HashMap<String, usize> = HashMap::new();
    for binary in &target.binaries {
        for &module in &binary.modules {
            *owners.entry(target.graph.name(module).to_string()).or_default() += 1;
        }
    }
    for module in target.graph.iter() {
        if let Some(binary) = module.binary {
            assert_eq!(owners.get(&module.name), Some(&1), "`{}`", module.name);
            assert!(target.binaries[binary.index()].modules.contains(&module.id));
        }
        if module.is_cpp() {
            assert!(module.binary.is_some(), "`{}` is unbound", module.name);
        }
    }
}

#[test]
fn test_public_dependency_include_paths_reach_dependents() {
    let mut ws = Workspace::new();
    let core = ws.module("Core", &["Core.cpp"]);
    let mut engine = ws.module("Engine", &["Engine.cpp"]);
    engine.public_dependencies = deps(&["Core"]);
    ws.launch(engine);
    ws.add(core);

    let target = ws.assembled();
    let engine = target.graph.find("Engine").unwrap();
    let core = target.graph.find("Core").unwrap();
    let env = target.composer().compose_public_environment(engine, None);

    let expected: HashSet<&PathBuf> = target
        .graph
        .get(core)
        .public_include_paths
        .iter()
        .chain(&target.graph.get(engine).public_include_paths)
        .collect();
    assert!(expected.contains(&ws.module_dir("Core").join("Public")));
    for path in expected {
        assert!(env.include_paths.contains(path), "{}", path.display());
    }
}

#[test]
fn test_whitelisted_cycle_resolves_under_error_policy() {
    let mut ws = Workspace::new();
    let mut engine = ws.module("Engine", &["Engine.cpp"]);
    engine.public_dependencies = deps(&["UMG"]);
    engine.circularly_referenced = deps(&["UMG"]);
    let mut umg = ws.module("UMG", &["UMG.cpp"]);
    umg.private_dependencies = deps(&["Engine"]);
    umg.circularly_referenced = deps(&["Engine"]);
    ws.launch(engine);
    ws.add(umg);
    ws.config.graph.circular_dependencies = CyclePolicy::Error;

    let err = ws.target().assemble().unwrap_err();
    assert!(matches!(err, GraphError::CircularDependencyViolation { .. }));

    ws.config.graph.allowed_cycles = vec![["UMG".to_string(), "Engine".to_string()]];
    let target = ws.assembled();
    assert_eq!(target.graph.len(), 2);
    assert!(target.diagnostics.is_empty());
}

#[test]
fn test_undeclared_cycle_terminates_with_warning() {
    let mut ws = Workspace::new();
    let mut a = ws.module("A", &["A.cpp"]);
    a.private_dependencies = deps(&["B"]);
    let mut b = ws.module("B", &["B.cpp"]);
    b.public_dependencies = deps(&["C"]);
    let mut c = ws.module("C", &["C.cpp"]);
    c.public_dependencies = deps(&["A"]);
    ws.launch(a);
    ws.add(b);
    ws.add(c);

    let target = ws.assembled();
    assert_eq!(target.graph.len(), 3);
    assert_eq!(target.diagnostics.entries().len(), 1);
    assert_one_binary_per_module(&target);
}

#[test]
fn test_shared_pch_instances_follow_compile_flags() {
    let mut ws = Workspace::new();
    let mut core = ws.module("Core", &["Core.cpp"]);
    core.shared_pch_header = Some(PathBuf::from("Public/Core.h"));
    let mut renderer = ws.module("Renderer", &["Renderer.cpp"]);
    renderer.private_dependencies = deps(&["Core"]);
    let mut slate = ws.module("Slate", &["Slate.cpp"]);
    slate.private_dependencies = deps(&["Core"]);
    let mut tools = ws.module("Tools", &["Tools.cpp"]);
    tools.private_dependencies = deps(&["Core"]);
    tools.optimize = CodeOptimization::Never;
    let mut launch = ws.module("Launch", &[]);
    launch.private_dependencies = deps(&["Renderer", "Slate", "Tools"]);
    ws.launch(launch);
    ws.add(core);
    ws.add(renderer);
    ws.add(slate);
    ws.add(tools);

    let plan = ws.assembled().plan().unwrap();
    let created: Vec<&str> = plan
        .actions
        .iter()
        .filter(|a| a.kind == ActionKind::CreatePch)
        .map(|a| a.status.as_str())
        .collect();
    assert_eq!(created, vec!["SharedPCH.Core.h", "SharedPCH.Core.NonOptimized.h"]);

    let pch_of = |source: &str| -> PathBuf {
        let action = plan.actions.iter().find(|a| a.status == source).unwrap();
        action
            .prerequisites
            .iter()
            .find(|p| p.extension().is_some_and(|e| e == "gch"))
            .cloned()
            .unwrap()
    };
    assert_eq!(pch_of("Renderer.cpp"), pch_of("Slate.cpp"));
    assert_ne!(pch_of("Renderer.cpp"), pch_of("Tools.cpp"));
}

#[test]
fn test_unity_partition_is_complete() {
    let ws = Workspace::new();
    let dir = ws.root().join("Engine/Source/Runtime/Core/Private");
    fs::create_dir_all(&dir).unwrap();
    let mut files = Vec::new();
    for (i, name) in ["A.cpp", "B.cpp", "C.cpp", "D.cpp", "E.cpp", "F.c"].iter().enumerate() {
        let path = dir.join(name);
        fs::write(&path, format!("#include \"Core.h\"\n{}\n", "x".repeat(i * 10))).unwrap();
        files.push(path);
    }
    let intermediate = ws.root().join("Intermediate");

    for min_source_files in 1..=7 {
        for bytes_per_unity_file in [1, 40, 1 << 20] {
            for working_set in [vec![], vec![files[2].clone()], vec![files[0].clone(), files[5].clone()]] {
                let settings = UnitySettings {
                    use_unity: true,
                    min_source_files,
                    bytes_per_unity_file,
                    adaptive: !working_set.is_empty(),
                    adaptive_dedicated_pch: true,
                    working_set: working_set.into_iter().collect(),
                    ..Default::default()
                };
                let groups = batch(&RealFileSystem, &files, "Core", &intermediate, &settings).unwrap();

                let mut covered: Vec<PathBuf> =
                    groups.iter().flat_map(|g| g.files().to_vec()).collect();
                covered.sort();
                let mut expected = files.clone();
                expected.sort();
                assert_eq!(covered, expected, "min {min_source_files}, budget {bytes_per_unity_file}");
            }
        }
    }
}

#[test]
fn test_monolithic_target_binds_extra_modules_into_executable() {
    let mut ws = Workspace::new();
    let launch = ws.module("Launch", &["Launch.cpp"]);
    let tools = ws.module("Tools", &["Tools.cpp"]);
    let mut profiler = ws.module("Profiler", &["Profiler.cpp"]);
    profiler.private_dependencies = deps(&["Tools"]);
    ws.launch(launch);
    ws.add(tools);
    ws.add(profiler);
    ws.rules.target.extra_modules = deps(&["Profiler", "Tools"]);

    let target = ws.assembled();
    assert_eq!(target.binaries.len(), 1);
    let binary = &target.binaries[0];
    assert_eq!(binary.binary_type, BinaryType::Executable);
    let names: HashSet<&str> = binary.modules.iter().map(|&m| target.graph.name(m)).collect();
    assert_eq!(names, HashSet::from(["Launch", "Profiler", "Tools"]));
    assert_eq!(target.graph.name(binary.primary_module), "Launch");
    assert_one_binary_per_module(&target);
}

#[test]
fn test_modular_target_synthesizes_dynamic_libraries() {
    let mut ws = Workspace::new();
    let mut launch = ws.module("Launch", &["Launch.cpp"]);
    launch.private_dependencies = deps(&["Engine"]);
    let mut engine = ws.module("Engine", &["Engine.cpp"]);
    engine.public_dependencies = deps(&["Core"]);
    let core = ws.module("Core", &["Core.cpp"]);
    ws.launch(launch);
    ws.add(engine);
    ws.add(core);
    ws.rules.target.link_type = LinkType::Modular;

    let target = ws.assembled();
    assert_eq!(target.binaries.len(), 3);
    for binary in &target.binaries[1..] {
        assert_eq!(binary.binary_type, BinaryType::DynamicLibrary);
        let primary = target.graph.name(binary.primary_module);
        assert_eq!(binary.name, format!("Shooter-{}", primary));
        assert_eq!(binary.modules.len(), 1);
        assert!(binary.output_path().ends_with(format!("libShooter-{}.so", primary)));
    }
    assert_one_binary_per_module(&target);

    let mut target = ws.assembled();
    let plan = target.plan().unwrap();
    let links = plan.actions.iter().filter(|a| a.kind == ActionKind::Link).count();
    assert_eq!(links, 3);
    // Every prerequisite produced by some action is produced before it is used.
    let mut produced: HashSet<&Path> = HashSet::new();
    let all_outputs: HashSet<&Path> = plan
        .actions
        .iter()
        .flat_map(|a| a.produced.iter().map(PathBuf::as_path))
        .collect();
    for action in &plan.actions {
        for item in &action.prerequisites {
            if all_outputs.contains(item.as_path()) {
                assert!(produced.contains(item.as_path()), "{}", item.display());
            }
        }
        produced.extend(action.produced.iter().map(PathBuf::as_path));
    }
}

#[test]
fn test_plugin_self_dependency_stops_before_modules() {
    let mut ws = Workspace::new();
    let launch = ws.module("Launch", &["Launch.cpp"]);
    ws.launch(launch);
    let root = ws.root();
    for (name, dep) in [("A", "B"), ("B", "A")] {
        ws.rules.add_plugin(PluginInfo {
            name: name.to_string(),
            directory: root.join("Engine/Plugins").join(name),
            loaded_from: PluginLoadedFrom::Engine,
            descriptor: PluginDescriptor {
                plugins: vec![PluginReference::new(dep, true)],
                ..Default::default()
            },
        });
    }
    ws.rules.target.enable_plugins = deps(&["A"]);

    let mut target = ws.target();
    let err = target.assemble().unwrap_err();
    assert!(matches!(err, GraphError::PluginSelfDependency { .. }));
    assert_eq!(target.graph.len(), 0);
}
