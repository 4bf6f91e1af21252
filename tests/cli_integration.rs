//! CLI integration tests for keel.
//!
//! Each test lays out a small engine tree in a temporary directory, writes a
//! rule set next to it and runs the `keel` binary against it.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the keel binary command.
fn keel() -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    // Keep the user's global config out of the tests.
    cmd.env("HOME", env!("CARGO_TARGET_TMPDIR"));
    cmd
}

const RULES: &str = r#"
[target]
name = "Shooter"
launch_module = "Launch"
platform = "Linux"
engine_dir = "Engine"

[[modules]]
name = "Launch"
directory = "Engine/Source/Runtime/Launch"
private_dependencies = ["Core"]

[[modules]]
name = "Core"
directory = "Engine/Source/Runtime/Core"
public_dependencies = ["zlib"]

[[modules]]
name = "zlib"
kind = "External"
directory = "Engine/Source/ThirdParty/zlib"
public_libraries = ["z"]
"#;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// An engine tree with two C++ modules and one external module.
fn project(rules: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "Engine/Source/Runtime/Launch/Private/Launch.cpp", "int main() { return 0; }\n");
    write(root, "Engine/Source/Runtime/Core/Public/Core.h", "#pragma once\n");
    write(root, "Engine/Source/Runtime/Core/Private/Core.cpp", "#include \"Core.h\"\n");
    write(root, "Engine/Source/Runtime/Core/Private/Hash.c", "int hash;\n");
    fs::create_dir_all(root.join("Engine/Source/ThirdParty/zlib")).unwrap();
    write(root, "Shooter.rules.toml", rules);
    tmp
}

// ============================================================================
// keel plan
// ============================================================================

#[test]
fn test_plan_json_lists_actions_and_binaries() {
    let tmp = project(RULES);

    let output = keel()
        .args(["plan", "Shooter.rules.toml", "--format", "json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(graph["target"], "Shooter");

    let binaries = graph["binaries"].as_array().unwrap();
    assert_eq!(binaries.len(), 1);
    assert_eq!(binaries[0]["type"], "executable");
    assert_eq!(
        binaries[0]["modules"],
        serde_json::json!(["Launch", "Core"])
    );
    assert_eq!(binaries[0]["external_modules"], serde_json::json!(["zlib"]));

    let actions = graph["actions"].as_array().unwrap();
    let kinds: Vec<&str> = actions.iter().map(|a| a["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["compile", "compile", "compile", "link"]);

    let link = &actions[3];
    assert!(link["arguments"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "-lz"));
}

#[test]
fn test_plan_summary() {
    let tmp = project(RULES);

    keel()
        .args(["plan", "Shooter.rules.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Target `Shooter`"))
        .stdout(predicate::str::contains("Shooter (executable, 2 modules)"))
        .stdout(predicate::str::contains("Actions (4)"))
        .stdout(predicate::str::contains("Hash.c"));
}

#[test]
fn test_plan_modular_binaries() {
    let rules = RULES.replace(
        "platform = \"Linux\"",
        "platform = \"Linux\"\nlink_type = \"Modular\"",
    );
    let tmp = project(&rules);

    let output = keel()
        .args(["plan", "Shooter.rules.toml", "--format", "json"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = graph["binaries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Shooter", "Shooter-Core"]);
    assert_eq!(graph["binaries"][1]["type"], "dynamic_library");
}

// ============================================================================
// keel modules
// ============================================================================

#[test]
fn test_modules_lists_binding() {
    let tmp = project(RULES);

    keel()
        .args(["modules", "Shooter.rules.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Shooter (executable)"))
        .stdout(predicate::str::contains("  Launch"))
        .stdout(predicate::str::contains("  Core"))
        .stdout(predicate::str::contains("zlib (external)"));
}

// ============================================================================
// keel check
// ============================================================================

#[test]
fn test_check_valid_target() {
    let tmp = project(RULES);

    keel()
        .args(["check", "Shooter.rules.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("`Shooter` is valid"))
        .stdout(predicate::str::contains("2 modules in 1 binaries"));
}

#[test]
fn test_check_unresolved_module() {
    let rules = RULES.replace("private_dependencies = [\"Core\"]", "private_dependencies = [\"Cor\"]");
    let tmp = project(&rules);

    keel()
        .args(["check", "Shooter.rules.toml", "--no-color"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to find module `Cor`"))
        .stderr(predicate::str::contains("Launch -> Cor"));
}

#[test]
fn test_check_cycle_policy_from_config() {
    let rules = RULES.replace(
        "public_dependencies = [\"zlib\"]",
        "public_dependencies = [\"zlib\", \"Launch\"]",
    );
    let tmp = project(&rules);

    // Cycles only warn by default.
    keel()
        .args(["check", "Shooter.rules.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 warning(s)"));

    write(
        tmp.path(),
        "strict.toml",
        "[graph]\ncircular_dependencies = \"error\"\n",
    );
    keel()
        .args(["check", "Shooter.rules.toml", "--config", "strict.toml", "--no-color"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular dependency"));

    write(
        tmp.path(),
        "strict.toml",
        "[graph]\ncircular_dependencies = \"error\"\nallowed_cycles = [[\"Launch\", \"Core\"]]\n",
    );
    keel()
        .args(["check", "Shooter.rules.toml", "--config", "strict.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 warning(s)"));
}

#[test]
fn test_check_missing_rule_file() {
    let tmp = TempDir::new().unwrap();

    keel()
        .args(["check", "missing.toml"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read rule set"));
}

#[test]
fn test_check_missing_launch_module() {
    let rules = RULES.replace("launch_module = \"Launch\"", "launch_module = \"\"");
    let tmp = project(&rules);

    keel()
        .args(["check", "Shooter.rules.toml"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not build the graph of `Shooter`"));
}
