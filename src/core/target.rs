//! Target rules - what is being built, for which platform and configuration.
//!
//! `TargetRules` is the already-evaluated description of one build target.
//! Every field has a default so rule sets only spell out what differs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::plugin::PluginReference;

/// Platform a target is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    Win64,
    Win32,
    Linux,
    Mac,
    IOS,
    Android,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Win64 => "Win64",
            Platform::Win32 => "Win32",
            Platform::Linux => "Linux",
            Platform::Mac => "Mac",
            Platform::IOS => "IOS",
            Platform::Android => "Android",
        }
    }

    /// Windows-family platforms link against import libraries.
    pub fn is_windows_family(&self) -> bool {
        matches!(self, Platform::Win64 | Platform::Win32)
    }

    pub fn is_apple(&self) -> bool {
        matches!(self, Platform::Mac | Platform::IOS)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win64" => Ok(Platform::Win64),
            "win32" => Ok(Platform::Win32),
            "linux" => Ok(Platform::Linux),
            "mac" => Ok(Platform::Mac),
            "ios" => Ok(Platform::IOS),
            "android" => Ok(Platform::Android),
            other => Err(format!("unknown platform `{}`", other)),
        }
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Configuration {
    Debug,
    DebugGame,
    #[default]
    Development,
    Test,
    Shipping,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Debug => "Debug",
            Configuration::DebugGame => "DebugGame",
            Configuration::Development => "Development",
            Configuration::Test => "Test",
            Configuration::Shipping => "Shipping",
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Configuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Configuration::Debug),
            "debuggame" => Ok(Configuration::DebugGame),
            "development" => Ok(Configuration::Development),
            "test" => Ok(Configuration::Test),
            "shipping" => Ok(Configuration::Shipping),
            other => Err(format!("unknown configuration `{}`", other)),
        }
    }
}

/// Kind of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetType {
    #[default]
    Game,
    Editor,
    Client,
    Server,
    Program,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetType::Game => "Game",
            TargetType::Editor => "Editor",
            TargetType::Client => "Client",
            TargetType::Server => "Server",
            TargetType::Program => "Program",
        };
        f.write_str(s)
    }
}

/// Whether modules are linked into one executable or one library each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkType {
    #[default]
    Monolithic,
    Modular,
}

/// Whether a target shares intermediates with the canonical base target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildEnvironment {
    #[default]
    Shared,
    Unique,
}

/// Evaluated rules for one build target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetRules {
    pub name: String,
    pub target_type: TargetType,
    pub platform: Platform,
    pub configuration: Configuration,
    pub architecture: String,

    /// Module the primary binary is built around
    pub launch_module: String,
    /// Modules compiled in regardless of references
    pub extra_modules: Vec<String>,

    pub link_type: LinkType,
    pub build_environment: BuildEnvironment,
    /// Configuration whose binaries are not decorated with platform/config
    pub undecorated_configuration: Configuration,

    /// Build the launch binary as a DLL instead of an executable
    pub compile_as_dll: bool,
    /// Build the launch binary as a static library
    pub compile_as_library: bool,
    /// Whether a monolithic binary exports its symbols
    pub has_exports: bool,

    pub engine_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
    /// Override for the output directory; defaults to `<root>/Binaries/<Platform>`
    pub output_dir: Option<PathBuf>,

    // Unity
    pub use_unity_build: bool,
    pub force_unity_build: bool,
    pub min_source_files_for_unity_build: usize,
    pub adaptive_unity_disables_optimizations: bool,
    pub adaptive_unity_disables_pch: bool,
    pub adaptive_unity_creates_dedicated_pch: bool,
    pub stress_test_unity: bool,
    /// Files currently being iterated on; adaptive rules pull these out of unity blobs
    pub working_set: Vec<PathBuf>,

    // Precompiled headers
    pub use_pch_files: bool,
    pub use_shared_pchs: bool,
    pub min_files_using_precompiled_header: usize,

    // Plugins
    pub enable_plugins: Vec<String>,
    pub disable_plugins: Vec<String>,
    pub project_plugins: Vec<PluginReference>,
    pub foreign_plugin: Option<String>,
    pub program_enabled_plugins: Vec<String>,
    pub compile_against_engine: bool,
    pub compile_with_plugin_support: bool,
    pub build_developer_tools: bool,

    // Settings that force a unique build environment when changed
    pub global_definitions: Vec<String>,
    pub use_rtti: bool,
    pub enable_exceptions: bool,
    pub shadow_variable_warnings: bool,
    pub undefined_identifier_warnings: bool,

    // Licensing
    pub check_license_violations: bool,
    pub break_build_on_license_violation: bool,
    /// Skips the restricted-folder check entirely
    pub license_unchecked: bool,
}

impl Default for TargetRules {
    fn default() -> Self {
        TargetRules {
            name: String::new(),
            target_type: TargetType::Game,
            platform: Platform::Win64,
            configuration: Configuration::Development,
            architecture: "x64".to_string(),
            launch_module: String::new(),
            extra_modules: Vec::new(),
            link_type: LinkType::Monolithic,
            build_environment: BuildEnvironment::Shared,
            undecorated_configuration: Configuration::Development,
            compile_as_dll: false,
            compile_as_library: false,
            has_exports: true,
            engine_dir: PathBuf::from("Engine"),
            project_dir: None,
            output_dir: None,
            use_unity_build: true,
            force_unity_build: false,
            min_source_files_for_unity_build: 32,
            adaptive_unity_disables_optimizations: false,
            adaptive_unity_disables_pch: false,
            adaptive_unity_creates_dedicated_pch: false,
            stress_test_unity: false,
            working_set: Vec::new(),
            use_pch_files: true,
            use_shared_pchs: true,
            min_files_using_precompiled_header: 6,
            enable_plugins: Vec::new(),
            disable_plugins: Vec::new(),
            project_plugins: Vec::new(),
            foreign_plugin: None,
            program_enabled_plugins: Vec::new(),
            compile_against_engine: true,
            compile_with_plugin_support: false,
            build_developer_tools: true,
            global_definitions: Vec::new(),
            use_rtti: false,
            enable_exceptions: false,
            shadow_variable_warnings: true,
            undefined_identifier_warnings: true,
            check_license_violations: true,
            break_build_on_license_violation: true,
            license_unchecked: false,
        }
    }
}

impl TargetRules {
    /// Name used as prefix for synthesized modular binaries.
    pub fn app_name(&self) -> &str {
        &self.name
    }

    pub fn is_monolithic(&self) -> bool {
        self.link_type == LinkType::Monolithic
    }

    pub fn build_editor(&self) -> bool {
        self.target_type == TargetType::Editor
    }

    /// Root directory that owns this target's outputs.
    pub fn root_dir(&self) -> &Path {
        self.project_dir.as_deref().unwrap_or(&self.engine_dir)
    }

    /// Directory that binaries are written to.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.root_dir().join("Binaries").join(self.platform.as_str()))
    }

    /// Intermediate directory for everything the target produces under `root`.
    pub fn intermediate_dir(&self, root: &Path) -> PathBuf {
        root.join("Intermediate")
            .join("Build")
            .join(self.platform.as_str())
            .join(&self.architecture)
            .join(&self.name)
            .join(self.configuration.as_str())
    }

    /// Decorate a binary base name with platform and configuration.
    ///
    /// Binaries for the undecorated configuration keep their plain name.
    pub fn decorate_binary_name(&self, base: &str) -> String {
        if self.configuration == self.undecorated_configuration {
            base.to_string()
        } else {
            format!("{}-{}-{}", base, self.platform, self.configuration)
        }
    }

    /// Whether the optimizer is enabled for this configuration by default.
    pub fn is_optimized_configuration(&self) -> bool {
        !matches!(self.configuration, Configuration::Debug)
    }

    pub fn is_shipping(&self) -> bool {
        self.configuration == Configuration::Shipping
    }
}
