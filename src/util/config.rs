//! Configuration file support for keel.
//!
//! Two configuration file locations are read:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `.keel/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// keel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Module graph policy
    pub graph: GraphConfig,

    /// Unity batching limits
    pub unity: UnityConfig,

    /// Precompiled header switches
    pub pch: PchConfig,
}

/// What to do with a dependency cycle that is not in `allowed_cycles`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Record a warning and keep going.
    #[default]
    Warn,
    /// Abort graph construction.
    Error,
}

impl fmt::Display for CyclePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePolicy::Warn => write!(f, "warn"),
            CyclePolicy::Error => write!(f, "error"),
        }
    }
}

/// Module graph configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Policy for unexpected cycles
    pub circular_dependencies: CyclePolicy,

    /// Module pairs allowed to reference each other, e.g. `[["Engine", "UMG"]]`
    pub allowed_cycles: Vec<[String; 2]>,

    /// Folder names whose contents may not leak into less restricted outputs
    pub restricted_folders: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            circular_dependencies: CyclePolicy::Warn,
            allowed_cycles: Vec::new(),
            restricted_folders: vec!["NotForLicensees".to_string(), "NoRedist".to_string()],
        }
    }
}

impl GraphConfig {
    /// Build the lookup used during module resolution.
    pub fn cycle_whitelist(&self) -> CycleWhitelist {
        CycleWhitelist::new(self.allowed_cycles.iter().map(|[a, b]| (a.as_str(), b.as_str())))
    }
}

/// Allowed circular module pairs. Order within a pair does not matter.
#[derive(Debug, Clone, Default)]
pub struct CycleWhitelist {
    pairs: HashSet<(String, String)>,
}

impl CycleWhitelist {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|(a, b)| Self::key(a, b))
            .collect();
        CycleWhitelist { pairs }
    }

    pub fn allows(&self, a: &str, b: &str) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }

    fn key(a: &str, b: &str) -> (String, String) {
        let a = a.to_ascii_lowercase();
        let b = b.to_ascii_lowercase();
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Unity batching configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnityConfig {
    /// Source bytes accumulated before a unity file is closed
    pub bytes_per_unity_file: u64,

    /// Optional cap on the number of sources in one unity file
    pub max_files_per_unity_file: Option<usize>,
}

impl Default for UnityConfig {
    fn default() -> Self {
        UnityConfig {
            bytes_per_unity_file: 384 * 1024,
            max_files_per_unity_file: None,
        }
    }
}

/// Precompiled header configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PchConfig {
    /// Master switch; `false` compiles every module without a PCH
    pub enabled: bool,
}

impl Default for PchConfig {
    fn default() -> Self {
        PchConfig { enabled: true }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.graph.circular_dependencies != defaults.graph.circular_dependencies {
            self.graph.circular_dependencies = other.graph.circular_dependencies;
        }
        if !other.graph.allowed_cycles.is_empty() {
            self.graph.allowed_cycles.extend(other.graph.allowed_cycles);
        }
        if other.graph.restricted_folders != defaults.graph.restricted_folders {
            self.graph.restricted_folders = other.graph.restricted_folders;
        }

        if other.unity.bytes_per_unity_file != defaults.unity.bytes_per_unity_file {
            self.unity.bytes_per_unity_file = other.unity.bytes_per_unity_file;
        }
        if other.unity.max_files_per_unity_file.is_some() {
            self.unity.max_files_per_unity_file = other.unity.max_files_per_unity_file;
        }

        if other.pch.enabled != defaults.pch.enabled {
            self.pch.enabled = other.pch.enabled;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".keel"))
}

/// Get the global config path (~/.keel/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.keel/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".keel").join("config.toml")
}
