//! Plugin descriptors and references.
//!
//! Descriptor files are parsed elsewhere; these types are the already-parsed
//! form the plugin resolver consumes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::target::{Configuration, Platform, TargetRules, TargetType};

/// Where a plugin was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PluginLoadedFrom {
    #[default]
    Engine,
    Project,
}

/// An available plugin: its location plus its parsed descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub directory: PathBuf,
    #[serde(default)]
    pub loaded_from: PluginLoadedFrom,
    #[serde(default)]
    pub descriptor: PluginDescriptor,
}

impl PluginInfo {
    /// Path of the descriptor file inside the plugin directory.
    pub fn descriptor_file(&self) -> PathBuf {
        self.directory.join(format!("{}.uplugin", self.name))
    }
}

/// Parsed plugin descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDescriptor {
    pub modules: Vec<ModuleDescriptor>,
    /// Other plugins this plugin depends on
    pub plugins: Vec<PluginReference>,
    pub enabled_by_default: bool,
    pub can_contain_content: bool,
    /// Platforms the plugin can be built for; `None` means all
    pub supported_target_platforms: Option<Vec<Platform>>,
    /// Programs the plugin can be built into; `None` means all
    pub supported_programs: Option<Vec<String>>,
}

impl PluginDescriptor {
    pub fn supports_platform(&self, platform: Platform) -> bool {
        self.supported_target_platforms
            .as_ref()
            .map_or(true, |platforms| platforms.contains(&platform))
    }

    pub fn supports_program(&self, program: &str) -> bool {
        self.supported_programs.as_ref().map_or(true, |programs| {
            programs.iter().any(|p| p.eq_ignore_ascii_case(program))
        })
    }
}

/// A reference from a project file, target, or another plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginReference {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub whitelist_platforms: Vec<Platform>,
    #[serde(default)]
    pub blacklist_platforms: Vec<Platform>,
    #[serde(default)]
    pub whitelist_target_configurations: Vec<Configuration>,
    #[serde(default)]
    pub blacklist_target_configurations: Vec<Configuration>,
    #[serde(default)]
    pub whitelist_targets: Vec<TargetType>,
    #[serde(default)]
    pub blacklist_targets: Vec<TargetType>,
}

fn default_true() -> bool {
    true
}

impl PluginReference {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        PluginReference {
            name: name.into(),
            enabled,
            optional: false,
            whitelist_platforms: Vec::new(),
            blacklist_platforms: Vec::new(),
            whitelist_target_configurations: Vec::new(),
            blacklist_target_configurations: Vec::new(),
            whitelist_targets: Vec::new(),
            blacklist_targets: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_enabled_for_platform(&self, platform: Platform) -> bool {
        self.enabled
            && (self.whitelist_platforms.is_empty() || self.whitelist_platforms.contains(&platform))
            && !self.blacklist_platforms.contains(&platform)
    }

    pub fn is_enabled_for_configuration(&self, configuration: Configuration) -> bool {
        (self.whitelist_target_configurations.is_empty()
            || self.whitelist_target_configurations.contains(&configuration))
            && !self.blacklist_target_configurations.contains(&configuration)
    }

    pub fn is_enabled_for_target(&self, target: TargetType) -> bool {
        (self.whitelist_targets.is_empty() || self.whitelist_targets.contains(&target))
            && !self.blacklist_targets.contains(&target)
    }

    /// Whether the reference applies to the given target at all.
    pub fn applies_to(&self, rules: &TargetRules) -> bool {
        self.is_enabled_for_platform(rules.platform)
            && self.is_enabled_for_configuration(rules.configuration)
            && self.is_enabled_for_target(rules.target_type)
    }
}

/// Environment a plugin module is loaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModuleHostType {
    #[default]
    Runtime,
    RuntimeNoCommandlet,
    RuntimeAndProgram,
    CookedOnly,
    Developer,
    Editor,
    EditorNoCommandlet,
    Program,
    ServerOnly,
    ClientOnly,
}

/// A module listed in a plugin descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default, rename = "type")]
    pub host_type: ModuleHostType,
    #[serde(default)]
    pub whitelist_platforms: Vec<Platform>,
    #[serde(default)]
    pub blacklist_platforms: Vec<Platform>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, host_type: ModuleHostType) -> Self {
        ModuleDescriptor {
            name: name.into(),
            host_type,
            whitelist_platforms: Vec::new(),
            blacklist_platforms: Vec::new(),
        }
    }

    /// Whether this module is built into the given target.
    pub fn is_compiled_in(&self, rules: &TargetRules) -> bool {
        if !self.whitelist_platforms.is_empty() && !self.whitelist_platforms.contains(&rules.platform)
        {
            return false;
        }
        if self.blacklist_platforms.contains(&rules.platform) {
            return false;
        }

        let target = rules.target_type;
        match self.host_type {
            ModuleHostType::Runtime | ModuleHostType::RuntimeNoCommandlet => {
                target != TargetType::Program
            }
            ModuleHostType::RuntimeAndProgram => true,
            ModuleHostType::CookedOnly => !rules.build_editor(),
            ModuleHostType::Developer => rules.build_developer_tools,
            ModuleHostType::Editor | ModuleHostType::EditorNoCommandlet => rules.build_editor(),
            ModuleHostType::Program => target == TargetType::Program,
            ModuleHostType::ServerOnly => {
                target != TargetType::Program && target != TargetType::Client
            }
            ModuleHostType::ClientOnly => {
                target != TargetType::Program && target != TargetType::Server
            }
        }
    }
}
