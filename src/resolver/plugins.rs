//! Plugin resolution.
//!
//! Resolution runs in two phases. [`PluginResolver::setup`] turns the
//! target's references into a deduplicated [`PluginSet`] with transitive
//! dependency sets; no modules exist yet, so a plugin that depends on itself
//! fails before anything is created. [`create_plugin_modules`] then creates
//! each enabled plugin's modules through the module resolver.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::core::plugin::{PluginInfo, PluginReference};
use crate::core::target::{TargetRules, TargetType};
use crate::resolver::errors::GraphError;
use crate::resolver::graph::ModuleResolver;
use crate::resolver::module::ModuleId;
use crate::util::diagnostic::DiagnosticSink;
use crate::util::fs::is_inside;

/// An enabled plugin.
#[derive(Debug, Clone)]
pub struct Plugin {
    pub info: PluginInfo,
    /// Chain of references that enabled the plugin
    pub reference_chain: String,
    /// Transitive plugin dependencies (lowercase keys); `None` while resolving
    pub dependencies: Option<IndexSet<String>>,
    pub modules: Vec<ModuleId>,
    pub referenced_explicitly: bool,
    pub descriptor_needed_at_runtime: bool,
}

impl Plugin {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn depends_on(&self, key: &str) -> bool {
        self.dependencies
            .as_ref()
            .is_some_and(|deps| deps.contains(key))
    }
}

/// The enabled plugins of a target, in the order they were enabled.
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    plugins: IndexMap<String, Plugin>,
}

impl PluginSet {
    pub fn get(&self, name: &str) -> Option<&Plugin> {
        self.plugins.get(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.plugins.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Map each plugin module to the key of its plugin.
    pub fn module_owners(&self) -> HashMap<ModuleId, &str> {
        self.plugins
            .iter()
            .flat_map(|(key, plugin)| plugin.modules.iter().map(move |&m| (m, key.as_str())))
            .collect()
    }
}

/// Resolves plugin references for one target.
pub struct PluginResolver<'a> {
    available: HashMap<String, &'a PluginInfo>,
    target: &'a TargetRules,
    diagnostics: &'a mut DiagnosticSink,
    plugins: IndexMap<String, Plugin>,
}

impl<'a> PluginResolver<'a> {
    pub fn new(
        available: &'a [PluginInfo],
        target: &'a TargetRules,
        diagnostics: &'a mut DiagnosticSink,
    ) -> Self {
        let available = available
            .iter()
            .map(|info| (info.name.to_ascii_lowercase(), info))
            .collect();
        PluginResolver {
            available,
            target,
            diagnostics,
            plugins: IndexMap::new(),
        }
    }

    /// Enable plugins for the target in precedence order.
    ///
    /// A name decided by an earlier source is not reconsidered by a later one,
    /// so an explicitly disabled plugin stays disabled even when it is enabled
    /// by default.
    pub fn setup(mut self) -> Result<PluginSet, GraphError> {
        let target = self.target;
        let mut referenced: HashSet<String> = HashSet::new();

        if let Some(foreign) = &target.foreign_plugin {
            referenced.insert(foreign.to_ascii_lowercase());
            self.resolve(&PluginReference::new(foreign.clone(), true), "command line")?;
        }

        for name in &target.enable_plugins {
            if referenced.insert(name.to_ascii_lowercase()) {
                self.resolve(&PluginReference::new(name.clone(), true), "target settings")?;
            }
        }

        for name in &target.disable_plugins {
            if referenced.insert(name.to_ascii_lowercase()) {
                self.resolve(&PluginReference::new(name.clone(), false), "target settings")?;
            }
        }

        for reference in &target.project_plugins {
            let key = reference.name.to_ascii_lowercase();
            let listed_by_target = target
                .enable_plugins
                .iter()
                .chain(&target.disable_plugins)
                .any(|n| n.eq_ignore_ascii_case(&reference.name));
            if listed_by_target {
                continue;
            }
            if !referenced.insert(key) {
                self.diagnostics.warn(format!(
                    "plugin `{}` is listed multiple times in the project file",
                    reference.name
                ));
                continue;
            }
            self.resolve(reference, "project file")?;
        }

        if target.compile_against_engine || target.compile_with_plugin_support {
            let defaults: Vec<String> = self
                .available
                .values()
                .filter(|info| info.descriptor.enabled_by_default)
                .map(|info| info.name.clone())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            for name in defaults {
                if referenced.insert(name.to_ascii_lowercase()) {
                    let reference = PluginReference::new(name, true).optional();
                    self.resolve(&reference, "default plugins")?;
                }
            }
        }

        if target.target_type == TargetType::Program {
            for name in &target.program_enabled_plugins {
                if referenced.insert(name.to_ascii_lowercase()) {
                    self.resolve(&PluginReference::new(name.clone(), true), "program config")?;
                }
            }
        }

        debug!("enabled {} plugins", self.plugins.len());
        Ok(PluginSet {
            plugins: self.plugins,
        })
    }

    /// Resolve one reference, returning the plugin key when it is enabled.
    ///
    /// Idempotent per plugin name.
    pub fn resolve(
        &mut self,
        reference: &PluginReference,
        chain: &str,
    ) -> Result<Option<String>, GraphError> {
        if !reference.enabled {
            trace!("plugin `{}` disabled via {}", reference.name, chain);
            return Ok(None);
        }

        let key = reference.name.to_ascii_lowercase();

        if let Some(existing) = self.plugins.get_mut(&key) {
            if !reference.optional && !existing.referenced_explicitly {
                existing.referenced_explicitly = true;
                let next_chain = format!("{} -> {}", chain, existing.info.name);
                let next_refs = existing.info.descriptor.plugins.clone();
                for next in &next_refs {
                    self.resolve(next, &next_chain)?;
                }
            }
            return Ok(Some(key));
        }

        if !reference.applies_to(self.target) {
            trace!(
                "ignoring plugin `{}` (referenced via {}) for platform/configuration",
                reference.name,
                chain
            );
            return Ok(None);
        }

        let Some(&info) = self.available.get(&key) else {
            if reference.optional {
                return Ok(None);
            }
            return Err(GraphError::PluginNotFound {
                name: reference.name.clone(),
                chain: chain.to_string(),
            });
        };

        if !info.descriptor.supports_platform(self.target.platform) {
            trace!(
                "ignoring plugin `{}` (referenced via {}): platform not supported",
                info.name,
                chain
            );
            return Ok(None);
        }

        if self.target.target_type == TargetType::Program
            && !info.descriptor.supports_program(self.target.app_name())
        {
            trace!(
                "ignoring plugin `{}` (referenced via {}): not a supported program",
                info.name,
                chain
            );
            return Ok(None);
        }

        debug!("enabling plugin `{}` (referenced via {})", info.name, chain);
        let plugin_chain = format!("{} -> {}", chain, info.name);
        self.plugins.insert(
            key.clone(),
            Plugin {
                info: info.clone(),
                reference_chain: plugin_chain.clone(),
                dependencies: None,
                modules: Vec::new(),
                referenced_explicitly: !reference.optional,
                descriptor_needed_at_runtime: false,
            },
        );

        let mut dependencies = IndexSet::new();
        for next in &info.descriptor.plugins {
            let Some(next_key) = self.resolve(next, &plugin_chain)? else {
                continue;
            };
            let next_plugin = &self.plugins[&next_key];
            let Some(next_deps) = &next_plugin.dependencies else {
                return Err(GraphError::PluginSelfDependency {
                    plugin: next_plugin.info.name.clone(),
                    chain: format!("{} -> {}", plugin_chain, next_plugin.info.name),
                });
            };
            let transitive: Vec<String> = next_deps.iter().cloned().collect();
            dependencies.insert(next_key);
            dependencies.extend(transitive);
        }

        if dependencies.contains(&key) {
            return Err(GraphError::PluginSelfDependency {
                plugin: info.name.clone(),
                chain: plugin_chain,
            });
        }

        if let Some(plugin) = self.plugins.get_mut(&key) {
            plugin.dependencies = Some(dependencies);
        }
        Ok(Some(key))
    }
}

/// Create the modules of every enabled plugin.
///
/// Only descriptors compiled into the target are created. A plugin needs its
/// descriptor at runtime when it has modules or content, or when any of its
/// dependencies does.
pub fn create_plugin_modules(
    plugins: &mut PluginSet,
    resolver: &mut ModuleResolver<'_>,
    target: &TargetRules,
) -> Result<(), GraphError> {
    for plugin in plugins.plugins.values_mut() {
        let descriptors = plugin.info.descriptor.modules.clone();
        for descriptor in descriptors.iter().filter(|d| d.is_compiled_in(target)) {
            let id = resolver.find_or_create_cpp_module(&descriptor.name, &plugin.reference_chain)?;
            if plugin.modules.contains(&id) {
                continue;
            }

            let module_dir = &resolver.graph().get(id).rules.directory;
            if !is_inside(module_dir, &plugin.info.directory) {
                return Err(GraphError::PluginModuleOutsidePlugin {
                    module: descriptor.name.clone(),
                    plugin: plugin.info.name.clone(),
                    plugin_dir: plugin.info.directory.clone(),
                });
            }
            plugin.modules.push(id);
        }
    }

    let needs_descriptor: HashSet<String> = plugins
        .plugins
        .iter()
        .filter(|(_, p)| p.info.descriptor.can_contain_content || !p.modules.is_empty())
        .map(|(key, _)| key.clone())
        .collect();

    for (key, plugin) in plugins.plugins.iter_mut() {
        plugin.descriptor_needed_at_runtime = needs_descriptor.contains(key)
            || plugin
                .dependencies
                .iter()
                .flatten()
                .any(|dep| needs_descriptor.contains(dep));
    }

    Ok(())
}
