//! Precompiled header selection.
//!
//! A module either builds its own private PCH from a header it declares, or
//! borrows a shared PCH owned by one of its direct dependencies. Shared PCHs
//! come from templates; each template holds one instance per distinct set of
//! compile flags, so modules compiled the same way reuse one PCH.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, trace};

use crate::builder::environment::{CompileFlags, CppCompileEnvironment, EnvironmentComposer, PchAction};
use crate::builder::toolchain::Toolchain;
use crate::core::rules::PchUsage;
use crate::core::target::TargetRules;
use crate::resolver::errors::GraphError;
use crate::resolver::graph::ModuleGraph;
use crate::resolver::module::{Module, ModuleId};
use crate::util::config::PchConfig;
use crate::util::fs::FileSystem;

static FIRST_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*["<]([^">\n]+)[">]"#)
        .expect("include pattern is valid")
});

/// How a module may use precompiled headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PchMode {
    NoPch,
    PrivatePch,
    SharedPch,
    ExplicitOrShared,
}

impl PchMode {
    pub fn allows_shared(self) -> bool {
        matches!(self, PchMode::SharedPch | PchMode::ExplicitOrShared)
    }
}

impl From<PchUsage> for PchMode {
    fn from(usage: PchUsage) -> Self {
        match usage {
            PchUsage::NoPCHs => PchMode::NoPch,
            PchUsage::NoSharedPCHs => PchMode::PrivatePch,
            PchUsage::UseSharedPCHs => PchMode::SharedPch,
            PchUsage::UseExplicitOrSharedPCHs | PchUsage::Default => PchMode::ExplicitOrShared,
        }
    }
}

/// One compiled variant of a precompiled header.
#[derive(Debug, Clone)]
pub struct PchInstance {
    /// Generated wrapper that defines the environment and includes the header
    pub header_file: PathBuf,
    pub flags: CompileFlags,
    pub pch_file: PathBuf,
    /// Object file some toolchains emit alongside the PCH
    pub object_file: Option<PathBuf>,
    /// Environment the PCH is created with
    pub environment: CppCompileEnvironment,
    pub wrapper_contents: String,
}

/// A shared precompiled header declared by an engine module.
#[derive(Debug, Clone)]
pub struct PchTemplate {
    pub module: ModuleId,
    pub module_name: String,
    pub base_environment: CppCompileEnvironment,
    pub header_file: PathBuf,
    pub output_dir: PathBuf,
    pub instances: Vec<PchInstance>,
}

impl PchTemplate {
    /// Whether a module compiled with `env` can use this template's PCHs.
    pub fn is_valid_for(&self, env: &CppCompileEnvironment) -> bool {
        env.is_building_dll == self.base_environment.is_building_dll
            && env.is_building_library == self.base_environment.is_building_library
    }

    /// The instance for `flags`, created on first request.
    ///
    /// Returns the instance index and whether it was just created.
    pub fn find_or_create(&mut self, flags: CompileFlags, toolchain: &dyn Toolchain) -> (usize, bool) {
        if let Some(idx) = self.instances.iter().position(|i| i.flags == flags) {
            return (idx, false);
        }

        let variant = flags.variant_suffix(&self.base_environment.flags);
        let wrapper = self
            .output_dir
            .join(format!("SharedPCH.{}{}.h", self.module_name, variant));
        let contents = pch_wrapper_contents(&self.base_environment.definitions, &self.header_file);

        let mut environment = self.base_environment.clone();
        environment.flags = flags;
        let instance = new_instance(wrapper, contents, environment, toolchain);
        debug!(
            "new shared PCH instance {} for `{}`",
            instance.header_file.display(),
            self.module_name
        );

        self.instances.push(instance);
        (self.instances.len() - 1, true)
    }
}

/// Where a selected PCH lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PchHandle {
    Private(ModuleId),
    Shared { template: usize, instance: usize },
}

/// Result of [`PchSelector::select_pch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PchSelection {
    pub handle: PchHandle,
    /// The instance did not exist before this call and must be built
    pub created: bool,
}

/// Chooses precompiled headers for the modules of one target.
#[derive(Debug)]
pub struct PchSelector {
    templates: Vec<PchTemplate>,
    private: IndexMap<ModuleId, PchInstance>,
    use_pch_files: bool,
    use_shared_pchs: bool,
    min_files: usize,
}

impl PchSelector {
    pub fn new(templates: Vec<PchTemplate>, target: &TargetRules, config: &PchConfig) -> Self {
        PchSelector {
            templates,
            private: IndexMap::new(),
            use_pch_files: target.use_pch_files && config.enabled,
            use_shared_pchs: target.use_shared_pchs,
            min_files: target.min_files_using_precompiled_header,
        }
    }

    pub fn templates(&self) -> &[PchTemplate] {
        &self.templates
    }

    pub fn instance(&self, handle: PchHandle) -> Option<&PchInstance> {
        match handle {
            PchHandle::Private(module) => self.private.get(&module),
            PchHandle::Shared { template, instance } => self
                .templates
                .get(template)
                .and_then(|t| t.instances.get(instance)),
        }
    }

    /// Pick the PCH `module` compiles against, given its compile environment.
    pub fn select_pch(
        &mut self,
        module: &Module,
        graph: &ModuleGraph,
        env: &CppCompileEnvironment,
        toolchain: &dyn Toolchain,
    ) -> Option<PchSelection> {
        let mode = PchMode::from(module.pch_usage);
        if !self.use_pch_files || mode == PchMode::NoPch {
            return None;
        }

        if let Some(header) = &module.rules.private_pch_header {
            return Some(self.private_pch(module, &module.rules.resolve_path(header), env, toolchain));
        }

        if !self.use_shared_pchs || env.is_building_library || !mode.allows_shared() {
            return None;
        }

        let direct = graph.dependency_closure(module.id, false, true);
        let template = self
            .templates
            .iter()
            .position(|t| direct.contains(&t.module) && t.is_valid_for(env))?;
        let (instance, created) = self.templates[template].find_or_create(env.flags, toolchain);
        trace!(
            "`{}` uses shared PCH of `{}`",
            module.name,
            self.templates[template].module_name
        );
        Some(PchSelection {
            handle: PchHandle::Shared { template, instance },
            created,
        })
    }

    /// Whether `module` is big enough to get a private PCH from the header its
    /// C++ sources all include first, when it has no other PCH.
    pub fn wants_first_include_pch(&self, module: &Module, cpp_files: usize) -> bool {
        if !self.use_pch_files || PchMode::from(module.pch_usage) == PchMode::NoPch {
            return false;
        }
        let min_files = module
            .rules
            .min_files_using_precompiled_header_override
            .unwrap_or(self.min_files);
        if cpp_files < min_files {
            trace!(
                "`{}` has {} C++ sources, below the PCH threshold of {}",
                module.name,
                cpp_files,
                min_files
            );
            return false;
        }
        true
    }

    /// The private PCH of `module` built from `header`, created on first use.
    pub fn private_pch(
        &mut self,
        module: &Module,
        header: &Path,
        env: &CppCompileEnvironment,
        toolchain: &dyn Toolchain,
    ) -> PchSelection {
        let created = !self.private.contains_key(&module.id);
        if created {
            let instance = private_instance(module, header, env, toolchain);
            self.private.insert(module.id, instance);
        }
        PchSelection {
            handle: PchHandle::Private(module.id),
            created,
        }
    }

    /// Environment for compiling the sources of `module` against a selected PCH.
    ///
    /// With a shared PCH the module's definitions move into a generated
    /// `Definitions.<Module>.h`, returned alongside as `(path, contents)`.
    pub fn using_environment(
        &self,
        selection: &PchSelection,
        module: &Module,
        env: &CppCompileEnvironment,
    ) -> (CppCompileEnvironment, Option<(PathBuf, String)>) {
        let Some(instance) = self.instance(selection.handle) else {
            return (env.clone(), None);
        };

        let mut using = env.clone();
        let mut definitions_file = None;
        if let PchHandle::Shared { .. } = selection.handle {
            if let Some(dir) = module.cpp().map(|c| c.intermediate_dir.clone()) {
                let path = dir.join(format!("Definitions.{}.h", module.name));
                let contents = definitions_header(module, &env.definitions);
                using.force_include_files.push(path.clone());
                definitions_file = Some((path, contents));
            }
        }
        using.definitions.clear();
        using.pch = PchAction::Include {
            header: instance.header_file.clone(),
            pch_file: instance.pch_file.clone(),
        };
        (using, definitions_file)
    }
}

/// Build shared PCH templates for every bound module that declares a shared
/// header, ordered by how many other template owners each one depends on.
pub fn find_shared_pchs(
    graph: &ModuleGraph,
    composer: &EnvironmentComposer<'_>,
    base: &CppCompileEnvironment,
) -> Result<Vec<PchTemplate>, GraphError> {
    let owners: Vec<ModuleId> = graph
        .iter()
        .filter(|m| m.is_cpp() && m.binary.is_some() && m.rules.shared_pch_header.is_some())
        .map(|m| m.id)
        .collect();

    let mut ranked: Vec<(ModuleId, usize)> = owners
        .iter()
        .map(|&id| {
            let fan_out = graph
                .dependency_closure(id, true, false)
                .iter()
                .filter(|dep| owners.contains(dep))
                .count();
            (id, fan_out)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut templates = Vec::with_capacity(ranked.len());
    for (id, fan_out) in ranked {
        let module = graph.get(id);
        if !module.is_engine_module {
            return Err(GraphError::SharedPchNotEngineModule {
                module: module.name.clone(),
            });
        }
        let (Some(header), Some(cpp)) = (&module.rules.shared_pch_header, module.cpp()) else {
            continue;
        };
        debug!("shared PCH template `{}` (fan-out {})", module.name, fan_out);
        templates.push(PchTemplate {
            module: id,
            module_name: module.name.clone(),
            base_environment: composer.shared_pch_environment(id, base),
            header_file: module.rules.resolve_path(header),
            output_dir: cpp.intermediate_dir.clone(),
            instances: Vec::new(),
        });
    }
    Ok(templates)
}

/// The header every one of `sources` includes first, if they agree.
///
/// Names are looked up next to the source, then along the include paths of
/// `env`.
pub fn unique_first_include(
    fs: &dyn FileSystem,
    sources: &[PathBuf],
    env: &CppCompileEnvironment,
) -> Option<PathBuf> {
    let mut unique: Option<PathBuf> = None;
    for source in sources {
        let text = fs.read_to_string(source).ok()?;
        let name = FIRST_INCLUDE.captures(&text)?.get(1)?.as_str();
        let header = source
            .parent()
            .into_iter()
            .chain(env.include_paths.iter().map(PathBuf::as_path))
            .chain(env.system_include_paths.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|path| fs.exists(path))?;
        match &unique {
            Some(first) if *first != header => return None,
            Some(_) => {}
            None => unique = Some(header),
        }
    }
    unique
}

fn private_instance(
    module: &Module,
    header: &Path,
    env: &CppCompileEnvironment,
    toolchain: &dyn Toolchain,
) -> PchInstance {
    let dir = module
        .cpp()
        .map(|c| c.intermediate_dir.clone())
        .unwrap_or_default();
    let wrapper = dir.join(format!("PCH.{}.h", module.name));
    let contents = pch_wrapper_contents(&env.definitions, header);
    new_instance(wrapper, contents, env.clone(), toolchain)
}

fn new_instance(
    wrapper: PathBuf,
    contents: String,
    mut environment: CppCompileEnvironment,
    toolchain: &dyn Toolchain,
) -> PchInstance {
    let pch_file = append_extension(&wrapper, toolchain.pch_extension());
    let object_file = toolchain
        .pch_produces_object()
        .then(|| pch_file.with_extension(toolchain.object_extension().trim_start_matches('.')));

    environment.definitions.clear();
    environment.pch = PchAction::Create {
        header: wrapper.clone(),
        pch_file: pch_file.clone(),
    };

    PchInstance {
        header_file: wrapper,
        flags: environment.flags,
        pch_file,
        object_file,
        environment,
        wrapper_contents: contents,
    }
}

pub(crate) fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(extension);
    PathBuf::from(name)
}

/// `#define` lines for compiler definitions; a bare name is defined as `1`.
pub fn write_definitions(definitions: &[String], out: &mut String) {
    for definition in definitions {
        match definition.split_once('=') {
            Some((name, value)) => out.push_str(&format!("#define {} {}\n", name, value)),
            None => out.push_str(&format!("#define {} 1\n", definition)),
        }
    }
}

/// Contents of a wrapper that defines `definitions` and includes `header`.
pub fn pch_wrapper_contents(definitions: &[String], header: &Path) -> String {
    let header = header.to_string_lossy().replace('\\', "/");
    let mut out = format!("// PCH for {}\n", header);
    write_definitions(definitions, &mut out);
    out.push_str(&format!("#include \"{}\"\n", header));
    out
}

/// Force-included header carrying the definitions of a module that compiles
/// against a shared PCH.
fn definitions_header(module: &Module, definitions: &[String]) -> String {
    let mut out = format!("#undef {}\n", module.api_define());
    if !module.is_engine_module {
        out.push_str("#undef IS_ENGINE_MODULE\n");
    }
    write_definitions(definitions, &mut out);
    out
}
