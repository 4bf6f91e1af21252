//! Binaries - the link outputs of a target.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Serialize;

use crate::resolver::graph::ModuleGraph;
use crate::resolver::module::ModuleId;

/// Index of a binary inside its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BinaryId(pub(crate) u32);

impl BinaryId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BinaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binary#{}", self.0)
    }
}

/// Kind of artifact a binary links into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryType {
    Executable,
    DynamicLibrary,
    StaticLibrary,
}

impl BinaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryType::Executable => "executable",
            BinaryType::DynamicLibrary => "dynamic_library",
            BinaryType::StaticLibrary => "static_library",
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A linked output and the modules compiled into it.
#[derive(Debug, Clone)]
pub struct Binary {
    pub id: BinaryId,
    pub binary_type: BinaryType,
    /// Undecorated base name, e.g. `Shooter-Renderer`
    pub name: String,
    /// Linked artifacts; the first entry is the primary output
    pub output_paths: Vec<PathBuf>,
    /// Import library produced next to a dynamic library, when the platform has one
    pub import_library: Option<PathBuf>,
    pub intermediate_dir: PathBuf,
    /// Modules compiled into this binary, in binding order
    pub modules: IndexSet<ModuleId>,
    pub primary_module: ModuleId,
    /// Non-compiled modules whose libraries this binary links
    pub external_modules: IndexSet<ModuleId>,
    pub allow_exports: bool,
    pub use_precompiled: bool,
    pub create_import_library_separately: bool,
}

impl Binary {
    pub fn new(
        id: BinaryId,
        binary_type: BinaryType,
        name: impl Into<String>,
        output_path: PathBuf,
        intermediate_dir: PathBuf,
        primary_module: ModuleId,
    ) -> Self {
        Binary {
            id,
            binary_type,
            name: name.into(),
            output_paths: vec![output_path],
            import_library: None,
            intermediate_dir,
            modules: IndexSet::from([primary_module]),
            primary_module,
            external_modules: IndexSet::new(),
            allow_exports: binary_type != BinaryType::StaticLibrary,
            use_precompiled: false,
            create_import_library_separately: false,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_paths[0]
    }

    /// Add a module; returns false when it was already part of the binary.
    pub fn add_module(&mut self, module: ModuleId) -> bool {
        self.modules.insert(module)
    }

    pub fn is_library(&self) -> bool {
        self.binary_type == BinaryType::StaticLibrary
    }

    /// Serializable description of the binary.
    pub fn manifest(&self, graph: &ModuleGraph) -> BinaryManifest {
        BinaryManifest {
            name: self.name.clone(),
            binary_type: self.binary_type,
            outputs: self.output_paths.clone(),
            import_library: self.import_library.clone(),
            primary_module: graph.name(self.primary_module).to_string(),
            modules: self
                .modules
                .iter()
                .map(|&m| graph.name(m).to_string())
                .collect(),
            external_modules: self
                .external_modules
                .iter()
                .map(|&m| graph.name(m).to_string())
                .collect(),
            create_import_library_separately: self.create_import_library_separately,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BinaryManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub binary_type: BinaryType,
    pub outputs: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_library: Option<PathBuf>,
    pub primary_module: String,
    pub modules: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_modules: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub create_import_library_separately: bool,
}
