//! Unity batching - grouping translation units into larger compile units.
//!
//! Files are packed into `Module.<Name>.N_of_M.cpp` blobs until a byte budget
//! is reached. C files never join a blob. With adaptive unity enabled, files
//! in the working set are pulled out so they can be compiled on their own,
//! unoptimized or without the module's PCH.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::builder::toolchain::Language;
use crate::core::rules::ModuleRule;
use crate::core::target::TargetRules;
use crate::resolver::errors::GraphError;
use crate::util::config::UnityConfig;
use crate::util::fs::{claim_unique_path, FileSystem};

static INCLUDE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*(?:"[^"\n]+"|<[^>\n]+>)"#)
        .expect("include pattern is valid")
});

/// A header holding only the `#include` lines of one adaptive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedicatedPch {
    pub header: PathBuf,
    pub contents: String,
}

/// Translation units that are compiled together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileGroup {
    /// A generated file including each of `files`
    Unity {
        unity_file: PathBuf,
        files: Vec<PathBuf>,
        contents: String,
    },
    Individual { file: PathBuf },
    /// A working-set file compiled outside unity
    Adaptive {
        file: PathBuf,
        dedicated_pch: Option<DedicatedPch>,
    },
}

impl CompileGroup {
    /// The source files this group covers.
    pub fn files(&self) -> &[PathBuf] {
        match self {
            CompileGroup::Unity { files, .. } => files,
            CompileGroup::Individual { file } | CompileGroup::Adaptive { file, .. } => {
                std::slice::from_ref(file)
            }
        }
    }

    /// The file handed to the compiler.
    pub fn compiled_file(&self) -> &Path {
        match self {
            CompileGroup::Unity { unity_file, .. } => unity_file,
            CompileGroup::Individual { file } | CompileGroup::Adaptive { file, .. } => file,
        }
    }
}

/// Unity settings for one module.
#[derive(Debug, Clone, Default)]
pub struct UnitySettings {
    pub use_unity: bool,
    pub force: bool,
    pub faster_without_unity: bool,
    pub min_source_files: usize,
    pub bytes_per_unity_file: u64,
    pub max_files_per_unity_file: Option<usize>,
    /// Working-set files leave unity blobs
    pub adaptive: bool,
    pub adaptive_dedicated_pch: bool,
    pub working_set: HashSet<PathBuf>,
}

impl UnitySettings {
    pub fn new(target: &TargetRules, config: &UnityConfig, rules: &ModuleRule) -> Self {
        UnitySettings {
            use_unity: target.use_unity_build || target.force_unity_build,
            force: target.force_unity_build,
            faster_without_unity: rules.faster_without_unity,
            min_source_files: rules
                .min_source_files_for_unity_build_override
                .unwrap_or(target.min_source_files_for_unity_build),
            bytes_per_unity_file: config.bytes_per_unity_file,
            max_files_per_unity_file: config.max_files_per_unity_file,
            adaptive: adaptive_unity_enabled(target),
            adaptive_dedicated_pch: target.adaptive_unity_creates_dedicated_pch,
            working_set: target.working_set.iter().cloned().collect(),
        }
    }

    /// Whether `cpp_files` C++ sources are worth batching.
    pub fn module_uses_unity(&self, cpp_files: usize) -> bool {
        if !self.use_unity {
            return false;
        }
        if self.force {
            return true;
        }
        !self.faster_without_unity && cpp_files >= self.min_source_files
    }
}

/// Whether the target pulls working-set files out of unity blobs.
pub fn adaptive_unity_enabled(target: &TargetRules) -> bool {
    (target.adaptive_unity_disables_optimizations
        || target.adaptive_unity_disables_pch
        || target.adaptive_unity_creates_dedicated_pch)
        && !target.stress_test_unity
}

/// Partition `files` into compile groups. Every input file ends up in
/// exactly one group.
pub fn batch(
    fs: &dyn FileSystem,
    files: &[PathBuf],
    module_name: &str,
    intermediate_dir: &Path,
    settings: &UnitySettings,
) -> Result<Vec<CompileGroup>, GraphError> {
    let (c_files, cpp_files): (Vec<&PathBuf>, Vec<&PathBuf>) =
        files.iter().partition(|f| Language::of(f) == Language::C);

    let mut groups = Vec::new();
    let mut individual: Vec<CompileGroup> = c_files
        .into_iter()
        .map(|file| CompileGroup::Individual { file: file.clone() })
        .collect();

    if !settings.module_uses_unity(cpp_files.len()) {
        debug!("module `{}` not using unity build", module_name);
        individual.extend(
            cpp_files
                .into_iter()
                .map(|file| CompileGroup::Individual { file: file.clone() }),
        );
        groups.extend(individual);
        return Ok(groups);
    }

    let mut adaptive = Vec::new();
    let mut dedicated_headers = HashSet::new();
    let mut chunks: Vec<Vec<PathBuf>> = Vec::new();
    let mut current: Vec<PathBuf> = Vec::new();
    let mut current_bytes = 0u64;

    for file in cpp_files {
        if settings.adaptive && settings.working_set.contains(file) {
            trace!("`{}` is in the working set, compiling outside unity", file.display());
            let dedicated_pch = if settings.adaptive_dedicated_pch {
                dedicated_pch(fs, file, intermediate_dir, &mut dedicated_headers)?
            } else {
                None
            };
            adaptive.push(CompileGroup::Adaptive {
                file: file.clone(),
                dedicated_pch,
            });
            continue;
        }

        current_bytes += fs.file_size(file).unwrap_or(0);
        current.push(file.clone());

        let full = current_bytes >= settings.bytes_per_unity_file
            || settings
                .max_files_per_unity_file
                .is_some_and(|max| current.len() >= max);
        if full {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    let count = chunks.len();
    for (index, chunk) in chunks.into_iter().enumerate() {
        if chunk.len() == 1 {
            groups.extend(chunk.into_iter().map(|file| CompileGroup::Individual { file }));
            continue;
        }
        let unity_file = intermediate_dir.join(unity_file_name(module_name, index, count));
        let contents = unity_contents(&chunk);
        debug!(
            "unity file {} with {} sources",
            unity_file.display(),
            chunk.len()
        );
        groups.push(CompileGroup::Unity {
            unity_file,
            files: chunk,
            contents,
        });
    }

    groups.extend(individual);
    groups.extend(adaptive);
    Ok(groups)
}

fn unity_file_name(module_name: &str, index: usize, count: usize) -> String {
    if count == 1 {
        format!("Module.{}.cpp", module_name)
    } else {
        format!("Module.{}.{}_of_{}.cpp", module_name, index + 1, count)
    }
}

fn unity_contents(files: &[PathBuf]) -> String {
    let mut out = String::from(
        "// This file is generated to include a subset of the module's source files.\n",
    );
    for file in files {
        out.push_str(&format!(
            "#include \"{}\"\n",
            file.to_string_lossy().replace('\\', "/")
        ));
    }
    out
}

fn dedicated_pch(
    fs: &dyn FileSystem,
    file: &Path,
    intermediate_dir: &Path,
    claimed: &mut HashSet<PathBuf>,
) -> Result<Option<DedicatedPch>, GraphError> {
    let source = fs.read_to_string(file).map_err(|e| GraphError::FileSystem {
        path: file.to_path_buf(),
        message: e.to_string(),
    })?;

    let includes: Vec<&str> = INCLUDE_LINE
        .find_iter(&source)
        .map(|m| m.as_str().trim())
        .collect();
    if includes.is_empty() {
        return Ok(None);
    }

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut contents = format!(
        "// Dedicated PCH for {}\n",
        file.to_string_lossy().replace('\\', "/")
    );
    for line in includes {
        contents.push_str(line);
        contents.push('\n');
    }

    Ok(Some(DedicatedPch {
        header: claim_unique_path(
            claimed,
            intermediate_dir,
            &format!("PCH.Dedicated.{}", stem),
            ".h",
        ),
        contents,
    }))
}
