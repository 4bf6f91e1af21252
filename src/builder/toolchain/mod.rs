//! Toolchain abstraction for C/C++ compilers.
//!
//! A toolchain turns compile, archive and link requests into command lines
//! and knows the file naming conventions of its platform. Commands are only
//! described here; running them is up to whoever executes the action graph.

use std::path::{Path, PathBuf};

use crate::builder::environment::{CompileFlags, CppCompileEnvironment, PchAction};
use crate::core::target::Platform;

mod gcc;
mod msvc;

pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// Source language of a translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Language of a source file, by extension.
    pub fn of(path: &Path) -> Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("c") => Language::C,
            _ => Language::Cxx,
        }
    }
}

/// Link mode for executables and shared libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Executable,
    SharedLib,
}

/// A command to execute, with program and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run (e.g., "clang++", "cl.exe")
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput<'a> {
    pub source: &'a Path,
    /// Object file, or the PCH file when the environment creates one
    pub output: &'a Path,
    pub language: Language,
    pub environment: &'a CppCompileEnvironment,
}

impl CompileInput<'_> {
    pub fn flags(&self) -> &CompileFlags {
        &self.environment.flags
    }

    pub fn pch(&self) -> &PchAction {
        &self.environment.pch
    }
}

/// Input for an archive step (creating a static library).
#[derive(Debug, Clone)]
pub struct ArchiveInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Input for a link step.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    pub lib_dirs: Vec<PathBuf>,
    /// Library names, or paths when they contain a separator or extension
    pub libs: Vec<String>,
    pub frameworks: Vec<String>,
    /// Import library written alongside a shared library
    pub import_library: Option<PathBuf>,
    /// Leave symbols of shared libraries that are not linked yet unresolved
    pub allow_undefined: bool,
}

/// The compiler family behind a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    Gcc,
    Clang,
    AppleClang,
    Msvc,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    fn platform(&self) -> ToolchainPlatform;

    fn compiler_path(&self) -> &Path;

    /// Compile one translation unit, or create a PCH when the environment
    /// asks for one.
    fn compile_command(&self, input: &CompileInput<'_>) -> CommandSpec;

    /// Static libraries always use the archiver, never the compiler driver.
    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec;

    fn link_command(&self, input: &LinkInput, mode: LinkMode) -> CommandSpec;

    /// Produce only the import library of a shared library, ahead of its
    /// link. `None` when the platform links shared libraries directly.
    fn import_library_command(&self, input: &LinkInput) -> Option<CommandSpec>;

    /// Whether creating a PCH also yields an object file to link.
    fn pch_produces_object(&self) -> bool;

    fn object_extension(&self) -> &str;

    fn pch_extension(&self) -> &str;

    fn static_lib_extension(&self) -> &str;

    fn shared_lib_extension(&self) -> &str;

    fn exe_extension(&self) -> &str;

    /// `None` when shared libraries have no separate import library.
    fn import_lib_extension(&self) -> Option<&str>;

    fn static_lib_prefix(&self) -> &str;

    fn shared_lib_prefix(&self) -> &str;
}

/// The toolchain used for `platform`.
pub fn toolchain_for_platform(platform: Platform) -> Box<dyn Toolchain> {
    match platform {
        Platform::Win64 | Platform::Win32 => Box::new(MsvcToolchain::new(
            PathBuf::from("cl.exe"),
            PathBuf::from("lib.exe"),
            PathBuf::from("link.exe"),
        )),
        Platform::Mac | Platform::IOS => Box::new(GccToolchain::new(
            PathBuf::from("clang"),
            PathBuf::from("clang++"),
            PathBuf::from("ar"),
            ToolchainPlatform::AppleClang,
        )),
        Platform::Linux | Platform::Android => Box::new(GccToolchain::new(
            PathBuf::from("clang"),
            PathBuf::from("clang++"),
            PathBuf::from("llvm-ar"),
            ToolchainPlatform::Clang,
        )),
    }
}

/// Whether a library entry names a file rather than a library to search for.
pub(crate) fn is_library_path(library: &str) -> bool {
    library.contains(['/', '\\'])
        || [".a", ".so", ".lib", ".dylib", ".tbd"]
            .iter()
            .any(|ext| library.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_of() {
        assert_eq!(Language::of(Path::new("Private/zlib.c")), Language::C);
        assert_eq!(Language::of(Path::new("Private/Core.cpp")), Language::Cxx);
        assert_eq!(Language::of(Path::new("Module.Core.1_of_2.cpp")), Language::Cxx);
    }

    #[test]
    fn test_toolchain_for_platform() {
        assert_eq!(toolchain_for_platform(Platform::Win64).platform(), ToolchainPlatform::Msvc);
        assert_eq!(toolchain_for_platform(Platform::Mac).platform(), ToolchainPlatform::AppleClang);
        let linux = toolchain_for_platform(Platform::Linux);
        assert_eq!(linux.shared_lib_extension(), ".so");
        assert_eq!(linux.import_lib_extension(), None);
    }

    #[test]
    fn test_is_library_path() {
        assert!(is_library_path("/ws/ThirdParty/zlib/lib/zlibstatic.lib"));
        assert!(is_library_path("libz.a"));
        assert!(!is_library_path("z"));
        assert!(!is_library_path("pthread"));
    }
}
