//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::builder::environment::PchAction;

use super::{
    ArchiveInput, CommandSpec, CompileInput, Language, LinkInput, LinkMode, Toolchain,
    ToolchainPlatform,
};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to lib.exe (librarian)
    pub lib: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
}

impl MsvcToolchain {
    pub fn new(cl: PathBuf, lib: PathBuf, link: PathBuf) -> Self {
        MsvcToolchain { cl, lib, link }
    }

    fn library_arg(lib: &str) -> String {
        if lib.ends_with(".lib") || lib.contains(['/', '\\']) {
            lib.to_string()
        } else {
            format!("{}.lib", lib)
        }
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compiler_path(&self) -> &Path {
        &self.cl
    }

    fn compile_command(&self, input: &CompileInput<'_>) -> CommandSpec {
        let env = input.environment;
        let flags = input.flags();

        let mut cmd = CommandSpec::new(&self.cl).arg("/nologo").arg("/c");

        cmd = cmd.arg(match input.language {
            Language::C => "/TC",
            Language::Cxx => "/TP",
        });
        cmd = cmd.arg(if flags.optimize { "/O2" } else { "/Od" });
        if input.language == Language::Cxx {
            cmd = cmd.arg(if flags.enable_exceptions { "/EHsc" } else { "/EHs-c-" });
            cmd = cmd.arg(if flags.use_rtti { "/GR" } else { "/GR-" });
        }
        if flags.shadow_variable_warnings {
            cmd = cmd.args(["/we4456", "/we4458", "/we4459"]);
        }
        if flags.undefined_identifier_warnings {
            cmd = cmd.arg("/we4668");
        }

        for dir in env.include_paths.iter().chain(&env.system_include_paths) {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }
        for definition in &env.definitions {
            cmd = cmd.arg(format!("/D{}", definition));
        }

        match input.pch() {
            PchAction::None => {}
            PchAction::Create { header, pch_file } => {
                cmd = cmd
                    .arg(format!("/Yc{}", header.display()))
                    .arg(format!("/Fp{}", pch_file.display()));
            }
            PchAction::Include { header, pch_file } => {
                cmd = cmd
                    .arg(format!("/Yu{}", header.display()))
                    .arg(format!("/Fp{}", pch_file.display()))
                    .arg(format!("/FI{}", header.display()));
            }
        }
        for file in &env.force_include_files {
            cmd = cmd.arg(format!("/FI{}", file.display()));
        }

        // With /Yc the compiler still writes an object file for the wrapper.
        let object = match input.pch() {
            PchAction::Create { pch_file, .. } if pch_file.as_path() == input.output => {
                input.output.with_extension("obj")
            }
            _ => input.output.to_path_buf(),
        };

        cmd.arg(input.source.display().to_string())
            .arg(format!("/Fo{}", object.display()))
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.lib)
            .arg("/nologo")
            .arg(format!("/OUT:{}", input.output.display()));
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }
        cmd
    }

    fn link_command(&self, input: &LinkInput, mode: LinkMode) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.link).arg("/nologo");

        if mode == LinkMode::SharedLib {
            cmd = cmd.arg("/DLL");
            if let Some(implib) = &input.import_library {
                cmd = cmd.arg(format!("/IMPLIB:{}", implib.display()));
            }
        }
        cmd = cmd.arg(format!("/OUT:{}", input.output.display()));
        if input.allow_undefined {
            cmd = cmd.arg("/FORCE:UNRESOLVED");
        }

        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }
        for lib in &input.libs {
            cmd = cmd.arg(Self::library_arg(lib));
        }
        cmd
    }

    fn import_library_command(&self, input: &LinkInput) -> Option<CommandSpec> {
        let implib = input.import_library.as_ref()?;
        let mut cmd = CommandSpec::new(&self.lib)
            .arg("/nologo")
            .arg("/DEF")
            .arg(format!("/NAME:{}", input.output.file_name()?.to_string_lossy()))
            .arg(format!("/OUT:{}", implib.display()));
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }
        Some(cmd)
    }

    fn pch_produces_object(&self) -> bool {
        true
    }

    fn object_extension(&self) -> &str {
        ".obj"
    }

    fn pch_extension(&self) -> &str {
        ".pch"
    }

    fn static_lib_extension(&self) -> &str {
        ".lib"
    }

    fn shared_lib_extension(&self) -> &str {
        ".dll"
    }

    fn exe_extension(&self) -> &str {
        ".exe"
    }

    fn import_lib_extension(&self) -> Option<&str> {
        Some(".lib")
    }

    fn static_lib_prefix(&self) -> &str {
        ""
    }

    fn shared_lib_prefix(&self) -> &str {
        ""
    }
}
