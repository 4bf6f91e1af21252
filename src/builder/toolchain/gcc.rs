//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::builder::environment::PchAction;

use super::{
    is_library_path, ArchiveInput, CommandSpec, CompileInput, Language, LinkInput, LinkMode,
    Toolchain, ToolchainPlatform,
};

/// GCC/Clang toolchain (Unix-like systems).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
    /// Path to the archiver
    pub ar: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    pub fn new(cc: PathBuf, cxx: PathBuf, ar: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain {
            cc,
            cxx,
            ar,
            family,
        }
    }

    fn is_apple(&self) -> bool {
        self.family == ToolchainPlatform::AppleClang
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self) -> &Path {
        &self.cxx
    }

    fn compile_command(&self, input: &CompileInput<'_>) -> CommandSpec {
        let compiler = match input.language {
            Language::C => &self.cc,
            Language::Cxx => &self.cxx,
        };
        let env = input.environment;
        let flags = input.flags();

        let mut cmd = CommandSpec::new(compiler).arg("-c");

        cmd = cmd.arg(if flags.optimize { "-O2" } else { "-O0" });
        if input.language == Language::Cxx {
            if !flags.enable_exceptions {
                cmd = cmd.arg("-fno-exceptions");
            }
            if !flags.use_rtti {
                cmd = cmd.arg("-fno-rtti");
            }
        }
        if flags.shadow_variable_warnings {
            cmd = cmd.arg("-Wshadow");
        }
        if flags.undefined_identifier_warnings {
            cmd = cmd.arg("-Wundef");
        }
        if env.is_building_dll {
            cmd = cmd.arg("-fPIC");
        }

        for dir in &env.include_paths {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }
        for dir in &env.system_include_paths {
            cmd = cmd.arg("-isystem").arg(dir.display().to_string());
        }
        if self.is_apple() {
            for framework in &env.frameworks {
                cmd = cmd.arg("-framework").arg(framework.clone());
            }
        }
        for definition in &env.definitions {
            cmd = cmd.arg(format!("-D{}", definition));
        }

        match input.pch() {
            PchAction::None => {}
            PchAction::Create { .. } => {
                let header_lang = match input.language {
                    Language::C => "c-header",
                    Language::Cxx => "c++-header",
                };
                cmd = cmd.arg("-x").arg(header_lang);
            }
            // The compiler picks up `<header>.gch` next to the header.
            PchAction::Include { header, .. } => {
                cmd = cmd.arg("-include").arg(header.display().to_string());
            }
        }
        for file in &env.force_include_files {
            cmd = cmd.arg("-include").arg(file.display().to_string());
        }

        cmd.arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    fn archive_command(&self, input: &ArchiveInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(input.output.display().to_string());
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }
        cmd
    }

    fn link_command(&self, input: &LinkInput, mode: LinkMode) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cxx);

        if mode == LinkMode::SharedLib {
            cmd = cmd.arg(if self.is_apple() { "-dynamiclib" } else { "-shared" });
        }

        cmd = cmd.arg("-o").arg(input.output.display().to_string());
        if input.allow_undefined {
            cmd = cmd.arg(if self.is_apple() {
                "-Wl,-undefined,dynamic_lookup"
            } else {
                "-Wl,--allow-shlib-undefined"
            });
        }
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }
        for lib in &input.libs {
            if is_library_path(lib) {
                cmd = cmd.arg(lib.clone());
            } else {
                cmd = cmd.arg(format!("-l{}", lib));
            }
        }
        if self.is_apple() {
            for framework in &input.frameworks {
                cmd = cmd.arg("-framework").arg(framework.clone());
            }
        }
        cmd
    }

    fn import_library_command(&self, _input: &LinkInput) -> Option<CommandSpec> {
        None
    }

    fn pch_produces_object(&self) -> bool {
        false
    }

    fn object_extension(&self) -> &str {
        ".o"
    }

    fn pch_extension(&self) -> &str {
        ".gch"
    }

    fn static_lib_extension(&self) -> &str {
        ".a"
    }

    fn shared_lib_extension(&self) -> &str {
        if self.is_apple() {
            ".dylib"
        } else {
            ".so"
        }
    }

    fn exe_extension(&self) -> &str {
        ""
    }

    fn import_lib_extension(&self) -> Option<&str> {
        None
    }

    fn static_lib_prefix(&self) -> &str {
        "lib"
    }

    fn shared_lib_prefix(&self) -> &str {
        "lib"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::environment::CppCompileEnvironment;
    use crate::core::target::{Platform, TargetRules};

    fn clang() -> GccToolchain {
        GccToolchain::new(
            PathBuf::from("clang"),
            PathBuf::from("clang++"),
            PathBuf::from("llvm-ar"),
            ToolchainPlatform::Clang,
        )
    }

    fn environment() -> CppCompileEnvironment {
        let target = TargetRules {
            platform: Platform::Linux,
            ..TargetRules::default()
        };
        let mut env = CppCompileEnvironment::for_target(&target);
        env.include_paths.insert(PathBuf::from("/ws/Core/Public"));
        env.system_include_paths.insert(PathBuf::from("/ws/ThirdParty/zlib"));
        env.definitions = vec!["CORE_API=".to_string()];
        env
    }

    #[test]
    fn test_compile_command() {
        let env = environment();
        let cmd = clang().compile_command(&CompileInput {
            source: Path::new("/ws/Core/Private/Core.cpp"),
            output: Path::new("/obj/Core.cpp.o"),
            language: Language::Cxx,
            environment: &env,
        });

        assert_eq!(cmd.program, PathBuf::from("clang++"));
        assert!(cmd.args.contains(&"-c".to_string()));
        assert!(cmd.args.contains(&"-O2".to_string()));
        assert!(cmd.args.contains(&"-fno-rtti".to_string()));
        assert!(cmd.args.contains(&"-I/ws/Core/Public".to_string()));
        assert!(cmd.args.contains(&"-DCORE_API=".to_string()));
        assert!(cmd.args.windows(2).any(|w| w == ["-isystem", "/ws/ThirdParty/zlib"]));
        assert_eq!(cmd.args.last().unwrap(), "/obj/Core.cpp.o");
    }

    #[test]
    fn test_pch_create_and_include() {
        let mut env = environment();
        env.pch = PchAction::Create {
            header: PathBuf::from("/int/PCH.Core.h"),
            pch_file: PathBuf::from("/int/PCH.Core.h.gch"),
        };
        let create = clang().compile_command(&CompileInput {
            source: Path::new("/int/PCH.Core.h"),
            output: Path::new("/int/PCH.Core.h.gch"),
            language: Language::Cxx,
            environment: &env,
        });
        assert!(create.args.windows(2).any(|w| w == ["-x", "c++-header"]));

        env.pch = PchAction::Include {
            header: PathBuf::from("/int/PCH.Core.h"),
            pch_file: PathBuf::from("/int/PCH.Core.h.gch"),
        };
        let include = clang().compile_command(&CompileInput {
            source: Path::new("/ws/Core/Private/Core.cpp"),
            output: Path::new("/obj/Core.cpp.o"),
            language: Language::Cxx,
            environment: &env,
        });
        assert!(include.args.windows(2).any(|w| w == ["-include", "/int/PCH.Core.h"]));
    }

    #[test]
    fn test_link_shared() {
        let cmd = clang().link_command(
            &LinkInput {
                objects: vec![PathBuf::from("a.o")],
                output: PathBuf::from("libShooter-Core.so"),
                lib_dirs: vec![PathBuf::from("/ws/zlib/lib")],
                libs: vec!["z".to_string(), "/ws/zlib/lib/libminizip.a".to_string()],
                frameworks: vec![],
                import_library: None,
                allow_undefined: false,
            },
            LinkMode::SharedLib,
        );
        assert_eq!(
            cmd.args,
            vec![
                "-shared",
                "-o",
                "libShooter-Core.so",
                "a.o",
                "-L/ws/zlib/lib",
                "-lz",
                "/ws/zlib/lib/libminizip.a",
            ]
        );
    }

    #[test]
    fn test_archive() {
        let cmd = clang().archive_command(&ArchiveInput {
            objects: vec![PathBuf::from("a.o"), PathBuf::from("b.o")],
            output: PathBuf::from("libCore.a"),
        });
        assert_eq!(cmd.program, PathBuf::from("llvm-ar"));
        assert_eq!(cmd.args, vec!["rcs", "libCore.a", "a.o", "b.o"]);
    }

    #[test]
    fn test_link_allowing_undefined_symbols() {
        let input = LinkInput {
            objects: vec![PathBuf::from("Engine.o")],
            output: PathBuf::from("libShooter-Engine.so"),
            lib_dirs: vec![],
            libs: vec![],
            frameworks: vec![],
            import_library: None,
            allow_undefined: true,
        };
        let cmd = clang().link_command(&input, LinkMode::SharedLib);
        assert!(cmd.args.contains(&"-Wl,--allow-shlib-undefined".to_string()));

        let apple = GccToolchain::new(
            PathBuf::from("clang"),
            PathBuf::from("clang++"),
            PathBuf::from("ar"),
            ToolchainPlatform::AppleClang,
        );
        let cmd = apple.link_command(&input, LinkMode::SharedLib);
        assert!(cmd.args.contains(&"-Wl,-undefined,dynamic_lookup".to_string()));
    }
}
