//! `$(Variable)` expansion for rule-supplied paths.

use std::path::PathBuf;

use crate::resolver::errors::GraphError;

/// Directories a rule path may refer to.
#[derive(Debug, Clone, Default)]
pub struct PathVariables {
    pub engine_dir: PathBuf,
    pub project_dir: Option<PathBuf>,
    pub module_dir: PathBuf,
    pub plugin_dir: Option<PathBuf>,
    pub binary_output_dir: PathBuf,
    pub target_output_dir: PathBuf,
}

impl PathVariables {
    fn lookup(&self, name: &str) -> Option<String> {
        let path = match name {
            "EngineDir" => Some(&self.engine_dir),
            "ProjectDir" => self.project_dir.as_ref(),
            "ModuleDir" => Some(&self.module_dir),
            "PluginDir" => self.plugin_dir.as_ref(),
            "BinaryOutputDir" => Some(&self.binary_output_dir),
            "TargetOutputDir" => Some(&self.target_output_dir),
            _ => None,
        };
        match path {
            Some(p) => Some(p.to_string_lossy().into_owned()),
            None => std::env::var(name).ok(),
        }
    }

    /// Expand every `$(Name)` in `input`.
    ///
    /// Known directory names win over environment variables of the same name.
    /// `module` is only used to label the error.
    pub fn expand(&self, input: &str, module: &str) -> Result<PathBuf, GraphError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find(')') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let name = &after[..end];
            let value = self
                .lookup(name)
                .ok_or_else(|| GraphError::UndefinedPathVariable {
                    variable: name.to_string(),
                    module: module.to_string(),
                    path: input.to_string(),
                })?;
            out.push_str(&value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        Ok(PathBuf::from(out))
    }
}
