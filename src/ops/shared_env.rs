//! Shared build environment validation.
//!
//! Targets using the shared environment reuse the intermediates of the
//! canonical base target, so they may not change settings that alter how
//! those intermediates are compiled.

use tracing::debug;

use crate::core::target::{BuildEnvironment, TargetRules};
use crate::resolver::errors::GraphError;

/// Check that `target` can share the build environment of `base`.
///
/// Targets with a unique environment, and targets without a base, always
/// pass.
pub fn validate_shared_environment(
    target: &TargetRules,
    base: Option<&TargetRules>,
) -> Result<(), GraphError> {
    let Some(base) = base else {
        return Ok(());
    };
    if target.build_environment != BuildEnvironment::Shared {
        return Ok(());
    }

    let mut differences = Vec::new();
    let mut compare = |field: &str, ours: String, theirs: String| {
        if ours != theirs {
            differences.push((field.to_string(), ours, theirs));
        }
    };
    compare(
        "global_definitions",
        format!("{:?}", target.global_definitions),
        format!("{:?}", base.global_definitions),
    );
    compare(
        "use_rtti",
        target.use_rtti.to_string(),
        base.use_rtti.to_string(),
    );
    compare(
        "enable_exceptions",
        target.enable_exceptions.to_string(),
        base.enable_exceptions.to_string(),
    );
    compare(
        "shadow_variable_warnings",
        target.shadow_variable_warnings.to_string(),
        base.shadow_variable_warnings.to_string(),
    );
    compare(
        "undefined_identifier_warnings",
        target.undefined_identifier_warnings.to_string(),
        base.undefined_identifier_warnings.to_string(),
    );

    if differences.is_empty() {
        debug!("`{}` shares the environment of `{}`", target.name, base.name);
        return Ok(());
    }
    Err(GraphError::IncompatibleSharedBuildEnvironment {
        target: target.name.clone(),
        base_target: base.name.clone(),
        differences,
    })
}
