//! Per-environment image tag parameter.

use pipestack_core::resource::SsmParameter;
use pipestack_core::{DeclareResult, Resource, Scope};
use tracing::debug;

/// Initial value: no images deployed yet.
pub const EMPTY_TAGS: &str = "{}";

pub fn image_tag_parameter_name(app_id: &str, environment_name: &str) -> String {
    format!("/{app_id}/{environment_name}/tags")
}

/// Declare the parameter the pipeline records deployed image tags in and
/// return its name.
pub fn image_tag_parameter<S: Scope + ?Sized>(
    scope: &mut S,
    app_id: &str,
    environment_name: &str,
) -> DeclareResult<String> {
    let name = image_tag_parameter_name(app_id, environment_name);
    let parameter = SsmParameter {
        description: Some(format!("Image tags deployed to {environment_name}")),
        ..SsmParameter::string(&name, EMPTY_TAGS)
    };
    scope.declare(&format!("{environment_name}-tag-parameter"), Resource::new(parameter))?;
    debug!(parameter = %name, "image tag parameter declared");
    Ok(name)
}
