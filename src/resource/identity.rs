//! Resource identity resolution.

use crate::constants::ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME;

use super::Unstructured;

/// Resolve the name a rendered resource is tracked under and strip the
/// override annotation.
///
/// The `krm.kcl.dev/composition-resource-name` annotation wins over
/// `metadata.name`. The annotation is removed whether or not it held a usable
/// string, so it never reaches the desired state; an emptied annotations map is
/// left in place. A resource with neither resolves to `""`.
pub fn resource_name(resource: &mut Unstructured) -> String {
    let name = match resource.remove_annotation(ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME) {
        Some(serde_json::Value::String(name)) => name,
        _ => resource.name().to_string(),
    };
    tracing::trace!(name = %name, kind = %resource.kind(), "resolved resource name");
    name
}

/// `Kind/metadata.name`, used to tell colliding resources apart.
#[must_use]
pub fn describe(resource: &Unstructured) -> String {
    format!("{}/{}", resource.kind(), resource.name())
}

/// `metadata.name:Kind`, used in dispatch result messages.
#[must_use]
pub fn display_name(resource: &Unstructured) -> String {
    format!("{}:{}", resource.name(), resource.kind())
}
