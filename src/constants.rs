//! Well-known names used throughout the function.
//!
//! This module contains the annotation keys, meta-document kinds and protocol
//! defaults that are shared between the dispatcher, the side-channel
//! extractors and the function orchestration. Defining them centrally keeps the
//! reserved vocabulary discoverable.

use std::time::Duration;

/// Annotation carrying the readiness of a composed resource.
///
/// Consumed and stripped by the dispatcher; must be one of `True`, `False` or
/// `Unspecified`.
pub const ANNOTATION_KEY_READY: &str = "krm.kcl.dev/ready";

/// Annotation overriding the name a composed resource is tracked under.
///
/// Takes priority over `metadata.name` and never appears in emitted resources.
pub const ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME: &str = "krm.kcl.dev/composition-resource-name";

/// apiVersion shared by every meta-document.
pub const META_API_VERSION: &str = "meta.krm.kcl.dev/v1alpha1";

/// Meta-document kind carrying composite connection details.
pub const KIND_COMPOSITE_CONNECTION_DETAILS: &str = "CompositeConnectionDetails";

/// Meta-document kind carrying conditions.
pub const KIND_CONDITIONS: &str = "Conditions";

/// Meta-document kind carrying events.
pub const KIND_EVENTS: &str = "Events";

/// Meta-document kind carrying a context patch.
pub const KIND_CONTEXT: &str = "Context";

/// Meta-document kind carrying extra-resource requirements.
pub const KIND_EXTRA_RESOURCES: &str = "ExtraResources";

/// Condition types owned by the control plane that a function may not set.
pub const RESERVED_CONDITION_TYPES: &[&str] = &["Ready", "Synced", "Healthy"];

/// apiVersion of the function input document.
pub const INPUT_API_VERSION: &str = "krm.kcl.dev/v1alpha1";

/// Kind of the function input document.
pub const INPUT_KIND: &str = "KCLInput";

/// Environment variable supplying the source used when the input has none.
pub const ENV_DEFAULT_SOURCE: &str = "FUNCTION_KCL_DEFAULT_SOURCE";

/// Default time-to-live attached to every response (60 seconds).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Request credential holding the module registry login.
pub const REGISTRY_CREDENTIALS_NAME: &str = "kcl-registry";
