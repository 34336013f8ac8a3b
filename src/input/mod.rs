//! The function input document.
//!
//! A composition step passes a `KCLInput` to the function:
//!
//! ```yaml
//! apiVersion: krm.kcl.dev/v1alpha1
//! kind: KCLInput
//! metadata:
//!   name: basic
//! spec:
//!   target: Resources
//!   source: |
//!     items = [{apiVersion: "example.org/v1", kind: "Generated"}]
//! ```
//!
//! Missing fields are filled in by [`KclInput::apply_defaults`] and the result
//! is checked by [`KclInput::validate`] before anything is rendered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::constants::{INPUT_API_VERSION, INPUT_KIND};
use crate::core::{FunctionError, Result};
use crate::resource::Unstructured;

/// How rendered documents are applied to the resource graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Merge every document onto the desired composite
    #[serde(rename = "XR")]
    Xr,
    /// Patch existing desired composed resources
    PatchDesired,
    /// Patch the named bases of `spec.resources`
    PatchResources,
    /// Create desired composed resources
    Resources,
    /// Classify each document
    #[default]
    Default,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xr => "XR",
            Self::PatchDesired => "PatchDesired",
            Self::PatchResources => "PatchResources",
            Self::Resources => "Resources",
            Self::Default => "Default",
        };
        f.write_str(name)
    }
}

/// The `KCLInput` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KclInput {
    /// Always `krm.kcl.dev/v1alpha1`
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Always `KCLInput`
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Object metadata; only the name is used
    #[serde(default)]
    pub metadata: InputMetadata,
    /// What to render and where to put it
    #[serde(default)]
    pub spec: RunSpec,
}

/// Metadata of a [`KclInput`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMetadata {
    /// Name of the input, used in logs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// The `spec` of a [`KclInput`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    /// Program source, or an already rendered manifest stream
    #[serde(default)]
    pub source: String,
    /// Target mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Free-form parameters handed to the renderer
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// Module dependencies, one per line
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dependencies: String,
    /// Named bases for the `PatchResources` target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<InputResource>,
    /// Registry credentials handed to the renderer
    #[serde(default, skip_serializing_if = "RegistryCredentials::is_empty")]
    pub credentials: RegistryCredentials,
}

/// A named base resource for the `PatchResources` target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputResource {
    /// Name the base is tracked under
    pub name: String,
    /// The base object patches are applied to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<Value>,
}

impl InputResource {
    /// The base as a resource; nil when omitted.
    #[must_use]
    pub fn base_resource(&self) -> Unstructured {
        self.base.clone().map(Unstructured::from_value).unwrap_or_default()
    }
}

/// Credentials for the module registry.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    /// Registry URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// User name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl RegistryCredentials {
    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.url.is_none() && self.username.is_none() && self.password.is_none()
    }
}

// Keep the password out of logs.
impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn default_api_version() -> String {
    INPUT_API_VERSION.to_string()
}

fn default_kind() -> String {
    INPUT_KIND.to_string()
}

impl Default for KclInput {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: InputMetadata::default(),
            spec: RunSpec::default(),
        }
    }
}

impl KclInput {
    /// Decode an input document; a missing input is an empty one.
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    /// Decode an input document written as YAML or JSON.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The effective target mode.
    #[must_use]
    pub fn target(&self) -> Target {
        self.spec.target.unwrap_or_default()
    }

    /// Fill in the source, target and dependencies.
    ///
    /// `default_source` is used when the input has no source. Non-empty
    /// `base_dependencies` are put in front of the input's own dependencies.
    pub fn apply_defaults(&mut self, default_source: Option<&str>, base_dependencies: Option<&str>) {
        if self.spec.source.is_empty()
            && let Some(source) = default_source
        {
            self.spec.source = source.to_string();
        }
        if self.spec.target.is_none() {
            self.spec.target = Some(Target::Default);
        }
        if let Some(base) = base_dependencies.filter(|deps| !deps.is_empty()) {
            self.spec.dependencies = format!("{base}\n{}", self.spec.dependencies);
        }
    }

    /// Check the input.
    ///
    /// The source must not be empty. The `PatchResources` target needs at
    /// least one resource, and every resource a name and an object base.
    pub fn validate(&self) -> Result<()> {
        if self.spec.source.is_empty() {
            return Err(FunctionError::required("spec.source", "kcl source cannot be empty"));
        }

        if self.target() == Target::PatchResources {
            if self.spec.resources.is_empty() {
                return Err(FunctionError::required(
                    "spec.resources",
                    format!("{} target requires at least one resource", Target::PatchResources),
                ));
            }
            for (i, resource) in self.spec.resources.iter().enumerate() {
                if resource.name.is_empty() {
                    return Err(FunctionError::required(
                        format!("spec.resources[{i}].name"),
                        "name cannot be empty",
                    ));
                }
                match &resource.base {
                    None | Some(Value::Null) => {
                        return Err(FunctionError::required(
                            format!("spec.resources[{i}].base"),
                            "base cannot be empty",
                        ));
                    }
                    Some(Value::Object(_)) => {}
                    Some(_) => {
                        return Err(FunctionError::unsupported(
                            format!("spec.resources[{i}].base"),
                            "base must be an object",
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}
