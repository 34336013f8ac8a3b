//! Resource model shared by the engine.
//!
//! Everything the function touches is an unstructured Kubernetes object: a
//! JSON mapping with at least `apiVersion` and `kind`. [`Unstructured`] wraps
//! such a mapping, or the absence of one, and offers the accessors the
//! dispatcher and merge engine need. The composite and composed resource types
//! layer the per-resource metadata of the function protocol on top.

pub mod fieldpath;
pub mod identity;

pub use fieldpath::{FieldPath, Segment};
pub use identity::{describe, display_name, resource_name};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::{FunctionError, Result};

/// Name a composed resource is tracked under in the desired state.
pub type ResourceName = String;

/// Desired composed resources keyed by their resolved name.
pub type DesiredResources = BTreeMap<ResourceName, DesiredComposed>;

/// Observed composed resources keyed by their resolved name.
pub type ObservedResources = BTreeMap<ResourceName, ObservedComposed>;

/// Connection details: secret key to raw bytes.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// An unstructured Kubernetes object.
///
/// The wrapped value is either a JSON object or `null`; a `null` wrapper is a
/// *nil* resource, which the merge engine refuses to write into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unstructured(Value);

impl Unstructured {
    /// Wrap an object.
    #[must_use]
    pub fn new(object: Map<String, Value>) -> Self {
        Self(Value::Object(object))
    }

    /// An empty, non-nil object.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Map::new())
    }

    /// A nil resource.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Value::Null)
    }

    /// Wrap an arbitrary value. Anything that is not an object is nil.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => Self(value),
            _ => Self::nil(),
        }
    }

    /// Whether the resource has no backing object.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        !self.0.is_object()
    }

    /// The underlying value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Mutable access to the underlying value.
    pub const fn as_value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Consume the wrapper.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The backing object, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Mutable access to the backing object, if any.
    pub fn as_object_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.0.as_object_mut()
    }

    /// `apiVersion`, or `""` when unset.
    #[must_use]
    pub fn api_version(&self) -> &str {
        self.top_level_str("apiVersion")
    }

    /// `kind`, or `""` when unset.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.top_level_str("kind")
    }

    /// `metadata.name`, or `""` when unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Set `apiVersion`, turning a nil resource into an object.
    pub fn set_api_version(&mut self, api_version: &str) {
        self.insert_top_level("apiVersion", Value::String(api_version.to_string()));
    }

    /// Set `kind`, turning a nil resource into an object.
    pub fn set_kind(&mut self, kind: &str) {
        self.insert_top_level("kind", Value::String(kind.to_string()));
    }

    /// The string value of one `metadata.annotations` entry.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations()?.get(key)?.as_str()
    }

    /// The `metadata.annotations` map, if present.
    #[must_use]
    pub fn annotations(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata")?.get("annotations")?.as_object()
    }

    /// Remove one annotation and return its value.
    ///
    /// The annotations map is left in place even when it becomes empty.
    pub fn remove_annotation(&mut self, key: &str) -> Option<Value> {
        self.0.get_mut("metadata")?.get_mut("annotations")?.as_object_mut()?.remove(key)
    }

    /// Read the value at `path`; nil resources hold nothing.
    pub fn get(&self, path: &FieldPath) -> Result<Option<&Value>> {
        if self.is_nil() {
            return Ok(None);
        }
        path.get(&self.0)
    }

    /// Write `value` at `path`.
    pub fn set(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        if self.is_nil() {
            return Err(FunctionError::NilTargetResource {
                target: "resource",
            });
        }
        path.set(&mut self.0, value)
    }

    fn top_level_str(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn insert_top_level(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            self.0 = Value::Object(map);
        }
    }
}

impl From<Map<String, Value>> for Unstructured {
    fn from(object: Map<String, Value>) -> Self {
        Self::new(object)
    }
}

/// Readiness of a desired composed resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ready {
    /// Let the control plane decide
    #[default]
    #[serde(rename = "READY_UNSPECIFIED")]
    Unspecified,
    /// The resource is ready
    #[serde(rename = "READY_TRUE")]
    True,
    /// The resource is not ready
    #[serde(rename = "READY_FALSE")]
    False,
}

impl FromStr for Ready {
    type Err = FunctionError;

    /// Parse the literal written in the readiness annotation.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "True" => Ok(Self::True),
            "False" => Ok(Self::False),
            "Unspecified" => Ok(Self::Unspecified),
            other => Err(FunctionError::InvalidReadinessValue {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Ready {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// The composite resource, observed or desired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composite {
    /// The composite object
    pub resource: Unstructured,
    /// Connection details of the composite
    pub connection_details: ConnectionDetails,
}

impl Composite {
    /// Wrap a composite object with no connection details.
    #[must_use]
    pub fn new(resource: Unstructured) -> Self {
        Self {
            resource,
            connection_details: ConnectionDetails::new(),
        }
    }
}

/// A composed resource the function wants to exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredComposed {
    /// The composed object
    pub resource: Unstructured,
    /// Readiness reported for the resource
    pub ready: Ready,
}

impl DesiredComposed {
    /// Wrap a composed object with unspecified readiness.
    #[must_use]
    pub fn new(resource: Unstructured) -> Self {
        Self {
            resource,
            ready: Ready::Unspecified,
        }
    }
}

/// A composed resource as it exists in the cluster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedComposed {
    /// The composed object
    pub resource: Unstructured,
    /// Connection details published by the resource
    pub connection_details: ConnectionDetails,
}
