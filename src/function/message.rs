//! Request and response messages of the composition-function protocol.
//!
//! These are serde mirrors of the protocol's JSON mapping: camelCase field
//! names, enum values spelled like `SEVERITY_FATAL`, byte maps as base64
//! strings and durations as `"60s"`. Fields the protocol treats as optional
//! are omitted when empty so a response round-trips to the canonical JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::resource::{
    Composite, ConnectionDetails, DesiredComposed, DesiredResources, ObservedComposed,
    ObservedResources, Ready, Unstructured,
};

/// A request to run the function once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionRequest {
    /// Request metadata
    #[serde(default)]
    pub meta: RequestMeta,
    /// The function input document, usually a `KCLInput`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// State observed in the cluster
    #[serde(default)]
    pub observed: State,
    /// State desired by earlier functions of the pipeline
    #[serde(default)]
    pub desired: State,
    /// Pipeline context shared between functions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Extra resources fetched for earlier requirements, by requirement key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_resources: BTreeMap<String, Resources>,
    /// Credentials supplied to the function, by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, Credentials>,
}

/// Request metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Opaque tag identifying the request; echoed in the response
    #[serde(default)]
    pub tag: String,
}

/// Composite and composed resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// The composite resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Resource>,
    /// Composed resources by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, Resource>,
}

/// One resource of a [`State`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// The object itself
    #[serde(default)]
    pub resource: Unstructured,
    /// Connection details, base64 encoded on the wire
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", with = "base64_map")]
    pub connection_details: ConnectionDetails,
    /// Readiness of a desired composed resource
    #[serde(default, skip_serializing_if = "is_unspecified")]
    pub ready: Ready,
}

/// A list of resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// The resources
    #[serde(default)]
    pub items: Vec<Resource>,
}

/// A named credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Credential payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_data: Option<CredentialData>,
}

/// Key/value credential payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    /// Raw credential values, base64 encoded on the wire
    #[serde(default, with = "base64_map")]
    pub data: BTreeMap<String, Vec<u8>>,
}

/// The result of running the function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFunctionResponse {
    /// Response metadata
    #[serde(default)]
    pub meta: ResponseMeta,
    /// Desired state after this function
    #[serde(default)]
    pub desired: State,
    /// Results: events and fatal errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<FunctionResult>,
    /// Conditions to set on the composite and claim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Pipeline context passed to the next function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Resources the function needs on its next invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Requirements>,
}

/// Response metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Tag of the request this responds to
    #[serde(default)]
    pub tag: String,
    /// How long the response may be cached
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_seconds")]
    pub ttl: Option<Duration>,
}

/// Resources requested for the next invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    /// Selectors by requirement key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_resources: BTreeMap<String, ResourceSelector>,
}

/// Selects extra resources by name or by labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    /// apiVersion of the selected resources
    pub api_version: String,
    /// Kind of the selected resources
    pub kind: String,
    /// Select exactly one resource by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_name: Option<String>,
    /// Select every resource carrying these labels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<MatchLabels>,
    /// Namespace of namespaced resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLabels {
    /// Labels every selected resource must carry
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A result reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResult {
    /// Severity; `SEVERITY_FATAL` aborts the pipeline
    pub severity: Severity,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Which objects the result is reported on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

/// Severity of a [`FunctionResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    #[serde(rename = "SEVERITY_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "SEVERITY_FATAL")]
    Fatal,
    #[serde(rename = "SEVERITY_WARNING")]
    Warning,
    #[serde(rename = "SEVERITY_NORMAL")]
    Normal,
}

/// Objects a result or condition is reported on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    #[default]
    #[serde(rename = "TARGET_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "TARGET_COMPOSITE")]
    Composite,
    #[serde(rename = "TARGET_COMPOSITE_AND_CLAIM")]
    CompositeAndClaim,
}

/// A condition to set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Condition status
    pub status: ConditionStatus,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Which objects the condition is set on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

/// Status of a [`Condition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    #[default]
    #[serde(rename = "STATUS_CONDITION_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "STATUS_CONDITION_UNKNOWN")]
    Unknown,
    #[serde(rename = "STATUS_CONDITION_TRUE")]
    True,
    #[serde(rename = "STATUS_CONDITION_FALSE")]
    False,
}

impl RunFunctionRequest {
    /// The observed composite, or an empty one.
    #[must_use]
    pub fn observed_composite(&self) -> Composite {
        self.observed.composite.clone().map(Resource::into_composite).unwrap_or_default()
    }

    /// The desired composite, or an empty object when no earlier function
    /// produced one.
    #[must_use]
    pub fn desired_composite(&self) -> Composite {
        self.desired
            .composite
            .clone()
            .map(Resource::into_composite)
            .unwrap_or_else(|| Composite::new(Unstructured::empty()))
    }

    /// Desired composed resources by name.
    #[must_use]
    pub fn desired_composed(&self) -> DesiredResources {
        self.desired
            .resources
            .iter()
            .map(|(name, resource)| (name.clone(), resource.clone().into_desired_composed()))
            .collect()
    }

    /// Observed composed resources by name.
    #[must_use]
    pub fn observed_composed(&self) -> ObservedResources {
        self.observed
            .resources
            .iter()
            .map(|(name, resource)| {
                let resource = resource.clone();
                (
                    name.clone(),
                    ObservedComposed {
                        resource: resource.resource,
                        connection_details: resource.connection_details,
                    },
                )
            })
            .collect()
    }

    /// The raw data of a named credential.
    #[must_use]
    pub fn credential_data(&self, name: &str) -> Option<&BTreeMap<String, Vec<u8>>> {
        self.credentials.get(name)?.credential_data.as_ref().map(|data| &data.data)
    }
}

impl RunFunctionResponse {
    /// Start a response to `request`: the tag, desired state and context are
    /// copied, the TTL is set.
    #[must_use]
    pub fn to(request: &RunFunctionRequest, ttl: Duration) -> Self {
        Self {
            meta: ResponseMeta {
                tag: request.meta.tag.clone(),
                ttl: Some(ttl),
            },
            desired: request.desired.clone(),
            context: request.context.clone(),
            ..Self::default()
        }
    }

    /// Report a fatal result on the composite.
    pub fn fatal(&mut self, message: impl Into<String>) {
        self.results.push(FunctionResult {
            severity: Severity::Fatal,
            message: message.into(),
            reason: None,
            target: Some(Target::Composite),
        });
    }

    /// Whether a fatal result has been reported.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.results.iter().any(|r| r.severity == Severity::Fatal)
    }

    /// Set the desired composite, connection details included.
    pub fn set_desired_composite(&mut self, composite: &Composite) {
        self.desired.composite = Some(Resource {
            resource: composite.resource.clone(),
            connection_details: composite.connection_details.clone(),
            ready: Ready::Unspecified,
        });
    }

    /// Set every desired composed resource, replacing entries of the same name.
    pub fn set_desired_composed(&mut self, resources: &DesiredResources) {
        for (name, composed) in resources {
            self.desired.resources.insert(
                name.clone(),
                Resource {
                    resource: composed.resource.clone(),
                    connection_details: ConnectionDetails::new(),
                    ready: composed.ready,
                },
            );
        }
    }
}

impl Resource {
    /// Wrap an object with no connection details and unspecified readiness.
    #[must_use]
    pub fn new(resource: Unstructured) -> Self {
        Self {
            resource,
            ..Self::default()
        }
    }

    fn into_composite(self) -> Composite {
        Composite {
            resource: self.resource,
            connection_details: self.connection_details,
        }
    }

    fn into_desired_composed(self) -> DesiredComposed {
        DesiredComposed {
            resource: self.resource,
            ready: self.ready,
        }
    }
}

fn is_unspecified(ready: &Ready) -> bool {
    *ready == Ready::Unspecified
}

/// Byte maps encoded as base64 strings.
mod base64_map {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(map.iter().map(|(k, v)| (k, STANDARD.encode(v))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                STANDARD
                    .decode(v.as_bytes())
                    .map(|bytes| (k.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("invalid base64 in \"{k}\": {e}")))
            })
            .collect()
    }
}

/// Durations in the protocol's `"<seconds>s"` notation.
mod duration_seconds {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) if d.subsec_nanos() == 0 => serializer.serialize_str(&format!("{}s", d.as_secs())),
            Some(d) => serializer.serialize_str(&format!("{}s", d.as_secs_f64())),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let seconds = raw
            .strip_suffix('s')
            .ok_or_else(|| D::Error::custom(format!("invalid duration \"{raw}\": missing 's' suffix")))?;
        let seconds: f64 = seconds
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid duration \"{raw}\": {e}")))?;
        Duration::try_from_secs_f64(seconds)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid duration \"{raw}\": {e}")))
    }
}
