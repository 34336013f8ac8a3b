//! Side-channel meta-documents.
//!
//! Rendered output may carry documents with apiVersion
//! `meta.krm.kcl.dev/v1alpha1` that are not resources at all but instructions
//! for the response:
//!
//! | Kind | Effect |
//! |---|---|
//! | `Conditions` | conditions set on the composite (and claim) |
//! | `Events` | results reported as events |
//! | `Context` | keys merged into the pipeline context |
//! | `ExtraResources` | extra resources requested for the next invocation |
//! | `CompositeConnectionDetails` | connection details of the composite |
//!
//! [`extract_side_channels`] pulls every meta-document out of the stream before
//! dispatch, whatever the target mode, so none of them ever becomes a resource.
//! Any other kind under the meta apiVersion is rejected.

pub mod conditions;
pub mod connection;
pub mod context;
pub mod events;
pub mod requirements;

pub use conditions::{ConditionResource, decode_conditions, to_response_conditions};
pub use connection::decode_connection_details;
pub use context::{decode_context, merge_context};
pub use events::{Event, decode_events};
pub use requirements::collect_requirements;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::{
    KIND_COMPOSITE_CONNECTION_DETAILS, KIND_CONDITIONS, KIND_CONTEXT, KIND_EVENTS, KIND_EXTRA_RESOURCES,
    META_API_VERSION,
};
use crate::core::{FunctionError, Result};
use crate::function::message::{ResourceSelector, Target};
use crate::resource::{ConnectionDetails, Unstructured};

/// Objects a condition or event applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum BindingTarget {
    /// Only the composite resource
    #[default]
    Composite,
    /// The composite resource and its claim
    CompositeAndClaim,
}

impl From<BindingTarget> for Target {
    fn from(target: BindingTarget) -> Self {
        match target {
            BindingTarget::Composite => Self::Composite,
            BindingTarget::CompositeAndClaim => Self::CompositeAndClaim,
        }
    }
}

/// Everything extracted from the meta-documents of one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideChannels {
    /// Requested conditions in stream order, duplicates included
    pub conditions: Vec<ConditionResource>,
    /// Events in stream order
    pub events: Vec<Event>,
    /// Merged context patches
    pub context: Map<String, Value>,
    /// Extra-resource selectors by requirement key
    pub requirements: BTreeMap<String, ResourceSelector>,
    /// Decoded connection details of the composite, later keys winning
    pub connection_details: ConnectionDetails,
}

/// Whether a document is a meta-document.
#[must_use]
pub fn is_meta_document(document: &Unstructured) -> bool {
    document.api_version() == META_API_VERSION
}

/// Remove the side-channel documents from a stream.
///
/// Returns the documents left for dispatch, in their original order, and the
/// collected side channels. An invalid meta-document or an unknown meta kind
/// aborts the extraction.
pub fn extract_side_channels(documents: Vec<Unstructured>) -> Result<(Vec<Unstructured>, SideChannels)> {
    let mut remaining = Vec::with_capacity(documents.len());
    let mut channels = SideChannels::default();

    for document in documents {
        if !is_meta_document(&document) {
            remaining.push(document);
            continue;
        }

        match document.kind() {
            KIND_CONDITIONS => channels.conditions.extend(decode_conditions(&document)?),
            KIND_EVENTS => channels.events.extend(decode_events(&document)?),
            KIND_CONTEXT => merge_context(&mut channels.context, decode_context(&document)?),
            KIND_EXTRA_RESOURCES => collect_requirements(&mut channels.requirements, &document)?,
            KIND_COMPOSITE_CONNECTION_DETAILS => {
                channels.connection_details.extend(decode_connection_details(&document)?);
            }
            other => {
                return Err(FunctionError::UnsupportedMetaKind {
                    kind: other.to_string(),
                });
            }
        }
    }

    tracing::debug!(
        conditions = channels.conditions.len(),
        events = channels.events.len(),
        context_keys = channels.context.len(),
        requirements = channels.requirements.len(),
        connection_details = channels.connection_details.len(),
        remaining = remaining.len(),
        "extracted side channels"
    );
    Ok((remaining, channels))
}

/// Decode the body of a meta-document into its schema.
fn decode<T: DeserializeOwned>(document: &Unstructured, kind: &str) -> Result<T> {
    serde_json::from_value(document.as_value().clone()).map_err(|e| FunctionError::InvalidMetaDocument {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}
