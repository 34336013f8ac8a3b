//! `ExtraResources` meta-documents.
//!
//! ```yaml
//! apiVersion: meta.krm.kcl.dev/v1alpha1
//! kind: ExtraResources
//! requirements:
//!   cool-extra-resource:
//!     apiVersion: example.org/v1
//!     kind: CoolExtraResource
//!     matchName: cool-extra-resource
//!   all-labelled:
//!     apiVersion: example.org/v1
//!     kind: CoolExtraResource
//!     matchLabels:
//!       key: value
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::constants::KIND_EXTRA_RESOURCES;
use crate::core::{FunctionError, Result};
use crate::function::message::{MatchLabels, ResourceSelector};
use crate::resource::Unstructured;

use super::decode;

#[derive(Debug, Deserialize)]
struct ExtraResourcesDocument {
    #[serde(default)]
    requirements: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Requirement {
    api_version: String,
    kind: String,
    #[serde(default, alias = "name")]
    match_name: Option<String>,
    #[serde(default)]
    match_labels: BTreeMap<String, String>,
    #[serde(default)]
    namespace: Option<String>,
}

impl From<Requirement> for ResourceSelector {
    fn from(requirement: Requirement) -> Self {
        let match_name = requirement.match_name.filter(|name| !name.is_empty());
        let match_labels = match_name.is_none().then(|| MatchLabels {
            labels: requirement.match_labels,
        });
        Self {
            api_version: requirement.api_version,
            kind: requirement.kind,
            match_name,
            match_labels,
            namespace: requirement.namespace.filter(|ns| !ns.is_empty()),
        }
    }
}

/// Decode an `ExtraResources` document and add its selectors to `requirements`.
///
/// A key already present, from this or an earlier document, fails with
/// [`FunctionError::DuplicateRequirementKey`].
pub fn collect_requirements(
    requirements: &mut BTreeMap<String, ResourceSelector>,
    document: &Unstructured,
) -> Result<()> {
    let decoded: ExtraResourcesDocument = decode(document, KIND_EXTRA_RESOURCES)?;

    for (key, value) in decoded.requirements {
        if requirements.contains_key(&key) {
            return Err(FunctionError::DuplicateRequirementKey {
                key,
            });
        }
        let requirement: Requirement =
            serde_json::from_value(value).map_err(|e| FunctionError::InvalidMetaDocument {
                kind: KIND_EXTRA_RESOURCES.to_string(),
                reason: format!("requirement \"{key}\": {e}"),
            })?;
        tracing::debug!(key = %key, kind = %requirement.kind, "requesting extra resources");
        requirements.insert(key, requirement.into());
    }

    Ok(())
}
