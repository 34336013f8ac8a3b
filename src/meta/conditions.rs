//! `Conditions` meta-documents.
//!
//! ```yaml
//! apiVersion: meta.krm.kcl.dev/v1alpha1
//! kind: Conditions
//! conditions:
//!   - target: CompositeAndClaim
//!     force: false
//!     condition:
//!       type: DatabaseReady
//!       status: "True"
//!       reason: Available
//!       message: the database is up
//! ```

use serde::Deserialize;
use std::collections::HashSet;

use crate::constants::{KIND_CONDITIONS, RESERVED_CONDITION_TYPES};
use crate::core::{FunctionError, Result};
use crate::function::message::{Condition, ConditionStatus};
use crate::resource::Unstructured;

use super::{BindingTarget, decode};

#[derive(Debug, Deserialize)]
struct ConditionsDocument {
    #[serde(default)]
    conditions: Vec<ConditionResource>,
}

/// One requested condition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConditionResource {
    /// Objects to set the condition on; the composite when unset
    #[serde(default)]
    pub target: Option<BindingTarget>,
    /// Set the condition even when one of the same type was already set
    #[serde(default)]
    pub force: Option<bool>,
    /// The condition itself
    pub condition: ConditionSpec,
}

/// Fields of a requested condition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConditionSpec {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: String,
    /// `True`, `False`; anything else is reported as unknown
    #[serde(default)]
    pub status: String,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Decode a `Conditions` document, rejecting reserved condition types.
pub fn decode_conditions(document: &Unstructured) -> Result<Vec<ConditionResource>> {
    let decoded: ConditionsDocument = decode(document, KIND_CONDITIONS)?;
    for resource in &decoded.conditions {
        let condition_type = &resource.condition.condition_type;
        if RESERVED_CONDITION_TYPES.contains(&condition_type.as_str()) {
            return Err(FunctionError::ReservedConditionType {
                condition_type: condition_type.clone(),
            });
        }
    }
    Ok(decoded.conditions)
}

/// Turn requested conditions into response conditions.
///
/// The first condition of each type wins; later ones of the same type are
/// skipped unless forced, in which case they are appended as well.
#[must_use]
pub fn to_response_conditions(requested: &[ConditionResource]) -> Vec<Condition> {
    let mut set = HashSet::new();
    let mut conditions = Vec::with_capacity(requested.len());

    for resource in requested {
        let condition_type = resource.condition.condition_type.as_str();
        if set.contains(condition_type) && !resource.force.unwrap_or(false) {
            tracing::warn!(
                condition_type,
                "skipping condition: already set and not forced"
            );
            continue;
        }
        tracing::debug!(condition_type, "setting condition");

        conditions.push(Condition {
            condition_type: condition_type.to_string(),
            status: match resource.condition.status.as_str() {
                "True" => ConditionStatus::True,
                "False" => ConditionStatus::False,
                _ => ConditionStatus::Unknown,
            },
            reason: resource.condition.reason.clone(),
            message: resource.condition.message.clone(),
            target: Some(resource.target.unwrap_or_default().into()),
        });
        set.insert(condition_type);
    }

    conditions
}
