//! `Events` meta-documents.
//!
//! Every event becomes one result of the response, with `Normal` events
//! reported as `SEVERITY_NORMAL` and `Warning` events as `SEVERITY_WARNING`.

use serde::Deserialize;

use crate::constants::KIND_EVENTS;
use crate::core::{FunctionError, Result};
use crate::function::message::{FunctionResult, Severity};
use crate::resource::Unstructured;

use super::{BindingTarget, decode};

#[derive(Debug, Deserialize)]
struct EventsDocument {
    #[serde(default)]
    events: Vec<CreateEvent>,
}

#[derive(Debug, Deserialize)]
struct CreateEvent {
    #[serde(default)]
    target: Option<BindingTarget>,
    event: EventSpec,
}

#[derive(Debug, Deserialize)]
struct EventSpec {
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    message: String,
}

/// A validated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Objects the event is reported on
    pub target: BindingTarget,
    /// `Normal` or `Warning`
    pub severity: Severity,
    /// Machine-readable reason
    pub reason: Option<String>,
    /// Human-readable message
    pub message: String,
}

/// Decode an `Events` document.
pub fn decode_events(document: &Unstructured) -> Result<Vec<Event>> {
    let decoded: EventsDocument = decode(document, KIND_EVENTS)?;
    decoded
        .events
        .into_iter()
        .map(|create| {
            let severity = match create.event.event_type.as_deref().unwrap_or("Normal") {
                "Normal" => Severity::Normal,
                "Warning" => Severity::Warning,
                other => {
                    return Err(FunctionError::InvalidEventSeverity {
                        value: other.to_string(),
                    });
                }
            };
            Ok(Event {
                target: create.target.unwrap_or_default(),
                severity,
                reason: create.event.reason,
                message: create.event.message,
            })
        })
        .collect()
}

impl From<Event> for FunctionResult {
    fn from(event: Event) -> Self {
        Self {
            severity: event.severity,
            message: event.message,
            reason: event.reason,
            target: Some(event.target.into()),
        }
    }
}
