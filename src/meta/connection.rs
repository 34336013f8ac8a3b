//! `CompositeConnectionDetails` meta-documents.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::constants::KIND_COMPOSITE_CONNECTION_DETAILS;
use crate::core::{FunctionError, Result};
use crate::resource::{ConnectionDetails, Unstructured};

use super::decode;

#[derive(Debug, Deserialize)]
struct ConnectionDetailsDocument {
    #[serde(default)]
    data: Map<String, Value>,
}

/// Decode the base64 `data` of a `CompositeConnectionDetails` document.
///
/// A missing `data` decodes to no details; every value must be a base64
/// string.
pub fn decode_connection_details(document: &Unstructured) -> Result<ConnectionDetails> {
    let decoded: ConnectionDetailsDocument = decode(document, KIND_COMPOSITE_CONNECTION_DETAILS)?;

    let mut details = ConnectionDetails::new();
    for (key, value) in decoded.data {
        let encoded = value.as_str().ok_or_else(|| FunctionError::InvalidConnectionDetail {
            key: key.clone(),
            reason: "value is not a string".to_string(),
        })?;
        let bytes = STANDARD.decode(encoded).map_err(|e| FunctionError::InvalidConnectionDetail {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        details.insert(key, bytes);
    }
    Ok(details)
}
