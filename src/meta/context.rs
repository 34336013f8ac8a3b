//! `Context` meta-documents.
//!
//! Context patches are merged one level deep: a later document's top-level key
//! replaces an earlier one wholesale, nested maps are not combined.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::constants::KIND_CONTEXT;
use crate::core::Result;
use crate::resource::Unstructured;

use super::decode;

#[derive(Debug, Deserialize)]
struct ContextDocument {
    #[serde(default)]
    data: Map<String, Value>,
}

/// Decode a `Context` document into its `data` map.
pub fn decode_context(document: &Unstructured) -> Result<Map<String, Value>> {
    let decoded: ContextDocument = decode(document, KIND_CONTEXT)?;
    Ok(decoded.data)
}

/// Merge `patch` into `context`, keys of `patch` winning.
pub fn merge_context(context: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        tracing::debug!(key = %key, "updating context");
        context.insert(key, value);
    }
}
