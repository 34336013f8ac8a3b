//! Splitting and parsing of the rendered document stream.
//!
//! The renderer hands back one text blob holding any number of YAML documents.
//! [`split_documents`] cuts it on separator lines and rejects separators that
//! carry anything but whitespace or a comment; [`parse_documents`] turns every
//! chunk into an [`Unstructured`] object.
//!
//! # Examples
//!
//! ```rust
//! use function_kcl::document::parse_documents;
//!
//! let stream = "kind: A\n--- # second\nkind: B\n";
//! let documents = parse_documents(stream).unwrap();
//! assert_eq!(documents.len(), 2);
//! assert_eq!(documents[1].kind(), "B");
//! ```

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::core::{FunctionError, Result};
use crate::resource::Unstructured;

/// A separator is a whole line starting with `---`, including the first line
/// of the stream.
const SEPARATOR_PATTERN: &str = r"(?:\A|\n)(---.*)(?:\n|\z)";

/// Split a multi-document stream into its document chunks.
///
/// Whitespace and a `#` comment may follow `---` on the separator line;
/// anything else is a [`FunctionError::MalformedSeparator`]. An empty stream
/// yields no chunks. Chunks are returned verbatim and may be empty.
pub fn split_documents(stream: &str) -> Result<Vec<&str>> {
    if stream.is_empty() {
        return Ok(Vec::new());
    }

    let separator = Regex::new(SEPARATOR_PATTERN).map_err(|e| FunctionError::Other {
        message: format!("invalid separator pattern: {e}"),
    })?;

    let mut chunks = Vec::new();
    let mut previous = 0;
    for captures in separator.captures_iter(stream) {
        let (Some(found), Some(line)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let rest = line.as_str()[3..].trim();
        if !rest.is_empty() && !rest.starts_with('#') {
            return Err(FunctionError::MalformedSeparator {
                separator: line.as_str().trim().to_string(),
            });
        }
        chunks.push(&stream[previous..found.start()]);
        previous = found.end();
    }
    chunks.push(&stream[previous..]);

    Ok(chunks)
}

/// Split and parse a rendered stream into objects.
///
/// Empty and null documents are skipped. Every remaining document must be a
/// mapping with string keys.
pub fn parse_documents(stream: &str) -> Result<Vec<Unstructured>> {
    let chunks = split_documents(stream)?;
    let mut documents = Vec::with_capacity(chunks.len());

    for (index, chunk) in chunks.into_iter().enumerate() {
        for document in serde_yaml::Deserializer::from_str(chunk) {
            let value = serde_yaml::Value::deserialize(document).map_err(|e| {
                FunctionError::DocumentParse {
                    index,
                    reason: e.to_string(),
                }
            })?;

            match yaml_to_json(value, index)? {
                Value::Null => {}
                Value::Object(object) => documents.push(Unstructured::new(object)),
                _ => {
                    return Err(FunctionError::NotAMapping {
                        index,
                    });
                }
            }
        }
    }

    tracing::debug!(count = documents.len(), "parsed rendered documents");
    Ok(documents)
}

/// Convert a YAML tree into a JSON tree, keeping mapping order.
fn yaml_to_json(value: serde_yaml::Value, index: usize) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Value::Number(Number::from_f64(f).ok_or_else(|| FunctionError::DocumentParse {
                    index,
                    reason: format!("cannot represent number {n}"),
                })?)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items.into_iter().map(|item| yaml_to_json(item, index)).collect::<Result<_>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let serde_yaml::Value::String(key) = key else {
                    return Err(FunctionError::NonStringKey {
                        index,
                    });
                };
                object.insert(key, yaml_to_json(value, index)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value, index)?,
    })
}
