//! Structural field paths over unstructured objects.
//!
//! A [`FieldPath`] addresses one value inside a JSON-like tree. It renders in
//! the familiar Kubernetes field-path notation:
//!
//! - `spec.forProvider.region` - dotted object fields
//! - `spec.containers[0].image` - sequence indexes in brackets
//! - `metadata.annotations[example.org/owner]` - bracketed object keys, used
//!   where a key may contain `.` or `/`
//!
//! Paths are built segment by segment by the merge engine, so a bracketed key
//! is never confused with an index even when it looks numeric.

use serde_json::{Map, Value};
use std::fmt;

use crate::core::{FunctionError, Result};

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object field rendered with a dot: `.name`
    Field(String),
    /// Object field rendered in brackets: `[name]`
    Key(String),
    /// Sequence position rendered in brackets: `[3]`
    Index(usize),
}

/// An explicit path from the root of an object to one of its values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// The empty path, addressing the root itself.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Return a new path extended by one segment.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self {
            segments,
        }
    }

    /// Return a new path extended by a dotted field.
    #[must_use]
    pub fn field(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    /// Return a new path extended by a bracketed key.
    #[must_use]
    pub fn key(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Key(name.into()))
    }

    /// Return a new path extended by a sequence index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// The segments of this path, root first.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether this path addresses the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the path ends in `metadata.annotations` or `metadata.labels`.
    ///
    /// Keys below such a map are free-form strings (`example.org/owner`) and
    /// are appended as bracketed keys.
    #[must_use]
    pub fn is_string_map(&self) -> bool {
        match self.segments.as_slice() {
            [.., Segment::Field(parent), Segment::Field(last)] => {
                parent == "metadata" && (last == "annotations" || last == "labels")
            }
            _ => false,
        }
    }

    /// Read the value at this path.
    ///
    /// Returns `Ok(None)` when any step of the path is absent or null, and an
    /// error when the path walks through a value of the wrong shape.
    pub fn get<'a>(&self, root: &'a Value) -> Result<Option<&'a Value>> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (_, Value::Null) => return Ok(None),
                (Segment::Field(name) | Segment::Key(name), Value::Object(map)) => {
                    match map.get(name) {
                        Some(value) => value,
                        None => return Ok(None),
                    }
                }
                (Segment::Index(index), Value::Array(items)) => match items.get(*index) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                (Segment::Index(_), _) => return Err(self.mismatch("an array")),
                (_, _) => return Err(self.mismatch("an object")),
            };
        }
        Ok(Some(current))
    }

    /// Write `value` at this path, creating intermediate objects and sequences.
    ///
    /// Writing past the end of a sequence extends it, filling the gap with
    /// nulls. Null intermediates are replaced; any other scalar in the way is an
    /// error.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        self.set_at(root, 0, value)
    }

    fn set_at(&self, current: &mut Value, depth: usize, value: Value) -> Result<()> {
        let Some(segment) = self.segments.get(depth) else {
            *current = value;
            return Ok(());
        };

        match segment {
            Segment::Field(name) | Segment::Key(name) => {
                if current.is_null() {
                    *current = Value::Object(Map::new());
                }
                let Value::Object(map) = current else {
                    return Err(self.mismatch("an object"));
                };
                let child = map.entry(name.clone()).or_insert(Value::Null);
                self.set_at(child, depth + 1, value)
            }
            Segment::Index(index) => {
                if current.is_null() {
                    *current = Value::Array(Vec::new());
                }
                let Value::Array(items) = current else {
                    return Err(self.mismatch("an array"));
                };
                if items.len() <= *index {
                    items.resize(*index + 1, Value::Null);
                }
                self.set_at(&mut items[*index], depth + 1, value)
            }
        }
    }

    fn mismatch(&self, expected: &'static str) -> FunctionError {
        FunctionError::FieldPathTypeMismatch {
            path: self.to_string(),
            expected,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Key(name) => write!(f, "[{name}]")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
