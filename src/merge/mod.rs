//! Path-merge engine.
//!
//! Projects a rendered document onto a target object leaf by leaf. The source
//! tree is walked recursively while an explicit [`FieldPath`] is carried down;
//! at every scalar leaf the current target value is read and, subject to the
//! overwrite policy, replaced. Intermediate objects and sequences are created
//! on the target as needed.
//!
//! Two target kinds exist and each has its own rules:
//!
//! - [`MergeTarget::Composite`]: every leaf is written.
//! - [`MergeTarget::Composed`]: `apiVersion`, `kind` and `metadata.name` are
//!   never written, so a patch cannot change which resource it addresses.
//!
//! Keys directly below `metadata.annotations` or `metadata.labels` are appended
//! as bracketed keys (`metadata.annotations[example.org/owner]`) so that dots
//! and slashes inside them stay part of one segment.
//!
//! A failure aborts the current document; leaves already written stay written.

use serde_json::Value;

use crate::core::{FunctionError, Result};
use crate::resource::{Composite, DesiredComposed, FieldPath, Segment, Unstructured};

/// The object a document is merged onto.
#[derive(Debug)]
pub enum MergeTarget<'a> {
    /// The desired composite resource
    Composite(&'a mut Composite),
    /// A desired composed resource
    Composed(&'a mut DesiredComposed),
}

impl MergeTarget<'_> {
    fn resource_mut(&mut self) -> &mut Unstructured {
        match self {
            Self::Composite(composite) => &mut composite.resource,
            Self::Composed(composed) => &mut composed.resource,
        }
    }

    const fn nil_name(&self) -> &'static str {
        match self {
            Self::Composite(_) => "XR",
            Self::Composed(_) => "DesiredComposed resource",
        }
    }

    fn is_protected(&self, path: &FieldPath) -> bool {
        match self {
            Self::Composite(_) => false,
            Self::Composed(_) => is_identity_field(path),
        }
    }
}

/// Leaves touched by one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Paths written on the target, in walk order
    pub written: Vec<FieldPath>,
    /// Protected paths that were skipped
    pub skipped: Vec<FieldPath>,
}

impl MergeStats {
    /// Rendered paths of every written leaf.
    #[must_use]
    pub fn written_paths(&self) -> Vec<String> {
        self.written.iter().map(ToString::to_string).collect()
    }
}

/// Merge one document onto a target.
///
/// With `overwrite` disabled, a leaf that already holds a non-null value fails
/// with [`FunctionError::ConflictingValue`]; equal values conflict too. A nil
/// target fails with [`FunctionError::NilTargetResource`] as soon as the first
/// writable leaf is reached.
pub fn merge_document(
    mut target: MergeTarget<'_>,
    document: &Value,
    overwrite: bool,
) -> Result<MergeStats> {
    let mut merger = Merger {
        target: &mut target,
        overwrite,
        stats: MergeStats::default(),
    };
    merger.walk(document, &FieldPath::root())?;
    Ok(merger.stats)
}

struct Merger<'t, 'a> {
    target: &'t mut MergeTarget<'a>,
    overwrite: bool,
    stats: MergeStats,
}

impl Merger<'_, '_> {
    fn walk(&mut self, value: &Value, path: &FieldPath) -> Result<()> {
        match value {
            Value::Object(map) => {
                let bracketed = path.is_string_map();
                for (key, child) in map {
                    let child_path = if bracketed {
                        path.key(key.as_str())
                    } else {
                        path.field(key.as_str())
                    };
                    self.walk(child, &child_path)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.walk(child, &path.index(index))?;
                }
                Ok(())
            }
            leaf => self.write(path, leaf),
        }
    }

    fn write(&mut self, path: &FieldPath, incoming: &Value) -> Result<()> {
        if self.target.is_protected(path) {
            tracing::trace!(path = %path, "skipping protected field");
            self.stats.skipped.push(path.clone());
            return Ok(());
        }

        let nil_name = self.target.nil_name();
        let resource = self.target.resource_mut();
        if resource.is_nil() {
            return Err(FunctionError::NilTargetResource {
                target: nil_name,
            });
        }

        if !self.overwrite
            && let Some(existing) = resource.get(path)?.filter(|v| !v.is_null())
        {
            return Err(FunctionError::ConflictingValue {
                path: path.to_string(),
                existing: existing.clone(),
                incoming: incoming.clone(),
            });
        }

        tracing::trace!(path = %path, "writing field");
        resource.set(path, incoming.clone())?;
        self.stats.written.push(path.clone());
        Ok(())
    }
}

/// `apiVersion`, `kind` or `metadata.name`.
fn is_identity_field(path: &FieldPath) -> bool {
    match path.segments() {
        [Segment::Field(name)] => name == "apiVersion" || name == "kind",
        [Segment::Field(parent), Segment::Field(name)] => parent == "metadata" && name == "name",
        _ => false,
    }
}
