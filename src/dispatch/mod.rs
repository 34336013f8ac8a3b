//! Target dispatch.
//!
//! [`process_resources`] applies the rendered documents to the resource graph
//! according to the configured [`Target`]:
//!
//! | Target | Effect |
//! |---|---|
//! | `XR` | merge every document onto the desired composite |
//! | `Resources` | insert every document as a desired composed resource |
//! | `PatchDesired` | merge every document onto the existing desired resource of the same name |
//! | `PatchResources` | seed the desired resources from the input bases, then patch like `PatchDesired` |
//! | `Default` | classify each document: composite status, connection details, or a new desired resource |
//!
//! Meta-documents must have been removed with
//! [`extract_side_channels`](crate::meta::extract_side_channels) first; one that
//! reaches the dispatcher is rejected in every mode.
//!
//! Any failure aborts the whole dispatch. The returned [`AddResourcesResult`]
//! carries the sorted human-readable messages and their count.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::constants::ANNOTATION_KEY_READY;
use crate::core::{FunctionError, Result};
use crate::input::{InputResource, Target};
use crate::merge::{MergeTarget, merge_document};
use crate::meta::is_meta_document;
use crate::resource::{
    Composite, DesiredComposed, DesiredResources, FieldPath, Ready, ResourceName, Unstructured,
    describe, display_name, resource_name,
};

/// Where [`add_resources_to`] puts documents.
#[derive(Debug)]
pub enum AddTarget<'a> {
    /// Merge every document onto the desired composite
    Xr(&'a mut Composite),
    /// Insert every document as a desired composed resource, unioned with any
    /// entry of the same name, including one added earlier in the stream
    Desired(&'a mut DesiredResources),
    /// Merge every document onto the existing desired resource it names
    Matched(&'a mut DesiredResources),
}

/// Documents to add and the conflict policy for merges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddResourcesOptions {
    /// Rendered documents, side channels already removed
    pub documents: Vec<Unstructured>,
    /// Whether merges may replace existing values
    pub overwrite: bool,
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddResourcesResult {
    /// The target mode that ran
    pub target: Target,
    /// Number of resources affected
    pub count: usize,
    /// Sorted per-resource messages
    pub messages: Vec<String>,
}

/// Resolved names seen during one dispatch.
///
/// Remembers the `Kind/metadata.name` of the first resource registered under
/// each name so a collision can name both resources.
#[derive(Debug, Default)]
pub struct NameRegistry {
    seen: HashMap<ResourceName, String>,
}

impl NameRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` for `resource`, failing if it was registered before.
    pub fn register(&mut self, name: &str, resource: &Unstructured) -> Result<()> {
        if let Some(first) = self.seen.get(name) {
            return Err(FunctionError::DuplicateResourceName {
                name: name.to_string(),
                first: first.clone(),
                second: describe(resource),
            });
        }
        self.seen.insert(name.to_string(), describe(resource));
        Ok(())
    }
}

/// Apply the documents of `options` to the resource graph according to `target`.
///
/// `bases` seeds the desired resources for [`Target::PatchResources`] and is
/// ignored otherwise.
pub fn process_resources(
    dxr: &mut Composite,
    oxr: &Composite,
    desired: &mut DesiredResources,
    target: Target,
    bases: &[InputResource],
    mut options: AddResourcesOptions,
) -> Result<AddResourcesResult> {
    tracing::debug!(target = %target, documents = options.documents.len(), "dispatching documents");

    if let Some(document) = options.documents.iter().find(|document| is_meta_document(document)) {
        return Err(FunctionError::InvalidMetaDocument {
            kind: document.kind().to_string(),
            reason: "meta-documents are never dispatched as resources".to_string(),
        });
    }

    let (count, mut messages) = match target {
        Target::Xr => {
            add_resources_to(AddTarget::Xr(&mut *dxr), &mut options)?;
            (1, vec![format!("updated xr \"{}\"", display_name(&dxr.resource))])
        }
        Target::PatchDesired => {
            add_resources_to(AddTarget::Matched(desired), &mut options)?;
            let messages = resource_messages("updated", &options.documents);
            (messages.len(), messages)
        }
        Target::PatchResources => {
            for base in bases {
                desired.insert(base.name.clone(), DesiredComposed::new(base.base_resource()));
            }
            add_resources_to(AddTarget::Matched(desired), &mut options)?;
            let messages = resource_messages("created", &options.documents);
            (messages.len(), messages)
        }
        Target::Resources => {
            add_resources_to(AddTarget::Desired(desired), &mut options)?;
            let messages = resource_messages("created", &options.documents);
            (messages.len(), messages)
        }
        Target::Default => {
            let messages = apply_default(dxr, oxr, desired, options.documents)?;
            (messages.len(), messages)
        }
    };

    messages.sort();
    Ok(AddResourcesResult {
        target,
        count,
        messages,
    })
}

/// Add documents to one target.
///
/// Documents are updated in place: the composition-resource-name annotation is
/// stripped from every document whose name is resolved.
pub fn add_resources_to(target: AddTarget<'_>, options: &mut AddResourcesOptions) -> Result<()> {
    match target {
        AddTarget::Xr(composite) => {
            for document in &options.documents {
                merge_document(
                    MergeTarget::Composite(&mut *composite),
                    document.as_value(),
                    options.overwrite,
                )?;
            }
        }
        AddTarget::Desired(desired) => {
            for document in &mut options.documents {
                let name = resource_name(document);
                let resource = match desired.get(&name) {
                    Some(existing) => union(&existing.resource, document),
                    None => document.clone(),
                };
                tracing::debug!(name = %name, "setting desired resource");
                desired.insert(name, DesiredComposed::new(resource));
            }
        }
        AddTarget::Matched(desired) => {
            let names = match_resources(desired, &mut options.documents)?;
            for (name, document) in names.iter().zip(&options.documents) {
                if let Some(composed) = desired.get_mut(name) {
                    tracing::debug!(name = %name, "patching desired resource");
                    merge_document(
                        MergeTarget::Composed(composed),
                        document.as_value(),
                        options.overwrite,
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Resolve every document to an existing desired resource.
///
/// Returns the resolved names in document order, or
/// [`FunctionError::UnmatchedPatchTarget`] unless every document matched.
pub fn match_resources(
    desired: &DesiredResources,
    documents: &mut [Unstructured],
) -> Result<Vec<ResourceName>> {
    let names: Vec<ResourceName> = documents.iter_mut().map(resource_name).collect();
    let matched = names.iter().filter(|name| desired.contains_key(*name)).count();

    if matched != documents.len() {
        return Err(FunctionError::UnmatchedPatchTarget {
            matched,
            total: documents.len(),
        });
    }
    Ok(names)
}

/// Top-level union of two objects; keys of `update` replace those of `existing`.
fn union(existing: &Unstructured, update: &Unstructured) -> Unstructured {
    let mut merged = existing.as_object().cloned().unwrap_or_default();
    if let Some(object) = update.as_object() {
        for (key, value) in object {
            merged.insert(key.clone(), value.clone());
        }
    }
    Unstructured::new(merged)
}

fn resource_messages(verb: &str, documents: &[Unstructured]) -> Vec<String> {
    documents
        .iter()
        .map(|document| format!("{verb} resource \"{}\"", display_name(document)))
        .collect()
}

/// Classify and apply every document in `Default` mode.
///
/// New desired resources are only inserted once the whole stream has been
/// processed without error.
fn apply_default(
    dxr: &mut Composite,
    oxr: &Composite,
    desired: &mut DesiredResources,
    documents: Vec<Unstructured>,
) -> Result<Vec<String>> {
    let mut registry = NameRegistry::new();
    let mut staged: Vec<(ResourceName, DesiredComposed)> = Vec::new();
    let mut messages = Vec::new();

    for mut document in documents {
        if document.api_version() == oxr.resource.api_version()
            && document.kind() == oxr.resource.kind()
        {
            patch_status(dxr, &document)?;
            messages.push(format!("updated xr \"{}\"", display_name(&document)));
            continue;
        }

        let ready = take_readiness(&mut document)?;
        let name = resource_name(&mut document);
        registry.register(&name, &document)?;

        messages.push(format!("created resource \"{}\"", display_name(&document)));
        staged.push((
            name,
            DesiredComposed {
                resource: document,
                ready,
            },
        ));
    }

    for (name, composed) in staged {
        tracing::debug!(name = %name, ready = %composed.ready, "setting desired resource");
        desired.insert(name, composed);
    }

    if let Some(object) = dxr.resource.as_object_mut()
        && !object.get("status").is_some_and(Value::is_object)
    {
        object.insert("status".to_string(), Value::Object(Map::new()));
    }

    Ok(messages)
}

/// Deep-merge the `status` of a composite-typed document onto the desired
/// composite, values of the document winning.
fn patch_status(dxr: &mut Composite, document: &Unstructured) -> Result<()> {
    let path = FieldPath::root().field("status");
    let incoming = match document.get(&path)? {
        Some(Value::Object(status)) => status.clone(),
        Some(_) => {
            return Err(FunctionError::FieldPathTypeMismatch {
                path: path.to_string(),
                expected: "an object",
            });
        }
        None => Map::new(),
    };

    let current = match dxr.resource.get(&path)? {
        Some(status) => status.clone(),
        None => Value::Object(Map::new()),
    };

    let merged = deep_merge_json(current, &Value::Object(incoming));
    if dxr.resource.is_nil() {
        return Err(FunctionError::NilTargetResource {
            target: "XR",
        });
    }
    dxr.resource.set(&path, merged)
}

/// Recursively merge `overrides` into `base`; objects merge key by key,
/// everything else is replaced.
fn deep_merge_json(mut base: Value, overrides: &Value) -> Value {
    match (base.as_object_mut(), overrides.as_object()) {
        (Some(base_obj), Some(override_obj)) => {
            for (key, override_value) in override_obj {
                match base_obj.get_mut(key) {
                    Some(base_value) if base_value.is_object() && override_value.is_object() => {
                        let merged = deep_merge_json(base_value.take(), override_value);
                        *base_value = merged;
                    }
                    _ => {
                        base_obj.insert(key.clone(), override_value.clone());
                    }
                }
            }
            base
        }
        (_, _) => overrides.clone(),
    }
}

/// Read and strip the readiness annotation.
fn take_readiness(document: &mut Unstructured) -> Result<Ready> {
    match document.remove_annotation(ANNOTATION_KEY_READY) {
        None => Ok(Ready::Unspecified),
        Some(Value::String(value)) => value.parse(),
        Some(other) => Err(FunctionError::InvalidReadinessValue {
            value: other.to_string(),
        }),
    }
}
