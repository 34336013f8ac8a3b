use function_kcl::core::FunctionError;
use function_kcl::dispatch::{AddResourcesOptions, process_resources};
use function_kcl::document::parse_documents;
use function_kcl::input::Target;
use function_kcl::meta::extract_side_channels;
use function_kcl::resource::{Composite, DesiredComposed, DesiredResources, Ready, Unstructured, resource_name};
use serde_json::{Value, json};

fn oxr() -> Composite {
    Composite::new(Unstructured::from_value(json!({
        "apiVersion": "example.org/v1",
        "kind": "XR",
        "metadata": {"name": "cool-xr"}
    })))
}

fn options(documents: Vec<Value>) -> AddResourcesOptions {
    AddResourcesOptions {
        documents: documents.into_iter().map(Unstructured::from_value).collect(),
        overwrite: true,
    }
}

#[test]
fn test_annotation_wins_over_metadata_name_and_is_stripped() {
    let mut document = Unstructured::from_value(json!({
        "kind": "Bucket",
        "metadata": {
            "name": "bucket",
            "annotations": {"krm.kcl.dev/composition-resource-name": "custom", "keep": "me"}
        }
    }));

    assert_eq!(resource_name(&mut document), "custom");
    assert_eq!(document.annotation("krm.kcl.dev/composition-resource-name"), None);
    assert_eq!(document.annotation("keep"), Some("me"));
    assert_eq!(resource_name(&mut document), "bucket");
}

#[test]
fn test_duplicate_in_default_mode_commits_nothing() {
    let existing: DesiredResources = [(
        "existing".to_string(),
        DesiredComposed::new(Unstructured::from_value(json!({"kind": "Bucket", "metadata": {"name": "existing"}}))),
    )]
    .into_iter()
    .collect();
    let mut desired = existing.clone();
    let mut dxr = oxr();

    let err = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::Default,
        &[],
        options(vec![
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "first"}}),
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "dup"}}),
            json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "dup"}}),
        ]),
    )
    .unwrap_err();

    assert!(matches!(err, FunctionError::DuplicateResourceName { ref name, .. } if name == "dup"), "{err}");
    assert_eq!(desired, existing);
}

#[test]
fn test_duplicate_after_annotation_override() {
    let mut dxr = oxr();
    let mut desired = DesiredResources::new();

    let err = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::Default,
        &[],
        options(vec![
            json!({"kind": "Bucket", "metadata": {"name": "a", "annotations": {"krm.kcl.dev/composition-resource-name": "same"}}}),
            json!({"kind": "Bucket", "metadata": {"name": "same"}}),
        ]),
    )
    .unwrap_err();
    assert!(matches!(err, FunctionError::DuplicateResourceName { .. }));
    assert!(desired.is_empty());
}

#[test]
fn test_resources_mode_later_document_unions_onto_earlier() {
    let mut dxr = oxr();
    let mut desired = DesiredResources::new();

    let result = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::Resources,
        &[],
        options(vec![
            json!({"kind": "Bucket", "metadata": {"name": "a", "annotations": {"krm.kcl.dev/composition-resource-name": "same"}}, "spec": {"a": 1}}),
            json!({"kind": "Bucket", "metadata": {"name": "same"}, "status": {"b": 2}}),
        ]),
    )
    .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(
        desired["same"].resource.as_value(),
        &json!({"kind": "Bucket", "metadata": {"name": "same"}, "spec": {"a": 1}, "status": {"b": 2}})
    );
}

#[test]
fn test_default_mode_example() {
    let stream = "\
apiVersion: example.org/v1
kind: XR
metadata:
  name: cool-xr
status:
  phase: Ready
---
apiVersion: s3.aws.upbound.io/v1beta1
kind: Bucket
metadata:
  name: data
  annotations:
    krm.kcl.dev/ready: \"True\"
spec:
  forProvider:
    region: us-east-1
---
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: CompositeConnectionDetails
data:
  user: YWRtaW4=
";
    let (documents, channels) = extract_side_channels(parse_documents(stream).unwrap()).unwrap();
    let mut dxr = Composite::new(Unstructured::from_value(json!({
        "apiVersion": "example.org/v1",
        "kind": "XR",
        "status": {"observed": 1}
    })));
    let mut desired = DesiredResources::new();

    let result = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::Default,
        &[],
        AddResourcesOptions {
            documents,
            overwrite: true,
        },
    )
    .unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(
        result.messages,
        vec!["created resource \"data:Bucket\"", "updated xr \"cool-xr:XR\""]
    );
    assert_eq!(dxr.resource.as_value()["status"], json!({"observed": 1, "phase": "Ready"}));
    assert_eq!(channels.connection_details.get("user").map(Vec::as_slice), Some(&b"admin"[..]));
    assert!(dxr.connection_details.is_empty());

    let bucket = &desired["data"];
    assert_eq!(bucket.ready, Ready::True);
    assert_eq!(bucket.resource.annotation("krm.kcl.dev/ready"), None);
    assert_eq!(bucket.resource.as_value()["spec"]["forProvider"]["region"], json!("us-east-1"));
}

#[test]
fn test_default_mode_adds_empty_status() {
    let mut dxr = oxr();
    let mut desired = DesiredResources::new();

    let result = process_resources(&mut dxr, &oxr(), &mut desired, Target::Default, &[], options(vec![])).unwrap();

    assert_eq!(result.count, 0);
    assert_eq!(dxr.resource.as_value()["status"], json!({}));
}

#[test]
fn test_patch_desired_requires_every_document_to_match() {
    let mut desired: DesiredResources = [(
        "bucket".to_string(),
        DesiredComposed::new(Unstructured::from_value(json!({"kind": "Bucket", "metadata": {"name": "bucket"}}))),
    )]
    .into_iter()
    .collect();
    let before = desired.clone();
    let mut dxr = oxr();

    let err = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::PatchDesired,
        &[],
        options(vec![
            json!({"metadata": {"name": "bucket"}, "spec": {"size": 1}}),
            json!({"metadata": {"name": "missing"}, "spec": {"size": 2}}),
        ]),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "failed to match all resources, found 1 / 2 patches");
    assert_eq!(desired, before);
}

#[test]
fn test_default_mode_unnamed_resource_is_tracked_under_empty_name() {
    let mut dxr = oxr();
    let mut desired = DesiredResources::new();

    let result = process_resources(
        &mut dxr,
        &oxr(),
        &mut desired,
        Target::Default,
        &[],
        options(vec![
            json!({"apiVersion": "example.org/v1", "kind": "XR", "status": {"ok": true}}),
            json!({"apiVersion": "example.org/v1", "kind": "Generated", "spec": {"n": 1}}),
        ]),
    )
    .unwrap();

    assert_eq!(result.messages, vec!["created resource \":Generated\"", "updated xr \":XR\""]);
    assert_eq!(dxr.resource.as_value()["status"], json!({"ok": true}));
    assert_eq!(desired[""].resource.kind(), "Generated");
    assert_eq!(desired[""].ready, Ready::Unspecified);
}
