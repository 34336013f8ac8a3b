//! End-to-end runs of the function on in-memory requests.
//!
//! Sources are written as already rendered YAML streams and evaluated by the
//! passthrough renderer unless a test supplies its own renderer.

use function_kcl::config::FunctionConfig;
use function_kcl::function::message::{
    RunFunctionRequest, RunFunctionResponse, Severity, Target,
};
use function_kcl::function::{Function, PassthroughRenderer, RenderRequest};
use function_kcl::resource::Ready;
use function_kcl::test_utils::{RequestBuilder, init_test_logging, observed_xr};
use serde_json::{Value, json};

const CD: &str = r#"{"apiVersion":"example.org/v1","kind":"CD","metadata":{"annotations":{"krm.kcl.dev/composition-resource-name":"cool-cd"},"name":"cool-cd"}}"#;

fn cd() -> Value {
    serde_json::from_str(CD).unwrap()
}

fn run(request: &RunFunctionRequest) -> RunFunctionResponse {
    init_test_logging(None);
    Function::new(FunctionConfig::default(), PassthroughRenderer).run_function(request)
}

fn composite(response: &RunFunctionResponse) -> Value {
    response.desired.composite.as_ref().map(|c| c.resource.as_value().clone()).unwrap_or(Value::Null)
}

fn resource(response: &RunFunctionResponse, name: &str) -> Value {
    response.desired.resources[name].resource.as_value().clone()
}

fn fatal_message(response: &RunFunctionResponse) -> &str {
    assert_eq!(response.results.len(), 1, "expected exactly one result: {:?}", response.results);
    assert_eq!(response.results[0].severity, Severity::Fatal);
    assert_eq!(response.results[0].target, Some(Target::Composite));
    &response.results[0].message
}

#[test]
fn test_response_is_returned() {
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .input("Resources", "apiVersion: example.org/v1\nkind: Generated\n")
        .build();

    let response = run(&request);

    assert!(response.results.is_empty(), "{:?}", response.results);
    assert_eq!(response.meta.tag, "hello");
    assert_eq!(response.meta.ttl, Some(std::time::Duration::from_secs(60)));
    assert_eq!(composite(&response), json!({"apiVersion": "example.org/v1", "kind": "XR"}));
    assert_eq!(resource(&response, ""), json!({"apiVersion": "example.org/v1", "kind": "Generated"}));
}

#[test]
fn test_nested_values_survive() {
    let source = r#"
apiVersion: sql.gcp.upbound.io/v1beta1
kind: DatabaseInstance
spec:
  forProvider:
    project: test-project
    settings:
      - databaseFlags:
          - name: log_checkpoints
            value: "on"
"#;
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .input("Default", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        resource(&response, ""),
        json!({
            "apiVersion": "sql.gcp.upbound.io/v1beta1",
            "kind": "DatabaseInstance",
            "spec": {"forProvider": {"project": "test-project", "settings": [{"databaseFlags": [{"name": "log_checkpoints", "value": "on"}]}]}}
        })
    );
}

#[test]
fn test_custom_composition_resource_name() {
    let source = r#"
apiVersion: example.org/v1
kind: Generated
metadata:
  annotations:
    krm.kcl.dev/composition-resource-name: custom-composition-resource-name
"#;
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .input("Default", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        composite(&response),
        json!({"apiVersion": "example.org/v1", "kind": "XR", "status": {}})
    );
    assert_eq!(response.desired.resources.len(), 1);
    assert_eq!(
        resource(&response, "custom-composition-resource-name"),
        json!({"apiVersion": "example.org/v1", "kind": "Generated", "metadata": {"annotations": {}}})
    );
}

#[test]
fn test_multiple_resources() {
    let source = r#"
apiVersion: example.org/v1
kind: Generated
metadata:
  annotations:
    krm.kcl.dev/composition-resource-name: custom-composition-resource-name-0
---
apiVersion: example.org/v1
kind: Generated
metadata:
  annotations:
    krm.kcl.dev/composition-resource-name: custom-composition-resource-name-1
"#;
    let request = RequestBuilder::new().input("Default", source).build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    let names: Vec<_> = response.desired.resources.keys().cloned().collect();
    assert_eq!(
        names,
        vec!["custom-composition-resource-name-0", "custom-composition-resource-name-1"]
    );
}

#[test]
fn test_extra_resource_requirements() {
    let source = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: ExtraResources
requirements:
  cool-extra-resource:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchName: cool-extra-resource
---
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: ExtraResources
requirements:
  another-cool-extra-resource:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchLabels:
      key: value
  yet-another-cool-extra-resource:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchName: foo
---
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: ExtraResources
requirements:
  all-cool-resources:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchLabels: {}
"#;
    let request = RequestBuilder::new()
        .observed_composite(observed_xr())
        .desired_composite(observed_xr())
        .desired_resource("cool-cd", cd())
        .input("Default", source)
        .build();

    let response = run(&request);

    assert!(response.results.is_empty(), "{:?}", response.results);
    assert_eq!(
        serde_json::to_value(response.requirements.as_ref().unwrap()).unwrap(),
        json!({
            "extraResources": {
                "cool-extra-resource": {
                    "apiVersion": "example.org/v1",
                    "kind": "CoolExtraResource",
                    "matchName": "cool-extra-resource"
                },
                "another-cool-extra-resource": {
                    "apiVersion": "example.org/v1",
                    "kind": "CoolExtraResource",
                    "matchLabels": {"labels": {"key": "value"}}
                },
                "yet-another-cool-extra-resource": {
                    "apiVersion": "example.org/v1",
                    "kind": "CoolExtraResource",
                    "matchName": "foo"
                },
                "all-cool-resources": {
                    "apiVersion": "example.org/v1",
                    "kind": "CoolExtraResource",
                    "matchLabels": {"labels": {}}
                }
            }
        })
    );
    assert_eq!(resource(&response, "cool-cd"), cd());
    assert_eq!(composite(&response)["spec"], json!({"count": 2}));
}

#[test]
fn test_extra_resources_in_params() {
    init_test_logging(None);
    let renderer = |request: &RenderRequest| -> anyhow::Result<String> {
        let items = request.params["extraResources"]["cool1"].as_array().cloned().unwrap_or_default();
        let documents = items
            .iter()
            .map(|item| serde_yaml::to_string(&item["Resource"]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents.join("---\n"))
    };
    let request = RequestBuilder::new()
        .observed_composite(Value::Null)
        .input("Default", "unused")
        .extra_resources("cool1", vec![observed_xr(), cd()])
        .build();

    let response = Function::new(FunctionConfig::default(), renderer).run_function(&request);

    assert!(response.results.is_empty(), "{:?}", response.results);
    assert_eq!(composite(&response), json!({"apiVersion": "", "kind": "", "status": {}}));
    assert_eq!(resource(&response, "cool-xr"), observed_xr());
    assert_eq!(
        resource(&response, "cool-cd"),
        json!({"apiVersion": "example.org/v1", "kind": "CD", "metadata": {"annotations": {}, "name": "cool-cd"}})
    );
}

#[test]
fn test_duplicate_extra_resource_key() {
    let source = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: ExtraResources
requirements:
  cool-extra-resource:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchName: cool-extra-resource
---
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: ExtraResources
requirements:
  cool-extra-resource:
    apiVersion: example.org/v1
    kind: CoolExtraResource
    matchName: another-cool-extra-resource
"#;
    let request = RequestBuilder::new()
        .desired_composite(observed_xr())
        .desired_resource("cool-cd", cd())
        .input("Default", source)
        .build();

    let response = run(&request);

    assert_eq!(
        fatal_message(&response),
        "cannot process xr and state with the pipeline output: duplicate extra resource key \"cool-extra-resource\""
    );
    assert_eq!(response.desired, request.desired);
    assert!(response.requirements.is_none());
}

#[test]
fn test_empty_input_with_default_source() {
    init_test_logging(None);
    let config = FunctionConfig {
        default_source: Some("apiVersion: example.org/v1\nkind: Generated\n".to_string()),
        dependencies: None,
    };
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .build();

    let response = Function::new(config, PassthroughRenderer).run_function(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(resource(&response, ""), json!({"apiVersion": "example.org/v1", "kind": "Generated"}));
}

#[test]
fn test_empty_input_without_default_source() {
    let request = RequestBuilder::new().build();

    let response = run(&request);

    assert_eq!(
        fatal_message(&response),
        "invalid function input: spec.source: Required value: kcl source cannot be empty"
    );
    assert_eq!(response.desired, request.desired);
}

const CONDITIONS: &str = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: Conditions
conditions:
  - target: CompositeAndClaim
    force: false
    condition:
      type: DatabaseReady
      status: "False"
      reason: FailedToCreate
      message: Encountered an error creating the database
  - target: Composite
    force: FORCE
    condition:
      type: DatabaseReady
      status: "False"
      reason: DatabaseValidation
      message: Encountered an error during validation
"#;

#[test]
fn test_set_conditions() {
    let request = RequestBuilder::new().input("Default", &CONDITIONS.replace("FORCE", "false")).build();

    let response = run(&request);

    assert!(response.results.is_empty(), "{:?}", response.results);
    assert_eq!(
        serde_json::to_value(&response.conditions).unwrap(),
        json!([{
            "type": "DatabaseReady",
            "status": "STATUS_CONDITION_FALSE",
            "reason": "FailedToCreate",
            "message": "Encountered an error creating the database",
            "target": "TARGET_COMPOSITE_AND_CLAIM"
        }])
    );
}

#[test]
fn test_forced_condition_is_added() {
    let request = RequestBuilder::new().input("Default", &CONDITIONS.replace("FORCE", "true")).build();

    let response = run(&request);

    assert_eq!(response.conditions.len(), 2);
    assert_eq!(response.conditions[1].reason, "DatabaseValidation");
    assert_eq!(response.conditions[1].target, Some(Target::Composite));
}

#[test]
fn test_reserved_condition_type_is_fatal() {
    let source = CONDITIONS.replace("FORCE", "false").replacen("DatabaseReady", "Ready", 1);
    let response = run(&RequestBuilder::new().input("Default", &source).build());

    assert!(fatal_message(&response).starts_with("cannot process xr and state with the pipeline output: "));
    assert!(response.conditions.is_empty());
}

#[test]
fn test_set_events() {
    let source = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: Events
events:
  - target: CompositeAndClaim
    event:
      type: Warning
      reason: ResourceLimitExceeded
      message: The resource limit has been exceeded
  - target: Composite
    event:
      type: Warning
      reason: ValidationFailed
      message: The validation failed
"#;
    let response = run(&RequestBuilder::new().input("Default", source).build());

    assert!(response.conditions.is_empty());
    assert_eq!(
        serde_json::to_value(&response.results).unwrap(),
        json!([
            {
                "severity": "SEVERITY_WARNING",
                "message": "The resource limit has been exceeded",
                "reason": "ResourceLimitExceeded",
                "target": "TARGET_COMPOSITE_AND_CLAIM"
            },
            {
                "severity": "SEVERITY_WARNING",
                "message": "The validation failed",
                "reason": "ValidationFailed",
                "target": "TARGET_COMPOSITE"
            }
        ])
    );
}

const CONTEXT: &str = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: Context
data:
  contextField: contextValue
"#;

#[test]
fn test_set_context() {
    let response = run(&RequestBuilder::new().input("Default", CONTEXT).build());

    assert!(response.results.is_empty(), "{:?}", response.results);
    assert_eq!(response.context.map(Value::Object), Some(json!({"contextField": "contextValue"})));
}

#[test]
fn test_merge_context() {
    let request = RequestBuilder::new()
        .input("Default", CONTEXT)
        .context(json!({"inputContext": "valueFromPreviousContext"}))
        .build();

    let response = run(&request);

    assert_eq!(
        response.context.map(Value::Object),
        Some(json!({"contextField": "contextValue", "inputContext": "valueFromPreviousContext"}))
    );
}

#[test]
fn test_context_passed_through_untouched() {
    let request = RequestBuilder::new()
        .input("Resources", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n")
        .context(json!({"apiextensions.crossplane.io/environment": {"region": "eu"}}))
        .build();

    let response = run(&request);

    assert_eq!(response.context, request.context);
}

const DUPLICATE_NAMES: &str = r#"
apiVersion: example.org/v1
kind: Generated
metadata:
  name: metadata-name
  annotations:
    krm.kcl.dev/composition-resource-name: duplicate-resource-name
---
apiVersion: example.org/v1
kind: Generated
metadata:
  name: duplicate-resource-name
"#;

#[test]
fn test_duplicate_name_error() {
    let request = RequestBuilder::new().input("Default", DUPLICATE_NAMES).build();

    let response = run(&request);

    assert_eq!(
        fatal_message(&response),
        "cannot process xr and state with the pipeline output: multiple composed resources with name \
         \"duplicate-resource-name\" returned: Generated/metadata-name and Generated/duplicate-resource-name. \
         Set different metadata.name or metadata.annotations.\"krm.kcl.dev/composition-resource-name\" \
         to distinguish them."
    );
    assert!(response.desired.resources.is_empty());
}

#[test]
fn test_resources_target_unions_duplicate_names() {
    let request = RequestBuilder::new().input("Resources", DUPLICATE_NAMES).build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(response.desired.resources.len(), 1);
    assert_eq!(
        resource(&response, "duplicate-resource-name"),
        json!({"apiVersion": "example.org/v1", "kind": "Generated", "metadata": {"name": "duplicate-resource-name"}})
    );
}

const CONNECTION_DETAILS: &str = r#"
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: CompositeConnectionDetails
data:
  password: c2VjcmV0
"#;

#[test]
fn test_connection_details_with_xr_target() {
    let request = RequestBuilder::new()
        .desired_composite(json!({"apiVersion": "example.org/v1", "kind": "XR", "spec": {"count": 2}}))
        .input("XR", CONNECTION_DETAILS)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        composite(&response),
        json!({"apiVersion": "example.org/v1", "kind": "XR", "spec": {"count": 2}})
    );
    let desired_composite = response.desired.composite.as_ref().unwrap();
    assert_eq!(desired_composite.connection_details["password"], b"secret".to_vec());
}

#[test]
fn test_connection_details_with_resources_target() {
    let source = format!("{CONNECTION_DETAILS}---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n");
    let request = RequestBuilder::new().input("Resources", &source).build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    let names: Vec<_> = response.desired.resources.keys().cloned().collect();
    assert_eq!(names, vec!["cm".to_string()]);
    let desired_composite = response.desired.composite.as_ref().unwrap();
    assert_eq!(desired_composite.connection_details["password"], b"secret".to_vec());
}

#[test]
fn test_unknown_meta_kind_is_fatal_in_every_target() {
    let source = "apiVersion: meta.krm.kcl.dev/v1alpha1\nkind: Secrets\ndata: {}\n";
    for target in ["XR", "Resources", "PatchDesired", "Default"] {
        let request = RequestBuilder::new().input(target, source).build();

        let response = run(&request);

        assert!(
            fatal_message(&response).starts_with(
                "cannot process xr and state with the pipeline output: invalid kind \"Secrets\" for apiVersion"
            ),
            "target {target}"
        );
        assert!(response.desired.resources.is_empty(), "target {target}");
    }
}

#[test]
fn test_composed_same_name_as_xr() {
    let source = r#"
apiVersion: example.org/v1
kind: XR
metadata:
  name: cool-xr
---
apiVersion: example.org/v1
kind: Generated
metadata:
  name: cool-xr
"#;
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .input("Default", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        composite(&response),
        json!({"apiVersion": "example.org/v1", "kind": "XR", "status": {}})
    );
    assert_eq!(
        resource(&response, "cool-xr"),
        json!({"apiVersion": "example.org/v1", "kind": "Generated", "metadata": {"name": "cool-xr"}})
    );
}

#[test]
fn test_default_status_patch_and_connection_details() {
    let source = r#"
apiVersion: example.org/v1
kind: XR
status:
  ready: true
  nested:
    b: 2
---
apiVersion: example.org/v1
kind: Generated
metadata:
  annotations:
    krm.kcl.dev/ready: "True"
---
apiVersion: meta.krm.kcl.dev/v1alpha1
kind: CompositeConnectionDetails
data:
  password: c2VjcmV0
"#;
    let request = RequestBuilder::new()
        .desired_composite(json!({
            "apiVersion": "example.org/v1",
            "kind": "XR",
            "status": {"observed": 1, "nested": {"a": 1}}
        }))
        .input("Default", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        composite(&response)["status"],
        json!({"observed": 1, "ready": true, "nested": {"a": 1, "b": 2}})
    );
    let desired_composite = response.desired.composite.as_ref().unwrap();
    assert_eq!(desired_composite.connection_details["password"], b"secret".to_vec());

    let generated = &response.desired.resources[""];
    assert_eq!(generated.ready, Ready::True);
    assert_eq!(generated.resource.as_value()["metadata"], json!({"annotations": {}}));
}

#[test]
fn test_invalid_readiness_is_fatal() {
    let source = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  annotations:\n    krm.kcl.dev/ready: maybe\n";
    let response = run(&RequestBuilder::new().input("Default", source).build());

    assert!(fatal_message(&response).starts_with("cannot process xr and state with the pipeline output: "));
    assert!(response.desired.resources.is_empty());
}

#[test]
fn test_xr_target_merges_onto_desired_composite() {
    let source = r#"
apiVersion: example.org/v1
kind: XR
metadata:
  labels:
    team: platform
spec:
  replicas: 3
"#;
    let request = RequestBuilder::new()
        .desired_composite(json!({"apiVersion": "example.org/v1", "kind": "XR", "spec": {"count": 2}}))
        .input("XR", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        composite(&response),
        json!({
            "apiVersion": "example.org/v1",
            "kind": "XR",
            "metadata": {"labels": {"team": "platform"}},
            "spec": {"count": 2, "replicas": 3}
        })
    );
    assert!(response.desired.resources.is_empty());
}

#[test]
fn test_patch_desired_updates_existing_resources() {
    let source = r#"
apiVersion: example.org/v1
kind: Bucket
metadata:
  name: bucket
  annotations:
    example.org/owner: team-a
spec:
  region: eu-west-1
"#;
    let request = RequestBuilder::new()
        .desired_resource(
            "bucket",
            json!({"apiVersion": "example.org/v1", "kind": "Bucket", "metadata": {"name": "bucket"}, "spec": {"size": 10}}),
        )
        .input("PatchDesired", source)
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        resource(&response, "bucket"),
        json!({
            "apiVersion": "example.org/v1",
            "kind": "Bucket",
            "metadata": {"name": "bucket", "annotations": {"example.org/owner": "team-a"}},
            "spec": {"size": 10, "region": "eu-west-1"}
        })
    );
}

#[test]
fn test_patch_desired_unmatched_is_fatal() {
    let source = "apiVersion: example.org/v1\nkind: Bucket\nmetadata:\n  name: missing\n";
    let request = RequestBuilder::new()
        .desired_resource("bucket", json!({"apiVersion": "example.org/v1", "kind": "Bucket"}))
        .input("PatchDesired", source)
        .build();

    let response = run(&request);

    assert!(fatal_message(&response).starts_with("cannot process xr and state with the pipeline output: "));
    assert_eq!(response.desired, request.desired);
}

#[test]
fn test_patch_resources_seeds_bases() {
    let source = r#"
apiVersion: example.org/v1
kind: Bucket
metadata:
  annotations:
    krm.kcl.dev/composition-resource-name: bucket
spec:
  region: eu-west-1
"#;
    let request = RequestBuilder::new()
        .input("PatchResources", source)
        .input_resource("bucket", json!({"apiVersion": "example.org/v1", "kind": "Bucket", "spec": {"size": 10}}))
        .build();

    let response = run(&request);

    assert!(!response.is_fatal(), "{:?}", response.results);
    assert_eq!(
        resource(&response, "bucket"),
        json!({
            "apiVersion": "example.org/v1",
            "kind": "Bucket",
            "spec": {"size": 10, "region": "eu-west-1"}
        })
    );
}

#[test]
fn test_patch_resources_requires_resources() {
    let response = run(&RequestBuilder::new().input("PatchResources", "kind: A\n").build());

    assert_eq!(
        fatal_message(&response),
        "invalid function input: spec.resources: Required value: PatchResources target requires at least one resource"
    );
}

#[test]
fn test_malformed_separator_is_fatal() {
    let source = "kind: A\n--- trailing\nkind: B\n";
    let response = run(&RequestBuilder::new().input("Resources", source).build());

    assert!(
        fatal_message(&response).starts_with("cannot parse data resources from the pipeline output: "),
        "{:?}",
        response.results
    );
}

#[test]
fn test_response_serializes_to_protocol_json() {
    let request = RequestBuilder::new()
        .observed_composite(json!({"apiVersion": "example.org/v1", "kind": "XR"}))
        .input("Resources", "apiVersion: example.org/v1\nkind: Generated\n")
        .build();

    let value = serde_json::to_value(run(&request)).unwrap();

    assert_eq!(value["meta"], json!({"tag": "hello", "ttl": "60s"}));
    assert_eq!(value["desired"]["resources"][""]["resource"]["kind"], json!("Generated"));
    assert!(value.get("results").is_none());
}
