//! Fixtures for building function requests.

use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::function::message::{
    CredentialData, Credentials, Resource, Resources, RunFunctionRequest,
};
use crate::resource::Unstructured;

/// The observed composite most tests run against.
pub fn observed_xr() -> Value {
    json!({
        "apiVersion": "example.org/v1",
        "kind": "XR",
        "metadata": {"name": "cool-xr"},
        "spec": {"count": 2}
    })
}

/// A `KCLInput` document with the given target and source.
pub fn kcl_input(target: &str, source: &str) -> Value {
    json!({
        "apiVersion": "krm.kcl.dev/v1alpha1",
        "kind": "KCLInput",
        "metadata": {"name": "basic"},
        "spec": {
            "target": target,
            "source": source
        }
    })
}

/// Builder for [`RunFunctionRequest`] values.
///
/// Starts from a request with tag `hello` and [`observed_xr`] as the observed
/// composite.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: RunFunctionRequest,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Create a builder with the default observed composite.
    pub fn new() -> Self {
        let mut request = RunFunctionRequest::default();
        request.meta.tag = "hello".to_string();
        request.observed.composite = Some(Resource::new(Unstructured::from_value(observed_xr())));
        Self {
            request,
        }
    }

    /// Set a `KCLInput` with the given target and source.
    pub fn input(self, target: &str, source: &str) -> Self {
        self.raw_input(kcl_input(target, source))
    }

    /// Set the input document as is.
    pub fn raw_input(mut self, input: Value) -> Self {
        self.request.input = Some(input);
        self
    }

    /// Add a named base to the input's `spec.resources`.
    pub fn input_resource(mut self, name: &str, base: Value) -> Self {
        if let Some(spec) = self.request.input.as_mut().and_then(|input| input.get_mut("spec")) {
            let resources = spec
                .as_object_mut()
                .map(|spec| spec.entry("resources").or_insert_with(|| Value::Array(Vec::new())));
            if let Some(Value::Array(resources)) = resources {
                resources.push(json!({"name": name, "base": base}));
            }
        }
        self
    }

    /// Replace the observed composite; `Value::Null` removes it.
    pub fn observed_composite(mut self, composite: Value) -> Self {
        self.request.observed.composite =
            (!composite.is_null()).then(|| Resource::new(Unstructured::from_value(composite)));
        self
    }

    /// Set the desired composite.
    pub fn desired_composite(mut self, composite: Value) -> Self {
        self.request.desired.composite = Some(Resource::new(Unstructured::from_value(composite)));
        self
    }

    /// Add a desired composed resource.
    pub fn desired_resource(mut self, name: &str, resource: Value) -> Self {
        self.request
            .desired
            .resources
            .insert(name.to_string(), Resource::new(Unstructured::from_value(resource)));
        self
    }

    /// Add an observed composed resource.
    pub fn observed_resource(mut self, name: &str, resource: Value) -> Self {
        self.request
            .observed
            .resources
            .insert(name.to_string(), Resource::new(Unstructured::from_value(resource)));
        self
    }

    /// Set the pipeline context. Anything but an object clears it.
    pub fn context(mut self, context: Value) -> Self {
        self.request.context = match context {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self
    }

    /// Add extra resources under a requirement key.
    pub fn extra_resources(mut self, key: &str, items: Vec<Value>) -> Self {
        let items = items.into_iter().map(|item| Resource::new(Unstructured::from_value(item))).collect();
        self.request.extra_resources.insert(key.to_string(), Resources {
            items,
        });
        self
    }

    /// Add a named credential.
    pub fn credential(mut self, name: &str, data: &[(&str, &str)]) -> Self {
        let data: BTreeMap<String, Vec<u8>> =
            data.iter().map(|(key, value)| ((*key).to_string(), value.as_bytes().to_vec())).collect();
        self.request.credentials.insert(name.to_string(), Credentials {
            credential_data: Some(CredentialData {
                data,
            }),
        });
        self
    }

    /// Finish the request.
    pub fn build(self) -> RunFunctionRequest {
        self.request
    }
}
