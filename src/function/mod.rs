//! Running the function end to end.
//!
//! [`Function::run_function`] takes one [`RunFunctionRequest`] through every
//! stage of an invocation:
//!
//! 1. decode, default and validate the `KCLInput`
//! 2. collect the observed and desired state from the request
//! 3. render the input through a [`Renderer`]
//! 4. split and parse the rendered stream
//! 5. pull the side-channel meta-documents out of the stream
//! 6. dispatch the remaining documents to the configured target
//! 7. write the desired state, conditions, events, context and requirements
//!    into the response
//!
//! Any failure stops the invocation and is reported as a single fatal result.
//!
//! # Examples
//!
//! ```rust
//! use function_kcl::config::FunctionConfig;
//! use function_kcl::function::{Function, PassthroughRenderer};
//! use function_kcl::function::message::RunFunctionRequest;
//! use serde_json::json;
//!
//! let request: RunFunctionRequest = serde_json::from_value(json!({
//!     "input": {
//!         "apiVersion": "krm.kcl.dev/v1alpha1",
//!         "kind": "KCLInput",
//!         "spec": {
//!             "target": "Resources",
//!             "source": "apiVersion: example.org/v1\nkind: Generated\nmetadata:\n  name: one\n"
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! let function = Function::new(FunctionConfig::default(), PassthroughRenderer);
//! let response = function.run_function(&request);
//! assert!(!response.is_fatal());
//! assert!(response.desired.resources.contains_key("one"));
//! ```

pub mod message;
pub mod render;

pub use render::{PassthroughRenderer, RenderRequest, Renderer};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value, json};

use crate::config::FunctionConfig;
use crate::constants::{DEFAULT_TTL, REGISTRY_CREDENTIALS_NAME};
use crate::dispatch::{AddResourcesOptions, process_resources};
use crate::document::parse_documents;
use crate::input::{KclInput, RegistryCredentials};
use crate::meta::{extract_side_channels, merge_context, to_response_conditions};
use crate::resource::{Composite, DesiredResources, ObservedResources};
use message::{FunctionResult, Requirements, RunFunctionRequest, RunFunctionResponse};

/// The composition function.
#[derive(Debug, Clone, Default)]
pub struct Function<R: Renderer = PassthroughRenderer> {
    config: FunctionConfig,
    renderer: R,
}

impl<R: Renderer> Function<R> {
    /// Create a function rendering through `renderer`.
    pub const fn new(config: FunctionConfig, renderer: R) -> Self {
        Self {
            config,
            renderer,
        }
    }

    /// The configuration the function runs with.
    pub const fn config(&self) -> &FunctionConfig {
        &self.config
    }

    /// Run the function once.
    ///
    /// Never fails: an error is reported as a fatal result on the composite,
    /// with the desired state of the request left as it was.
    pub fn run_function(&self, request: &RunFunctionRequest) -> RunFunctionResponse {
        tracing::info!(tag = %request.meta.tag, "running function");

        let mut response = RunFunctionResponse::to(request, DEFAULT_TTL);
        if let Err(e) = self.run(request, &mut response) {
            let message = format!("{e:#}");
            tracing::debug!(error = %message, "function failed");
            let mut failed = RunFunctionResponse::to(request, DEFAULT_TTL);
            failed.fatal(message);
            return failed;
        }

        tracing::info!(tag = %request.meta.tag, "successfully composed desired resources");
        response
    }

    fn run(&self, request: &RunFunctionRequest, response: &mut RunFunctionResponse) -> Result<()> {
        let mut input =
            KclInput::from_value(request.input.as_ref()).context("cannot get Function input")?;
        input.apply_defaults(self.config.default_source.as_deref(), self.config.dependencies.as_deref());
        input.validate().context("invalid function input")?;

        let oxr = request.observed_composite();
        let mut dxr = request.desired_composite();
        dxr.resource.set_api_version(oxr.resource.api_version());
        dxr.resource.set_kind(oxr.resource.kind());
        let mut desired = request.desired_composed();
        let observed = request.observed_composed();
        tracing::debug!(
            name = %input.metadata.name,
            target = %input.target(),
            desired = desired.len(),
            observed = observed.len(),
            "collected request state"
        );

        let render_request = RenderRequest {
            name: input.metadata.name.clone(),
            source: input.spec.source.clone(),
            params: render_params(&input, request, &oxr, &dxr, &desired, &observed),
            dependencies: input.spec.dependencies.clone(),
            credentials: registry_credentials(request).unwrap_or_else(|| input.spec.credentials.clone()),
        };
        let rendered = self
            .renderer
            .render(&render_request)
            .context("failed to run kcl function pipelines")?;

        let documents =
            parse_documents(&rendered).context("cannot parse data resources from the pipeline output")?;
        tracing::debug!(documents = documents.len(), "parsed pipeline output");

        let (documents, mut channels) = extract_side_channels(documents)
            .context("cannot process xr and state with the pipeline output")?;
        dxr.connection_details.append(&mut channels.connection_details);

        let result = process_resources(
            &mut dxr,
            &oxr,
            &mut desired,
            input.target(),
            &input.spec.resources,
            AddResourcesOptions {
                documents,
                overwrite: true,
            },
        )
        .context("cannot process xr and state with the pipeline output")?;
        for message in &result.messages {
            tracing::debug!("{message}");
        }
        tracing::info!(target = %result.target, count = result.count, "processed pipeline output");

        if !channels.requirements.is_empty() {
            response.requirements = Some(Requirements {
                extra_resources: channels.requirements,
            });
        }
        response.conditions.extend(to_response_conditions(&channels.conditions));
        response.results.extend(channels.events.into_iter().map(FunctionResult::from));
        if !channels.context.is_empty() {
            merge_context(response.context.get_or_insert_with(Map::new), channels.context);
        }
        response.set_desired_composite(&dxr);
        response.set_desired_composed(&desired);

        Ok(())
    }
}

/// Build the renderer parameters: the input's own plus the request state.
///
/// Keys the function provides replace parameters of the same name.
fn render_params(
    input: &KclInput,
    request: &RunFunctionRequest,
    oxr: &Composite,
    dxr: &Composite,
    desired: &DesiredResources,
    observed: &ObservedResources,
) -> Map<String, Value> {
    let dcds: Map<String, Value> = desired
        .iter()
        .map(|(name, composed)| {
            (
                name.clone(),
                json!({"Resource": composed.resource.as_value(), "Ready": composed.ready.to_string()}),
            )
        })
        .collect();

    let ocds: Map<String, Value> = observed
        .iter()
        .map(|(name, composed)| {
            let details: Map<String, Value> = composed
                .connection_details
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(STANDARD.encode(value))))
                .collect();
            (name.clone(), json!({"Resource": composed.resource.as_value(), "ConnectionDetails": details}))
        })
        .collect();

    let extra_resources: Map<String, Value> = request
        .extra_resources
        .iter()
        .map(|(key, resources)| {
            let items: Vec<Value> =
                resources.items.iter().map(|item| json!({"Resource": item.resource.as_value()})).collect();
            (key.clone(), Value::Array(items))
        })
        .collect();

    let mut params = input.spec.params.clone();
    params.insert("oxr".to_string(), oxr.resource.as_value().clone());
    params.insert("dxr".to_string(), dxr.resource.as_value().clone());
    params.insert("dcds".to_string(), Value::Object(dcds));
    params.insert("ocds".to_string(), Value::Object(ocds));
    params.insert("ctx".to_string(), Value::Object(request.context.clone().unwrap_or_default()));
    params.insert("extraResources".to_string(), Value::Object(extra_resources));
    params
}

/// Registry credentials supplied with the request, if complete.
fn registry_credentials(request: &RunFunctionRequest) -> Option<RegistryCredentials> {
    let Some(data) = request.credential_data(REGISTRY_CREDENTIALS_NAME) else {
        tracing::warn!("no {REGISTRY_CREDENTIALS_NAME} credentials in request");
        return None;
    };
    let field = |key: &str| data.get(key).map(|value| String::from_utf8_lossy(value).into_owned());

    let Some(password) = field("password") else {
        tracing::warn!("{REGISTRY_CREDENTIALS_NAME} credentials have no password");
        return None;
    };
    Some(RegistryCredentials {
        url: field("url"),
        username: field("username"),
        password: Some(password),
    })
}
