//! The rendering seam.
//!
//! Evaluating the program source is not part of this crate. The function hands
//! a [`RenderRequest`] to a [`Renderer`] and gets back the rendered manifest
//! stream as text.

use serde_json::{Map, Value};

use crate::input::RegistryCredentials;

/// Everything a renderer needs to evaluate one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderRequest {
    /// Name of the input, for diagnostics
    pub name: String,
    /// Program source
    pub source: String,
    /// Parameters: the input's own plus `oxr`, `dxr`, `dcds`, `ocds`, `ctx`
    /// and `extraResources`
    pub params: Map<String, Value>,
    /// Module dependencies, one per line
    pub dependencies: String,
    /// Registry credentials
    pub credentials: RegistryCredentials,
}

/// Turns a [`RenderRequest`] into a multi-document YAML stream.
pub trait Renderer: Send + Sync {
    /// Render the request.
    fn render(&self, request: &RenderRequest) -> anyhow::Result<String>;
}

impl<F> Renderer for F
where
    F: Fn(&RenderRequest) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, request: &RenderRequest) -> anyhow::Result<String> {
        self(request)
    }
}

/// Treats the source as an already rendered manifest stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRenderer;

impl Renderer for PassthroughRenderer {
    fn render(&self, request: &RenderRequest) -> anyhow::Result<String> {
        Ok(request.source.clone())
    }
}
