//! Run the function on a request file.

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::FunctionConfig;
use crate::function::message::{RunFunctionRequest, RunFunctionResponse, Severity};
use crate::function::{Function, PassthroughRenderer, RenderRequest};

/// Run the function on a request file and print the response.
///
/// Without `--rendered` the input source is taken to be rendered output
/// already.
#[derive(Args)]
pub struct RunCommand {
    /// RunFunctionRequest to process, as JSON or YAML
    #[arg(long, value_name = "FILE")]
    pub request: PathBuf,

    /// Rendered manifest stream used in place of the input source
    #[arg(long, value_name = "FILE")]
    pub rendered: Option<PathBuf>,

    /// Output format of the response
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Output format of the printed response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

impl RunCommand {
    /// Execute the command.
    ///
    /// The response is printed even when it carries a fatal result; the
    /// command then fails with that result's message.
    pub async fn execute(self, config: FunctionConfig) -> Result<()> {
        let request = load_request(&self.request).await?;

        let response = match &self.rendered {
            Some(path) => {
                let rendered = fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read rendered output from {}", path.display()))?;
                let renderer =
                    move |_: &RenderRequest| -> anyhow::Result<String> { Ok(rendered.clone()) };
                Function::new(config, renderer).run_function(&request)
            }
            None => Function::new(config, PassthroughRenderer).run_function(&request),
        };

        println!("{}", self.render_response(&response)?);

        if let Some(fatal) = response.results.iter().find(|r| r.severity == Severity::Fatal) {
            bail!("function returned a fatal result: {}", fatal.message);
        }
        Ok(())
    }

    fn render_response(&self, response: &RunFunctionResponse) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(response).context("Failed to serialize response")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(response).context("Failed to serialize response")
            }
        }
    }
}

/// Read a request written as JSON or YAML.
async fn load_request(path: &Path) -> Result<RunFunctionRequest> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read request from {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse request from {}", path.display()))
}
