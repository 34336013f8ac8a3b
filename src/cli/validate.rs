//! Validate a `KCLInput` document.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tokio::fs;

use crate::config::FunctionConfig;
use crate::input::KclInput;

/// Decode, default and validate a `KCLInput` document.
///
/// The configured default source and dependencies are applied first, the same
/// way the function applies them to a request's input.
#[derive(Args)]
pub struct ValidateCommand {
    /// The KCLInput document, as YAML or JSON
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,
}

impl ValidateCommand {
    /// Execute the command.
    pub async fn execute(self, config: &FunctionConfig) -> Result<()> {
        let content = fs::read_to_string(&self.input)
            .await
            .with_context(|| format!("Failed to read input from {}", self.input.display()))?;

        let mut input = KclInput::from_yaml(&content)
            .with_context(|| format!("Failed to parse input from {}", self.input.display()))?;
        input.apply_defaults(config.default_source.as_deref(), config.dependencies.as_deref());
        input.validate().with_context(|| format!("Invalid input {}", self.input.display()))?;

        println!(
            "{} {} is valid (target: {}, resources: {})",
            "✓".green(),
            self.input.display(),
            input.target(),
            input.spec.resources.len()
        );
        Ok(())
    }
}
