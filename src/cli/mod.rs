//! Command-line interface for running the function locally.
//!
//! The binary drives the same [`Function`](crate::function::Function) the
//! composition pipeline calls, reading requests from files instead of a
//! socket. It is meant for trying out sources and debugging rendered output.
//!
//! # Commands
//!
//! - `run` - Run the function on a request file and print the response
//! - `validate` - Check a `KCLInput` document
//!
//! # Global Options
//!
//! - `--debug` - Enable debug logging
//! - `--config <FILE>` - Load the function configuration from a TOML file
//! - `--dependencies <FILE>` - Read the base dependencies from a file
//!
//! # Examples
//!
//! ```bash
//! # Run a request, treating the input source as rendered output
//! function-kcl run --request request.yaml
//!
//! # Run a request against output rendered elsewhere
//! function-kcl run --request request.yaml --rendered output.yaml --format yaml
//!
//! # Validate an input document
//! function-kcl validate --input input.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Log filter used unless `--debug` is given
//! - `FUNCTION_KCL_DEFAULT_SOURCE` - Source used when an input has none

pub mod run;
pub mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::FunctionConfig;

/// Runtime configuration for CLI execution.
///
/// Built from the parsed arguments by [`Cli::build_config`] and injectable in
/// tests through [`Cli::execute_with_config`].
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log level forced on the subscriber; `None` defers to `RUST_LOG`,
    /// falling back to `info`.
    pub log_level: Option<String>,

    /// Path to the function configuration file.
    pub config_path: Option<PathBuf>,

    /// Path to a file holding the base dependencies.
    pub dependencies_path: Option<PathBuf>,
}

impl CliConfig {
    /// Create a new CLI configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global `tracing` subscriber.
    ///
    /// Logs go to stderr so a printed response stays machine readable. Calling
    /// this more than once is harmless.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init()
            .ok();
    }

    /// Load the [`FunctionConfig`]: the config file when given, then the
    /// dependencies file, then the environment.
    pub async fn load_function_config(&self) -> Result<FunctionConfig> {
        let mut config = FunctionConfig::load_with_optional(self.config_path.as_deref()).await?;
        if let Some(path) = &self.dependencies_path {
            config = config.with_dependencies_file(path).await?;
        }
        Ok(config.with_env())
    }
}

/// Root command of the `function-kcl` binary.
#[derive(Parser)]
#[command(
    name = "function-kcl",
    about = "Run the KCL composition function against local request files",
    version,
    long_about = "Runs the composition function on a RunFunctionRequest read from a file and prints the \
                  RunFunctionResponse, merging rendered manifests into the desired composite and composed resources."
)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Path to the function configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File holding dependencies put in front of every input's own
    #[arg(long, global = true, value_name = "FILE")]
    dependencies: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the function on a request file
    Run(run::RunCommand),

    /// Validate a KCLInput document
    Validate(validate::ValidateCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Build a [`CliConfig`] from the parsed arguments.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            log_level: self.debug.then(|| "debug".to_string()),
            config_path: self.config.clone(),
            dependencies_path: self.dependencies.clone(),
        }
    }

    /// Execute the command with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();
        let function_config = config.load_function_config().await?;

        match self.command {
            Commands::Run(cmd) => cmd.execute(function_config).await,
            Commands::Validate(cmd) => cmd.execute(&function_config).await,
        }
    }
}
