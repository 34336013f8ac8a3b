//! function-kcl CLI entry point
//!
//! Runs the composition function on request files for local testing:
//! - `run` - Run the function and print the response
//! - `validate` - Validate a `KCLInput` document

use anyhow::Result;
use clap::Parser;
use function_kcl::cli;
use function_kcl::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
