//! Test utilities for function-kcl
//!
//! This module provides helpers shared by unit and integration tests: test
//! logging and fixtures for building function requests.
//!
//! # Example
//!
//! ```rust,no_run
//! use function_kcl::test_utils::{RequestBuilder, init_test_logging};
//!
//! init_test_logging(None);
//! let request = RequestBuilder::new()
//!     .input("Resources", "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n")
//!     .build();
//! assert!(request.input.is_some());
//! ```

pub mod fixtures;

pub use fixtures::{RequestBuilder, kcl_input, observed_xr};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. The given level wins over `RUST_LOG`;
/// with neither, tests run without a subscriber.
///
/// ```bash
/// RUST_LOG=function_kcl=trace cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
