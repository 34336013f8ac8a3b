//! Core types and error handling for the function
//!
//! This module holds the error vocabulary shared by every layer of the crate:
//! the engine modules return [`FunctionError`], the orchestration and CLI layers
//! wrap it in [`anyhow::Error`] with context, and [`user_friendly_error`] turns
//! whatever reaches the top of the CLI into an [`ErrorContext`] for display.

pub mod error;

pub use error::{ErrorContext, FunctionError, user_friendly_error};

/// Result alias used by the engine modules.
pub type Result<T, E = FunctionError> = std::result::Result<T, E>;
