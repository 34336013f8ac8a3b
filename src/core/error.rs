//! Error handling for the function
//!
//! This module provides the error types and user-friendly error reporting for
//! the reconciliation engine and its command-line wrapper. The error system is
//! designed around two core principles:
//! 1. **Strongly-typed errors** for every invocation-fatal failure of the engine
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`FunctionError`] - Enumerated error types for all failure cases
//! - [`ErrorContext`] - Wrapper that adds user-friendly details and suggestions
//!
//! # Error Categories
//!
//! - **Document stream**: [`FunctionError::MalformedSeparator`], [`FunctionError::DocumentParse`], etc.
//! - **Identity**: [`FunctionError::UnmatchedPatchTarget`], [`FunctionError::DuplicateResourceName`]
//! - **Merging**: [`FunctionError::ConflictingValue`], [`FunctionError::NilTargetResource`], etc.
//! - **Meta-documents**: [`FunctionError::UnsupportedMetaKind`], [`FunctionError::ReservedConditionType`], etc.
//! - **Input and configuration**: [`FunctionError::InvalidInput`], [`FunctionError::ConfigError`]
//!
//! Every engine failure aborts the whole invocation. The function turns the
//! error into a single fatal result; the CLI turns top-level errors into an
//! [`ErrorContext`] via [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use function_kcl::core::{ErrorContext, FunctionError};
//!
//! let context = ErrorContext::new(FunctionError::DuplicateRequirementKey {
//!     key: "cool-extra-resource".to_string(),
//! })
//! .with_suggestion("Give every extra-resource requirement a unique key");
//!
//! context.display();
//! ```

use colored::Colorize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::constants::{
    ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME, ANNOTATION_KEY_READY, KIND_COMPOSITE_CONNECTION_DETAILS,
    KIND_CONDITIONS, KIND_CONTEXT, KIND_EVENTS, KIND_EXTRA_RESOURCES, META_API_VERSION,
};

/// The main error type for the function
///
/// Each variant is one invocation-fatal failure mode. None of them is retried
/// locally; the calling orchestrator re-drives the whole pipeline on its next
/// reconciliation pass.
#[derive(Error, Debug)]
pub enum FunctionError {
    /// A document separator line carries content other than a comment
    #[error("invalid document separator: {separator}")]
    MalformedSeparator {
        /// The offending separator line, trimmed
        separator: String,
    },

    /// A document of the rendered stream is not valid YAML
    #[error("cannot parse document {index}: {reason}")]
    DocumentParse {
        /// Position of the document in the stream
        index: usize,
        /// Parser message
        reason: String,
    },

    /// A document of the rendered stream is a scalar or a sequence
    #[error("document {index} is not a mapping")]
    NotAMapping {
        /// Position of the document in the stream
        index: usize,
    },

    /// A mapping inside a document uses a key that is not a string
    #[error("found non-string key in the map of document {index}")]
    NonStringKey {
        /// Position of the document in the stream
        index: usize,
    },

    /// Some patch documents did not resolve to an existing desired resource
    #[error("failed to match all resources, found {matched} / {total} patches")]
    UnmatchedPatchTarget {
        /// Number of documents that matched a desired resource
        matched: usize,
        /// Number of documents in the stream
        total: usize,
    },

    /// Two documents of one invocation resolve to the same resource name
    #[error(
        "multiple composed resources with name \"{name}\" returned: {first} and {second}. Set different metadata.name or metadata.annotations.\"{annotation}\" to distinguish them.",
        annotation = ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME
    )]
    DuplicateResourceName {
        /// The colliding resolved name
        name: String,
        /// `Kind/metadata.name` of the resource registered first
        first: String,
        /// `Kind/metadata.name` of the resource that collided
        second: String,
    },

    /// A leaf already holds a value and overwriting is disabled
    #[error("{path}: conflicting values {existing} and {incoming}")]
    ConflictingValue {
        /// Field path of the leaf
        path: String,
        /// Value currently stored on the target
        existing: Value,
        /// Value carried by the document
        incoming: Value,
    },

    /// The merge target has no backing object
    #[error("cannot set data on a nil {target}")]
    NilTargetResource {
        /// Human-readable name of the target kind
        target: &'static str,
    },

    /// A field path walks through a value of the wrong shape
    #[error("{path}: expected {expected}")]
    FieldPathTypeMismatch {
        /// Field path prefix where the mismatch was found
        path: String,
        /// The shape the path requires at that point
        expected: &'static str,
    },

    /// The readiness annotation carries an unknown literal
    #[error(
        "invalid \"{annotation}\" annotation value \"{value}\": must be True, False, or Unspecified",
        annotation = ANNOTATION_KEY_READY
    )]
    InvalidReadinessValue {
        /// The literal found on the annotation
        value: String,
    },

    /// A document under the meta apiVersion with an unknown kind
    #[error(
        "invalid kind \"{kind}\" for apiVersion \"{api_version}\" - must be one of {connection}, {conditions}, {events}, {context}, {extra}",
        api_version = META_API_VERSION,
        connection = KIND_COMPOSITE_CONNECTION_DETAILS,
        conditions = KIND_CONDITIONS,
        events = KIND_EVENTS,
        context = KIND_CONTEXT,
        extra = KIND_EXTRA_RESOURCES
    )]
    UnsupportedMetaKind {
        /// The meta kind found on the document
        kind: String,
    },

    /// A connection detail value is not valid base64
    #[error("cannot decode connection detail \"{key}\": {reason}")]
    InvalidConnectionDetail {
        /// Connection detail key
        key: String,
        /// Decoder message
        reason: String,
    },

    /// A condition of a type owned by the control plane
    #[error("cannot set condition type \"{condition_type}\": it is a reserved condition type")]
    ReservedConditionType {
        /// The reserved type
        condition_type: String,
    },

    /// An event type other than `Normal` or `Warning`
    #[error("invalid type {value}, must be one of [Normal, Warning]")]
    InvalidEventSeverity {
        /// The literal found on the event
        value: String,
    },

    /// Two extra-resource requirements share a key
    #[error("duplicate extra resource key \"{key}\"")]
    DuplicateRequirementKey {
        /// The repeated requirement key
        key: String,
    },

    /// A meta-document body that does not match its schema
    #[error("invalid {kind} meta document: {reason}")]
    InvalidMetaDocument {
        /// Meta kind of the document
        kind: String,
        /// Decoder message
        reason: String,
    },

    /// The function input failed validation
    #[error("{field}: {reason}")]
    InvalidInput {
        /// Dotted path of the offending input field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Runtime configuration problem
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Anything else
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl FunctionError {
    /// Build the error for a required input field that is missing.
    pub fn required(field: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: format!("Required value: {detail}"),
        }
    }

    /// Build the error for an input field holding an unsupported value.
    pub fn unsupported(field: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: format!("Unsupported value: {detail}"),
        }
    }
}

impl Clone for FunctionError {
    fn clone(&self) -> Self {
        match self {
            Self::MalformedSeparator {
                separator,
            } => Self::MalformedSeparator {
                separator: separator.clone(),
            },
            Self::DocumentParse {
                index,
                reason,
            } => Self::DocumentParse {
                index: *index,
                reason: reason.clone(),
            },
            Self::NotAMapping {
                index,
            } => Self::NotAMapping {
                index: *index,
            },
            Self::NonStringKey {
                index,
            } => Self::NonStringKey {
                index: *index,
            },
            Self::UnmatchedPatchTarget {
                matched,
                total,
            } => Self::UnmatchedPatchTarget {
                matched: *matched,
                total: *total,
            },
            Self::DuplicateResourceName {
                name,
                first,
                second,
            } => Self::DuplicateResourceName {
                name: name.clone(),
                first: first.clone(),
                second: second.clone(),
            },
            Self::ConflictingValue {
                path,
                existing,
                incoming,
            } => Self::ConflictingValue {
                path: path.clone(),
                existing: existing.clone(),
                incoming: incoming.clone(),
            },
            Self::NilTargetResource {
                target,
            } => Self::NilTargetResource {
                target,
            },
            Self::FieldPathTypeMismatch {
                path,
                expected,
            } => Self::FieldPathTypeMismatch {
                path: path.clone(),
                expected,
            },
            Self::InvalidReadinessValue {
                value,
            } => Self::InvalidReadinessValue {
                value: value.clone(),
            },
            Self::UnsupportedMetaKind {
                kind,
            } => Self::UnsupportedMetaKind {
                kind: kind.clone(),
            },
            Self::InvalidConnectionDetail {
                key,
                reason,
            } => Self::InvalidConnectionDetail {
                key: key.clone(),
                reason: reason.clone(),
            },
            Self::ReservedConditionType {
                condition_type,
            } => Self::ReservedConditionType {
                condition_type: condition_type.clone(),
            },
            Self::InvalidEventSeverity {
                value,
            } => Self::InvalidEventSeverity {
                value: value.clone(),
            },
            Self::DuplicateRequirementKey {
                key,
            } => Self::DuplicateRequirementKey {
                key: key.clone(),
            },
            Self::InvalidMetaDocument {
                kind,
                reason,
            } => Self::InvalidMetaDocument {
                kind: kind.clone(),
                reason: reason.clone(),
            },
            Self::InvalidInput {
                field,
                reason,
            } => Self::InvalidInput {
                field: field.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // Library errors are not Clone; keep their rendered message.
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::YamlError(e) => Self::Other {
                message: format!("YAML error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error wrapper carrying user-facing details and a suggestion
///
/// The CLI prints this with colors via [`ErrorContext::display`]; logs and tests
/// use its [`fmt::Display`] implementation.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: FunctionError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: FunctionError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`FunctionError`] variants, IO errors and decoding errors; anything
/// else is reported with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(fn_error) = error.downcast_ref::<FunctionError>() {
        return create_error_context(fn_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(FunctionError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check that the file exists and the path is correct")
                .with_details("A file named on the command line could not be found");
            }
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(FunctionError::Other {
                    message: error.to_string(),
                })
                .with_suggestion("Check the file permissions")
                .with_details("The function could not read a file named on the command line");
            }
            _ => {}
        }
    }

    if error.downcast_ref::<serde_yaml::Error>().is_some()
        || error.downcast_ref::<serde_json::Error>().is_some()
    {
        return ErrorContext::new(FunctionError::Other {
            message: chain_message(&error),
        })
        .with_suggestion("Check the document syntax; requests may be written as JSON or YAML")
        .with_details("The request or input document could not be decoded");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(FunctionError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration file")
        .with_details("Supported keys are default-source and dependencies");
    }

    ErrorContext::new(FunctionError::Other {
        message: chain_message(&error),
    })
}

/// Render an error with its cause chain appended.
fn chain_message(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

/// Attach suggestions to the engine errors users can act on.
fn create_error_context(error: FunctionError) -> ErrorContext {
    match &error {
        FunctionError::MalformedSeparator {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Only whitespace or a '#' comment may follow '---' on a separator line")
            .with_details("The rendered output is split into documents on lines starting with '---'"),

        FunctionError::DuplicateResourceName {
            ..
        } => ErrorContext::new(error).with_suggestion(format!(
            "Set a unique metadata.name or the \"{ANNOTATION_KEY_COMPOSITION_RESOURCE_NAME}\" annotation on each resource"
        )),

        FunctionError::UnmatchedPatchTarget {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Every patch document must name a resource that already exists in the desired state")
            .with_details("PatchDesired and PatchResources never create resources"),

        FunctionError::ConflictingValue {
            ..
        } => ErrorContext::new(error)
            .with_details("Overwriting is disabled, so an existing value cannot be replaced"),

        FunctionError::InvalidInput {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the spec of the KCLInput document"),

        _ => ErrorContext::new(error),
    }
}
