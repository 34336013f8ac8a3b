//! function-kcl - output reconciliation for a KCL composition function
//!
//! A composition function receives the observed and desired state of a
//! composite resource, renders a KCL program, and must fold the rendered
//! manifests back into the desired state. This crate implements that folding:
//! it splits the rendered stream into documents, routes each document to the
//! desired composite or a desired composed resource according to the
//! configured target mode, merges fields under an explicit conflict policy, and
//! turns side-channel meta-documents into conditions, events, context and
//! extra-resource requirements.
//!
//! # Architecture Overview
//!
//! ```text
//! RunFunctionRequest
//!   -> input      decode, default and validate the KCLInput
//!   -> renderer   produce a multi-document YAML stream
//!   -> document   split on separator lines, parse each document
//!   -> meta       pull out every meta-document, connection details included
//!   -> dispatch   apply the rest per target mode
//!   -> merge      path-wise merge onto composite or composed resources
//! RunFunctionResponse
//! ```
//!
//! # Core Modules
//!
//! - [`function`] - End-to-end orchestration and the protocol messages
//! - [`dispatch`] - Target modes and name resolution
//! - [`merge`] - The path-merge engine and its conflict policy
//! - [`document`] - Splitting and parsing the rendered stream
//! - [`meta`] - Side-channel meta-documents
//! - [`resource`] - Unstructured resources, field paths and identity
//! - [`input`] - The `KCLInput` document
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface for running requests locally
//! - [`config`] - Function configuration
//! - [`constants`] - Annotation keys, meta kinds and protocol defaults
//! - [`core`] - Error types and user-facing error formatting
//!
//! # Target Modes
//!
//! | Target | Effect |
//! |---|---|
//! | `XR` | merge every document onto the desired composite |
//! | `PatchDesired` | patch existing desired composed resources |
//! | `PatchResources` | patch the named bases of the input |
//! | `Resources` | create desired composed resources |
//! | `Default` | classify each document |

// Core functionality modules
pub mod core;
pub mod dispatch;
pub mod document;
pub mod function;
pub mod merge;
pub mod meta;
pub mod resource;

// Input and configuration
pub mod cli;
pub mod config;
pub mod constants;
pub mod input;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
