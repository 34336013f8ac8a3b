//! Function configuration.
//!
//! The function is configured by an optional TOML file and the process
//! environment. Everything ends up in one [`FunctionConfig`] value that is
//! handed to [`crate::function::Function`]; nothing is read from global state
//! while a request is being processed.
//!
//! # Configuration File
//!
//! ```toml
//! # Source used when a KCLInput carries none
//! default-source = '''
//! items = [{apiVersion: "example.org/v1", kind: "Generated"}]
//! '''
//!
//! # Module dependencies put in front of every input's own
//! dependencies = '''
//! k8s = "1.28"
//! '''
//! ```
//!
//! # Environment Variables
//!
//! - `FUNCTION_KCL_DEFAULT_SOURCE` - overrides `default-source`

mod function;

pub use function::FunctionConfig;
