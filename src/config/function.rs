use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::constants::ENV_DEFAULT_SOURCE;

/// Settings shared by every invocation of the function.
///
/// # Examples
///
/// ```rust
/// use function_kcl::config::FunctionConfig;
///
/// let config = FunctionConfig::default()
///     .with_env_lookup(|key| (key == "FUNCTION_KCL_DEFAULT_SOURCE").then(|| "items = []".to_string()));
/// assert_eq!(config.default_source.as_deref(), Some("items = []"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FunctionConfig {
    /// Source used when the input has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_source: Option<String>,

    /// Dependencies put in front of the input's own, one per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
}

impl FunctionConfig {
    /// Load the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid TOML syntax
    /// - The TOML structure doesn't match the expected schema
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read function config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse function config from {}", path.display()))
    }

    /// Load from `path` when given, else start from the defaults.
    pub async fn load_with_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// An empty `FUNCTION_KCL_DEFAULT_SOURCE` is ignored.
    #[must_use]
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(source) = lookup(ENV_DEFAULT_SOURCE).filter(|s| !s.is_empty()) {
            tracing::debug!("default source taken from {ENV_DEFAULT_SOURCE}");
            self.default_source = Some(source);
        }
        self
    }

    /// Replace the dependencies with the content of a file.
    pub async fn with_dependencies_file(mut self, path: &Path) -> Result<Self> {
        let dependencies = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dependencies from {}", path.display()))?;
        self.dependencies = Some(dependencies.trim_end().to_string());
        Ok(self)
    }
}
