//! Generator configuration.
//!
//! The configuration record is read from a kebab-case JSON document
//! (`Configuration.json`) or assembled from command-line flags. It is
//! validated once, before any planning, by [`Configuration::validate`].
//!
//! ## Examples
//!
//! ```
//! use blueprint_gen::config::{ApiGroupBy, Configuration};
//!
//! let config = Configuration::from_json_str(
//!     r#"{"output-folder": "out", "namespace": "vault", "api-group-by": "operation-group"}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.validate().unwrap(), ApiGroupBy::OperationGroup);
//! assert!(config.generate_metadata);
//! assert!(!config.public_clients);
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::errors::{ConfigurationError, GeneratorError};

/// Policy assigning operations to output buckets.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ApiGroupBy {
    /// One bucket per operation, nested under the first route segment.
    Operation,
    /// One bucket per operation, all at the output root.
    OperationFlat,
    /// Operations sharing the name prefix before `_`.
    OperationGroup,
    /// Operations sharing the first constant route segment.
    #[default]
    FirstPathSegment,
    /// Operations sharing the last segment of the first constant route part.
    LastPathSegment,
}

/// Options controlling one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Directory artifacts are written to.
    #[serde(default)]
    pub output_folder: String,
    /// Namespace hint; becomes the crate-level path of generated modules.
    #[serde(default)]
    pub namespace: String,
    /// Library name used in generated documentation; defaults to the namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    /// Grouping policy name, validated by [`Configuration::validate`].
    #[serde(default = "default_group_by")]
    pub api_group_by: String,
    /// Whether generated clients are `pub` rather than `pub(crate)`.
    #[serde(default)]
    pub public_clients: bool,
    /// Whether a metadata manifest is emitted with the artifacts.
    #[serde(default = "default_true")]
    pub generate_metadata: bool,
}

fn default_group_by() -> String {
    ApiGroupBy::default().to_string()
}

fn default_true() -> bool {
    true
}

impl Configuration {
    /// Creates a configuration with default flags.
    pub fn new(
        output_folder: impl Into<String>,
        namespace: impl Into<String>,
        group_by: ApiGroupBy,
    ) -> Self {
        Self {
            output_folder: output_folder.into(),
            namespace: namespace.into(),
            library_name: None,
            api_group_by: group_by.to_string(),
            public_clients: false,
            generate_metadata: true,
        }
    }

    /// Sets the library name.
    pub fn with_library_name(mut self, name: impl Into<String>) -> Self {
        self.library_name = Some(name.into());
        self
    }

    /// Sets client visibility.
    pub fn with_public_clients(mut self, public: bool) -> Self {
        self.public_clients = public;
        self
    }

    /// Enables or disables the metadata manifest.
    pub fn with_metadata(mut self, generate: bool) -> Self {
        self.generate_metadata = generate;
        self
    }

    /// Returns the library name, falling back to the namespace.
    pub fn library_name(&self) -> &str {
        self.library_name.as_deref().unwrap_or(&self.namespace)
    }

    /// Validates every option and returns the grouping policy.
    ///
    /// ## Errors
    ///
    /// Returns a [`ConfigurationError`] if:
    /// - `output-folder` or `namespace` is missing
    /// - `namespace` is not a `::`-separated path of identifiers
    /// - `api-group-by` is not a known policy
    pub fn validate(&self) -> Result<ApiGroupBy, ConfigurationError> {
        if self.output_folder.trim().is_empty() {
            return Err(ConfigurationError::MissingOption {
                name: "output-folder",
            });
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigurationError::MissingOption { name: "namespace" });
        }
        let valid_namespace = self.namespace.split("::").all(|part| {
            !part.is_empty()
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.starts_with(|c: char| c.is_ascii_digit())
        });
        if !valid_namespace {
            return Err(ConfigurationError::InvalidOption {
                name: "namespace",
                reason: format!("'{}' is not a path of identifiers", self.namespace),
            });
        }
        ApiGroupBy::from_str(self.api_group_by.trim()).map_err(|_| {
            ConfigurationError::UnknownGroupBy {
                value: self.api_group_by.clone(),
            }
        })
    }

    /// Parses a configuration document.
    ///
    /// ## Errors
    ///
    /// Returns `GeneratorError::ParseError` on malformed JSON.
    pub fn from_json_str(json: &str) -> Result<Self, GeneratorError> {
        serde_json::from_str(json)
            .map_err(|e| GeneratorError::ParseError(format!("configuration: {}", e)))
    }

    /// Reads a configuration document from disk.
    ///
    /// ## Errors
    ///
    /// Returns `GeneratorError::ReadError` if the file cannot be read and
    /// `GeneratorError::ParseError` if it is not valid JSON.
    pub fn load(path: &Path) -> Result<Self, GeneratorError> {
        let json = std::fs::read_to_string(path).map_err(|e| GeneratorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, GeneratorError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GeneratorError::CodeGenError(format!("configuration: {}", e)))
    }
}
