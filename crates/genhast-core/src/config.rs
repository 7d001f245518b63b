//! Plugin configuration and the context handed to `initialize`.
//!
//! Configuration is deserialized with kebab-case keys. Keys that are not part
//! of the common schema are kept in `extra` for engine-specific settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist/templates")
}

/// Settings shared by every template plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    /// Overrides the plugin's default file extension (e.g. ".html.twig").
    #[serde(default)]
    pub file_extension: Option<String>,

    /// Directory generated templates are destined for.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Normalize whitespace in rendered output.
    #[serde(default)]
    pub pretty_print: bool,

    /// Prefix output with an engine comment listing the component's props.
    #[serde(default)]
    pub props_header: bool,

    /// Engine-specific settings.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            file_extension: None,
            output_dir: default_output_dir(),
            pretty_print: false,
            props_header: false,
            extra: Map::new(),
        }
    }
}

impl PluginConfig {
    /// Parse a TOML fragment.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = Some(extension.into());
        self
    }

    pub fn with_pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    pub fn with_props_header(mut self, props_header: bool) -> Self {
        self.props_header = props_header;
        self
    }

    /// String-valued engine-specific setting.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Everything a plugin receives when it is initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginContext {
    pub config: PluginConfig,
    pub output_dir: PathBuf,
}

impl PluginContext {
    pub fn new(config: PluginConfig) -> Self {
        let output_dir = config.output_dir.clone();
        Self { config, output_dir }
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::new(PluginConfig::default())
    }
}

/// Ensure an extension carries exactly one leading dot.
pub fn normalize_extension(extension: &str) -> String {
    format!(".{}", extension.trim().trim_start_matches('.'))
}
