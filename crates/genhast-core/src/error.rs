//! Error types for schema validation, rendering, plugin lifecycle and the registry.
//!
//! Validation findings produced by `TemplatePlugin::validate` are data, not
//! errors; see [`crate::validation::ValidationResult`].

use std::fmt;

use crate::plugin::Feature;
use crate::tree::{AnnotationKind, SourceAnnotation};

/// Where in a tree an error was detected.
///
/// `path` is an element path such as `/div[0]/ul[1]/li[0]`, where each index is
/// the position among the parent's children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeLocation {
    pub path: String,
    pub source: Option<SourceAnnotation>,
}

impl NodeLocation {
    pub fn new(path: impl Into<String>, source: Option<&SourceAnnotation>) -> Self {
        Self {
            path: path.into(),
            source: source.cloned(),
        }
    }
}

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("/")?;
        } else {
            f.write_str(&self.path)?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

/// Malformed tree or annotation at the input boundary.
#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("malformed GenHAST document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid `{annotation}` annotation at {location}: {reason}")]
    InvalidAnnotation {
        annotation: AnnotationKind,
        location: NodeLocation,
        reason: String,
    },
    #[error("invalid tree structure at {location}: {reason}")]
    InvalidStructure {
        location: NodeLocation,
        reason: String,
    },
}

/// A renderer was requested that the plugin's feature flags rule out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("plugin '{plugin}' does not support {feature}")]
pub struct UnsupportedFeatureError {
    pub plugin: String,
    pub feature: Feature,
}

/// Errors that abort a single `transform` call.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),
    #[error("plugin '{plugin}' does not support {feature} (required at {location})")]
    UnsupportedFeature {
        plugin: String,
        feature: Feature,
        location: NodeLocation,
    },
    #[error("plugin '{plugin}' must be initialized before rendering")]
    PluginNotInitialized { plugin: String },
}

/// Plugin lifecycle misuse: each step runs at most once, in order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("plugin '{plugin}' is already initialized")]
    AlreadyInitialized { plugin: String },
    #[error("plugin '{plugin}' was never initialized")]
    NotInitialized { plugin: String },
    #[error("plugin '{plugin}' is already disposed")]
    AlreadyDisposed { plugin: String },
    #[error("plugin '{plugin}' failed to release resources: {reason}")]
    DisposeFailed { plugin: String, reason: String },
}

/// Registry misuse.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no template plugin registered under '{0}'")]
    UnregisteredPlugin(String),
    #[error("a template plugin named '{0}' is already registered")]
    DuplicatePlugin(String),
    #[error("plugin '{0}' was registered as an instance and cannot be constructed again")]
    NotConstructible(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Errors while loading plugin configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse plugin config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display_root() {
        assert_eq!(NodeLocation::default().to_string(), "/");
    }

    #[test]
    fn test_location_display_with_source() {
        let source = SourceAnnotation {
            file: Some("Card.vue".into()),
            line: Some(3),
            column: None,
        };
        let location = NodeLocation::new("/div[0]/span[2]", Some(&source));
        assert_eq!(location.to_string(), "/div[0]/span[2] (Card.vue:3)");
    }

    #[test]
    fn test_unsupported_feature_message_names_location() {
        let err = RenderError::UnsupportedFeature {
            plugin: "handlebars".into(),
            feature: Feature::Inheritance,
            location: NodeLocation::new("/main[0]", None),
        };
        let msg = err.to_string();
        assert!(msg.contains("handlebars"));
        assert!(msg.contains("template inheritance"));
        assert!(msg.contains("/main[0]"));
    }
}
