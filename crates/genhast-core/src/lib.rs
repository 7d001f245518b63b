//! Core of the GenHAST template generator: the annotated tree, the plugin
//! contract every target engine implements, the renderer that drives it and
//! the registry that hands out plugin instances.
//!
//! # Modules
//!
//! ## Tree
//! - [`tree`]: GenHAST nodes, annotations and component metadata
//! - [`schema`]: Structural validation of trees at the input boundary
//!
//! ## Plugins
//! - [`plugin`]: `TemplatePlugin` trait, feature flags and lifecycle state
//! - [`filters`]: Standard filter vocabulary and per-engine filter tables
//! - [`html`]: Tag, attribute and text serialization shared by all engines
//! - [`validation`]: Helpers for best-effort output validation
//! - [`config`]: Plugin configuration and initialization context
//!
//! ## Rendering
//! - [`render`]: `transform`: tree + plugin → `TemplateOutput`
//! - [`registry`]: Plugin registration, instance cache and teardown
//! - [`error`]: Error taxonomy

pub mod config;
pub mod error;
pub mod filters;
pub mod html;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod schema;
pub mod tree;
pub mod validation;

pub use config::{PluginConfig, PluginContext};
pub use error::{
    ConfigError, LifecycleError, NodeLocation, RegistryError, RenderError, SchemaValidationError,
    UnsupportedFeatureError,
};
pub use filters::{FilterMapping, FilterTable, StandardFilter};
pub use plugin::{Feature, FeatureFlags, Lifecycle, PluginMetadata, PluginState, TemplatePlugin};
pub use registry::{DisposeReport, PluginFactory, PluginRegistry};
pub use render::{transform, transform_all, RenderStage, TemplateOutput, RENDER_STAGES};
pub use tree::{GenAnnotations, GenComponentMeta, GenElement, GenNode, GenRoot};
pub use validation::ValidationResult;
