//! GenHAST: engine-agnostic template generation from annotated HTML trees.
//!
//! A front end produces a [`GenRoot`] whose elements carry `_gen` annotations
//! (loops, conditions, variables, slots, includes, blocks). This crate turns
//! that tree into source text for a concrete template engine:
//!
//! - [`genhast_core`] holds the tree model, the [`TemplatePlugin`] contract,
//!   the renderer ([`transform`]) and the [`PluginRegistry`].
//! - [`genhast_plugins`] provides the built-in engines (Nunjucks, Jinja, Twig,
//!   Latte, Handlebars).
//!
//! Typical use builds one registry at startup and passes it where needed:
//! resolve a plugin with [`PluginRegistry::get`] and a config, then call
//! [`transform`] (or [`PluginRegistry::render`]).

pub use genhast_core::{
    transform, transform_all, ConfigError, Feature, FeatureFlags, GenAnnotations,
    GenComponentMeta, GenElement, GenNode, GenRoot, LifecycleError, PluginConfig, PluginContext,
    PluginMetadata, PluginRegistry, RegistryError, RenderError, SchemaValidationError,
    TemplateOutput, TemplatePlugin, ValidationResult,
};
pub use genhast_plugins::{
    builtin_registry, register_builtins, HandlebarsPlugin, JinjaPlugin, LattePlugin,
    NunjucksPlugin, TwigPlugin, BUILTIN_PLUGINS,
};

pub use genhast_core;
pub use genhast_plugins;
