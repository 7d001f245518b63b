//! Built-in template plugins for the GenHAST renderer.
//!
//! # Engines
//!
//! | Plugin | Extension | Runtime | Inheritance |
//! |---|---|---|---|
//! | [`NunjucksPlugin`] | `.njk` | node | yes |
//! | [`JinjaPlugin`] | `.jinja` | python | yes |
//! | [`TwigPlugin`] | `.twig` | php | yes |
//! | [`LattePlugin`] | `.latte` | php | yes |
//! | [`HandlebarsPlugin`] | `.hbs` | node | no |
//!
//! [`register_builtins`] adds all of them to an existing registry;
//! [`builtin_registry`] builds a fresh registry containing only them.

use std::sync::Arc;

use genhast_core::error::RegistryError;
use genhast_core::plugin::{PluginMetadata, TemplatePlugin};
use genhast_core::registry::PluginRegistry;

pub mod handlebars;
pub mod jinja;
pub mod latte;
pub mod nunjucks;
pub mod syntax;
pub mod twig;

pub use handlebars::HandlebarsPlugin;
pub use jinja::JinjaPlugin;
pub use latte::LattePlugin;
pub use nunjucks::NunjucksPlugin;
pub use twig::TwigPlugin;

/// Names of the built-in plugins, in registration order.
pub const BUILTIN_PLUGINS: [&str; 5] = [
    NunjucksPlugin::NAME,
    JinjaPlugin::NAME,
    TwigPlugin::NAME,
    LattePlugin::NAME,
    HandlebarsPlugin::NAME,
];

fn register<P>(
    registry: &PluginRegistry,
    metadata: PluginMetadata,
    construct: fn() -> P,
) -> Result<(), RegistryError>
where
    P: TemplatePlugin + 'static,
{
    registry.register(metadata, move || Arc::new(construct()) as Arc<dyn TemplatePlugin>)
}

/// Register factories for every built-in engine.
///
/// Fails on the first name that is already taken in `registry`.
pub fn register_builtins(registry: &PluginRegistry) -> Result<(), RegistryError> {
    register(registry, NunjucksPlugin::plugin_metadata(), NunjucksPlugin::new)?;
    register(registry, JinjaPlugin::plugin_metadata(), JinjaPlugin::new)?;
    register(registry, TwigPlugin::plugin_metadata(), TwigPlugin::new)?;
    register(registry, LattePlugin::plugin_metadata(), LattePlugin::new)?;
    register(registry, HandlebarsPlugin::plugin_metadata(), HandlebarsPlugin::new)?;
    tracing::debug!(count = BUILTIN_PLUGINS.len(), "Registered built-in template plugins");
    Ok(())
}

/// A new registry populated with the built-in engines.
pub fn builtin_registry() -> Result<PluginRegistry, RegistryError> {
    let registry = PluginRegistry::new();
    register_builtins(&registry)?;
    Ok(registry)
}
