//! Registry lifecycle against the built-in engines.

mod common;

use std::sync::Arc;

use common::{product_card, registry};
use genhast::{
    LifecycleError, PluginConfig, PluginContext, RegistryError, RenderError, BUILTIN_PLUGINS,
};

#[test]
fn test_get_memoizes_and_create_does_not() {
    let registry = registry();
    let config = PluginConfig::default();

    let first = registry.get("twig", Some(&config)).unwrap();
    let second = registry.get("twig", None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.is_initialized());

    let fresh = registry.create("twig", Some(&config)).unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
}

#[test]
fn test_get_without_config_requires_initialize() {
    let registry = registry();
    let plugin = registry.get("jinja", None).unwrap();
    assert!(!plugin.is_initialized());

    assert!(matches!(
        registry.render("jinja", &product_card()),
        Err(RegistryError::Render(RenderError::PluginNotInitialized { plugin })) if plugin == "jinja"
    ));

    registry
        .initialize("jinja", &PluginContext::new(PluginConfig::default()))
        .unwrap();
    let output = registry.render("jinja", &product_card()).unwrap();
    assert_eq!(output.filename, "product-card.jinja");

    assert!(matches!(
        registry.initialize("jinja", &PluginContext::default()),
        Err(RegistryError::Lifecycle(LifecycleError::AlreadyInitialized { .. }))
    ));
}

#[test]
fn test_config_file_extension_override() {
    let registry = registry();
    let config = PluginConfig::from_toml_str("file-extension = \"html.twig\"\n").unwrap();
    let plugin = registry.create("twig", Some(&config)).unwrap();

    assert_eq!(plugin.file_extension(), ".html.twig");
    let output = genhast::transform(&product_card(), plugin.as_ref()).unwrap();
    assert_eq!(output.filename, "product-card.html.twig");
    assert!(output.content.contains("'partials/badge.html.twig'"));
}

#[test]
fn test_unknown_plugin_is_reported() {
    let registry = registry();
    assert!(matches!(
        registry.get("mustache", None),
        Err(RegistryError::UnregisteredPlugin(name)) if name == "mustache"
    ));
    assert!(registry.get_metadata("mustache").is_none());
}

#[test]
fn test_dispose_all_then_get_builds_new_instances() {
    let registry = registry();
    let config = PluginConfig::default();
    let before: Vec<_> = BUILTIN_PLUGINS
        .iter()
        .map(|name| registry.get(name, Some(&config)).unwrap())
        .collect();

    let report = registry.dispose_all();
    assert!(report.is_clean());
    assert!(report.unregistered.is_empty());
    assert_eq!(report.disposed.len(), BUILTIN_PLUGINS.len());
    for plugin in &before {
        assert!(!plugin.is_initialized());
    }

    // Registrations survive disposal.
    assert_eq!(registry.size(), BUILTIN_PLUGINS.len());
    let after = registry.get("nunjucks", Some(&config)).unwrap();
    assert!(!Arc::ptr_eq(&before[0], &after));
    assert!(after.is_initialized());
}

#[test]
fn test_unregister_and_clear() {
    let registry = registry();
    registry.get("latte", Some(&PluginConfig::default())).unwrap();

    assert!(registry.unregister("latte"));
    assert!(!registry.unregister("latte"));
    assert!(!registry.has("latte"));
    assert_eq!(registry.get_by_runtime("php").len(), 1);

    registry.clear();
    assert_eq!(registry.size(), 0);
    assert!(registry.get_all_metadata().is_empty());
}

#[test]
fn test_concurrent_first_get_yields_one_instance() {
    let registry = registry();
    let config = PluginConfig::default();

    let instances: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.get("handlebars", Some(&config)).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}
