//! Shared fixtures for the integration suites.
//
// Not every suite uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use genhast::genhast_core::tree::{
    ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation, VariableAnnotation,
};
use genhast::{
    builtin_registry, GenAnnotations, GenComponentMeta, GenElement, GenNode, GenRoot,
    PluginConfig, PluginRegistry, TemplatePlugin, BUILTIN_PLUGINS,
};

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A registry with every built-in engine registered.
pub fn registry() -> PluginRegistry {
    init_tracing();
    builtin_registry().expect("built-in plugins register into an empty registry")
}

/// Fresh, initialized instances of every built-in engine.
pub fn initialized_plugins(registry: &PluginRegistry) -> Vec<Arc<dyn TemplatePlugin>> {
    BUILTIN_PLUGINS
        .iter()
        .map(|name| {
            registry
                .create(name, Some(&PluginConfig::default()))
                .expect("built-in plugin constructs")
        })
        .collect()
}

pub fn element(tag: &str) -> GenElement {
    GenElement::new(tag)
}

/// A product card touching every engine-independent annotation:
///
/// ```text
/// <article class="card">
///   <h2 variable=title default=Untitled />
///   <site-badge include=partials/badge />
///   <ul>
///     <li loop=product in products condition=product.visible>
///       <span variable=product.name />
///     </li>
///   </ul>
///   <p condition="products.length == 0">Empty</p>
///   <p else>...</p>
///   <slot name=footer>Default footer</slot>
/// </article>
/// ```
pub fn product_card() -> GenRoot {
    let item = element("li")
        .with_gen(GenAnnotations {
            r#loop: Some(LoopAnnotation::new("product", "products")),
            condition: Some(ConditionAnnotation::new("product.visible")),
            ..Default::default()
        })
        .with_child(
            element("span").with_gen(GenAnnotations::variable(VariableAnnotation::new(
                "product.name",
            ))),
        );

    let card = element("article")
        .with_property("className", vec!["card"])
        .with_child(element("h2").with_gen(GenAnnotations::variable(
            VariableAnnotation::new("title").with_default("Untitled"),
        )))
        .with_child(
            element("site-badge")
                .with_gen(GenAnnotations::include(IncludeAnnotation::new("partials/badge"))),
        )
        .with_child(element("ul").with_child(item))
        .with_child(
            element("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::new(
                    "products.length == 0",
                )))
                .with_text("Empty"),
        )
        .with_child(GenNode::text("\n"))
        .with_child(
            element("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::else_branch()))
                .with_text("Browse the catalogue"),
        )
        .with_child(
            element("slot")
                .with_gen(GenAnnotations::slot(SlotAnnotation::new("footer")))
                .with_text("Default footer"),
        );

    GenRoot::new(vec![card.into()]).with_meta(GenComponentMeta::named("ProductCard"))
}
