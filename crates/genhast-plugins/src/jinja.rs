//! Jinja2 (`.jinja`) target.

use genhast_core::error::UnsupportedFeatureError;
use genhast_core::filters::{quote_str, FilterMapping, FilterTable, StandardFilter};
use genhast_core::plugin::{FeatureFlags, PluginMetadata, PluginState, TemplatePlugin};
use genhast_core::tree::{
    BlockAnnotation, ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation,
    VariableAnnotation,
};
use genhast_core::validation::ValidationResult;
use serde_json::Value;

use crate::syntax::{dotted_slot, validate_word_blocks, word_operators, wrap};

/// A JSON value as a Jinja literal (`none`, lowercase booleans).
fn jinja_literal(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::String(s) => quote_str(s, '"'),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(jinja_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", quote_str(k, '"'), jinja_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Number(n) => n.to_string(),
    }
}

fn jinja_args(args: &[Value]) -> String {
    args.iter().map(jinja_literal).collect::<Vec<_>>().join(", ")
}

#[derive(Debug)]
pub struct JinjaPlugin {
    metadata: PluginMetadata,
    state: PluginState,
}

impl JinjaPlugin {
    pub const NAME: &'static str = "jinja";

    pub fn new() -> Self {
        Self {
            metadata: Self::plugin_metadata(),
            state: PluginState::new(),
        }
    }

    pub fn plugin_metadata() -> PluginMetadata {
        PluginMetadata::new(Self::NAME, "1.0.0", ".jinja", "python")
            .with_description("Jinja2 templates for Python hosts")
    }
}

impl Default for JinjaPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlugin for JinjaPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn features(&self) -> FeatureFlags {
        FeatureFlags {
            supports_inheritance: true,
            supports_partials: true,
            supports_filters: true,
            supports_macros: true,
            supports_async: true,
            supports_raw: true,
            supports_comments: true,
        }
    }

    fn state(&self) -> &PluginState {
        &self.state
    }

    fn build_filter_table(&self) -> FilterTable {
        use StandardFilter as F;
        FilterTable::new()
            .with(F::Uppercase, FilterMapping::new("upper"))
            .with(F::Lowercase, FilterMapping::new("lower"))
            .with(F::Capitalize, FilterMapping::new("capitalize"))
            .with(F::Trim, FilterMapping::new("trim"))
            .with(F::Date, FilterMapping::with_args("strftime", jinja_args))
            .with(F::Currency, FilterMapping::with_args("currency", jinja_args))
            .with(F::Number, FilterMapping::with_args("round", jinja_args))
            .with(F::Json, FilterMapping::new("tojson"))
            .with(F::Escape, FilterMapping::new("e"))
            .with(F::Raw, FilterMapping::new("safe"))
            .with(F::Default, FilterMapping::with_args("default", jinja_args))
            .with(F::First, FilterMapping::new("first"))
            .with(F::Last, FilterMapping::new("last"))
            .with(F::Length, FilterMapping::new("length"))
            .with(F::Join, FilterMapping::with_args("join", jinja_args))
            .with(F::Split, FilterMapping::with_args("split", jinja_args))
            .with(F::Reverse, FilterMapping::new("reverse"))
            .with(F::Sort, FilterMapping::new("sort"))
            .with(F::Slice, FilterMapping::with_args("slice", jinja_args))
            .with(F::Truncate, FilterMapping::with_args("truncate", jinja_args))
    }

    fn render_loop(&self, annotation: &LoopAnnotation, content: &str) -> String {
        let open = match &annotation.key {
            Some(key) => format!(
                "{{% for {key}, {} in {}.items() %}}",
                annotation.item, annotation.collection
            ),
            None => format!(
                "{{% for {} in {} %}}",
                annotation.item, annotation.collection
            ),
        };
        match &annotation.index {
            Some(index) => wrap(
                &open,
                &format!("{{% set {index} = loop.index0 %}}\n{content}"),
                "{% endfor %}",
            ),
            None => wrap(&open, content, "{% endfor %}"),
        }
    }

    fn render_condition(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        wrap(
            &format!("{{% if {} %}}", self.format_expression(&annotation.expression)),
            content,
            "{% endif %}",
        )
    }

    fn render_else(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        if annotation.is_else_if {
            format!(
                "{{% elif {} %}}\n{content}",
                self.format_expression(&annotation.expression)
            )
        } else {
            format!("{{% else %}}\n{content}")
        }
    }

    fn render_variable(&self, annotation: &VariableAnnotation, raw: bool) -> String {
        let mut expression = annotation.name.clone();
        if let Some(default) = &annotation.default {
            expression = format!("{expression} | default({})", quote_str(default, '"'));
        }
        if let Some(filter) = &annotation.filter {
            expression = self.apply_filter(&expression, filter, &annotation.filter_args);
        }
        if raw {
            expression.push_str(" | safe");
        }
        format!("{{{{ {expression} }}}}")
    }

    fn render_slot(&self, annotation: &SlotAnnotation, fallback: &str) -> String {
        let slot = dotted_slot(&annotation.name);
        let output = format!("{{% if {slot} is defined %}}\n{{{{ {slot} | safe }}}}");
        if fallback.is_empty() {
            format!("{output}\n{{% endif %}}")
        } else {
            format!("{output}\n{{% else %}}\n{fallback}\n{{% endif %}}")
        }
    }

    fn render_include(&self, annotation: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
        let include = format!(
            "{{% include {} %}}",
            quote_str(&self.partial_path(&annotation.partial), '"')
        );
        if annotation.props.is_empty() {
            return Ok(include);
        }
        // `with` scopes the props to the included template.
        let bindings = annotation
            .props
            .iter()
            .map(|(name, value)| match value {
                Value::String(expression) => format!("{name} = {expression}"),
                other => format!("{name} = {}", jinja_literal(other)),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(wrap(
            &format!("{{% with {bindings} %}}"),
            &include,
            "{% endwith %}",
        ))
    }

    fn render_block(
        &self,
        annotation: &BlockAnnotation,
        content: &str,
    ) -> Result<String, UnsupportedFeatureError> {
        Ok(wrap(
            &format!("{{% block {} %}}", annotation.name),
            content,
            "{% endblock %}",
        ))
    }

    fn render_extends(&self, parent: &str) -> Result<String, UnsupportedFeatureError> {
        Ok(format!(
            "{{% extends {} %}}",
            quote_str(&self.partial_path(parent), '"')
        ))
    }

    fn render_comment(&self, text: &str) -> String {
        format!("{{# {} #}}", text.trim())
    }

    fn format_expression(&self, expression: &str) -> String {
        word_operators(expression)
    }

    fn filter_call(&self, expression: &str, name: &str, args: &str) -> String {
        if args.is_empty() {
            format!("{expression} | {name}")
        } else {
            format!("{expression} | {name}({args})")
        }
    }

    fn validate(&self, content: &str) -> ValidationResult {
        validate_word_blocks(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genhast_core::config::PluginContext;
    use serde_json::json;

    fn plugin() -> JinjaPlugin {
        let plugin = JinjaPlugin::new();
        plugin.initialize(&PluginContext::default()).unwrap();
        plugin
    }

    #[test]
    fn test_render_loop() {
        let p = plugin();
        assert_eq!(
            p.render_loop(
                &LoopAnnotation::new("product", "products"),
                "<div>{{ product.name }}</div>"
            ),
            "{% for product in products %}\n<div>{{ product.name }}</div>\n{% endfor %}"
        );
        assert_eq!(
            p.render_loop(&LoopAnnotation::new("v", "attrs").with_key("k"), "x"),
            "{% for k, v in attrs.items() %}\nx\n{% endfor %}"
        );
    }

    #[test]
    fn test_render_condition_rewrites_operators() {
        let out = plugin().render_condition(&ConditionAnnotation::new("isAdmin && isLoggedIn"), "X");
        assert!(out.contains("isAdmin and isLoggedIn"));
        assert!(!out.contains("&&"));
    }

    #[test]
    fn test_filter_names() {
        let p = plugin();
        assert_eq!(p.apply_filter("data", "json", &[]), "data | tojson");
        assert_eq!(p.apply_filter("html", "escape", &[]), "html | e");
        assert_eq!(
            p.apply_filter("tags", "join", &[json!(", ")]),
            "tags | join(\", \")"
        );
        assert_eq!(
            p.apply_filter("x", "default", &[json!(null)]),
            "x | default(none)"
        );
    }

    #[test]
    fn test_render_variable_with_default() {
        let out = plugin().render_variable(&VariableAnnotation::new("title").with_default("Untitled"), false);
        assert_eq!(out, "{{ title | default(\"Untitled\") }}");
    }

    #[test]
    fn test_render_slot_uses_is_defined() {
        let out = plugin().render_slot(&SlotAnnotation::new("side-bar"), "-");
        assert_eq!(
            out,
            "{% if slots[\"side-bar\"] is defined %}\n{{ slots[\"side-bar\"] | safe }}\n{% else %}\n-\n{% endif %}"
        );
    }

    #[test]
    fn test_render_include_with_props() {
        let out = plugin()
            .render_include(
                &IncludeAnnotation::new("partials/card")
                    .with_prop("item", "product")
                    .with_prop("featured", json!(false)),
            )
            .unwrap();
        assert_eq!(
            out,
            "{% with item = product, featured = false %}\n{% include \"partials/card.jinja\" %}\n{% endwith %}"
        );
        assert!(plugin().validate(&out).valid);
    }

    #[test]
    fn test_jinja_literals() {
        assert_eq!(jinja_literal(&json!({"a": [1, null]})), "{\"a\": [1, none]}");
    }
}
