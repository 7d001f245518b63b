//! Twig (`.twig`) target.

use genhast_core::error::UnsupportedFeatureError;
use genhast_core::filters::{literal, quote_args, quote_str, FilterMapping, FilterTable, StandardFilter};
use genhast_core::plugin::{FeatureFlags, PluginMetadata, PluginState, TemplatePlugin};
use genhast_core::tree::{
    BlockAnnotation, ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation,
    VariableAnnotation,
};
use genhast_core::validation::ValidationResult;
use serde_json::Value;

use crate::syntax::{is_identifier, validate_word_blocks, word_operators, wrap};

fn single_quoted(args: &[Value]) -> String {
    quote_args(args, '\'', ", ")
}

/// Non-identifier slot names need subscript syntax.
fn slot_ref(name: &str) -> String {
    if is_identifier(name) {
        format!("slots.{name}")
    } else {
        format!("slots[{}]", quote_str(name, '\''))
    }
}

#[derive(Debug)]
pub struct TwigPlugin {
    metadata: PluginMetadata,
    state: PluginState,
}

impl TwigPlugin {
    pub const NAME: &'static str = "twig";

    pub fn new() -> Self {
        Self {
            metadata: Self::plugin_metadata(),
            state: PluginState::new(),
        }
    }

    pub fn plugin_metadata() -> PluginMetadata {
        PluginMetadata::new(Self::NAME, "1.0.0", ".twig", "php")
            .with_description("Symfony Twig templates")
    }
}

impl Default for TwigPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlugin for TwigPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn features(&self) -> FeatureFlags {
        FeatureFlags {
            supports_inheritance: true,
            supports_partials: true,
            supports_filters: true,
            supports_macros: true,
            supports_async: false,
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
            .with(F::Date, FilterMapping::with_args("date", single_quoted))
            .with(F::Currency, FilterMapping::with_args("format_currency", single_quoted))
            .with(F::Number, FilterMapping::with_args("number_format", single_quoted))
            .with(F::Json, FilterMapping::new("json_encode"))
            .with(F::Escape, FilterMapping::new("e"))
            .with(F::Raw, FilterMapping::new("raw"))
            .with(F::Default, FilterMapping::with_args("default", single_quoted))
            .with(F::First, FilterMapping::new("first"))
            .with(F::Last, FilterMapping::new("last"))
            .with(F::Length, FilterMapping::new("length"))
            .with(F::Join, FilterMapping::with_args("join", single_quoted))
            .with(F::Split, FilterMapping::with_args("split", single_quoted))
            .with(F::Reverse, FilterMapping::new("reverse"))
            .with(F::Sort, FilterMapping::new("sort"))
            .with(F::Slice, FilterMapping::with_args("slice", single_quoted))
            .with(F::Truncate, FilterMapping::with_args("u.truncate", single_quoted))
    }

    fn render_loop(&self, annotation: &LoopAnnotation, content: &str) -> String {
        let binding = match &annotation.key {
            Some(key) => format!("{key}, {}", annotation.item),
            None => annotation.item.clone(),
        };
        let open = format!("{{% for {binding} in {} %}}", annotation.collection);
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
                "{{% elseif {} %}}\n{content}",
                self.format_expression(&annotation.expression)
            )
        } else {
            format!("{{% else %}}\n{content}")
        }
    }

    fn render_variable(&self, annotation: &VariableAnnotation, raw: bool) -> String {
        let mut expression = annotation.name.clone();
        if let Some(default) = &annotation.default {
            expression = format!("{expression}|default({})", quote_str(default, '\''));
        }
        if let Some(filter) = &annotation.filter {
            expression = self.apply_filter(&expression, filter, &annotation.filter_args);
        }
        if raw {
            expression.push_str("|raw");
        }
        format!("{{{{ {expression} }}}}")
    }

    fn render_slot(&self, annotation: &SlotAnnotation, fallback: &str) -> String {
        let slot = slot_ref(&annotation.name);
        let output = format!("{{% if {slot} is defined %}}\n{{{{ {slot}|raw }}}}");
        if fallback.is_empty() {
            format!("{output}\n{{% endif %}}")
        } else {
            format!("{output}\n{{% else %}}\n{fallback}\n{{% endif %}}")
        }
    }

    fn render_include(&self, annotation: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
        let path = quote_str(&self.partial_path(&annotation.partial), '\'');
        if annotation.props.is_empty() {
            return Ok(format!("{{% include {path} %}}"));
        }
        let props = annotation
            .props
            .iter()
            .map(|(name, value)| match value {
                Value::String(expression) => format!("{name}: {expression}"),
                other => format!("{name}: {}", literal(other, '\'')),
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("{{% include {path} with {{ {props} }} %}}"))
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
            quote_str(&self.partial_path(parent), '\'')
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
            format!("{expression}|{name}")
        } else {
            format!("{expression}|{name}({args})")
        }
    }

    fn validate(&self, content: &str) -> ValidationResult {
        validate_word_blocks(content)
    }
}
