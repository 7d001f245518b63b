//! Nunjucks (`.njk`) target.

use genhast_core::error::UnsupportedFeatureError;
use genhast_core::filters::{literal, quote_args, quote_str, FilterMapping, FilterTable, StandardFilter};
use genhast_core::plugin::{FeatureFlags, PluginMetadata, PluginState, TemplatePlugin};
use genhast_core::tree::{
    BlockAnnotation, ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation,
    VariableAnnotation,
};
use genhast_core::validation::ValidationResult;
use serde_json::Value;

use crate::syntax::{dotted_slot, validate_word_blocks, word_operators, wrap};

fn double_quoted(args: &[Value]) -> String {
    quote_args(args, '"', ", ")
}

#[derive(Debug)]
pub struct NunjucksPlugin {
    metadata: PluginMetadata,
    state: PluginState,
}

impl NunjucksPlugin {
    pub const NAME: &'static str = "nunjucks";

    pub fn new() -> Self {
        Self {
            metadata: Self::plugin_metadata(),
            state: PluginState::new(),
        }
    }

    pub fn plugin_metadata() -> PluginMetadata {
        PluginMetadata::new(Self::NAME, "1.0.0", ".njk", "node")
            .with_description("Mozilla Nunjucks templates")
    }
}

impl Default for NunjucksPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlugin for NunjucksPlugin {
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
            .with(F::Date, FilterMapping::with_args("date", double_quoted))
            .with(F::Currency, FilterMapping::with_args("currency", double_quoted))
            .with(F::Number, FilterMapping::with_args("round", double_quoted))
            .with(F::Json, FilterMapping::new("dump"))
            .with(F::Escape, FilterMapping::new("escape"))
            .with(F::Raw, FilterMapping::new("safe"))
            .with(F::Default, FilterMapping::with_args("default", double_quoted))
            .with(F::First, FilterMapping::new("first"))
            .with(F::Last, FilterMapping::new("last"))
            .with(F::Length, FilterMapping::new("length"))
            .with(F::Join, FilterMapping::with_args("join", double_quoted))
            .with(F::Split, FilterMapping::with_args("split", double_quoted))
            .with(F::Reverse, FilterMapping::new("reverse"))
            .with(F::Sort, FilterMapping::new("sort"))
            .with(F::Slice, FilterMapping::with_args("slice", double_quoted))
            .with(F::Truncate, FilterMapping::with_args("truncate", double_quoted))
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
        let output = format!("{{% if {slot} %}}\n{{{{ {slot} | safe }}}}");
        if fallback.is_empty() {
            format!("{output}\n{{% endif %}}")
        } else {
            format!("{output}\n{{% else %}}\n{fallback}\n{{% endif %}}")
        }
    }

    /// Nunjucks includes take no arguments, so props become `{% set %}`
    /// statements ahead of the include. Those assignments stay visible to the
    /// rest of the enclosing scope (the template, or the surrounding `for`
    /// body) and overwrite same-named variables there.
    fn render_include(&self, annotation: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
        let mut out = String::new();
        for (name, value) in &annotation.props {
            let value = match value {
                Value::String(expression) => expression.clone(),
                other => literal(other, '"'),
            };
            out.push_str(&format!("{{% set {name} = {value} %}}\n"));
        }
        out.push_str(&format!(
            "{{% include {} %}}",
            quote_str(&self.partial_path(&annotation.partial), '"')
        ));
        Ok(out)
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
