//! Latte (`.latte`) target.
//!
//! Latte expressions are PHP: variables carry a `$` sigil and property access
//! uses `->`. `format_expression` converts dotted identifier paths to that
//! form and leaves literals, keywords and function calls alone.

use std::sync::LazyLock;

use genhast_core::error::UnsupportedFeatureError;
use genhast_core::filters::{literal, quote_args, quote_str, FilterMapping, FilterTable, StandardFilter};
use genhast_core::plugin::{FeatureFlags, PluginMetadata, PluginState, TemplatePlugin};
use genhast_core::tree::{
    BlockAnnotation, ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation,
    VariableAnnotation,
};
use genhast_core::validation::{check_delimiters, BlockBalance, ValidationResult};
use regex::Regex;
use serde_json::Value;

use crate::syntax::wrap;

/// `{name` / `{/name`; `{$var}` and `{* comments *}` never match.
static LATTE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(/?)([a-zA-Z][a-zA-Z0-9]*)").unwrap());

const LATTE_PAIRED: &[&str] = &[
    "foreach", "for", "while", "if", "ifset", "ifchanged", "block", "define", "capture", "switch",
    "first", "last", "sep", "snippet", "spaceless", "try", "embed",
];

const PHP_KEYWORDS: &[&str] = &[
    "true",
    "false",
    "null",
    "and",
    "or",
    "xor",
    "not",
    "instanceof",
    "new",
    "TRUE",
    "FALSE",
    "NULL",
];

fn latte_args(args: &[Value]) -> String {
    quote_args(args, '\'', ", ")
}

/// Whether the text before an identifier makes it a variable or member name
/// already (`$x`, `$a->x`, `Foo::x`).
fn follows_accessor(before: &[char]) -> bool {
    before.ends_with(&['$']) || before.ends_with(&['-', '>']) || before.ends_with(&[':', ':'])
}

/// Rewrite identifier paths (`a.b.c`) to `$a->b->c`.
///
/// A dotted path followed by `(` is a method call on a variable
/// (`item.getName()` becomes `$item->getName()`); a bare name followed by `(`
/// is a PHP function and is left alone, as is `Class::` access.
fn php_expression(expression: &str) -> String {
    let chars: Vec<char> = expression.trim().chars().collect();
    let mut out = String::with_capacity(expression.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                out.extend(&chars[start..i]);
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let path: String = chars[start..i].iter().collect();
                let path = path.trim_end_matches('.');
                i = start + path.chars().count();

                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                let dotted = path.contains('.');
                let call = next == Some(&'(') && !dotted;
                let keyword = !dotted && PHP_KEYWORDS.contains(&path);
                let class = chars[i..].starts_with(&[':', ':']);
                if follows_accessor(&chars[..start]) || call || keyword || class {
                    out.push_str(path);
                } else {
                    out.push('$');
                    out.push_str(&path.replace('.', "->"));
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

#[derive(Debug)]
pub struct LattePlugin {
    metadata: PluginMetadata,
    state: PluginState,
}

impl LattePlugin {
    pub const NAME: &'static str = "latte";

    pub fn new() -> Self {
        Self {
            metadata: Self::plugin_metadata(),
            state: PluginState::new(),
        }
    }

    pub fn plugin_metadata() -> PluginMetadata {
        PluginMetadata::new(Self::NAME, "1.0.0", ".latte", "php")
            .with_description("Nette Latte templates")
    }
}

impl Default for LattePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlugin for LattePlugin {
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
            .with(F::Capitalize, FilterMapping::new("firstUpper"))
            .with(F::Trim, FilterMapping::new("trim"))
            .with(F::Date, FilterMapping::with_args("date", latte_args))
            .with(F::Currency, FilterMapping::with_args("currency", latte_args))
            .with(F::Number, FilterMapping::with_args("number", latte_args))
            .with(F::Json, FilterMapping::new("json"))
            .with(F::Escape, FilterMapping::new("escape"))
            .with(F::Raw, FilterMapping::new("noescape"))
            .with(F::First, FilterMapping::new("first"))
            .with(F::Last, FilterMapping::new("last"))
            .with(F::Length, FilterMapping::new("length"))
            .with(F::Join, FilterMapping::with_args("implode", latte_args))
            .with(F::Split, FilterMapping::with_args("explode", latte_args))
            .with(F::Reverse, FilterMapping::new("reverse"))
            .with(F::Sort, FilterMapping::new("sort"))
            .with(F::Slice, FilterMapping::with_args("slice", latte_args))
            .with(F::Truncate, FilterMapping::with_args("truncate", latte_args))
    }

    fn render_loop(&self, annotation: &LoopAnnotation, content: &str) -> String {
        let collection = self.format_expression(&annotation.collection);
        let open = match &annotation.key {
            Some(key) => format!("{{foreach {collection} as ${key} => ${}}}", annotation.item),
            None => format!("{{foreach {collection} as ${}}}", annotation.item),
        };
        match &annotation.index {
            Some(index) => wrap(
                &open,
                &format!("{{var ${index} = $iterator->counter0}}\n{content}"),
                "{/foreach}",
            ),
            None => wrap(&open, content, "{/foreach}"),
        }
    }

    fn render_condition(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        wrap(
            &format!("{{if {}}}", self.format_expression(&annotation.expression)),
            content,
            "{/if}",
        )
    }

    fn render_else(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        if annotation.is_else_if {
            format!(
                "{{elseif {}}}\n{content}",
                self.format_expression(&annotation.expression)
            )
        } else {
            format!("{{else}}\n{content}")
        }
    }

    fn render_variable(&self, annotation: &VariableAnnotation, raw: bool) -> String {
        let mut expression = self.format_expression(&annotation.name);
        if let Some(default) = &annotation.default {
            expression = format!("{expression} ?? {}", quote_str(default, '\''));
        }
        if let Some(filter) = &annotation.filter {
            expression = self.apply_filter(&expression, filter, &annotation.filter_args);
        }
        if raw {
            expression.push_str("|noescape");
        }
        format!("{{{expression}}}")
    }

    fn render_slot(&self, annotation: &SlotAnnotation, fallback: &str) -> String {
        let slot = format!("$slots[{}]", quote_str(&annotation.name, '\''));
        let output = format!("{{ifset {slot}}}\n{{{slot}|noescape}}");
        if fallback.is_empty() {
            format!("{output}\n{{/ifset}}")
        } else {
            format!("{output}\n{{else}}\n{fallback}\n{{/ifset}}")
        }
    }

    fn render_include(&self, annotation: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
        let mut parts = vec![quote_str(&self.partial_path(&annotation.partial), '\'')];
        for (name, value) in &annotation.props {
            let value = match value {
                Value::String(expression) => self.format_expression(expression),
                other => literal(other, '\''),
            };
            parts.push(format!("{name}: {value}"));
        }
        Ok(format!("{{include {}}}", parts.join(", ")))
    }

    fn render_block(
        &self,
        annotation: &BlockAnnotation,
        content: &str,
    ) -> Result<String, UnsupportedFeatureError> {
        Ok(wrap(
            &format!("{{block {}}}", annotation.name),
            content,
            "{/block}",
        ))
    }

    fn render_extends(&self, parent: &str) -> Result<String, UnsupportedFeatureError> {
        Ok(format!(
            "{{layout {}}}",
            quote_str(&self.partial_path(parent), '\'')
        ))
    }

    fn render_comment(&self, text: &str) -> String {
        format!("{{* {} *}}", text.trim())
    }

    fn format_expression(&self, expression: &str) -> String {
        php_expression(expression)
    }

    fn filter_call(&self, expression: &str, name: &str, args: &str) -> String {
        if args.is_empty() {
            format!("{expression}|{name}")
        } else {
            format!("{expression}|{name}:{args}")
        }
    }

    fn validate(&self, content: &str) -> ValidationResult {
        let mut balance = BlockBalance::new();
        for caps in LATTE_TAG.captures_iter(content) {
            let closing = !caps[1].is_empty();
            let name = &caps[2];
            match name {
                "else" if !closing => balance.branch(name, &["if", "ifset", "foreach"]),
                "elseif" if !closing => balance.branch(name, &["if"]),
                "elseifset" if !closing => balance.branch(name, &["ifset"]),
                _ if LATTE_PAIRED.contains(&name) => {
                    if closing {
                        balance.close(name);
                    } else {
                        balance.open(name);
                    }
                }
                _ => {}
            }
        }

        let mut errors = balance.finish();
        errors.extend(check_delimiters(content, "{", "}"));
        errors.extend(check_delimiters(content, "{*", "*}"));
        ValidationResult::from_errors(errors)
    }
}
