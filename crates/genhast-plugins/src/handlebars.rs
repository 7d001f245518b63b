//! Handlebars (`.hbs`) target.
//!
//! Handlebars has no operators, so boolean expressions are rewritten into
//! helper subexpressions: `a && !b` becomes `(and a (not b))`. The helpers
//! (`and`, `or`, `not`, `eq`, `ne`, `gt`, `gte`, `lt`, `lte`) and the filter
//! helpers must be registered by the host application. Handlebars has no
//! template inheritance; blocks are left unsupported.

use std::sync::LazyLock;

use genhast_core::error::UnsupportedFeatureError;
use genhast_core::filters::{literal, quote_args, FilterMapping, FilterTable, StandardFilter};
use genhast_core::html::escape_text;
use genhast_core::plugin::{FeatureFlags, PluginMetadata, PluginState, TemplatePlugin};
use genhast_core::tree::{
    ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation, VariableAnnotation,
};
use genhast_core::validation::{check_delimiters, BlockBalance, ValidationResult};
use regex::Regex;
use serde_json::Value;

use crate::syntax::{is_identifier, wrap};

static HBS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{~?\s*(?:([#/])\s*([\w.-]+)|(else)\b)").unwrap());

/// Binary operators by increasing binding strength, with their helpers.
const LOGICAL: &[(&str, &str)] = &[("||", "or"), ("&&", "and")];

/// Longest spelling first so `===` is not read as `==`.
const COMPARISON: &[(&str, &str)] = &[
    ("===", "eq"),
    ("!==", "ne"),
    ("==", "eq"),
    ("!=", "ne"),
    (">=", "gte"),
    ("<=", "lte"),
    (">", "gt"),
    ("<", "lt"),
];

fn helper_args(args: &[Value]) -> String {
    quote_args(args, '"', " ")
}

/// Byte offsets of `op` outside parentheses and string literals.
fn top_level_matches(expression: &str, op: &str) -> Vec<usize> {
    let bytes = expression.as_bytes();
    let mut matches = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if depth == 0 && bytes[i..].starts_with(op.as_bytes()) => {
                    matches.push(i);
                    i += op.len();
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }

    matches
}

/// Drop parentheses that enclose the whole expression.
fn strip_enclosing_parens(mut expression: &str) -> &str {
    loop {
        let trimmed = expression.trim();
        let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) else {
            return trimmed;
        };
        // `(a) && (b)` starts and ends with parens without being enclosed.
        let mut depth = 0i32;
        for c in inner.chars() {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return trimmed;
            }
        }
        expression = inner;
    }
}

/// Rewrite a JS-style boolean expression into helper subexpressions.
fn helper_expression(expression: &str) -> String {
    let expression = strip_enclosing_parens(expression);

    for (op, helper) in LOGICAL {
        let positions = top_level_matches(expression, op);
        if positions.is_empty() {
            continue;
        }
        let mut operands = Vec::with_capacity(positions.len() + 1);
        let mut start = 0;
        for pos in positions {
            operands.push(helper_expression(&expression[start..pos]));
            start = pos + op.len();
        }
        operands.push(helper_expression(&expression[start..]));
        return format!("({helper} {})", operands.join(" "));
    }

    for (op, helper) in COMPARISON {
        if let Some(&pos) = top_level_matches(expression, op).first() {
            let left = helper_expression(&expression[..pos]);
            let right = helper_expression(&expression[pos + op.len()..]);
            return format!("({helper} {left} {right})");
        }
    }

    if let Some(operand) = expression.strip_prefix('!') {
        return format!("(not {})", helper_expression(operand));
    }

    expression.to_string()
}

/// A variable default is literal text: HTML-escaped unless raw, with
/// mustache openers escaped so the engine does not parse them.
fn default_text(default: &str, raw: bool) -> String {
    let text = if raw {
        default.to_string()
    } else {
        escape_text(default)
    };
    text.replace("{{", "\\{{")
}

/// `slots.name`, or Handlebars segment-literal syntax for other names.
fn slot_ref(name: &str) -> String {
    if is_identifier(name) {
        format!("slots.{name}")
    } else {
        format!("slots.[{name}]")
    }
}

#[derive(Debug)]
pub struct HandlebarsPlugin {
    metadata: PluginMetadata,
    state: PluginState,
}

impl HandlebarsPlugin {
    pub const NAME: &'static str = "handlebars";

    pub fn new() -> Self {
        Self {
            metadata: Self::plugin_metadata(),
            state: PluginState::new(),
        }
    }

    pub fn plugin_metadata() -> PluginMetadata {
        PluginMetadata::new(Self::NAME, "1.0.0", ".hbs", "node")
            .with_description("Handlebars templates with helper-based logic")
    }
}

impl Default for HandlebarsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplatePlugin for HandlebarsPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn features(&self) -> FeatureFlags {
        FeatureFlags {
            supports_inheritance: false,
            supports_partials: true,
            supports_filters: true,
            supports_macros: false,
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
            .with(F::Uppercase, FilterMapping::new("uppercase"))
            .with(F::Lowercase, FilterMapping::new("lowercase"))
            .with(F::Capitalize, FilterMapping::new("capitalize"))
            .with(F::Trim, FilterMapping::new("trim"))
            .with(F::Date, FilterMapping::with_args("formatDate", helper_args))
            .with(F::Currency, FilterMapping::with_args("formatCurrency", helper_args))
            .with(F::Number, FilterMapping::with_args("formatNumber", helper_args))
            .with(F::Json, FilterMapping::new("json"))
            .with(F::Escape, FilterMapping::new("escape"))
            .with(F::Raw, FilterMapping::new("raw"))
            .with(F::Default, FilterMapping::with_args("default", helper_args))
            .with(F::First, FilterMapping::new("first"))
            .with(F::Last, FilterMapping::new("last"))
            .with(F::Length, FilterMapping::new("length"))
            .with(F::Join, FilterMapping::with_args("join", helper_args))
            .with(F::Split, FilterMapping::with_args("split", helper_args))
            .with(F::Reverse, FilterMapping::new("reverse"))
            .with(F::Sort, FilterMapping::new("sort"))
            .with(F::Slice, FilterMapping::with_args("slice", helper_args))
            .with(F::Truncate, FilterMapping::with_args("truncate", helper_args))
    }

    fn render_loop(&self, annotation: &LoopAnnotation, content: &str) -> String {
        // `#each` has one slot after the item: the key for objects, the index
        // for arrays. With both, the index is rebound from `@index`.
        let (second, index_alias) = match (&annotation.key, &annotation.index) {
            (Some(key), index) => (Some(key), index.as_ref()),
            (None, index) => (index.as_ref(), None),
        };
        let params = match second {
            Some(second) => format!("{} {second}", annotation.item),
            None => annotation.item.clone(),
        };
        let body = match index_alias {
            Some(index) => wrap(
                &format!("{{{{#with @index as |{index}|}}}}"),
                content,
                "{{/with}}",
            ),
            None => content.to_string(),
        };
        wrap(
            &format!("{{{{#each {} as |{params}|}}}}", annotation.collection),
            &body,
            "{{/each}}",
        )
    }

    fn render_condition(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        wrap(
            &format!("{{{{#if {}}}}}", self.format_expression(&annotation.expression)),
            content,
            "{{/if}}",
        )
    }

    fn render_else(&self, annotation: &ConditionAnnotation, content: &str) -> String {
        if annotation.is_else_if {
            format!(
                "{{{{else if {}}}}}\n{content}",
                self.format_expression(&annotation.expression)
            )
        } else {
            format!("{{{{else}}}}\n{content}")
        }
    }

    fn render_variable(&self, annotation: &VariableAnnotation, raw: bool) -> String {
        let expression = match &annotation.filter {
            Some(filter) => self.apply_filter(&annotation.name, filter, &annotation.filter_args),
            None => annotation.name.clone(),
        };
        let output = if raw {
            format!("{{{{{{{expression}}}}}}}")
        } else {
            format!("{{{{{expression}}}}}")
        };
        match &annotation.default {
            Some(default) => format!(
                "{{{{#if {}}}}}{output}{{{{else}}}}{}{{{{/if}}}}",
                annotation.name,
                default_text(default, raw)
            ),
            None => output,
        }
    }

    fn render_slot(&self, annotation: &SlotAnnotation, fallback: &str) -> String {
        let slot = slot_ref(&annotation.name);
        let output = format!("{{{{#if {slot}}}}}\n{{{{{{{slot}}}}}}}");
        if fallback.is_empty() {
            format!("{output}\n{{{{/if}}}}")
        } else {
            format!("{output}\n{{{{else}}}}\n{fallback}\n{{{{/if}}}}")
        }
    }

    fn render_include(&self, annotation: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
        let mut parts = vec![self.partial_path(&annotation.partial)];
        for (name, value) in &annotation.props {
            let value = match value {
                Value::String(expression) => expression.clone(),
                other => literal(other, '"'),
            };
            parts.push(format!("{name}={value}"));
        }
        Ok(format!("{{{{> {}}}}}", parts.join(" ")))
    }

    fn render_comment(&self, text: &str) -> String {
        format!("{{{{!-- {} --}}}}", text.trim())
    }

    fn format_expression(&self, expression: &str) -> String {
        helper_expression(expression)
    }

    fn filter_call(&self, expression: &str, name: &str, args: &str) -> String {
        if args.is_empty() {
            format!("{name} {expression}")
        } else {
            format!("{name} {expression} {args}")
        }
    }

    fn validate(&self, content: &str) -> ValidationResult {
        let mut balance = BlockBalance::new();
        for caps in HBS_TAG.captures_iter(content) {
            if caps.get(3).is_some() {
                balance.branch("else", &["if", "unless", "each", "with"]);
                continue;
            }
            let (Some(kind), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if kind.as_str() == "#" {
                balance.open(name.as_str());
            } else {
                balance.close(name.as_str());
            }
        }

        let mut errors = balance.finish();
        errors.extend(check_delimiters(content, "{{", "}}"));
        ValidationResult::from_errors(errors)
    }
}
