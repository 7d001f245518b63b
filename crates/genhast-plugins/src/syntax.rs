//! Helpers shared by the built-in engines.
//!
//! The three `{% %}` engines (Nunjucks, Jinja, Twig) share their operator
//! spelling and block-tag grammar, so their expression rewriting and output
//! validation live here.

use std::sync::LazyLock;

use genhast_core::validation::{check_delimiters, BlockBalance, ValidationResult};
use regex::Regex;

static STRICT_EQUALITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([!=])==").unwrap());

static LOGICAL_AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*&&\s*").unwrap());

static LOGICAL_OR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\|\|\s*").unwrap());

/// `!` used as negation: not part of `!=` and not following an operand.
static LOGICAL_NOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w)\]!=<>])!([^=])").unwrap());

/// `{% name ... %}` with optional whitespace control.
static WORD_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%-?\s*(\w+)(.*?)-?%\}").unwrap());

const WORD_OPENERS: &[&str] = &[
    "for",
    "if",
    "block",
    "macro",
    "call",
    "filter",
    "raw",
    "with",
    "autoescape",
    "embed",
    "apply",
    "verbatim",
    "spaceless",
];

/// Rewrite `&&`, `||` and `!` into `and`, `or` and `not`; strict (in)equality
/// collapses to `==` / `!=`.
///
/// The rewrite is purely textual: operator characters inside string literals
/// are rewritten too.
pub fn word_operators(expression: &str) -> String {
    let rewritten = STRICT_EQUALITY.replace_all(expression.trim(), "${1}=");
    let rewritten = LOGICAL_AND.replace_all(&rewritten, " and ");
    let mut rewritten = LOGICAL_OR.replace_all(&rewritten, " or ").into_owned();

    // Matches cannot overlap, so `!!a` needs a second pass.
    loop {
        let next = LOGICAL_NOT.replace_all(&rewritten, "${1}not ${2}").into_owned();
        if next == rewritten {
            return rewritten;
        }
        rewritten = next;
    }
}

/// Check `{% %}` block pairing and delimiter balance.
pub fn validate_word_blocks(content: &str) -> ValidationResult {
    let mut balance = BlockBalance::new();

    for caps in WORD_TAG.captures_iter(content) {
        let name = &caps[1];
        let rest = &caps[2];
        match name {
            "else" => balance.branch(name, &["if", "for"]),
            "elif" | "elseif" => balance.branch(name, &["if"]),
            // `{% set x = ... %}` is inline; `{% set x %}...{% endset %}` is a block.
            "set" if !rest.contains('=') => balance.open(name),
            _ if WORD_OPENERS.contains(&name) => balance.open(name),
            _ => {
                if let Some(opened) = name.strip_prefix("end") {
                    balance.close(opened);
                }
            }
        }
    }

    let mut errors = balance.finish();
    // Tag bodies may contain `}}` (nested hash literals), so interpolation
    // delimiters are counted with tags removed.
    let without_tags = WORD_TAG.replace_all(content, "");
    errors.extend(check_delimiters(&without_tags, "{{", "}}"));
    errors.extend(check_delimiters(content, "{%", "%}"));
    errors.extend(check_delimiters(content, "{#", "#}"));

    ValidationResult::from_errors(errors)
}

/// Whether `name` can be used as a bare identifier in template syntax.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `slots.name`, or `slots["name"]` when the name is not an identifier.
pub fn dotted_slot(name: &str) -> String {
    if is_identifier(name) {
        format!("slots.{name}")
    } else {
        format!("slots[{}]", genhast_core::filters::quote_str(name, '"'))
    }
}

/// `open`, content and `close` on their own lines.
pub fn wrap(open: &str, content: &str, close: &str) -> String {
    format!("{open}\n{content}\n{close}")
}
