//! Standard filter vocabulary and per-plugin filter tables.
//!
//! Authors name filters from one fixed vocabulary; each plugin maps those names
//! to its engine's own filter and argument conventions when it is initialized.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Engine-agnostic filter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFilter {
    Uppercase,
    Lowercase,
    Capitalize,
    Trim,
    Date,
    Currency,
    Number,
    Json,
    Escape,
    Raw,
    Default,
    First,
    Last,
    Length,
    Join,
    Split,
    Reverse,
    Sort,
    Slice,
    Truncate,
}

impl StandardFilter {
    pub const ALL: [StandardFilter; 20] = [
        StandardFilter::Uppercase,
        StandardFilter::Lowercase,
        StandardFilter::Capitalize,
        StandardFilter::Trim,
        StandardFilter::Date,
        StandardFilter::Currency,
        StandardFilter::Number,
        StandardFilter::Json,
        StandardFilter::Escape,
        StandardFilter::Raw,
        StandardFilter::Default,
        StandardFilter::First,
        StandardFilter::Last,
        StandardFilter::Length,
        StandardFilter::Join,
        StandardFilter::Split,
        StandardFilter::Reverse,
        StandardFilter::Sort,
        StandardFilter::Slice,
        StandardFilter::Truncate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            StandardFilter::Uppercase => "uppercase",
            StandardFilter::Lowercase => "lowercase",
            StandardFilter::Capitalize => "capitalize",
            StandardFilter::Trim => "trim",
            StandardFilter::Date => "date",
            StandardFilter::Currency => "currency",
            StandardFilter::Number => "number",
            StandardFilter::Json => "json",
            StandardFilter::Escape => "escape",
            StandardFilter::Raw => "raw",
            StandardFilter::Default => "default",
            StandardFilter::First => "first",
            StandardFilter::Last => "last",
            StandardFilter::Length => "length",
            StandardFilter::Join => "join",
            StandardFilter::Split => "split",
            StandardFilter::Reverse => "reverse",
            StandardFilter::Sort => "sort",
            StandardFilter::Slice => "slice",
            StandardFilter::Truncate => "truncate",
        }
    }

    /// Look up a standard filter by its vocabulary name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for StandardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders filter arguments in an engine's own syntax.
pub type FormatArgs = fn(&[Value]) -> String;

/// How one standard filter is spelled in a particular engine.
#[derive(Debug, Clone)]
pub struct FilterMapping {
    pub name: String,
    pub format_args: Option<FormatArgs>,
}

impl FilterMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format_args: None,
        }
    }

    pub fn with_args(name: impl Into<String>, format_args: FormatArgs) -> Self {
        Self {
            name: name.into(),
            format_args: Some(format_args),
        }
    }

    /// Render `args` with this mapping's formatter, or join them raw.
    pub fn render_args(&self, args: &[Value]) -> String {
        match self.format_args {
            Some(format) => format(args),
            None => join_raw(args),
        }
    }
}

/// Standard filter name → engine filter, built once per plugin instance.
#[derive(Debug, Clone, Default)]
pub struct FilterTable {
    entries: HashMap<StandardFilter, FilterMapping>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a mapping.
    pub fn with(mut self, filter: StandardFilter, mapping: FilterMapping) -> Self {
        self.entries.insert(filter, mapping);
        self
    }

    /// Look up by vocabulary name. Names outside the vocabulary never match.
    pub fn get(&self, name: &str) -> Option<&FilterMapping> {
        StandardFilter::from_name(name).and_then(|f| self.entries.get(&f))
    }

    pub fn lookup(&self, filter: StandardFilter) -> Option<&FilterMapping> {
        self.entries.get(&filter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Standard filters this table has no mapping for, in vocabulary order.
    pub fn missing(&self) -> Vec<StandardFilter> {
        StandardFilter::ALL
            .into_iter()
            .filter(|f| !self.entries.contains_key(f))
            .collect()
    }
}

/// Join arguments verbatim: strings are emitted as-is, other values as JSON.
pub fn join_raw(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render each argument as a literal and join with `separator`.
pub fn quote_args(args: &[Value], quote: char, separator: &str) -> String {
    args.iter()
        .map(|arg| literal(arg, quote))
        .collect::<Vec<_>>()
        .join(separator)
}

/// A JSON value as a template literal; strings are quoted with `quote`.
pub fn literal(value: &Value, quote: char) -> String {
    match value {
        Value::String(s) => quote_str(s, quote),
        other => other.to_string(),
    }
}

/// Quote a string, escaping backslashes and the quote character.
pub fn quote_str(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        if c == quote || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vocabulary_roundtrips_by_name() {
        for filter in StandardFilter::ALL {
            assert_eq!(StandardFilter::from_name(filter.as_str()), Some(filter));
        }
        assert_eq!(StandardFilter::from_name("shout"), None);
    }

    #[test]
    fn test_table_lookup_by_name() {
        let table = FilterTable::new().with(StandardFilter::Uppercase, FilterMapping::new("upper"));
        assert_eq!(table.get("uppercase").unwrap().name, "upper");
        assert!(table.get("upper").is_none());
        assert_eq!(table.len(), 1);
        assert_eq!(table.missing().len(), 19);
    }

    #[test]
    fn test_render_args_raw_join() {
        let mapping = FilterMapping::new("truncate");
        assert_eq!(mapping.render_args(&[json!(20), json!("suffix")]), "20, suffix");
    }

    #[test]
    fn test_render_args_with_formatter() {
        fn quoted(args: &[Value]) -> String {
            quote_args(args, '\'', ", ")
        }
        let mapping = FilterMapping::with_args("date", quoted);
        assert_eq!(mapping.render_args(&[json!("Y-m-d")]), "'Y-m-d'");
    }

    #[test]
    fn test_quote_str_escapes() {
        assert_eq!(quote_str(r#"say "hi""#, '"'), r#""say \"hi\"""#);
        assert_eq!(quote_str("it's", '\''), r"'it\'s'");
    }

    #[test]
    fn test_literal_non_strings() {
        assert_eq!(literal(&json!(3), '"'), "3");
        assert_eq!(literal(&json!(true), '"'), "true");
    }
}
