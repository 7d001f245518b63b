//! HTML tag and text serialization shared by all plugins.
//!
//! Attribute rule: `true` renders as a bare attribute name, `false` and `null`
//! are omitted, everything else is quoted. HAST property names such as
//! `className` are mapped back to their HTML attribute names.

use serde_json::{Map, Value};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Whether `tag` is an HTML void element (never has a closing tag).
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

pub fn opening_tag(tag: &str, attributes: &Map<String, Value>) -> String {
    format!("<{tag}{}>", render_attributes(attributes))
}

pub fn closing_tag(tag: &str) -> String {
    format!("</{tag}>")
}

pub fn self_closing_tag(tag: &str, attributes: &Map<String, Value>) -> String {
    format!("<{tag}{} />", render_attributes(attributes))
}

/// Serialize attributes with a leading space before each one.
pub fn render_attributes(attributes: &Map<String, Value>) -> String {
    let mut out = String::new();
    for (name, value) in attributes {
        let name = attribute_name(name);
        match value {
            Value::Bool(true) => {
                out.push(' ');
                out.push_str(name);
            }
            Value::Bool(false) | Value::Null => {}
            other => {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attribute(&attribute_value(other)));
                out.push('"');
            }
        }
    }
    out
}

fn attribute_name(property: &str) -> &str {
    match property {
        "className" => "class",
        "htmlFor" => "for",
        "httpEquiv" => "http-equiv",
        "acceptCharset" => "accept-charset",
        other => other,
    }
}

fn attribute_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // HAST stores space-separated tokens (className, rel, ...) as arrays.
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(attribute_value)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_boolean_attributes() {
        let tag = opening_tag("input", &attrs(json!({ "checked": true, "disabled": false })));
        assert_eq!(tag, "<input checked>");
        assert!(!tag.contains("disabled"));
    }

    #[test]
    fn test_values_are_quoted_and_escaped() {
        let tag = opening_tag(
            "a",
            &attrs(json!({ "href": "/q?a=1&b=2", "title": "say \"hi\"", "tabIndex": 0 })),
        );
        assert_eq!(
            tag,
            r#"<a href="/q?a=1&amp;b=2" title="say &quot;hi&quot;" tabIndex="0">"#
        );
    }

    #[test]
    fn test_class_name_array() {
        let tag = opening_tag("div", &attrs(json!({ "className": ["card", "card--wide"] })));
        assert_eq!(tag, r#"<div class="card card--wide">"#);
    }

    #[test]
    fn test_null_omitted() {
        assert_eq!(opening_tag("p", &attrs(json!({ "id": null }))), "<p>");
    }

    #[test]
    fn test_self_closing_and_closing() {
        assert_eq!(
            self_closing_tag("img", &attrs(json!({ "src": "a.png" }))),
            r#"<img src="a.png" />"#
        );
        assert_eq!(closing_tag("div"), "</div>");
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("IMG"));
        assert!(!is_void_element("div"));
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b && c"), "a &lt; b &amp;&amp; c");
    }
}
