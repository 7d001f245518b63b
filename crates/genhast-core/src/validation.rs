//! Best-effort syntactic checks for rendered template text.
//!
//! Plugins scan their own block tokens and feed them to a [`BlockBalance`];
//! findings are returned as data and are never fatal.

use serde::Serialize;

/// Outcome of `TemplatePlugin::validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Stack-based matcher for open/close block tokens.
#[derive(Debug, Default)]
pub struct BlockBalance {
    stack: Vec<String>,
    errors: Vec<String>,
}

impl BlockBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, name: &str) {
        self.stack.push(name.to_string());
    }

    pub fn close(&mut self, name: &str) {
        match self.stack.iter().rposition(|open| open == name) {
            Some(pos) => {
                for unclosed in self.stack.drain(pos + 1..) {
                    self.errors
                        .push(format!("unclosed `{unclosed}` block before end of `{name}`"));
                }
                self.stack.pop();
            }
            None => self
                .errors
                .push(format!("closing `{name}` without a matching opening block")),
        }
    }

    /// A mid-block token (`else`, `elif`, ...) that must sit directly inside
    /// one of `parents`.
    pub fn branch(&mut self, name: &str, parents: &[&str]) {
        let inside = self
            .stack
            .last()
            .is_some_and(|top| parents.contains(&top.as_str()));
        if !inside {
            self.errors
                .push(format!("`{name}` outside of {}", parents.join("/")));
        }
    }

    pub fn finish(mut self) -> Vec<String> {
        for unclosed in self.stack.drain(..).rev() {
            self.errors.push(format!("unclosed `{unclosed}` block"));
        }
        self.errors
    }
}

/// Compare occurrence counts of an opening and closing delimiter.
pub fn check_delimiters(content: &str, open: &str, close: &str) -> Option<String> {
    let opened = content.matches(open).count();
    let closed = content.matches(close).count();
    (opened != closed).then(|| {
        format!("unbalanced delimiters: {opened} `{open}` vs {closed} `{close}`")
    })
}
