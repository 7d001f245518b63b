//! The template plugin contract.
//!
//! A plugin turns individual annotations into one engine's syntax. It never
//! walks the tree itself: the renderer in [`crate::render`] owns all recursion
//! and hands each renderer the already-rendered child content.
//!
//! Feature flags are always present and are consulted by the renderer before
//! dispatch. Renderers for optional features (`render_include`,
//! `render_block`, `render_extends`) default to [`UnsupportedFeatureError`], so
//! a plugin that does not override them cannot silently drop content.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{normalize_extension, PluginConfig, PluginContext};
use crate::error::{LifecycleError, UnsupportedFeatureError};
use crate::filters::FilterTable;
use crate::html;
use crate::tree::{
    BlockAnnotation, ConditionAnnotation, IncludeAnnotation, LoopAnnotation, SlotAnnotation,
    VariableAnnotation,
};
use crate::validation::ValidationResult;

/// Identity of a plugin, used for lookup and file naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    /// Unique plugin name (e.g. "nunjucks", "twig").
    pub name: String,
    pub version: String,
    /// Default extension of generated files, with leading dot.
    pub file_extension: String,
    /// Host ecosystem of the engine (e.g. "node", "php", "python").
    pub runtime: String,
    pub description: String,
}

impl PluginMetadata {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        file_extension: &str,
        runtime: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            file_extension: normalize_extension(file_extension),
            runtime: runtime.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Optional engine capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Feature {
    Inheritance,
    Partials,
    Filters,
    Macros,
    Async,
    Raw,
    Comments,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Feature::Inheritance => "template inheritance",
            Feature::Partials => "partials",
            Feature::Filters => "filters",
            Feature::Macros => "macros",
            Feature::Async => "async rendering",
            Feature::Raw => "raw output",
            Feature::Comments => "template comments",
        };
        f.write_str(label)
    }
}

/// Capabilities a plugin declares once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub supports_inheritance: bool,
    pub supports_partials: bool,
    pub supports_filters: bool,
    pub supports_macros: bool,
    pub supports_async: bool,
    pub supports_raw: bool,
    pub supports_comments: bool,
}

impl FeatureFlags {
    pub const fn supports(&self, feature: Feature) -> bool {
        match feature {
            Feature::Inheritance => self.supports_inheritance,
            Feature::Partials => self.supports_partials,
            Feature::Filters => self.supports_filters,
            Feature::Macros => self.supports_macros,
            Feature::Async => self.supports_async,
            Feature::Raw => self.supports_raw,
            Feature::Comments => self.supports_comments,
        }
    }
}

/// Where a plugin instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Initialized,
    Disposed,
}

const CREATED: u8 = 0;
const INITIALIZED: u8 = 1;
const DISPOSED: u8 = 2;

/// Lifecycle bookkeeping and the state built by `initialize`.
///
/// Both the filter table and config are write-once, so an initialized plugin
/// can be shared across threads without further locking.
#[derive(Debug, Default)]
pub struct PluginState {
    phase: AtomicU8,
    filters: OnceLock<FilterTable>,
    config: OnceLock<PluginConfig>,
}

impl PluginState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(
        &self,
        plugin: &str,
        filters: FilterTable,
        context: &PluginContext,
    ) -> Result<(), LifecycleError> {
        if self.phase.load(Ordering::Acquire) == DISPOSED {
            return Err(LifecycleError::AlreadyDisposed {
                plugin: plugin.to_string(),
            });
        }
        // The config cell decides the winner; state is complete before the
        // phase flips, so readers never observe a half-initialized plugin.
        if self.config.set(context.config.clone()).is_err() {
            return Err(LifecycleError::AlreadyInitialized {
                plugin: plugin.to_string(),
            });
        }
        let _ = self.filters.set(filters);
        self.phase.store(INITIALIZED, Ordering::Release);
        Ok(())
    }

    pub fn dispose(&self, plugin: &str) -> Result<(), LifecycleError> {
        match self
            .phase
            .compare_exchange(INITIALIZED, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(CREATED) => Err(LifecycleError::NotInitialized {
                plugin: plugin.to_string(),
            }),
            Err(_) => Err(LifecycleError::AlreadyDisposed {
                plugin: plugin.to_string(),
            }),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.phase.load(Ordering::Acquire) {
            CREATED => Lifecycle::Created,
            INITIALIZED => Lifecycle::Initialized,
            _ => Lifecycle::Disposed,
        }
    }

    /// Filter table, available once initialized (and kept after dispose).
    pub fn filters(&self) -> Option<&FilterTable> {
        self.filters.get()
    }

    pub fn config(&self) -> Option<&PluginConfig> {
        self.config.get()
    }
}

/// An engine-specific implementation of the render contract.
///
/// Implementations hold no per-call mutable state; one instance may serve
/// concurrent `transform` calls.
pub trait TemplatePlugin: Send + Sync + fmt::Debug {
    fn metadata(&self) -> &PluginMetadata;

    fn features(&self) -> FeatureFlags;

    fn state(&self) -> &PluginState;

    /// Build this engine's standard-filter mapping. Called by `initialize`.
    fn build_filter_table(&self) -> FilterTable;

    fn initialize(&self, context: &PluginContext) -> Result<(), LifecycleError> {
        let name = &self.metadata().name;
        self.state()
            .initialize(name, self.build_filter_table(), context)?;
        tracing::debug!(plugin = %name, output_dir = ?context.output_dir, "Initialized template plugin");
        Ok(())
    }

    fn dispose(&self) -> Result<(), LifecycleError> {
        let name = &self.metadata().name;
        self.state().dispose(name)?;
        tracing::debug!(plugin = %name, "Disposed template plugin");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state().lifecycle() == Lifecycle::Initialized
    }

    /// Effective extension: the configured override, else the metadata default.
    fn file_extension(&self) -> String {
        match self.state().config().and_then(|c| c.file_extension.as_deref()) {
            Some(ext) => normalize_extension(ext),
            None => self.metadata().file_extension.clone(),
        }
    }

    /// Append the effective extension to a partial path unless already present.
    fn partial_path(&self, partial: &str) -> String {
        let extension = self.file_extension();
        if partial
            .to_ascii_lowercase()
            .ends_with(&extension.to_ascii_lowercase())
        {
            partial.to_string()
        } else {
            format!("{partial}{extension}")
        }
    }

    fn render_loop(&self, annotation: &LoopAnnotation, content: &str) -> String;

    fn render_condition(&self, annotation: &ConditionAnnotation, content: &str) -> String;

    /// Continuation branch (`else` / `else if`) of a preceding condition. The
    /// output is placed inside the opening condition's wrapper.
    fn render_else(&self, annotation: &ConditionAnnotation, content: &str) -> String;

    /// `raw` selects the engine's unescaped output form.
    fn render_variable(&self, annotation: &VariableAnnotation, raw: bool) -> String;

    /// `fallback` is rendered when no content is supplied for the slot.
    fn render_slot(&self, annotation: &SlotAnnotation, fallback: &str) -> String;

    fn render_include(
        &self,
        _annotation: &IncludeAnnotation,
    ) -> Result<String, UnsupportedFeatureError> {
        Err(self.unsupported(Feature::Partials))
    }

    fn render_block(
        &self,
        _annotation: &BlockAnnotation,
        _content: &str,
    ) -> Result<String, UnsupportedFeatureError> {
        Err(self.unsupported(Feature::Inheritance))
    }

    fn render_extends(&self, _parent: &str) -> Result<String, UnsupportedFeatureError> {
        Err(self.unsupported(Feature::Inheritance))
    }

    fn render_comment(&self, text: &str) -> String;

    /// Rewrite a source-agnostic expression into this engine's spelling.
    /// Pure and total over any input string.
    fn format_expression(&self, expression: &str) -> String;

    /// Engine syntax for applying filter `name` to `expression`; `args` is
    /// already formatted and may be empty.
    fn filter_call(&self, expression: &str, name: &str, args: &str) -> String;

    /// Apply a standard filter, falling back to `filter_name` verbatim when
    /// the table has no mapping for it.
    fn apply_filter(&self, expression: &str, filter_name: &str, args: &[Value]) -> String {
        let mapping = self.state().filters().and_then(|t| t.get(filter_name));
        let (name, args) = match mapping {
            Some(m) => (m.name.as_str(), m.render_args(args)),
            None => (filter_name, crate::filters::join_raw(args)),
        };
        self.filter_call(expression, name, &args)
    }

    fn render_opening_tag(&self, tag: &str, attributes: &Map<String, Value>) -> String {
        html::opening_tag(tag, attributes)
    }

    fn render_closing_tag(&self, tag: &str) -> String {
        html::closing_tag(tag)
    }

    fn render_self_closing_tag(&self, tag: &str, attributes: &Map<String, Value>) -> String {
        html::self_closing_tag(tag, attributes)
    }

    /// Best-effort syntax check of rendered output. Never fails.
    fn validate(&self, content: &str) -> ValidationResult;

    fn unsupported(&self, feature: Feature) -> UnsupportedFeatureError {
        UnsupportedFeatureError {
            plugin: self.metadata().name.clone(),
            feature,
        }
    }
}
