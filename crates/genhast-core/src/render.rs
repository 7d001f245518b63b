//! Tree → template text.
//!
//! `transform` validates the tree, checks every annotation against the
//! plugin's feature flags, then renders bottom-up: children first, then the
//! element's annotations in [`RENDER_STAGES`] order. Nothing is written to the
//! plugin; all per-call state lives in a local `Renderer`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use heck::ToKebabCase;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{NodeLocation, RenderError, UnsupportedFeatureError};
use crate::html;
use crate::plugin::{Feature, TemplatePlugin};
use crate::schema::{child_path, validate_root};
use crate::tree::{GenElement, GenNode, GenRoot};

/// The rendered artifact plus what was learned while rendering it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateOutput {
    pub filename: String,
    pub content: String,
    /// Every `variable.name` and `loop.collection`, first-seen order.
    pub variables: Vec<String>,
    /// Every `include.partial`, first-seen order.
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Order in which an element's annotations are applied, innermost first.
///
/// `Variable` replaces the element's children; `Slot` and `Include` replace
/// the whole element; `Tag` serializes the element (skipped under `unwrap` or
/// when the element was replaced); `Condition`, `Loop` and `Block` wrap the
/// result in that order, so a loop repeats a guarded element and a block
/// contains the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderStage {
    Variable,
    Slot,
    Include,
    Tag,
    Condition,
    Loop,
    Block,
}

pub const RENDER_STAGES: [RenderStage; 7] = [
    RenderStage::Variable,
    RenderStage::Slot,
    RenderStage::Include,
    RenderStage::Tag,
    RenderStage::Condition,
    RenderStage::Loop,
    RenderStage::Block,
];

/// Variable names and partial dependencies referenced by a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub variables: Vec<String>,
    pub dependencies: Vec<String>,
}

/// Render `tree` with `plugin`.
///
/// Fails before producing any output if the tree is malformed, if the plugin
/// is not initialized, or if an annotation needs a feature the plugin lacks.
pub fn transform(tree: &GenRoot, plugin: &dyn TemplatePlugin) -> Result<TemplateOutput, RenderError> {
    let name = &plugin.metadata().name;
    let config = match plugin.state().config() {
        Some(config) if plugin.is_initialized() => config,
        _ => {
            return Err(RenderError::PluginNotInitialized {
                plugin: name.clone(),
            })
        }
    };

    validate_root(tree)?;
    preflight(&tree.children, "", plugin)?;

    let component = tree.meta.as_ref().and_then(|m| m.component_name.as_deref());
    tracing::debug!(plugin = %name, component = ?component, "Rendering template");

    let mut renderer = Renderer::new(plugin);
    let body = renderer.render_nodes(&tree.children, "", false)?;

    let mut content = String::new();
    if config.props_header {
        if let Some(header) = props_header(tree, plugin) {
            content.push_str(&header);
            content.push('\n');
        }
    }
    if let Some((parent, location)) = renderer.extends.take() {
        let extends = plugin.render_extends(&parent);
        content.push_str(&supported(extends, location)?);
        content.push('\n');
    }
    content.push_str(&body);

    if config.pretty_print {
        content = pretty_print(&content);
    }

    let references = collect_references(tree);
    let output = TemplateOutput {
        filename: output_filename(tree, &plugin.file_extension()),
        content,
        variables: references.variables,
        dependencies: references.dependencies,
        warnings: renderer.warnings,
    };

    tracing::debug!(
        plugin = %name,
        filename = %output.filename,
        variables = output.variables.len(),
        dependencies = output.dependencies.len(),
        warnings = output.warnings.len(),
        "Rendered template"
    );
    Ok(output)
}

/// Render one tree for several engines in parallel.
///
/// Each result is independent; a failure for one plugin does not affect the
/// others. Results are returned in the order of `plugins`.
pub fn transform_all(
    tree: &GenRoot,
    plugins: &[Arc<dyn TemplatePlugin>],
) -> Vec<Result<TemplateOutput, RenderError>> {
    plugins
        .par_iter()
        .map(|plugin| transform(tree, plugin.as_ref()))
        .collect()
}

/// Collect referenced variables and partials in document order.
pub fn collect_references(tree: &GenRoot) -> References {
    let mut variables = OrderedSet::default();
    let mut dependencies = OrderedSet::default();

    tree.walk_elements(&mut |el| {
        let Some(gen) = &el.gen else {
            return;
        };
        if let Some(lp) = &gen.r#loop {
            variables.insert(&lp.collection);
        }
        if let Some(variable) = &gen.variable {
            variables.insert(&variable.name);
        }
        if let Some(include) = &gen.include {
            dependencies.insert(&include.partial);
        }
    });

    References {
        variables: variables.items,
        dependencies: dependencies.items,
    }
}

/// Output filename: kebab-cased component name plus `extension`.
pub fn output_filename(tree: &GenRoot, extension: &str) -> String {
    let meta = tree.meta.as_ref();
    let stem = meta
        .and_then(|m| m.component_name.clone())
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            meta.and_then(|m| m.source_file.as_deref())
                .and_then(|f| Path::new(f).file_stem())
                .map(|s| s.to_string_lossy().into_owned())
        })
        .map(|s| s.to_kebab_case())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "template".to_string());
    format!("{stem}{extension}")
}

#[derive(Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, value: &str) {
        if self.seen.insert(value.to_string()) {
            self.items.push(value.to_string());
        }
    }
}

/// Reject annotations the plugin cannot render, before rendering anything.
fn preflight(nodes: &[GenNode], parent: &str, plugin: &dyn TemplatePlugin) -> Result<(), RenderError> {
    let features = plugin.features();
    for (index, node) in nodes.iter().enumerate() {
        let GenNode::Element(el) = node else {
            continue;
        };
        let path = child_path(parent, &el.tag_name, index);

        if let Some(gen) = &el.gen {
            let mut required = Vec::new();
            if gen.include.is_some() {
                required.push(Feature::Partials);
            }
            if gen.block.is_some() {
                required.push(Feature::Inheritance);
            }
            if gen.raw {
                required.push(Feature::Raw);
            }
            if gen.variable.as_ref().is_some_and(|v| v.filter.is_some()) {
                required.push(Feature::Filters);
            }

            if let Some(feature) = required.into_iter().find(|f| !features.supports(*f)) {
                return Err(RenderError::UnsupportedFeature {
                    plugin: plugin.metadata().name.clone(),
                    feature,
                    location: NodeLocation::new(path, gen.source.as_ref()),
                });
            }
        }

        preflight(&el.children, &path, plugin)?;
    }
    Ok(())
}

struct Renderer<'p> {
    plugin: &'p dyn TemplatePlugin,
    warnings: Vec<String>,
    /// Parent layout and the block that first named it.
    extends: Option<(String, NodeLocation)>,
    slots: HashSet<String>,
}

impl<'p> Renderer<'p> {
    fn new(plugin: &'p dyn TemplatePlugin) -> Self {
        Self {
            plugin,
            warnings: Vec::new(),
            extends: None,
            slots: HashSet::new(),
        }
    }

    fn render_nodes(
        &mut self,
        nodes: &[GenNode],
        parent: &str,
        raw: bool,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut index = 0;

        while index < nodes.len() {
            let node = &nodes[index];
            match node {
                GenNode::Element(el) if el.condition().is_some_and(|c| !c.is_continuation()) => {
                    let (branches, last) = continuation_branches(nodes, index);
                    let path = child_path(parent, &el.tag_name, index);
                    let branches: Vec<(String, &GenElement)> = branches
                        .into_iter()
                        .map(|(i, branch)| (child_path(parent, &branch.tag_name, i), branch))
                        .collect();
                    out.push_str(&self.render_element(el, &path, raw, &branches)?);
                    index = last + 1;
                }
                _ => {
                    out.push_str(&self.render_node(node, parent, index, raw)?);
                    index += 1;
                }
            }
        }

        Ok(out)
    }

    fn render_node(
        &mut self,
        node: &GenNode,
        parent: &str,
        index: usize,
        raw: bool,
    ) -> Result<String, RenderError> {
        let rendered = match node {
            GenNode::Element(el) => {
                let path = child_path(parent, &el.tag_name, index);
                return self.render_element(el, &path, raw, &[]);
            }
            GenNode::Text(text) if raw => text.value.clone(),
            GenNode::Text(text) => html::escape_text(&text.value),
            GenNode::Comment(comment) => comment_text(self.plugin, &comment.value),
            GenNode::Doctype => "<!DOCTYPE html>".to_string(),
            // Rejected by schema validation; render children to stay total.
            GenNode::Root(root) => return self.render_nodes(&root.children, parent, raw),
        };
        Ok(rendered)
    }

    /// Apply every stage to `el`. `branches` are the `else`/`else if`
    /// siblings that continue this element's condition.
    fn render_element(
        &mut self,
        el: &GenElement,
        path: &str,
        raw: bool,
        branches: &[(String, &GenElement)],
    ) -> Result<String, RenderError> {
        let raw = raw || el.gen.as_ref().is_some_and(|g| g.raw);
        let children = self.render_nodes(&el.children, path, raw)?;
        let mut content = children;
        let mut replaced = false;

        for stage in RENDER_STAGES {
            content = match stage {
                RenderStage::Condition => match el.condition() {
                    Some(cond) => {
                        let mut inner = content;
                        for (branch_path, branch) in branches {
                            let branch_content = self.render_branch(branch, branch_path, raw)?;
                            if let Some(branch_cond) = branch.condition() {
                                inner.push('\n');
                                inner.push_str(&self.plugin.render_else(branch_cond, &branch_content));
                            }
                        }
                        self.plugin.render_condition(cond, &inner)
                    }
                    None => content,
                },
                _ => self.apply_stage(stage, el, path, raw, content, &mut replaced)?,
            };
        }

        Ok(content)
    }

    /// A continuation branch gets every stage except its own condition, which
    /// becomes the `render_else` marker around it.
    fn render_branch(
        &mut self,
        el: &GenElement,
        path: &str,
        raw: bool,
    ) -> Result<String, RenderError> {
        let raw = raw || el.gen.as_ref().is_some_and(|g| g.raw);
        let mut content = self.render_nodes(&el.children, path, raw)?;
        let mut replaced = false;
        for stage in RENDER_STAGES {
            if stage != RenderStage::Condition {
                content = self.apply_stage(stage, el, path, raw, content, &mut replaced)?;
            }
        }
        Ok(content)
    }

    fn apply_stage(
        &mut self,
        stage: RenderStage,
        el: &GenElement,
        path: &str,
        raw: bool,
        content: String,
        replaced: &mut bool,
    ) -> Result<String, RenderError> {
        let plugin = self.plugin;
        let gen = el.gen.as_ref();

        let rendered = match stage {
            RenderStage::Variable => match gen.and_then(|g| g.variable.as_ref()) {
                Some(variable) => {
                    if el.has_element_children() {
                        self.warnings.push(format!(
                            "{path}: children of <{}> are replaced by variable `{}`",
                            el.tag_name, variable.name
                        ));
                    }
                    plugin.render_variable(variable, raw)
                }
                None => content,
            },
            RenderStage::Slot => match gen.and_then(|g| g.slot.as_ref()) {
                Some(slot) => {
                    if !self.slots.insert(slot.name.clone()) {
                        self.warnings
                            .push(format!("{path}: slot `{}` is declared more than once", slot.name));
                    }
                    *replaced = true;
                    plugin.render_slot(slot, &content)
                }
                None => content,
            },
            RenderStage::Include => match gen.and_then(|g| g.include.as_ref()) {
                Some(include) => {
                    *replaced = true;
                    supported(plugin.render_include(include), node_location(path, el))?
                }
                None => content,
            },
            RenderStage::Tag => {
                if *replaced || gen.is_some_and(|g| g.unwrap) {
                    return Ok(content);
                }
                if let Some(component) = gen.and_then(|g| g.component.as_ref()) {
                    self.warnings.push(format!(
                        "{path}: component `{}` has no include and is emitted as <{}>",
                        component.name, el.tag_name
                    ));
                }
                if html::is_void_element(&el.tag_name) && content.is_empty() {
                    plugin.render_self_closing_tag(&el.tag_name, &el.properties)
                } else {
                    format!(
                        "{}{}{}",
                        plugin.render_opening_tag(&el.tag_name, &el.properties),
                        content,
                        plugin.render_closing_tag(&el.tag_name)
                    )
                }
            }
            RenderStage::Loop => match gen.and_then(|g| g.r#loop.as_ref()) {
                Some(lp) => plugin.render_loop(lp, &content),
                None => content,
            },
            RenderStage::Block => match gen.and_then(|g| g.block.as_ref()) {
                Some(block) => {
                    if let Some(parent) = &block.extends {
                        self.record_extends(path, el, parent);
                    }
                    supported(plugin.render_block(block, &content), node_location(path, el))?
                }
                None => content,
            },
            // Handled by render_element, which owns the else-branch siblings.
            RenderStage::Condition => content,
        };
        Ok(rendered)
    }

    fn record_extends(&mut self, path: &str, el: &GenElement, parent: &str) {
        match &self.extends {
            None => self.extends = Some((parent.to_string(), node_location(path, el))),
            Some((existing, _)) if existing == parent => {}
            Some((existing, _)) => {
                tracing::warn!(
                    plugin = %self.plugin.metadata().name,
                    kept = %existing,
                    ignored = %parent,
                    "Conflicting parent layouts"
                );
                self.warnings.push(format!(
                    "{path}: block extends `{parent}` but the template already extends `{existing}`"
                ));
            }
        }
    }

}

fn node_location(path: &str, el: &GenElement) -> NodeLocation {
    NodeLocation::new(path, el.source())
}

/// Preflight only sees feature flags. A renderer that still refuses fails the
/// whole transform at the node that needed it.
fn supported(
    rendered: Result<String, UnsupportedFeatureError>,
    location: NodeLocation,
) -> Result<String, RenderError> {
    rendered.map_err(|err| RenderError::UnsupportedFeature {
        plugin: err.plugin,
        feature: err.feature,
        location,
    })
}

/// An engine comment, or an HTML comment for engines without one.
fn comment_text(plugin: &dyn TemplatePlugin, text: &str) -> String {
    if plugin.features().supports(Feature::Comments) {
        plugin.render_comment(text)
    } else {
        format!("<!--{text}-->")
    }
}

/// Continuation siblings of the condition at `start`, with the index of the
/// last node consumed. Blank text between branches is dropped.
fn continuation_branches(nodes: &[GenNode], start: usize) -> (Vec<(usize, &GenElement)>, usize) {
    let mut branches = Vec::new();
    let mut last = start;
    let mut cursor = start + 1;

    while let Some(node) = nodes.get(cursor) {
        if node.is_blank_text() {
            cursor += 1;
            continue;
        }
        match node {
            GenNode::Element(el) if el.condition().is_some_and(|c| c.is_continuation()) => {
                branches.push((cursor, el));
                last = cursor;
                cursor += 1;
                if el.condition().is_some_and(|c| c.is_else) {
                    break;
                }
            }
            _ => break,
        }
    }

    (branches, last)
}

fn props_header(tree: &GenRoot, plugin: &dyn TemplatePlugin) -> Option<String> {
    let meta = tree.meta.as_ref()?;
    if meta.props.is_empty() {
        return None;
    }
    let props: Vec<String> = meta
        .props
        .iter()
        .map(|p| {
            let mut entry = p.name.clone();
            if let Some(ty) = &p.prop_type {
                entry.push_str(": ");
                entry.push_str(ty);
            }
            if p.required {
                entry.push_str(" (required)");
            }
            entry
        })
        .collect();
    let header = format!("Props: {}", props.join(", "));
    Some(comment_text(plugin, &header))
}

/// Strip trailing whitespace, collapse blank-line runs, end with one newline.
pub fn pretty_print(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut blank_run = 0;
    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PluginConfig, PluginContext};
    use crate::filters::{FilterMapping, FilterTable, StandardFilter};
    use crate::plugin::{FeatureFlags, PluginMetadata, PluginState};
    use crate::tree::{
        BlockAnnotation, ConditionAnnotation, GenAnnotations, GenComponentMeta, IncludeAnnotation,
        LoopAnnotation, SlotAnnotation, VariableAnnotation,
    };
    use crate::validation::ValidationResult;
    use serde_json::Value;

    /// Minimal plugin emitting a bracketed pseudo-syntax, so tests can see
    /// exactly how the renderer composes fragments.
    #[derive(Debug)]
    struct BracketPlugin {
        metadata: PluginMetadata,
        features: FeatureFlags,
        /// Renderers that fail even though `features` claims support.
        refused: Vec<Feature>,
        state: PluginState,
    }

    impl BracketPlugin {
        fn new(features: FeatureFlags) -> Self {
            Self {
                metadata: PluginMetadata::new("bracket", "0.0.1", ".br", "test"),
                features,
                refused: Vec::new(),
                state: PluginState::new(),
            }
        }

        fn refusing(mut self, feature: Feature) -> Self {
            self.refused.push(feature);
            self
        }

        fn check(&self, feature: Feature) -> Result<(), UnsupportedFeatureError> {
            if self.refused.contains(&feature) {
                Err(self.unsupported(feature))
            } else {
                Ok(())
            }
        }

        fn full() -> Self {
            Self::new(FeatureFlags {
                supports_inheritance: true,
                supports_partials: true,
                supports_filters: true,
                supports_macros: false,
                supports_async: false,
                supports_raw: true,
                supports_comments: true,
            })
        }

        fn ready(self) -> Self {
            self.initialize(&PluginContext::default()).unwrap();
            self
        }
    }

    impl TemplatePlugin for BracketPlugin {
        fn metadata(&self) -> &PluginMetadata {
            &self.metadata
        }
        fn features(&self) -> FeatureFlags {
            self.features
        }
        fn state(&self) -> &PluginState {
            &self.state
        }
        fn build_filter_table(&self) -> FilterTable {
            FilterTable::new().with(StandardFilter::Uppercase, FilterMapping::new("up"))
        }
        fn render_loop(&self, a: &LoopAnnotation, content: &str) -> String {
            format!("[each {} in {}]{content}[/each]", a.item, a.collection)
        }
        fn render_condition(&self, a: &ConditionAnnotation, content: &str) -> String {
            format!("[if {}]{content}[/if]", a.expression)
        }
        fn render_else(&self, a: &ConditionAnnotation, content: &str) -> String {
            if a.is_else_if {
                format!("[elif {}]{content}", a.expression)
            } else {
                format!("[else]{content}")
            }
        }
        fn render_variable(&self, a: &VariableAnnotation, raw: bool) -> String {
            let mut expr = a.name.clone();
            if let Some(filter) = &a.filter {
                expr = self.apply_filter(&expr, filter, &a.filter_args);
            }
            if raw {
                format!("[!{expr}]")
            } else {
                format!("[={expr}]")
            }
        }
        fn render_slot(&self, a: &SlotAnnotation, fallback: &str) -> String {
            format!("[slot {}]{fallback}[/slot]", a.name)
        }
        fn render_include(&self, a: &IncludeAnnotation) -> Result<String, UnsupportedFeatureError> {
            self.check(Feature::Partials)?;
            Ok(format!("[include {}]", self.partial_path(&a.partial)))
        }
        fn render_block(
            &self,
            a: &BlockAnnotation,
            content: &str,
        ) -> Result<String, UnsupportedFeatureError> {
            self.check(Feature::Inheritance)?;
            Ok(format!("[block {}]{content}[/block]", a.name))
        }
        fn render_extends(&self, parent: &str) -> Result<String, UnsupportedFeatureError> {
            self.check(Feature::Inheritance)?;
            Ok(format!("[extends {parent}]"))
        }
        fn render_comment(&self, text: &str) -> String {
            format!("[# {text} #]")
        }
        fn format_expression(&self, expression: &str) -> String {
            expression.to_string()
        }
        fn filter_call(&self, expression: &str, name: &str, args: &str) -> String {
            if args.is_empty() {
                format!("{expression}|{name}")
            } else {
                format!("{expression}|{name}:{args}")
            }
        }
        fn validate(&self, _content: &str) -> ValidationResult {
            ValidationResult::ok()
        }
    }

    fn el(tag: &str) -> GenElement {
        GenElement::new(tag)
    }

    fn render(root: &GenRoot) -> TemplateOutput {
        transform(root, &BracketPlugin::full().ready()).unwrap()
    }

    #[test]
    fn test_plain_elements_and_text() {
        let root = GenRoot::new(vec![
            GenNode::Doctype,
            el("p").with_property("id", "x").with_text("a < b").into(),
            el("br").into(),
        ]);
        assert_eq!(
            render(&root).content,
            r#"<!DOCTYPE html><p id="x">a &lt; b</p><br />"#
        );
    }

    #[test]
    fn test_requires_initialized_plugin() {
        let plugin = BracketPlugin::full();
        let err = transform(&GenRoot::default(), &plugin).unwrap_err();
        assert!(matches!(err, RenderError::PluginNotInitialized { .. }));

        let plugin = plugin.ready();
        plugin.dispose().unwrap();
        assert!(transform(&GenRoot::default(), &plugin).is_err());
    }

    #[test]
    fn test_loop_wraps_condition_wraps_tag() {
        let gen = GenAnnotations {
            r#loop: Some(LoopAnnotation::new("p", "products")),
            condition: Some(ConditionAnnotation::new("p.visible")),
            ..Default::default()
        };
        let root = GenRoot::new(vec![el("li").with_gen(gen).with_text("x").into()]);
        assert_eq!(
            render(&root).content,
            "[each p in products][if p.visible]<li>x</li>[/if][/each]"
        );
    }

    #[test]
    fn test_block_is_outermost() {
        let gen = GenAnnotations {
            r#loop: Some(LoopAnnotation::new("p", "ps")),
            block: Some(BlockAnnotation::new("content")),
            ..Default::default()
        };
        let root = GenRoot::new(vec![el("div").with_gen(gen).into()]);
        assert_eq!(
            render(&root).content,
            "[block content][each p in ps]<div></div>[/each][/block]"
        );
    }

    #[test]
    fn test_stage_order_is_fixed() {
        assert_eq!(
            RENDER_STAGES,
            [
                RenderStage::Variable,
                RenderStage::Slot,
                RenderStage::Include,
                RenderStage::Tag,
                RenderStage::Condition,
                RenderStage::Loop,
                RenderStage::Block,
            ]
        );
    }

    #[test]
    fn test_variable_replaces_children_and_keeps_tag() {
        let root = GenRoot::new(vec![el("h1")
            .with_gen(GenAnnotations::variable(VariableAnnotation::new("title")))
            .with_text("Placeholder")
            .into()]);
        let out = render(&root);
        assert_eq!(out.content, "<h1>[=title]</h1>");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_variable_over_element_children_warns() {
        let root = GenRoot::new(vec![el("div")
            .with_gen(GenAnnotations::variable(VariableAnnotation::new("body")))
            .with_child(el("span"))
            .into()]);
        let out = render(&root);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("/div[0]"));
    }

    #[test]
    fn test_raw_suppresses_escaping() {
        let gen = GenAnnotations {
            raw: true,
            ..Default::default()
        };
        let root = GenRoot::new(vec![el("div")
            .with_gen(gen)
            .with_text("<b>")
            .with_child(el("span").with_gen(GenAnnotations::variable(VariableAnnotation::new("html"))))
            .into()]);
        assert_eq!(render(&root).content, "<div><b><span>[!html]</span></div>");
    }

    #[test]
    fn test_unwrap_drops_tag() {
        let gen = GenAnnotations {
            unwrap: true,
            condition: Some(ConditionAnnotation::new("ok")),
            ..Default::default()
        };
        let root = GenRoot::new(vec![el("template")
            .with_gen(gen)
            .with_child(el("p"))
            .with_child(el("p"))
            .into()]);
        assert_eq!(render(&root).content, "[if ok]<p></p><p></p>[/if]");
    }

    #[test]
    fn test_slot_replaces_element_with_fallback() {
        let root = GenRoot::new(vec![el("slot")
            .with_gen(GenAnnotations::slot(SlotAnnotation::new("header")))
            .with_child(el("h2").with_text("Default"))
            .into()]);
        assert_eq!(
            render(&root).content,
            "[slot header]<h2>Default</h2>[/slot]"
        );
    }

    #[test]
    fn test_duplicate_slot_warns() {
        let slot = || el("slot").with_gen(GenAnnotations::slot(SlotAnnotation::new("main")));
        let root = GenRoot::new(vec![slot().into(), slot().into()]);
        assert_eq!(render(&root).warnings.len(), 1);
    }

    #[test]
    fn test_include_replaces_element() {
        let root = GenRoot::new(vec![el("site-header")
            .with_gen(GenAnnotations::include(IncludeAnnotation::new("partials/header")))
            .with_text("ignored")
            .into()]);
        assert_eq!(render(&root).content, "[include partials/header.br]");
    }

    #[test]
    fn test_else_chain_renders_as_one_construct() {
        let root = GenRoot::new(vec![
            el("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::new("a")))
                .with_text("A")
                .into(),
            GenNode::text("\n"),
            el("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::else_if("b")))
                .with_text("B")
                .into(),
            el("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::else_branch()))
                .with_text("C")
                .into(),
            GenNode::text("!"),
        ]);
        assert_eq!(
            render(&root).content,
            "[if a]<p>A</p>\n[elif b]<p>B</p>\n[else]<p>C</p>[/if]!"
        );
    }

    #[test]
    fn test_else_branch_keeps_own_loop() {
        let branch = GenAnnotations {
            condition: Some(ConditionAnnotation::else_branch()),
            r#loop: Some(LoopAnnotation::new("x", "xs")),
            ..Default::default()
        };
        let root = GenRoot::new(vec![
            el("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::new("empty")))
                .into(),
            el("li").with_gen(branch).into(),
        ]);
        assert_eq!(
            render(&root).content,
            "[if empty]<p></p>\n[else][each x in xs]<li></li>[/each][/if]"
        );
    }

    #[test]
    fn test_extends_emitted_once_at_top() {
        let block = |name: &str| {
            el("section").with_gen(GenAnnotations::block(
                BlockAnnotation::new(name).extending("layouts/base"),
            ))
        };
        let root = GenRoot::new(vec![block("a").into(), block("b").into()]);
        let out = render(&root);
        assert!(out.content.starts_with("[extends layouts/base]\n"));
        assert_eq!(out.content.matches("[extends").count(), 1);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_conflicting_extends_warns() {
        let root = GenRoot::new(vec![
            el("section")
                .with_gen(GenAnnotations::block(BlockAnnotation::new("a").extending("base")))
                .into(),
            el("section")
                .with_gen(GenAnnotations::block(BlockAnnotation::new("b").extending("other")))
                .into(),
        ]);
        let out = render(&root);
        assert!(out.content.starts_with("[extends base]"));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_unsupported_feature_fails_whole_transform() {
        let plugin = BracketPlugin::new(FeatureFlags::default()).ready();
        let root = GenRoot::new(vec![
            el("p").with_text("before").into(),
            el("div")
                .with_child(el("main").with_gen(GenAnnotations::block(BlockAnnotation::new("c"))))
                .into(),
        ]);
        let err = transform(&root, &plugin).unwrap_err();
        match err {
            RenderError::UnsupportedFeature {
                feature, location, ..
            } => {
                assert_eq!(feature, Feature::Inheritance);
                assert_eq!(location.path, "/div[1]/main[0]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_filter_requires_filter_support() {
        let plugin = BracketPlugin::new(FeatureFlags::default()).ready();
        let root = GenRoot::new(vec![el("span")
            .with_gen(GenAnnotations::variable(
                VariableAnnotation::new("t").with_filter("uppercase", vec![]),
            ))
            .into()]);
        assert!(matches!(
            transform(&root, &plugin),
            Err(RenderError::UnsupportedFeature {
                feature: Feature::Filters,
                ..
            })
        ));
    }

    #[test]
    fn test_schema_error_before_rendering() {
        let root = GenRoot::new(vec![el("li")
            .with_gen(GenAnnotations::looping(LoopAnnotation::new("", "xs")))
            .into()]);
        let err = transform(&root, &BracketPlugin::full().ready()).unwrap_err();
        assert!(matches!(err, RenderError::Schema(_)));
    }

    #[test]
    fn test_variables_and_dependencies_deduplicated_in_order() {
        let root = GenRoot::new(vec![
            el("ul")
                .with_gen(GenAnnotations::looping(LoopAnnotation::new("p", "products")))
                .with_child(
                    el("li").with_child(
                        el("span").with_gen(GenAnnotations::variable(VariableAnnotation::new("title"))),
                    ),
                )
                .into(),
            el("span")
                .with_gen(GenAnnotations::variable(VariableAnnotation::new("products")))
                .into(),
            el("x")
                .with_gen(GenAnnotations::include(IncludeAnnotation::new("partials/a")))
                .into(),
            el("x")
                .with_gen(GenAnnotations::include(IncludeAnnotation::new("partials/a")))
                .into(),
            el("span")
                .with_gen(GenAnnotations::variable(VariableAnnotation::new("title")))
                .into(),
        ]);
        let out = render(&root);
        assert_eq!(out.variables, vec!["products", "title"]);
        assert_eq!(out.dependencies, vec!["partials/a"]);
    }

    #[test]
    fn test_filename_from_component_name() {
        let root = GenRoot::default().with_meta(GenComponentMeta::named("ProductCard"));
        assert_eq!(render(&root).filename, "product-card.br");
    }

    #[test]
    fn test_filename_fallbacks() {
        let from_source = GenRoot::default().with_meta(GenComponentMeta {
            source_file: Some("src/components/SiteFooter.vue".into()),
            ..Default::default()
        });
        assert_eq!(output_filename(&from_source, ".njk"), "site-footer.njk");
        assert_eq!(output_filename(&GenRoot::default(), ".njk"), "template.njk");
    }

    #[test]
    fn test_comment_nodes_use_engine_comments() {
        let root = GenRoot::new(vec![GenNode::comment("note")]);
        assert_eq!(render(&root).content, "[# note #]");

        let plugin = BracketPlugin::new(FeatureFlags::default()).ready();
        let out = transform(&root, &plugin).unwrap();
        assert_eq!(out.content, "<!--note-->");
    }

    #[test]
    fn test_props_header_and_pretty_print() {
        let plugin = BracketPlugin::full();
        plugin
            .initialize(&PluginContext::new(
                PluginConfig::default()
                    .with_props_header(true)
                    .with_pretty_print(true),
            ))
            .unwrap();
        let mut meta = GenComponentMeta::named("Card");
        meta.props = vec![crate::tree::PropDefinition {
            name: "title".into(),
            prop_type: Some("string".into()),
            required: true,
            default: None,
        }];
        let root = GenRoot::new(vec![
            el("p").into(),
            GenNode::text("   \n\n\n"),
            el("p").into(),
        ])
        .with_meta(meta);

        let out = transform(&root, &plugin).unwrap();
        assert_eq!(
            out.content,
            "[# Props: title: string (required) #]\n<p></p>\n\n<p></p>\n"
        );
    }

    #[test]
    fn test_props_header_without_comment_support() {
        let plugin = BracketPlugin::new(FeatureFlags::default());
        plugin
            .initialize(&PluginContext::new(
                PluginConfig::default().with_props_header(true),
            ))
            .unwrap();
        let mut meta = GenComponentMeta::named("Card");
        meta.props = vec![crate::tree::PropDefinition {
            name: "title".into(),
            prop_type: None,
            required: false,
            default: None,
        }];
        let root = GenRoot::new(vec![el("p").into()]).with_meta(meta);

        let out = transform(&root, &plugin).unwrap();
        assert_eq!(out.content, "<!--Props: title-->\n<p></p>");
    }

    #[test]
    fn test_renderer_refusal_fails_whole_transform() {
        let root = GenRoot::new(vec![el("div")
            .with_child(el("p").with_text("intro"))
            .with_child(
                el("x-card")
                    .with_gen(GenAnnotations::include(IncludeAnnotation::new("partials/card"))),
            )
            .into()]);
        let plugin = BracketPlugin::full().refusing(Feature::Partials).ready();

        match transform(&root, &plugin) {
            Err(RenderError::UnsupportedFeature {
                plugin,
                feature,
                location,
            }) => {
                assert_eq!(plugin, "bracket");
                assert_eq!(feature, Feature::Partials);
                assert_eq!(location.path, "/div[0]/x-card[1]");
            }
            other => panic!("expected unsupported feature, got {other:?}"),
        }
    }

    #[test]
    fn test_block_refusal_inside_condition_branch() {
        let root = GenRoot::new(vec![
            el("p")
                .with_gen(GenAnnotations::condition(ConditionAnnotation::new("a")))
                .into(),
            el("main")
                .with_gen(GenAnnotations {
                    condition: Some(ConditionAnnotation::else_branch()),
                    block: Some(BlockAnnotation::new("content")),
                    ..Default::default()
                })
                .into(),
        ]);
        let plugin = BracketPlugin::full().refusing(Feature::Inheritance).ready();

        let err = transform(&root, &plugin).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnsupportedFeature { feature: Feature::Inheritance, ref location, .. }
                if location.path == "/main[1]"
        ));
    }

    #[test]
    fn test_pretty_print_normalizes() {
        assert_eq!(pretty_print("\n\na  \n\n\n\nb\n\n"), "a\n\nb\n");
    }

    #[test]
    fn test_transform_all_keeps_order() {
        let ok: Arc<dyn TemplatePlugin> = Arc::new(BracketPlugin::full().ready());
        let not_ready: Arc<dyn TemplatePlugin> = Arc::new(BracketPlugin::full());
        let root = GenRoot::new(vec![el("p").into()]);

        let results = transform_all(&root, &[ok, not_ready]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_unknown_filter_falls_back() {
        let plugin = BracketPlugin::full().ready();
        assert_eq!(plugin.apply_filter("x", "uppercase", &[]), "x|up");
        assert_eq!(
            plugin.apply_filter("x", "shout", &[Value::from(2)]),
            "x|shout:2"
        );
    }

    #[test]
    fn test_tree_is_not_mutated() {
        let root = GenRoot::new(vec![el("div")
            .with_gen(GenAnnotations::variable(VariableAnnotation::new("a")))
            .into()]);
        let before = root.clone();
        let _ = render(&root);
        assert_eq!(root, before);
    }
}
