//! GenHAST: the annotated HTML tree consumed by template plugins.
//!
//! Trees are produced by an upstream front end and handed to the renderer
//! read-only. Every element owns its children; there is no sharing and no
//! back-references, so a tree is finite and acyclic by construction.
//!
//! The serde shape mirrors the front end's JSON: nodes carry a `type` tag,
//! field names are camelCase and annotations live under the `_gen` key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaValidationError;

/// A single node in a GenHAST tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenNode {
    Root(GenRoot),
    Element(GenElement),
    Text(GenText),
    Comment(GenComment),
    Doctype,
}

impl GenNode {
    /// Convenience constructor for a text node.
    pub fn text(value: impl Into<String>) -> Self {
        GenNode::Text(GenText {
            value: value.into(),
        })
    }

    /// Convenience constructor for a comment node.
    pub fn comment(value: impl Into<String>) -> Self {
        GenNode::Comment(GenComment {
            value: value.into(),
        })
    }

    /// Returns the element if this node is one.
    pub fn as_element(&self) -> Option<&GenElement> {
        match self {
            GenNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Whether this node is a text node containing only whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, GenNode::Text(t) if t.value.trim().is_empty())
    }
}

impl From<GenElement> for GenNode {
    fn from(element: GenElement) -> Self {
        GenNode::Element(element)
    }
}

/// Root of a GenHAST tree, optionally carrying component metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenRoot {
    #[serde(default)]
    pub children: Vec<GenNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<GenComponentMeta>,
}

impl GenRoot {
    pub fn new(children: Vec<GenNode>) -> Self {
        Self {
            children,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: GenComponentMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Deserialize a tree from the front end's JSON and validate its
    /// annotations. Malformed input is rejected before any rendering.
    pub fn from_json(json: &str) -> Result<Self, SchemaValidationError> {
        let root: GenRoot = serde_json::from_str(json)?;
        crate::schema::validate_root(&root)?;
        Ok(root)
    }

    /// Visit every element in document (pre-)order.
    pub fn walk_elements<'a>(&'a self, visit: &mut impl FnMut(&'a GenElement)) {
        walk_nodes(&self.children, visit);
    }
}

fn walk_nodes<'a>(nodes: &'a [GenNode], visit: &mut impl FnMut(&'a GenElement)) {
    for node in nodes {
        match node {
            GenNode::Element(el) => {
                visit(el);
                walk_nodes(&el.children, visit);
            }
            GenNode::Root(root) => walk_nodes(&root.children, visit),
            GenNode::Text(_) | GenNode::Comment(_) | GenNode::Doctype => {}
        }
    }
}

/// An HTML element with ordinary attributes and optional annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenElement {
    pub tag_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(rename = "_gen", default, skip_serializing_if = "Option::is_none")]
    pub gen: Option<GenAnnotations>,
    #[serde(default)]
    pub children: Vec<GenNode>,
}

impl GenElement {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            properties: Map::new(),
            gen: None,
            children: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_gen(mut self, gen: GenAnnotations) -> Self {
        self.gen = Some(gen);
        self
    }

    pub fn with_child(mut self, child: impl Into<GenNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, value: impl Into<String>) -> Self {
        self.with_child(GenNode::text(value))
    }

    /// The `condition` annotation, if any.
    pub fn condition(&self) -> Option<&ConditionAnnotation> {
        self.gen.as_ref().and_then(|g| g.condition.as_ref())
    }

    /// The `source` annotation, if any.
    pub fn source(&self) -> Option<&SourceAnnotation> {
        self.gen.as_ref().and_then(|g| g.source.as_ref())
    }

    /// Whether any child is an element (as opposed to text/comments).
    pub fn has_element_children(&self) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, GenNode::Element(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenText {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenComment {
    pub value: String,
}

/// Annotations attached to an element. Each kind appears at most once;
/// unknown keys and duplicate keys are rejected at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#loop: Option<LoopAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<VariableAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<IncludeAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockAnnotation>,
    /// Drop the element's own tag and emit only its children.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unwrap: bool,
    /// Suppress escaping for this subtree.
    #[serde(default, skip_serializing_if = "is_false")]
    pub raw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceAnnotation>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl GenAnnotations {
    pub fn looping(annotation: LoopAnnotation) -> Self {
        Self {
            r#loop: Some(annotation),
            ..Default::default()
        }
    }

    pub fn condition(annotation: ConditionAnnotation) -> Self {
        Self {
            condition: Some(annotation),
            ..Default::default()
        }
    }

    pub fn variable(annotation: VariableAnnotation) -> Self {
        Self {
            variable: Some(annotation),
            ..Default::default()
        }
    }

    pub fn slot(annotation: SlotAnnotation) -> Self {
        Self {
            slot: Some(annotation),
            ..Default::default()
        }
    }

    pub fn include(annotation: IncludeAnnotation) -> Self {
        Self {
            include: Some(annotation),
            ..Default::default()
        }
    }

    pub fn block(annotation: BlockAnnotation) -> Self {
        Self {
            block: Some(annotation),
            ..Default::default()
        }
    }

    /// Kinds present on this record, in declaration order.
    pub fn kinds(&self) -> Vec<AnnotationKind> {
        let mut kinds = Vec::new();
        if self.r#loop.is_some() {
            kinds.push(AnnotationKind::Loop);
        }
        if self.condition.is_some() {
            kinds.push(AnnotationKind::Condition);
        }
        if self.variable.is_some() {
            kinds.push(AnnotationKind::Variable);
        }
        if self.slot.is_some() {
            kinds.push(AnnotationKind::Slot);
        }
        if self.include.is_some() {
            kinds.push(AnnotationKind::Include);
        }
        if self.block.is_some() {
            kinds.push(AnnotationKind::Block);
        }
        if self.unwrap {
            kinds.push(AnnotationKind::Unwrap);
        }
        if self.raw {
            kinds.push(AnnotationKind::Raw);
        }
        if self.component.is_some() {
            kinds.push(AnnotationKind::Component);
        }
        if self.source.is_some() {
            kinds.push(AnnotationKind::Source);
        }
        kinds
    }
}

/// The annotation kinds a GenHAST element can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Loop,
    Condition,
    Variable,
    Slot,
    Include,
    Block,
    Unwrap,
    Raw,
    Component,
    Source,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationKind::Loop => "loop",
            AnnotationKind::Condition => "condition",
            AnnotationKind::Variable => "variable",
            AnnotationKind::Slot => "slot",
            AnnotationKind::Include => "include",
            AnnotationKind::Block => "block",
            AnnotationKind::Unwrap => "unwrap",
            AnnotationKind::Raw => "raw",
            AnnotationKind::Component => "component",
            AnnotationKind::Source => "source",
        };
        f.write_str(name)
    }
}

/// Repeat the element once per item of `collection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoopAnnotation {
    pub item: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

impl LoopAnnotation {
    pub fn new(item: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            collection: collection.into(),
            key: None,
            index: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }
}

/// Guard the element on `expression`, or continue a preceding condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionAnnotation {
    #[serde(default)]
    pub expression: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_else: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_else_if: bool,
}

impl ConditionAnnotation {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn else_if(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            is_else_if: true,
            ..Default::default()
        }
    }

    pub fn else_branch() -> Self {
        Self {
            is_else: true,
            ..Default::default()
        }
    }

    /// Whether this continues a previous sibling's condition.
    pub fn is_continuation(&self) -> bool {
        self.is_else || self.is_else_if
    }
}

/// Interpolate a scalar value with optional fallback and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VariableAnnotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_args: Vec<Value>,
}

impl VariableAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            filter: None,
            filter_args: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>, args: Vec<Value>) -> Self {
        self.filter = Some(filter.into());
        self.filter_args = args;
        self
    }
}

/// Placeholder for externally supplied content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotAnnotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepts: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
}

impl SlotAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Reference another template, optionally passing props.
///
/// Prop values that are strings are treated as expressions; any other JSON
/// value is emitted as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IncludeAnnotation {
    pub partial: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
}

impl IncludeAnnotation {
    pub fn new(partial: impl Into<String>) -> Self {
        Self {
            partial: partial.into(),
            props: Map::new(),
            original_name: None,
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }
}

/// Named template-inheritance region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockAnnotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

impl BlockAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
        }
    }

    pub fn extending(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }
}

/// Marks an element as a reference to another component. Metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentAnnotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
}

/// Where the element came from in the authoring source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SourceAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl fmt::Display for SourceAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.as_deref().unwrap_or("<unknown>"))?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Component-level metadata produced by the front end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenComponentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default)]
    pub props: Vec<PropDefinition>,
    #[serde(default)]
    pub preamble: Vec<String>,
    #[serde(default)]
    pub preamble_vars: Vec<String>,
}

impl GenComponentMeta {
    pub fn named(component_name: impl Into<String>) -> Self {
        Self {
            component_name: Some(component_name.into()),
            ..Default::default()
        }
    }
}

/// A prop declared by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropDefinition {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub prop_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}
