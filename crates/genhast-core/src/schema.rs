//! Annotation schema boundary.
//!
//! Every annotation is checked against its fixed shape before any renderer sees
//! it. A single malformed annotation fails the whole tree; nothing is partially
//! rendered.

use crate::error::{NodeLocation, SchemaValidationError};
use crate::tree::{AnnotationKind, GenAnnotations, GenElement, GenNode, GenRoot};

/// Validate every node and annotation in the tree.
pub fn validate_root(root: &GenRoot) -> Result<(), SchemaValidationError> {
    validate_children(&root.children, "")
}

/// Build the path segment for a child element.
pub(crate) fn child_path(parent: &str, tag_name: &str, index: usize) -> String {
    format!("{parent}/{tag_name}[{index}]")
}

fn validate_children(children: &[GenNode], parent_path: &str) -> Result<(), SchemaValidationError> {
    // Tracks whether the previous significant sibling can be continued by an
    // `isElse` / `isElseIf` branch.
    let mut chain_open = false;

    for (index, node) in children.iter().enumerate() {
        match node {
            GenNode::Element(el) => {
                let path = child_path(parent_path, &el.tag_name, index);
                validate_element(el, &path)?;

                match el.condition() {
                    Some(cond) if cond.is_continuation() => {
                        if !chain_open {
                            return Err(SchemaValidationError::InvalidStructure {
                                location: NodeLocation::new(path, el.source()),
                                reason: "else branch has no preceding condition sibling".into(),
                            });
                        }
                        chain_open = !cond.is_else;
                    }
                    Some(_) => chain_open = true,
                    None => chain_open = false,
                }

                validate_children(&el.children, &path)?;
            }
            GenNode::Root(_) => {
                return Err(SchemaValidationError::InvalidStructure {
                    location: NodeLocation::new(format!("{parent_path}/#root[{index}]"), None),
                    reason: "a root node may only appear at the top of a tree".into(),
                });
            }
            GenNode::Text(_) if node.is_blank_text() => {}
            GenNode::Text(_) | GenNode::Comment(_) | GenNode::Doctype => chain_open = false,
        }
    }

    Ok(())
}

fn validate_element(el: &GenElement, path: &str) -> Result<(), SchemaValidationError> {
    if el.tag_name.trim().is_empty() {
        return Err(SchemaValidationError::InvalidStructure {
            location: NodeLocation::new(path, el.source()),
            reason: "element has an empty tag name".into(),
        });
    }

    let Some(gen) = &el.gen else {
        return Ok(());
    };

    let invalid = |annotation: AnnotationKind, reason: &str| SchemaValidationError::InvalidAnnotation {
        annotation,
        location: NodeLocation::new(path, gen.source.as_ref()),
        reason: reason.to_string(),
    };

    check_loop(gen).map_err(|reason| invalid(AnnotationKind::Loop, reason))?;
    check_condition(gen).map_err(|reason| invalid(AnnotationKind::Condition, reason))?;

    if let Some(variable) = &gen.variable {
        if is_blank(&variable.name) {
            return Err(invalid(AnnotationKind::Variable, "`name` must be a non-empty string"));
        }
        if variable.filter.as_deref().is_some_and(is_blank) {
            return Err(invalid(AnnotationKind::Variable, "`filter` must not be empty when present"));
        }
        if variable.filter.is_none() && !variable.filter_args.is_empty() {
            return Err(invalid(AnnotationKind::Variable, "`filterArgs` given without a `filter`"));
        }
    }

    if let Some(slot) = &gen.slot {
        if is_blank(&slot.name) {
            return Err(invalid(AnnotationKind::Slot, "`name` must be a non-empty string"));
        }
    }

    if let Some(include) = &gen.include {
        if is_blank(&include.partial) {
            return Err(invalid(AnnotationKind::Include, "`partial` must be a non-empty string"));
        }
        if include.props.keys().any(|k| is_blank(k)) {
            return Err(invalid(AnnotationKind::Include, "prop names must be non-empty"));
        }
    }

    if let Some(block) = &gen.block {
        if is_blank(&block.name) {
            return Err(invalid(AnnotationKind::Block, "`name` must be a non-empty string"));
        }
        if block.extends.as_deref().is_some_and(is_blank) {
            return Err(invalid(AnnotationKind::Block, "`extends` must not be empty when present"));
        }
    }

    if let Some(component) = &gen.component {
        if is_blank(&component.name) {
            return Err(invalid(AnnotationKind::Component, "`name` must be a non-empty string"));
        }
    }

    Ok(())
}

fn check_loop(gen: &GenAnnotations) -> Result<(), &'static str> {
    let Some(lp) = &gen.r#loop else {
        return Ok(());
    };
    if is_blank(&lp.item) {
        return Err("`item` must be a non-empty string");
    }
    if is_blank(&lp.collection) {
        return Err("`collection` must be a non-empty string");
    }
    if lp.key.as_deref().is_some_and(is_blank) {
        return Err("`key` must not be empty when present");
    }
    if lp.index.as_deref().is_some_and(is_blank) {
        return Err("`index` must not be empty when present");
    }
    Ok(())
}

fn check_condition(gen: &GenAnnotations) -> Result<(), &'static str> {
    let Some(cond) = &gen.condition else {
        return Ok(());
    };
    if cond.is_else && cond.is_else_if {
        return Err("`isElse` and `isElseIf` are mutually exclusive");
    }
    if !cond.is_else && is_blank(&cond.expression) {
        return Err("`expression` must be a non-empty string");
    }
    Ok(())
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
