//! Wireproof navigation path resolver
//!
//! Turns a raw expand expression into one resolved [`NavigationStack`]
//! per branch. Top-level commas separate branches, slashes separate hops,
//! and a parenthesized `($expand=...)` option opens a nested expression
//! that may itself branch; nested branches each produce a full stack
//! sharing the outer prefix.
//!
//! The resolver follows exactly as many hops as the expression literally
//! names, so cycles in the type graph (self-referential navigation
//! properties included) can never cause non-termination.

use thiserror::Error;
use wireproof_metadata::ServiceModel;
use wireproof_types::{EntityType, NavigationStack, NavigationStep};

/// Errors raised while resolving a navigation expression.
///
/// All of these are per-attempt: callers downgrade them to an
/// inconclusive verdict rather than failing the session.
#[derive(Debug, Error)]
pub enum NavigateError {
    /// A path segment does not name a navigation property on the type
    /// it is applied to
    #[error("unknown navigation segment '{segment}' on type {on_type}")]
    UnknownSegment { segment: String, on_type: String },

    /// A navigation property points at a type the metadata document
    /// never declares
    #[error("navigation property '{via}' targets undeclared type {type_name}")]
    UnknownTargetType { type_name: String, via: String },

    /// The expression itself is not parseable
    #[error("malformed navigation expression: {reason}")]
    Malformed { reason: String },
}

/// Convenience result type for resolver operations.
pub type NavigateResult<T> = Result<T, NavigateError>;

/// Resolve a navigation expression against a root entity type.
///
/// An empty or whitespace expression yields an empty stack list: a
/// no-op, not an error. Branches are resolved independently; no state
/// is shared across them.
pub fn resolve(
    model: &ServiceModel,
    root: &EntityType,
    expression: &str,
) -> NavigateResult<Vec<NavigationStack>> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(Vec::new());
    }
    let mut stacks = Vec::new();
    for branch in split_top_level(expression)? {
        resolve_branch(model, &root.qualified_name, root, branch, &[], &mut stacks)?;
    }
    Ok(stacks)
}

fn resolve_branch(
    model: &ServiceModel,
    root: &str,
    current: &EntityType,
    branch: &str,
    prefix: &[NavigationStep],
    out: &mut Vec<NavigationStack>,
) -> NavigateResult<()> {
    let branch = branch.trim();
    let (segment, rest) = split_first_segment(branch)?;
    let (name, options) = split_options(segment)?;
    if name.is_empty() {
        return Err(NavigateError::Malformed {
            reason: format!("empty segment in branch '{branch}'"),
        });
    }
    // Options close a segment; anything after them belongs inside the
    // option group, never behind it.
    if options.is_some() && rest.is_some() {
        return Err(NavigateError::Malformed {
            reason: format!("segment '{segment}' mixes parenthesized options with a trailing path"),
        });
    }

    let property = current
        .navigation_property(name)
        .ok_or_else(|| NavigateError::UnknownSegment {
            segment: name.to_string(),
            on_type: current.qualified_name.clone(),
        })?
        .clone();
    let cumulative = match prefix.last() {
        Some(step) => step.cumulative.combine(property.multiplicity),
        None => property.multiplicity,
    };
    let target =
        model
            .entity_type(&property.target_type)
            .ok_or_else(|| NavigateError::UnknownTargetType {
                type_name: property.target_type.clone(),
                via: property.name.clone(),
            })?;

    let mut steps = prefix.to_vec();
    steps.push(NavigationStep {
        property,
        cumulative,
    });

    // A nested $expand option branches below this hop; otherwise the
    // branch either continues down a slash path or ends here.
    if let Some(inner) = options.and_then(extract_expand_option) {
        for inner_branch in split_top_level(inner)? {
            resolve_branch(model, root, target, inner_branch, &steps, out)?;
        }
        return Ok(());
    }
    match rest {
        Some(rest) => resolve_branch(model, root, target, rest, &steps, out),
        None => {
            out.push(NavigationStack {
                root: root.to_string(),
                steps,
            });
            Ok(())
        }
    }
}

/// Split an expression on commas that sit outside any parentheses.
fn split_top_level(expr: &str) -> NavigateResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or(NavigateError::Malformed {
                    reason: format!("unbalanced ')' in '{expr}'"),
                })?;
            }
            ',' if depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(NavigateError::Malformed {
            reason: format!("unbalanced '(' in '{expr}'"),
        });
    }
    parts.push(&expr[start..]);
    Ok(parts)
}

/// Split off the first slash segment of a branch, ignoring slashes
/// inside parentheses.
fn split_first_segment(branch: &str) -> NavigateResult<(&str, Option<&str>)> {
    let mut depth = 0usize;
    for (i, c) in branch.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or(NavigateError::Malformed {
                    reason: format!("unbalanced ')' in '{branch}'"),
                })?;
            }
            '/' if depth == 0 => {
                return Ok((&branch[..i], Some(&branch[i + 1..])));
            }
            _ => {}
        }
    }
    Ok((branch, None))
}

/// Split `Name(options)` into the segment name and its raw options.
fn split_options(segment: &str) -> NavigateResult<(&str, Option<&str>)> {
    let segment = segment.trim();
    match segment.find('(') {
        None => Ok((segment, None)),
        Some(open) => {
            let inner = segment[open..]
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(|| NavigateError::Malformed {
                    reason: format!("segment '{segment}' has unterminated options"),
                })?;
            Ok((segment[..open].trim(), Some(inner)))
        }
    }
}

/// Pull the `$expand=` value out of a semicolon-separated option list.
/// Other options ($select, $filter, ...) are irrelevant to path shape.
/// Only semicolons outside parentheses separate options; a nested
/// option group keeps its own separators.
fn extract_expand_option(options: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut parts = Vec::new();
    for (i, c) in options.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(&options[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&options[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .find_map(|opt| opt.strip_prefix("$expand="))
}
