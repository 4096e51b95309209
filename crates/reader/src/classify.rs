//! Eligibility rules for emphasis targets.
//!
//! Eligibility is derived on demand, never stored on the tree. Checks walk
//! the ancestor chain, so cost is O(depth) regardless of document size.

use dom::{Document, NodeKey, contains_ignore_ascii_case};
use std::collections::HashSet;

/// Attribute carried by every generated emphasis span.
pub const MARKER_ATTR: &str = "data-skim-em";

/// Semantic text containers worth emphasizing.
const ALLOWED_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "dt", "dd", "td", "th",
    "caption", "figcaption", "blockquote",
];

/// Tags whose subtrees are never touched: chrome, overlays, non-rendering
/// content, embedded foreign documents, form controls.
const EXCLUDED_TAGS: &[&str] = &[
    "nav", "aside", "dialog", "script", "style", "head", "title", "template",
    "iframe", "object", "embed", "button", "select", "textarea", "input",
];

const EXCLUDED_ROLES: &[&str] = &[
    "dialog",
    "alertdialog",
    "complementary",
    "navigation",
    "menu",
    "menubar",
    "toolbar",
    "listbox",
    "combobox",
    "textbox",
    "searchbox",
    "tree",
    "grid",
    "tablist",
];

/// Class-name fragments that mark overlay-ish chrome.
const CLASS_MARKERS: &[&[u8]] = &[
    b"overlay",
    b"sidebar",
    b"side-bar",
    b"modal",
    b"popup",
    b"tooltip",
];

pub fn is_allowed_tag(name: &str) -> bool {
    ALLOWED_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

/// Whether this element itself starts an excluded region.
pub fn is_excluded_element(doc: &Document, key: NodeKey) -> bool {
    let Some(name) = doc.name(key) else {
        return false;
    };
    if EXCLUDED_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag)) {
        return true;
    }
    if let Some(role) = doc.attr(key, "role") {
        let role = role.trim();
        if EXCLUDED_ROLES.iter().any(|r| role.eq_ignore_ascii_case(r)) {
            return true;
        }
    }
    if let Some(class) = doc.attr(key, "class")
        && CLASS_MARKERS
            .iter()
            .any(|marker| contains_ignore_ascii_case(class, marker))
    {
        return true;
    }
    false
}

/// Whether the node or any ancestor starts an excluded region.
pub fn in_excluded_region(doc: &Document, key: NodeKey) -> bool {
    let mut current = Some(key);
    while let Some(k) = current {
        if is_excluded_element(doc, k) {
            return true;
        }
        current = doc.parent(k);
    }
    false
}

/// Full eligibility check for a transform target: allowed tag, attached,
/// no excluded ancestor, and not already covered by a processed element or
/// a generated marker span.
pub fn is_eligible(doc: &Document, key: NodeKey, processed: &HashSet<NodeKey>) -> bool {
    let Some(name) = doc.name(key) else {
        return false;
    };
    if !is_allowed_tag(name) {
        return false;
    }
    if !doc.is_connected(key) {
        return false;
    }
    let mut current = Some(key);
    while let Some(k) = current {
        if processed.contains(&k) || doc.has_attr(k, MARKER_ATTR) || is_excluded_element(doc, k) {
            return false;
        }
        current = doc.parent(k);
    }
    true
}

/// Collects every eligible element in a subtree, pruning excluded branches.
pub fn collect_eligible(
    doc: &Document,
    key: NodeKey,
    processed: &HashSet<NodeKey>,
    out: &mut Vec<NodeKey>,
) {
    if doc.is_element(key) {
        if is_excluded_element(doc, key) || doc.has_attr(key, MARKER_ATTR) {
            return;
        }
        if is_eligible(doc, key, processed) {
            out.push(key);
        }
    }
    for child in doc.children(key).to_vec() {
        collect_eligible(doc, child, processed, out);
    }
}
