//! Deterministic tree serialization and equality rules for tests.
//! Not a public stable format; intended for internal test comparisons.
//!
//! Equivalence rules:
//! - Node kinds must match.
//! - Element names must match.
//! - Attribute list order is significant; names and values must match.
//! - Text and comment nodes must match exactly.
//! - Node keys are ignored unless requested by options.

use crate::document::{Document, NodeData, NodeKey};
use std::fmt::{self, Write};

#[derive(Clone, Copy, Debug)]
pub struct SnapshotOptions {
    pub include_keys: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self { include_keys: false }
    }
}

#[derive(Debug)]
pub struct TreeSnapshot {
    lines: Vec<String>,
}

impl TreeSnapshot {
    pub fn new(doc: &Document, root: NodeKey, options: SnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(doc, root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct TreeMismatch {
    path: String,
    detail: String,
    expected: String,
    actual: String,
    expected_subtree: String,
    actual_subtree: String,
}

impl fmt::Display for TreeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree mismatch at {}: {}", self.path, self.detail)?;
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "actual:   {}", self.actual)?;
        writeln!(f, "expected subtree:\n{}", self.expected_subtree)?;
        writeln!(f, "actual subtree:\n{}", self.actual_subtree)?;
        Ok(())
    }
}

impl std::error::Error for TreeMismatch {}

pub fn assert_tree_eq(
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: SnapshotOptions,
) {
    if let Err(mismatch) = compare_trees(expected, actual, options) {
        panic!("{mismatch}");
    }
}

pub fn compare_trees(
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: SnapshotOptions,
) -> Result<(), Box<TreeMismatch>> {
    let mut path = vec![node_label(expected.0, expected.1)];
    compare_nodes(expected, actual, &options, &mut path)
}

fn compare_nodes(
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: &SnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<TreeMismatch>> {
    let (exp_doc, exp_key) = expected;
    let (act_doc, act_key) = actual;
    let exp_data = exp_doc.node(exp_key);
    let act_data = act_doc.node(act_key);
    match (exp_data, act_data) {
        (Some(NodeData::Document), Some(NodeData::Document)) => {
            compare_children(expected, actual, options, path)
        }
        (
            Some(NodeData::Element { name: exp_name, attributes: exp_attrs }),
            Some(NodeData::Element { name: act_name, attributes: act_attrs }),
        ) => {
            if exp_name != act_name {
                return Err(mismatch(path, "element name", expected, actual, options));
            }
            if exp_attrs.len() != act_attrs.len() {
                return Err(mismatch(path, "attribute count", expected, actual, options));
            }
            for (i, (exp, act)) in exp_attrs.iter().zip(act_attrs.iter()).enumerate() {
                if exp.0 != act.0 {
                    return Err(mismatch(
                        path,
                        &format!("attribute name at index {i}"),
                        expected,
                        actual,
                        options,
                    ));
                }
                if exp.1 != act.1 {
                    return Err(mismatch(
                        path,
                        &format!("attribute value at index {i}"),
                        expected,
                        actual,
                        options,
                    ));
                }
            }
            compare_children(expected, actual, options, path)
        }
        (Some(NodeData::Text { text: exp_text }), Some(NodeData::Text { text: act_text })) => {
            if exp_text != act_text {
                return Err(mismatch(path, "text", expected, actual, options));
            }
            Ok(())
        }
        (
            Some(NodeData::Comment { text: exp_text }),
            Some(NodeData::Comment { text: act_text }),
        ) => {
            if exp_text != act_text {
                return Err(mismatch(path, "comment", expected, actual, options));
            }
            Ok(())
        }
        _ => Err(mismatch(path, "node kind", expected, actual, options)),
    }
}

fn compare_children(
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: &SnapshotOptions,
    path: &mut Vec<String>,
) -> Result<(), Box<TreeMismatch>> {
    let exp_children = expected.0.children(expected.1);
    let act_children = actual.0.children(actual.1);
    if exp_children.len() != act_children.len() {
        return Err(mismatch(
            path,
            &format!(
                "child count (expected {}, actual {})",
                exp_children.len(),
                act_children.len()
            ),
            expected,
            actual,
            options,
        ));
    }
    for (idx, (exp, act)) in exp_children.iter().zip(act_children.iter()).enumerate() {
        path.push(format!("{}[{}]", node_label(expected.0, *exp), idx));
        let result = compare_nodes((expected.0, *exp), (actual.0, *act), options, path);
        path.pop();
        result?;
    }
    Ok(())
}

fn mismatch(
    path: &[String],
    detail: &str,
    expected: (&Document, NodeKey),
    actual: (&Document, NodeKey),
    options: &SnapshotOptions,
) -> Box<TreeMismatch> {
    let path = format!("/{}", path.join("/"));
    let expected_line = format_node_line(expected.0, expected.1, options);
    let actual_line = format_node_line(actual.0, actual.1, options);
    Box::new(TreeMismatch {
        path,
        detail: detail.to_string(),
        expected: truncate_line(expected_line, 160),
        actual: truncate_line(actual_line, 160),
        expected_subtree: TreeSnapshot::new(expected.0, expected.1, *options).render(),
        actual_subtree: TreeSnapshot::new(actual.0, actual.1, *options).render(),
    })
}

fn node_label(doc: &Document, key: NodeKey) -> String {
    match doc.node(key) {
        Some(NodeData::Document) => "#document".to_string(),
        Some(NodeData::Element { name, attributes }) => {
            let mut label = String::from(name.as_ref());
            let id_attr = attributes
                .iter()
                .find(|(k, _)| k.as_ref() == "id")
                .and_then(|(_, v)| v.as_deref())
                .filter(|v| !v.is_empty());
            let class_attr = attributes
                .iter()
                .find(|(k, _)| k.as_ref() == "class")
                .and_then(|(_, v)| v.as_deref())
                .filter(|v| !v.is_empty());
            if let Some(id_value) = id_attr {
                label.push('#');
                write_escaped(&mut label, id_value);
            } else if let Some(class_value) = class_attr {
                label.push_str(".class=");
                write_escaped(&mut label, class_value);
            }
            label
        }
        Some(NodeData::Text { .. }) => "#text".to_string(),
        Some(NodeData::Comment { .. }) => "#comment".to_string(),
        None => "#dead".to_string(),
    }
}

fn truncate_line(mut line: String, max_len: usize) -> String {
    if line.len() > max_len {
        line.truncate(max_len.saturating_sub(3));
        line.push_str("...");
    }
    line
}

fn walk_snapshot(
    doc: &Document,
    key: NodeKey,
    options: &SnapshotOptions,
    indent_level: usize,
    out: &mut Vec<String>,
) {
    const INDENT_STEP: usize = 2;
    let mut line = " ".repeat(indent_level * INDENT_STEP);
    write_node_line(&mut line, doc, key, options);
    out.push(line);
    match doc.node(key) {
        Some(NodeData::Document) | Some(NodeData::Element { .. }) => {
            for child in doc.children(key) {
                walk_snapshot(doc, *child, options, indent_level + 1, out);
            }
        }
        _ => {}
    }
}

fn format_node_line(doc: &Document, key: NodeKey, options: &SnapshotOptions) -> String {
    let mut line = String::new();
    write_node_line(&mut line, doc, key, options);
    line
}

fn write_node_line(out: &mut String, doc: &Document, key: NodeKey, options: &SnapshotOptions) {
    match doc.node(key) {
        Some(NodeData::Document) => {
            out.push_str("#document");
        }
        Some(NodeData::Element { name, attributes }) => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value {
                    out.push('=');
                    out.push('"');
                    write_escaped(out, value);
                    out.push('"');
                }
            }
            out.push('>');
        }
        Some(NodeData::Text { text }) => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
        Some(NodeData::Comment { text }) => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
        }
        None => out.push_str("#dead"),
    }
    if options.include_keys {
        out.push_str(" key=");
        let _ = write!(out, "{}", key.0);
    }
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
}

/// Serializes a subtree as HTML-flavored markup. Assertions in tests match
/// on substrings of this; it is not an escaping-correct HTML writer.
pub fn fragment_html(doc: &Document, key: NodeKey) -> String {
    let mut out = String::new();
    write_fragment(&mut out, doc, key);
    out
}

fn write_fragment(out: &mut String, doc: &Document, key: NodeKey) {
    match doc.node(key) {
        Some(NodeData::Document) => {
            for child in doc.children(key) {
                write_fragment(out, doc, *child);
            }
        }
        Some(NodeData::Element { name, attributes }) => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attributes {
                out.push(' ');
                out.push_str(attr);
                if let Some(value) = value
                    && !value.is_empty()
                {
                    out.push_str("=\"");
                    out.push_str(value);
                    out.push('"');
                }
            }
            out.push('>');
            for child in doc.children(key) {
                write_fragment(out, doc, *child);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Some(NodeData::Text { text }) => out.push_str(text),
        Some(NodeData::Comment { text }) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        None => {}
    }
}
