//! Emphasis transform.
//!
//! Rewrites the text nodes of one eligible element into runs of marker
//! spans and plain text. Replacement is piecewise per text node, so markup
//! nested inside the element keeps its structure. A transformed element is
//! recorded as processed whether or not any word produced a span, and is
//! never transformed again until a revert clears it.

use crate::classify::{self, MARKER_ATTR};
use crate::diag::{DiagKind, DiagnosticSink};
use crate::tagger::{self, ContainerTag, TagStore};
use crate::text::segment::{RunKind, segment_runs};
use crate::text::word;
use core_types::EmphasisStyle;
use dom::{Document, DomError, NodeKey};
use std::collections::HashSet;

/// Element name used for generated emphasis spans.
const SPAN_TAG: &str = "b";

enum Piece {
    Plain(String),
    Emphasis(String),
}

/// Splits one text node's content into replacement pieces. An `Emphasis`
/// piece is always followed by a `Plain` piece holding at least the word's
/// tail, which is what lets a revert merge spans forward into their
/// following text and reproduce the original bytes.
fn build_pieces(text: &str, style: EmphasisStyle) -> (Vec<Piece>, usize) {
    let mut pieces = Vec::new();
    let mut pending = String::new();
    let mut spans = 0;
    for run in segment_runs(text) {
        let slice = run.text(text);
        if run.kind == RunKind::Word {
            let rendered = word::render(slice, style);
            if !rendered.is_unchanged() {
                if !pending.is_empty() {
                    pieces.push(Piece::Plain(std::mem::take(&mut pending)));
                }
                pieces.push(Piece::Emphasis(rendered.head.to_owned()));
                pending.push_str(rendered.tail);
                spans += 1;
                continue;
            }
        }
        pending.push_str(slice);
    }
    if !pending.is_empty() {
        pieces.push(Piece::Plain(pending));
    }
    (pieces, spans)
}

/// Text nodes under `key`, skipping marker spans, excluded subtrees, and
/// subtrees already processed. A processed descendant holds rendered spans
/// plus tail text; descending into it would wrap the tails a second time.
fn collect_text_targets(
    doc: &Document,
    key: NodeKey,
    processed: &HashSet<NodeKey>,
    out: &mut Vec<NodeKey>,
) {
    for &child in doc.children(key) {
        if doc.is_element(child) {
            if processed.contains(&child)
                || doc.has_attr(child, MARKER_ATTR)
                || classify::is_excluded_element(doc, child)
            {
                continue;
            }
            collect_text_targets(doc, child, processed, out);
        } else if doc.text(child).is_some() {
            out.push(child);
        }
    }
}

fn replace_with_pieces(
    doc: &mut Document,
    text_key: NodeKey,
    pieces: Vec<Piece>,
) -> Result<(), DomError> {
    let parent = doc.parent(text_key).ok_or(DomError::MissingKey(text_key))?;
    for piece in pieces {
        let node = match piece {
            Piece::Plain(text) => doc.create_text(&text),
            Piece::Emphasis(head) => {
                let span = doc.create_element(SPAN_TAG);
                doc.set_attribute(span, MARKER_ATTR, Some(""))?;
                let head_text = doc.create_text(&head);
                doc.append_child(span, head_text)?;
                span
            }
        };
        doc.insert_before(parent, node, text_key)?;
    }
    doc.remove(text_key)
}

fn adoptable_ancestor(doc: &Document, target: NodeKey, levels: &[usize]) -> Option<NodeKey> {
    let mut path = Vec::new();
    let mut current = Some(target);
    while let Some(k) = current {
        path.push(k);
        current = doc.parent(k);
    }
    // path[0] is the document root, so path[depth] is the ancestor at that
    // depth.
    path.reverse();
    let mut depths: Vec<usize> = levels.to_vec();
    depths.sort_unstable();
    for &depth in depths.iter().rev() {
        let Some(&key) = path.get(depth) else {
            continue;
        };
        if tagger::is_container_candidate(doc, key) {
            return Some(key);
        }
    }
    None
}

/// Marks the container responsible for `target` as active. Content that
/// arrived after the tagging pass can sit under an untagged branch; in that
/// case the deepest configured ancestor is adopted on the spot.
fn promote_container(
    doc: &Document,
    target: NodeKey,
    tags: &mut TagStore,
    levels: &[usize],
    diag: &mut DiagnosticSink,
) {
    if let Some(container) = tagger::nearest_tagged_container(doc, tags, target) {
        tags.set(container, ContainerTag::Active);
        return;
    }
    if let Some(container) = adoptable_ancestor(doc, target, levels) {
        tags.set(container, ContainerTag::Active);
        return;
    }
    diag.report(
        DiagKind::MissingContainer,
        format!("element {} has no container ancestor", target.0),
    );
}

/// Applies word emphasis to every text node of one element.
///
/// The target is re-validated against the current tree, so stale queue
/// entries fall out silently. Returns the number of spans created. The
/// element lands in `processed` either way; its container is only promoted
/// when at least one span exists.
pub fn transform_element(
    doc: &mut Document,
    target: NodeKey,
    style: EmphasisStyle,
    tags: &mut TagStore,
    processed: &mut HashSet<NodeKey>,
    levels: &[usize],
    diag: &mut DiagnosticSink,
) -> usize {
    if !classify::is_eligible(doc, target, processed) {
        return 0;
    }
    let mut text_keys = Vec::new();
    collect_text_targets(doc, target, processed, &mut text_keys);

    let mut spans_created = 0;
    for text_key in text_keys {
        if !doc.contains(text_key) || !doc.is_connected(text_key) {
            diag.report(
                DiagKind::DetachedNode,
                format!("text node {} vanished before rewrite", text_key.0),
            );
            continue;
        }
        let (pieces, spans) = match doc.text(text_key) {
            Some(source) if !source.trim().is_empty() => build_pieces(source, style),
            _ => continue,
        };
        if spans == 0 {
            continue;
        }
        if let Err(err) = replace_with_pieces(doc, text_key, pieces) {
            diag.report(
                DiagKind::ReplaceFailed,
                format!("text node {}: {}", text_key.0, err),
            );
            continue;
        }
        spans_created += spans;
    }

    processed.insert(target);
    if spans_created > 0 {
        promote_container(doc, target, tags, levels, diag);
    }
    spans_created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::tag_containers;

    fn page(doc: &mut Document) -> (NodeKey, NodeKey) {
        let html = doc.create_element("html");
        doc.append_child(doc.root(), html).unwrap();
        let body = doc.create_element("body");
        doc.append_child(html, body).unwrap();
        let article = doc.create_element("article");
        doc.append_child(body, article).unwrap();
        (body, article)
    }

    fn para(doc: &mut Document, parent: NodeKey, text: &str) -> NodeKey {
        let p = doc.create_element("p");
        let t = doc.create_text(text);
        doc.append_child(p, t).unwrap();
        doc.append_child(parent, p).unwrap();
        p
    }

    fn subtree_text(doc: &Document, key: NodeKey) -> String {
        let mut out = String::new();
        doc.collect_text(key, &mut out);
        out
    }

    #[test]
    fn wraps_word_heads_in_marker_spans() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let p = para(&mut doc, article, "Reading words now");

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        let spans = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert_eq!(spans, 3);

        let children = doc.children(p).to_vec();
        assert_eq!(children.len(), 6);
        assert_eq!(doc.name(children[0]), Some(SPAN_TAG));
        assert!(doc.has_attr(children[0], MARKER_ATTR));
        assert_eq!(subtree_text(&doc, children[0]), "Read");
        assert_eq!(doc.text(children[1]), Some("ing "));
        assert_eq!(subtree_text(&doc, p), "Reading words now");

        assert!(processed.contains(&p));
        assert_eq!(tags.get(article), ContainerTag::Active);
        assert_eq!(diag.total(), 0);
    }

    #[test]
    fn processed_element_is_never_transformed_twice() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let p = para(&mut doc, article, "once only");

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        let before = doc.children(p).to_vec();
        let again = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert_eq!(again, 0);
        assert_eq!(doc.children(p), &before[..]);
        assert_eq!(subtree_text(&doc, p), "once only");
    }

    #[test]
    fn processed_descendants_keep_their_rendering() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let quote = doc.create_element("blockquote");
        doc.append_child(article, quote).unwrap();
        let lead = doc.create_text("Quoted lead text ");
        doc.append_child(quote, lead).unwrap();
        let p = para(&mut doc, quote, "inner paragraph words");

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        let inner = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert!(inner > 0);
        let rendered = doc.children(p).to_vec();

        let outer = transform_element(
            &mut doc,
            quote,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert!(outer > 0);
        assert_eq!(doc.children(p), &rendered[..]);
        assert_eq!(
            subtree_text(&doc, quote),
            "Quoted lead text inner paragraph words"
        );
    }

    #[test]
    fn spanless_element_is_processed_without_promotion() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let p = para(&mut doc, article, "a b 🚀");

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        let spans = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert_eq!(spans, 0);
        assert_eq!(doc.children(p).len(), 1);
        assert!(processed.contains(&p));
        assert_eq!(tags.get(article), ContainerTag::Inactive);
    }

    #[test]
    fn nested_markup_is_rewritten_in_place() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let p = doc.create_element("p");
        let intro = doc.create_text("see ");
        doc.append_child(p, intro).unwrap();
        let em = doc.create_element("em");
        let emphasized = doc.create_text("these");
        doc.append_child(em, emphasized).unwrap();
        doc.append_child(p, em).unwrap();
        doc.append_child(article, p).unwrap();

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        let spans = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert_eq!(spans, 2);
        // The `em` wrapper survives with its own text rewritten inside it.
        let em_children = doc.children(em).to_vec();
        assert_eq!(em_children.len(), 2);
        assert_eq!(doc.name(em_children[0]), Some(SPAN_TAG));
        assert_eq!(subtree_text(&doc, em), "these");
        assert_eq!(subtree_text(&doc, p), "see these");
    }

    #[test]
    fn start_style_takes_the_configured_prefix() {
        let mut doc = Document::new();
        let (_, article) = page(&mut doc);
        let p = para(&mut doc, article, "information");

        let mut tags = TagStore::new();
        tag_containers(&doc, &mut tags, &[2, 3]);
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        transform_element(
            &mut doc,
            p,
            EmphasisStyle::Start,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        let children = doc.children(p).to_vec();
        assert_eq!(subtree_text(&doc, children[0]), "inf");
        assert_eq!(doc.text(children[1]), Some("ormation"));
    }

    #[test]
    fn unreached_branch_adopts_a_container() {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        doc.append_child(doc.root(), html).unwrap();
        let body = doc.create_element("body");
        doc.append_child(html, body).unwrap();
        let section = doc.create_element("section");
        doc.append_child(body, section).unwrap();
        let p = para(&mut doc, section, "late content");

        // No tagging pass has seen this tree.
        let mut tags = TagStore::new();
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert_eq!(tags.get(section), ContainerTag::Active);
        assert_eq!(diag.count(DiagKind::MissingContainer), 0);
    }

    #[test]
    fn rootless_paragraph_reports_missing_container() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = para(&mut doc, root, "floating");

        let mut tags = TagStore::new();
        let mut processed = HashSet::new();
        let mut diag = DiagnosticSink::new();

        let spans = transform_element(
            &mut doc,
            p,
            EmphasisStyle::Half,
            &mut tags,
            &mut processed,
            &[2, 3],
            &mut diag,
        );
        assert!(spans > 0);
        assert!(processed.contains(&p));
        assert_eq!(diag.count(DiagKind::MissingContainer), 1);
    }
}
