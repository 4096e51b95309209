//! Revert machinery.
//!
//! A marker span reverts by merging its text forward into the following
//! text node. The transformer always leaves plain text after each span, so
//! forward merging plus one text normalization restores the original bytes.
//!
//! Whole-container reverts run off the live tree: the container is cloned,
//! the clone is unwrapped and normalized under a step budget, then swapped
//! in as a single structural change. A `RevertJob` carries that work across
//! scheduler pumps so a large page never stalls one pump.

use crate::classify::MARKER_ATTR;
use crate::diag::{DiagKind, DiagnosticSink};
use crate::tagger::{self, ContainerTag, TagStore};
use dom::{Document, DomError, NodeKey};
use std::collections::HashSet;

/// Containers examined per job step.
pub const REVERT_BATCH: usize = 8;
/// Spans unwrapped per job step within one container clone.
pub const REVERT_SUB_BATCH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
}

/// Marker spans under `key`, document order. Does not look inside spans.
fn collect_marker_spans(doc: &Document, key: NodeKey, out: &mut Vec<NodeKey>) {
    for &child in doc.children(key) {
        if !doc.is_element(child) {
            continue;
        }
        if doc.has_attr(child, MARKER_ATTR) {
            out.push(child);
            continue;
        }
        collect_marker_spans(doc, child, out);
    }
}

pub(crate) fn subtree_has_markers(doc: &Document, key: NodeKey) -> bool {
    if doc.is_element(key) && doc.has_attr(key, MARKER_ATTR) {
        return true;
    }
    doc.children(key)
        .iter()
        .any(|&child| subtree_has_markers(doc, child))
}

fn within(doc: &Document, key: NodeKey, root: NodeKey) -> bool {
    let mut current = Some(key);
    while let Some(k) = current {
        if k == root {
            return true;
        }
        current = doc.parent(k);
    }
    false
}

/// Replaces one marker span with its text content, merging into the
/// following text node when there is one. Returns the span's parent so the
/// caller can normalize it afterwards.
fn unwrap_span(doc: &mut Document, span: NodeKey) -> Result<NodeKey, DomError> {
    let parent = doc.parent(span).ok_or(DomError::MissingKey(span))?;
    let mut inner = String::new();
    doc.collect_text(span, &mut inner);

    let children = doc.children(parent);
    let pos = children
        .iter()
        .position(|k| *k == span)
        .ok_or(DomError::InvalidSibling { parent, before: span })?;
    let following = children.get(pos + 1).copied();

    match following.and_then(|key| doc.text(key).map(|tail| (key, tail.to_owned()))) {
        Some((next, tail)) => {
            let merged = format!("{inner}{tail}");
            doc.set_text(next, &merged)?;
            doc.remove(span)?;
        }
        None => {
            let replacement = doc.create_text(&inner);
            doc.insert_before(parent, replacement, span)?;
            doc.remove(span)?;
        }
    }
    Ok(parent)
}

fn normalize_subtree(doc: &mut Document, key: NodeKey) -> Result<(), DomError> {
    doc.normalize_text(key)?;
    for child in doc.children(key).to_vec() {
        if doc.is_element(child) {
            normalize_subtree(doc, child)?;
        }
    }
    Ok(())
}

/// Unwraps every marker span in the document and forgets all processed
/// elements and container tags. The safety net for trees whose container
/// bookkeeping cannot be trusted. Returns the number of spans removed.
pub fn flat_revert(
    doc: &mut Document,
    tags: &mut TagStore,
    processed: &mut HashSet<NodeKey>,
    diag: &mut DiagnosticSink,
) -> usize {
    let mut spans = Vec::new();
    collect_marker_spans(doc, doc.root(), &mut spans);

    let mut parents: Vec<NodeKey> = Vec::new();
    let mut unwrapped = 0;
    for span in spans {
        if !doc.contains(span) {
            continue;
        }
        match unwrap_span(doc, span) {
            Ok(parent) => {
                unwrapped += 1;
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
            Err(err) => {
                diag.report(DiagKind::ReplaceFailed, format!("span {}: {}", span.0, err));
            }
        }
    }
    for parent in parents {
        if doc.contains(parent) {
            let _ = doc.normalize_text(parent);
        }
    }
    tags.clear_all();
    processed.clear();
    unwrapped
}

/// Reverts the container holding one element, in place. Used for isolated
/// revert requests; whole-page disables go through `RevertJob`.
///
/// Elements whose markers cannot be traced to a tagged container trigger
/// the whole-tree fallback instead.
pub fn revert_element(
    doc: &mut Document,
    target: NodeKey,
    tags: &mut TagStore,
    processed: &mut HashSet<NodeKey>,
    diag: &mut DiagnosticSink,
) -> usize {
    if !doc.contains(target) {
        diag.report(
            DiagKind::DetachedNode,
            format!("revert target {} is gone", target.0),
        );
        return 0;
    }
    if !subtree_has_markers(doc, target) {
        return 0;
    }
    let Some(container) = tagger::nearest_tagged_container(doc, tags, target) else {
        diag.report(
            DiagKind::UntracedMarker,
            format!("element {} holds markers outside any container", target.0),
        );
        return flat_revert(doc, tags, processed, diag);
    };

    let mut spans = Vec::new();
    collect_marker_spans(doc, container, &mut spans);
    let mut parents: Vec<NodeKey> = Vec::new();
    let mut unwrapped = 0;
    for span in spans {
        if !doc.contains(span) {
            continue;
        }
        match unwrap_span(doc, span) {
            Ok(parent) => {
                unwrapped += 1;
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
            Err(err) => {
                diag.report(DiagKind::ReplaceFailed, format!("span {}: {}", span.0, err));
            }
        }
    }
    for parent in parents {
        if doc.contains(parent) {
            let _ = doc.normalize_text(parent);
        }
    }
    tags.clear(container);
    processed.retain(|&key| doc.contains(key) && !within(doc, key, container));
    unwrapped
}

#[derive(Debug)]
struct CloneProgress {
    container: NodeKey,
    clone_root: NodeKey,
    spans: Vec<NodeKey>,
    next: usize,
}

/// Incremental whole-page revert over a snapshot of the tagged containers.
#[derive(Debug)]
pub struct RevertJob {
    containers: Vec<NodeKey>,
    cursor: usize,
    current: Option<CloneProgress>,
    batch: usize,
    sub_batch: usize,
}

impl RevertJob {
    pub fn new(tags: &TagStore, batch: usize, sub_batch: usize) -> Self {
        Self {
            containers: tags.tagged_keys(),
            cursor: 0,
            current: None,
            batch: batch.max(1),
            sub_batch: sub_batch.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.containers.len() - self.cursor
    }

    /// Drops the job, removing any half-unwrapped clone from the arena. The
    /// live tree is untouched, so aborting never loses document content.
    pub fn abort(mut self, doc: &mut Document) {
        if let Some(progress) = self.current.take() {
            let _ = doc.remove(progress.clone_root);
        }
    }

    /// Runs one budgeted step. Call repeatedly until `Done`.
    ///
    /// Finishing the last container triggers the whole-tree fallback if any
    /// processed element survived outside the reverted containers, so a
    /// completed job always leaves the tree marker-free and the processed
    /// set empty.
    pub fn step(
        &mut self,
        doc: &mut Document,
        tags: &mut TagStore,
        processed: &mut HashSet<NodeKey>,
        diag: &mut DiagnosticSink,
    ) -> JobStatus {
        if let Some(mut progress) = self.current.take() {
            if advance_clone(doc, &mut progress, self.sub_batch, diag) {
                self.current = Some(progress);
                return JobStatus::Running;
            }
            finish_container(doc, progress, tags, processed, diag);
        }

        let mut handled = 0;
        while handled < self.batch && self.cursor < self.containers.len() {
            let container = self.containers[self.cursor];
            self.cursor += 1;
            handled += 1;

            match tags.get(container) {
                ContainerTag::Untagged => continue,
                ContainerTag::Inactive => {
                    tags.clear(container);
                    continue;
                }
                ContainerTag::Active => {}
            }
            if !doc.contains(container) || !doc.is_connected(container) {
                diag.report(
                    DiagKind::DetachedNode,
                    format!("container {} died before revert", container.0),
                );
                tags.clear(container);
                continue;
            }
            let mut live_spans = Vec::new();
            collect_marker_spans(doc, container, &mut live_spans);
            if live_spans.is_empty() {
                diag.report(
                    DiagKind::EmptyActiveContainer,
                    format!("container {} is active but holds no markers", container.0),
                );
                tags.clear(container);
                continue;
            }

            let clone_root = match doc.deep_clone(container) {
                Ok(key) => key,
                Err(err) => {
                    diag.report(
                        DiagKind::ReplaceFailed,
                        format!("container {}: {}", container.0, err),
                    );
                    tags.clear(container);
                    continue;
                }
            };
            let mut spans = Vec::new();
            collect_marker_spans(doc, clone_root, &mut spans);
            let mut progress = CloneProgress {
                container,
                clone_root,
                spans,
                next: 0,
            };
            if advance_clone(doc, &mut progress, self.sub_batch, diag) {
                self.current = Some(progress);
                return JobStatus::Running;
            }
            finish_container(doc, progress, tags, processed, diag);
        }

        if self.cursor < self.containers.len() || self.current.is_some() {
            return JobStatus::Running;
        }
        if !processed.is_empty() {
            flat_revert(doc, tags, processed, diag);
        }
        JobStatus::Done
    }
}

/// Unwraps up to `budget` spans on the detached clone. True while spans
/// remain.
fn advance_clone(
    doc: &mut Document,
    progress: &mut CloneProgress,
    budget: usize,
    diag: &mut DiagnosticSink,
) -> bool {
    let end = (progress.next + budget).min(progress.spans.len());
    while progress.next < end {
        let span = progress.spans[progress.next];
        progress.next += 1;
        if !doc.contains(span) {
            continue;
        }
        if let Err(err) = unwrap_span(doc, span) {
            diag.report(DiagKind::ReplaceFailed, format!("span {}: {}", span.0, err));
        }
    }
    progress.next < progress.spans.len()
}

fn finish_container(
    doc: &mut Document,
    progress: CloneProgress,
    tags: &mut TagStore,
    processed: &mut HashSet<NodeKey>,
    diag: &mut DiagnosticSink,
) {
    let CloneProgress {
        container,
        clone_root,
        ..
    } = progress;

    if let Err(err) = normalize_subtree(doc, clone_root) {
        diag.report(
            DiagKind::ReplaceFailed,
            format!("clone of container {}: {}", container.0, err),
        );
    }
    if !doc.contains(container) || !doc.is_connected(container) {
        diag.report(
            DiagKind::DetachedNode,
            format!("container {} died mid-revert", container.0),
        );
        let _ = doc.remove(clone_root);
        tags.clear(container);
        return;
    }
    if let Err(err) = doc.replace_node(container, clone_root) {
        diag.report(
            DiagKind::ReplaceFailed,
            format!("container {}: {}", container.0, err),
        );
        let _ = doc.remove(clone_root);
        tags.clear(container);
        return;
    }
    tags.clear(container);
    // The swap killed the old subtree, so its processed keys are now dead.
    processed.retain(|&key| doc.contains(key));
}
