//! Structural change intake.
//!
//! Consumes the document's mutation journal and extracts newly attached
//! elements worth watching. The journal also reports this crate's own edits
//! (emphasis spans, revert swaps), so the extraction must recognize and
//! ignore them: generated spans carry the marker attribute and swapped
//! containers resolve to already processed subtrees.

use crate::classify;
use dom::{Document, MutationRecord, NodeKey};
use std::collections::HashSet;

/// Tags whose subtrees belong to an embedded foreign document.
const FOREIGN_FRAME_TAGS: &[&str] = &["iframe", "frame", "object", "embed"];

fn in_foreign_frame(doc: &Document, key: NodeKey) -> bool {
    let mut current = Some(key);
    while let Some(k) = current {
        if let Some(name) = doc.name(k)
            && FOREIGN_FRAME_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
        {
            return true;
        }
        current = doc.parent(k);
    }
    false
}

#[derive(Debug, Default)]
pub struct ChangeWatcher;

impl ChangeWatcher {
    pub fn new() -> Self {
        Self
    }

    /// Filters a journal batch down to eligible elements introduced by node
    /// additions. Text and attribute edits never produce new targets.
    /// Results are deduplicated and ordered by first appearance.
    pub fn eligible_additions(
        &self,
        doc: &Document,
        records: &[MutationRecord],
        processed: &HashSet<NodeKey>,
    ) -> Vec<NodeKey> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for record in records {
            let MutationRecord::ChildAdded { child, .. } = record else {
                continue;
            };
            let child = *child;
            // Added then removed within the same batch, or re-parented.
            if !doc.contains(child) || !doc.is_connected(child) {
                continue;
            }
            if in_foreign_frame(doc, child) {
                continue;
            }
            if !doc.has_text_content(child) {
                continue;
            }
            let mut found = Vec::new();
            classify::collect_eligible(doc, child, processed, &mut found);
            for key in found {
                if seen.insert(key) {
                    out.push(key);
                }
            }
        }
        out
    }
}
