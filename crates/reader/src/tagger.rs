//! Container tagging.
//!
//! Tags live in an out-of-band map keyed by node, never as attributes on the
//! tree. An `Untagged` entry is represented by absence, so the map only grows
//! with containers that were actually tagged.

use crate::classify;
use dom::{Document, NodeKey};
use std::collections::HashMap;

/// Lifecycle state of a candidate container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContainerTag {
    /// Never considered, or released back after a revert.
    #[default]
    Untagged,
    /// Identified as a container, no emphasis applied inside yet.
    Inactive,
    /// At least one transformed element resolves to this container.
    Active,
}

/// Out-of-band tag store plus the shallow-tree flag from the last tagging
/// pass.
#[derive(Debug, Default)]
pub struct TagStore {
    tags: HashMap<NodeKey, ContainerTag>,
    shallow: bool,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: NodeKey) -> ContainerTag {
        self.tags.get(&key).copied().unwrap_or_default()
    }

    pub fn set(&mut self, key: NodeKey, tag: ContainerTag) {
        if tag == ContainerTag::Untagged {
            self.tags.remove(&key);
        } else {
            self.tags.insert(key, tag);
        }
    }

    pub fn clear(&mut self, key: NodeKey) {
        self.tags.remove(&key);
    }

    pub fn is_tagged(&self, key: NodeKey) -> bool {
        self.tags.contains_key(&key)
    }

    /// Tagged containers in stable key order.
    pub fn tagged_keys(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self.tags.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn shallow(&self) -> bool {
        self.shallow
    }

    pub fn mark_shallow(&mut self, shallow: bool) {
        self.shallow = shallow;
    }

    /// Drops entries whose nodes no longer exist in the document.
    pub fn prune_dead(&mut self, doc: &Document) {
        self.tags.retain(|&key, _| doc.contains(key));
    }

    pub fn clear_all(&mut self) {
        self.tags.clear();
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

pub(crate) fn is_container_candidate(doc: &Document, key: NodeKey) -> bool {
    doc.is_element(key)
        && !doc.has_attr(key, classify::MARKER_ATTR)
        && !classify::is_excluded_element(doc, key)
}

fn has_element_at_depth(doc: &Document, root: NodeKey, min_depth: usize) -> bool {
    fn walk(doc: &Document, key: NodeKey, depth: usize, min_depth: usize) -> bool {
        for &child in doc.children(key) {
            if doc.is_element(child) {
                if depth >= min_depth {
                    return true;
                }
                if walk(doc, child, depth + 1, min_depth) {
                    return true;
                }
            }
        }
        false
    }
    walk(doc, root, 1, min_depth)
}

/// Tags candidate elements at the configured depths below the root as
/// `Inactive`. Depth 1 is the set of element children of the root. Existing
/// tags are preserved, so re-running after new content arrives only adds.
///
/// Returns the number of newly tagged containers. When the tree has no
/// element at the shallowest configured depth, nothing is tagged and the
/// store is marked shallow instead.
pub fn tag_containers(doc: &Document, tags: &mut TagStore, levels: &[usize]) -> usize {
    let Some(&min_depth) = levels.iter().min() else {
        return 0;
    };
    let Some(&max_depth) = levels.iter().max() else {
        return 0;
    };
    if !has_element_at_depth(doc, doc.root(), min_depth) {
        tags.mark_shallow(true);
        return 0;
    }
    tags.mark_shallow(false);

    fn walk(
        doc: &Document,
        tags: &mut TagStore,
        levels: &[usize],
        key: NodeKey,
        depth: usize,
        max_depth: usize,
        added: &mut usize,
    ) {
        for &child in doc.children(key) {
            if !is_container_candidate(doc, child) {
                continue;
            }
            if levels.contains(&depth) && !tags.is_tagged(child) {
                tags.set(child, ContainerTag::Inactive);
                *added += 1;
            }
            if depth < max_depth {
                walk(doc, tags, levels, child, depth + 1, max_depth, added);
            }
        }
    }

    let mut added = 0;
    walk(doc, tags, levels, doc.root(), 1, max_depth, &mut added);
    added
}

/// Nearest tagged container at or above the given node.
pub fn nearest_tagged_container(
    doc: &Document,
    tags: &TagStore,
    key: NodeKey,
) -> Option<NodeKey> {
    let mut current = Some(key);
    while let Some(k) = current {
        if tags.is_tagged(k) {
            return Some(k);
        }
        current = doc.parent(k);
    }
    None
}
