use crate::geometry::Rect;
use crate::mutation::MutationRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque key for stable node identity within a document.
///
/// Keys are allocated by the document and never reused; a key stays valid
/// as an identity after its node is removed, it just stops resolving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

impl NodeKey {
    /// Reserved sentinel for "unassigned/invalid" identity.
    pub const INVALID: NodeKey = NodeKey(0);
}

#[derive(Debug)]
pub enum DomError {
    MissingKey(NodeKey),
    WrongNodeKind(NodeKey),
    InvalidParent(NodeKey),
    InvalidSibling { parent: NodeKey, before: NodeKey },
    CycleDetected { parent: NodeKey, child: NodeKey },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::MissingKey(key) => write!(f, "missing node key {}", key.0),
            DomError::WrongNodeKind(key) => write!(f, "wrong node kind for key {}", key.0),
            DomError::InvalidParent(key) => write!(f, "invalid parent {}", key.0),
            DomError::InvalidSibling { parent, before } => {
                write!(f, "invalid sibling {} under parent {}", before.0, parent.0)
            }
            DomError::CycleDetected { parent, child } => {
                write!(f, "cycle detected attaching {} under {}", child.0, parent.0)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeData {
    Document,
    Element {
        name: Arc<str>,
        attributes: Vec<(Arc<str>, Option<String>)>,
    },
    Text { text: String },
    Comment { text: String },
}

struct NodeRecord {
    data: NodeData,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

impl NodeRecord {
    fn allows_children(&self) -> bool {
        matches!(self.data, NodeData::Document | NodeData::Element { .. })
    }
}

/// Arena-backed mutable document tree.
///
/// Node records live in a flat vec; `live` maps keys to slots. Removal
/// drops keys from `live` but leaves slots behind, so removed keys are
/// recognizably dead rather than dangling. Structural mutations on the
/// connected tree are journaled (see [`MutationRecord`]).
pub struct Document {
    nodes: Vec<NodeRecord>,
    live: HashMap<NodeKey, usize>,
    next: u32,
    root: NodeKey,
    journal: Vec<MutationRecord>,
    rects: HashMap<NodeKey, Rect>,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            live: HashMap::new(),
            next: 1,
            root: NodeKey::INVALID,
            journal: Vec::new(),
            rects: HashMap::new(),
        };
        doc.root = doc.alloc(NodeData::Document);
        doc
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn create_element(&mut self, name: &str) -> NodeKey {
        self.alloc(NodeData::Element {
            name: Arc::from(name),
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        self.alloc(NodeData::Text { text: text.to_owned() })
    }

    pub fn create_comment(&mut self, text: &str) -> NodeKey {
        self.alloc(NodeData::Comment { text: text.to_owned() })
    }

    fn alloc(&mut self, data: NodeData) -> NodeKey {
        let key = NodeKey(self.next);
        self.next += 1;
        let index = self.nodes.len();
        self.nodes.push(NodeRecord {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.live.insert(key, index);
        key
    }

    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        self.check_attachable(parent, child)?;
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        self.nodes[parent_index].children.push(child);
        self.nodes[child_index].parent = Some(parent);
        if self.is_connected(parent) {
            self.journal.push(MutationRecord::ChildAdded { parent, child });
        }
        Ok(())
    }

    pub fn insert_before(
        &mut self,
        parent: NodeKey,
        child: NodeKey,
        before: NodeKey,
    ) -> Result<(), DomError> {
        self.check_attachable(parent, child)?;
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        let before_index = self.index(before)?;
        if self.nodes[before_index].parent != Some(parent) {
            return Err(DomError::InvalidSibling { parent, before });
        }
        let siblings = &mut self.nodes[parent_index].children;
        let pos = siblings
            .iter()
            .position(|k| *k == before)
            .ok_or(DomError::InvalidSibling { parent, before })?;
        siblings.insert(pos, child);
        self.nodes[child_index].parent = Some(parent);
        if self.is_connected(parent) {
            self.journal.push(MutationRecord::ChildAdded { parent, child });
        }
        Ok(())
    }

    fn check_attachable(&self, parent: NodeKey, child: NodeKey) -> Result<(), DomError> {
        if parent == child || self.is_descendant(child, parent) {
            return Err(DomError::CycleDetected { parent, child });
        }
        let parent_index = self.index(parent)?;
        let child_index = self.index(child)?;
        if !self.nodes[parent_index].allows_children() {
            return Err(DomError::InvalidParent(parent));
        }
        if self.nodes[child_index].parent.is_some() {
            return Err(DomError::InvalidParent(child));
        }
        Ok(())
    }

    /// Detaches a node from its parent, keeping the subtree alive.
    pub fn detach(&mut self, key: NodeKey) -> Result<(), DomError> {
        let index = self.index(key)?;
        let Some(parent) = self.nodes[index].parent.take() else {
            return Ok(());
        };
        let was_connected = self.is_connected(parent);
        if let Some(parent_index) = self.live.get(&parent).copied() {
            self.nodes[parent_index].children.retain(|k| *k != key);
        }
        if was_connected {
            self.journal
                .push(MutationRecord::ChildRemoved { parent, child: key });
        }
        Ok(())
    }

    /// Removes a node and its entire subtree. All keys in the subtree die.
    pub fn remove(&mut self, key: NodeKey) -> Result<(), DomError> {
        self.detach(key)?;
        self.kill_subtree(key)
    }

    fn kill_subtree(&mut self, key: NodeKey) -> Result<(), DomError> {
        let index = self.index(key)?;
        let children = std::mem::take(&mut self.nodes[index].children);
        self.live.remove(&key);
        self.rects.remove(&key);
        for child in children {
            if self.live.contains_key(&child) {
                self.kill_subtree(child)?;
            }
        }
        Ok(())
    }

    /// Swaps `new` into `old`'s position under `old`'s parent, then removes
    /// the `old` subtree. `new` must be detached.
    pub fn replace_node(&mut self, old: NodeKey, new: NodeKey) -> Result<(), DomError> {
        let old_index = self.index(old)?;
        let new_index = self.index(new)?;
        let Some(parent) = self.nodes[old_index].parent else {
            return Err(DomError::InvalidParent(old));
        };
        if self.nodes[new_index].parent.is_some() {
            return Err(DomError::InvalidParent(new));
        }
        if old == new || self.is_descendant(new, old) {
            return Err(DomError::CycleDetected { parent: new, child: old });
        }
        let parent_index = self.index(parent)?;
        let pos = self.nodes[parent_index]
            .children
            .iter()
            .position(|k| *k == old)
            .ok_or(DomError::InvalidSibling { parent, before: old })?;
        self.nodes[parent_index].children[pos] = new;
        self.nodes[new_index].parent = Some(parent);
        self.nodes[old_index].parent = None;
        if self.is_connected(parent) {
            self.journal
                .push(MutationRecord::ChildRemoved { parent, child: old });
            self.journal
                .push(MutationRecord::ChildAdded { parent, child: new });
        }
        self.kill_subtree(old)
    }

    pub fn set_text(&mut self, key: NodeKey, text: &str) -> Result<(), DomError> {
        let index = self.index(key)?;
        match &mut self.nodes[index].data {
            NodeData::Text { text: existing } => {
                existing.clear();
                existing.push_str(text);
            }
            _ => return Err(DomError::WrongNodeKind(key)),
        }
        if self.is_connected(key) {
            self.journal.push(MutationRecord::TextChanged { node: key });
        }
        Ok(())
    }

    /// Adds or replaces one attribute, preserving attribute order.
    pub fn set_attribute(
        &mut self,
        key: NodeKey,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), DomError> {
        let index = self.index(key)?;
        let name: Arc<str> = Arc::from(name);
        match &mut self.nodes[index].data {
            NodeData::Element { attributes, .. } => {
                let value = value.map(str::to_owned);
                match attributes.iter_mut().find(|(k, _)| **k == *name) {
                    Some(slot) => slot.1 = value,
                    None => attributes.push((Arc::clone(&name), value)),
                }
            }
            _ => return Err(DomError::WrongNodeKind(key)),
        }
        if self.is_connected(key) {
            self.journal
                .push(MutationRecord::AttributeChanged { node: key, name });
        }
        Ok(())
    }

    fn index(&self, key: NodeKey) -> Result<usize, DomError> {
        match self.live.get(&key) {
            Some(index) => Ok(*index),
            None => {
                debug_assert!(key != NodeKey::INVALID, "invalid node key");
                Err(DomError::MissingKey(key))
            }
        }
    }

    fn record(&self, key: NodeKey) -> Option<&NodeRecord> {
        self.live.get(&key).map(|index| &self.nodes[*index])
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.live.contains_key(&key)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn node(&self, key: NodeKey) -> Option<&NodeData> {
        self.record(key).map(|record| &record.data)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.record(key).and_then(|record| record.parent)
    }

    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.record(key).map_or(&[], |record| &record.children)
    }

    pub fn is_element(&self, key: NodeKey) -> bool {
        matches!(self.node(key), Some(NodeData::Element { .. }))
    }

    /// Element name, ASCII-lowercase by construction convention.
    pub fn name(&self, key: NodeKey) -> Option<&str> {
        match self.node(key)? {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn text(&self, key: NodeKey) -> Option<&str> {
        match self.node(key)? {
            NodeData::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn attr(&self, key: NodeKey, name: &str) -> Option<&str> {
        match self.node(key)? {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .and_then(|(_, v)| v.as_deref()),
            _ => None,
        }
    }

    pub fn has_attr(&self, key: NodeKey, name: &str) -> bool {
        match self.node(key) {
            Some(NodeData::Element { attributes, .. }) => {
                attributes.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
            }
            _ => false,
        }
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, key: NodeKey) -> bool {
        let mut current = key;
        loop {
            if current == self.root {
                return true;
            }
            match self.record(current).and_then(|record| record.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_descendant(&self, ancestor: NodeKey, maybe_descendant: NodeKey) -> bool {
        let Some(record) = self.record(ancestor) else {
            return false;
        };
        let mut stack: Vec<NodeKey> = record.children.clone();
        while let Some(current) = stack.pop() {
            if current == maybe_descendant {
                return true;
            }
            if let Some(record) = self.record(current) {
                stack.extend(record.children.iter().copied());
            }
        }
        false
    }

    /// Concatenates all descendant text into `out`, document order.
    pub fn collect_text(&self, key: NodeKey, out: &mut String) {
        let Some(record) = self.record(key) else {
            return;
        };
        match &record.data {
            NodeData::Text { text } => out.push_str(text),
            NodeData::Document | NodeData::Element { .. } => {
                for child in &record.children {
                    self.collect_text(*child, out);
                }
            }
            NodeData::Comment { .. } => {}
        }
    }

    /// True when the subtree contains any non-whitespace text.
    pub fn has_text_content(&self, key: NodeKey) -> bool {
        let Some(record) = self.record(key) else {
            return false;
        };
        match &record.data {
            NodeData::Text { text } => !text.trim().is_empty(),
            NodeData::Document | NodeData::Element { .. } => record
                .children
                .iter()
                .any(|child| self.has_text_content(*child)),
            NodeData::Comment { .. } => false,
        }
    }

    /// Copies a subtree into fresh detached keys. Layout rects are not
    /// copied; the clone has no geometry until the host reports some.
    pub fn deep_clone(&mut self, key: NodeKey) -> Result<NodeKey, DomError> {
        let index = self.index(key)?;
        let data = self.nodes[index].data.clone();
        let children = self.nodes[index].children.clone();
        let clone = self.alloc(data);
        for child in children {
            let child_clone = self.deep_clone(child)?;
            let clone_index = self.index(clone)?;
            self.nodes[clone_index].children.push(child_clone);
            let child_clone_index = self.index(child_clone)?;
            self.nodes[child_clone_index].parent = Some(clone);
        }
        Ok(clone)
    }

    /// Merges adjacent text children of `parent` and drops empty ones,
    /// like DOM `normalize()` one level deep.
    pub fn normalize_text(&mut self, parent: NodeKey) -> Result<(), DomError> {
        let children = self.children(parent).to_vec();
        let mut last_text: Option<NodeKey> = None;
        for child in children {
            let Some(text) = self.text(child) else {
                last_text = None;
                continue;
            };
            if text.is_empty() {
                self.remove(child)?;
                continue;
            }
            match last_text {
                Some(prev) => {
                    let mut merged = self
                        .text(prev)
                        .map(str::to_owned)
                        .ok_or(DomError::MissingKey(prev))?;
                    merged.push_str(text);
                    self.set_text(prev, &merged)?;
                    self.remove(child)?;
                }
                None => last_text = Some(child),
            }
        }
        Ok(())
    }

    pub fn set_layout_rect(&mut self, key: NodeKey, rect: Rect) {
        if self.contains(key) {
            self.rects.insert(key, rect);
        }
    }

    pub fn layout_rect(&self, key: NodeKey) -> Option<Rect> {
        self.rects.get(&key).copied()
    }

    /// Drains the structural-change journal.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.journal)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
