//! Viewport proximity tracking.
//!
//! A watcher holds a set of observed nodes and reports the ones whose layout
//! rect overlaps the expanded viewport. Reported nodes leave the observed
//! set, so each node fires at most once per observe call.

use dom::{Document, NodeKey, Rect};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatcherConfig {
    /// Extra margin around the viewport, in layout pixels.
    pub margin_px: f32,
    /// Minimum visible-area fraction before a node fires.
    pub threshold: f32,
}

impl WatcherConfig {
    /// Near-viewport watcher used for the initial population.
    pub fn eager() -> Self {
        Self {
            margin_px: 100.0,
            threshold: 0.01,
        }
    }

    /// Long-range watcher for content that arrives while reading.
    pub fn standing() -> Self {
        Self {
            margin_px: 600.0,
            threshold: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct VisibilityWatcher {
    config: WatcherConfig,
    observed: BTreeSet<NodeKey>,
}

impl VisibilityWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            observed: BTreeSet::new(),
        }
    }

    pub fn observe(&mut self, key: NodeKey) {
        self.observed.insert(key);
    }

    pub fn unobserve(&mut self, key: NodeKey) {
        self.observed.remove(&key);
    }

    pub fn clear(&mut self) {
        self.observed.clear();
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Reports observed nodes intersecting the expanded viewport, in key
    /// order. Hits are dropped from the observed set, dead nodes are pruned,
    /// and nodes without a layout rect stay observed for a later sweep.
    pub fn sweep(&mut self, doc: &Document, viewport: Rect) -> Vec<NodeKey> {
        let expanded = viewport.expand(self.config.margin_px);
        let mut hits = Vec::new();
        let mut dead = Vec::new();
        for &key in &self.observed {
            if !doc.contains(key) || !doc.is_connected(key) {
                dead.push(key);
                continue;
            }
            let Some(rect) = doc.layout_rect(key) else {
                continue;
            };
            if rect.is_empty() {
                continue;
            }
            let ratio = expanded.intersect(&rect).area() / rect.area();
            if ratio > self.config.threshold {
                hits.push(key);
            }
        }
        for key in dead {
            self.observed.remove(&key);
        }
        for &key in &hits {
            self.observed.remove(&key);
        }
        hits
    }
}
