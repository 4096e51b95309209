//! Bounded diagnostics.
//!
//! Recoverable faults are counted per kind and logged once per distinct
//! (kind, message) pair under the `reader.diag` target. Memory and log
//! volume stay bounded under fault storms: the dedup set and the recent
//! ring both have caps, and once the dedup set fills, further messages only
//! count.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

const SEEN_CAP: usize = 256;
const RECENT_CAP: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagKind {
    /// Queued or observed node died before its work ran.
    DetachedNode,
    /// A transformed element has no tagged ancestor to promote.
    MissingContainer,
    /// An active container held no marker spans at revert time.
    EmptyActiveContainer,
    /// A marker span outside every tagged container.
    UntracedMarker,
    /// No element exists at the shallowest container depth.
    ShallowTree,
    /// Settings named an emphasis style this build does not know.
    UnknownStyle,
    /// A subtree swap failed and the original nodes were kept.
    ReplaceFailed,
}

impl DiagKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagKind::DetachedNode => "detached-node",
            DiagKind::MissingContainer => "missing-container",
            DiagKind::EmptyActiveContainer => "empty-active-container",
            DiagKind::UntracedMarker => "untraced-marker",
            DiagKind::ShallowTree => "shallow-tree",
            DiagKind::UnknownStyle => "unknown-style",
            DiagKind::ReplaceFailed => "replace-failed",
        }
    }
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct DiagnosticSink {
    total: u64,
    counts: HashMap<DiagKind, u64>,
    seen: HashSet<(DiagKind, String)>,
    recent: VecDeque<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagKind, message: impl Into<String>) {
        let message = message.into();
        self.total += 1;
        *self.counts.entry(kind).or_insert(0) += 1;

        let dedup_key = (kind, message.clone());
        if self.seen.contains(&dedup_key) || self.seen.len() >= SEEN_CAP {
            return;
        }
        self.seen.insert(dedup_key);
        log::debug!(target: "reader.diag", "{kind}: {message}");
        if self.recent.len() == RECENT_CAP {
            self.recent.pop_front();
        }
        self.recent.push_back(Diagnostic { kind, message });
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self, kind: DiagKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Most recent distinct diagnostics, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Diagnostic> {
        self.recent.iter()
    }
}
