//! Debounced work scheduling.
//!
//! Requests accumulate in two queues, transforms and reverts, behind a
//! single quiescence deadline. Every enqueue pushes the deadline forward,
//! so a burst of changes drains as one batch once the tree settles.

use core_types::Trigger;
use dom::NodeKey;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Settle time before queued work becomes due.
pub const QUIESCENCE: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub trigger: Trigger,
    pub target: NodeKey,
}

#[derive(Debug)]
pub struct Scheduler {
    transforms: VecDeque<PendingRequest>,
    reverts: VecDeque<PendingRequest>,
    deadline: Option<Instant>,
    quiescence: Duration,
}

impl Scheduler {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            transforms: VecDeque::new(),
            reverts: VecDeque::new(),
            deadline: None,
            quiescence,
        }
    }

    pub fn enqueue_transform(&mut self, trigger: Trigger, target: NodeKey, now: Instant) {
        self.transforms.push_back(PendingRequest { trigger, target });
        self.deadline = Some(now + self.quiescence);
    }

    pub fn enqueue_revert(&mut self, trigger: Trigger, target: NodeKey, now: Instant) {
        self.reverts.push_back(PendingRequest { trigger, target });
        self.deadline = Some(now + self.quiescence);
    }

    pub fn is_idle(&self) -> bool {
        self.transforms.is_empty() && self.reverts.is_empty()
    }

    /// Whether the quiescence window has elapsed with work queued.
    pub fn due(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline && !self.is_idle(),
            None => false,
        }
    }

    /// Drains both queues and clears the deadline. Transforms drain before
    /// reverts within a batch.
    pub fn take_batches(&mut self) -> (Vec<PendingRequest>, Vec<PendingRequest>) {
        self.deadline = None;
        log::trace!(
            target: "reader.schedule",
            "drain: {} transforms, {} reverts",
            self.transforms.len(),
            self.reverts.len()
        );
        (
            self.transforms.drain(..).collect(),
            self.reverts.drain(..).collect(),
        )
    }

    pub fn pending_transforms(&self) -> usize {
        self.transforms.len()
    }

    pub fn pending_reverts(&self) -> usize {
        self.reverts.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(QUIESCENCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_scheduler_is_never_due() {
        let scheduler = Scheduler::default();
        assert!(!scheduler.due(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn work_becomes_due_after_quiescence() {
        let mut scheduler = Scheduler::default();
        let t0 = Instant::now();
        scheduler.enqueue_transform(Trigger::Visibility, NodeKey(3), t0);

        assert!(!scheduler.due(t0));
        assert!(!scheduler.due(t0 + Duration::from_millis(249)));
        assert!(scheduler.due(t0 + QUIESCENCE));
    }

    #[test]
    fn each_enqueue_pushes_the_deadline() {
        let mut scheduler = Scheduler::default();
        let t0 = Instant::now();
        scheduler.enqueue_transform(Trigger::Visibility, NodeKey(3), t0);
        scheduler.enqueue_transform(Trigger::TreeChange, NodeKey(4), t0 + Duration::from_millis(150));

        // The first request's deadline has passed, but the burst reset it.
        assert!(!scheduler.due(t0 + Duration::from_millis(250)));
        assert!(scheduler.due(t0 + Duration::from_millis(400)));
        assert_eq!(scheduler.pending_transforms(), 2);

        let (transforms, reverts) = scheduler.take_batches();
        assert_eq!(transforms.len(), 2);
        assert!(reverts.is_empty());
        assert!(scheduler.is_idle());
        assert!(!scheduler.due(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn transforms_and_reverts_drain_separately() {
        let mut scheduler = Scheduler::default();
        let t0 = Instant::now();
        scheduler.enqueue_revert(Trigger::ModeChange, NodeKey(9), t0);
        scheduler.enqueue_transform(Trigger::Visibility, NodeKey(3), t0);
        assert_eq!(scheduler.pending_transforms(), 1);
        assert_eq!(scheduler.pending_reverts(), 1);

        let (transforms, reverts) = scheduler.take_batches();
        assert_eq!(transforms, vec![PendingRequest { trigger: Trigger::Visibility, target: NodeKey(3) }]);
        assert_eq!(reverts, vec![PendingRequest { trigger: Trigger::ModeChange, target: NodeKey(9) }]);
    }
}
