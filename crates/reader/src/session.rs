//! Reading session orchestration.
//!
//! One `Session` owns all reader state for one document: the tag store, the
//! processed set, both visibility watchers, the debounce scheduler, and an
//! in-flight bulk revert if any. The host drives it by calling `pump` from
//! its main loop; everything runs cooperatively inside that call and no
//! work happens between pumps.

use crate::classify;
use crate::diag::{DiagKind, DiagnosticSink};
use crate::revert::{self, JobStatus, RevertJob};
use crate::schedule::{QUIESCENCE, Scheduler};
use crate::tagger::{self, ContainerTag, TagStore};
use crate::transform::transform_element;
use crate::watch::change::ChangeWatcher;
use crate::watch::visibility::{VisibilityWatcher, WatcherConfig};
use bus::SourceEvent;
use core_types::{EmphasisStyle, ReadingMode, Settings, Trigger};
use dom::{Document, MutationRecord, NodeKey, Rect};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Tree depths (root children are depth 1) where containers live.
    pub levels: Vec<usize>,
    /// Settle time before queued work drains.
    pub quiescence: Duration,
    pub eager: WatcherConfig,
    pub standing: WatcherConfig,
    pub revert_batch: usize,
    pub revert_sub_batch: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            levels: vec![2, 3],
            quiescence: QUIESCENCE,
            eager: WatcherConfig::eager(),
            standing: WatcherConfig::standing(),
            revert_batch: revert::REVERT_BATCH,
            revert_sub_batch: revert::REVERT_SUB_BATCH,
        }
    }
}

pub struct Session {
    config: SessionConfig,
    mode: ReadingMode,
    viewport: Rect,
    events: Receiver<SourceEvent>,
    tags: TagStore,
    processed: HashSet<NodeKey>,
    change: ChangeWatcher,
    eager: VisibilityWatcher,
    standing: VisibilityWatcher,
    scheduler: Scheduler,
    job: Option<RevertJob>,
    diag: DiagnosticSink,
    sweep_trigger: Option<Trigger>,
    /// Keys found by the change watcher that have not fired a sweep yet.
    /// Used to attribute their eventual transform to the tree change.
    tree_discovered: HashSet<NodeKey>,
}

impl Session {
    pub fn new(settings: &Settings, events: Receiver<SourceEvent>, config: SessionConfig) -> Self {
        let mut diag = DiagnosticSink::new();
        let style_name = settings.style.trim();
        let style = match EmphasisStyle::from_name(style_name) {
            Some(style) => style,
            None => {
                let fallback = EmphasisStyle::default();
                diag.report(
                    DiagKind::UnknownStyle,
                    format!("style {style_name:?} is not recognised, using {}", fallback.name()),
                );
                fallback
            }
        };
        Self {
            scheduler: Scheduler::new(config.quiescence),
            eager: VisibilityWatcher::new(config.eager),
            standing: VisibilityWatcher::new(config.standing),
            config,
            mode: ReadingMode { enabled: settings.enabled, style },
            viewport: Rect::default(),
            events,
            tags: TagStore::new(),
            processed: HashSet::new(),
            change: ChangeWatcher::new(),
            job: None,
            diag,
            sweep_trigger: None,
            tree_discovered: HashSet::new(),
        }
    }

    /// Binds the session to a loaded document. Structural changes made while
    /// building the tree predate the session, so the journal restarts here.
    pub fn init(&mut self, doc: &mut Document) {
        doc.take_mutations();
        if self.mode.enabled {
            self.seed(doc, Trigger::InitialScan);
        }
    }

    /// One cooperative turn: absorb host events and tree changes, sweep the
    /// watchers, then advance at most one unit of due work.
    pub fn pump(&mut self, doc: &mut Document, now: Instant) {
        self.drain_events(doc);
        self.drain_tree_changes(doc);
        self.sweep(doc, now);
        self.advance_work(doc, now);
    }

    pub fn mode(&self) -> ReadingMode {
        self.mode
    }

    pub fn container_tag(&self, key: NodeKey) -> ContainerTag {
        self.tags.get(key)
    }

    pub fn is_processed(&self, key: NodeKey) -> bool {
        self.processed.contains(&key)
    }

    pub fn revert_in_progress(&self) -> bool {
        self.job.is_some()
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diag
    }

    /// Tags containers, observes every currently eligible element, and arms
    /// the next sweep with the given trigger. Safe to repeat: observing is
    /// idempotent and processed elements are skipped.
    fn seed(&mut self, doc: &Document, trigger: Trigger) {
        let added = tagger::tag_containers(doc, &mut self.tags, &self.config.levels);
        if self.tags.shallow() {
            self.diag.report(
                DiagKind::ShallowTree,
                "no containers at the configured depths",
            );
        }
        let mut eligible = Vec::new();
        classify::collect_eligible(doc, doc.root(), &self.processed, &mut eligible);
        let observed = eligible.len();
        for key in eligible {
            self.eager.observe(key);
        }
        self.sweep_trigger = Some(trigger);
        log::debug!(
            target: "reader.session",
            "seeded: {observed} elements observed, {added} containers tagged ({trigger:?})"
        );
    }

    fn drain_events(&mut self, doc: &mut Document) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SourceEvent::ViewportChanged { rect } => self.viewport = rect,
                SourceEvent::ModeChanged { mode } => self.apply_mode(doc, mode),
            }
        }
    }

    /// Mode changes take effect immediately; queued work re-checks the mode
    /// when it drains, so a flip mid-debounce cannot apply stale emphasis.
    fn apply_mode(&mut self, doc: &mut Document, mode: ReadingMode) {
        if mode == self.mode {
            return;
        }
        let was_enabled = self.mode.enabled;
        self.mode = mode;
        log::debug!(
            target: "reader.session",
            "mode: enabled={} style={}",
            mode.enabled,
            mode.style.name()
        );
        if mode.enabled {
            // A revert caught mid-flight stops where it is: already cleaned
            // containers get re-observed below, untouched ones keep their
            // emphasis and stay processed.
            if let Some(job) = self.job.take() {
                job.abort(doc);
            }
            self.seed(doc, Trigger::ModeChange);
        } else if was_enabled {
            self.eager.clear();
            self.standing.clear();
            self.tree_discovered.clear();
            self.sweep_trigger = None;
            self.job = Some(RevertJob::new(
                &self.tags,
                self.config.revert_batch,
                self.config.revert_sub_batch,
            ));
        }
    }

    fn drain_tree_changes(&mut self, doc: &mut Document) {
        let records = doc.take_mutations();
        if records.is_empty() {
            return;
        }
        if records
            .iter()
            .any(|record| matches!(record, MutationRecord::ChildRemoved { .. }))
        {
            self.tags.prune_dead(doc);
            self.processed.retain(|&key| doc.contains(key));
            self.tree_discovered.retain(|&key| doc.contains(key));
        }
        for key in self
            .change
            .eligible_additions(doc, &records, &self.processed)
        {
            self.standing.observe(key);
            self.tree_discovered.insert(key);
        }
    }

    fn sweep(&mut self, doc: &Document, now: Instant) {
        if self.viewport.is_empty() {
            // The host has not reported geometry yet.
            return;
        }
        let base = self.sweep_trigger.take().unwrap_or(Trigger::Visibility);
        let mut hits = self.eager.sweep(doc, self.viewport);
        hits.extend(self.standing.sweep(doc, self.viewport));
        for key in hits {
            let discovered = self.tree_discovered.remove(&key);
            if self.mode.enabled {
                if revert::subtree_has_markers(doc, key) {
                    // Resurrected content that was emphasized before it went
                    // away. Transforming again would double-wrap the tails.
                    self.processed.insert(key);
                    continue;
                }
                if classify::is_eligible(doc, key, &self.processed) {
                    let trigger = if discovered { Trigger::TreeChange } else { base };
                    self.scheduler.enqueue_transform(trigger, key, now);
                }
            } else if revert::subtree_has_markers(doc, key) {
                self.scheduler.enqueue_revert(Trigger::ModeChange, key, now);
            }
        }
    }

    fn advance_work(&mut self, doc: &mut Document, now: Instant) {
        if let Some(job) = self.job.as_mut() {
            let status = job.step(doc, &mut self.tags, &mut self.processed, &mut self.diag);
            if status == JobStatus::Done {
                self.job = None;
                log::debug!(target: "reader.session", "bulk revert finished");
            }
            return;
        }
        if !self.scheduler.due(now) {
            return;
        }
        let (transforms, reverts) = self.scheduler.take_batches();
        for request in transforms {
            if !self.mode.enabled {
                continue;
            }
            let spans = transform_element(
                doc,
                request.target,
                self.mode.style,
                &mut self.tags,
                &mut self.processed,
                &self.config.levels,
                &mut self.diag,
            );
            if spans > 0 {
                log::debug!(
                    target: "reader.session",
                    "emphasized element {} with {spans} spans ({:?})",
                    request.target.0,
                    request.trigger
                );
            }
        }
        let mut reverted = HashSet::new();
        for request in reverts {
            if self.mode.enabled {
                // Re-enabled before the queue drained; the emphasis stays.
                continue;
            }
            if !doc.contains(request.target) {
                continue;
            }
            // Requests from the same container collapse into one revert.
            if let Some(container) =
                tagger::nearest_tagged_container(doc, &self.tags, request.target)
                && !reverted.insert(container)
            {
                continue;
            }
            revert::revert_element(
                doc,
                request.target,
                &mut self.tags,
                &mut self.processed,
                &mut self.diag,
            );
        }
    }
}
