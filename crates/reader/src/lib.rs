mod classify;
mod diag;
mod revert;
mod schedule;
mod session;
mod tagger;
mod text;
mod transform;
mod watch;

pub use crate::classify::{MARKER_ATTR, collect_eligible, in_excluded_region, is_eligible};
pub use crate::diag::{DiagKind, Diagnostic, DiagnosticSink};
pub use crate::revert::{JobStatus, RevertJob, flat_revert, revert_element};
pub use crate::schedule::{PendingRequest, QUIESCENCE, Scheduler};
pub use crate::session::{Session, SessionConfig};
pub use crate::tagger::{ContainerTag, TagStore, tag_containers};
pub use crate::text::segment::{RunKind, TextRun, segment_runs};
pub use crate::text::word::{Rendered, render};
pub use crate::transform::transform_element;
pub use crate::watch::change::ChangeWatcher;
pub use crate::watch::visibility::{VisibilityWatcher, WatcherConfig};
