mod document;
mod geometry;
mod mutation;
mod text;

#[cfg(feature = "dom-snapshot")]
pub mod snapshot;

pub use crate::document::{DomError, Document, NodeData, NodeKey};
pub use crate::geometry::Rect;
pub use crate::mutation::MutationRecord;
pub use crate::text::contains_ignore_ascii_case;
