//! Structural-change journal.
//!
//! Every mutating `Document` operation that touches the connected tree
//! appends a record here; consumers drain the journal with
//! [`Document::take_mutations`](crate::Document::take_mutations) and react
//! after the fact. Mutations inside detached subtrees (clones under
//! construction) are not journaled.
//!
//! Invariants:
//! - Records appear in the order the mutations happened.
//! - Keys in a record were live at the time of the mutation; a later record
//!   may have removed them since. Consumers must re-check liveness.
//! - The journal reports all writers alike, including consumers' own
//!   mutations. A consumer that rewrites the tree sees its own records on
//!   the next drain and is expected to recognize and skip them.
//! - Draining is destructive; there is exactly one consumer.

use crate::document::NodeKey;
use std::sync::Arc;

/// One structural mutation of the connected tree.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    /// A node (with its subtree) became a child of `parent`.
    ChildAdded { parent: NodeKey, child: NodeKey },
    /// A node (with its subtree) was detached from `parent`.
    ChildRemoved { parent: NodeKey, child: NodeKey },
    /// The character data of a text node changed.
    TextChanged { node: NodeKey },
    /// An attribute on an element changed or was added.
    AttributeChanged { node: NodeKey, name: Arc<str> },
}
