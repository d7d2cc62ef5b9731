//! [`RebaseIntent`]: a user-stated "move this subtree onto that commit".

use crate::stack::node::StackNode;
use crate::oid::CommitRef;

/// One target within a [`RebaseIntent`]: "replay this subtree onto
/// `target_base_sha`."
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseTarget {
    /// The subtree snapshot to move.
    pub node: StackNode,
    /// The commit to rebase the subtree onto.
    pub target_base_sha: CommitRef,
}

/// A user-stated rebase intent: one or more subtrees, each moving onto a
/// new base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseIntent {
    /// A unique identifier for this intent.
    pub id: String,
    /// When this intent was created, in milliseconds since the Unix epoch.
    pub created_at_ms: i64,
    /// The subtrees being moved.
    pub targets: Vec<RebaseTarget>,
}
