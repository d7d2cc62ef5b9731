//! The typed branch model.

use crate::oid::CommitRef;

/// A branch known to the repository model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    /// The branch's ref name: a local short name (`"feature/x"`) or a
    /// remote-qualified name (`"origin/feature/x"`).
    pub reference: String,
    /// Whether this is the trunk branch chosen by the model builder.
    pub is_trunk: bool,
    /// Whether this branch lives on a remote.
    pub is_remote: bool,
    /// The commit this branch currently points to.
    pub head_sha: CommitRef,
    /// The fork point: the closest ancestor of `head_sha` that is either
    /// pointed to by another branch, or on trunk.
    pub base_sha: CommitRef,
    /// This branch's own commits, ordered head to root (inclusive of
    /// `head_sha`, exclusive of `base_sha`).
    pub owned_commit_shas: Vec<CommitRef>,
}
