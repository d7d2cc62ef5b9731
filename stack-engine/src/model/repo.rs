//! The aggregate repository model.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::git::WorkingTreeStatus;
use crate::model::branch::Branch;
use crate::model::commit::Commit;
use crate::oid::CommitRef;

/// A snapshot of a repository's branch/commit graph plus working-tree
/// status, as built by [`crate::model::build_repo`].
///
/// Passed by value into planners and projectors; exclusively owned by
/// whoever calls the model builder.
#[derive(Clone, Debug)]
pub struct Repo {
    /// The repository's filesystem path.
    pub path: PathBuf,
    /// Every known commit, keyed by SHA.
    pub commits: HashMap<CommitRef, Commit>,
    /// Every known branch, in discovery order.
    pub branches: Vec<Branch>,
    /// A snapshot of the working tree at build time.
    pub working_tree_status: WorkingTreeStatus,
}

impl Repo {
    /// Find a branch by its ref name.
    pub fn branch(&self, reference: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.reference == reference)
    }

    /// The trunk branch, if one was discovered.
    pub fn trunk(&self) -> Option<&Branch> {
        self.branches.iter().find(|b| b.is_trunk)
    }

    /// Every branch (local or remote) whose head currently points at `sha`.
    pub fn branches_at(&self, sha: &CommitRef) -> Vec<&Branch> {
        self.branches.iter().filter(|b| &b.head_sha == sha).collect()
    }
}
