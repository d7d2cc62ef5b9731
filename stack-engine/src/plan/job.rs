//! [`RebaseJob`] and [`CommitRewrite`].

use std::path::PathBuf;

use crate::oid::CommitRef;

/// The lifecycle state of a single [`RebaseJob`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently being executed.
    Running,
    /// Finished without conflicts.
    Completed,
    /// Paused on a merge conflict; waiting for the user to resolve it.
    AwaitingUser,
    /// Terminated by an unexpected `GitError`.
    Failed,
}

/// One per-branch rebase operation within a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseJob {
    /// A unique identifier for this job.
    pub id: String,
    /// The branch being rebased.
    pub branch: String,
    /// The branch's fork point before this job runs.
    pub original_base_sha: CommitRef,
    /// The branch's head before this job runs.
    pub original_head_sha: CommitRef,
    /// The commit this job rebases the branch onto.
    pub target_base_sha: CommitRef,
    /// This job's current lifecycle state.
    pub status: JobStatus,
    /// When this job was created, in milliseconds since the Unix epoch.
    pub created_at_ms: i64,
    /// Conflicted paths, populated while `status == AwaitingUser`.
    pub conflicts: Vec<PathBuf>,
    /// The branch's new head, populated once `status == Completed`.
    pub rebased_head_sha: Option<CommitRef>,
}

/// One commit SHA rewrite, emitted by the executor for every commit
/// replayed during a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRewrite {
    /// The branch whose commit was rewritten.
    pub branch: String,
    /// The commit's SHA before the rewrite.
    pub old_sha: CommitRef,
    /// The commit's SHA after the rewrite.
    pub new_sha: CommitRef,
}
