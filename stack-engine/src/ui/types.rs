//! Projection-only view types: never fed back into the model or planner.
//!
//! These are the types a host shell serializes to JSON to hand to its UI
//! layer; every type here derives `Serialize` for that purpose.

use std::path::PathBuf;

use serde::Serialize;

use crate::oid::CommitRef;
use crate::plan::SessionStatus;

/// Where a projected commit sits relative to a pending or in-flight
/// rebase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseStatus {
    /// This commit is the head of a target subtree about to move.
    Prompting,
    /// This commit belongs to a job queued behind the active one.
    Queued,
    /// This commit is a descendant of a prompting or queued commit.
    Idle,
}

/// A display copy of a [`crate::model::Branch`], stripped to what the UI
/// renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UiBranch {
    /// The branch's ref name.
    pub reference: String,
    /// Whether this is the trunk branch.
    pub is_trunk: bool,
    /// Whether this branch lives on a remote.
    pub is_remote: bool,
}

/// A single commit as rendered by the UI, either in the live stack or a
/// projected (previewed) one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UiCommit {
    /// This commit's SHA. Synthetic in a projected stack.
    pub sha: CommitRef,
    /// Commit time, in milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// A display name: the commit message subject.
    pub name: String,
    /// Whether this is the currently checked-out commit.
    pub is_current: bool,
    /// This commit's position relative to a pending or in-flight rebase.
    pub rebase_status: Option<RebaseStatus>,
    /// Every branch pointing at this commit.
    pub branches: Vec<UiBranch>,
    /// Spinoff stacks rooted at this commit.
    pub spinoffs: Vec<UiStack>,
}

/// A stack of commits: the trunk spine, or one spinoff branch's lineage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UiStack {
    /// Whether this is the trunk spine.
    pub is_trunk: bool,
    /// This stack's commits. Oldest-first for trunk, root-to-head for
    /// spinoffs.
    pub commits: Vec<UiCommit>,
}

/// A view of the in-progress rebase session, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RebaseSessionView {
    /// The session's overall status.
    pub status: SessionStatus,
    /// Jobs completed so far.
    pub completed_jobs: usize,
    /// Total jobs known to this session (grows as descendants are
    /// enqueued).
    pub total_jobs: usize,
    /// The branch currently blocked, when `status == AwaitingUser`.
    pub blocked_branch: Option<String>,
    /// Conflicted paths, when `status == AwaitingUser`.
    pub conflicts: Vec<PathBuf>,
}

/// The complete view handed to the host shell: live stack, projected
/// stack (if an intent is pending), working tree, and rebase progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UiStateView {
    /// The live trunk + spinoffs stack.
    pub stack: Option<UiStack>,
    /// The stack as it would look after the pending intent (or
    /// in-progress session) completes, if any.
    pub projected_stack: Option<UiStack>,
    /// A snapshot of the working tree.
    pub working_tree: crate::git::WorkingTreeStatus,
    /// The in-progress rebase session, if any.
    pub rebase: Option<RebaseSessionView>,
}

impl UiStateView {
    /// Render this view as pretty-printed JSON, for a host shell to hand
    /// off to its UI process over IPC.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
