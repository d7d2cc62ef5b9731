//! The [`GitBackend`] capability trait.
//!
//! This is the abstract surface the rest of the engine is built against.
//! Inspection methods degrade to empty/`None` on failure rather than
//! raising, so that a shallow clone or an unknown ref never aborts a
//! higher-level operation; mutation methods raise a typed [`GitError`] on
//! unexpected failure. See [`crate::git::cli::CliGitBackend`] for the
//! default implementation, which shells out to the system `git` binary.

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::oid::CommitRef;

/// A Git remote, as reported by `git remote -v`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteInfo {
    /// The remote's short name, e.g. `"origin"`.
    pub name: String,
    /// The remote's URL.
    pub url: String,
}

/// A commit discovered by walking history. Produced by [`GitBackend::log`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// This commit's SHA.
    pub sha: CommitRef,
    /// This commit's sole parent, or `None` for a root commit.
    pub parent_sha: Option<CommitRef>,
    /// Children discovered so far by log traversal across all walked
    /// branches. This is not necessarily exhaustive; it only reflects what
    /// has actually been observed.
    pub children_sha: Vec<CommitRef>,
    /// The first line of the commit message.
    pub message_subject: String,
    /// Commit time, in milliseconds since the Unix epoch.
    pub time_ms: i64,
}

/// The full detail of a single commit, as read directly (not via a log
/// walk). Returned by [`GitBackend::read_commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitDetail {
    /// This commit's SHA.
    pub sha: CommitRef,
    /// The full commit message.
    pub message: String,
    /// Commit time, in milliseconds since the Unix epoch.
    pub time_ms: i64,
    /// This commit's sole parent, or `None` for a root commit.
    pub parent_sha: Option<CommitRef>,
    /// The author, formatted as `"Name <email>"`.
    pub author: String,
    /// The committer, formatted as `"Name <email>"`.
    pub committer: String,
}

/// A snapshot of the working tree, rebuilt on every refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkingTreeStatus {
    /// The currently checked-out branch name, or `None` if detached.
    pub current_branch: Option<String>,
    /// The SHA that `HEAD` currently points to.
    pub current_commit_sha: Option<CommitRef>,
    /// The upstream tracking ref for `current_branch`, if any.
    pub tracking: Option<String>,
    /// Whether `HEAD` is detached.
    pub detached: bool,
    /// Whether the backend detects an in-flight rebase on disk.
    pub is_rebasing: bool,
    /// Paths staged for commit.
    pub staged: Vec<PathBuf>,
    /// Paths modified but not staged.
    pub modified: Vec<PathBuf>,
    /// Paths created but not yet tracked, reported separately from staged
    /// additions.
    pub created: Vec<PathBuf>,
    /// Paths deleted in the working tree.
    pub deleted: Vec<PathBuf>,
    /// Paths renamed in the working tree.
    pub renamed: Vec<PathBuf>,
    /// Untracked paths.
    pub not_added: Vec<PathBuf>,
    /// Paths with unresolved merge conflicts.
    pub conflicted: Vec<PathBuf>,
}

impl WorkingTreeStatus {
    /// All paths touched by any of the above categories, deduplicated and
    /// sorted, used to decide whether the working tree is clean.
    pub fn all_changed_files(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self
            .staged
            .iter()
            .chain(self.modified.iter())
            .chain(self.created.iter())
            .chain(self.deleted.iter())
            .chain(self.renamed.iter())
            .chain(self.not_added.iter())
            .cloned()
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Whether the working tree has any changes at all (staged, modified,
    /// created, deleted, renamed, or untracked). Conflicted paths are
    /// tracked separately and are not considered here, since they only
    /// arise mid-rebase.
    pub fn is_dirty(&self) -> bool {
        !self.staged.is_empty()
            || !self.modified.is_empty()
            || !self.created.is_empty()
            || !self.deleted.is_empty()
            || !self.renamed.is_empty()
            || !self.not_added.is_empty()
    }
}

/// The outcome of a [`GitBackend::rebase`] (or continue/skip) call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseResult {
    /// Whether the rebase step completed without conflicts.
    pub success: bool,
    /// Conflicted paths, populated iff `!success`.
    pub conflicts: Vec<PathBuf>,
    /// The commit now checked out, when known.
    pub current_commit: Option<CommitRef>,
}

/// The state Git itself persists on disk while a rebase is in progress,
/// read from `.git/rebase-merge` or `.git/rebase-apply`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnDiskRebaseState {
    /// The branch being rebased (from `head-name`).
    pub branch: Option<String>,
    /// The commit being rebased onto (from `onto`).
    pub onto: Option<CommitRef>,
    /// The original `HEAD` before the rebase started (from `orig-head`).
    pub original_head: Option<CommitRef>,
    /// The 1-based index of the step currently being applied.
    pub current_step: usize,
    /// The total number of steps in the rebase.
    pub total_steps: usize,
}

/// Abstract capability surface over a Git implementation.
///
/// Inspection methods (`list_branches`, `log`, `resolve_ref`,
/// `current_branch`, `working_tree_status`, `rebase_state`) degrade to
/// empty/`None` rather than raising. Mutation methods
/// (`checkout`, `rebase`, `rebase_continue`, `rebase_abort`,
/// `rebase_skip`, ...) return `Result<_, GitError>` and raise on
/// unexpected failure; a merge conflict is reported as `RebaseResult {
/// success: false, .. }`, not as an `Err`.
pub trait GitBackend {
    /// List local branches, or branches on the named remote.
    fn list_branches(&self, dir: &Path, remote: Option<&str>) -> Vec<String>;

    /// List configured remotes.
    fn list_remotes(&self, dir: &Path) -> Vec<RemoteInfo>;

    /// Walk history starting at `reference`, newest first. Returns an empty
    /// vector rather than failing on a shallow clone or unknown ref.
    fn log(&self, dir: &Path, reference: &str, depth: Option<usize>) -> Vec<Commit>;

    /// Resolve a ref (branch name, tag, or partial SHA) to a full commit SHA.
    fn resolve_ref(&self, dir: &Path, reference: &str) -> Option<CommitRef>;

    /// Read a single-valued Git config key, or `None` if unset.
    fn read_config(&self, dir: &Path, key: &str) -> Option<String>;

    /// The name of the currently checked-out branch, or `None` if detached
    /// or unknown.
    fn current_branch(&self, dir: &Path) -> Option<String>;

    /// Read full detail for a single commit.
    fn read_commit(&self, dir: &Path, sha: &CommitRef) -> Result<CommitDetail, GitError>;

    /// Snapshot the working tree.
    fn working_tree_status(&self, dir: &Path) -> WorkingTreeStatus;

    /// Check out `reference`. `force` discards local changes to tracked
    /// files; `create` creates a new branch at the current `HEAD` first.
    fn checkout(
        &self,
        dir: &Path,
        reference: &str,
        force: bool,
        create: bool,
    ) -> Result<(), GitError>;

    /// Create a branch named `name` at `start_point` (or `HEAD` if `None`).
    fn branch(
        &self,
        dir: &Path,
        name: &str,
        start_point: Option<&str>,
        checkout: bool,
    ) -> Result<(), GitError>;

    /// Delete a local branch.
    fn delete_branch(&self, dir: &Path, name: &str) -> Result<(), GitError>;

    /// Stage a path.
    fn add(&self, dir: &Path, path: &Path) -> Result<(), GitError>;

    /// Reset the index to `reference`, leaving the working tree untouched.
    fn reset_index(&self, dir: &Path, reference: &str) -> Result<(), GitError>;

    /// Create a commit from the current index.
    fn commit(&self, dir: &Path, message: &str) -> Result<CommitRef, GitError>;

    /// Reset `HEAD` (and optionally the working tree) to `reference`.
    fn reset(&self, dir: &Path, reference: &str, hard: bool) -> Result<(), GitError>;

    /// Push a branch to a remote.
    fn push(&self, dir: &Path, remote: &str, branch: &str, force: bool) -> Result<(), GitError>;

    /// Replay the commits in `(from, to]` onto `onto`. The caller must have
    /// already checked out `to`.
    fn rebase(
        &self,
        dir: &Path,
        onto: &CommitRef,
        from: &CommitRef,
        to: &str,
    ) -> Result<RebaseResult, GitError>;

    /// Continue an in-progress rebase after conflicts have been resolved
    /// and staged.
    fn rebase_continue(&self, dir: &Path) -> Result<RebaseResult, GitError>;

    /// Abort an in-progress rebase, restoring the prior `HEAD`.
    fn rebase_abort(&self, dir: &Path) -> Result<(), GitError>;

    /// Skip the commit currently blocking an in-progress rebase.
    fn rebase_skip(&self, dir: &Path) -> Result<RebaseResult, GitError>;

    /// Read the on-disk rebase state, or `None` if no rebase is in
    /// progress.
    fn rebase_state(&self, dir: &Path) -> Option<OnDiskRebaseState>;

    /// Whether this backend supports the rebase/continue/abort/skip
    /// capability set. The executor short-circuits with
    /// [`crate::error::EngineError::UnsupportedBackend`] when this is
    /// `false`.
    fn supports_rebase(&self, dir: &Path) -> bool {
        let _ = dir;
        true
    }
}
