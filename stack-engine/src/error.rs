//! The engine's typed error model.
//!
//! [`EngineError`] is the single public error type returned from every
//! fallible operation in this crate. It has one variant per error kind named
//! in the coordination engine's error-handling design: intent validation,
//! session-store preconditions, and Git mutation failures. Inspection
//! failures at the [`crate::git::GitBackend`] layer never produce an error;
//! they degrade to empty results, so there is deliberately no `UnknownRef`
//! variant here.

use std::path::PathBuf;

use thiserror::Error;

use crate::oid::CommitRef;

/// A failure reported by a [`crate::git::GitBackend`] mutation call.
#[derive(Clone, Debug, Error)]
#[error("git {operation} failed: {message}")]
pub struct GitError {
    /// The backend operation that failed, e.g. `"checkout"` or `"rebase"`.
    pub operation: String,
    /// A human-readable description, usually the process's stderr.
    pub message: String,
}

impl GitError {
    /// Construct a new `GitError`.
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors produced by the coordination engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A `RebaseIntent` failed validation before a plan could be built.
    #[error("invalid rebase intent: {0}")]
    InvalidIntent(String),

    /// The executor was asked to start with a dirty working tree.
    #[error("working tree has uncommitted changes in {path}")]
    DirtyWorkingTree {
        /// The repository path that was dirty.
        path: PathBuf,
    },

    /// `confirm_rebase_intent` (or similar) was called with no stored session.
    #[error("no active rebase intent for {path}")]
    NoActiveIntent {
        /// The repository path with no active intent.
        path: PathBuf,
    },

    /// `execute_rebase_plan` was called while a session already exists.
    #[error("a rebase session already exists for {path}")]
    SessionAlreadyExists {
        /// The repository path with an existing session.
        path: PathBuf,
    },

    /// A session lookup expected a session to exist but found none.
    #[error("no rebase session found for {path}")]
    SessionNotFound {
        /// The repository path with no session.
        path: PathBuf,
    },

    /// The session vanished between reading and writing during job
    /// execution (a foreign clear raced the executor).
    #[error("rebase session for {path} disappeared mid-execution")]
    SessionDisappeared {
        /// The repository path whose session disappeared.
        path: PathBuf,
    },

    /// The configured [`crate::git::GitBackend`] does not support the
    /// rebase/continue/abort/skip capability set required to execute a plan.
    #[error("git backend does not support rebase operations")]
    UnsupportedBackend,

    /// `checkout` failed for a reason other than a dirty working tree.
    #[error("checkout of {reference} failed: {source}")]
    CheckoutFailed {
        /// The ref that failed to check out.
        reference: String,
        /// The underlying backend error.
        #[source]
        source: GitError,
    },

    /// `rebase` (or continue/abort/skip) failed for a reason other than a
    /// merge conflict.
    #[error("rebase of {branch} onto {onto} failed: {source}")]
    RebaseFailed {
        /// The branch being rebased.
        branch: String,
        /// The commit it was being rebased onto.
        onto: CommitRef,
        /// The underlying backend error.
        #[source]
        source: GitError,
    },

    /// A ref that was required to resolve to a commit did not.
    #[error("could not resolve ref {reference} to a commit")]
    RefResolutionFailed {
        /// The unresolvable ref.
        reference: String,
    },

    /// A lower-level backend mutation failure not otherwise categorized.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
