//! The typed commit model.

use crate::oid::CommitRef;

/// A commit known to the repository model, aggregated from one or more
/// branch log walks. Immutable once produced by [`crate::model::build_repo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// This commit's SHA.
    pub sha: CommitRef,
    /// This commit's sole parent, or `None` for a root commit.
    pub parent_sha: Option<CommitRef>,
    /// Children discovered across every branch log walked while building
    /// the model. Not necessarily exhaustive beyond what was walked.
    pub children_sha: Vec<CommitRef>,
    /// The first line of the commit message.
    pub message_subject: String,
    /// Commit time, in milliseconds since the Unix epoch.
    pub time_ms: i64,
}
