//! Recovering a session from Git's own on-disk rebase state.

use std::collections::HashMap;
use std::path::Path;

use tracing::{instrument, warn};

use crate::git::GitBackend;
use crate::plan::{JobQueue, JobStatus, RebaseJob, RebaseState, SessionInfo, SessionStatus};
use crate::session::store::StoredSession;

/// Synthesize a minimal [`StoredSession`] from Git's on-disk rebase state,
/// sufficient to drive `continue_rebase`/`abort_rebase` after a process
/// restart. Returns `None` if no rebase is in progress, or if the on-disk
/// state is missing fields this needs to reconstruct a valid session.
///
/// The recovered session has no intent: no future descendants can be
/// enqueued for it, since the subtree snapshot that would drive
/// `enqueue_descendants` was never persisted to disk.
#[instrument(skip(git))]
pub fn recover_from_git_state(repo_path: &Path, git: &dyn GitBackend, now_ms: i64) -> Option<StoredSession> {
    let status = git.working_tree_status(repo_path);
    if !status.is_rebasing {
        return None;
    }

    let on_disk = git.rebase_state(repo_path)?;
    let (Some(onto), Some(original_head)) = (on_disk.onto.clone(), on_disk.original_head.clone()) else {
        warn!(?repo_path, "rebase in progress but on-disk state is incomplete, cannot recover");
        return None;
    };
    let branch = on_disk
        .branch
        .or(status.current_branch.clone())
        .unwrap_or_else(|| "HEAD".to_string());

    let job = RebaseJob {
        id: "recovered".to_string(),
        branch: branch.clone(),
        original_base_sha: original_head.clone(),
        original_head_sha: original_head.clone(),
        target_base_sha: onto.clone(),
        status: JobStatus::AwaitingUser,
        created_at_ms: now_ms,
        conflicts: status.conflicted.clone(),
        rebased_head_sha: None,
    };

    let mut jobs_by_id = HashMap::new();
    jobs_by_id.insert(job.id.clone(), job);

    let state = RebaseState {
        session: SessionInfo {
            id: format!("recovered-{now_ms}"),
            started_at_ms: now_ms,
            status: SessionStatus::AwaitingUser,
            initial_trunk_sha: onto,
            commit_map: Vec::new(),
        },
        jobs_by_id,
        queue: JobQueue {
            pending_job_ids: Vec::new(),
            blocked_job_ids: Vec::new(),
            active_job_id: None,
        },
    };

    Some(StoredSession {
        intent: None,
        state,
        original_branch: Some(branch),
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    #[test]
    fn test_recover_returns_none_when_not_rebasing() {
        let repo = TestRepo::new();
        repo.commit("root");
        assert!(recover_from_git_state(repo.path(), repo.backend(), 0).is_none());
    }

    #[test]
    fn test_recover_from_conflicted_rebase() {
        let repo = TestRepo::new();
        repo.commit_file("shared.txt", "base\n", "root");
        let root = repo.head();
        repo.branch_from("feature", &root);
        repo.checkout("feature");
        repo.commit_file("shared.txt", "feature version\n", "f1");
        repo.checkout("master");
        repo.commit_file("shared.txt", "master version\n", "m1");
        let new_trunk_head = repo.head();
        repo.checkout("feature");

        let backend = repo.cli_backend();
        let result = backend
            .rebase(repo.path(), &new_trunk_head, &root, "feature")
            .unwrap();
        assert!(!result.success, "touching the same line on both sides must conflict");

        let recovered = recover_from_git_state(repo.path(), repo.backend(), 42)
            .expect("recovery should succeed when rebase state is complete");
        assert!(recovered.intent.is_none());
        assert_eq!(recovered.state.session.status, SessionStatus::AwaitingUser);
        assert_eq!(recovered.original_branch.as_deref(), Some("feature"));
    }
}
