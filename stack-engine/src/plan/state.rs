//! The pure rebase state machine.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::oid::CommitRef;
use crate::plan::job::{CommitRewrite, JobStatus, RebaseJob};
use crate::stack::StackNode;

/// The overall status of a rebase session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// At least one job is pending or running.
    Running,
    /// A job is paused on a conflict.
    AwaitingUser,
    /// Every job completed.
    Completed,
    /// A job failed with an unexpected error.
    Failed,
}

/// Session-level bookkeeping for a rebase in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// A unique identifier for this session.
    pub id: String,
    /// When this session started, in milliseconds since the Unix epoch.
    pub started_at_ms: i64,
    /// This session's overall status.
    pub status: SessionStatus,
    /// Trunk's head sha at plan time, used to detect a trunk move during
    /// execution.
    pub initial_trunk_sha: CommitRef,
    /// Every commit rewrite emitted so far, in completion order.
    pub commit_map: Vec<CommitRewrite>,
}

/// The FIFO job queue plus the currently active job, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobQueue {
    /// Jobs waiting to run, in FIFO order.
    pub pending_job_ids: Vec<String>,
    /// Jobs that cannot run yet (currently unused by the planner, reserved
    /// for future dependency modeling beyond parent/descendant ordering).
    pub blocked_job_ids: Vec<String>,
    /// The job currently running, if any.
    pub active_job_id: Option<String>,
}

/// The full, immutable state of a rebase session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RebaseState {
    /// Session-level bookkeeping.
    pub session: SessionInfo,
    /// Every job in this plan, keyed by id.
    pub jobs_by_id: HashMap<String, RebaseJob>,
    /// The scheduling queue.
    pub queue: JobQueue,
}

impl RebaseState {
    /// Look up a job by id.
    pub fn job(&self, id: &str) -> Option<&RebaseJob> {
        self.jobs_by_id.get(id)
    }
}

/// Pop the first pending job, mark it `Running`, and set
/// `queue.active_job_id`. FIFO tie-break.
pub fn next_job(state: &RebaseState, now_ms: i64) -> Option<(RebaseJob, RebaseState)> {
    let mut state = state.clone();
    if state.queue.pending_job_ids.is_empty() {
        return None;
    }
    let job_id = state.queue.pending_job_ids.remove(0);
    let job = state.jobs_by_id.get_mut(&job_id)?;
    job.status = JobStatus::Running;
    job.created_at_ms = job.created_at_ms.min(now_ms);
    let job_snapshot = job.clone();
    state.queue.active_job_id = Some(job_id);
    Some((job_snapshot, state))
}

/// Transition `job` to `Completed`, attach `rebased_head_sha`, and append
/// `rewrites` to `session.commit_map`.
pub fn complete_job(
    state: &RebaseState,
    job: &RebaseJob,
    rebased_head_sha: CommitRef,
    rewrites: Vec<CommitRewrite>,
    now_ms: i64,
) -> (RebaseJob, Vec<CommitRewrite>, RebaseState) {
    let mut state = state.clone();
    let stored = state
        .jobs_by_id
        .get_mut(&job.id)
        .expect("completed job must exist in state");
    stored.status = JobStatus::Completed;
    stored.rebased_head_sha = Some(rebased_head_sha);
    let updated = stored.clone();

    state.session.commit_map.extend(rewrites.iter().cloned());
    if state.queue.active_job_id.as_deref() == Some(job.id.as_str()) {
        state.queue.active_job_id = None;
    }
    if state.queue.pending_job_ids.is_empty() && state.queue.active_job_id.is_none() {
        state.session.status = SessionStatus::Completed;
    }
    let _ = now_ms;
    (updated, rewrites, state)
}

/// Transition `job` to `AwaitingUser`, storing `conflicted_paths`.
pub fn record_conflict(
    state: &RebaseState,
    job: &RebaseJob,
    conflicted_paths: Vec<PathBuf>,
    now_ms: i64,
) -> (RebaseJob, RebaseState) {
    let mut state = state.clone();
    let stored = state
        .jobs_by_id
        .get_mut(&job.id)
        .expect("conflicted job must exist in state");
    stored.status = JobStatus::AwaitingUser;
    stored.conflicts = conflicted_paths;
    let updated = stored.clone();
    state.session.status = SessionStatus::AwaitingUser;
    let _ = now_ms;
    (updated, state)
}

/// Transition `job` to `Failed` and mark the session `Failed`. Used when a
/// `GitBackend` mutation raises an unexpected `GitError` (not a conflict).
pub fn fail_job(state: &RebaseState, job: &RebaseJob, now_ms: i64) -> (RebaseJob, RebaseState) {
    let mut state = state.clone();
    let stored = state
        .jobs_by_id
        .get_mut(&job.id)
        .expect("failed job must exist in state");
    stored.status = JobStatus::Failed;
    let updated = stored.clone();
    state.session.status = SessionStatus::Failed;
    if state.queue.active_job_id.as_deref() == Some(job.id.as_str()) {
        state.queue.active_job_id = None;
    }
    let _ = now_ms;
    (updated, state)
}

/// Append one pending job per child of `parent`, targeting
/// `parent_new_head_sha` as their new base.
pub fn enqueue_descendants(
    state: &RebaseState,
    parent: &StackNode,
    parent_new_head_sha: CommitRef,
    now_ms: i64,
    generate_job_id: &mut dyn FnMut() -> String,
) -> RebaseState {
    let mut state = state.clone();
    for child in &parent.children {
        let id = generate_job_id();
        let job = RebaseJob {
            id: id.clone(),
            branch: child.branch.clone(),
            original_base_sha: parent.head_sha.clone(),
            original_head_sha: child.head_sha.clone(),
            target_base_sha: parent_new_head_sha.clone(),
            status: JobStatus::Pending,
            created_at_ms: now_ms,
            conflicts: Vec::new(),
            rebased_head_sha: None,
        };
        state.jobs_by_id.insert(id.clone(), job);
        state.queue.pending_job_ids.push(id);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(id: &str) -> RebaseJob {
        RebaseJob {
            id: id.to_string(),
            branch: format!("branch-{id}"),
            original_base_sha: CommitRef::new("a".repeat(40)).unwrap(),
            original_head_sha: CommitRef::new("b".repeat(40)).unwrap(),
            target_base_sha: CommitRef::new("c".repeat(40)).unwrap(),
            status: JobStatus::Pending,
            created_at_ms: 0,
            conflicts: Vec::new(),
            rebased_head_sha: None,
        }
    }

    fn sample_state(job_ids: &[&str]) -> RebaseState {
        let mut jobs_by_id = HashMap::new();
        let mut pending_job_ids = Vec::new();
        for id in job_ids {
            jobs_by_id.insert(id.to_string(), sample_job(id));
            pending_job_ids.push(id.to_string());
        }
        RebaseState {
            session: SessionInfo {
                id: "session-1".to_string(),
                started_at_ms: 0,
                status: SessionStatus::Running,
                initial_trunk_sha: CommitRef::new("d".repeat(40)).unwrap(),
                commit_map: Vec::new(),
            },
            jobs_by_id,
            queue: JobQueue {
                pending_job_ids,
                blocked_job_ids: Vec::new(),
                active_job_id: None,
            },
        }
    }

    #[test]
    fn test_next_job_is_fifo() {
        let state = sample_state(&["a", "b"]);
        let (job, state) = next_job(&state, 100).expect("a job is available");
        assert_eq!(job.id, "a");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(state.queue.active_job_id.as_deref(), Some("a"));
        assert_eq!(state.queue.pending_job_ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_next_job_empty_queue() {
        let state = sample_state(&[]);
        assert!(next_job(&state, 0).is_none());
    }

    #[test]
    fn test_complete_job_marks_session_completed_when_queue_drains() {
        let state = sample_state(&["a"]);
        let (job, state) = next_job(&state, 0).unwrap();
        let new_head = CommitRef::new("e".repeat(40)).unwrap();
        let rewrite = CommitRewrite {
            branch: job.branch.clone(),
            old_sha: job.original_head_sha.clone(),
            new_sha: new_head.clone(),
        };
        let (completed, rewrites, state) = complete_job(&state, &job, new_head.clone(), vec![rewrite], 1);
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.rebased_head_sha, Some(new_head));
        assert_eq!(rewrites.len(), 1);
        assert_eq!(state.session.status, SessionStatus::Completed);
        assert_eq!(state.session.commit_map.len(), 1);
        assert!(state.queue.active_job_id.is_none());
    }

    #[test]
    fn test_record_conflict_pauses_session() {
        let state = sample_state(&["a"]);
        let (job, state) = next_job(&state, 0).unwrap();
        let (updated, state) = record_conflict(&state, &job, vec![PathBuf::from("src/lib.rs")], 5);
        assert_eq!(updated.status, JobStatus::AwaitingUser);
        assert_eq!(updated.conflicts, vec![PathBuf::from("src/lib.rs")]);
        assert_eq!(state.session.status, SessionStatus::AwaitingUser);
    }

    #[test]
    fn test_enqueue_descendants_targets_new_head() {
        let state = sample_state(&[]);
        let child = StackNode {
            branch: "child".to_string(),
            head_sha: CommitRef::new("1".repeat(40)).unwrap(),
            base_sha: CommitRef::new("2".repeat(40)).unwrap(),
            children: Vec::new(),
        };
        let parent = StackNode {
            branch: "parent".to_string(),
            head_sha: CommitRef::new("2".repeat(40)).unwrap(),
            base_sha: CommitRef::new("3".repeat(40)).unwrap(),
            children: vec![child],
        };
        let new_head = CommitRef::new("9".repeat(40)).unwrap();
        let mut counter = 0;
        let mut generate_job_id = || {
            counter += 1;
            format!("job-{counter}")
        };
        let state = enqueue_descendants(&state, &parent, new_head.clone(), 10, &mut generate_job_id);
        assert_eq!(state.queue.pending_job_ids, vec!["job-1".to_string()]);
        let job = state.job("job-1").unwrap();
        assert_eq!(job.branch, "child");
        assert_eq!(job.target_base_sha, new_head);
        assert_eq!(job.original_base_sha, parent.head_sha);
    }
}
