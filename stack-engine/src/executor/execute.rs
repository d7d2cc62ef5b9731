//! The rebase executor: drives a [`RebasePlan`] against a real working
//! tree via [`GitBackend`].

use std::path::PathBuf;

use tracing::{instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::git::GitBackend;
use crate::config::EngineConfig;
use crate::oid::CommitRef;
use crate::plan::{
    complete_job, enqueue_descendants, fail_job, find_node, next_job, record_conflict,
    CommitRewrite, RebaseJob, RebasePlan, SessionStatus,
};
use crate::session::{recover_from_git_state, SessionStore, StoredSession};

/// The outcome of driving a plan, or one step of it, to its next pause
/// point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every job in the session completed.
    Completed {
        /// Every commit rewrite recorded across the whole session.
        commit_map: Vec<CommitRewrite>,
    },
    /// A job paused on a merge conflict; the session remains stored,
    /// `awaiting-user`.
    Conflict {
        /// The branch currently blocked.
        branch: String,
        /// The conflicted paths.
        conflicts: Vec<PathBuf>,
    },
    /// A job failed on an unexpected `GitError`. The session remains
    /// stored so the caller can `abort_rebase`.
    Error {
        /// A human-readable description of the failure.
        message: String,
    },
}

/// Options controlling a single executor call. `now_ms` stands in for a
/// host-supplied clock, since the pure state machine takes timestamps
/// explicitly rather than reading them itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecuteOptions {
    /// The timestamp to stamp onto every transition performed by this
    /// call.
    pub now_ms: i64,
}

fn commits_between(
    git: &dyn GitBackend,
    dir: &std::path::Path,
    tip: &str,
    exclusive_base: &CommitRef,
) -> Vec<CommitRef> {
    let mut out: Vec<CommitRef> = Vec::new();
    for commit in git.log(dir, tip, None) {
        if &commit.sha == exclusive_base {
            break;
        }
        out.push(commit.sha);
    }
    out.reverse();
    out
}

enum JobRunOutcome {
    Completed {
        new_head_sha: CommitRef,
        rewrites: Vec<CommitRewrite>,
    },
    Conflict {
        conflicts: Vec<PathBuf>,
    },
    Failed {
        message: String,
    },
}

fn execute_job(repo_path: &std::path::Path, job: &RebaseJob, git: &dyn GitBackend) -> JobRunOutcome {
    let pre_rebase = commits_between(git, repo_path, job.original_head_sha.as_str(), &job.original_base_sha);

    if let Err(err) = git.checkout(repo_path, &job.branch, false, false) {
        return JobRunOutcome::Failed {
            message: EngineError::CheckoutFailed {
                reference: job.branch.clone(),
                source: err,
            }
            .to_string(),
        };
    }

    let result = match git.rebase(repo_path, &job.target_base_sha, &job.original_base_sha, &job.branch) {
        Ok(result) => result,
        Err(err) => {
            return JobRunOutcome::Failed {
                message: EngineError::RebaseFailed {
                    branch: job.branch.clone(),
                    onto: job.target_base_sha.clone(),
                    source: err,
                }
                .to_string(),
            }
        }
    };

    if !result.success {
        return JobRunOutcome::Conflict {
            conflicts: result.conflicts,
        };
    }

    let Some(new_head_sha) = git.resolve_ref(repo_path, &job.branch) else {
        return JobRunOutcome::Failed {
            message: EngineError::RefResolutionFailed {
                reference: job.branch.clone(),
            }
            .to_string(),
        };
    };

    let post_rebase = commits_between(git, repo_path, new_head_sha.as_str(), &job.target_base_sha);
    let rewrites = pre_rebase
        .iter()
        .zip(post_rebase.iter())
        .map(|(old_sha, new_sha)| CommitRewrite {
            branch: job.branch.clone(),
            old_sha: old_sha.clone(),
            new_sha: new_sha.clone(),
        })
        .collect();

    JobRunOutcome::Completed {
        new_head_sha,
        rewrites,
    }
}

fn apply_job_outcome(
    repo_path: &std::path::Path,
    store: &SessionStore,
    config: &EngineConfig,
    job: RebaseJob,
    outcome: JobRunOutcome,
    now_ms: i64,
) -> EngineResult<ExecutionOutcome> {
    match outcome {
        JobRunOutcome::Completed { new_head_sha, rewrites } => {
            let rewrites_for_update = rewrites.clone();
            let job_for_update = job.clone();
            let new_head_for_update = new_head_sha.clone();
            store.update_session_with_retry(
                repo_path,
                move |session| {
                    let (completed, _, mut state) = complete_job(
                        &session.state,
                        &job_for_update,
                        new_head_for_update.clone(),
                        rewrites_for_update.clone(),
                        now_ms,
                    );
                    if let Some(intent) = &session.intent {
                        if let Some(node) = find_node(intent, &completed.branch) {
                            let mut counter = 0u32;
                            let job_id = completed.id.clone();
                            state = enqueue_descendants(&state, node, new_head_for_update.clone(), now_ms, &mut || {
                                counter += 1;
                                format!("{job_id}-child-{counter}")
                            });
                        }
                    }
                    StoredSession { state, ..session }
                },
                config.update_retry_limit,
                now_ms,
            )?;
            Ok(ExecutionOutcome::Completed { commit_map: rewrites })
        }
        JobRunOutcome::Conflict { conflicts } => {
            let job_for_update = job.clone();
            let conflicts_for_update = conflicts.clone();
            store.update_session_with_retry(
                repo_path,
                move |session| {
                    let (_, state) = record_conflict(&session.state, &job_for_update, conflicts_for_update.clone(), now_ms);
                    StoredSession { state, ..session }
                },
                config.update_retry_limit,
                now_ms,
            )?;
            Ok(ExecutionOutcome::Conflict {
                branch: job.branch,
                conflicts,
            })
        }
        JobRunOutcome::Failed { message } => {
            let job_for_update = job.clone();
            store.update_session_with_retry(
                repo_path,
                move |session| {
                    let (_, state) = fail_job(&session.state, &job_for_update, now_ms);
                    StoredSession { state, ..session }
                },
                config.update_retry_limit,
                now_ms,
            )?;
            warn!(branch = %job.branch, %message, "rebase job failed");
            Ok(ExecutionOutcome::Error { message })
        }
    }
}

/// Drive every pending and newly-enqueued job in the current session to
/// completion, a conflict pause, or a failure.
#[instrument(skip(git, store, config))]
pub fn execute_jobs(
    repo_path: &std::path::Path,
    git: &dyn GitBackend,
    store: &SessionStore,
    config: &EngineConfig,
    options: ExecuteOptions,
) -> EngineResult<ExecutionOutcome> {
    loop {
        let session = store
            .get_session(repo_path)
            .ok_or_else(|| EngineError::SessionNotFound {
                path: repo_path.to_path_buf(),
            })?;

        let Some((job, popped_state)) = next_job(&session.state, options.now_ms) else {
            return match session.state.session.status {
                SessionStatus::Completed => {
                    let commit_map = session.state.session.commit_map.clone();
                    finalize(repo_path, git, store, &session);
                    Ok(ExecutionOutcome::Completed { commit_map })
                }
                SessionStatus::AwaitingUser => {
                    let awaiting = session
                        .state
                        .jobs_by_id
                        .values()
                        .find(|j| matches!(j.status, crate::plan::JobStatus::AwaitingUser));
                    match awaiting {
                        Some(job) => Ok(ExecutionOutcome::Conflict {
                            branch: job.branch.clone(),
                            conflicts: job.conflicts.clone(),
                        }),
                        None => Ok(ExecutionOutcome::Completed {
                            commit_map: session.state.session.commit_map.clone(),
                        }),
                    }
                }
                SessionStatus::Failed => Ok(ExecutionOutcome::Error {
                    message: "rebase session previously failed".to_string(),
                }),
                SessionStatus::Running => Ok(ExecutionOutcome::Completed {
                    commit_map: session.state.session.commit_map.clone(),
                }),
            };
        };

        store.update_session_with_retry(
            repo_path,
            move |session| StoredSession {
                state: popped_state.clone(),
                ..session
            },
            config.update_retry_limit,
            options.now_ms,
        )?;

        let outcome = execute_job(repo_path, &job, git);
        match apply_job_outcome(repo_path, store, config, job, outcome, options.now_ms)? {
            ExecutionOutcome::Completed { .. } => continue,
            other => return Ok(other),
        }
    }
}

fn finalize(repo_path: &std::path::Path, git: &dyn GitBackend, store: &SessionStore, session: &StoredSession) {
    if let Some(branch) = &session.original_branch {
        if let Err(err) = git.checkout(repo_path, branch, false, false) {
            warn!(%branch, %err, "failed to restore original branch after rebase completion");
        }
    }
    store.clear_session(repo_path);
}

/// Validate preconditions, create a session for `plan`, and drive it.
/// Fails with `DirtyWorkingTree` if the working tree is not clean,
/// `UnsupportedBackend` if `git` lacks rebase capability, or
/// `SessionAlreadyExists` if a session is already stored for this path.
#[instrument(skip(git, store, config, plan))]
pub fn execute_rebase_plan(
    repo_path: &std::path::Path,
    plan: RebasePlan,
    git: &dyn GitBackend,
    store: &SessionStore,
    config: &EngineConfig,
    options: ExecuteOptions,
) -> EngineResult<ExecutionOutcome> {
    let status = git.working_tree_status(repo_path);
    if status.is_dirty() {
        return Err(EngineError::DirtyWorkingTree {
            path: repo_path.to_path_buf(),
        });
    }
    if !git.supports_rebase(repo_path) {
        return Err(EngineError::UnsupportedBackend);
    }

    let original_branch = git.current_branch(repo_path);
    store.create_session(
        repo_path,
        Some(plan.intent),
        plan.state,
        original_branch,
        options.now_ms,
    )?;

    execute_jobs(repo_path, git, store, config, options)
}

/// Resume a session paused `awaiting-user` after conflicts have been
/// resolved and staged. If no session is stored (e.g. this process never
/// called `get_repo` after a restart), recovers one from Git's own
/// on-disk rebase state before proceeding.
#[instrument(skip(git, store, config))]
pub fn continue_rebase(
    repo_path: &std::path::Path,
    git: &dyn GitBackend,
    store: &SessionStore,
    config: &EngineConfig,
    options: ExecuteOptions,
) -> EngineResult<ExecutionOutcome> {
    let session = match store.get_session(repo_path) {
        Some(session) => session,
        None => {
            let recovered =
                recover_from_git_state(repo_path, git, options.now_ms).ok_or_else(|| EngineError::NoActiveIntent {
                    path: repo_path.to_path_buf(),
                })?;
            store.create_session(
                repo_path,
                recovered.intent.clone(),
                recovered.state.clone(),
                recovered.original_branch.clone(),
                recovered.created_at_ms,
            )?;
            recovered
        }
    };
    let job = session
        .state
        .jobs_by_id
        .values()
        .find(|j| matches!(j.status, crate::plan::JobStatus::AwaitingUser))
        .cloned()
        .ok_or_else(|| EngineError::NoActiveIntent {
            path: repo_path.to_path_buf(),
        })?;

    let result = git
        .rebase_continue(repo_path)
        .map_err(|source| EngineError::RebaseFailed {
            branch: job.branch.clone(),
            onto: job.target_base_sha.clone(),
            source,
        })?;

    let outcome = if result.success {
        let Some(new_head_sha) = result.current_commit.or_else(|| git.resolve_ref(repo_path, &job.branch)) else {
            return Err(EngineError::RefResolutionFailed {
                reference: job.branch.clone(),
            });
        };
        let post_rebase = commits_between(git, repo_path, new_head_sha.as_str(), &job.target_base_sha);
        let rewrites = post_rebase
            .into_iter()
            .map(|new_sha| CommitRewrite {
                branch: job.branch.clone(),
                old_sha: job.original_head_sha.clone(),
                new_sha,
            })
            .collect();
        JobRunOutcome::Completed { new_head_sha, rewrites }
    } else {
        JobRunOutcome::Conflict {
            conflicts: result.conflicts,
        }
    };

    match apply_job_outcome(repo_path, store, config, job, outcome, options.now_ms)? {
        ExecutionOutcome::Completed { .. } => execute_jobs(repo_path, git, store, config, options),
        other => Ok(other),
    }
}

/// Abort the in-progress rebase and clear the session, restoring the
/// branch that was checked out before execution started. The session is
/// always cleared, even if there is nothing for Git to abort (a session
/// can fail before any `git rebase` call ever runs, e.g. on a failed
/// checkout) or if restoring the original branch fails.
#[instrument(skip(git, store))]
pub fn abort_rebase(repo_path: &std::path::Path, git: &dyn GitBackend, store: &SessionStore) -> EngineResult<()> {
    let session = store
        .get_session(repo_path)
        .ok_or_else(|| EngineError::NoActiveIntent {
            path: repo_path.to_path_buf(),
        })?;

    if git.working_tree_status(repo_path).is_rebasing {
        if let Err(err) = git.rebase_abort(repo_path) {
            warn!(%err, "rebase_abort failed; clearing session anyway");
        }
    }
    if let Some(branch) = &session.original_branch {
        if let Err(err) = git.checkout(repo_path, branch, false, false) {
            warn!(%branch, %err, "failed to restore original branch during abort");
        }
    }
    store.clear_session(repo_path);
    Ok(())
}

/// Skip the commit currently blocking an `awaiting-user` session.
#[instrument(skip(git, store, config))]
pub fn skip_rebase_commit(
    repo_path: &std::path::Path,
    git: &dyn GitBackend,
    store: &SessionStore,
    config: &EngineConfig,
    options: ExecuteOptions,
) -> EngineResult<ExecutionOutcome> {
    let session = store
        .get_session(repo_path)
        .ok_or_else(|| EngineError::NoActiveIntent {
            path: repo_path.to_path_buf(),
        })?;
    let job = session
        .state
        .jobs_by_id
        .values()
        .find(|j| matches!(j.status, crate::plan::JobStatus::AwaitingUser))
        .cloned()
        .ok_or_else(|| EngineError::NoActiveIntent {
            path: repo_path.to_path_buf(),
        })?;

    let result = git
        .rebase_skip(repo_path)
        .map_err(|source| EngineError::RebaseFailed {
            branch: job.branch.clone(),
            onto: job.target_base_sha.clone(),
            source,
        })?;

    let outcome = if result.success {
        let Some(new_head_sha) = result.current_commit.or_else(|| git.resolve_ref(repo_path, &job.branch)) else {
            return Err(EngineError::RefResolutionFailed {
                reference: job.branch.clone(),
            });
        };
        let post_rebase = commits_between(git, repo_path, new_head_sha.as_str(), &job.target_base_sha);
        let rewrites = post_rebase
            .into_iter()
            .map(|new_sha| CommitRewrite {
                branch: job.branch.clone(),
                old_sha: job.original_head_sha.clone(),
                new_sha,
            })
            .collect();
        JobRunOutcome::Completed { new_head_sha, rewrites }
    } else {
        JobRunOutcome::Conflict {
            conflicts: result.conflicts,
        }
    };

    match apply_job_outcome(repo_path, store, config, job, outcome, options.now_ms)? {
        ExecutionOutcome::Completed { .. } => execute_jobs(repo_path, git, store, config, options),
        other => Ok(other),
    }
}
