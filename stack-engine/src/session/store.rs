//! The in-memory session store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::plan::RebaseState;
use crate::stack::RebaseIntent;

/// A persisted rebase session: the plan it was built from (if any — a
/// session recovered from on-disk Git state has no original intent) plus
/// its current state machine.
#[derive(Clone, Debug)]
pub struct StoredSession {
    /// The intent this session's plan was built from. `None` for a
    /// session recovered from on-disk Git rebase state after a process
    /// restart, since no future descendants can be enqueued for it.
    pub intent: Option<RebaseIntent>,
    /// The current state machine.
    pub state: RebaseState,
    /// The branch checked out before this session began, restored on
    /// completion or abort.
    pub original_branch: Option<String>,
    /// When this session was created, in milliseconds since the Unix
    /// epoch.
    pub created_at_ms: i64,
    /// When this session was last updated, in milliseconds since the Unix
    /// epoch.
    pub updated_at_ms: i64,
}

/// A single-process, single-slot-per-repository store of rebase sessions.
///
/// At most one [`StoredSession`] exists per repo path (invariant I6). The
/// Rebase Executor is the only writer during normal execution;
/// `update_session_with_retry` provides optimistic-concurrency semantics
/// for callers that read-modify-write.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<PathBuf, StoredSession>>,
}

impl SessionStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session for `repo_path`. Fails with
    /// `SessionAlreadyExists` if one is already stored.
    #[instrument(skip(self, intent, state))]
    pub fn create_session(
        &self,
        repo_path: &Path,
        intent: Option<RebaseIntent>,
        state: RebaseState,
        original_branch: Option<String>,
        now_ms: i64,
    ) -> EngineResult<()> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        if sessions.contains_key(repo_path) {
            return Err(EngineError::SessionAlreadyExists {
                path: repo_path.to_path_buf(),
            });
        }
        sessions.insert(
            repo_path.to_path_buf(),
            StoredSession {
                intent,
                state,
                original_branch,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
        );
        Ok(())
    }

    /// Look up the session stored for `repo_path`, if any.
    pub fn get_session(&self, repo_path: &Path) -> Option<StoredSession> {
        self.sessions
            .lock()
            .expect("session store mutex poisoned")
            .get(repo_path)
            .cloned()
    }

    /// Read the current session for `repo_path`, apply `mutator`, and
    /// write the result back. Retries up to `retry_limit` times if the
    /// session disappears or is replaced concurrently between read and
    /// write (detected by comparing `updated_at_ms`). Fails with
    /// `SessionNotFound` if no session exists when retries are exhausted.
    #[instrument(skip(self, mutator))]
    pub fn update_session_with_retry(
        &self,
        repo_path: &Path,
        mut mutator: impl FnMut(StoredSession) -> StoredSession,
        retry_limit: u32,
        now_ms: i64,
    ) -> EngineResult<StoredSession> {
        let mut attempts = 0;
        loop {
            let current = self
                .get_session(repo_path)
                .ok_or_else(|| EngineError::SessionNotFound {
                    path: repo_path.to_path_buf(),
                })?;
            let observed_updated_at = current.updated_at_ms;
            let mut updated = mutator(current);
            updated.updated_at_ms = now_ms;

            let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
            match sessions.get(repo_path) {
                Some(existing) if existing.updated_at_ms == observed_updated_at => {
                    sessions.insert(repo_path.to_path_buf(), updated.clone());
                    return Ok(updated);
                }
                Some(_) => {
                    drop(sessions);
                    attempts += 1;
                    if attempts > retry_limit {
                        warn!(?repo_path, "update_session_with_retry exhausted retries");
                        return Err(EngineError::SessionDisappeared {
                            path: repo_path.to_path_buf(),
                        });
                    }
                }
                None => {
                    drop(sessions);
                    return Err(EngineError::SessionNotFound {
                        path: repo_path.to_path_buf(),
                    });
                }
            }
        }
    }

    /// Remove the session stored for `repo_path`, if any. Idempotent.
    pub fn clear_session(&self, repo_path: &Path) {
        self.sessions.lock().expect("session store mutex poisoned").remove(repo_path);
    }

    /// Snapshot every currently stored session.
    pub fn all_sessions(&self) -> HashMap<PathBuf, StoredSession> {
        self.sessions.lock().expect("session store mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{JobQueue, SessionInfo, SessionStatus};
    use crate::oid::CommitRef;
    use std::collections::HashMap as StdHashMap;

    fn empty_state() -> RebaseState {
        RebaseState {
            session: SessionInfo {
                id: "s".to_string(),
                started_at_ms: 0,
                status: SessionStatus::Running,
                initial_trunk_sha: CommitRef::new("a".repeat(40)).unwrap(),
                commit_map: Vec::new(),
            },
            jobs_by_id: StdHashMap::new(),
            queue: JobQueue::default(),
        }
    }

    #[test]
    fn test_create_session_then_duplicate_fails() {
        let store = SessionStore::new();
        let path = PathBuf::from("/tmp/repo");
        store.create_session(&path, None, empty_state(), None, 0).unwrap();
        let result = store.create_session(&path, None, empty_state(), None, 1);
        assert!(matches!(result, Err(EngineError::SessionAlreadyExists { .. })));
    }

    #[test]
    fn test_update_session_with_retry_applies_mutator() {
        let store = SessionStore::new();
        let path = PathBuf::from("/tmp/repo");
        store.create_session(&path, None, empty_state(), None, 0).unwrap();

        let updated = store
            .update_session_with_retry(
                &path,
                |mut session| {
                    session.state.session.status = SessionStatus::Completed;
                    session
                },
                3,
                10,
            )
            .unwrap();
        assert_eq!(updated.state.session.status, SessionStatus::Completed);
        assert_eq!(updated.updated_at_ms, 10);
    }

    #[test]
    fn test_update_session_with_retry_missing_session() {
        let store = SessionStore::new();
        let path = PathBuf::from("/tmp/repo");
        let result = store.update_session_with_retry(&path, |s| s, 3, 0);
        assert!(matches!(result, Err(EngineError::SessionNotFound { .. })));
    }

    #[test]
    fn test_clear_session_is_idempotent() {
        let store = SessionStore::new();
        let path = PathBuf::from("/tmp/repo");
        store.clear_session(&path);
        store.create_session(&path, None, empty_state(), None, 0).unwrap();
        store.clear_session(&path);
        store.clear_session(&path);
        assert!(store.get_session(&path).is_none());
    }
}
