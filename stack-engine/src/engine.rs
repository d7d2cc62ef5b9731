//! The [`Engine`] handle: the host-facing request/response surface.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::instrument;

use crate::config::{EngineConfig, EngineConfigOverrides};
use crate::error::{EngineError, EngineResult};
use crate::executor::{self, ExecuteOptions, ExecutionOutcome};
use crate::git::GitBackend;
use crate::model::build_repo;
use crate::oid::CommitRef;
use crate::plan::create_plan;
use crate::session::{recover_from_git_state, SessionStore};
use crate::stack::{build_stack_node, RebaseIntent, RebaseTarget};
use crate::ui::{build_full_ui_state, UiStateView};

fn system_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// The coordination engine, bundling a [`GitBackend`], a [`SessionStore`],
/// and an [`EngineConfig`]. This is the surface a host shell drives.
pub struct Engine {
    git: Box<dyn GitBackend + Send + Sync>,
    store: SessionStore,
    config: EngineConfig,
    id_counter: AtomicU64,
}

impl Engine {
    /// Construct an engine with an already-resolved configuration.
    pub fn new(git: Box<dyn GitBackend + Send + Sync>, config: EngineConfig) -> Self {
        Self {
            git,
            store: SessionStore::new(),
            config,
            id_counter: AtomicU64::new(0),
        }
    }

    /// Construct an engine, resolving configuration for `repo_path` via
    /// [`EngineConfig::resolve`].
    pub fn with_resolved_config(
        git: Box<dyn GitBackend + Send + Sync>,
        repo_path: &Path,
        overrides: EngineConfigOverrides,
    ) -> Self {
        let config = EngineConfig::resolve(git.as_ref(), repo_path, overrides);
        Self::new(git, config)
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.id_counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }

    fn ensure_recovered_session(&self, repo_path: &Path) {
        if self.store.get_session(repo_path).is_some() {
            return;
        }
        if let Some(recovered) = recover_from_git_state(repo_path, self.git.as_ref(), system_now_ms()) {
            let _ = self.store.create_session(
                repo_path,
                recovered.intent,
                recovered.state,
                recovered.original_branch,
                recovered.created_at_ms,
            );
        }
    }

    fn view(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        let repo = build_repo(self.git.as_ref(), repo_path, &self.config)?;
        let session = self.store.get_session(repo_path);
        Ok(build_full_ui_state(&repo, None, session.as_ref()))
    }

    /// Rebuild the repository model and return the projected UI.
    #[instrument(skip(self))]
    pub fn get_repo(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        self.ensure_recovered_session(repo_path);
        self.view(repo_path)
    }

    /// Submit a rebase intent for the branch currently headed at
    /// `head_sha`, targeting `base_sha`. Stores a session without starting
    /// execution; the projected stack reflects the pending move.
    #[instrument(skip(self))]
    pub fn submit_rebase_intent(
        &self,
        repo_path: &Path,
        head_sha: &CommitRef,
        base_sha: &CommitRef,
    ) -> EngineResult<UiStateView> {
        let repo = build_repo(self.git.as_ref(), repo_path, &self.config)?;
        let branch = repo
            .branches
            .iter()
            .find(|b| &b.head_sha == head_sha && !b.is_remote)
            .ok_or_else(|| EngineError::InvalidIntent(format!("no local branch currently at {head_sha}")))?;
        let node = build_stack_node(&repo, &branch.reference)
            .ok_or_else(|| EngineError::InvalidIntent(format!("branch {} disappeared while building its stack node", branch.reference)))?;

        let now_ms = system_now_ms();
        let intent = RebaseIntent {
            id: self.next_id("intent"),
            created_at_ms: now_ms,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: base_sha.clone(),
            }],
        };

        let plan = create_plan(&repo, intent.clone(), now_ms, || self.next_id("job"))?;

        if self.store.get_session(repo_path).is_some() {
            return Err(EngineError::SessionAlreadyExists {
                path: repo_path.to_path_buf(),
            });
        }
        let original_branch = self.git.current_branch(repo_path);
        self.store
            .create_session(repo_path, Some(intent), plan.state, original_branch, now_ms)?;

        self.view(repo_path)
    }

    fn validate_execution_preconditions(&self, repo_path: &Path) -> EngineResult<()> {
        let status = self.git.working_tree_status(repo_path);
        if status.is_dirty() {
            return Err(EngineError::DirtyWorkingTree {
                path: repo_path.to_path_buf(),
            });
        }
        if !self.git.supports_rebase(repo_path) {
            return Err(EngineError::UnsupportedBackend);
        }
        Ok(())
    }

    /// Begin executing the stored session's plan.
    #[instrument(skip(self))]
    pub fn confirm_rebase_intent(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        if self.store.get_session(repo_path).is_none() {
            return Err(EngineError::NoActiveIntent {
                path: repo_path.to_path_buf(),
            });
        }
        self.validate_execution_preconditions(repo_path)?;

        let outcome = executor::execute_jobs(
            repo_path,
            self.git.as_ref(),
            &self.store,
            &self.config,
            ExecuteOptions { now_ms: system_now_ms() },
        )?;
        self.outcome_to_view(repo_path, outcome)
    }

    /// Clear a pending (not yet confirmed) session without touching the
    /// working tree.
    #[instrument(skip(self))]
    pub fn cancel_rebase_intent(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        self.store.clear_session(repo_path);
        self.view(repo_path)
    }

    /// Resume a session paused `awaiting-user` after conflicts are
    /// resolved and staged.
    #[instrument(skip(self))]
    pub fn continue_rebase(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        let outcome = executor::continue_rebase(
            repo_path,
            self.git.as_ref(),
            &self.store,
            &self.config,
            ExecuteOptions { now_ms: system_now_ms() },
        )?;
        self.outcome_to_view(repo_path, outcome)
    }

    /// Abort the in-progress rebase and clear the session.
    #[instrument(skip(self))]
    pub fn abort_rebase(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        executor::abort_rebase(repo_path, self.git.as_ref(), &self.store)?;
        self.view(repo_path)
    }

    /// Skip the commit currently blocking an `awaiting-user` session.
    #[instrument(skip(self))]
    pub fn skip_rebase_commit(&self, repo_path: &Path) -> EngineResult<UiStateView> {
        let outcome = executor::skip_rebase_commit(
            repo_path,
            self.git.as_ref(),
            &self.store,
            &self.config,
            ExecuteOptions { now_ms: system_now_ms() },
        )?;
        self.outcome_to_view(repo_path, outcome)
    }

    /// Every `ExecutionOutcome` variant leaves the session in a state the
    /// host can inspect (cleared on completion, preserved awaiting-user on
    /// conflict or failure) — see [`crate::ui::RebaseSessionView::status`].
    /// Callers that need to distinguish a job failure from a clean
    /// completion or conflict pause should inspect the returned view's
    /// `rebase` field rather than branching on this helper.
    fn outcome_to_view(&self, repo_path: &Path, outcome: ExecutionOutcome) -> EngineResult<UiStateView> {
        if let ExecutionOutcome::Error { message } = &outcome {
            tracing::warn!(%message, "rebase execution failed; session preserved for inspection");
        }
        self.view(repo_path)
    }
}
