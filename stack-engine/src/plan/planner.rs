//! The rebase planner: [`create_plan`].

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::error::{EngineError, EngineResult};
use crate::model::Repo;
use crate::oid::CommitRef;
use crate::plan::job::{JobStatus, RebaseJob};
use crate::plan::state::{JobQueue, RebaseState, SessionInfo, SessionStatus};
use crate::stack::{RebaseIntent, StackNode};

/// A rebase plan: the intent it was built from, plus its initial state
/// machine.
#[derive(Clone, Debug)]
pub struct RebasePlan {
    /// The intent this plan implements.
    pub intent: RebaseIntent,
    /// The initial state machine, with one pending job per target subtree
    /// root.
    pub state: RebaseState,
}

fn trunk_lineage(repo: &Repo) -> HashSet<CommitRef> {
    let mut lineage = HashSet::new();
    let Some(trunk) = repo.trunk() else {
        return lineage;
    };
    let mut current = Some(trunk.head_sha.clone());
    while let Some(sha) = current {
        if !lineage.insert(sha.clone()) {
            break;
        }
        current = repo.commits.get(&sha).and_then(|c| c.parent_sha.clone());
    }
    lineage
}

fn validate_intent(repo: &Repo, intent: &RebaseIntent) -> EngineResult<()> {
    if intent.targets.is_empty() {
        return Err(EngineError::InvalidIntent("intent has no targets".to_string()));
    }

    let mut seen_branches = HashSet::new();
    let trunk_lineage = trunk_lineage(repo);

    for target in &intent.targets {
        if !seen_branches.insert(target.node.branch.clone()) {
            return Err(EngineError::InvalidIntent(format!(
                "duplicate target branch {}",
                target.node.branch
            )));
        }

        if let Some(branch) = repo.branch(&target.node.branch) {
            if branch.is_remote {
                return Err(EngineError::InvalidIntent(format!(
                    "target branch {} is a remote branch",
                    target.node.branch
                )));
            }
        }

        if !repo.commits.contains_key(&target.node.head_sha) {
            return Err(EngineError::InvalidIntent(format!(
                "target {} references unknown head sha {}",
                target.node.branch, target.node.head_sha
            )));
        }
        if !repo.commits.contains_key(&target.target_base_sha) {
            return Err(EngineError::InvalidIntent(format!(
                "target {} references unknown base sha {}",
                target.node.branch, target.target_base_sha
            )));
        }

        for node in target.node.walk_preorder() {
            if trunk_lineage.contains(&node.head_sha) {
                return Err(EngineError::InvalidIntent(format!(
                    "target subtree for {} contains a commit on trunk",
                    target.node.branch
                )));
            }
        }
    }

    Ok(())
}

/// Build an initial [`RebasePlan`] for `intent` against `repo`.
///
/// `generate_job_id` is called once per initial job (one per target
/// subtree root); descendant jobs are enqueued later by
/// [`crate::plan::enqueue_descendants`] as each parent completes.
#[instrument(skip(repo, generate_job_id))]
pub fn create_plan(
    repo: &Repo,
    intent: RebaseIntent,
    now_ms: i64,
    mut generate_job_id: impl FnMut() -> String,
) -> EngineResult<RebasePlan> {
    validate_intent(repo, &intent)?;

    let mut jobs_by_id = HashMap::new();
    let mut pending_job_ids = Vec::new();

    for target in &intent.targets {
        let id = generate_job_id();
        let job = RebaseJob {
            id: id.clone(),
            branch: target.node.branch.clone(),
            original_base_sha: target.node.base_sha.clone(),
            original_head_sha: target.node.head_sha.clone(),
            target_base_sha: target.target_base_sha.clone(),
            status: JobStatus::Pending,
            created_at_ms: now_ms,
            conflicts: Vec::new(),
            rebased_head_sha: None,
        };
        jobs_by_id.insert(id.clone(), job);
        pending_job_ids.push(id);
    }

    let initial_trunk_sha = repo
        .trunk()
        .map(|b| b.head_sha.clone())
        .ok_or_else(|| EngineError::InvalidIntent("repository has no trunk branch".to_string()))?;

    let state = RebaseState {
        session: SessionInfo {
            id: format!("session-{now_ms}"),
            started_at_ms: now_ms,
            status: SessionStatus::Running,
            initial_trunk_sha,
            commit_map: Vec::new(),
        },
        jobs_by_id,
        queue: JobQueue {
            pending_job_ids,
            blocked_job_ids: Vec::new(),
            active_job_id: None,
        },
    };

    Ok(RebasePlan { intent, state })
}

/// Find the [`StackNode`] within `intent` matching `branch`, searching
/// every target subtree recursively. Used by the executor to look up a
/// completed job's descendants.
pub fn find_node<'a>(intent: &'a RebaseIntent, branch: &str) -> Option<&'a StackNode> {
    for target in &intent.targets {
        for node in target.node.walk_preorder() {
            if node.branch == branch {
                return Some(node);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::build_repo;
    use crate::stack::{build_stack_node, RebaseTarget};
    use crate::testing::TestRepo;

    fn make_intent(node: StackNode, target_base_sha: CommitRef) -> RebaseIntent {
        RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget { node, target_base_sha }],
        }
    }

    #[test]
    fn test_create_plan_happy_path() {
        let repo = TestRepo::new();
        repo.commit("root");
        let trunk_head = repo.head();
        repo.branch_from("feature", &trunk_head);
        repo.checkout("feature");
        repo.commit("f1");
        repo.checkout("master");
        repo.commit("m1");
        let new_trunk_head = repo.head();

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = build_stack_node(&model, "feature").unwrap();
        let intent = make_intent(node, new_trunk_head.clone());

        let mut counter = 0;
        let plan = create_plan(&model, intent, 1000, || {
            counter += 1;
            format!("job-{counter}")
        })
        .expect("plan should build");

        assert_eq!(plan.state.queue.pending_job_ids.len(), 1);
        let job = plan.state.job("job-1").unwrap();
        assert_eq!(job.branch, "feature");
        assert_eq!(job.target_base_sha, new_trunk_head);
    }

    #[test]
    fn test_create_plan_rejects_duplicate_targets() {
        let repo = TestRepo::new();
        repo.commit("root");
        repo.branch_from("feature", &repo.head());
        repo.checkout("feature");
        repo.commit("f1");

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = build_stack_node(&model, "feature").unwrap();
        let base = node.base_sha.clone();
        let mut intent = make_intent(node.clone(), base.clone());
        intent.targets.push(RebaseTarget {
            node,
            target_base_sha: base,
        });

        let result = create_plan(&model, intent, 0, || "job".to_string());
        assert!(matches!(result, Err(EngineError::InvalidIntent(_))));
    }

    #[test]
    fn test_validate_intent_rejects_remote_target() {
        let repo = TestRepo::new();
        repo.commit("root");
        let config = EngineConfig::default();
        let mut model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let trunk_head = model.trunk().unwrap().head_sha.clone();
        model.branches.push(crate::model::Branch {
            reference: "origin/feature".to_string(),
            is_trunk: false,
            is_remote: true,
            head_sha: trunk_head.clone(),
            base_sha: trunk_head.clone(),
            owned_commit_shas: Vec::new(),
        });
        let node = StackNode {
            branch: "origin/feature".to_string(),
            head_sha: trunk_head.clone(),
            base_sha: trunk_head.clone(),
            children: Vec::new(),
        };
        let intent = make_intent(node, trunk_head);

        let result = validate_intent(&model, &intent);
        assert!(matches!(result, Err(EngineError::InvalidIntent(_))));
    }

    #[test]
    fn test_validate_intent_rejects_commit_on_trunk() {
        let repo = TestRepo::new();
        repo.commit("root");
        let trunk_head = repo.head();
        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = StackNode {
            branch: "master".to_string(),
            head_sha: trunk_head.clone(),
            base_sha: trunk_head.clone(),
            children: Vec::new(),
        };
        let intent = make_intent(node, trunk_head);

        let result = validate_intent(&model, &intent);
        assert!(matches!(result, Err(EngineError::InvalidIntent(_))));
    }
}
