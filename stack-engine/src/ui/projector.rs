//! The UI projector: trunk + spinoffs stack, and synthetic previews.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::model::Repo;
use crate::oid::CommitRef;
use crate::plan::SessionStatus;
use crate::session::StoredSession;
use crate::stack::RebaseIntent;
use crate::ui::types::{RebaseSessionView, RebaseStatus, UiBranch, UiCommit, UiStack, UiStateView};

fn make_ui_commit(repo: &Repo, sha: &CommitRef) -> UiCommit {
    let commit = repo.commits.get(sha);
    let branches = repo
        .branches_at(sha)
        .into_iter()
        .map(|b| UiBranch {
            reference: b.reference.clone(),
            is_trunk: b.is_trunk,
            is_remote: b.is_remote,
        })
        .collect();
    UiCommit {
        sha: sha.clone(),
        timestamp_ms: commit.map(|c| c.time_ms).unwrap_or(0),
        name: commit.map(|c| c.message_subject.clone()).unwrap_or_default(),
        is_current: repo.working_tree_status.current_commit_sha.as_ref() == Some(sha),
        rebase_status: None,
        branches,
        spinoffs: Vec::new(),
    }
}

fn trunk_spine(repo: &Repo) -> (Vec<CommitRef>, HashSet<CommitRef>) {
    let Some(trunk) = repo.trunk() else {
        return (Vec::new(), HashSet::new());
    };
    let mut head_to_root = Vec::new();
    let mut current = Some(trunk.head_sha.clone());
    while let Some(sha) = current {
        if head_to_root.contains(&sha) {
            break;
        }
        head_to_root.push(sha.clone());
        current = repo.commits.get(&sha).and_then(|c| c.parent_sha.clone());
    }
    let spine_set: HashSet<CommitRef> = head_to_root.iter().cloned().collect();
    head_to_root.reverse();
    (head_to_root, spine_set)
}

fn build_spinoff_from(repo: &Repo, start: CommitRef, trunk_set: &HashSet<CommitRef>) -> UiStack {
    let mut commits = Vec::new();
    let mut current = Some(start);
    while let Some(sha) = current {
        let mut ui_commit = make_ui_commit(repo, &sha);
        let children: Vec<CommitRef> = repo
            .commits
            .get(&sha)
            .map(|c| c.children_sha.iter().filter(|c| !trunk_set.contains(c)).cloned().collect())
            .unwrap_or_default();

        let mut sorted = children;
        sorted.sort_by(|a, b| {
            let ta = repo.commits.get(a).map(|c| c.time_ms).unwrap_or(0);
            let tb = repo.commits.get(b).map(|c| c.time_ms).unwrap_or(0);
            ta.cmp(&tb).then_with(|| a.cmp(b))
        });

        current = sorted.first().cloned();
        for other in sorted.iter().skip(1) {
            ui_commit.spinoffs.push(build_spinoff_from(repo, other.clone(), trunk_set));
        }
        commits.push(ui_commit);
    }
    UiStack { is_trunk: false, commits }
}

/// Build the trunk + spinoffs stack for `repo`, or `None` if no trunk
/// branch was discovered.
#[instrument(skip(repo))]
pub fn build_ui_stack(repo: &Repo) -> Option<UiStack> {
    let (spine, spine_set) = trunk_spine(repo);
    if spine.is_empty() {
        return None;
    }

    let mut commits: Vec<UiCommit> = spine
        .iter()
        .map(|sha| {
            let mut ui_commit = make_ui_commit(repo, sha);
            let spinoff_roots: Vec<CommitRef> = repo
                .commits
                .get(sha)
                .map(|c| c.children_sha.iter().filter(|c| !spine_set.contains(c)).cloned().collect())
                .unwrap_or_default();
            for root in spinoff_roots {
                ui_commit.spinoffs.push(build_spinoff_from(repo, root, &spine_set));
            }
            ui_commit
        })
        .collect();

    let first_interesting = commits
        .iter()
        .position(|c| !c.spinoffs.is_empty() || !c.branches.is_empty())
        .unwrap_or(commits.len().saturating_sub(1));
    commits.drain(0..first_interesting);

    Some(UiStack { is_trunk: true, commits })
}

/// Build a synthetic copy of `repo`'s commit graph with every intent
/// target reparented onto its new base, for preview rendering. Does not
/// mutate `repo`.
fn build_synthetic_repo(repo: &Repo, intent: &RebaseIntent) -> Repo {
    let mut synthetic = repo.clone();

    for target in &intent.targets {
        let head = target.node.head_sha.clone();
        let new_base = target.target_base_sha.clone();
        let old_parent = synthetic.commits.get(&head).and_then(|c| c.parent_sha.clone());

        if let Some(old_parent) = &old_parent {
            if let Some(old_parent_commit) = synthetic.commits.get_mut(old_parent) {
                old_parent_commit.children_sha.retain(|c| c != &head);
            }
        }
        let new_base_time = synthetic.commits.get(&new_base).map(|c| c.time_ms).unwrap_or(0);
        if let Some(new_base_commit) = synthetic.commits.get_mut(&new_base) {
            new_base_commit.children_sha.push(head.clone());
        }

        let mut monotonic_time = new_base_time + 1;
        for node in target.node.walk_preorder() {
            if let Some(commit) = synthetic.commits.get_mut(&node.head_sha) {
                if node.head_sha == head {
                    commit.parent_sha = Some(new_base.clone());
                }
                if commit.time_ms <= monotonic_time {
                    commit.time_ms = monotonic_time;
                }
                monotonic_time = commit.time_ms + 1;
            }
        }
    }

    synthetic
}

fn descendants_of(repo: &Repo, roots: &HashSet<CommitRef>) -> HashSet<CommitRef> {
    let mut out = HashSet::new();
    let mut stack: Vec<CommitRef> = roots.iter().cloned().collect();
    while let Some(sha) = stack.pop() {
        let Some(commit) = repo.commits.get(&sha) else {
            continue;
        };
        for child in &commit.children_sha {
            if out.insert(child.clone()) {
                stack.push(child.clone());
            }
        }
    }
    out
}

fn tag_rebase_status(stack: &mut UiStack, prompting: &HashSet<CommitRef>, idle: &HashSet<CommitRef>) {
    for commit in &mut stack.commits {
        commit.rebase_status = if prompting.contains(&commit.sha) {
            Some(RebaseStatus::Prompting)
        } else if idle.contains(&commit.sha) {
            Some(RebaseStatus::Idle)
        } else {
            None
        };
        for spinoff in &mut commit.spinoffs {
            tag_rebase_status(spinoff, prompting, idle);
        }
    }
}

/// Build the projected (previewed) stack for `intent` against `repo`,
/// tagging target heads `Prompting` and their descendants `Idle`.
#[instrument(skip(repo, intent))]
pub fn build_projected_stack(repo: &Repo, intent: &RebaseIntent) -> Option<UiStack> {
    let synthetic = build_synthetic_repo(repo, intent);
    let mut stack = build_ui_stack(&synthetic)?;

    let prompting: HashSet<CommitRef> = intent.targets.iter().map(|t| t.node.head_sha.clone()).collect();
    let idle = descendants_of(&synthetic, &prompting);
    tag_rebase_status(&mut stack, &prompting, &idle);

    Some(stack)
}

fn rebase_session_view(session: &StoredSession) -> RebaseSessionView {
    let jobs = session.state.jobs_by_id.values();
    let total_jobs = session.state.jobs_by_id.len();
    let completed_jobs = jobs
        .clone()
        .filter(|j| matches!(j.status, crate::plan::JobStatus::Completed))
        .count();
    let blocked = session
        .state
        .jobs_by_id
        .values()
        .find(|j| matches!(j.status, crate::plan::JobStatus::AwaitingUser));
    RebaseSessionView {
        status: session.state.session.status,
        completed_jobs,
        total_jobs,
        blocked_branch: blocked.map(|j| j.branch.clone()),
        conflicts: blocked.map(|j| j.conflicts.clone()).unwrap_or_default(),
    }
}

/// Build the complete view for the host shell: live stack, projected
/// stack (from a pending intent, or else from an in-progress session's
/// own intent), working tree snapshot, and rebase progress.
#[instrument(skip(repo, rebase_intent, rebase_session))]
pub fn build_full_ui_state(
    repo: &Repo,
    rebase_intent: Option<&RebaseIntent>,
    rebase_session: Option<&StoredSession>,
) -> UiStateView {
    let stack = build_ui_stack(repo);

    let effective_intent = rebase_intent.or_else(|| rebase_session.and_then(|s| s.intent.as_ref()));
    let projected_stack = effective_intent.and_then(|intent| build_projected_stack(repo, intent));

    UiStateView {
        stack,
        projected_stack,
        working_tree: repo.working_tree_status.clone(),
        rebase: rebase_session.map(rebase_session_view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::build_repo;
    use crate::stack::{build_stack_node, RebaseTarget};
    use crate::testing::TestRepo;

    #[test]
    fn test_build_ui_stack_includes_spinoff() {
        let repo = TestRepo::new();
        repo.commit("root");
        repo.branch_from("feature", &repo.head());
        repo.checkout("feature");
        repo.commit("f1");
        repo.checkout("master");

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let stack = build_ui_stack(&model).expect("trunk stack built");
        assert!(stack.is_trunk);
        let with_spinoff = stack.commits.iter().find(|c| !c.spinoffs.is_empty());
        assert!(with_spinoff.is_some(), "the commit feature forked from should carry a spinoff");
    }

    #[test]
    fn test_build_projected_stack_tags_prompting_head() {
        let repo = TestRepo::new();
        repo.commit("root");
        let root = repo.head();
        repo.branch_from("feature", &root);
        repo.checkout("feature");
        repo.commit("f1");
        repo.checkout("master");
        repo.commit("m1");
        let new_trunk_head = repo.head();

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = build_stack_node(&model, "feature").unwrap();
        let feature_head = node.head_sha.clone();
        let intent = RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: new_trunk_head,
            }],
        };

        let projected = build_projected_stack(&model, &intent).expect("projected stack built");
        let spinoff_head = projected
            .commits
            .iter()
            .flat_map(|c| c.spinoffs.iter())
            .flat_map(|s| s.commits.last())
            .find(|c| c.sha == feature_head);
        assert!(spinoff_head.is_some(), "the moved commit should still render in the projected stack");
        assert_eq!(spinoff_head.unwrap().rebase_status, Some(RebaseStatus::Prompting));
    }

    #[test]
    fn test_ui_state_view_serializes_to_json() {
        let repo = TestRepo::new();
        repo.commit("root");
        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let view = build_full_ui_state(&model, None, None);

        let json = view.to_json().expect("a built view always serializes");
        assert!(json.contains("\"stack\""));
        assert!(json.contains("\"working_tree\""));
    }
}
