//! The rebase executor.

mod execute;

pub use execute::{
    abort_rebase, continue_rebase, execute_jobs, execute_rebase_plan, skip_rebase_commit,
    ExecuteOptions, ExecutionOutcome,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::model::build_repo;
    use crate::plan::create_plan;
    use crate::session::SessionStore;
    use crate::stack::{build_stack_node, RebaseIntent, RebaseTarget};
    use crate::testing::TestRepo;

    #[test]
    fn test_execute_rebase_plan_moves_single_branch() {
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
        let intent = RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: new_trunk_head.clone(),
            }],
        };
        let mut counter = 0;
        let plan = create_plan(&model, intent, 0, || {
            counter += 1;
            format!("job-{counter}")
        })
        .unwrap();

        let store = SessionStore::new();
        let outcome = execute_rebase_plan(
            repo.path(),
            plan,
            repo.backend(),
            &store,
            &config,
            ExecuteOptions { now_ms: 0 },
        )
        .unwrap();

        match outcome {
            ExecutionOutcome::Completed { commit_map } => {
                assert_eq!(commit_map.len(), 1);
                assert_eq!(commit_map[0].branch, "feature");
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let feature_head = repo.resolve("feature");
        let feature_parent = repo.resolve("feature~1");
        assert_eq!(feature_parent, new_trunk_head, "feature must now sit on top of the new trunk head");
        assert!(store.get_session(repo.path()).is_none(), "session is cleared on completion");
        assert_ne!(feature_head, root, "feature head must have been rewritten");
    }

    #[test]
    fn test_execute_rebase_plan_rejects_dirty_tree() {
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
        let intent = RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: new_trunk_head,
            }],
        };
        let plan = create_plan(&model, intent, 0, || "job-1".to_string()).unwrap();

        std::fs::write(repo.path().join("untracked.txt"), "oops").unwrap();

        let store = SessionStore::new();
        let result = execute_rebase_plan(
            repo.path(),
            plan,
            repo.backend(),
            &store,
            &config,
            ExecuteOptions { now_ms: 0 },
        );
        assert!(matches!(result, Err(EngineError::DirtyWorkingTree { .. })));
    }

    #[test]
    fn test_execute_rebase_plan_pauses_on_conflict() {
        let repo = TestRepo::new();
        repo.commit_file("shared.txt", "base\n", "root");
        let root = repo.head();
        repo.branch_from("feature", &root);
        repo.checkout("feature");
        repo.commit_file("shared.txt", "feature version\n", "f1");
        repo.checkout("master");
        repo.commit_file("shared.txt", "master version\n", "m1");
        let new_trunk_head = repo.head();

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = build_stack_node(&model, "feature").unwrap();
        let intent = RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: new_trunk_head,
            }],
        };
        let mut counter = 0;
        let plan = create_plan(&model, intent, 0, || {
            counter += 1;
            format!("job-{counter}")
        })
        .unwrap();

        let store = SessionStore::new();
        let outcome = execute_rebase_plan(
            repo.path(),
            plan,
            repo.backend(),
            &store,
            &config,
            ExecuteOptions { now_ms: 0 },
        )
        .unwrap();

        match outcome {
            ExecutionOutcome::Conflict { branch, conflicts } => {
                assert_eq!(branch, "feature");
                assert!(!conflicts.is_empty());
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
        assert!(store.get_session(repo.path()).is_some(), "session survives a conflict pause");

        std::fs::write(repo.path().join("shared.txt"), "resolved\n").unwrap();
        repo.backend().add(repo.path(), std::path::Path::new("shared.txt")).unwrap();
        let outcome = continue_rebase(repo.path(), repo.backend(), &store, &config, ExecuteOptions { now_ms: 1 }).unwrap();
        match outcome {
            ExecutionOutcome::Completed { .. } => {}
            other => panic!("expected completion after resolving the conflict, got {other:?}"),
        }
        assert!(store.get_session(repo.path()).is_none());
    }

    #[test]
    fn test_abort_rebase_restores_original_branch() {
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

        let config = EngineConfig::default();
        let model = build_repo(repo.backend(), repo.path(), &config).unwrap();
        let node = build_stack_node(&model, "feature").unwrap();
        let intent = RebaseIntent {
            id: "intent-1".to_string(),
            created_at_ms: 0,
            targets: vec![RebaseTarget {
                node,
                target_base_sha: new_trunk_head,
            }],
        };
        let plan = create_plan(&model, intent, 0, || "job-1".to_string()).unwrap();

        let store = SessionStore::new();
        let outcome = execute_rebase_plan(
            repo.path(),
            plan,
            repo.backend(),
            &store,
            &config,
            ExecuteOptions { now_ms: 0 },
        )
        .unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Conflict { .. }));

        abort_rebase(repo.path(), repo.backend(), &store).unwrap();
        assert!(store.get_session(repo.path()).is_none());
        assert_eq!(repo.backend().current_branch(repo.path()).as_deref(), Some("feature"));
    }
}
