//! End-to-end coverage of the `Engine` surface against a real Git
//! repository.

use stack_engine::config::EngineConfig;
use stack_engine::engine::Engine;
use stack_engine::git::CliGitBackend;
use stack_engine::testing::TestRepo;

fn engine_for(repo: &TestRepo) -> Engine {
    Engine::new(Box::new(repo.cli_backend().clone()), EngineConfig::default())
}

#[test]
fn test_submit_confirm_moves_a_spinoff_onto_new_trunk() {
    let repo = TestRepo::new();
    repo.commit("root");
    let root = repo.head();
    repo.branch_from("feature", &root);
    repo.checkout("feature");
    let feature_head = repo.commit("f1");
    repo.checkout("master");
    repo.commit("m1");
    let new_trunk_head = repo.head();

    let engine = engine_for(&repo);

    let view = engine.get_repo(repo.path()).expect("get_repo succeeds");
    assert!(view.stack.is_some());

    let submitted = engine
        .submit_rebase_intent(repo.path(), &feature_head, &new_trunk_head)
        .expect("submit succeeds");
    assert!(submitted.projected_stack.is_some(), "a pending intent projects a preview stack");

    let confirmed = engine.confirm_rebase_intent(repo.path()).expect("confirm succeeds");
    assert!(confirmed.rebase.is_none(), "a clean completion clears the session");

    let new_feature_parent = repo.resolve("feature~1");
    assert_eq!(new_feature_parent, new_trunk_head);
}

#[test]
fn test_cancel_rebase_intent_leaves_working_tree_untouched() {
    let repo = TestRepo::new();
    repo.commit("root");
    let root = repo.head();
    repo.branch_from("feature", &root);
    repo.checkout("feature");
    let feature_head = repo.commit("f1");
    repo.checkout("master");
    repo.commit("m1");
    let new_trunk_head = repo.head();

    let engine = engine_for(&repo);
    engine
        .submit_rebase_intent(repo.path(), &feature_head, &new_trunk_head)
        .expect("submit succeeds");

    let view = engine.cancel_rebase_intent(repo.path()).expect("cancel succeeds");
    assert!(view.projected_stack.is_none(), "no pending intent after cancellation");

    let feature_head_after = repo.resolve("feature");
    assert_eq!(feature_head_after, feature_head, "feature was never touched");
}

#[test]
fn test_conflict_then_continue_completes_the_rebase() {
    let repo = TestRepo::new();
    repo.commit_file("shared.txt", "base\n", "root");
    let root = repo.head();
    repo.branch_from("feature", &root);
    repo.checkout("feature");
    let feature_head = repo.commit_file("shared.txt", "feature version\n", "f1");
    repo.checkout("master");
    repo.commit_file("shared.txt", "master version\n", "m1");
    let new_trunk_head = repo.head();

    let engine = engine_for(&repo);
    engine
        .submit_rebase_intent(repo.path(), &feature_head, &new_trunk_head)
        .expect("submit succeeds");
    let confirmed = engine.confirm_rebase_intent(repo.path()).expect("confirm succeeds");
    let rebase = confirmed.rebase.expect("a conflict leaves a session to inspect");
    assert!(!rebase.conflicts.is_empty());
    assert_eq!(rebase.blocked_branch.as_deref(), Some("feature"));

    std::fs::write(repo.path().join("shared.txt"), "resolved\n").unwrap();
    let backend = CliGitBackend::new();
    backend.add(repo.path(), std::path::Path::new("shared.txt")).unwrap();

    let resumed = engine.continue_rebase(repo.path()).expect("continue succeeds");
    assert!(resumed.rebase.is_none(), "completion clears the session");
}

#[test]
fn test_continue_rebase_recovers_session_after_restart() {
    let repo = TestRepo::new();
    repo.commit_file("shared.txt", "base\n", "root");
    let root = repo.head();
    repo.branch_from("feature", &root);
    repo.checkout("feature");
    let feature_head = repo.commit_file("shared.txt", "feature version\n", "f1");
    repo.checkout("master");
    repo.commit_file("shared.txt", "master version\n", "m1");
    let new_trunk_head = repo.head();

    let engine = engine_for(&repo);
    engine
        .submit_rebase_intent(repo.path(), &feature_head, &new_trunk_head)
        .expect("submit succeeds");
    let confirmed = engine.confirm_rebase_intent(repo.path()).expect("confirm succeeds");
    assert!(confirmed.rebase.is_some(), "conflict leaves an in-progress rebase on disk");

    std::fs::write(repo.path().join("shared.txt"), "resolved\n").unwrap();
    let backend = CliGitBackend::new();
    backend.add(repo.path(), std::path::Path::new("shared.txt")).unwrap();

    // Simulate a process restart: a fresh `Engine` has no in-memory
    // session, but Git's on-disk rebase state is still there.
    let restarted = engine_for(&repo);
    let resumed = restarted.continue_rebase(repo.path()).expect("continue recovers and succeeds");
    assert!(resumed.rebase.is_none(), "recovered session completes and clears itself");
}

#[test]
fn test_abort_restores_original_branch_on_conflict() {
    let repo = TestRepo::new();
    repo.commit_file("shared.txt", "base\n", "root");
    let root = repo.head();
    repo.branch_from("feature", &root);
    repo.checkout("feature");
    let feature_head = repo.commit_file("shared.txt", "feature version\n", "f1");
    repo.checkout("master");
    repo.commit_file("shared.txt", "master version\n", "m1");
    let new_trunk_head = repo.head();
    repo.checkout("feature");

    let engine = engine_for(&repo);
    engine
        .submit_rebase_intent(repo.path(), &feature_head, &new_trunk_head)
        .expect("submit succeeds");
    let confirmed = engine.confirm_rebase_intent(repo.path()).expect("confirm succeeds");
    assert!(confirmed.rebase.is_some());

    let view = engine.abort_rebase(repo.path()).expect("abort succeeds");
    assert!(view.rebase.is_none());
    assert_eq!(repo.cli_backend().current_branch(repo.path()).as_deref(), Some("feature"));
}
