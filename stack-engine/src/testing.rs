//! A real, temporary Git repository fixture for tests.
//!
//! [`TestRepo`] spawns the system `git` binary to initialize a repository
//! and build commit/branch graphs, then exposes a [`CliGitBackend`] bound
//! to that directory. This is the primary way the model builder, planner,
//! executor, and projector are exercised end to end without mocking Git
//! itself.

use std::cell::Cell;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use crate::git::{CliGitBackend, GitBackend};
use crate::oid::CommitRef;

/// A throwaway Git repository backed by a temporary directory.
///
/// The default branch is `master`, which is also in
/// [`crate::config::EngineConfig`]'s default `canonical_trunk_names`, so a
/// freshly created `TestRepo` has an unambiguous trunk.
pub struct TestRepo {
    dir: TempDir,
    backend: CliGitBackend,
    commit_counter: Cell<u32>,
}

impl TestRepo {
    /// Create a new repository with a single initial empty commit on
    /// `master`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir for test repo");
        let backend = CliGitBackend::new();
        let repo = Self {
            dir,
            backend,
            commit_counter: Cell::new(0),
        };
        repo.git(&["init", "--quiet", "--initial-branch=master"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// This repository's filesystem path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The `CliGitBackend` bound to this repository, as a trait object.
    pub fn backend(&self) -> &dyn GitBackend {
        &self.backend
    }

    /// The `CliGitBackend` bound to this repository, concretely typed.
    pub fn cli_backend(&self) -> &CliGitBackend {
        &self.backend
    }

    fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(args)
            .env("GIT_AUTHOR_DATE", "2024-01-01T00:00:00")
            .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:00")
            .output()
            .unwrap_or_else(|err| panic!("failed to spawn git {args:?}: {err}"));
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Create a commit on the current branch with a uniquely named,
    /// uniquely contented file, using `message` as both the commit
    /// message and file content prefix.
    pub fn commit(&self, message: &str) -> CommitRef {
        let n = self.commit_counter.get();
        self.commit_counter.set(n + 1);
        let file_name = format!("file-{n}.txt");
        std::fs::write(self.path().join(&file_name), message)
            .expect("failed to write test fixture file");
        self.git(&["add", &file_name]);
        self.git(&["commit", "--quiet", "--message", message]);
        self.head()
    }

    /// Create a commit that writes `content` to `file_name` on the current
    /// branch, for tests that need two branches to touch the same file
    /// (e.g. to force a rebase conflict deterministically).
    pub fn commit_file(&self, file_name: &str, content: &str, message: &str) -> CommitRef {
        std::fs::write(self.path().join(file_name), content)
            .expect("failed to write test fixture file");
        self.git(&["add", file_name]);
        self.git(&["commit", "--quiet", "--message", message]);
        self.head()
    }

    /// Resolve the current `HEAD`.
    pub fn head(&self) -> CommitRef {
        self.backend
            .resolve_ref(self.path(), "HEAD")
            .expect("HEAD should resolve in a non-empty repo")
    }

    /// Resolve an arbitrary ref.
    pub fn resolve(&self, reference: &str) -> CommitRef {
        self.backend
            .resolve_ref(self.path(), reference)
            .unwrap_or_else(|| panic!("failed to resolve {reference}"))
    }

    /// Create a branch named `name` at `start_point`, without checking it
    /// out.
    pub fn branch_from(&self, name: &str, start_point: &CommitRef) {
        self.backend
            .branch(self.path(), name, Some(start_point.as_str()), false)
            .expect("failed to create branch");
    }

    /// Check out an existing branch.
    pub fn checkout(&self, name: &str) {
        self.backend
            .checkout(self.path(), name, false, false)
            .expect("failed to checkout branch");
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
