//! [`CliGitBackend`]: a [`GitBackend`] that shells out to the system `git`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, instrument, warn};

use crate::error::GitError;
use crate::git::backend::{
    Commit, CommitDetail, GitBackend, OnDiskRebaseState, RebaseResult, RemoteInfo,
    WorkingTreeStatus,
};
use crate::oid::CommitRef;

/// The environment variables every invocation is run with, on top of a
/// cleared environment. This keeps output parseable regardless of the
/// caller's shell configuration (locale, pagers, hooks, aliases).
fn base_env() -> HashMap<&'static str, &'static str> {
    let mut env = HashMap::new();
    env.insert("GIT_PAGER", "cat");
    env.insert("GIT_TERMINAL_PROMPT", "0");
    env.insert("LANG", "C");
    env.insert("LC_ALL", "C");
    env
}

/// A [`GitBackend`] implementation that shells out to the system `git`
/// binary found on `PATH`.
///
/// Every invocation runs with `-C <dir>`, a cleared environment
/// re-populated from [`base_env`], and captured stdout/stderr. Parsing
/// failures and nonzero exits from read-only commands degrade to an empty
/// result; mutation commands surface a [`GitError`] carrying the captured
/// stderr.
#[derive(Clone, Debug, Default)]
pub struct CliGitBackend {
    /// Path to the `git` executable, or `"git"` to resolve via `PATH`.
    git_path: PathBuf,
}

impl CliGitBackend {
    /// Construct a backend that resolves `git` via `PATH`.
    pub fn new() -> Self {
        Self {
            git_path: PathBuf::from("git"),
        }
    }

    /// Construct a backend that invokes a specific `git` executable.
    pub fn with_git_path(git_path: impl Into<PathBuf>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    #[instrument(skip(self), fields(git = %self.git_path.display()))]
    fn run(&self, dir: &Path, args: &[&str]) -> std::io::Result<Output> {
        debug!(?args, dir = %dir.display(), "running git");
        Command::new(&self.git_path)
            .arg("-C")
            .arg(dir)
            .args(args)
            .env_clear()
            .envs(base_env())
            .output()
    }

    fn run_ok(&self, dir: &Path, args: &[&str]) -> Option<String> {
        match self.run(dir, args) {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                warn!(
                    ?args,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "git command failed"
                );
                None
            }
            Err(err) => {
                warn!(?args, %err, "failed to spawn git");
                None
            }
        }
    }

    fn run_required(&self, dir: &Path, operation: &str, args: &[&str]) -> Result<String, GitError> {
        let output = self
            .run(dir, args)
            .map_err(|err| GitError::new(operation, err.to_string()))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(GitError::new(
                operation,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn rebase_state_dir(dir: &Path) -> Option<PathBuf> {
        for candidate in ["rebase-merge", "rebase-apply"] {
            let path = dir.join(".git").join(candidate);
            if path.is_dir() {
                return Some(path);
            }
        }
        None
    }
}

/// Parse a single `%H%x1f%P%x1f%at%x1f%s` record, as produced by `log`'s
/// format string. Fields are separated by ASCII unit separator (0x1f) to
/// avoid colliding with commit subjects containing arbitrary text.
fn parse_log_line(line: &str) -> Option<Commit> {
    let mut parts = line.split('\u{1f}');
    let sha = CommitRef::new(parts.next()?).ok()?;
    let parent = parts.next()?;
    let parent_sha = parent.split_whitespace().next().and_then(|p| CommitRef::new(p).ok());
    let time_ms: i64 = parts.next()?.trim().parse::<i64>().ok()? * 1000;
    let message_subject = parts.next().unwrap_or_default().to_string();
    Some(Commit {
        sha,
        parent_sha,
        children_sha: Vec::new(),
        message_subject,
        time_ms,
    })
}

impl GitBackend for CliGitBackend {
    fn list_branches(&self, dir: &Path, remote: Option<&str>) -> Vec<String> {
        let args: Vec<&str> = match remote {
            Some(_) => vec!["branch", "-r", "--format=%(refname:short)"],
            None => vec!["branch", "--format=%(refname:short)"],
        };
        let Some(stdout) = self.run_ok(dir, &args) else {
            return Vec::new();
        };
        stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter(|l| match remote {
                Some(name) => l.starts_with(&format!("{name}/")) && !l.ends_with("/HEAD"),
                None => true,
            })
            .map(|l| l.to_string())
            .collect()
    }

    fn list_remotes(&self, dir: &Path) -> Vec<RemoteInfo> {
        let Some(stdout) = self.run_ok(dir, &["remote", "-v"]) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for line in stdout.lines() {
            let mut fields = line.split_whitespace();
            let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !seen.iter().any(|r: &RemoteInfo| r.name == name) {
                seen.push(RemoteInfo {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
        }
        seen
    }

    fn log(&self, dir: &Path, reference: &str, depth: Option<usize>) -> Vec<Commit> {
        let mut args = vec!["log", "--format=%H\u{1f}%P\u{1f}%at\u{1f}%s", reference.as_ref()];
        let depth_arg;
        if let Some(depth) = depth {
            depth_arg = format!("-{depth}");
            args.insert(1, &depth_arg);
        }
        let Some(stdout) = self.run_ok(dir, &args) else {
            return Vec::new();
        };
        let mut commits: Vec<Commit> = stdout.lines().filter_map(parse_log_line).collect();

        let mut children: HashMap<CommitRef, Vec<CommitRef>> = HashMap::new();
        for commit in &commits {
            if let Some(parent) = &commit.parent_sha {
                children.entry(parent.clone()).or_default().push(commit.sha.clone());
            }
        }
        for commit in &mut commits {
            if let Some(kids) = children.get(&commit.sha) {
                commit.children_sha = kids.clone();
            }
        }
        commits
    }

    fn resolve_ref(&self, dir: &Path, reference: &str) -> Option<CommitRef> {
        let stdout = self.run_ok(dir, &["rev-parse", "--verify", "--quiet", reference])?;
        CommitRef::new(stdout.trim()).ok()
    }

    fn read_config(&self, dir: &Path, key: &str) -> Option<String> {
        let stdout = self.run_ok(dir, &["config", "--get", key])?;
        let value = stdout.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn current_branch(&self, dir: &Path) -> Option<String> {
        let stdout = self.run_ok(dir, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        let name = stdout.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    fn read_commit(&self, dir: &Path, sha: &CommitRef) -> Result<CommitDetail, GitError> {
        let format = "%H\u{1f}%at\u{1f}%P\u{1f}%an <%ae>\u{1f}%cn <%ce>\u{1f}%B";
        let stdout = self.run_required(
            dir,
            "read_commit",
            &["show", "-s", &format!("--format={format}"), sha.as_str()],
        )?;
        let mut parts = stdout.splitn(6, '\u{1f}');
        let sha_field = parts.next().unwrap_or_default();
        let time_ms: i64 = parts
            .next()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(|secs| secs * 1000)
            .unwrap_or(0);
        let parent_sha = parts
            .next()
            .and_then(|p| p.split_whitespace().next())
            .and_then(|p| CommitRef::new(p).ok());
        let author = parts.next().unwrap_or_default().trim().to_string();
        let committer = parts.next().unwrap_or_default().trim().to_string();
        let message = parts.next().unwrap_or_default().trim_end().to_string();
        let sha = CommitRef::new(sha_field.trim())
            .map_err(|_| GitError::new("read_commit", "git returned an unparseable SHA"))?;
        Ok(CommitDetail {
            sha,
            message,
            time_ms,
            parent_sha,
            author,
            committer,
        })
    }

    fn working_tree_status(&self, dir: &Path) -> WorkingTreeStatus {
        let mut status = WorkingTreeStatus {
            current_branch: self.current_branch(dir),
            current_commit_sha: self.resolve_ref(dir, "HEAD"),
            detached: self.current_branch(dir).is_none(),
            is_rebasing: Self::rebase_state_dir(dir).is_some(),
            ..Default::default()
        };
        if let Some(branch) = &status.current_branch {
            status.tracking = self
                .run_ok(dir, &["rev-parse", "--abbrev-ref", &format!("{branch}@{{upstream}}")])
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }

        let Some(stdout) = self.run_ok(dir, &["status", "--porcelain=v1", "-z"]) else {
            return status;
        };
        for entry in stdout.split('\0').filter(|e| !e.is_empty()) {
            if entry.len() < 3 {
                continue;
            }
            let index_status = entry.as_bytes()[0] as char;
            let worktree_status = entry.as_bytes()[1] as char;
            let path = PathBuf::from(entry[3..].to_string());
            if index_status == 'U' || worktree_status == 'U' || (index_status == 'A' && worktree_status == 'A') {
                status.conflicted.push(path);
                continue;
            }
            match index_status {
                'A' => status.created.push(path.clone()),
                'D' => status.deleted.push(path.clone()),
                'R' => status.renamed.push(path.clone()),
                'M' => status.staged.push(path.clone()),
                _ => {}
            }
            match worktree_status {
                'M' => status.modified.push(path),
                'D' => status.deleted.push(path),
                '?' => status.not_added.push(path),
                _ => {}
            }
        }
        status
    }

    fn checkout(&self, dir: &Path, reference: &str, force: bool, create: bool) -> Result<(), GitError> {
        let mut args = vec!["checkout"];
        if force {
            args.push("--force");
        }
        if create {
            args.push("-b");
        }
        args.push(reference);
        self.run_required(dir, "checkout", &args).map(|_| ())
    }

    fn branch(&self, dir: &Path, name: &str, start_point: Option<&str>, checkout: bool) -> Result<(), GitError> {
        if checkout {
            let mut args = vec!["checkout", "-b", name];
            if let Some(start) = start_point {
                args.push(start);
            }
            self.run_required(dir, "branch", &args).map(|_| ())
        } else {
            let mut args = vec!["branch", name];
            if let Some(start) = start_point {
                args.push(start);
            }
            self.run_required(dir, "branch", &args).map(|_| ())
        }
    }

    fn delete_branch(&self, dir: &Path, name: &str) -> Result<(), GitError> {
        self.run_required(dir, "delete_branch", &["branch", "-D", name])
            .map(|_| ())
    }

    fn add(&self, dir: &Path, path: &Path) -> Result<(), GitError> {
        let path_str = path.to_string_lossy();
        self.run_required(dir, "add", &["add", "--", &path_str])
            .map(|_| ())
    }

    fn reset_index(&self, dir: &Path, reference: &str) -> Result<(), GitError> {
        self.run_required(dir, "reset_index", &["reset", reference])
            .map(|_| ())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<CommitRef, GitError> {
        self.run_required(dir, "commit", &["commit", "--message", message])?;
        self.resolve_ref(dir, "HEAD")
            .ok_or_else(|| GitError::new("commit", "HEAD did not resolve after commit"))
    }

    fn reset(&self, dir: &Path, reference: &str, hard: bool) -> Result<(), GitError> {
        let mode = if hard { "--hard" } else { "--mixed" };
        self.run_required(dir, "reset", &["reset", mode, reference])
            .map(|_| ())
    }

    fn push(&self, dir: &Path, remote: &str, branch: &str, force: bool) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if force {
            args.push("--force-with-lease");
        }
        args.push(remote);
        args.push(branch);
        self.run_required(dir, "push", &args).map(|_| ())
    }

    fn rebase(&self, dir: &Path, onto: &CommitRef, from: &CommitRef, to: &str) -> Result<RebaseResult, GitError> {
        let onto_str = onto.as_str();
        let from_str = from.as_str();
        let output = self
            .run(dir, &["rebase", "--onto", onto_str, from_str, to])
            .map_err(|err| GitError::new("rebase", err.to_string()))?;
        if output.status.success() {
            Ok(RebaseResult {
                success: true,
                conflicts: Vec::new(),
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else if Self::rebase_state_dir(dir).is_some() {
            Ok(RebaseResult {
                success: false,
                conflicts: self.working_tree_status(dir).conflicted,
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else {
            Err(GitError::new(
                "rebase",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn rebase_continue(&self, dir: &Path) -> Result<RebaseResult, GitError> {
        let output = self
            .run(dir, &["-c", "core.editor=true", "rebase", "--continue"])
            .map_err(|err| GitError::new("rebase_continue", err.to_string()))?;
        if output.status.success() {
            Ok(RebaseResult {
                success: true,
                conflicts: Vec::new(),
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else if Self::rebase_state_dir(dir).is_some() {
            Ok(RebaseResult {
                success: false,
                conflicts: self.working_tree_status(dir).conflicted,
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else {
            Err(GitError::new(
                "rebase_continue",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn rebase_abort(&self, dir: &Path) -> Result<(), GitError> {
        self.run_required(dir, "rebase_abort", &["rebase", "--abort"])
            .map(|_| ())
    }

    fn rebase_skip(&self, dir: &Path) -> Result<RebaseResult, GitError> {
        let output = self
            .run(dir, &["rebase", "--skip"])
            .map_err(|err| GitError::new("rebase_skip", err.to_string()))?;
        if output.status.success() {
            Ok(RebaseResult {
                success: true,
                conflicts: Vec::new(),
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else if Self::rebase_state_dir(dir).is_some() {
            Ok(RebaseResult {
                success: false,
                conflicts: self.working_tree_status(dir).conflicted,
                current_commit: self.resolve_ref(dir, "HEAD"),
            })
        } else {
            Err(GitError::new(
                "rebase_skip",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    fn rebase_state(&self, dir: &Path) -> Option<OnDiskRebaseState> {
        let state_dir = Self::rebase_state_dir(dir)?;
        let read = |name: &str| std::fs::read_to_string(state_dir.join(name)).ok();

        let branch = read("head-name").map(|s| {
            s.trim()
                .trim_start_matches("refs/heads/")
                .to_string()
        });
        let onto = read("onto").and_then(|s| CommitRef::new(s.trim()).ok());
        let original_head = read("orig-head").and_then(|s| CommitRef::new(s.trim()).ok());
        let current_step = read("msgnum")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let total_steps = read("end").and_then(|s| s.trim().parse().ok()).unwrap_or(0);

        Some(OnDiskRebaseState {
            branch,
            onto,
            original_head,
            current_step,
            total_steps,
        })
    }
}
