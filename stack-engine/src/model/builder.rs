//! The repository model builder: [`build_repo`].

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::git::GitBackend;
use crate::model::branch::Branch;
use crate::model::commit::Commit;
use crate::model::repo::Repo;
use crate::oid::CommitRef;

/// One ref discovered during enumeration, before heads are resolved.
struct RawRef {
    reference: String,
    is_remote: bool,
}

fn enumerate_refs(git: &dyn GitBackend, dir: &std::path::Path) -> Vec<RawRef> {
    let mut refs: Vec<RawRef> = git
        .list_branches(dir, None)
        .into_iter()
        .filter(|name| name != "HEAD" && !name.ends_with("/HEAD"))
        .map(|reference| RawRef {
            reference,
            is_remote: false,
        })
        .collect();

    for remote in git.list_remotes(dir) {
        for reference in git.list_branches(dir, Some(&remote.name)) {
            if reference.ends_with("/HEAD") {
                continue;
            }
            refs.push(RawRef {
                reference,
                is_remote: true,
            });
        }
    }
    refs
}

/// Pick the trunk branch among resolved `(reference, is_remote, head_sha)`
/// triples, per the preference order in the repo model builder algorithm.
fn discover_trunk<'a>(
    resolved: &'a [(String, bool, CommitRef)],
    config: &EngineConfig,
    current_branch: Option<&str>,
) -> Option<&'a str> {
    for name in &config.canonical_trunk_names {
        if let Some((reference, ..)) = resolved.iter().find(|(r, is_remote, _)| !is_remote && r == name) {
            return Some(reference.as_str());
        }
    }
    for name in &config.canonical_trunk_names {
        if let Some((reference, ..)) = resolved
            .iter()
            .find(|(r, is_remote, _)| *is_remote && r.ends_with(&format!("/{name}")))
        {
            return Some(reference.as_str());
        }
    }
    if let Some(current) = current_branch {
        if let Some((reference, ..)) = resolved.iter().find(|(r, is_remote, _)| !is_remote && r == current) {
            return Some(reference.as_str());
        }
    }
    resolved.first().map(|(r, ..)| r.as_str())
}

/// Compute the fork point ("base sha") for a branch, given the aggregated
/// commit graph and the set of shas other branches currently point at.
fn compute_base_sha(
    head_sha: &CommitRef,
    own_reference: &str,
    commits: &HashMap<CommitRef, Commit>,
    head_index: &HashMap<CommitRef, HashSet<String>>,
    trunk_lineage: &HashSet<CommitRef>,
) -> CommitRef {
    let mut current = head_sha.clone();
    let mut last_seen = head_sha.clone();
    loop {
        let Some(commit) = commits.get(&current) else {
            return last_seen;
        };
        let Some(parent) = &commit.parent_sha else {
            return current;
        };
        let pointed_by_other = head_index
            .get(parent)
            .map(|refs| refs.iter().any(|r| r != own_reference))
            .unwrap_or(false);
        if pointed_by_other || trunk_lineage.contains(parent) {
            return parent.clone();
        }
        last_seen = current.clone();
        current = parent.clone();
    }
}

/// Walk parent pointers from `head_sha` to the earliest reachable ancestor
/// (the commit with no known parent, i.e. a root commit or the tip of a
/// shallow clone). Used for trunk, which has no fork point of its own to
/// stop at.
fn earliest_reachable(head_sha: &CommitRef, commits: &HashMap<CommitRef, Commit>) -> CommitRef {
    let mut current = head_sha.clone();
    loop {
        match commits.get(&current).and_then(|c| c.parent_sha.clone()) {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// Walk from `head_sha` to (but excluding) `base_sha`, collecting owned
/// commit shas head-first.
fn compute_owned_commits(
    head_sha: &CommitRef,
    base_sha: &CommitRef,
    commits: &HashMap<CommitRef, Commit>,
) -> Vec<CommitRef> {
    let mut owned = Vec::new();
    let mut current = head_sha.clone();
    loop {
        if &current == base_sha {
            break;
        }
        owned.push(current.clone());
        let Some(commit) = commits.get(&current) else {
            break;
        };
        let Some(parent) = &commit.parent_sha else {
            break;
        };
        current = parent.clone();
    }
    owned
}

/// Build a [`Repo`] snapshot from live `GitBackend` output.
#[instrument(skip(git, config))]
pub fn build_repo(
    git: &dyn GitBackend,
    repo_path: &std::path::Path,
    config: &EngineConfig,
) -> EngineResult<Repo> {
    let refs = enumerate_refs(git, repo_path);
    debug!(count = refs.len(), "enumerated refs");

    let mut resolved: Vec<(String, bool, CommitRef)> = Vec::new();
    for raw in refs {
        if let Some(sha) = git.resolve_ref(repo_path, &raw.reference) {
            resolved.push((raw.reference, raw.is_remote, sha));
        }
    }

    let current_branch = git.current_branch(repo_path);
    let trunk_reference = discover_trunk(&resolved, config, current_branch.as_deref()).map(str::to_string);

    let mut commits: HashMap<CommitRef, Commit> = HashMap::new();
    for (reference, _, _) in &resolved {
        for commit in git.log(repo_path, reference, Some(config.max_log_depth)) {
            commits
                .entry(commit.sha.clone())
                .and_modify(|existing| {
                    let mut merged: HashSet<CommitRef> =
                        existing.children_sha.iter().cloned().collect();
                    merged.extend(commit.children_sha.iter().cloned());
                    existing.children_sha = merged.into_iter().collect();
                })
                .or_insert(commit);
        }
    }

    let mut head_index: HashMap<CommitRef, HashSet<String>> = HashMap::new();
    for (reference, _, sha) in &resolved {
        head_index.entry(sha.clone()).or_default().insert(reference.clone());
    }

    let trunk_lineage: HashSet<CommitRef> = match &trunk_reference {
        Some(trunk_ref) => {
            let trunk_sha = resolved
                .iter()
                .find(|(r, ..)| r == trunk_ref)
                .map(|(_, _, sha)| sha.clone());
            let mut lineage = HashSet::new();
            if let Some(mut current) = trunk_sha {
                loop {
                    lineage.insert(current.clone());
                    match commits.get(&current).and_then(|c| c.parent_sha.clone()) {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
            }
            lineage
        }
        None => HashSet::new(),
    };

    let mut branches = Vec::new();
    for (reference, is_remote, head_sha) in &resolved {
        let is_trunk = trunk_reference.as_deref() == Some(reference.as_str());
        let base_sha = if is_trunk {
            // Trunk has no fork point of its own; its base is its own root.
            earliest_reachable(head_sha, &commits)
        } else {
            compute_base_sha(head_sha, reference, &commits, &head_index, &trunk_lineage)
        };
        let owned_commit_shas = compute_owned_commits(head_sha, &base_sha, &commits);
        branches.push(Branch {
            reference: reference.clone(),
            is_trunk,
            is_remote: *is_remote,
            head_sha: head_sha.clone(),
            base_sha,
            owned_commit_shas,
        });
    }

    let working_tree_status = git.working_tree_status(repo_path);

    Ok(Repo {
        path: repo_path.to_path_buf(),
        commits,
        branches,
        working_tree_status,
    })
}
