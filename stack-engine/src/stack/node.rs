//! [`StackNode`]: a subtree-of-branches snapshot.

use crate::model::Repo;
use crate::oid::CommitRef;

/// A snapshot of one branch and its descendant branches, taken at
/// intent-submission time. Does not reference live `Branch` objects, so it
/// remains valid even after the repository model is rebuilt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackNode {
    /// The branch's ref name.
    pub branch: String,
    /// The branch's head commit at snapshot time.
    pub head_sha: CommitRef,
    /// The branch's fork point at snapshot time.
    pub base_sha: CommitRef,
    /// Direct child branches: those whose base is this node's head.
    pub children: Vec<StackNode>,
}

impl StackNode {
    /// Walk this node and every descendant, depth-first, pre-order.
    pub fn walk_preorder(&self) -> Vec<&StackNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk_preorder());
        }
        out
    }
}

/// Build a [`StackNode`] snapshot rooted at `reference`, including every
/// descendant branch (a branch whose `base_sha` equals an ancestor node's
/// `head_sha`) recursively.
pub fn build_stack_node(repo: &Repo, reference: &str) -> Option<StackNode> {
    let branch = repo.branch(reference)?;
    Some(build_stack_node_from(repo, branch.head_sha.clone(), reference.to_string(), branch.base_sha.clone()))
}

fn build_stack_node_from(repo: &Repo, head_sha: CommitRef, branch: String, base_sha: CommitRef) -> StackNode {
    let children = repo
        .branches
        .iter()
        .filter(|b| !b.is_trunk && !b.is_remote && b.base_sha == head_sha && b.reference != branch)
        .map(|child| build_stack_node_from(repo, child.head_sha.clone(), child.reference.clone(), child.base_sha.clone()))
        .collect();
    StackNode {
        branch,
        head_sha,
        base_sha,
        children,
    }
}
