//! Layered engine configuration.

use tracing::instrument;

use crate::git::GitBackend;

const DEFAULT_MAX_LOG_DEPTH: usize = 1000;
const DEFAULT_UPDATE_RETRY_LIMIT: u32 = 3;

fn default_canonical_trunk_names() -> Vec<String> {
    vec!["main".to_string(), "master".to_string(), "develop".to_string()]
}

/// Resolved engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum depth to walk when aggregating a branch's commit log.
    pub max_log_depth: usize,
    /// Branch names checked, in order, when no other trunk signal exists.
    pub canonical_trunk_names: Vec<String>,
    /// Number of retries `update_session_with_retry` attempts on a write
    /// conflict before giving up.
    pub update_retry_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_log_depth: DEFAULT_MAX_LOG_DEPTH,
            canonical_trunk_names: default_canonical_trunk_names(),
            update_retry_limit: DEFAULT_UPDATE_RETRY_LIMIT,
        }
    }
}

/// Explicit, caller-supplied overrides, applied with highest priority
/// during [`EngineConfig::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfigOverrides {
    /// Overrides `max_log_depth` when present.
    pub max_log_depth: Option<usize>,
    /// Overrides `canonical_trunk_names` when present.
    pub canonical_trunk_names: Option<Vec<String>>,
    /// Overrides `update_retry_limit` when present.
    pub update_retry_limit: Option<u32>,
}

impl EngineConfig {
    /// Resolve configuration for `repo_path`, layering explicit overrides
    /// over repo-local Git config (`branchless-stack.core.*`) over hard
    /// defaults.
    #[instrument(skip(git, overrides))]
    pub fn resolve(
        git: &dyn GitBackend,
        repo_path: &std::path::Path,
        overrides: EngineConfigOverrides,
    ) -> Self {
        let mut config = Self::default();

        if let Some(value) = read_config_usize(git, repo_path, "branchless-stack.core.maxLogDepth") {
            config.max_log_depth = value;
        }
        if let Some(names) = read_config_list(git, repo_path, "branchless-stack.core.canonicalTrunkNames") {
            config.canonical_trunk_names = names;
        }
        if let Some(value) = read_config_u32(git, repo_path, "branchless-stack.core.updateRetryLimit") {
            config.update_retry_limit = value;
        }

        if let Some(value) = overrides.max_log_depth {
            config.max_log_depth = value;
        }
        if let Some(names) = overrides.canonical_trunk_names {
            config.canonical_trunk_names = names;
        }
        if let Some(value) = overrides.update_retry_limit {
            config.update_retry_limit = value;
        }

        config
    }
}

fn read_config_usize(git: &dyn GitBackend, repo_path: &std::path::Path, key: &str) -> Option<usize> {
    git.read_config(repo_path, key).and_then(|v| v.trim().parse().ok())
}

fn read_config_u32(git: &dyn GitBackend, repo_path: &std::path::Path, key: &str) -> Option<u32> {
    git.read_config(repo_path, key).and_then(|v| v.trim().parse().ok())
}

fn read_config_list(git: &dyn GitBackend, repo_path: &std::path::Path, key: &str) -> Option<Vec<String>> {
    git.read_config(repo_path, key).map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_log_depth, DEFAULT_MAX_LOG_DEPTH);
        assert_eq!(config.canonical_trunk_names, vec!["main", "master", "develop"]);
        assert_eq!(config.update_retry_limit, DEFAULT_UPDATE_RETRY_LIMIT);
    }

    #[test]
    fn test_overrides_take_priority() {
        let repo = TestRepo::new();
        let overrides = EngineConfigOverrides {
            max_log_depth: Some(42),
            ..Default::default()
        };
        let config = EngineConfig::resolve(repo.backend(), repo.path(), overrides);
        assert_eq!(config.max_log_depth, 42);
        assert_eq!(config.update_retry_limit, DEFAULT_UPDATE_RETRY_LIMIT);
    }

    #[test]
    fn test_repo_local_config_beats_defaults() {
        let repo = TestRepo::new();
        std::process::Command::new("git")
            .arg("-C")
            .arg(repo.path())
            .args(["config", "branchless-stack.core.maxLogDepth", "50"])
            .status()
            .unwrap();
        let config = EngineConfig::resolve(repo.backend(), repo.path(), EngineConfigOverrides::default());
        assert_eq!(config.max_log_depth, 50);
    }
}
