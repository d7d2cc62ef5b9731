//! Commit object identifiers.

use std::fmt::{self, Display};
use std::str::FromStr;

/// The SHA of a Git commit, as a 40-character lowercase hex string.
///
/// This is an opaque value: the engine never interprets its bytes, only
/// compares it for equality and uses it as a map key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct CommitRef(String);

/// Error produced when a string is not a well-formed 40-hex-character SHA.
#[derive(Clone, Debug, thiserror::Error)]
#[error("not a valid 40-character hex commit SHA: {0:?}")]
pub struct InvalidCommitRef(String);

impl CommitRef {
    /// Construct a `CommitRef` from a string, validating that it looks like a
    /// full Git object ID (40 lowercase hex characters).
    pub fn new(sha: impl Into<String>) -> Result<Self, InvalidCommitRef> {
        let sha = sha.into();
        if sha.len() == 40 && sha.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(sha.to_ascii_lowercase()))
        } else {
            Err(InvalidCommitRef(sha))
        }
    }

    /// Return the SHA as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitRef({})", self.0)
    }
}

impl FromStr for CommitRef {
    type Err = InvalidCommitRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<CommitRef> for String {
    fn from(value: CommitRef) -> Self {
        value.0
    }
}
