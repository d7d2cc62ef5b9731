//! The repository model: commits, branches, and the builder that derives
//! them from live `GitBackend` output.

mod branch;
mod builder;
mod commit;
mod repo;

pub use branch::Branch;
pub use builder::build_repo;
pub use commit::Commit;
pub use repo::Repo;
