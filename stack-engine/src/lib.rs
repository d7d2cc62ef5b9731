//! Coordination engine for stacked-diff rebase workflows.
//!
//! This crate is the non-UI core of a desktop Git tool built around
//! "stacked diffs": a tree of short, dependent branches rooted in trunk.
//! It owns five coupled subsystems — the repository model builder, the
//! rebase planner, the pure rebase state machine, the rebase executor, and
//! the UI projector — plus the ambient configuration, logging, error, and
//! test-harness scaffolding they all sit on. It has no window, no
//! drag-and-drop surface, and no forge integration; those are host
//! concerns that sit behind [`engine::Engine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod git;
pub mod model;
pub mod oid;
pub mod plan;
pub mod session;
pub mod stack;
pub mod testing;
pub mod ui;

pub use config::{EngineConfig, EngineConfigOverrides};
pub use engine::Engine;
pub use error::{EngineError, EngineResult, GitError};
