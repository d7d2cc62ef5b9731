//! The UI projector: derives a stack-shaped view from a repository model,
//! without mutating it.

mod projector;
mod types;

pub use projector::{build_full_ui_state, build_projected_stack, build_ui_stack};
pub use types::{RebaseSessionView, RebaseStatus, UiBranch, UiCommit, UiStack, UiStateView};
