//! Stack snapshots and rebase intents.

mod intent;
mod node;

pub use intent::{RebaseIntent, RebaseTarget};
pub use node::{build_stack_node, StackNode};
