//! Service implementations
//!
//! Production implementations of process supervision and the git-backed
//! update action.

pub mod git_updater;
pub mod process_manager;

pub use git_updater::GitUpdater;
pub use process_manager::{ChildIo, ChildSpec, ChildState, ManagedChild, ProcessSupervisor, StdioMode};
