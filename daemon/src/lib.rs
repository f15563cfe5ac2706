//! Redeploy daemon library
//!
//! This library implements a self-updating process supervisor: it runs a
//! user program as a child process, authenticates "redeploy" triggers
//! arriving either over HTTP or embedded in the child's own stdout, and
//! on a valid trigger pulls the latest code from the git remote, kills
//! the child, and relaunches it.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod services;
pub mod traits;
pub mod transport;
pub mod validator;

// Re-export commonly used types
pub use coordinator::UpdateCoordinator;
pub use error::{DaemonError, DaemonResult};
pub use services::{ChildSpec, GitUpdater, ManagedChild, ProcessSupervisor, StdioMode};
pub use traits::Updater;
pub use validator::PayloadValidator;
