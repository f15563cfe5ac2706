//! Trait definitions with mockall annotations for testing
//!
//! Seams for dependency injection into the update coordinator.

use crate::error::DaemonResult;

/// Code update abstraction
///
/// The production implementation fetches the git remote and hard-resets
/// the working tree. A failed update must leave the running child
/// untouched, so the coordinator checks this before any teardown.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Updater: Send + Sync {
    /// Bring the local checkout up to date with the remote
    async fn update(&self) -> DaemonResult<()>;
}
