//! Restart-and-update coordination
//!
//! The serialization point between the transports and the child
//! process: one coordinator owns the single child slot, and at most one
//! kill → update → relaunch sequence is ever in flight. The webhook
//! transport guards the coordinator with a mutex held for the whole
//! sequence; the embedded-stream transport is single-cycle by
//! construction.

use tracing::{info, warn};

use crate::error::DaemonResult;
use crate::services::{ManagedChild, ProcessSupervisor, StdioMode};
use crate::traits::Updater;

pub struct UpdateCoordinator<U: Updater> {
    updater: U,
    supervisor: ProcessSupervisor,
    current: Option<ManagedChild>,
}

impl<U: Updater> UpdateCoordinator<U> {
    pub fn new(updater: U, supervisor: ProcessSupervisor) -> Self {
        Self {
            updater,
            supervisor,
            current: None,
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    /// Spawn the child into an empty slot
    ///
    /// The embedded path calls this at the top of every cycle; the
    /// webhook path calls it once at startup.
    pub fn launch(&mut self, mode: StdioMode) -> DaemonResult<&mut ManagedChild> {
        debug_assert!(self.current.is_none(), "launch over a live child");
        let child = self.supervisor.spawn(mode)?;
        Ok(self.current.insert(child))
    }

    pub fn current_mut(&mut self) -> Option<&mut ManagedChild> {
        self.current.as_mut()
    }

    pub fn has_child(&self) -> bool {
        self.current.is_some()
    }

    /// Remove the child from the slot without killing it
    pub fn take_current(&mut self) -> Option<ManagedChild> {
        self.current.take()
    }

    /// Run one full update-and-restart sequence
    ///
    /// Order matters: the update runs first, and its failure aborts the
    /// sequence with the old child untouched — the system keeps serving
    /// the old process rather than leaving nothing running. A kill
    /// failure is logged and overridden. In attached mode the
    /// replacement starts immediately; in piped mode the slot is left
    /// empty and the next cycle's launch performs the start.
    pub async fn run_update_and_restart(&mut self, mode: StdioMode) -> DaemonResult<()> {
        self.updater.update().await?;

        if let Some(mut old) = self.current.take() {
            if let Err(e) = self.supervisor.terminate(&mut old).await {
                warn!("Failed to kill child process: {}", e);
            }
        }

        if mode == StdioMode::Attached {
            let child = self.supervisor.spawn(mode)?;
            info!("Child process restarted (pid {:?})", child.id());
            self.current = Some(child);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaemonError;
    use crate::services::ChildSpec;
    use crate::traits::MockUpdater;

    fn supervisor(argv: &[&str]) -> ProcessSupervisor {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        ProcessSupervisor::new(ChildSpec::from_argv(&argv).unwrap())
    }

    #[tokio::test]
    async fn failed_update_leaves_running_child_untouched() {
        let mut updater = MockUpdater::new();
        updater.expect_update().times(1).returning(|| {
            Err(DaemonError::Update {
                step: "git fetch --all".to_string(),
            })
        });

        let mut coordinator = UpdateCoordinator::new(updater, supervisor(&["sh", "-c", "sleep 30"]));
        coordinator.launch(StdioMode::Piped).unwrap();
        let old_pid = coordinator.current_mut().unwrap().id();

        let result = coordinator.run_update_and_restart(StdioMode::Piped).await;
        assert!(result.is_err());

        let child = coordinator.current_mut().expect("old child must survive");
        assert_eq!(child.id(), old_pid);
        assert!(child.is_running());

        let mut old = coordinator.take_current().unwrap();
        coordinator.supervisor().terminate(&mut old).await.unwrap();
    }

    #[tokio::test]
    async fn attached_restart_replaces_the_child_identity() {
        let mut updater = MockUpdater::new();
        updater.expect_update().times(1).returning(|| Ok(()));

        let mut coordinator =
            UpdateCoordinator::new(updater, supervisor(&["sh", "-c", "sleep 30"]));
        coordinator.launch(StdioMode::Piped).unwrap();
        let old_pid = coordinator.current_mut().unwrap().id();

        coordinator
            .run_update_and_restart(StdioMode::Attached)
            .await
            .unwrap();

        let replacement = coordinator.current_mut().unwrap();
        assert_ne!(replacement.id(), old_pid);

        let mut replacement = coordinator.take_current().unwrap();
        coordinator
            .supervisor()
            .terminate(&mut replacement)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn piped_restart_defers_the_next_launch() {
        let mut updater = MockUpdater::new();
        updater.expect_update().times(1).returning(|| Ok(()));

        let mut coordinator =
            UpdateCoordinator::new(updater, supervisor(&["sh", "-c", "sleep 30"]));
        coordinator.launch(StdioMode::Piped).unwrap();

        coordinator
            .run_update_and_restart(StdioMode::Piped)
            .await
            .unwrap();

        // Slot stays empty until the next cycle's Launching state.
        assert!(!coordinator.has_child());
    }
}
