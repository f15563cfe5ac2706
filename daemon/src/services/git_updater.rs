//! Git-backed update action
//!
//! Fetches the remote and hard-resets the working tree to the tracked
//! branch. Each step is a spawned `git` process; a non-zero exit maps to
//! an `Update` error naming the step that failed.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DaemonError, DaemonResult};
use crate::traits::Updater;

const DEFAULT_REMOTE_REF: &str = "origin/main";

pub struct GitUpdater {
    remote_ref: String,
    workdir: Option<PathBuf>,
}

impl GitUpdater {
    pub fn new() -> Self {
        Self {
            remote_ref: DEFAULT_REMOTE_REF.to_string(),
            workdir: None,
        }
    }

    /// Track a different remote ref than origin/main (fluent API)
    pub fn with_remote_ref(mut self, remote_ref: impl Into<String>) -> Self {
        self.remote_ref = remote_ref.into();
        self
    }

    /// Run git in a directory other than the daemon's own (fluent API)
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    async fn run_git(&self, args: &[&str]) -> DaemonResult<()> {
        let step = format!("git {}", args.join(" "));
        debug!("Running '{}'", step);

        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .await
            .map_err(|_| DaemonError::Update { step: step.clone() })?;

        if !status.success() {
            return Err(DaemonError::Update { step });
        }
        Ok(())
    }
}

impl Default for GitUpdater {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Updater for GitUpdater {
    async fn update(&self) -> DaemonResult<()> {
        self.run_git(&["fetch", "--all"]).await?;
        self.run_git(&["reset", "--hard", &self.remote_ref]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_fails_outside_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let updater = GitUpdater::new().with_workdir(dir.path());

        let err = updater.update().await.unwrap_err();
        assert!(matches!(err, DaemonError::Update { .. }));
        assert!(err.to_string().contains("git fetch --all"));
    }
}
