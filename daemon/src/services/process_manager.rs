//! Child process supervision
//!
//! Owns the launch arguments and the lifecycle of the single supervised
//! child. A child is never restarted in place: every relaunch builds a
//! fresh command from the original argv and produces a new handle, so a
//! stale handle can never be reused across a restart boundary.

use std::process::Stdio;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::{DaemonError, DaemonResult};

/// How the child's stdio is wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Child shares the daemon's own stdin/stdout/stderr (webhook mode)
    Attached,
    /// Child's stdout/stdin are pipes the daemon drives; stderr still
    /// goes to the daemon's own stderr (embedded-stream mode)
    Piped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    NotStarted,
    Running,
    Terminating,
    Terminated,
}

/// The supervised program: a command name plus its arguments, kept
/// around so every restart rebuilds the same invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSpec {
    program: String,
    args: Vec<String>,
}

impl ChildSpec {
    /// Build a spec from the daemon's trailing argv
    pub fn from_argv(argv: &[String]) -> DaemonResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| DaemonError::config("No command to execute was given"))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Piped stdio handles for one running child, handed out exactly once
pub struct ChildIo {
    pub stdout: ChildStdout,
    pub stdin: ChildStdin,
}

/// A started child process with its lifecycle state
#[derive(Debug)]
pub struct ManagedChild {
    child: Child,
    state: ChildState,
    mode: StdioMode,
}

impl ManagedChild {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn state(&self) -> ChildState {
        self.state
    }

    pub fn mode(&self) -> StdioMode {
        self.mode
    }

    /// Whether the process is still alive, without blocking
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Take the piped stdout/stdin. Fails for attached children and on
    /// a second call for the same child.
    pub fn take_io(&mut self) -> DaemonResult<ChildIo> {
        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| DaemonError::protocol("Child stdout is not piped".to_string()))?;
        let stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| DaemonError::protocol("Child stdin is not piped".to_string()))?;
        Ok(ChildIo { stdout, stdin })
    }
}

/// Spawns, rebuilds, and terminates the supervised child
pub struct ProcessSupervisor {
    spec: ChildSpec,
}

impl ProcessSupervisor {
    pub fn new(spec: ChildSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ChildSpec {
        &self.spec
    }

    /// Construct the next command descriptor without starting it
    pub fn rebuild(&self, mode: StdioMode) -> Command {
        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args);

        match mode {
            StdioMode::Attached => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioMode::Piped => {
                cmd.stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit());
            }
        }
        cmd
    }

    /// Rebuild and start the child
    pub fn spawn(&self, mode: StdioMode) -> DaemonResult<ManagedChild> {
        let child = self
            .rebuild(mode)
            .spawn()
            .map_err(|source| DaemonError::ProcessStart {
                program: self.spec.program.clone(),
                source,
            })?;

        debug!(
            "Started child process '{}' (pid {:?})",
            self.spec.program,
            child.id()
        );

        Ok(ManagedChild {
            child,
            state: ChildState::Running,
            mode,
        })
    }

    /// Forcefully kill the child and wait for it to exit
    ///
    /// Failure here is recoverable: the coordinator logs it and starts
    /// the replacement anyway, since a lingering old process is a lesser
    /// failure than refusing to deploy.
    pub async fn terminate(&self, child: &mut ManagedChild) -> DaemonResult<()> {
        child.state = ChildState::Terminating;
        child
            .child
            .kill()
            .await
            .map_err(|e| DaemonError::ProcessTerminate {
                message: e.to_string(),
            })?;
        child.state = ChildState::Terminated;
        debug!("Child process terminated");
        Ok(())
    }
}
