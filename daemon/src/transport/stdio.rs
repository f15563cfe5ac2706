//! Embedded-stream transport
//!
//! For children that cannot expose an HTTP port, the trigger travels
//! inside the child's own stdout and the response returns over its
//! stdin. A trigger line is the literal prefix token followed by the
//! raw signed-payload JSON and the signature text, all on one line; any
//! other line is ordinary application output and passes through to the
//! daemon's stdout unmodified. After the child has acted on a success
//! response it emits the completion sentinel on a line of its own.
//!
//! One cycle covers a (re)start of the child up to the next fully
//! landed trigger: Launching -> Scanning -> AwaitingAck ->
//! CycleComplete. A scanner task consumes stdout line by line while the
//! main flow waits through two named phases, first for an accepted
//! trigger, then for the sentinel. Neither wait has a timeout: a silent
//! child stalls the supervisor, by design.

use std::sync::Arc;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use shared::StreamResponse;

use crate::coordinator::UpdateCoordinator;
use crate::error::{DaemonError, DaemonResult};
use crate::services::{ChildIo, StdioMode};
use crate::traits::Updater;
use crate::validator::PayloadValidator;

/// Trigger line shape: prefix token, JSON payload, signature text
pub const TRIGGER_PATTERN: &str = r"redeploy(\{.*\})(.*)";

/// Emitted by the child once it has processed a success response
pub const SENTINEL: &str = "redeploy-success";

/// Handoffs from the scanner task to the cycle's two wait phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEvent {
    TriggerAccepted,
    SentinelSeen,
}

/// The stream half of one running child, reusable across cycles when an
/// update fails and the same child keeps serving
struct CycleIo {
    lines: Lines<BufReader<ChildStdout>>,
    stdin: ChildStdin,
}

impl From<ChildIo> for CycleIo {
    fn from(io: ChildIo) -> Self {
        Self {
            lines: BufReader::new(io.stdout).lines(),
            stdin: io.stdin,
        }
    }
}

enum CycleOutcome {
    /// Accepted trigger and sentinel both observed; the handles come
    /// back so a failed update can keep scanning the same child
    Complete(CycleIo),
    /// The child's stdout ended before the handshake finished
    ChildExited,
}

pub struct EmbeddedStreamTransport<U: Updater> {
    validator: Arc<PayloadValidator>,
    coordinator: UpdateCoordinator<U>,
    pattern: Regex,
}

impl<U: Updater> EmbeddedStreamTransport<U> {
    pub fn new(
        validator: Arc<PayloadValidator>,
        coordinator: UpdateCoordinator<U>,
    ) -> DaemonResult<Self> {
        let pattern = Regex::new(TRIGGER_PATTERN)
            .map_err(|e| DaemonError::protocol(format!("Invalid trigger pattern: {e}")))?;
        Ok(Self {
            validator,
            coordinator,
            pattern,
        })
    }

    /// Drive launch/scan/restart cycles until the daemon is stopped
    pub async fn run(mut self) -> DaemonResult<()> {
        // Carries the live stream across a failed update, when the old
        // child stays up and must be rescanned instead of relaunched.
        let mut pending: Option<CycleIo> = None;

        loop {
            let io = match pending.take() {
                Some(io) => io,
                None => {
                    // Launching
                    let child = match self.coordinator.launch(StdioMode::Piped) {
                        Ok(child) => child,
                        Err(e) => {
                            error!("Failed to start child process: {}", e);
                            continue;
                        }
                    };
                    info!("Program has been started.");
                    CycleIo::from(child.take_io()?)
                }
            };

            match run_cycle(io, &self.validator, &self.pattern).await? {
                CycleOutcome::Complete(io) => {
                    info!("Request validation successful, restarting program");
                    match self
                        .coordinator
                        .run_update_and_restart(StdioMode::Piped)
                        .await
                    {
                        // Slot left empty; the next iteration launches.
                        Ok(()) => {}
                        Err(e) => {
                            error!("{}", e);
                            // Old child untouched: rescan its stream.
                            pending = Some(io);
                        }
                    }
                }
                CycleOutcome::ChildExited => {
                    warn!("Child process exited, relaunching");
                    if let Some(mut old) = self.coordinator.take_current() {
                        if let Err(e) = self.coordinator.supervisor().terminate(&mut old).await {
                            warn!("Failed to reap exited child: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// One Scanning + AwaitingAck pass over a running child's stream
async fn run_cycle(
    io: CycleIo,
    validator: &Arc<PayloadValidator>,
    pattern: &Regex,
) -> DaemonResult<CycleOutcome> {
    let (events_tx, mut events) = mpsc::channel(1);
    let scanner = tokio::spawn(scan_stdout(
        io,
        events_tx,
        Arc::clone(validator),
        pattern.clone(),
    ));

    // Phase one: wait for a trigger to validate. Rejected triggers are
    // answered by the scanner and do not advance the cycle.
    loop {
        match events.recv().await {
            Some(CycleEvent::TriggerAccepted) => break,
            Some(CycleEvent::SentinelSeen) => {
                // The child must not ack before an accepted trigger;
                // what follows is undefined beyond never completing
                // this cycle.
                warn!("Completion sentinel seen before any accepted trigger");
            }
            None => return reap_scanner(scanner).await,
        }
    }

    // Phase two: wait for the child to ack the success response.
    loop {
        match events.recv().await {
            Some(CycleEvent::SentinelSeen) => break,
            Some(CycleEvent::TriggerAccepted) => {
                warn!("Another trigger accepted while awaiting the ack");
            }
            None => return reap_scanner(scanner).await,
        }
    }

    let io = scanner
        .await
        .map_err(|e| DaemonError::protocol(format!("Scanner task failed: {e}")))?;
    Ok(CycleOutcome::Complete(io))
}

/// The scanner stopped without a completed handshake: the stream ended
async fn reap_scanner(scanner: JoinHandle<CycleIo>) -> DaemonResult<CycleOutcome> {
    let _ = scanner.await;
    Ok(CycleOutcome::ChildExited)
}

/// Scanner task: consumes stdout line by line until the sentinel or end
/// of stream, answering every trigger line on the child's stdin
async fn scan_stdout(
    mut io: CycleIo,
    events: mpsc::Sender<CycleEvent>,
    validator: Arc<PayloadValidator>,
    pattern: Regex,
) -> CycleIo {
    loop {
        let line = match io.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        if line == SENTINEL {
            let _ = events.send(CycleEvent::SentinelSeen).await;
            break;
        }

        let Some((payload, signature)) = match_trigger(&pattern, &line) else {
            // Ordinary application output passes through unmodified.
            println!("{line}");
            continue;
        };

        info!("Received restart request from application, processing...");
        let outcome = validator.validate(signature, payload.as_bytes());

        if outcome.is_accepted() {
            // Handoff first, then the response the child is waiting on.
            let _ = events.send(CycleEvent::TriggerAccepted).await;
        } else {
            warn!("Request validation failed, restart will not be triggered");
        }

        write_response(&mut io.stdin, &StreamResponse::from(&outcome)).await;
    }

    io
}

fn match_trigger<'a>(pattern: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
    let captures = pattern.captures(line)?;
    let payload = captures.get(1)?.as_str();
    let signature = captures.get(2)?.as_str();
    Some((payload, signature))
}

/// Write one newline-terminated response JSON; failures are logged and
/// scanning continues
async fn write_response(stdin: &mut ChildStdin, response: &StreamResponse) {
    let mut json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            error!("Problems marshaling response JSON: {}", e);
            return;
        }
    };
    json.push('\n');

    let written = async {
        stdin.write_all(json.as_bytes()).await?;
        stdin.flush().await
    }
    .await;

    if let Err(e) = written {
        error!("Problems writing to stdin of subprocess: {}", e);
    }
}
