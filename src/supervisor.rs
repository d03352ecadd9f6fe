//! Encoder process supervision.
//!
//! The encoder writes `-progress` key/value pairs to stdout and errors to stderr.
//! Frame counters from stdout drive the progress estimate; the tail of stderr is
//! kept for failure reports.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use crate::config::TranscoderConfig;
use crate::error::{Result, TimelapseError};
use crate::job::{CancelToken, JobEvent, Stage};
use crate::progress::{parse_frame, ProgressTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub assumed_total_frames: u64,
    pub progress_interval: Duration,
    pub stderr_tail_lines: usize,
}

impl From<&TranscoderConfig> for SupervisorSettings {
    fn from(config: &TranscoderConfig) -> Self {
        Self {
            assumed_total_frames: config.assumed_total_frames,
            progress_interval: config.progress_interval(),
            stderr_tail_lines: config.stderr_tail_lines,
        }
    }
}

enum Step {
    Line(std::io::Result<Option<String>>),
    Cancel,
    Exit(std::io::Result<ExitStatus>),
}

/// Runs one encoder process to completion. Never retries.
#[derive(Debug)]
pub struct Supervisor {
    settings: SupervisorSettings,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings) -> Self {
        Self {
            settings,
            state: SupervisorState::Idle,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn advance(&mut self, next: SupervisorState) {
        tracing::debug!(from = ?self.state, to = ?next, "Supervisor state change");
        self.state = next;
    }

    /// The encoder can no longer be observed; the job ends here.
    fn lost_encoder(&mut self, e: std::io::Error) -> TimelapseError {
        self.advance(SupervisorState::Failed);
        tracing::error!(error = %e, "Lost track of the encoder process");
        TimelapseError::Io(e)
    }

    /// Spawn `program` with `args` and wait for it, emitting progress on `events`.
    /// Resolves to `output` on a zero exit status.
    pub async fn run(
        &mut self,
        program: &Path,
        args: &[String],
        output: &Path,
        cancel: &CancelToken,
        events: &UnboundedSender<JobEvent>,
    ) -> Result<PathBuf> {
        self.advance(SupervisorState::Starting);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.advance(SupervisorState::Failed);
                tracing::error!(
                    program = %program.display(),
                    error = %e,
                    "Failed to spawn encoder"
                );
                return Err(TimelapseError::EncoderSpawnFailure(e.to_string()));
            }
        };

        tracing::info!(pid = ?child.id(), "Encoder started");

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(collect_tail(stderr, self.settings.stderr_tail_lines).in_current_span())
        });

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                self.advance(SupervisorState::Failed);
                tracing::error!("Encoder stdout was not captured");
                return Err(TimelapseError::EncoderSpawnFailure(
                    "encoder stdout was not captured".to_string(),
                ));
            }
        };
        let mut lines = BufReader::new(stdout).lines();
        let mut reading = true;

        let mut tracker = ProgressTracker::new(
            self.settings.assumed_total_frames,
            self.settings.progress_interval,
            Instant::now(),
        );

        let status = loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancel,
                line = lines.next_line(), if reading => Step::Line(line),
                status = child.wait() => Step::Exit(status),
            };

            match step {
                Step::Line(Ok(Some(line))) => self.on_line(&line, &mut tracker, events),
                Step::Line(Ok(None)) => reading = false,
                Step::Line(Err(e)) => {
                    tracing::warn!(error = %e, "Stopped reading encoder progress");
                    reading = false;
                }
                Step::Cancel => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    self.advance(SupervisorState::Failed);
                    tracing::info!(
                        last_percent = tracker.last_percent(),
                        "Encoder terminated on cancel"
                    );
                    return Err(TimelapseError::Cancelled);
                }
                Step::Exit(Ok(status)) => break status,
                Step::Exit(Err(e)) => return Err(self.lost_encoder(e)),
            }
        };

        // Whatever the encoder wrote before exiting is still buffered in the pipe
        if reading {
            while let Ok(Some(line)) = lines.next_line().await {
                self.on_line(&line, &mut tracker, events);
            }
        }

        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        // A terminal Ctrl+C reaches the encoder too, which may exit before we kill it
        if !status.success() && cancel.is_cancelled() {
            self.advance(SupervisorState::Failed);
            return Err(TimelapseError::Cancelled);
        }

        if status.success() {
            self.advance(SupervisorState::Completed);
            let percent = tracker.complete();
            let _ = events.send(JobEvent::Progress {
                percent,
                stage: Stage::Finalizing,
            });
            tracing::info!(output = %output.display(), "Encoder finished");
            Ok(output.to_path_buf())
        } else {
            self.advance(SupervisorState::Failed);
            tracing::error!(code = ?status.code(), stderr = %stderr_tail, "Encoder failed");
            Err(TimelapseError::EncoderExitFailure {
                code: status.code(),
                stderr_tail,
            })
        }
    }

    fn on_line(
        &mut self,
        line: &str,
        tracker: &mut ProgressTracker,
        events: &UnboundedSender<JobEvent>,
    ) {
        if self.state == SupervisorState::Starting {
            self.advance(SupervisorState::Running);
        }
        if let Some(frame) = parse_frame(line) {
            if let Some(percent) = tracker.observe(frame, Instant::now()) {
                let _ = events.send(JobEvent::Progress {
                    percent,
                    stage: Stage::Encoding,
                });
            }
        }
    }
}

/// Read `reader` to the end, keeping the last `limit` non-empty lines.
async fn collect_tail<R>(reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(limit);

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        tracing::debug!(target: "timelapso::encoder", "{}", line);
        if tail.len() == limit {
            tail.pop_front();
        }
        if limit > 0 {
            tail.push_back(line);
        }
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}
