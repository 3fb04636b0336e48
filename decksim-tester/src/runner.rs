//! Runs a single trial to completion under a deadline.
//!
//! Two execution modes share one surface. In-process mode steps an engine
//! trial on the calling thread and is what the test suite leans on. Isolated
//! mode spawns a worker process per trial so an engine hang or crash costs
//! one trial, not the run; the parent enforces the deadline from outside and
//! reads progress off the worker's stdout.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use decksim_engine::{EngineError, SimulationEngine, TrialOutcome, TrialSetup};

use crate::progress::ProgressTracker;
use crate::protocol;

/// How often the parent polls a worker process for exit.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(25);
/// In-process snapshot publish throttle.
const PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("trial exceeded its {0:?} deadline")]
    Timeout(Duration),
    #[error("trial cancelled before completion")]
    Cancelled,
    #[error("trial execution failed: {reason}")]
    Execution {
        reason: String,
        stdout: String,
        stderr: String,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl TrialError {
    fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Deadline for one trial: the base applies to a two-party game and doubles
/// for each extra seat, since every added party stretches the table's total
/// turn count.
#[must_use]
pub fn scaled_timeout(base: Duration, parties: u32) -> Duration {
    let shift = parties.saturating_sub(2).min(16);
    base.saturating_mul(1u32 << shift)
}

pub struct TrialRunner {
    engine: Arc<dyn SimulationEngine>,
    tracker: Arc<ProgressTracker>,
    /// Seat name whose elimination stops live monitoring early.
    subject_identity: String,
    base_timeout: Duration,
    isolate: bool,
    worker_exe: PathBuf,
}

impl TrialRunner {
    #[must_use]
    pub fn new(
        engine: Arc<dyn SimulationEngine>,
        tracker: Arc<ProgressTracker>,
        subject_identity: impl Into<String>,
        base_timeout: Duration,
        isolate: bool,
        worker_exe: PathBuf,
    ) -> Self {
        Self {
            engine,
            tracker,
            subject_identity: subject_identity.into(),
            base_timeout,
            isolate,
            worker_exe,
        }
    }

    /// Run one trial. The tracker entry for `trial_id` is removed on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// [`TrialError::Timeout`] when the scaled deadline passes,
    /// [`TrialError::Cancelled`] when `cancel` is raised mid-trial, and
    /// [`TrialError::Execution`] or [`TrialError::Engine`] on failure.
    pub fn run_trial(
        &self,
        trial_id: u64,
        opponent_name: &str,
        setup: &TrialSetup,
        cancel: &AtomicBool,
    ) -> Result<TrialOutcome, TrialError> {
        let parties = u32::try_from(setup.parties()).unwrap_or(u32::MAX);
        let deadline = scaled_timeout(self.base_timeout, parties);
        let result = if self.isolate {
            self.run_isolated(trial_id, opponent_name, setup, parties, deadline, cancel)
        } else {
            self.run_in_process(trial_id, opponent_name, setup, parties, deadline, cancel)
        };
        self.tracker.remove(trial_id);
        result
    }

    fn run_in_process(
        &self,
        trial_id: u64,
        opponent_name: &str,
        setup: &TrialSetup,
        parties: u32,
        deadline: Duration,
        cancel: &AtomicBool,
    ) -> Result<TrialOutcome, TrialError> {
        let mut handle = self.engine.start_trial(setup)?;
        let started = Instant::now();
        let mut last_publish: Option<Instant> = None;
        let mut monitoring = true;

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(TrialError::Cancelled);
            }
            if started.elapsed() >= deadline {
                return Err(TrialError::Timeout(deadline));
            }

            if monitoring {
                if handle.seat_has_lost(&self.subject_identity) {
                    // The subject is out; the rest of the game is noise.
                    self.tracker.remove(trial_id);
                    monitoring = false;
                } else if last_publish.is_none_or(|t| t.elapsed() >= PUBLISH_INTERVAL) {
                    self.tracker
                        .publish(trial_id, opponent_name, parties, handle.snapshot());
                    last_publish = Some(Instant::now());
                }
            }

            if handle.step()? {
                return Ok(handle.outcome()?);
            }
        }
    }

    fn run_isolated(
        &self,
        trial_id: u64,
        opponent_name: &str,
        setup: &TrialSetup,
        parties: u32,
        deadline: Duration,
        cancel: &AtomicBool,
    ) -> Result<TrialOutcome, TrialError> {
        let decks = TempDeckFiles::write(trial_id, setup)?;

        let mut command = Command::new(&self.worker_exe);
        command
            .arg("--worker")
            .arg("--subject-file")
            .arg(&decks.paths[0])
            .arg("--worker-seed")
            .arg(setup.seed.to_string());
        for path in &decks.paths[1..] {
            command.arg("--opponent-file").arg(path);
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| TrialError::execution(format!("failed to spawn worker: {e}")))?;

        let started = Instant::now();
        let stdout_reader = self.spawn_stdout_reader(trial_id, opponent_name, parties, &mut child);
        let stderr_reader = spawn_stderr_reader(&mut child);

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| TrialError::execution(format!("failed to wait on worker: {e}")))?
            {
                break status;
            }
            if started.elapsed() >= deadline {
                kill_and_reap(&mut child);
                drain(stdout_reader, stderr_reader);
                return Err(TrialError::Timeout(deadline));
            }
            if cancel.load(Ordering::Relaxed) {
                kill_and_reap(&mut child);
                drain(stdout_reader, stderr_reader);
                return Err(TrialError::Cancelled);
            }
            thread::sleep(WORKER_POLL_INTERVAL);
        };

        let (stdout, stderr) = drain(stdout_reader, stderr_reader);
        if !status.success() {
            return Err(TrialError::Execution {
                reason: format!("worker exited with {status}"),
                stdout,
                stderr,
            });
        }
        protocol::extract_result(&stdout).ok_or(TrialError::Execution {
            reason: "worker produced no RESULT line".to_string(),
            stdout,
            stderr,
        })
    }

    /// Tail the worker's stdout: progress lines feed the tracker, everything
    /// is kept verbatim for result extraction and error reports.
    fn spawn_stdout_reader(
        &self,
        trial_id: u64,
        opponent_name: &str,
        parties: u32,
        child: &mut Child,
    ) -> thread::JoinHandle<String> {
        let stdout = child.stdout.take();
        let tracker = Arc::clone(&self.tracker);
        let opponent = opponent_name.to_string();
        thread::spawn(move || {
            let Some(stdout) = stdout else {
                return String::new();
            };
            let mut captured = String::new();
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Some(snapshot) = protocol::parse_progress(&line) {
                    tracker.publish(trial_id, &opponent, parties, snapshot);
                }
                captured.push_str(&line);
                captured.push('\n');
            }
            captured
        })
    }
}

/// Deck files handed to a worker process, deleted when the trial ends.
struct TempDeckFiles {
    paths: Vec<PathBuf>,
}

impl TempDeckFiles {
    fn write(trial_id: u64, setup: &TrialSetup) -> Result<Self, TrialError> {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut files = Self { paths: Vec::new() };
        for (seat_idx, seat) in setup.seats.iter().enumerate() {
            let path = std::env::temp_dir().join(format!(
                "decksim-{}-{trial_id}-{seat_idx}-{nonce}.json",
                std::process::id()
            ));
            seat.deck
                .save(&path)
                .map_err(|e| TrialError::execution(format!("failed to stage deck file: {e}")))?;
            files.paths.push(path);
        }
        Ok(files)
    }
}

impl Drop for TempDeckFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_stderr_reader(child: &mut Child) -> thread::JoinHandle<String> {
    let stderr = child.stderr.take();
    thread::spawn(move || {
        let mut captured = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut captured);
        }
        captured
    })
}

fn drain(
    stdout: thread::JoinHandle<String>,
    stderr: thread::JoinHandle<String>,
) -> (String, String) {
    (
        stdout.join().unwrap_or_default(),
        stderr.join().unwrap_or_default(),
    )
}
