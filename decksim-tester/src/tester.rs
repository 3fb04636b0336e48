//! Run orchestration: a fixed worker pool draining a queue of trials.
//!
//! One [`DeckTester`] owns a run end to end. It expands the subject-vs-each-
//! opponent matrix into individual trial tasks, fans them out over a bounded
//! pool of threads, and folds completions into shared [`RunState`] as they
//! land, in whatever order they land. Cancellation is cooperative: raising
//! the flag stops new trials from starting and interrupts in-flight ones,
//! and whatever was already recorded survives into the summary.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use decksim_engine::{DeckConfig, DeckFormat, PartySeat, SimulationEngine, TrialSetup};

use crate::progress::{Dashboard, ProgressTracker};
use crate::runner::{TrialError, TrialRunner};
use crate::stats::{MatchupResult, RunState, TestRunSummary};

/// Seat name the subject deck plays under in every trial. Outcome
/// classification keys off this name, not the deck's own.
pub const SUBJECT_NAME: &str = "Input Deck";

#[derive(Debug, Error)]
pub enum TesterError {
    #[error("no opponent decks to test against")]
    NoOpponents,
}

#[derive(Debug, Clone)]
pub struct TesterConfig {
    /// Deadline for a two-party trial; scaled up for bigger tables.
    pub base_timeout: Duration,
    /// Run each trial in its own worker process.
    pub isolate: bool,
    /// Opponent seats at a multi-party table, so parties = 1 + this.
    pub pod_opponents: u32,
    pub live: bool,
    /// Worker pool size; `None` means one per available core.
    pub threads: Option<usize>,
    pub seed: u64,
    /// Binary to spawn for isolated trials; `None` means this executable.
    pub worker_exe: Option<PathBuf>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            base_timeout: Duration::from_secs(150),
            isolate: true,
            pod_opponents: 3,
            live: true,
            threads: None,
            seed: 0,
            worker_exe: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrialTask {
    opponent_idx: usize,
    trial_id: u64,
    seed: u64,
}

struct ActiveRun {
    state: Arc<RunState>,
    started: Instant,
}

pub struct DeckTester {
    engine: Arc<dyn SimulationEngine>,
    config: TesterConfig,
    active: Mutex<Option<ActiveRun>>,
}

impl DeckTester {
    #[must_use]
    pub fn new(engine: Arc<dyn SimulationEngine>, config: TesterConfig) -> Self {
        Self {
            engine,
            config,
            active: Mutex::new(None),
        }
    }

    /// Play `trials_per_opponent` games of the subject against every
    /// opponent and return the aggregated summary. Blocks until the run
    /// completes or is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`TesterError::NoOpponents`] when the gauntlet is empty.
    pub fn test_deck(
        &self,
        subject: &DeckConfig,
        opponents: &[DeckConfig],
        trials_per_opponent: u32,
    ) -> Result<TestRunSummary, TesterError> {
        if opponents.is_empty() {
            return Err(TesterError::NoOpponents);
        }

        let parties: Vec<u32> = opponents
            .iter()
            .map(|opp| self.parties_for(subject, opp))
            .collect();
        let matchups = opponents
            .iter()
            .zip(&parties)
            .map(|(opp, &n)| MatchupResult::new(&subject.name, &opp.name, opp.color_key(), n))
            .collect();

        let expected = u32::try_from(opponents.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(trials_per_opponent);
        let state = Arc::new(RunState::new(
            &subject.name,
            SUBJECT_NAME,
            matchups,
            expected,
        ));
        let started = Instant::now();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveRun {
            state: Arc::clone(&state),
            started,
        });

        let tracker = Arc::new(ProgressTracker::new(self.config.live));
        let dashboard = self
            .config
            .live
            .then(|| Dashboard::spawn(Arc::clone(&state), Arc::clone(&tracker)));

        let runner = TrialRunner::new(
            Arc::clone(&self.engine),
            Arc::clone(&tracker),
            SUBJECT_NAME,
            self.config.base_timeout,
            self.config.isolate,
            self.worker_exe(),
        );

        // Round-robin over opponents so a cancelled run still has balanced
        // coverage per matchup.
        let mut tasks = VecDeque::new();
        let mut trial_id = 0u64;
        for _ in 0..trials_per_opponent {
            for opponent_idx in 0..opponents.len() {
                tasks.push_back(TrialTask {
                    opponent_idx,
                    trial_id,
                    seed: self.config.seed.wrapping_add(trial_id),
                });
                trial_id += 1;
            }
        }
        let queue = Mutex::new(tasks);

        let pool_size = self
            .config
            .threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, usize::from));

        thread::scope(|scope| {
            for _ in 0..pool_size {
                scope.spawn(|| {
                    self.drain_queue(&queue, &runner, &state, subject, opponents, &parties);
                });
            }
        });

        if let Some(dashboard) = dashboard {
            dashboard.stop(&state);
        }
        Ok(state.summary(started.elapsed()))
    }

    fn drain_queue(
        &self,
        queue: &Mutex<VecDeque<TrialTask>>,
        runner: &TrialRunner,
        state: &RunState,
        subject: &DeckConfig,
        opponents: &[DeckConfig],
        parties: &[u32],
    ) {
        loop {
            if state.is_cancelled() {
                return;
            }
            let Some(task) = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
            else {
                return;
            };

            let opponent = &opponents[task.opponent_idx];
            let setup = build_setup(subject, opponent, parties[task.opponent_idx], task.seed);
            match runner.run_trial(task.trial_id, &opponent.name, &setup, state.cancel_flag()) {
                Ok(outcome) => state.record_outcome(task.opponent_idx, &outcome),
                // An interrupted trial never reaches the books.
                Err(TrialError::Cancelled) => {}
                Err(err) => {
                    log::warn!(
                        "trial {} vs {} failed: {}",
                        task.trial_id,
                        opponent.name,
                        failure_report(&err)
                    );
                    state.record_error(task.opponent_idx);
                }
            }
        }
    }

    /// Seats at the table for this pairing. Commander on either side plays
    /// as a pod; anything else is heads-up.
    fn parties_for(&self, subject: &DeckConfig, opponent: &DeckConfig) -> u32 {
        if subject.format == DeckFormat::Commander || opponent.format == DeckFormat::Commander {
            1 + self.config.pod_opponents
        } else {
            2
        }
    }

    fn worker_exe(&self) -> PathBuf {
        self.config.worker_exe.clone().unwrap_or_else(|| {
            std::env::current_exe().unwrap_or_else(|_| PathBuf::from("decksim-tester"))
        })
    }

    /// Stop the current run. New trials are skipped and in-flight ones are
    /// interrupted at their next cancellation check.
    pub fn cancel(&self) {
        if let Some(run) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            run.state.cancel();
        }
    }

    /// Snapshot of whatever the current (or last) run has recorded so far.
    #[must_use]
    pub fn partial_results(&self) -> Option<TestRunSummary> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|run| run.state.summary(run.started.elapsed()))
    }
}

/// Full failure description for the run log. A failed worker's captured
/// stdout and stderr go here verbatim; they are the only record of what the
/// child process did.
fn failure_report(err: &TrialError) -> String {
    match err {
        TrialError::Execution {
            reason,
            stdout,
            stderr,
        } => {
            let mut report = reason.clone();
            if !stdout.trim().is_empty() {
                report.push_str("\nworker stdout:\n");
                report.push_str(stdout.trim_end());
            }
            if !stderr.trim().is_empty() {
                report.push_str("\nworker stderr:\n");
                report.push_str(stderr.trim_end());
            }
            report
        }
        other => other.to_string(),
    }
}

fn build_setup(subject: &DeckConfig, opponent: &DeckConfig, parties: u32, seed: u64) -> TrialSetup {
    let mut seats = vec![PartySeat {
        name: SUBJECT_NAME.to_string(),
        deck: subject.clone(),
    }];
    for i in 1..parties {
        seats.push(PartySeat {
            name: format!("Opponent {i}"),
            deck: opponent.clone(),
        });
    }
    TrialSetup { seats, seed }
}
