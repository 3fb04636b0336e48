//! Live progress tracking and the terminal dashboard.
//!
//! Runner tasks publish per-trial snapshots into a [`ProgressTracker`]; a
//! dedicated dashboard thread redraws the terminal on a fixed cadence. The
//! tracker is advisory state: trials never block on it and a disabled tracker
//! turns every call into a no-op so headless runs pay nothing.

use colored::Colorize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use decksim_engine::GameSnapshot;

use crate::stats::{RunState, TotalsSnapshot};

const REDRAW_INTERVAL: Duration = Duration::from_millis(500);
const BAR_WIDTH: usize = 50;

/// Visible state of one in-flight trial.
#[derive(Debug, Clone)]
pub struct LiveTrialState {
    pub opponent: String,
    pub parties: u32,
    pub snapshot: GameSnapshot,
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    enabled: bool,
    // BTreeMap so the dashboard lists trials in a stable order.
    active: Mutex<BTreeMap<u64, LiveTrialState>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Upsert the latest snapshot for a trial.
    pub fn publish(&self, trial_id: u64, opponent: &str, parties: u32, snapshot: GameSnapshot) {
        if !self.enabled {
            return;
        }
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                trial_id,
                LiveTrialState {
                    opponent: opponent.to_string(),
                    parties,
                    snapshot,
                },
            );
    }

    /// Drop a trial from the display. Idempotent; called on every exit path
    /// of a trial, including early stop once the subject has lost.
    pub fn remove(&self, trial_id: u64) {
        if !self.enabled {
            return;
        }
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&trial_id);
    }

    #[must_use]
    pub fn active_trials(&self) -> Vec<LiveTrialState> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Render one dashboard frame. Pure with respect to its inputs so the layout
/// is testable without a terminal.
#[must_use]
pub fn render_dashboard(deck_name: &str, totals: &TotalsSnapshot, active: &[LiveTrialState]) -> String {
    let mut out = String::new();

    let title = format!(" Testing: {deck_name} ");
    out.push_str(&format!("╔{:═^width$}╗\n", title, width = BAR_WIDTH + 8));

    let valid = totals.valid_games();
    let win_rate = if valid == 0 {
        0.0
    } else {
        f64::from(totals.wins) * 100.0 / f64::from(valid)
    };
    out.push_str(&format!(
        "  Record: {}-{}-{}  ({win_rate:.1}% win rate)",
        totals.wins.to_string().green(),
        totals.losses.to_string().red(),
        totals.draws,
    ));
    if totals.errors > 0 {
        out.push_str(&format!("  errors: {}", totals.errors.to_string().yellow()));
    }
    out.push('\n');

    out.push_str(&render_bar(totals));
    out.push('\n');

    if !active.is_empty() {
        out.push('\n');
        for trial in active {
            out.push_str(&render_trial_line(trial));
            out.push('\n');
        }
    }

    out
}

fn render_bar(totals: &TotalsSnapshot) -> String {
    let expected = totals.expected.max(1) as usize;
    let filled = (totals.played as usize * BAR_WIDTH / expected).min(BAR_WIDTH);
    let bar: String = "█".repeat(filled) + &"░".repeat(BAR_WIDTH - filled);
    format!(
        "  [{bar}] {}/{} ({:.0}%)",
        totals.played,
        totals.expected,
        totals.percent_complete()
    )
}

fn render_trial_line(trial: &LiveTrialState) -> String {
    let snap = &trial.snapshot;
    // Parties each take one turn per round.
    let round = if trial.parties == 0 {
        snap.turn
    } else {
        snap.turn.div_ceil(trial.parties)
    };

    // Highlight the sole life leader; a tied table shows no leader.
    let max_life = snap.lives.iter().copied().max().unwrap_or(0);
    let leaders = snap.lives.iter().filter(|&&l| l == max_life).count();

    let seats = snap
        .names
        .iter()
        .zip(&snap.lives)
        .map(|(name, &life)| {
            let label = format!("{name} {life}");
            let leading = leaders == 1 && life == max_life;
            let acting = *name == snap.active;
            // Leader and active are independent cues; a leading active seat
            // shows both.
            match (leading, acting) {
                (true, true) => label.green().bold().to_string(),
                (true, false) => label.green().to_string(),
                (false, true) => label.bold().to_string(),
                (false, false) => label,
            }
        })
        .collect::<Vec<_>>()
        .join(" | ");

    format!("  vs {:<20} [R{round} {}]  {seats}", trial.opponent, snap.phase)
}

/// Background redraw thread. Owns the terminal for the duration of a run;
/// everything else must stay off stdout until [`Dashboard::stop`] returns.
pub struct Dashboard {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Dashboard {
    #[must_use]
    pub fn spawn(state: Arc<RunState>, tracker: Arc<ProgressTracker>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "\x1b[2J");
            while !stop_flag.load(Ordering::Relaxed) {
                let frame = render_dashboard(
                    &state.deck_name,
                    &state.totals.snapshot(),
                    &tracker.active_trials(),
                );
                // Home the cursor, repaint, clear the remainder. Avoids the
                // flicker a full clear per frame would cause.
                let _ = write!(stdout, "\x1b[H{frame}\x1b[J");
                let _ = stdout.flush();
                thread::sleep(REDRAW_INTERVAL);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop redrawing and repaint one final frame so the terminal ends on a
    /// consistent state.
    pub fn stop(mut self, state: &RunState) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let frame = render_dashboard(&state.deck_name, &state.totals.snapshot(), &[]);
        print!("\x1b[H{frame}\x1b[J");
        let _ = std::io::stdout().flush();
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
