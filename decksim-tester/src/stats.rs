//! Matchup aggregation and run-wide statistics.
//!
//! One [`MatchupResult`] per opponent accumulates win/loss/draw/error counts
//! as trials complete, in any order. Updates to different matchups never
//! contend; updates to the same matchup are serialized by that matchup's own
//! lock. Run-wide counters are atomics because the live dashboard reads them
//! on every redraw.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use decksim_engine::TrialOutcome;

/// Color keys with fewer completed games than this are excluded from
/// best/worst rankings; tiny samples produce junk orderings.
pub const MIN_COLOR_SAMPLE: u32 = 5;

/// How a single recorded trial was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialClass {
    Win,
    Loss,
    Draw,
}

/// Running totals for one subject-vs-opponent matchup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupResult {
    pub deck_name: String,
    pub opponent_name: String,
    pub opponent_colors: String,
    /// Seats at the table for this matchup, used for timeout scaling and
    /// round normalization.
    pub parties: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub errors: u32,
    pub total_turns: u64,
}

impl MatchupResult {
    #[must_use]
    pub fn new(
        deck_name: impl Into<String>,
        opponent_name: impl Into<String>,
        opponent_colors: impl Into<String>,
        parties: u32,
    ) -> Self {
        Self {
            deck_name: deck_name.into(),
            opponent_name: opponent_name.into(),
            opponent_colors: opponent_colors.into(),
            parties,
            wins: 0,
            losses: 0,
            draws: 0,
            errors: 0,
            total_turns: 0,
        }
    }

    /// Completed games; errors are non-games and excluded.
    #[must_use]
    pub const fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Everything recorded against this matchup, errors included.
    #[must_use]
    pub const fn recorded_trials(&self) -> u32 {
        self.total_games() + self.errors
    }

    /// `wins / (wins + losses)`. Draws and errors never enter the
    /// denominator; 0.0 when no decisive game has been played.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        let decisive = self.wins + self.losses;
        if decisive == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(decisive)
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_turns(&self) -> f64 {
        let total = self.total_games();
        if total == 0 {
            0.0
        } else {
            self.total_turns as f64 / f64::from(total)
        }
    }

    /// Average game length in rounds: each party takes one turn per round.
    #[must_use]
    pub fn average_rounds(&self) -> f64 {
        if self.parties == 0 {
            self.average_turns()
        } else {
            self.average_turns() / f64::from(self.parties)
        }
    }

    /// Fold one completed trial into the counters. Classification is total:
    /// no winner is a draw, the subject identity winning is a win, any other
    /// winner is a loss.
    pub fn record(&mut self, outcome: &TrialOutcome, subject_identity: &str) -> TrialClass {
        self.total_turns += u64::from(outcome.turns);
        match outcome.winner.as_deref() {
            None => {
                self.draws += 1;
                TrialClass::Draw
            }
            Some(name) if name == subject_identity => {
                self.wins += 1;
                TrialClass::Win
            }
            Some(_) => {
                self.losses += 1;
                TrialClass::Loss
            }
        }
    }

    /// A timeout or execution failure: counts as an error and nothing else.
    pub const fn record_error(&mut self) {
        self.errors += 1;
    }
}

/// Placement score for a party finishing in 1-based position `rank` of an
/// `n`-party trial: `max(0, n - 1 - rank)`. The winner takes the maximum
/// (`n - 2`) and surviving longer is always worth at least as much as going
/// out earlier, so accumulated totals only ever grow.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn placement_score(parties: u32, rank: u32) -> f64 {
    (i64::from(parties) - 1 - i64::from(rank)).max(0) as f64
}

/// Weighted multi-party totals for one opponent color-identity key.
///
/// Sign convention, because it has been gotten backwards before: both
/// components are from the subject's perspective. `weighted_wins` is the
/// subject's own placement points earned in trials where this color was
/// faced; `weighted_losses` is the placement points the opponents of this
/// color earned in those same trials. Win rate is then simply
/// `weighted_wins / (weighted_wins + weighted_losses)` with no inversion at
/// display time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColorWeightedStats {
    pub weighted_wins: f64,
    pub weighted_losses: f64,
    pub games: u32,
    pub total_turns: u64,
    pub parties: u32,
}

impl ColorWeightedStats {
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        let total = self.weighted_wins + self.weighted_losses;
        if total > 0.0 {
            self.weighted_wins / total
        } else {
            0.0
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_rounds(&self) -> f64 {
        if self.games == 0 || self.parties == 0 {
            0.0
        } else {
            self.total_turns as f64 / f64::from(self.games) / f64::from(self.parties)
        }
    }
}

/// Run-wide counters, shared with the dashboard renderer.
#[derive(Debug, Default)]
pub struct RunTotals {
    pub wins: AtomicU32,
    pub losses: AtomicU32,
    pub draws: AtomicU32,
    pub errors: AtomicU32,
    pub played: AtomicU32,
    pub expected: AtomicU32,
}

impl RunTotals {
    #[must_use]
    pub fn snapshot(&self) -> TotalsSnapshot {
        TotalsSnapshot {
            wins: self.wins.load(Ordering::Relaxed),
            losses: self.losses.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            played: self.played.load(Ordering::Relaxed),
            expected: self.expected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TotalsSnapshot {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub errors: u32,
    pub played: u32,
    pub expected: u32,
}

impl TotalsSnapshot {
    /// Completed games, errors excluded.
    #[must_use]
    pub const fn valid_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        if self.expected == 0 {
            0.0
        } else {
            f64::from(self.played) * 100.0 / f64::from(self.expected)
        }
    }
}

/// All mutable state for one test run. Constructed fresh per run, shared by
/// reference with the worker pool, the aggregating tasks, and the dashboard;
/// torn down when the run's summary has been taken.
pub struct RunState {
    pub deck_name: String,
    /// The seat name that identifies the subject in trial outcomes.
    pub subject_identity: String,
    matchups: Vec<Mutex<MatchupResult>>,
    color_stats: Mutex<HashMap<String, ColorWeightedStats>>,
    pub totals: RunTotals,
    cancelled: AtomicBool,
}

impl RunState {
    #[must_use]
    pub fn new(
        deck_name: impl Into<String>,
        subject_identity: impl Into<String>,
        matchups: Vec<MatchupResult>,
        expected: u32,
    ) -> Self {
        let state = Self {
            deck_name: deck_name.into(),
            subject_identity: subject_identity.into(),
            matchups: matchups.into_iter().map(Mutex::new).collect(),
            color_stats: Mutex::new(HashMap::new()),
            totals: RunTotals::default(),
            cancelled: AtomicBool::new(false),
        };
        state.totals.expected.store(expected, Ordering::Relaxed);
        state
    }

    #[must_use]
    pub fn matchup_count(&self) -> usize {
        self.matchups.len()
    }

    #[must_use]
    pub fn matchup(&self, opponent_idx: usize) -> MatchupResult {
        self.matchups[opponent_idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fold one completed trial into the opponent's matchup and the run
    /// totals. Atomic per outcome: a reader never observes a half-applied
    /// trial.
    pub fn record_outcome(&self, opponent_idx: usize, outcome: &TrialOutcome) {
        let (class, parties, color_key) = {
            let mut matchup = self.matchups[opponent_idx]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let class = matchup.record(outcome, &self.subject_identity);
            (class, matchup.parties, matchup.opponent_colors.clone())
        };

        match class {
            TrialClass::Win => self.totals.wins.fetch_add(1, Ordering::Relaxed),
            TrialClass::Loss => self.totals.losses.fetch_add(1, Ordering::Relaxed),
            TrialClass::Draw => self.totals.draws.fetch_add(1, Ordering::Relaxed),
        };
        self.totals.played.fetch_add(1, Ordering::Relaxed);

        if parties > 2 && !outcome.placements.is_empty() {
            self.record_weighted(&color_key, parties, outcome);
        }
    }

    /// Weighted multi-party accumulation, once per trial per color key faced.
    fn record_weighted(&self, color_key: &str, parties: u32, outcome: &TrialOutcome) {
        let Some(subject) = outcome
            .placements
            .iter()
            .find(|p| p.name == self.subject_identity)
        else {
            return;
        };
        let subject_score = placement_score(parties, subject.rank);
        let opponent_score: f64 = outcome
            .placements
            .iter()
            .filter(|p| p.name != self.subject_identity)
            .map(|p| placement_score(parties, p.rank))
            .sum();

        let mut stats = self
            .color_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry(color_key.to_string()).or_default();
        entry.weighted_wins += subject_score;
        entry.weighted_losses += opponent_score;
        entry.games += 1;
        entry.total_turns += u64::from(outcome.turns);
        entry.parties = parties;
    }

    /// A trial that timed out or failed: error counter only, never
    /// win/loss/draw.
    pub fn record_error(&self, opponent_idx: usize) {
        self.matchups[opponent_idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_error();
        self.totals.errors.fetch_add(1, Ordering::Relaxed);
        self.totals.played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// The raw flag, for code that polls cancellation in a tight loop.
    #[must_use]
    pub const fn cancel_flag(&self) -> &AtomicBool {
        &self.cancelled
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Point-in-time summary. Safe at any moment, including mid-run and
    /// after cancellation: each matchup is cloned under its own lock, so
    /// every matchup in the summary is internally consistent.
    #[must_use]
    pub fn summary(&self, duration: Duration) -> TestRunSummary {
        let matchups = self
            .matchups
            .iter()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        let color_stats = self
            .color_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        TestRunSummary {
            deck_name: self.deck_name.clone(),
            matchups,
            color_stats,
            totals: self.totals.snapshot(),
            duration,
        }
    }
}

/// Aggregate view over a completed (or cancelled) run. Derived data only;
/// recomputed on demand, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct TestRunSummary {
    pub deck_name: String,
    pub matchups: Vec<MatchupResult>,
    pub color_stats: HashMap<String, ColorWeightedStats>,
    pub totals: TotalsSnapshot,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl TestRunSummary {
    #[must_use]
    pub fn overall_win_rate(&self) -> f64 {
        let wins: u32 = self.matchups.iter().map(|m| m.wins).sum();
        let decisive: u32 = self.matchups.iter().map(|m| m.wins + m.losses).sum();
        if decisive == 0 {
            0.0
        } else {
            f64::from(wins) / f64::from(decisive)
        }
    }

    /// Mean game length in rounds across matchups that completed a game.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_rounds(&self) -> f64 {
        let played: Vec<f64> = self
            .matchups
            .iter()
            .filter(|m| m.total_games() > 0)
            .map(MatchupResult::average_rounds)
            .collect();
        if played.is_empty() {
            0.0
        } else {
            played.iter().sum::<f64>() / played.len() as f64
        }
    }

    #[must_use]
    pub fn is_multiparty(&self) -> bool {
        self.matchups.iter().any(|m| m.parties >= 3)
    }

    /// Matchups ranked best-for-the-subject first. Ties on win rate break by
    /// more completed games, then opponent name; the order is deterministic.
    #[must_use]
    pub fn best_matchups(&self, count: usize) -> Vec<&MatchupResult> {
        let mut ranked: Vec<&MatchupResult> = self.matchups.iter().collect();
        ranked.sort_by(|a, b| rank_matchups(a, b));
        ranked.truncate(count);
        ranked
    }

    /// Matchups ranked worst-for-the-subject first, same tie-breaks.
    #[must_use]
    pub fn worst_matchups(&self, count: usize) -> Vec<&MatchupResult> {
        let mut ranked: Vec<&MatchupResult> = self.matchups.iter().collect();
        ranked.sort_by(|a, b| rank_matchups(b, a));
        ranked.truncate(count);
        ranked
    }

    /// Color keys ranked by weighted win rate, best first, gated on the
    /// minimum sample size.
    #[must_use]
    pub fn ranked_color_stats(&self) -> Vec<(&str, &ColorWeightedStats)> {
        let mut ranked: Vec<(&str, &ColorWeightedStats)> = self
            .color_stats
            .iter()
            .filter(|(_, s)| s.games >= MIN_COLOR_SAMPLE)
            .map(|(k, s)| (k.as_str(), s))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.win_rate()
                .partial_cmp(&a.1.win_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.games.cmp(&a.1.games))
                .then_with(|| a.0.cmp(b.0))
        });
        ranked
    }

    /// Color keys actually faced, most games first, no sample gating; feeds
    /// the full breakdown table.
    #[must_use]
    pub fn faced_color_stats(&self) -> Vec<(&str, &ColorWeightedStats)> {
        let mut faced: Vec<(&str, &ColorWeightedStats)> = self
            .color_stats
            .iter()
            .filter(|(_, s)| s.games > 0)
            .map(|(k, s)| (k.as_str(), s))
            .collect();
        faced.sort_by(|a, b| b.1.games.cmp(&a.1.games).then_with(|| a.0.cmp(b.0)));
        faced
    }

    #[must_use]
    pub fn games_per_minute(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            f64::from(self.totals.played) * 60.0 / secs
        }
    }
}

fn rank_matchups(a: &MatchupResult, b: &MatchupResult) -> std::cmp::Ordering {
    b.win_rate()
        .partial_cmp(&a.win_rate())
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.total_games().cmp(&a.total_games()))
        .then_with(|| a.opponent_name.cmp(&b.opponent_name))
}

mod duration_millis {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decksim_engine::PartyPlacement;

    const SUBJECT: &str = "Input Deck";

    fn win(turns: u32) -> TrialOutcome {
        TrialOutcome {
            winner: Some(SUBJECT.to_string()),
            turns,
            draw: false,
            placements: Vec::new(),
        }
    }

    fn loss(turns: u32) -> TrialOutcome {
        TrialOutcome {
            winner: Some("Opponent 1".to_string()),
            turns,
            draw: false,
            placements: Vec::new(),
        }
    }

    fn draw(turns: u32) -> TrialOutcome {
        TrialOutcome {
            winner: None,
            turns,
            draw: true,
            placements: Vec::new(),
        }
    }

    fn one_matchup_state() -> RunState {
        RunState::new(
            "My Deck",
            SUBJECT,
            vec![MatchupResult::new("My Deck", "Goblins", "R", 2)],
            10,
        )
    }

    #[test]
    fn ten_straight_wins_is_a_perfect_matchup() {
        let state = one_matchup_state();
        for _ in 0..10 {
            state.record_outcome(0, &win(8));
        }
        let m = state.matchup(0);
        assert_eq!((m.wins, m.losses, m.draws, m.errors), (10, 0, 0, 0));
        assert!((m.win_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn even_split_is_fifty_percent_over_ten_games() {
        let state = one_matchup_state();
        for _ in 0..5 {
            state.record_outcome(0, &win(10));
            state.record_outcome(0, &loss(10));
        }
        let m = state.matchup(0);
        assert!((m.win_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(m.total_games(), 10);
    }

    #[test]
    fn errors_stay_out_of_the_win_rate_denominator() {
        let state = one_matchup_state();
        state.record_outcome(0, &win(5));
        state.record_outcome(0, &loss(5));
        state.record_error(0);
        let m = state.matchup(0);
        assert_eq!(m.errors, 1);
        assert_eq!(m.wins + m.losses + m.draws, 2);
        assert!((m.win_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(m.recorded_trials(), 3);
    }

    #[test]
    fn win_rate_is_zero_without_decisive_games() {
        let mut m = MatchupResult::new("d", "o", "C", 2);
        assert!(m.win_rate().abs() < f64::EPSILON);
        m.record(&draw(12), SUBJECT);
        assert!(m.win_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn recording_order_does_not_change_the_result() {
        let outcomes = vec![win(3), loss(7), draw(20), win(9), loss(4), win(11)];
        let forward = one_matchup_state();
        for o in &outcomes {
            forward.record_outcome(0, o);
        }
        let backward = one_matchup_state();
        for o in outcomes.iter().rev() {
            backward.record_outcome(0, o);
        }
        assert_eq!(forward.matchup(0), backward.matchup(0));
    }

    #[test]
    fn recorded_trials_matches_submissions_at_any_point() {
        let state = one_matchup_state();
        let script = [true, false, true, true, false];
        let mut submitted = 0u32;
        for &ok in &script {
            if ok {
                state.record_outcome(0, &win(6));
            } else {
                state.record_error(0);
            }
            submitted += 1;
            assert_eq!(state.matchup(0).recorded_trials(), submitted);
        }
    }

    #[test]
    fn average_rounds_normalizes_turns_by_party_count() {
        let mut m = MatchupResult::new("d", "o", "WU", 4);
        m.record(&win(16), SUBJECT);
        m.record(&loss(24), SUBJECT);
        assert!((m.average_turns() - 20.0).abs() < f64::EPSILON);
        assert!((m.average_rounds() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn placement_scores_match_the_worked_example() {
        // Four seats: winner 2, second 1, the bottom clamps at zero.
        assert!((placement_score(4, 1) - 2.0).abs() < f64::EPSILON);
        assert!((placement_score(4, 2) - 1.0).abs() < f64::EPSILON);
        assert!(placement_score(4, 3).abs() < f64::EPSILON);
        assert!(placement_score(4, 4).abs() < f64::EPSILON);
    }

    fn pod_outcome(subject_rank: u32) -> TrialOutcome {
        let mut placements = Vec::new();
        for rank in 1..=4u32 {
            let name = if rank == subject_rank {
                SUBJECT.to_string()
            } else {
                format!("Opponent {rank}")
            };
            placements.push(PartyPlacement {
                name: name.clone(),
                won: rank == 1,
                life: if rank == 1 { 24 } else { 0 },
                rank,
                reason: (rank != 1).then(|| "LifeReachedZero".to_string()),
            });
        }
        TrialOutcome {
            winner: Some(placements[0].name.clone()),
            turns: 40,
            draw: false,
            placements,
        }
    }

    #[test]
    fn second_place_in_a_pod_credits_exactly_one_weighted_win_point() {
        let state = RunState::new(
            "My Deck",
            SUBJECT,
            vec![MatchupResult::new("My Deck", "Dragons", "RG", 4)],
            1,
        );
        state.record_outcome(0, &pod_outcome(2));

        let summary = state.summary(Duration::ZERO);
        let stats = summary.color_stats.get("RG").expect("color key recorded");
        // Subject finished 2nd of 4: exactly 1 point for us. Opponents
        // finished 1st, 3rd, 4th: 2 + 0 + 0 points against us.
        assert!((stats.weighted_wins - 1.0).abs() < f64::EPSILON);
        assert!((stats.weighted_losses - 2.0).abs() < f64::EPSILON);
        assert_eq!(stats.games, 1);
        assert!((stats.win_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_totals_never_decrease() {
        let state = RunState::new(
            "My Deck",
            SUBJECT,
            vec![MatchupResult::new("My Deck", "Dragons", "RG", 4)],
            4,
        );
        let mut last = (0.0, 0.0);
        for rank in [4u32, 1, 3, 2] {
            state.record_outcome(0, &pod_outcome(rank));
            let summary = state.summary(Duration::ZERO);
            let s = summary.color_stats.get("RG").expect("key");
            assert!(s.weighted_wins >= last.0);
            assert!(s.weighted_losses >= last.1);
            last = (s.weighted_wins, s.weighted_losses);
        }
    }

    #[test]
    fn pairwise_trials_do_not_touch_color_stats() {
        let state = one_matchup_state();
        state.record_outcome(0, &win(6));
        assert!(state.summary(Duration::ZERO).color_stats.is_empty());
    }

    #[test]
    fn cancel_preserves_already_recorded_totals() {
        let state = one_matchup_state();
        for _ in 0..3 {
            state.record_outcome(0, &win(5));
        }
        state.cancel();
        assert!(state.is_cancelled());
        let summary = state.summary(Duration::from_secs(1));
        assert_eq!(summary.totals.played, 3);
        assert_eq!(summary.totals.valid_games(), 3);
        let m = &summary.matchups[0];
        assert_eq!(m.recorded_trials(), 3);
    }

    fn summary_with(rates: &[(&str, u32, u32)]) -> TestRunSummary {
        let matchups = rates
            .iter()
            .map(|(name, wins, losses)| {
                let mut m = MatchupResult::new("d", *name, "C", 2);
                m.wins = *wins;
                m.losses = *losses;
                m
            })
            .collect();
        TestRunSummary {
            deck_name: "d".to_string(),
            matchups,
            color_stats: HashMap::new(),
            totals: TotalsSnapshot::default(),
            duration: Duration::from_secs(60),
        }
    }

    #[test]
    fn matchup_ranking_breaks_ties_by_games_then_name() {
        let summary = summary_with(&[("beta", 1, 1), ("alpha", 1, 1), ("gamma", 4, 4)]);
        let best: Vec<&str> = summary
            .best_matchups(3)
            .iter()
            .map(|m| m.opponent_name.as_str())
            .collect();
        // All at 50%: more games first, then alphabetical.
        assert_eq!(best, vec!["gamma", "alpha", "beta"]);

        let worst: Vec<&str> = summary
            .worst_matchups(2)
            .iter()
            .map(|m| m.opponent_name.as_str())
            .collect();
        assert_eq!(worst, vec!["beta", "alpha"]);
    }

    #[test]
    fn overall_win_rate_pools_decisive_games() {
        let summary = summary_with(&[("a", 9, 1), ("b", 1, 9)]);
        assert!((summary.overall_win_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn small_color_samples_are_gated_out_of_rankings() {
        let mut summary = summary_with(&[("a", 1, 0)]);
        summary.color_stats.insert(
            "R".to_string(),
            ColorWeightedStats {
                weighted_wins: 4.0,
                weighted_losses: 1.0,
                games: MIN_COLOR_SAMPLE,
                total_turns: 100,
                parties: 4,
            },
        );
        summary.color_stats.insert(
            "WU".to_string(),
            ColorWeightedStats {
                weighted_wins: 9.0,
                weighted_losses: 0.0,
                games: MIN_COLOR_SAMPLE - 1,
                total_turns: 40,
                parties: 4,
            },
        );
        let ranked = summary.ranked_color_stats();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, "R");
        // The full breakdown still shows everything faced.
        assert_eq!(summary.faced_color_stats().len(), 2);
    }
}
