//! Line protocol between the orchestrator and worker processes.
//!
//! Workers write plain text lines to stdout. Two line kinds matter:
//!
//! ```text
//! PROGRESS:turn=3|active=Input Deck|phase=Combat|lives=18:12|names=Input Deck:Opponent 1
//! RESULT:winner=Input Deck,turns=14,draw=false,placements=Input Deck:1:18:Winner|Opponent 1:2:0:LifeReachedZero
//! ```
//!
//! Everything else on stdout is ignored. Parsing is lenient: a malformed
//! progress line is dropped rather than failing the trial, since progress is
//! advisory. A missing or malformed RESULT line is the caller's problem; the
//! trial is then an execution error.

use decksim_engine::{GameSnapshot, PartyPlacement, TrialOutcome};

pub const PROGRESS_PREFIX: &str = "PROGRESS:";
pub const RESULT_PREFIX: &str = "RESULT:";

/// Placeholder reason for a seat that finished the game alive.
const REASON_WINNER: &str = "Winner";
/// Placeholder winner for a drawn game.
const WINNER_NULL: &str = "null";

#[must_use]
pub fn format_progress(snapshot: &GameSnapshot) -> String {
    format!(
        "{PROGRESS_PREFIX}turn={}|active={}|phase={}|lives={}|names={}",
        snapshot.turn,
        snapshot.active,
        snapshot.phase,
        snapshot
            .lives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(":"),
        snapshot.names.join(":"),
    )
}

/// Parse one `PROGRESS:` line. `None` for anything malformed, including a
/// names/lives length mismatch.
#[must_use]
pub fn parse_progress(line: &str) -> Option<GameSnapshot> {
    let body = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut snapshot = GameSnapshot::default();
    let mut saw_turn = false;

    for field in body.split('|') {
        let (key, value) = field.split_once('=')?;
        match key {
            "turn" => {
                snapshot.turn = value.parse().ok()?;
                saw_turn = true;
            }
            "active" => snapshot.active = value.to_string(),
            "phase" => snapshot.phase = value.to_string(),
            "lives" => {
                snapshot.lives = value
                    .split(':')
                    .map(|v| v.parse().ok())
                    .collect::<Option<Vec<i32>>>()?;
            }
            "names" => {
                snapshot.names = value.split(':').map(str::to_string).collect();
            }
            // Unknown fields from a newer worker are fine.
            _ => {}
        }
    }

    if !saw_turn || snapshot.names.len() != snapshot.lives.len() {
        return None;
    }
    Some(snapshot)
}

#[must_use]
pub fn format_result(outcome: &TrialOutcome) -> String {
    let mut line = format!(
        "{RESULT_PREFIX}winner={},turns={},draw={}",
        outcome.winner.as_deref().unwrap_or(WINNER_NULL),
        outcome.turns,
        outcome.draw,
    );
    if !outcome.placements.is_empty() {
        let placements = outcome
            .placements
            .iter()
            .map(|p| {
                format!(
                    "{}:{}:{}:{}",
                    p.name,
                    p.rank,
                    p.life,
                    p.reason.as_deref().unwrap_or(REASON_WINNER),
                )
            })
            .collect::<Vec<_>>()
            .join("|");
        line.push_str(",placements=");
        line.push_str(&placements);
    }
    line
}

/// Parse one `RESULT:` line. `None` when the line is not a well-formed
/// result.
#[must_use]
pub fn parse_result(line: &str) -> Option<TrialOutcome> {
    let body = line.trim().strip_prefix(RESULT_PREFIX)?;
    let mut outcome = TrialOutcome::default();
    let mut saw_turns = false;

    for field in body.split(',') {
        let (key, value) = field.split_once('=')?;
        match key {
            "winner" => {
                outcome.winner = (value != WINNER_NULL).then(|| value.to_string());
            }
            "turns" => {
                outcome.turns = value.parse().ok()?;
                saw_turns = true;
            }
            "draw" => outcome.draw = value.parse().ok()?,
            "placements" => {
                outcome.placements = value
                    .split('|')
                    .map(parse_placement)
                    .collect::<Option<Vec<_>>>()?;
            }
            _ => {}
        }
    }

    saw_turns.then_some(outcome)
}

fn parse_placement(field: &str) -> Option<PartyPlacement> {
    let mut parts = field.splitn(4, ':');
    let name = parts.next()?.to_string();
    let rank: u32 = parts.next()?.parse().ok()?;
    let life: i32 = parts.next()?.parse().ok()?;
    let reason = parts.next()?;
    Some(PartyPlacement {
        name,
        won: rank == 1 && reason == REASON_WINNER,
        life,
        rank,
        reason: (reason != REASON_WINNER).then(|| reason.to_string()),
    })
}

/// Scan captured worker stdout for the last RESULT line. Last wins so a
/// worker that restarts its own game internally still reports one outcome.
#[must_use]
pub fn extract_result(stdout: &str) -> Option<TrialOutcome> {
    stdout
        .lines()
        .rev()
        .find_map(|line| parse_result(line.trim()))
}
