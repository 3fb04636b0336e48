//! Worker mode: play exactly one trial and report over stdout.
//!
//! The orchestrator spawns this in a child process per trial. All narration
//! goes through the line protocol; the parent enforces the deadline, so the
//! worker just plays until the game ends or it is killed.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use decksim_engine::{BuiltinEngine, DeckConfig, PartySeat, SimulationEngine, TrialSetup};

use crate::protocol::{format_progress, format_result};
use crate::tester::SUBJECT_NAME;

/// Play one trial with the staged deck files and print PROGRESS lines plus a
/// final RESULT line.
///
/// # Errors
///
/// Returns an error when a deck file cannot be loaded or the engine faults;
/// the nonzero exit then marks the trial as an execution error upstream.
pub fn run_worker(subject_path: &Path, opponent_paths: &[PathBuf], seed: u64) -> Result<()> {
    let subject = DeckConfig::load(subject_path)
        .with_context(|| format!("loading subject deck {}", subject_path.display()))?;

    let mut seats = vec![PartySeat {
        name: SUBJECT_NAME.to_string(),
        deck: subject,
    }];
    for (i, path) in opponent_paths.iter().enumerate() {
        let deck = DeckConfig::load(path)
            .with_context(|| format!("loading opponent deck {}", path.display()))?;
        seats.push(PartySeat {
            name: format!("Opponent {}", i + 1),
            deck,
        });
    }

    let engine = BuiltinEngine::default();
    let mut trial = engine
        .start_trial(&TrialSetup { seats, seed })
        .context("starting trial")?;

    // One progress line per phase transition is plenty at worker pace.
    let mut last_reported = None;
    loop {
        let snapshot = trial.snapshot();
        let mark = (snapshot.turn, snapshot.phase.clone());
        if last_reported.as_ref() != Some(&mark) {
            println!("{}", format_progress(&snapshot));
            last_reported = Some(mark);
        }
        if trial.step().context("stepping trial")? {
            break;
        }
    }

    let outcome = trial.outcome().context("collecting trial outcome")?;
    println!("{}", format_result(&outcome));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use decksim_engine::DeckFormat;

    fn stage(label: &str, deck: &DeckConfig) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "decksim-worker-{label}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        deck.save(&path).expect("stage deck");
        path
    }

    #[test]
    fn worker_plays_a_staged_pairing() {
        let subject = stage("s", &DeckConfig::new("Subject", DeckFormat::Standard, "R"));
        let opponent = stage("o", &DeckConfig::new("Goblins", DeckFormat::Standard, "G"));
        run_worker(&subject, &[opponent.clone()], 11).expect("worker run");
        let _ = std::fs::remove_file(subject);
        let _ = std::fs::remove_file(opponent);
    }

    #[test]
    fn missing_deck_file_fails_the_worker() {
        let err = run_worker(Path::new("/nonexistent/deck.json"), &[], 0).unwrap_err();
        assert!(err.to_string().contains("loading subject deck"));
    }
}
