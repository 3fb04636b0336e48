//! The simulation-engine capability contract.
//!
//! The harness never talks to game rules directly. It needs exactly three
//! hooks from an engine: start a trial, query its visible state, and collect
//! the final outcome. Anything richer stays on the engine's side of the line.

use crate::deck::DeckConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a trial requires at least two seats, got {0}")]
    NotEnoughSeats(usize),
    #[error("trial outcome requested before the game ended")]
    StillRunning,
    #[error("engine fault: {0}")]
    Fault(String),
}

/// One participant in a trial: a protocol-visible seat name plus its deck.
#[derive(Debug, Clone)]
pub struct PartySeat {
    pub name: String,
    pub deck: DeckConfig,
}

/// Everything an engine needs to play one trial.
#[derive(Debug, Clone)]
pub struct TrialSetup {
    pub seats: Vec<PartySeat>,
    pub seed: u64,
}

impl TrialSetup {
    #[must_use]
    pub fn parties(&self) -> usize {
        self.seats.len()
    }
}

/// Point-in-time view of a running trial, cheap to copy out of the engine.
/// `names` and `lives` are parallel arrays in seat order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameSnapshot {
    pub turn: u32,
    pub phase: String,
    pub active: String,
    pub names: Vec<String>,
    pub lives: Vec<i32>,
}

/// Final standing of one seat after a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPlacement {
    pub name: String,
    pub won: bool,
    pub life: i32,
    /// 1-based finishing position; 1 is the winner, larger is eliminated
    /// earlier.
    pub rank: u32,
    pub reason: Option<String>,
}

/// Result of one complete trial. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrialOutcome {
    pub winner: Option<String>,
    pub turns: u32,
    pub draw: bool,
    /// Ordered placements, best finish first. Empty for engines that only
    /// report a winner.
    pub placements: Vec<PartyPlacement>,
}

pub trait SimulationEngine: Send + Sync {
    /// Begin one trial. The returned handle is owned by a single task and is
    /// stepped to completion on that task's thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the setup cannot be played.
    fn start_trial(&self, setup: &TrialSetup) -> Result<Box<dyn TrialHandle>, EngineError>;
}

pub trait TrialHandle: Send {
    /// Advance the game by one phase. Returns `true` once the game is over.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the game state is corrupt.
    fn step(&mut self) -> Result<bool, EngineError>;

    /// Current visible state, valid at any point during the trial.
    fn snapshot(&self) -> GameSnapshot;

    /// Whether the named seat has been irrevocably eliminated. Monitoring
    /// stops early once the subject seat has lost.
    fn seat_has_lost(&self, name: &str) -> bool;

    /// The final outcome.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StillRunning`] before [`TrialHandle::step`]
    /// has reported the game over.
    fn outcome(&self) -> Result<TrialOutcome, EngineError>;
}
