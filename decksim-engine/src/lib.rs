//! Decksim Engine Contract
//!
//! Deck configuration types and the minimal capability interface the test
//! harness uses to run trials. The real rules engine lives behind
//! [`SimulationEngine`]; this crate ships a seeded stand-in implementation
//! ([`BuiltinEngine`]) that plays deterministic damage races, which is enough
//! to exercise the harness end to end.

pub mod deck;
pub mod engine;
pub mod sim;

pub use deck::{DeckConfig, DeckError, DeckFormat, load_decks_from_dir};
pub use engine::{
    EngineError, GameSnapshot, PartyPlacement, PartySeat, SimulationEngine, TrialHandle,
    TrialOutcome, TrialSetup,
};
pub use sim::BuiltinEngine;
