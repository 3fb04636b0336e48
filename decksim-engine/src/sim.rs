//! Built-in stand-in engine.
//!
//! Plays a seeded phase-by-phase damage race between deck configurations.
//! This is not a rules engine; it exists so the harness, the worker mode, and
//! the test suite have a deterministic collaborator with the same visible
//! surface as the real thing: turns, phases, life totals, eliminations, and
//! multi-party placements.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::engine::{
    EngineError, GameSnapshot, PartyPlacement, SimulationEngine, TrialHandle, TrialOutcome,
    TrialSetup,
};

const PHASES: [&str; 7] = [
    "Untap", "Upkeep", "Draw", "Main1", "Combat", "Main2", "End",
];

const ELIMINATION_REASON: &str = "LifeReachedZero";

#[derive(Debug, Clone)]
pub struct BuiltinEngine {
    /// Individual player turns before the game is called a draw.
    pub turn_cap: u32,
}

impl Default for BuiltinEngine {
    fn default() -> Self {
        Self { turn_cap: 200 }
    }
}

impl SimulationEngine for BuiltinEngine {
    fn start_trial(&self, setup: &TrialSetup) -> Result<Box<dyn TrialHandle>, EngineError> {
        if setup.seats.len() < 2 {
            return Err(EngineError::NotEnoughSeats(setup.seats.len()));
        }

        let table_life = setup
            .seats
            .iter()
            .map(|s| s.deck.format.starting_life())
            .max()
            .unwrap_or(20);

        let seats = setup
            .seats
            .iter()
            .map(|s| SeatState {
                name: s.name.clone(),
                life: table_life,
                damage_max: (s.deck.power + s.deck.speed / 2).max(1),
                alive: true,
            })
            .collect();

        Ok(Box::new(BuiltinTrial {
            rng: ChaCha8Rng::seed_from_u64(setup.seed),
            seats,
            turn: 1,
            phase_idx: 0,
            active: 0,
            over: false,
            eliminated: Vec::new(),
            turn_cap: self.turn_cap,
        }))
    }
}

#[derive(Debug, Clone)]
struct SeatState {
    name: String,
    life: i32,
    damage_max: u32,
    alive: bool,
}

struct BuiltinTrial {
    rng: ChaCha8Rng,
    seats: Vec<SeatState>,
    turn: u32,
    phase_idx: usize,
    active: usize,
    over: bool,
    /// Seat indices in elimination order, first out first.
    eliminated: Vec<usize>,
    turn_cap: u32,
}

impl BuiltinTrial {
    fn living(&self) -> usize {
        self.seats.iter().filter(|s| s.alive).count()
    }

    /// Next living seat after `from`, round-robin.
    fn next_living(&self, from: usize) -> usize {
        let n = self.seats.len();
        (1..=n)
            .map(|off| (from + off) % n)
            .find(|&i| self.seats[i].alive)
            .unwrap_or(from)
    }

    fn resolve_combat(&mut self) {
        let attacker = self.active;
        let target = self.next_living(attacker);
        if target == attacker {
            return;
        }
        let damage = self.rng.gen_range(0..=self.seats[attacker].damage_max) as i32;
        let seat = &mut self.seats[target];
        seat.life -= damage;
        if seat.life <= 0 {
            seat.life = 0;
            seat.alive = false;
            self.eliminated.push(target);
        }
    }
}

impl TrialHandle for BuiltinTrial {
    fn step(&mut self) -> Result<bool, EngineError> {
        if self.over {
            return Ok(true);
        }

        if PHASES[self.phase_idx] == "Combat" {
            self.resolve_combat();
        }

        if self.living() <= 1 {
            self.over = true;
            return Ok(true);
        }

        self.phase_idx += 1;
        if self.phase_idx == PHASES.len() {
            self.phase_idx = 0;
            self.active = self.next_living(self.active);
            self.turn += 1;
            if self.turn > self.turn_cap {
                self.over = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            turn: self.turn,
            phase: PHASES[self.phase_idx].to_string(),
            active: self.seats[self.active].name.clone(),
            names: self.seats.iter().map(|s| s.name.clone()).collect(),
            lives: self.seats.iter().map(|s| s.life).collect(),
        }
    }

    fn seat_has_lost(&self, name: &str) -> bool {
        self.seats.iter().any(|s| s.name == name && !s.alive)
    }

    fn outcome(&self) -> Result<TrialOutcome, EngineError> {
        if !self.over {
            return Err(EngineError::StillRunning);
        }

        let draw = self.living() != 1;

        // Best finish first: survivors by life, then the eliminated in
        // reverse elimination order (later out places higher).
        let mut order: Vec<usize> = (0..self.seats.len())
            .filter(|&i| self.seats[i].alive)
            .collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.seats[i].life));
        order.extend(self.eliminated.iter().rev().copied());

        let placements: Vec<PartyPlacement> = order
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let seat = &self.seats[i];
                let rank = u32::try_from(pos).unwrap_or(u32::MAX) + 1;
                PartyPlacement {
                    name: seat.name.clone(),
                    won: !draw && rank == 1,
                    life: seat.life,
                    rank,
                    reason: (!seat.alive).then(|| ELIMINATION_REASON.to_string()),
                }
            })
            .collect();

        let winner = (!draw)
            .then(|| placements.first().map(|p| p.name.clone()))
            .flatten();

        Ok(TrialOutcome {
            winner,
            // The last completed turn, matching what operators see on the
            // dashboard when the game ends.
            turns: self.turn.min(self.turn_cap),
            draw,
            placements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{DeckConfig, DeckFormat};
    use crate::engine::PartySeat;

    fn setup(parties: usize, seed: u64) -> TrialSetup {
        let mut seats = vec![PartySeat {
            name: "Input Deck".to_string(),
            deck: DeckConfig::new("Subject", DeckFormat::Standard, "R"),
        }];
        for i in 1..parties {
            seats.push(PartySeat {
                name: format!("Opponent {i}"),
                deck: DeckConfig::new("Opponent", DeckFormat::Standard, "G"),
            });
        }
        TrialSetup { seats, seed }
    }

    fn run_to_completion(engine: &BuiltinEngine, setup: &TrialSetup) -> TrialOutcome {
        let mut handle = engine.start_trial(setup).expect("start trial");
        while !handle.step().expect("step") {}
        handle.outcome().expect("outcome")
    }

    #[test]
    fn rejects_single_seat() {
        let engine = BuiltinEngine::default();
        let one = TrialSetup {
            seats: setup(2, 0).seats.into_iter().take(1).collect(),
            seed: 0,
        };
        assert!(matches!(
            engine.start_trial(&one),
            Err(EngineError::NotEnoughSeats(1))
        ));
    }

    #[test]
    fn same_seed_same_outcome() {
        let engine = BuiltinEngine::default();
        let a = run_to_completion(&engine, &setup(2, 1337));
        let b = run_to_completion(&engine, &setup(2, 1337));
        assert_eq!(a, b);
    }

    #[test]
    fn outcome_before_end_is_still_running() {
        let engine = BuiltinEngine::default();
        let handle = engine.start_trial(&setup(2, 7)).expect("start trial");
        assert!(matches!(handle.outcome(), Err(EngineError::StillRunning)));
    }

    #[test]
    fn two_party_game_produces_winner_and_loser() {
        let engine = BuiltinEngine::default();
        let outcome = run_to_completion(&engine, &setup(2, 42));
        assert!(!outcome.draw);
        assert!(outcome.winner.is_some());
        assert_eq!(outcome.placements.len(), 2);
        assert!(outcome.placements[0].won);
        assert_eq!(outcome.placements[1].reason.as_deref(), Some("LifeReachedZero"));
    }

    #[test]
    fn four_party_placements_have_unique_ranks() {
        let engine = BuiltinEngine::default();
        let outcome = run_to_completion(&engine, &setup(4, 99));
        assert_eq!(outcome.placements.len(), 4);
        let mut ranks: Vec<u32> = outcome.placements.iter().map(|p| p.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        if !outcome.draw {
            assert_eq!(
                outcome.winner.as_deref(),
                Some(outcome.placements[0].name.as_str())
            );
        }
    }

    #[test]
    fn turn_cap_forces_draw() {
        let engine = BuiltinEngine { turn_cap: 2 };
        let mut trial = setup(2, 5);
        for seat in &mut trial.seats {
            seat.deck.power = 1;
            seat.deck.speed = 0;
        }
        let outcome = run_to_completion(&engine, &trial);
        assert!(outcome.draw);
        assert!(outcome.winner.is_none());
        assert_eq!(outcome.turns, 2);
        assert!(outcome.placements.iter().all(|p| !p.won));
    }

    #[test]
    fn snapshot_tracks_seat_names_and_lives() {
        let engine = BuiltinEngine::default();
        let handle = engine.start_trial(&setup(3, 11)).expect("start trial");
        let snap = handle.snapshot();
        assert_eq!(snap.names.len(), 3);
        assert_eq!(snap.lives, vec![20, 20, 20]);
        assert_eq!(snap.active, "Input Deck");
        assert_eq!(snap.phase, "Untap");
    }
}
