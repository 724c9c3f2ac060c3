//! Turn-based D&D 5e battle engine.
//!
//! This crate provides:
//! - Dice notation parsing and rolling through an injectable dice source
//! - Characters, equipment, spells, and a 5e-style character builder
//! - A grid with Chebyshev distance, occupancy, and range checks
//! - An Intent/Effect rules pipeline that validates and resolves actions
//! - A battle orchestrator with initiative, turn budgets, and termination
//! - Pluggable intent providers and narrators, and a headless runner
//!
//! # Quick Start
//!
//! ```ignore
//! use autodm_core::{Battle, BattleConfig, Combatant, Intent};
//! use autodm_core::testing::{create_goblin, create_sample_fighter};
//!
//! let mut battle = Battle::new(
//!     BattleConfig::new().with_seed(42),
//!     vec![Combatant::player(create_sample_fighter("Roland"))],
//!     vec![Combatant::npc(create_goblin("Snag"))],
//! )?;
//! battle.start()?;
//!
//! while !battle.is_over() {
//!     let Some(actor) = battle.current_actor() else { break };
//!     let result = battle.submit_intent(actor, Intent::attack("Snag"));
//!     println!("{}", result.description);
//!     battle.advance_turn();
//! }
//! ```

pub mod action;
pub mod agents;
pub mod battle;
pub mod character;
pub mod character_builder;
pub mod class_data;
pub mod combatant;
pub mod config;
pub mod dice;
pub mod grid;
pub mod headless;
pub mod initiative;
pub mod items;
pub mod rules;
pub mod spells;
pub mod testing;
pub mod turn;

// Primary public API
pub use action::{ActionOutcome, ActionResult, NarrativeFacts};
pub use agents::{IntentProvider, Narrator, PlainNarrator, Tactician};
pub use battle::{Battle, BattleError, BattleOutcome, BattlePhase, BattleSnapshot};
pub use character::{Ability, AbilityScores, Character, CharacterClass, CharacterId, RaceType};
pub use character_builder::{AbilityMethod, CharacterBuilder};
pub use combatant::{BattleView, Combatant, Controller, Side};
pub use config::BattleConfig;
pub use dice::{roll, DiceError, DiceExpression, DiceSource, RngDice, RollResult};
pub use grid::{Grid, GridError, Position};
pub use headless::{BattleReport, HeadlessBattle};
pub use initiative::InitiativeEntry;
pub use rules::{ActionError, Effect, ErrorKind, Intent, RulesEngine};
pub use testing::TestHarness;
