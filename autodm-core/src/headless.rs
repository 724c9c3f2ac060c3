//! Headless battle runner for programmatic use.
//!
//! Drives a [`Battle`] to the end without any user interface: intents come
//! from one [`IntentProvider`] for player-controlled combatants and another
//! for NPCs, and every result is handed to a [`Narrator`]. It is designed
//! for:
//! - Auto-battles between two AI-controlled parties
//! - Simulation and balance runs with a fixed seed
//! - Integration tests with scripted providers
//!
//! # Example
//!
//! ```ignore
//! use autodm_core::{Battle, BattleConfig, HeadlessBattle, PlainNarrator, Tactician};
//!
//! let battle = Battle::new(BattleConfig::new().with_seed(7), party, monsters)?;
//! let mut runner = HeadlessBattle::new(battle, Tactician::new(), Tactician::new(), PlainNarrator);
//! let report = runner.run()?;
//! for entry in &report.log {
//!     println!("[round {}] {}", entry.round, entry.narration);
//! }
//! ```

use crate::action::ActionResult;
use crate::agents::{IntentProvider, Narrator};
use crate::battle::{Battle, BattleError, BattleOutcome, BattlePhase, BattleSnapshot};
use crate::combatant::Controller;
use crate::initiative::InitiativeEntry;
use crate::rules::Intent;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Rejected intents a combatant may submit in one turn before it is made
/// to pass.
pub const DEFAULT_MAX_REJECTIONS: u32 = 3;

/// One narrated action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleLogEntry {
    pub round: u32,
    pub actor: String,
    pub narration: String,
    pub result: ActionResult,
}

/// Everything that happened in a headless run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleReport {
    /// `None` when the round limit stopped the battle first.
    pub outcome: Option<BattleOutcome>,
    pub rounds: u32,
    pub initiative: Vec<InitiativeEntry>,
    pub log: Vec<BattleLogEntry>,
    pub snapshot: BattleSnapshot,
}

impl BattleReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A battle plus the collaborators that play it.
pub struct HeadlessBattle {
    battle: Battle,
    players: Box<dyn IntentProvider + Send>,
    npcs: Box<dyn IntentProvider + Send>,
    narrator: Box<dyn Narrator + Send>,
    max_rejections: u32,
}

impl HeadlessBattle {
    pub fn new(
        battle: Battle,
        players: impl IntentProvider + Send + 'static,
        npcs: impl IntentProvider + Send + 'static,
        narrator: impl Narrator + Send + 'static,
    ) -> Self {
        Self {
            battle,
            players: Box::new(players),
            npcs: Box::new(npcs),
            narrator: Box::new(narrator),
            max_rejections: DEFAULT_MAX_REJECTIONS,
        }
    }

    pub fn with_max_rejections(mut self, max: u32) -> Self {
        self.max_rejections = max;
        self
    }

    pub fn battle(&self) -> &Battle {
        &self.battle
    }

    pub fn into_battle(self) -> Battle {
        self.battle
    }

    /// Play out the current combatant's turn without advancing past it.
    ///
    /// Asks the matching provider for intents until the turn is spent, the
    /// provider passes, or the battle ends. A combatant whose intents keep
    /// getting rejected is made to pass.
    pub fn play_turn(&mut self) -> Vec<BattleLogEntry> {
        let mut entries = Vec::new();
        let Some(actor) = self.battle.current_actor() else {
            return entries;
        };
        let controller = match self.battle.combatant(actor) {
            Some(combatant) => combatant.controller,
            None => return entries,
        };

        let mut rejections = 0;
        while !self.battle.is_over() && !self.battle.turn_finished() {
            let intent = if rejections >= self.max_rejections {
                Intent::Pass
            } else {
                let provider = match controller {
                    Controller::Player => self.players.as_mut(),
                    Controller::Npc => self.npcs.as_mut(),
                };
                provider.next_intent(self.battle.state(), actor)
            };
            let passing = intent == Intent::Pass;
            let result = self.battle.submit_intent(actor, intent);

            if let Some(error) = &result.error {
                rejections += 1;
                warn!(actor = %result.actor, error = %error, rejections, "intent rejected");
                if rejections == self.max_rejections {
                    warn!(actor = %result.actor, "too many rejected intents, passing");
                }
            }

            let narration = self.narrator.narrate(&result.facts);
            entries.push(BattleLogEntry {
                round: self.battle.round(),
                actor: result.actor.clone(),
                narration,
                result,
            });
            if passing {
                break;
            }
        }
        entries
    }

    /// Run the battle until one side is defeated or the configured round
    /// limit is passed. Starts the battle first if it is still in setup.
    pub fn run(&mut self) -> Result<BattleReport, BattleError> {
        if self.battle.phase() == BattlePhase::Setup {
            self.battle.start()?;
        }
        let max_rounds = self.battle.config().max_rounds;

        let mut log = Vec::new();
        while !self.battle.is_over() {
            if max_rounds.is_some_and(|limit| self.battle.round() > limit) {
                info!(rounds = self.battle.round() - 1, "round limit reached");
                break;
            }
            log.extend(self.play_turn());
            if self.battle.is_over() || self.battle.advance_turn().is_none() {
                break;
            }
        }

        let outcome = self.battle.outcome();
        match outcome {
            Some(outcome) => info!(%outcome, round = self.battle.round(), "battle finished"),
            None => info!(round = self.battle.round(), "battle halted"),
        }
        let rounds = match outcome {
            Some(_) => self.battle.round(),
            None => self.battle.round().saturating_sub(1),
        };
        Ok(BattleReport {
            outcome,
            rounds,
            initiative: self.battle.initiative().to_vec(),
            log,
            snapshot: self.battle.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{PlainNarrator, Tactician};
    use crate::combatant::{Combatant, Side};
    use crate::config::BattleConfig;
    use crate::grid::Position;
    use crate::testing::{
        create_goblin, create_sample_fighter, RecordingNarrator, ScriptedDice, ScriptedIntents,
    };

    fn duel(dice: ScriptedDice, config: BattleConfig) -> Battle {
        Battle::with_dice(
            config.with_fixed_positions(),
            vec![Combatant::player(
                create_sample_fighter("Roland").with_position(Position::new(0, 0)),
            )],
            vec![Combatant::npc(
                create_goblin("Snag").with_position(Position::new(1, 0)),
            )],
            Box::new(dice),
        )
        .unwrap()
    }

    #[test]
    fn test_scripted_run_to_victory() {
        // Initiative 20 vs 1, then a hit (17) for 4 + 3 on a 7 HP goblin.
        let battle = duel(ScriptedDice::new([20, 1, 17, 4]), BattleConfig::new());
        let narrator = RecordingNarrator::new();
        let mut runner = HeadlessBattle::new(
            battle,
            ScriptedIntents::new([Intent::attack("Snag")]),
            ScriptedIntents::default(),
            narrator.clone(),
        );

        let report = runner.run().unwrap();
        assert_eq!(report.outcome, Some(BattleOutcome::Victory(Side::A)));
        assert_eq!(report.rounds, 1);
        assert_eq!(report.log.len(), 1);
        assert!(report.log[0].result.target_died());
        assert_eq!(narrator.facts().len(), 1);
        assert!(narrator.facts()[0].target_died);
    }

    #[test]
    fn test_rejections_force_a_pass() {
        let battle = duel(ScriptedDice::new([20, 1]), BattleConfig::new());
        let mut runner = HeadlessBattle::new(
            battle,
            ScriptedIntents::new(vec![Intent::attack("Nobody"); 5]),
            ScriptedIntents::default(),
            PlainNarrator,
        )
        .with_max_rejections(2);

        let entries = runner.play_turn();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].result.is_rejected());
        assert!(entries[1].result.is_rejected());
        assert_eq!(entries[2].result.outcome, crate::action::ActionOutcome::Passed);
        assert!(runner.battle().turn_finished());
    }

    #[test]
    fn test_round_limit_halts() {
        // Everyone passes forever.
        let battle = duel(
            ScriptedDice::new([20, 1]),
            BattleConfig::new().with_max_rounds(Some(3)),
        );
        let mut runner = HeadlessBattle::new(
            battle,
            ScriptedIntents::default(),
            ScriptedIntents::default(),
            PlainNarrator,
        );
        let report = runner.run().unwrap();
        assert_eq!(report.outcome, None);
        assert_eq!(report.rounds, 3);
        // One pass per combatant per round.
        assert_eq!(report.log.len(), 6);
        assert!(report.to_json().unwrap().contains("\"rounds\": 3"));
    }

    #[test]
    fn test_tacticians_finish_a_seeded_battle() {
        let battle = Battle::new(
            BattleConfig::new().with_seed(5),
            vec![Combatant::player(create_sample_fighter("Roland"))],
            vec![Combatant::npc(create_goblin("Snag"))],
        )
        .unwrap();
        let mut runner =
            HeadlessBattle::new(battle, Tactician::new(), Tactician::new(), PlainNarrator);
        let report = runner.run().unwrap();
        assert!(report.outcome.is_some());
        assert!(runner.battle().is_over());
        assert!(report.log.iter().all(|entry| !entry.narration.is_empty()));
    }
}
