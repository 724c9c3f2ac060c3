//! Testing utilities for battles.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedDice` for exact die results
//! - `ScriptedIntents` and `RecordingNarrator` for the collaborator seams
//! - `TestHarness` for scripted battle scenarios

use crate::action::{ActionResult, NarrativeFacts};
use crate::agents::{IntentProvider, Narrator};
use crate::battle::{Battle, BattleError};
use crate::character::CharacterId;
use crate::combatant::{BattleView, Combatant, Side};
use crate::config::BattleConfig;
use crate::dice::DiceSource;
use crate::rules::Intent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub use crate::character::{
    create_goblin, create_orc, create_sample_cleric, create_sample_fighter, create_sample_wizard,
};

/// Dice that return queued values in order.
///
/// Clones share one queue, so a test can keep a handle and push more rolls
/// after giving a clone to a battle. Values are clamped to the die being
/// rolled; an empty queue rolls 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    rolls: Arc<Mutex<VecDeque<u32>>>,
}

impl ScriptedDice {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: Arc::new(Mutex::new(rolls.into_iter().collect())),
        }
    }

    pub fn push(&self, roll: u32) {
        self.queue().push_back(roll);
    }

    pub fn extend(&self, rolls: impl IntoIterator<Item = u32>) {
        self.queue().extend(rolls);
    }

    /// Rolls queued but not yet used.
    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<u32>> {
        self.rolls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.queue()
            .pop_front()
            .map_or(1, |roll| roll.clamp(1, sides.max(1)))
    }
}

/// An [`IntentProvider`] that replays a fixed list, then passes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIntents {
    intents: VecDeque<Intent>,
}

impl ScriptedIntents {
    pub fn new(intents: impl IntoIterator<Item = Intent>) -> Self {
        Self {
            intents: intents.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.intents.len()
    }
}

impl IntentProvider for ScriptedIntents {
    fn next_intent(&mut self, _view: &BattleView, _actor: CharacterId) -> Intent {
        self.intents.pop_front().unwrap_or(Intent::Pass)
    }
}

/// A [`Narrator`] that keeps every set of facts it was given.
///
/// Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNarrator {
    facts: Arc<Mutex<Vec<NarrativeFacts>>>,
}

impl RecordingNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> Vec<NarrativeFacts> {
        self.facts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Narrator for RecordingNarrator {
    fn narrate(&mut self, facts: &NarrativeFacts) -> String {
        self.facts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(facts.clone());
        facts.action.clone()
    }
}

/// Test harness for scripted battles.
///
/// Initiative is rigged so side A acts first (everyone on side A rolls 20,
/// everyone on side B rolls 1); after that every roll comes from
/// [`TestHarness::act`].
pub struct TestHarness {
    pub battle: Battle,
    pub dice: ScriptedDice,
}

impl TestHarness {
    /// Build and start a battle.
    pub fn new(
        config: BattleConfig,
        side_a: Vec<Combatant>,
        side_b: Vec<Combatant>,
    ) -> Result<Self, BattleError> {
        let dice = ScriptedDice::default();
        let mut battle = Battle::with_dice(config, side_a, side_b, Box::new(dice.clone()))?;
        for side in [Side::A, Side::B] {
            let roll = if side == Side::A { 20 } else { 1 };
            let count = battle.state().living(side).count();
            dice.extend(std::iter::repeat(roll).take(count));
        }
        battle.start()?;
        Ok(Self { battle, dice })
    }

    /// Id of the named combatant. Panics if there is none.
    pub fn id(&self, name: &str) -> CharacterId {
        match self.battle.find(name) {
            Some(combatant) => combatant.id(),
            None => panic!("no combatant named {name}"),
        }
    }

    /// Queue `rolls`, then submit `intent` for the named combatant.
    pub fn act(&mut self, actor: &str, intent: Intent, rolls: &[u32]) -> ActionResult {
        self.dice.extend(rolls.iter().copied());
        let id = self.id(actor);
        self.battle.submit_intent(id, intent)
    }

    /// Current HP of the named combatant.
    pub fn hp(&self, name: &str) -> i32 {
        self.battle
            .find(name)
            .map(|c| c.character.current_hp())
            .unwrap_or_else(|| panic!("no combatant named {name}"))
    }

    /// Name of whoever is acting now.
    pub fn current(&self) -> Option<String> {
        self.battle
            .current_actor()
            .and_then(|id| self.battle.combatant(id))
            .map(|c| c.name().to_string())
    }

    /// Move on to the next living combatant's turn.
    pub fn next_turn(&mut self) -> Option<String> {
        self.battle.advance_turn();
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    #[test]
    fn test_scripted_dice_clamps_and_shares_queue() {
        let mut dice = ScriptedDice::new([25, 0]);
        let handle = dice.clone();
        assert_eq!(dice.roll_die(20), 20);
        assert_eq!(dice.roll_die(6), 1);
        // Exhausted.
        assert_eq!(dice.roll_die(6), 1);
        handle.push(4);
        assert_eq!(handle.remaining(), 1);
        assert_eq!(dice.roll_die(6), 4);
    }

    #[test]
    fn test_scripted_intents_then_pass() {
        let view = BattleView::new(Vec::new(), crate::grid::Grid::new(1, 1, 5));
        let mut intents = ScriptedIntents::new([Intent::attack("Snag")]);
        let id = CharacterId::new();
        assert_eq!(intents.next_intent(&view, id), Intent::attack("Snag"));
        assert_eq!(intents.next_intent(&view, id), Intent::Pass);
    }

    #[test]
    fn test_harness_rigs_initiative() {
        let harness = TestHarness::new(
            BattleConfig::new().with_fixed_positions(),
            vec![
                Combatant::player(create_sample_fighter("Roland").with_position(Position::new(0, 0))),
                Combatant::player(create_sample_wizard("Elara").with_position(Position::new(0, 1))),
            ],
            vec![Combatant::npc(create_goblin("Snag").with_position(Position::new(1, 0)))],
        )
        .unwrap();
        // Both roll 20; Elara's higher DEX puts her first.
        assert_eq!(harness.current().as_deref(), Some("Elara"));
        assert_eq!(harness.dice.remaining(), 0);
        assert_eq!(harness.hp("Snag"), 7);
        let order: Vec<_> = harness
            .battle
            .initiative()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(order.last().map(String::as_str), Some("Snag"));
    }
}
