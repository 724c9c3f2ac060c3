//! Collaborators that choose intents and describe results.
//!
//! The battle never decides what a combatant does or how an outcome reads.
//! An [`IntentProvider`] picks the next [`Intent`] for whoever is acting,
//! and a [`Narrator`] turns the [`NarrativeFacts`] of each result into text.
//! Both are injected, so a language model, a scripted test or a human at a
//! prompt can stand behind either seam.

use crate::action::{ActionOutcome, NarrativeFacts};
use crate::character::CharacterId;
use crate::combatant::{BattleView, Combatant};
use crate::grid::{distance, Position};
use crate::rules::{weapon_ability_modifier, Intent, TOUCH_RANGE};
use crate::spells::{SpellAttackType, SpellRange};
use crate::turn::ActionKind;
use tracing::debug;

/// Chooses what a combatant does next.
pub trait IntentProvider {
    /// Called repeatedly while `actor` has an unfinished turn. Returning
    /// [`Intent::Pass`] ends the turn.
    fn next_intent(&mut self, view: &BattleView, actor: CharacterId) -> Intent;
}

/// Turns the facts of one action into prose.
pub trait Narrator {
    fn narrate(&mut self, facts: &NarrativeFacts) -> String;
}

/// A simple rule-based provider.
///
/// Heals a badly hurt ally if it can, otherwise makes the attack with the
/// highest average damage against the nearest enemy in reach, otherwise
/// walks toward the nearest enemy, otherwise passes.
#[derive(Debug, Clone)]
pub struct Tactician {
    /// Allies below this fraction of max HP get healed.
    pub heal_threshold: f32,
}

impl Default for Tactician {
    fn default() -> Self {
        Self { heal_threshold: 0.5 }
    }
}

impl Tactician {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heal_threshold(mut self, threshold: f32) -> Self {
        self.heal_threshold = threshold;
        self
    }

    fn heal_intent(&self, view: &BattleView, me: &Combatant) -> Option<Intent> {
        let patient = view
            .allies_of(me.id())
            .into_iter()
            .filter(|ally| ally.is_alive() && ally.character.hp_ratio() < self.heal_threshold)
            .min_by(|a, b| a.character.hp_ratio().total_cmp(&b.character.hp_ratio()))?;
        let is_self = patient.id() == me.id();
        let distance = view.distance_feet(me.id(), patient.id())?;

        let spell = me.character.spells.iter().find(|spell| {
            spell.attack_type == SpellAttackType::Heal
                && me.character.can_cast(spell)
                && match spell.range {
                    SpellRange::Self_ => is_self,
                    range => distance <= range.feet(),
                }
        });
        if let Some(spell) = spell {
            let target = (!is_self).then(|| patient.name());
            return Some(Intent::cast(&spell.name, target));
        }

        let potion = me
            .character
            .inventory
            .iter()
            .find(|item| item.is_consumable() && item.healing.is_some())?;
        if is_self {
            Some(Intent::use_item(&potion.name, None))
        } else if distance <= TOUCH_RANGE {
            Some(Intent::use_item(&potion.name, Some(patient.name())))
        } else {
            None
        }
    }

    fn attack_intent(&self, view: &BattleView, me: &Combatant) -> Option<Intent> {
        let character = &me.character;
        let mut best: Option<(f32, Intent)> = None;
        let mut consider = |score: f32, intent: Intent| {
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, intent));
            }
        };

        let mut weapons = character.equipped_weapons().to_vec();
        if weapons.is_empty() {
            weapons.push(character.primary_weapon());
        }
        for weapon in &weapons {
            let reach = weapon.weapon_range().max_feet();
            let Some(target) = view.enemies_in_range(me.id(), reach).into_iter().next() else {
                continue;
            };
            let Ok(dice) = weapon.damage_dice() else {
                continue;
            };
            let score = dice.average() + weapon_ability_modifier(character, weapon) as f32;
            consider(score, Intent::attack_with(target.name(), &weapon.name));
        }

        for spell in character.spells.iter().filter(|s| s.is_harmful() && character.can_cast(s)) {
            let Some(target) = view
                .enemies_in_range(me.id(), spell.range.feet())
                .into_iter()
                .next()
            else {
                continue;
            };
            let Ok(Some(dice)) = spell.effective_damage(character.level, spell.level) else {
                continue;
            };
            consider(dice.average(), Intent::cast(&spell.name, Some(target.name())));
        }

        best.map(|(_, intent)| intent)
    }

    /// Walk toward the nearest enemy, stopping when adjacent, out of
    /// movement, or boxed in.
    fn approach_intent(&self, view: &BattleView, me: &Combatant) -> Option<Intent> {
        let grid = view.grid();
        let enemy = view.nearest_enemy(me.id())?;
        let start = me.character.position;
        let goal = enemy.character.position;
        let mut steps = me.turn.movement_remaining / grid.feet_per_cell().max(1);

        let mut current = start;
        while steps > 0 && distance(current, goal) > 1 {
            let diagonal = current.step_toward(goal);
            let candidates = [
                diagonal,
                Position::new(diagonal.x, current.y),
                Position::new(current.x, diagonal.y),
            ];
            let Some(next) = candidates.into_iter().find(|&cell| {
                cell != current && grid.is_free(cell) && distance(cell, goal) < distance(current, goal)
            }) else {
                break;
            };
            current = next;
            steps -= 1;
        }

        (current != start).then(|| Intent::move_to(current.x, current.y))
    }
}

impl IntentProvider for Tactician {
    fn next_intent(&mut self, view: &BattleView, actor: CharacterId) -> Intent {
        let Some(me) = view.get(actor).filter(|c| c.is_alive()) else {
            return Intent::Pass;
        };

        let mut intent = None;
        if me.turn.can_take(ActionKind::Standard) {
            intent = self
                .heal_intent(view, me)
                .or_else(|| self.attack_intent(view, me));
        }
        if intent.is_none() && me.turn.can_take(ActionKind::Movement) {
            intent = self.approach_intent(view, me);
        }
        let intent = intent.unwrap_or(Intent::Pass);
        debug!(actor = %me.name(), intent = %intent.describe(), "Tactician chose");
        intent
    }
}

/// Narrates straight from the facts, one or two plain sentences.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrator;

impl Narrator for PlainNarrator {
    fn narrate(&mut self, facts: &NarrativeFacts) -> String {
        let mut text = facts.action.clone();
        if facts.target_died {
            if let Some(target) = &facts.target {
                text.push_str(&format!(" {target} falls!"));
            }
            return text;
        }
        let reports_hp = matches!(
            facts.outcome,
            ActionOutcome::Hit { .. }
                | ActionOutcome::SaveFailed
                | ActionOutcome::SaveSucceeded
                | ActionOutcome::Healed
        );
        if reports_hp {
            if let (Some(target), Some(hp), Some(max)) =
                (&facts.target, facts.target_hp, facts.target_max_hp)
            {
                text.push_str(&format!(" {target} is at {hp}/{max} HP."));
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{create_goblin, create_sample_cleric, create_sample_fighter, create_sample_wizard};
    use crate::combatant::Side;
    use crate::grid::Grid;

    fn at(character: crate::character::Character, x: i32, y: i32, side: Side) -> Combatant {
        let mut combatant = Combatant::npc(character.with_position(Position::new(x, y)));
        combatant.side = side;
        combatant
    }

    fn view(combatants: Vec<Combatant>) -> BattleView {
        let mut grid = Grid::new(10, 10, 5);
        for c in &combatants {
            grid.place(c.id(), c.character.position).unwrap();
        }
        BattleView::new(combatants, grid)
    }

    #[test]
    fn test_attacks_adjacent_enemy_with_weapon() {
        let state = view(vec![
            at(create_sample_fighter("Roland"), 0, 0, Side::A),
            at(create_goblin("Snag"), 1, 0, Side::B),
        ]);
        let roland = state.find_by_name("Roland").unwrap().id();
        let intent = Tactician::new().next_intent(&state, roland);
        assert_eq!(intent, Intent::attack_with("Snag", "Longsword"));
    }

    #[test]
    fn test_wizard_prefers_strongest_spell() {
        let state = view(vec![
            at(create_sample_wizard("Elara"), 0, 0, Side::A),
            at(create_goblin("Snag"), 6, 0, Side::B),
        ]);
        let elara = state.find_by_name("Elara").unwrap().id();
        // Magic Missile (3d4+3, 10.5) beats Fire Bolt (1d10, 5.5).
        let intent = Tactician::new().next_intent(&state, elara);
        assert_eq!(intent, Intent::cast("Magic Missile", Some("Snag")));
    }

    #[test]
    fn test_heals_wounded_ally() {
        let mut roland = create_sample_fighter("Roland");
        roland.take_damage(20);
        let state = view(vec![
            at(create_sample_cleric("Mira"), 0, 0, Side::A),
            at(roland, 1, 0, Side::A),
            at(create_goblin("Snag"), 9, 9, Side::B),
        ]);
        let mira = state.find_by_name("Mira").unwrap().id();
        let intent = Tactician::new().next_intent(&state, mira);
        assert!(matches!(
            intent,
            Intent::CastSpell { ref target, .. } if target.as_deref() == Some("Roland")
        ));
    }

    #[test]
    fn test_drinks_potion_when_hurt() {
        let mut roland = create_sample_fighter("Roland");
        roland.take_damage(20);
        let state = view(vec![
            at(roland, 0, 0, Side::A),
            at(create_goblin("Snag"), 1, 0, Side::B),
        ]);
        let roland = state.find_by_name("Roland").unwrap().id();
        let intent = Tactician::new().next_intent(&state, roland);
        assert_eq!(intent, Intent::use_item("Potion of Healing", None));
    }

    #[test]
    fn test_moves_toward_distant_enemy() {
        let state = view(vec![
            at(create_sample_fighter("Roland"), 0, 0, Side::A),
            at(create_goblin("Snag"), 9, 4, Side::B),
        ]);
        let roland = state.find_by_name("Roland").unwrap().id();
        // Speed 30 is six cells of diagonal-or-straight steps.
        let intent = Tactician::new().next_intent(&state, roland);
        assert_eq!(intent, Intent::move_to(6, 4));
    }

    #[test]
    fn test_passes_with_nothing_to_do() {
        let mut fighter = at(create_sample_fighter("Roland"), 0, 0, Side::A);
        fighter.turn.end();
        let state = view(vec![fighter, at(create_goblin("Snag"), 9, 9, Side::B)]);
        let roland = state.find_by_name("Roland").unwrap().id();
        assert_eq!(Tactician::new().next_intent(&state, roland), Intent::Pass);
    }

    #[test]
    fn test_plain_narrator() {
        let mut facts = NarrativeFacts {
            actor: "Roland".to_string(),
            action: "Roland hits Snag with Longsword for 5 damage.".to_string(),
            outcome: ActionOutcome::Hit { critical: false },
            success: true,
            amount: 5,
            target: Some("Snag".to_string()),
            target_hp: Some(2),
            target_max_hp: Some(7),
            target_died: false,
            error: None,
        };
        let mut narrator = PlainNarrator;
        assert_eq!(
            narrator.narrate(&facts),
            "Roland hits Snag with Longsword for 5 damage. Snag is at 2/7 HP."
        );

        facts.target_died = true;
        facts.target_hp = Some(0);
        assert!(narrator.narrate(&facts).ends_with("Snag falls!"));

        facts.outcome = ActionOutcome::Miss { fumble: false };
        facts.target_died = false;
        facts.action = "Roland misses Snag.".to_string();
        assert_eq!(narrator.narrate(&facts), "Roland misses Snag.");
    }
}
