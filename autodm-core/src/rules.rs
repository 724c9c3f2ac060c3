//! D&D 5e rules engine with an Intent/Effect pipeline.
//!
//! 1. A player or NPC provider submits an [`Intent`]
//! 2. [`RulesEngine::resolve`] validates it against the battle and rolls dice
//! 3. The result is a list of [`Effect`]s describing every state change
//! 4. [`apply_effects`] writes those changes to the battle
//!
//! Resolution only reads the battle, so a rejected intent never leaves a
//! half-applied action behind.

use crate::action::ActionOutcome;
use crate::character::{Ability, Character, CharacterError, CharacterId};
use crate::combatant::{BattleView, Combatant};
use crate::dice::{Advantage, DiceError, DiceExpression, DiceSource, RollResult};
use crate::grid::{GridError, Position};
use crate::items::{Item, WeaponRange};
use crate::spells::{Spell, SpellAttackType, SpellRange};
use crate::turn::ActionKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Range of a touch-delivered effect such as drinking or administering a potion.
pub const TOUCH_RANGE: u32 = 5;

/// Common D&D damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }
}

// ============================================================================
// Intents
// ============================================================================

/// What a combatant wants to do on its turn. Targets are named, not
/// identified, so providers can build intents from plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Attack with an equipped weapon; `None` uses the first equipped
    /// weapon or an unarmed strike.
    Attack {
        target: String,
        weapon: Option<String>,
    },
    /// Cast a known spell. `slot_level` upcasts; `None` uses the spell's level.
    CastSpell {
        spell: String,
        target: Option<String>,
        slot_level: Option<u8>,
    },
    /// Use an inventory item, on yourself if no target is named.
    UseItem {
        item: String,
        target: Option<String>,
    },
    Move {
        destination: Position,
    },
    /// End the turn.
    Pass,
}

impl Intent {
    pub fn attack(target: impl Into<String>) -> Self {
        Intent::Attack {
            target: target.into(),
            weapon: None,
        }
    }

    pub fn attack_with(target: impl Into<String>, weapon: impl Into<String>) -> Self {
        Intent::Attack {
            target: target.into(),
            weapon: Some(weapon.into()),
        }
    }

    pub fn cast(spell: impl Into<String>, target: Option<&str>) -> Self {
        Intent::CastSpell {
            spell: spell.into(),
            target: target.map(str::to_string),
            slot_level: None,
        }
    }

    pub fn cast_at_level(spell: impl Into<String>, target: Option<&str>, slot_level: u8) -> Self {
        Intent::CastSpell {
            spell: spell.into(),
            target: target.map(str::to_string),
            slot_level: Some(slot_level),
        }
    }

    pub fn use_item(item: impl Into<String>, target: Option<&str>) -> Self {
        Intent::UseItem {
            item: item.into(),
            target: target.map(str::to_string),
        }
    }

    pub fn move_to(x: i32, y: i32) -> Self {
        Intent::Move {
            destination: Position::new(x, y),
        }
    }

    /// The per-turn budget this intent spends, if any.
    pub fn budget(&self) -> Option<ActionKind> {
        match self {
            Intent::Attack { .. } | Intent::CastSpell { .. } | Intent::UseItem { .. } => {
                Some(ActionKind::Standard)
            }
            Intent::Move { .. } => Some(ActionKind::Movement),
            Intent::Pass => None,
        }
    }

    /// Short phrase for log lines and rejection messages, e.g. "attack Snag".
    pub fn describe(&self) -> String {
        match self {
            Intent::Attack { target, weapon } => match weapon {
                Some(weapon) => format!("attack {target} with {weapon}"),
                None => format!("attack {target}"),
            },
            Intent::CastSpell { spell, target, .. } => match target {
                Some(target) => format!("cast {spell} on {target}"),
                None => format!("cast {spell}"),
            },
            Intent::UseItem { item, target } => match target {
                Some(target) => format!("use {item} on {target}"),
                None => format!("use {item}"),
            },
            Intent::Move { destination } => format!("move to {destination}"),
            Intent::Pass => "pass".to_string(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Broad category of a rejected intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Resource,
    Range,
    TurnBudget,
    InvalidTarget,
}

/// Why an intent was rejected. Nothing is rolled, spent or changed when
/// one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ActionError {
    #[error(transparent)]
    Dice(#[from] DiceError),
    #[error(transparent)]
    Character(#[from] CharacterError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("{actor} has already used their {kind} this turn")]
    ActionAlreadyTaken { actor: String, kind: ActionKind },
    #[error("it is not {actor}'s turn")]
    NotYourTurn { actor: String },
    #[error("{actor} is dead and cannot act")]
    ActorDead { actor: String },
    #[error("the battle has not started")]
    NotStarted,
    #[error("the battle is over")]
    BattleOver,
    #[error("no combatant with id {0}")]
    UnknownActor(CharacterId),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("{target} is {distance_feet} ft away, beyond the {range_feet} ft range")]
    OutOfRange {
        target: String,
        distance_feet: u32,
        range_feet: u32,
    },
    #[error("{actor} does not know {spell}")]
    UnknownSpell { actor: String, spell: String },
    #[error("{actor} has no {item}")]
    UnknownItem { actor: String, item: String },
    #[error("{0} has no usable effect")]
    UnusableItem(String),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Character(
                CharacterError::NoSlotsAvailable { .. } | CharacterError::SlotBelowSpellLevel { .. },
            )
            | ActionError::Grid(GridError::InsufficientMovement { .. }) => ErrorKind::Resource,
            ActionError::OutOfRange { .. }
            | ActionError::Grid(GridError::OutOfBounds { .. } | GridError::Occupied { .. }) => {
                ErrorKind::Range
            }
            ActionError::ActionAlreadyTaken { .. }
            | ActionError::NotYourTurn { .. }
            | ActionError::ActorDead { .. }
            | ActionError::NotStarted
            | ActionError::BattleOver => ErrorKind::TurnBudget,
            ActionError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            _ => ErrorKind::Validation,
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

/// One state change (or recorded roll) produced by resolving an intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    DiceRolled {
        roller: CharacterId,
        purpose: String,
        roll: RollResult,
    },
    AttackHit {
        attacker: CharacterId,
        target: CharacterId,
        attack_total: i32,
        target_ac: i32,
        critical: bool,
    },
    AttackMissed {
        attacker: CharacterId,
        target: CharacterId,
        attack_total: i32,
        target_ac: i32,
        fumble: bool,
    },
    SavingThrow {
        target: CharacterId,
        ability: Ability,
        roll: RollResult,
        dc: i32,
        succeeded: bool,
    },
    /// Negative amounts are damage, positive are healing.
    HpChanged {
        target: CharacterId,
        amount: i32,
        new_current: i32,
        new_max: i32,
        dropped_to_zero: bool,
    },
    CharacterDied {
        target: CharacterId,
        cause: String,
    },
    SpellSlotUsed {
        caster: CharacterId,
        level: u8,
        remaining: u8,
    },
    ItemConsumed {
        owner: CharacterId,
        item: String,
    },
    Moved {
        actor: CharacterId,
        from: Position,
        to: Position,
        feet: u32,
    },
    BudgetSpent {
        actor: CharacterId,
        kind: ActionKind,
    },
    TurnEnded {
        actor: CharacterId,
    },
}

/// The result of resolving an intent.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub actor: CharacterId,
    pub target: Option<CharacterId>,
    pub outcome: ActionOutcome,
    /// Damage dealt, HP restored, or feet moved.
    pub amount: i32,
    pub narrative: String,
    pub effects: Vec<Effect>,
}

impl Resolution {
    pub fn new(actor: CharacterId, outcome: ActionOutcome) -> Self {
        Self {
            actor,
            target: None,
            outcome,
            amount: 0,
            narrative: String::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn spend(&mut self, kind: ActionKind) {
        self.push(Effect::BudgetSpent {
            actor: self.actor,
            kind,
        });
    }

    /// Record `amount` damage to `target`, plus a death if it brings them to 0.
    fn damage(&mut self, target: &Combatant, amount: i32, cause: &str) {
        let amount = amount.max(0);
        let new_current = (target.character.current_hp() - amount).max(0);
        self.amount = amount;
        self.push(Effect::HpChanged {
            target: target.id(),
            amount: -amount,
            new_current,
            new_max: target.character.max_hp(),
            dropped_to_zero: new_current == 0,
        });
        if new_current == 0 {
            self.push(Effect::CharacterDied {
                target: target.id(),
                cause: cause.to_string(),
            });
        }
    }

    /// Record healing, clamped to the target's missing HP.
    fn heal(&mut self, target: &Combatant, amount: i32) {
        let missing = target.character.max_hp() - target.character.current_hp();
        let healed = amount.clamp(0, missing.max(0));
        self.amount = healed;
        self.push(Effect::HpChanged {
            target: target.id(),
            amount: healed,
            new_current: target.character.current_hp() + healed,
            new_max: target.character.max_hp(),
            dropped_to_zero: false,
        });
    }
}

// ============================================================================
// Rules Engine
// ============================================================================

/// The rules engine resolves intents into effects using D&D 5e rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesEngine;

/// Everything an attack roll needs, whether from a weapon or a spell.
struct AttackProfile<'a> {
    source: &'a str,
    bonus: i32,
    advantage: Advantage,
    damage: DiceExpression,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self
    }

    /// Validate `intent` for `actor` and roll it out into effects.
    ///
    /// Nothing in `state` is changed; apply the returned effects with
    /// [`apply_effects`].
    pub fn resolve(
        &self,
        state: &BattleView,
        actor: CharacterId,
        intent: &Intent,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        let combatant = state.get(actor).ok_or(ActionError::UnknownActor(actor))?;
        if !combatant.is_alive() {
            return Err(ActionError::ActorDead {
                actor: combatant.name().to_string(),
            });
        }

        let resolution = match intent {
            Intent::Attack { target, weapon } => {
                self.resolve_attack(state, combatant, target, weapon.as_deref(), dice)
            }
            Intent::CastSpell {
                spell,
                target,
                slot_level,
            } => self.resolve_cast_spell(
                state,
                combatant,
                spell,
                target.as_deref(),
                *slot_level,
                dice,
            ),
            Intent::UseItem { item, target } => {
                self.resolve_use_item(state, combatant, item, target.as_deref(), dice)
            }
            Intent::Move { destination } => self.resolve_move(state, combatant, *destination),
            Intent::Pass => Ok(self.resolve_pass(combatant)),
        }?;

        debug!(
            actor = %combatant.name(),
            intent = %intent.describe(),
            outcome = ?resolution.outcome,
            amount = resolution.amount,
            "resolved intent"
        );
        Ok(resolution)
    }

    fn resolve_attack(
        &self,
        state: &BattleView,
        attacker: &Combatant,
        target_name: &str,
        weapon_name: Option<&str>,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        require_budget(attacker, ActionKind::Standard)?;

        let weapon = match weapon_name {
            Some(name) => attacker
                .character
                .find_equipped_weapon(name)
                .cloned()
                .ok_or_else(|| ActionError::UnknownItem {
                    actor: attacker.name().to_string(),
                    item: name.to_string(),
                })?,
            None => attacker.character.primary_weapon(),
        };

        let target = find_target(state, target_name)?;
        if target.id() == attacker.id() {
            return Err(ActionError::InvalidTarget(format!(
                "{} cannot attack themselves",
                attacker.name()
            )));
        }

        let range = weapon.weapon_range();
        let distance = check_range(state, attacker, target, range.max_feet())?;
        // Beyond normal range but within long range.
        let advantage = match range {
            WeaponRange::Ranged { normal, .. } if distance > normal => Advantage::Disadvantage,
            _ => Advantage::Normal,
        };

        let ability_mod = weapon_ability_modifier(&attacker.character, &weapon);
        let profile = AttackProfile {
            source: &weapon.name,
            bonus: attacker.character.proficiency_bonus + ability_mod + weapon.hit_bonus,
            advantage,
            damage: weapon.damage_dice()?.with_modifier(ability_mod),
        };

        let mut resolution = self.attack_roll(attacker, target, &profile, dice);
        resolution.spend(ActionKind::Standard);
        Ok(resolution)
    }

    /// Roll to hit, then damage on a hit. Natural 1 always misses; natural
    /// 20 always hits and doubles the damage.
    fn attack_roll(
        &self,
        attacker: &Combatant,
        target: &Combatant,
        profile: &AttackProfile<'_>,
        dice: &mut dyn DiceSource,
    ) -> Resolution {
        let attack = DiceExpression::d20()
            .with_modifier(profile.bonus)
            .roll_with_advantage(profile.advantage, dice);
        let target_ac = target.character.armor_class();
        let critical = attack.natural_20;
        let fumble = attack.natural_1;
        let hits = !fumble && (critical || attack.total >= target_ac);

        let mut resolution = Resolution::new(attacker.id(), ActionOutcome::Miss { fumble });
        resolution.target = Some(target.id());
        resolution.push(Effect::DiceRolled {
            roller: attacker.id(),
            purpose: format!("{} attack", profile.source),
            roll: attack.clone(),
        });

        if !hits {
            resolution.push(Effect::AttackMissed {
                attacker: attacker.id(),
                target: target.id(),
                attack_total: attack.total,
                target_ac,
                fumble,
            });
            resolution.narrative = format!(
                "{} attacks {} with {} and misses ({} vs AC {}).",
                attacker.name(),
                target.name(),
                profile.source,
                attack.total,
                target_ac
            );
            return resolution;
        }

        resolution.outcome = ActionOutcome::Hit { critical };
        resolution.push(Effect::AttackHit {
            attacker: attacker.id(),
            target: target.id(),
            attack_total: attack.total,
            target_ac,
            critical,
        });

        let damage_roll = profile.damage.roll(dice);
        let mut damage = damage_roll.total.max(0);
        if critical {
            damage *= 2;
        }
        resolution.push(Effect::DiceRolled {
            roller: attacker.id(),
            purpose: format!("{} damage", profile.source),
            roll: damage_roll,
        });
        resolution.damage(target, damage, profile.source);

        resolution.narrative = format!(
            "{} {} {} with {} for {} damage ({} vs AC {}).",
            attacker.name(),
            if critical { "critically hits" } else { "hits" },
            target.name(),
            profile.source,
            damage,
            attack.total,
            target_ac
        );
        resolution
    }

    fn resolve_cast_spell(
        &self,
        state: &BattleView,
        caster: &Combatant,
        spell_name: &str,
        target_name: Option<&str>,
        slot_level: Option<u8>,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        require_budget(caster, ActionKind::Standard)?;

        let spell = caster
            .character
            .known_spell(spell_name)
            .ok_or_else(|| ActionError::UnknownSpell {
                actor: caster.name().to_string(),
                spell: spell_name.to_string(),
            })?;
        let slot = if spell.is_cantrip() {
            0
        } else {
            slot_level.unwrap_or(spell.level)
        };
        caster.character.check_slot(spell, slot)?;

        let target = spell_target(state, caster, spell, target_name)?;
        check_range(state, caster, target, spell.range.feet())?;

        let caster_level = caster.character.level;
        let mut resolution = match spell.attack_type {
            SpellAttackType::Ranged => {
                let damage = spell
                    .effective_damage(caster_level, slot)?
                    .unwrap_or_else(|| DiceExpression::flat(0));
                let profile = AttackProfile {
                    source: &spell.name,
                    bonus: caster.character.spell_attack_bonus(),
                    advantage: Advantage::Normal,
                    damage,
                };
                self.attack_roll(caster, target, &profile, dice)
            }
            SpellAttackType::Save => self.save_spell(caster, target, spell, slot, dice)?,
            SpellAttackType::Heal => {
                let healing = spell
                    .effective_healing(caster_level, slot)?
                    .unwrap_or_else(|| DiceExpression::flat(0))
                    .with_modifier(caster.character.spellcasting_modifier());
                let roll = healing.roll(dice);
                let mut resolution = Resolution::new(caster.id(), ActionOutcome::Healed);
                resolution.target = Some(target.id());
                resolution.push(Effect::DiceRolled {
                    roller: caster.id(),
                    purpose: format!("{} healing", spell.name),
                    roll: roll.clone(),
                });
                resolution.heal(target, roll.total);
                resolution.narrative = format!(
                    "{} casts {} on {}, restoring {} HP.",
                    caster.name(),
                    spell.name,
                    target.name(),
                    resolution.amount
                );
                resolution
            }
            SpellAttackType::None => {
                let mut resolution = Resolution::new(caster.id(), ActionOutcome::NoEffect);
                resolution.target = Some(target.id());
                resolution.narrative = format!("{} casts {}.", caster.name(), spell.name);
                resolution
            }
        };

        if !spell.is_cantrip() {
            resolution.push(Effect::SpellSlotUsed {
                caster: caster.id(),
                level: slot,
                remaining: caster.character.slots_remaining(slot).saturating_sub(1),
            });
        }
        resolution.spend(ActionKind::Standard);
        Ok(resolution)
    }

    /// Damage is rolled first, then the target saves against the caster's
    /// DC, taking half (rounded down) on a success.
    fn save_spell(
        &self,
        caster: &Combatant,
        target: &Combatant,
        spell: &Spell,
        slot: u8,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        let damage = spell
            .effective_damage(caster.character.level, slot)?
            .unwrap_or_else(|| DiceExpression::flat(0));
        let damage_roll = damage.roll(dice);

        let dc = caster.character.spell_save_dc();
        let ability = spell.save_ability.unwrap_or(Ability::Dexterity);
        let save = target.character.saving_throw(ability, dc, dice);

        let full = damage_roll.total.max(0);
        let dealt = if save.success { full / 2 } else { full };

        let outcome = if save.success {
            ActionOutcome::SaveSucceeded
        } else {
            ActionOutcome::SaveFailed
        };
        let mut resolution = Resolution::new(caster.id(), outcome);
        resolution.target = Some(target.id());
        resolution.push(Effect::DiceRolled {
            roller: caster.id(),
            purpose: format!("{} damage", spell.name),
            roll: damage_roll,
        });
        resolution.push(Effect::SavingThrow {
            target: target.id(),
            ability,
            roll: save.roll.clone(),
            dc,
            succeeded: save.success,
        });
        resolution.damage(target, dealt, &spell.name);
        resolution.narrative = format!(
            "{} casts {} on {}, who {} the {} save ({} vs DC {}) and takes {} damage.",
            caster.name(),
            spell.name,
            target.name(),
            if save.success { "makes" } else { "fails" },
            ability,
            save.roll.total,
            dc,
            dealt
        );
        Ok(resolution)
    }

    fn resolve_use_item(
        &self,
        state: &BattleView,
        user: &Combatant,
        item_name: &str,
        target_name: Option<&str>,
        dice: &mut dyn DiceSource,
    ) -> Result<Resolution, ActionError> {
        require_budget(user, ActionKind::Standard)?;

        let item = user
            .character
            .find_item(item_name)
            .ok_or_else(|| ActionError::UnknownItem {
                actor: user.name().to_string(),
                item: item_name.to_string(),
            })?;
        let healing = match item.healing_dice() {
            Some(expr) if item.is_consumable() => expr?,
            _ => return Err(ActionError::UnusableItem(item.name.clone())),
        };

        let target = match target_name {
            Some(name) => find_target(state, name)?,
            None => user,
        };
        check_range(state, user, target, TOUCH_RANGE)?;

        let roll = healing.roll(dice);
        let mut resolution = Resolution::new(user.id(), ActionOutcome::Healed);
        resolution.target = Some(target.id());
        resolution.push(Effect::DiceRolled {
            roller: user.id(),
            purpose: format!("{} healing", item.name),
            roll: roll.clone(),
        });
        resolution.heal(target, roll.total);
        resolution.push(Effect::ItemConsumed {
            owner: user.id(),
            item: item.name.clone(),
        });
        resolution.spend(ActionKind::Standard);
        resolution.narrative = if target.id() == user.id() {
            format!(
                "{} uses {}, restoring {} HP.",
                user.name(),
                item.name,
                resolution.amount
            )
        } else {
            format!(
                "{} uses {} on {}, restoring {} HP.",
                user.name(),
                item.name,
                target.name(),
                resolution.amount
            )
        };
        Ok(resolution)
    }

    fn resolve_move(
        &self,
        state: &BattleView,
        mover: &Combatant,
        destination: Position,
    ) -> Result<Resolution, ActionError> {
        require_budget(mover, ActionKind::Movement)?;

        let from = mover.character.position;
        let feet = state
            .grid()
            .check_move(mover.id(), from, destination, mover.turn.movement_remaining)?;

        let mut resolution = Resolution::new(
            mover.id(),
            ActionOutcome::Moved {
                from,
                to: destination,
                feet,
            },
        );
        resolution.amount = feet as i32;
        resolution.push(Effect::Moved {
            actor: mover.id(),
            from,
            to: destination,
            feet,
        });
        resolution.spend(ActionKind::Movement);
        resolution.narrative = format!(
            "{} moves from {} to {} ({} ft).",
            mover.name(),
            from,
            destination,
            feet
        );
        Ok(resolution)
    }

    fn resolve_pass(&self, actor: &Combatant) -> Resolution {
        let mut resolution = Resolution::new(actor.id(), ActionOutcome::Passed)
            .with_effect(Effect::TurnEnded { actor: actor.id() });
        resolution.narrative = format!("{} ends their turn.", actor.name());
        resolution
    }
}

fn require_budget(actor: &Combatant, kind: ActionKind) -> Result<(), ActionError> {
    if actor.turn.can_take(kind) {
        Ok(())
    } else {
        Err(ActionError::ActionAlreadyTaken {
            actor: actor.name().to_string(),
            kind,
        })
    }
}

/// Look up a living combatant by name.
fn find_target<'a>(state: &'a BattleView, name: &str) -> Result<&'a Combatant, ActionError> {
    match state.find_by_name(name) {
        Some(target) if target.is_alive() => Ok(target),
        Some(target) => Err(ActionError::InvalidTarget(format!(
            "{} is dead",
            target.name()
        ))),
        None => Err(ActionError::InvalidTarget(format!(
            "no combatant named {}",
            name.trim()
        ))),
    }
}

/// Self-range spells hit the caster. Healing and utility spells default to
/// the caster; harmful ones need another target.
fn spell_target<'a>(
    state: &'a BattleView,
    caster: &'a Combatant,
    spell: &Spell,
    target_name: Option<&str>,
) -> Result<&'a Combatant, ActionError> {
    if spell.range == SpellRange::Self_ {
        return match target_name {
            Some(name) if !name.trim().eq_ignore_ascii_case(caster.name()) => {
                Err(ActionError::InvalidTarget(format!(
                    "{} can only target its caster",
                    spell.name
                )))
            }
            _ => Ok(caster),
        };
    }

    let harmful = matches!(
        spell.attack_type,
        SpellAttackType::Ranged | SpellAttackType::Save
    );
    let target = match target_name {
        Some(name) => find_target(state, name)?,
        None if harmful => {
            return Err(ActionError::InvalidTarget(format!(
                "{} needs a target",
                spell.name
            )))
        }
        None => caster,
    };
    if harmful && target.id() == caster.id() {
        return Err(ActionError::InvalidTarget(format!(
            "{} cannot target themselves with {}",
            caster.name(),
            spell.name
        )));
    }
    Ok(target)
}

/// Distance in feet if `target` is within `range_feet`, else `OutOfRange`.
fn check_range(
    state: &BattleView,
    actor: &Combatant,
    target: &Combatant,
    range_feet: u32,
) -> Result<u32, ActionError> {
    let distance = state
        .grid()
        .distance_feet(actor.character.position, target.character.position);
    if distance > range_feet {
        return Err(ActionError::OutOfRange {
            target: target.name().to_string(),
            distance_feet: distance,
            range_feet,
        });
    }
    Ok(distance)
}

/// Ability modifier a character adds to attack and damage rolls with
/// `weapon`: DEX for ranged weapons, the better of STR and DEX for finesse
/// weapons, STR otherwise.
pub fn weapon_ability_modifier(attacker: &Character, weapon: &Item) -> i32 {
    let str_mod = attacker.modifier(Ability::Strength);
    let dex_mod = attacker.modifier(Ability::Dexterity);
    if weapon.is_ranged() {
        dex_mod
    } else if weapon.finesse {
        str_mod.max(dex_mod)
    } else {
        str_mod
    }
}

// ============================================================================
// Applying effects
// ============================================================================

/// Apply effects to the battle, in order.
pub fn apply_effects(state: &mut BattleView, effects: &[Effect]) {
    for effect in effects {
        apply_effect(state, effect);
    }
}

/// Apply a single effect to the battle.
pub fn apply_effect(state: &mut BattleView, effect: &Effect) {
    match effect {
        Effect::HpChanged { target, amount, .. } => {
            if let Some(combatant) = state.get_mut(*target) {
                if *amount < 0 {
                    combatant.character.take_damage(-*amount);
                } else {
                    combatant.character.heal(*amount);
                }
            }
        }
        Effect::CharacterDied { target, cause } => {
            // The dead no longer block movement.
            state.grid_mut().vacate(*target);
            if let Some(combatant) = state.get(*target) {
                info!(name = %combatant.name(), cause = %cause, "combatant died");
            }
        }
        Effect::SpellSlotUsed { caster, level, .. } => {
            if let Some(combatant) = state.get_mut(*caster) {
                if combatant.character.use_slot(*level).is_none() {
                    warn!(caster = %combatant.name(), level, "no spell slot left to spend");
                }
            }
        }
        Effect::ItemConsumed { owner, item } => {
            if let Some(combatant) = state.get_mut(*owner) {
                if let Err(e) = combatant.character.remove_item(item) {
                    warn!(owner = %combatant.name(), error = %e, "consumed item was missing");
                }
            }
        }
        Effect::Moved { actor, to, feet, .. } => {
            state.grid_mut().relocate(*actor, *to);
            if let Some(combatant) = state.get_mut(*actor) {
                combatant.character.position = *to;
                combatant.character.movement_remaining =
                    combatant.character.movement_remaining.saturating_sub(*feet);
                combatant.turn.spend_movement(*feet);
            }
        }
        Effect::BudgetSpent { actor, kind } => {
            if let Some(combatant) = state.get_mut(*actor) {
                combatant.turn.take(*kind);
            }
        }
        Effect::TurnEnded { actor } => {
            if let Some(combatant) = state.get_mut(*actor) {
                combatant.turn.end();
            }
        }
        Effect::DiceRolled { .. }
        | Effect::AttackHit { .. }
        | Effect::AttackMissed { .. }
        | Effect::SavingThrow { .. } => {}
    }
}
