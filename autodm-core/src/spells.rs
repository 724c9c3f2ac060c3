//! Spell definitions and the spell catalog.

use crate::character::{Ability, CharacterClass};
use crate::dice::{DiceError, DiceExpression};
use crate::rules::DamageType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Schools of magic in D&D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Divination,
    Enchantment,
    Evocation,
    Illusion,
    Necromancy,
    Transmutation,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Conjuration => "Conjuration",
            SpellSchool::Divination => "Divination",
            SpellSchool::Enchantment => "Enchantment",
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Illusion => "Illusion",
            SpellSchool::Necromancy => "Necromancy",
            SpellSchool::Transmutation => "Transmutation",
        }
    }
}

/// Range of a spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellRange {
    /// Affects only the caster.
    Self_,
    Touch,
    Feet(u32),
}

impl SpellRange {
    /// Reach in feet; touch spells reach an adjacent square.
    pub fn feet(&self) -> u32 {
        match self {
            SpellRange::Self_ => 0,
            SpellRange::Touch => 5,
            SpellRange::Feet(feet) => *feet,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SpellRange::Self_ => "Self".to_string(),
            SpellRange::Touch => "Touch".to_string(),
            SpellRange::Feet(f) => format!("{} feet", f),
        }
    }
}

/// How a spell is resolved against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellAttackType {
    /// Spell attack roll against AC.
    Ranged,
    /// Target makes a saving throw, taking half damage on a success.
    Save,
    Heal,
    /// No roll and no numeric effect.
    None,
}

/// How spell dice scale with level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageScaling {
    /// Cantrip scaling: dice multiply at caster levels 5, 11, 17
    CantripScaling,
    /// Extra dice per slot level above the spell's level (e.g., +1d6)
    PerSlotLevel { extra_dice: String },
    /// No scaling
    None,
}

/// Complete spell definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    pub level: u8, // 0 for cantrips
    pub school: SpellSchool,
    pub range: SpellRange,
    pub attack_type: SpellAttackType,
    pub save_ability: Option<Ability>,
    pub damage_dice: Option<String>,
    pub damage_type: Option<DamageType>,
    pub healing_dice: Option<String>,
    pub scaling: DamageScaling,
    pub classes: Vec<CharacterClass>,
    pub description: String,
}

impl Spell {
    pub fn new(
        name: impl Into<String>,
        level: u8,
        school: SpellSchool,
        range: SpellRange,
        attack_type: SpellAttackType,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            school,
            range,
            attack_type,
            save_ability: None,
            damage_dice: None,
            damage_type: None,
            healing_dice: None,
            scaling: DamageScaling::None,
            classes: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_damage(mut self, dice: &str, damage_type: DamageType) -> Self {
        self.damage_dice = Some(dice.to_string());
        self.damage_type = Some(damage_type);
        self
    }

    pub fn with_save(mut self, ability: Ability) -> Self {
        self.save_ability = Some(ability);
        self
    }

    pub fn with_healing(mut self, dice: &str) -> Self {
        self.healing_dice = Some(dice.to_string());
        self
    }

    pub fn with_scaling(mut self, scaling: DamageScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Extra dice for each slot level above the spell's own.
    pub fn per_slot(self, extra_dice: &str) -> Self {
        self.with_scaling(DamageScaling::PerSlotLevel {
            extra_dice: extra_dice.to_string(),
        })
    }

    pub fn for_classes(mut self, classes: &[CharacterClass]) -> Self {
        self.classes = classes.to_vec();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Check if this is a cantrip.
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }

    pub fn is_harmful(&self) -> bool {
        matches!(self.attack_type, SpellAttackType::Ranged | SpellAttackType::Save)
            && self.damage_dice.is_some()
    }

    pub fn can_be_learned_by(&self, class: CharacterClass) -> bool {
        self.classes.contains(&class)
    }

    /// Cantrip dice multiplier for a caster level.
    pub fn cantrip_dice_multiplier(caster_level: u8) -> u32 {
        match caster_level {
            0..=4 => 1,
            5..=10 => 2,
            11..=16 => 3,
            _ => 4,
        }
    }

    /// Damage dice after scaling for the caster and slot level.
    pub fn effective_damage(
        &self,
        caster_level: u8,
        slot_level: u8,
    ) -> Result<Option<DiceExpression>, DiceError> {
        self.damage_dice
            .as_deref()
            .map(|base| self.scale(base, caster_level, slot_level))
            .transpose()
    }

    /// Healing dice after scaling for the caster and slot level.
    pub fn effective_healing(
        &self,
        caster_level: u8,
        slot_level: u8,
    ) -> Result<Option<DiceExpression>, DiceError> {
        self.healing_dice
            .as_deref()
            .map(|base| self.scale(base, caster_level, slot_level))
            .transpose()
    }

    fn scale(&self, base: &str, caster_level: u8, slot_level: u8) -> Result<DiceExpression, DiceError> {
        let base = DiceExpression::parse(base)?;
        match &self.scaling {
            DamageScaling::CantripScaling => {
                Ok(base.scaled(Self::cantrip_dice_multiplier(caster_level)))
            }
            DamageScaling::PerSlotLevel { extra_dice } => {
                let extra = DiceExpression::parse(extra_dice)?;
                let levels_above = slot_level.saturating_sub(self.level);
                Ok((0..levels_above).fold(base, |dice, _| dice.plus(&extra)))
            }
            DamageScaling::None => Ok(base),
        }
    }
}

// ============================================================================
// Spell Database
// ============================================================================

/// Global spell database, keyed by lowercase name.
static SPELL_DATABASE: LazyLock<HashMap<String, Spell>> = LazyLock::new(build_spell_database);

/// Look up a spell by name (case-insensitive).
pub fn get_spell(name: &str) -> Option<&'static Spell> {
    SPELL_DATABASE.get(&name.trim().to_lowercase())
}

/// Get all spells in the database.
pub fn all_spells() -> impl Iterator<Item = &'static Spell> {
    SPELL_DATABASE.values()
}

/// Get all spells of a specific level.
pub fn spells_by_level(level: u8) -> impl Iterator<Item = &'static Spell> {
    SPELL_DATABASE.values().filter(move |s| s.level == level)
}

/// Get all spells available to a class.
pub fn spells_for_class(class: CharacterClass) -> impl Iterator<Item = &'static Spell> {
    SPELL_DATABASE
        .values()
        .filter(move |s| s.can_be_learned_by(class))
}

fn build_spell_database() -> HashMap<String, Spell> {
    use CharacterClass::*;

    let spells = vec![
        // Cantrips
        Spell::new("Fire Bolt", 0, SpellSchool::Evocation, SpellRange::Feet(120), SpellAttackType::Ranged)
            .with_damage("1d10", DamageType::Fire)
            .with_scaling(DamageScaling::CantripScaling)
            .for_classes(&[Sorcerer, Wizard])
            .with_description("You hurl a mote of fire at a creature within range."),
        Spell::new("Ray of Frost", 0, SpellSchool::Evocation, SpellRange::Feet(60), SpellAttackType::Ranged)
            .with_damage("1d8", DamageType::Cold)
            .with_scaling(DamageScaling::CantripScaling)
            .for_classes(&[Sorcerer, Wizard])
            .with_description("A frigid beam of blue-white light streaks toward a creature."),
        Spell::new("Eldritch Blast", 0, SpellSchool::Evocation, SpellRange::Feet(120), SpellAttackType::Ranged)
            .with_damage("1d10", DamageType::Force)
            .with_scaling(DamageScaling::CantripScaling)
            .for_classes(&[Warlock])
            .with_description("A beam of crackling energy streaks toward a creature."),
        Spell::new("Sacred Flame", 0, SpellSchool::Evocation, SpellRange::Feet(60), SpellAttackType::Save)
            .with_damage("1d8", DamageType::Radiant)
            .with_save(Ability::Dexterity)
            .with_scaling(DamageScaling::CantripScaling)
            .for_classes(&[Cleric])
            .with_description("Flame-like radiance descends on a creature you can see."),
        // Level 1
        Spell::new("Magic Missile", 1, SpellSchool::Evocation, SpellRange::Feet(120), SpellAttackType::Ranged)
            .with_damage("3d4+3", DamageType::Force)
            .per_slot("1d4+1")
            .for_classes(&[Sorcerer, Wizard])
            .with_description("Glowing darts of magical force strike a creature."),
        Spell::new("Guiding Bolt", 1, SpellSchool::Evocation, SpellRange::Feet(120), SpellAttackType::Ranged)
            .with_damage("4d6", DamageType::Radiant)
            .per_slot("1d6")
            .for_classes(&[Cleric])
            .with_description("A flash of light streaks toward a creature of your choice."),
        Spell::new("Thunderwave", 1, SpellSchool::Evocation, SpellRange::Feet(15), SpellAttackType::Save)
            .with_damage("2d8", DamageType::Thunder)
            .with_save(Ability::Constitution)
            .per_slot("1d8")
            .for_classes(&[Bard, Druid, Sorcerer, Wizard])
            .with_description("A wave of thunderous force sweeps out from you."),
        Spell::new("Cure Wounds", 1, SpellSchool::Evocation, SpellRange::Touch, SpellAttackType::Heal)
            .with_healing("1d8")
            .per_slot("1d8")
            .for_classes(&[Bard, Cleric, Druid, Paladin, Ranger])
            .with_description("A creature you touch regains hit points."),
        Spell::new("Healing Word", 1, SpellSchool::Evocation, SpellRange::Feet(60), SpellAttackType::Heal)
            .with_healing("1d4")
            .per_slot("1d4")
            .for_classes(&[Bard, Cleric, Druid])
            .with_description("A creature you can see regains hit points."),
        Spell::new("Shield", 1, SpellSchool::Abjuration, SpellRange::Self_, SpellAttackType::None)
            .for_classes(&[Sorcerer, Wizard])
            .with_description("An invisible barrier of magical force appears and protects you."),
        // Level 3
        Spell::new("Fireball", 3, SpellSchool::Evocation, SpellRange::Feet(150), SpellAttackType::Save)
            .with_damage("8d6", DamageType::Fire)
            .with_save(Ability::Dexterity)
            .per_slot("1d6")
            .for_classes(&[Sorcerer, Wizard])
            .with_description("A bright streak blossoms into an explosion of flame."),
    ];

    spells
        .into_iter()
        .map(|spell| (spell.name.to_lowercase(), spell))
        .collect()
}
