//! Per-class data used when building characters.
//!
//! Skill options, the order in which generated ability
//! scores are assigned, spell slot progression, and starting spells.

use crate::character::{Ability, CharacterClass, Skill};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How quickly a class gains spell slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CasterProgression {
    None,
    Full,
    Half,
}

impl CasterProgression {
    /// Spell slots available at the given character level.
    pub fn slots_at(&self, level: u8) -> BTreeMap<u8, u8> {
        let mut slots = BTreeMap::new();
        match self {
            CasterProgression::None => {}
            CasterProgression::Full => {
                if level >= 1 {
                    slots.insert(1, 2);
                }
                if level >= 3 {
                    slots.insert(2, 1);
                }
                if level >= 5 {
                    slots.insert(3, 1);
                }
            }
            CasterProgression::Half => {
                if level >= 2 {
                    slots.insert(1, 2);
                }
                if level >= 5 {
                    slots.insert(2, 1);
                }
            }
        }
        slots
    }
}

/// Class-specific data for character creation.
pub struct ClassData {
    /// Number of skills to choose.
    pub skill_count: usize,
    /// Skills available to choose from.
    pub skill_options: &'static [Skill],
    /// Highest generated score goes to the first ability, and so on.
    pub ability_priority: [Ability; 6],
    pub caster: CasterProgression,
    /// Spells every new character of the class knows.
    pub default_spells: &'static [&'static str],
}

use Ability::*;

impl CharacterClass {
    /// Get class data for character creation.
    pub fn data(&self) -> ClassData {
        match self {
            CharacterClass::Barbarian => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::Intimidation,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Survival,
                ],
                ability_priority: [Strength, Constitution, Dexterity, Wisdom, Charisma, Intelligence],
                caster: CasterProgression::None,
                default_spells: &[],
            },
            CharacterClass::Bard => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics, Skill::AnimalHandling, Skill::Arcana, Skill::Athletics,
                    Skill::Deception, Skill::History, Skill::Insight, Skill::Intimidation,
                    Skill::Investigation, Skill::Medicine, Skill::Nature, Skill::Perception,
                    Skill::Performance, Skill::Persuasion, Skill::Religion, Skill::SleightOfHand,
                    Skill::Stealth, Skill::Survival,
                ],
                ability_priority: [Charisma, Dexterity, Constitution, Wisdom, Intelligence, Strength],
                caster: CasterProgression::Full,
                default_spells: &["Healing Word"],
            },
            CharacterClass::Cleric => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::History,
                    Skill::Insight,
                    Skill::Medicine,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                ability_priority: [Wisdom, Constitution, Strength, Charisma, Dexterity, Intelligence],
                caster: CasterProgression::Full,
                default_spells: &["Sacred Flame", "Cure Wounds"],
            },
            CharacterClass::Druid => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::AnimalHandling,
                    Skill::Insight,
                    Skill::Medicine,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Religion,
                    Skill::Survival,
                ],
                ability_priority: [Wisdom, Constitution, Dexterity, Intelligence, Charisma, Strength],
                caster: CasterProgression::Full,
                default_spells: &["Cure Wounds"],
            },
            CharacterClass::Fighter => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::History,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Perception,
                    Skill::Survival,
                ],
                ability_priority: [Strength, Constitution, Dexterity, Wisdom, Charisma, Intelligence],
                caster: CasterProgression::None,
                default_spells: &[],
            },
            CharacterClass::Monk => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::Athletics,
                    Skill::History,
                    Skill::Insight,
                    Skill::Religion,
                    Skill::Stealth,
                ],
                ability_priority: [Dexterity, Wisdom, Constitution, Strength, Intelligence, Charisma],
                caster: CasterProgression::None,
                default_spells: &[],
            },
            CharacterClass::Paladin => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Athletics,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Medicine,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                ability_priority: [Strength, Charisma, Constitution, Wisdom, Dexterity, Intelligence],
                caster: CasterProgression::Half,
                default_spells: &["Cure Wounds"],
            },
            CharacterClass::Ranger => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::AnimalHandling,
                    Skill::Athletics,
                    Skill::Insight,
                    Skill::Investigation,
                    Skill::Nature,
                    Skill::Perception,
                    Skill::Stealth,
                    Skill::Survival,
                ],
                ability_priority: [Dexterity, Wisdom, Constitution, Strength, Intelligence, Charisma],
                caster: CasterProgression::Half,
                default_spells: &[],
            },
            CharacterClass::Rogue => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Acrobatics,
                    Skill::Athletics,
                    Skill::Deception,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Investigation,
                    Skill::Perception,
                    Skill::Performance,
                    Skill::Persuasion,
                    Skill::SleightOfHand,
                    Skill::Stealth,
                ],
                ability_priority: [Dexterity, Constitution, Intelligence, Wisdom, Charisma, Strength],
                caster: CasterProgression::None,
                default_spells: &[],
            },
            CharacterClass::Sorcerer => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::Deception,
                    Skill::Insight,
                    Skill::Intimidation,
                    Skill::Persuasion,
                    Skill::Religion,
                ],
                ability_priority: [Charisma, Constitution, Dexterity, Wisdom, Intelligence, Strength],
                caster: CasterProgression::Full,
                default_spells: &["Fire Bolt", "Magic Missile", "Shield"],
            },
            CharacterClass::Warlock => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::Deception,
                    Skill::History,
                    Skill::Intimidation,
                    Skill::Investigation,
                    Skill::Nature,
                    Skill::Religion,
                ],
                ability_priority: [Charisma, Constitution, Dexterity, Wisdom, Intelligence, Strength],
                caster: CasterProgression::None,
                default_spells: &[],
            },
            CharacterClass::Wizard => ClassData {
                skill_count: 2,
                skill_options: &[
                    Skill::Arcana,
                    Skill::History,
                    Skill::Insight,
                    Skill::Investigation,
                    Skill::Medicine,
                    Skill::Religion,
                ],
                ability_priority: [Intelligence, Constitution, Dexterity, Wisdom, Charisma, Strength],
                caster: CasterProgression::Full,
                default_spells: &["Fire Bolt", "Magic Missile", "Shield"],
            },
        }
    }
}
