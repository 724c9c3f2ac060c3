//! Combatant data: ability scores, skills, classes, races, and the
//! [`Character`] itself with its hit points, equipment, and spell slots.

use crate::dice::{DiceError, DiceExpression, DiceSource, RollResult};
use crate::grid::Position;
use crate::items::{self, EquipSlot, Item, ItemType};
use crate::spells::{get_spell, Spell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Default walking speed in feet.
pub const DEFAULT_SPEED: u32 = 30;

/// Errors raised by character operations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CharacterError {
    #[error("{item} ({item_type}) cannot be equipped")]
    InvalidEquip { item: String, item_type: ItemType },
    #[error("{0} is not equipped")]
    NotEquipped(String),
    #[error("no level {level} spell slots left to cast {spell}")]
    NoSlotsAvailable { spell: String, level: u8 },
    #[error("{spell} is level {spell_level} and cannot be cast with a level {slot_level} slot")]
    SlotBelowSpellLevel {
        spell: String,
        spell_level: u8,
        slot_level: u8,
    },
    #[error("{class} cannot learn {spell}")]
    CannotLearn { spell: String, class: CharacterClass },
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
    #[error("unknown ability: {0}")]
    UnknownAbility(String),
    #[error("no item named {0} in inventory")]
    ItemNotFound(String),
    #[error("{item} has invalid dice: {source}")]
    BadItemDice { item: String, source: DiceError },
}

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Ability {
    type Err = CharacterError;

    /// Accepts full names or abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Ability::all()
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(wanted) || a.abbreviation().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CharacterError::UnknownAbility(s.to_string()))
    }
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn increase(&mut self, ability: Ability, amount: u8) {
        self.set(ability, self.get(ability).saturating_add(amount));
    }

    /// floor((score - 10) / 2): 8-9 = -1, 10-11 = 0, 12-13 = +1.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Skills
// ============================================================================

/// D&D 5e skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Athletics => "Athletics",
            Skill::Acrobatics => "Acrobatics",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Arcana => "Arcana",
            Skill::History => "History",
            Skill::Investigation => "Investigation",
            Skill::Nature => "Nature",
            Skill::Religion => "Religion",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Insight => "Insight",
            Skill::Medicine => "Medicine",
            Skill::Perception => "Perception",
            Skill::Survival => "Survival",
            Skill::Deception => "Deception",
            Skill::Intimidation => "Intimidation",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
        }
    }

    pub fn all() -> [Skill; 18] {
        [
            Skill::Athletics,
            Skill::Acrobatics,
            Skill::SleightOfHand,
            Skill::Stealth,
            Skill::Arcana,
            Skill::History,
            Skill::Investigation,
            Skill::Nature,
            Skill::Religion,
            Skill::AnimalHandling,
            Skill::Insight,
            Skill::Medicine,
            Skill::Perception,
            Skill::Survival,
            Skill::Deception,
            Skill::Intimidation,
            Skill::Performance,
            Skill::Persuasion,
        ]
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Skill {
    type Err = CharacterError;

    /// Accepts "Sleight of Hand", "sleight_of_hand", or "sleight-of-hand".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn squash(s: &str) -> String {
            s.chars()
                .filter(|c| c.is_ascii_alphabetic())
                .map(|c| c.to_ascii_lowercase())
                .collect()
        }
        let wanted = squash(s);
        Skill::all()
            .into_iter()
            .find(|skill| squash(skill.name()) == wanted)
            .ok_or_else(|| CharacterError::UnknownSkill(s.to_string()))
    }
}

// ============================================================================
// Classes and Races
// ============================================================================

/// D&D character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

impl CharacterClass {
    /// Number of sides on the class hit die.
    pub fn hit_die(&self) -> u32 {
        match self {
            CharacterClass::Barbarian => 12,
            CharacterClass::Fighter | CharacterClass::Paladin | CharacterClass::Ranger => 10,
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Monk
            | CharacterClass::Rogue
            | CharacterClass::Warlock => 8,
            CharacterClass::Sorcerer | CharacterClass::Wizard => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "Barbarian",
            CharacterClass::Bard => "Bard",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Druid => "Druid",
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Monk => "Monk",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Sorcerer => "Sorcerer",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Wizard => "Wizard",
        }
    }

    /// Returns the spellcasting ability for this class, if any.
    pub fn spellcasting_ability(&self) -> Option<Ability> {
        match self {
            CharacterClass::Bard
            | CharacterClass::Sorcerer
            | CharacterClass::Warlock
            | CharacterClass::Paladin => Some(Ability::Charisma),
            CharacterClass::Cleric | CharacterClass::Druid | CharacterClass::Ranger => {
                Some(Ability::Wisdom)
            }
            CharacterClass::Wizard => Some(Ability::Intelligence),
            _ => None,
        }
    }

    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaceType {
    Human,
    Elf,
    Dwarf,
    Halfling,
    HalfOrc,
    HalfElf,
    Tiefling,
    Gnome,
    Dragonborn,
}

impl RaceType {
    pub fn name(&self) -> &'static str {
        match self {
            RaceType::Human => "Human",
            RaceType::Elf => "Elf",
            RaceType::Dwarf => "Dwarf",
            RaceType::Halfling => "Halfling",
            RaceType::HalfOrc => "Half-Orc",
            RaceType::HalfElf => "Half-Elf",
            RaceType::Tiefling => "Tiefling",
            RaceType::Gnome => "Gnome",
            RaceType::Dragonborn => "Dragonborn",
        }
    }

    /// Apply fixed racial ability score bonuses.
    ///
    /// Half-elves also raise two abilities of their choice by one; the
    /// character builder handles that part.
    pub fn apply_ability_bonuses(&self, scores: &mut AbilityScores) {
        match self {
            RaceType::Human => {
                for ability in Ability::all() {
                    scores.increase(ability, 1);
                }
            }
            RaceType::Elf | RaceType::Halfling => scores.increase(Ability::Dexterity, 2),
            RaceType::Dwarf => scores.increase(Ability::Constitution, 2),
            RaceType::Gnome => scores.increase(Ability::Intelligence, 2),
            RaceType::HalfElf => scores.increase(Ability::Charisma, 2),
            RaceType::HalfOrc => {
                scores.increase(Ability::Strength, 2);
                scores.increase(Ability::Constitution, 1);
            }
            RaceType::Tiefling => {
                scores.increase(Ability::Charisma, 2);
                scores.increase(Ability::Intelligence, 1);
            }
            RaceType::Dragonborn => {
                scores.increase(Ability::Strength, 2);
                scores.increase(Ability::Charisma, 1);
            }
        }
    }

    pub fn all() -> &'static [RaceType] {
        &[
            RaceType::Human,
            RaceType::Elf,
            RaceType::Dwarf,
            RaceType::Halfling,
            RaceType::HalfOrc,
            RaceType::HalfElf,
            RaceType::Tiefling,
            RaceType::Gnome,
            RaceType::Dragonborn,
        ]
    }
}

impl fmt::Display for RaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Proficiency bonus by character level.
pub fn proficiency_bonus_for_level(level: u8) -> i32 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

// ============================================================================
// Hit Points and Checks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifeState {
    #[default]
    Alive,
    Dead,
}

/// Result of taking damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    /// HP actually lost, after clamping at zero.
    pub damage_taken: i32,
    pub died: bool,
}

/// Outcome of a d20 check against a DC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub roll: RollResult,
    pub dc: i32,
    pub success: bool,
}

impl CheckResult {
    fn new(roll: RollResult, dc: i32) -> Self {
        let success = roll.meets_dc(dc);
        Self { roll, dc, success }
    }
}

// ============================================================================
// Character
// ============================================================================

/// A creature taking part in a battle.
///
/// `current_hp` and the life state are private: a character reaching 0 HP
/// is marked dead in the same call that lowers its HP, and nothing brings
/// it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub class: CharacterClass,
    pub race: RaceType,
    pub level: u8,
    pub abilities: AbilityScores,
    pub proficiency_bonus: i32,
    armor_class: i32,
    pub speed: u32,
    max_hp: i32,
    current_hp: i32,
    state: LifeState,
    pub spells: Vec<Spell>,
    pub spell_slots: BTreeMap<u8, u8>,
    /// Slots per level after a long rest.
    #[serde(default)]
    pub max_spell_slots: BTreeMap<u8, u8>,
    pub inventory: Vec<Item>,
    equipped: BTreeMap<EquipSlot, Vec<Item>>,
    /// Skill bonus on top of the ability modifier (the proficiency bonus, or 0).
    pub skills: BTreeMap<Skill, i32>,
    pub position: Position,
    pub movement_remaining: u32,
}

impl Character {
    pub fn new(
        name: impl Into<String>,
        class: CharacterClass,
        race: RaceType,
        level: u8,
        abilities: AbilityScores,
        max_hp: i32,
    ) -> Self {
        let level = level.clamp(1, 20);
        let max_hp = max_hp.max(1);
        let mut character = Self {
            id: CharacterId::new(),
            name: name.into(),
            class,
            race,
            level,
            abilities,
            proficiency_bonus: proficiency_bonus_for_level(level),
            armor_class: 10,
            speed: DEFAULT_SPEED,
            max_hp,
            current_hp: max_hp,
            state: LifeState::Alive,
            spells: Vec::new(),
            spell_slots: BTreeMap::new(),
            max_spell_slots: BTreeMap::new(),
            inventory: Vec::new(),
            equipped: BTreeMap::new(),
            skills: Skill::all().into_iter().map(|s| (s, 0)).collect(),
            position: Position::default(),
            movement_remaining: DEFAULT_SPEED,
        };
        character.calculate_armor_class();
        character
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_speed(mut self, speed: u32) -> Self {
        self.speed = speed;
        self.movement_remaining = speed;
        self
    }

    pub fn with_spell(mut self, spell: Spell) -> Self {
        self.spells.push(spell);
        self
    }

    pub fn with_spell_slots(mut self, level: u8, count: u8) -> Self {
        self.spell_slots.insert(level, count);
        self.max_spell_slots.insert(level, count);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.inventory.push(item);
        self
    }

    /// Mark a skill as proficient.
    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.insert(skill, self.proficiency_bonus);
        self
    }

    // ------------------------------------------------------------------
    // Derived stats
    // ------------------------------------------------------------------

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.abilities.modifier(ability)
    }

    pub fn initiative_modifier(&self) -> i32 {
        self.modifier(Ability::Dexterity)
    }

    pub fn armor_class(&self) -> i32 {
        self.armor_class
    }

    /// Recompute AC from equipment: the best armor base (or 10), plus the
    /// dexterity modifier, plus every flat bonus from equipped items.
    pub fn calculate_armor_class(&mut self) -> i32 {
        let base = self
            .equipped(EquipSlot::Armor)
            .iter()
            .filter_map(|item| item.armor_class)
            .max()
            .unwrap_or(10);
        let bonus: i32 = self.equipped.values().flatten().map(|item| item.ac_bonus).sum();
        self.armor_class = base + self.modifier(Ability::Dexterity) + bonus;
        self.armor_class
    }

    // ------------------------------------------------------------------
    // Hit points
    // ------------------------------------------------------------------

    pub fn current_hp(&self) -> i32 {
        self.current_hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn state(&self) -> LifeState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == LifeState::Alive
    }

    pub fn is_dead(&self) -> bool {
        self.state == LifeState::Dead
    }

    pub fn hp_ratio(&self) -> f32 {
        (self.current_hp as f32 / self.max_hp as f32).max(0.0)
    }

    /// Lower HP, never below zero. Reaching zero kills the character.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        if self.is_dead() {
            return DamageResult {
                damage_taken: 0,
                died: false,
            };
        }
        let before = self.current_hp;
        self.current_hp = (self.current_hp - amount.max(0)).max(0);
        let died = self.current_hp == 0;
        if died {
            self.state = LifeState::Dead;
        }
        DamageResult {
            damage_taken: before - self.current_hp,
            died,
        }
    }

    /// Raise HP up to the maximum and return the amount restored.
    /// The dead stay dead.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if self.is_dead() {
            return 0;
        }
        let before = self.current_hp;
        self.current_hp = (self.current_hp + amount.max(0)).min(self.max_hp);
        self.current_hp - before
    }

    // ------------------------------------------------------------------
    // Equipment and inventory
    // ------------------------------------------------------------------

    pub fn equip(&mut self, item: Item) -> Result<(), CharacterError> {
        let slot = item
            .item_type
            .equip_slot()
            .ok_or_else(|| CharacterError::InvalidEquip {
                item: item.name.clone(),
                item_type: item.item_type,
            })?;
        self.equipped.entry(slot).or_default().push(item);
        self.calculate_armor_class();
        Ok(())
    }

    /// Remove the first equipped item with this name from whichever slot holds it.
    pub fn unequip(&mut self, name: &str) -> Result<Item, CharacterError> {
        let found = self.equipped.iter().find_map(|(slot, items)| {
            items
                .iter()
                .position(|item| item.name.eq_ignore_ascii_case(name))
                .map(|index| (*slot, index))
        });
        let (slot, index) = found.ok_or_else(|| CharacterError::NotEquipped(name.to_string()))?;

        let mut item = None;
        if let Some(items) = self.equipped.get_mut(&slot) {
            item = Some(items.remove(index));
            if items.is_empty() {
                self.equipped.remove(&slot);
            }
        }
        self.calculate_armor_class();
        item.ok_or_else(|| CharacterError::NotEquipped(name.to_string()))
    }

    pub fn equipped(&self, slot: EquipSlot) -> &[Item] {
        self.equipped.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_equipped(&self) -> impl Iterator<Item = &Item> {
        self.equipped.values().flatten()
    }

    pub fn equipped_weapons(&self) -> &[Item] {
        self.equipped(EquipSlot::Weapon)
    }

    /// The first equipped weapon, or an unarmed strike.
    pub fn primary_weapon(&self) -> Item {
        self.equipped_weapons()
            .first()
            .cloned()
            .unwrap_or_else(items::unarmed_strike)
    }

    pub fn find_equipped_weapon(&self, name: &str) -> Option<&Item> {
        self.equipped_weapons()
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    pub fn add_item(&mut self, item: Item) {
        self.inventory.push(item);
    }

    pub fn find_item(&self, name: &str) -> Option<&Item> {
        self.inventory
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    pub fn remove_item(&mut self, name: &str) -> Result<Item, CharacterError> {
        let index = self
            .inventory
            .iter()
            .position(|item| item.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CharacterError::ItemNotFound(name.to_string()))?;
        Ok(self.inventory.remove(index))
    }

    // ------------------------------------------------------------------
    // Spellcasting
    // ------------------------------------------------------------------

    /// Class casting ability; classes without one fall back to Intelligence.
    pub fn spellcasting_ability(&self) -> Ability {
        self.class
            .spellcasting_ability()
            .unwrap_or(Ability::Intelligence)
    }

    pub fn spellcasting_modifier(&self) -> i32 {
        self.modifier(self.spellcasting_ability())
    }

    pub fn spell_save_dc(&self) -> i32 {
        8 + self.proficiency_bonus + self.spellcasting_modifier()
    }

    pub fn spell_attack_bonus(&self) -> i32 {
        self.proficiency_bonus + self.spellcasting_modifier()
    }

    pub fn known_spell(&self, name: &str) -> Option<&Spell> {
        self.spells
            .iter()
            .find(|spell| spell.name.eq_ignore_ascii_case(name))
    }

    /// Learn a spell from the catalog, checking the class list.
    pub fn learn_spell(&mut self, name: &str) -> Result<(), CharacterError> {
        let spell = get_spell(name).ok_or_else(|| CharacterError::CannotLearn {
            spell: name.to_string(),
            class: self.class,
        })?;
        if !spell.can_be_learned_by(self.class) {
            return Err(CharacterError::CannotLearn {
                spell: spell.name.clone(),
                class: self.class,
            });
        }
        if self.known_spell(&spell.name).is_none() {
            self.spells.push(spell.clone());
        }
        Ok(())
    }

    pub fn slots_remaining(&self, level: u8) -> u8 {
        self.spell_slots.get(&level).copied().unwrap_or(0)
    }

    pub fn max_slots(&self, level: u8) -> u8 {
        self.max_spell_slots.get(&level).copied().unwrap_or(0)
    }

    /// Give back one slot of `level`. Returns false if the level is already full.
    pub fn restore_slot(&mut self, level: u8) -> bool {
        let max = self.max_slots(level);
        let slots = self.spell_slots.entry(level).or_insert(0);
        if *slots >= max {
            return false;
        }
        *slots += 1;
        true
    }

    /// Refill every slot level (a long rest).
    pub fn restore_all_slots(&mut self) {
        self.spell_slots = self.max_spell_slots.clone();
    }

    pub fn can_cast(&self, spell: &Spell) -> bool {
        spell.is_cantrip() || self.slots_remaining(spell.level) > 0
    }

    /// Check that a slot of `slot_level` could be spent on `spell` without spending it.
    pub fn check_slot(&self, spell: &Spell, slot_level: u8) -> Result<(), CharacterError> {
        if spell.is_cantrip() {
            return Ok(());
        }
        if slot_level < spell.level {
            return Err(CharacterError::SlotBelowSpellLevel {
                spell: spell.name.clone(),
                spell_level: spell.level,
                slot_level,
            });
        }
        if self.slots_remaining(slot_level) == 0 {
            return Err(CharacterError::NoSlotsAvailable {
                spell: spell.name.clone(),
                level: slot_level,
            });
        }
        Ok(())
    }

    /// Spend a slot of the spell's own level. Cantrips are free.
    pub fn cast(&mut self, spell: &Spell) -> Result<(), CharacterError> {
        self.cast_at(spell, spell.level)
    }

    /// Spend a slot of `slot_level`, which may be above the spell's level.
    pub fn cast_at(&mut self, spell: &Spell, slot_level: u8) -> Result<(), CharacterError> {
        self.check_slot(spell, slot_level)?;
        if !spell.is_cantrip() {
            self.use_slot(slot_level);
        }
        Ok(())
    }

    /// Decrement a slot, returning how many remain, or `None` if none were left.
    pub(crate) fn use_slot(&mut self, level: u8) -> Option<u8> {
        let slots = self.spell_slots.get_mut(&level).filter(|n| **n > 0)?;
        *slots -= 1;
        Some(*slots)
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Ability modifier plus skill bonus.
    pub fn skill_modifier(&self, skill: Skill) -> i32 {
        self.modifier(skill.ability()) + self.skills.get(&skill).copied().unwrap_or(0)
    }

    pub fn skill_check(&self, skill: Skill, dc: i32, dice: &mut dyn DiceSource) -> CheckResult {
        let roll = DiceExpression::d20()
            .with_modifier(self.skill_modifier(skill))
            .roll(dice);
        CheckResult::new(roll, dc)
    }

    /// Skill check by name, e.g. "sleight_of_hand".
    pub fn skill_check_named(
        &self,
        skill: &str,
        dc: i32,
        dice: &mut dyn DiceSource,
    ) -> Result<CheckResult, CharacterError> {
        let skill: Skill = skill.parse()?;
        Ok(self.skill_check(skill, dc, dice))
    }

    pub fn ability_check(&self, ability: Ability, dc: i32, dice: &mut dyn DiceSource) -> CheckResult {
        let roll = DiceExpression::d20()
            .with_modifier(self.modifier(ability))
            .roll(dice);
        CheckResult::new(roll, dc)
    }

    /// `1d20 + ability modifier` against a DC.
    pub fn saving_throw(&self, ability: Ability, dc: i32, dice: &mut dyn DiceSource) -> CheckResult {
        self.ability_check(ability, dc, dice)
    }

    pub fn reset_movement(&mut self) {
        self.movement_remaining = self.speed;
    }
}

// ============================================================================
// Sample characters
// ============================================================================

fn outfit(mut character: Character, gear: Vec<Item>) -> Character {
    for item in gear {
        if let Err(e) = character.equip(item) {
            tracing::warn!(character = %character.name, error = %e, "skipping starting gear");
        }
    }
    character
}

fn learn_all(mut character: Character, names: &[&str]) -> Character {
    for name in names {
        if let Some(spell) = get_spell(name) {
            character.spells.push(spell.clone());
        }
    }
    character
}

/// Level 3 human fighter with longsword, chain shirt, and shield.
pub fn create_sample_fighter(name: &str) -> Character {
    let character = Character::new(
        name,
        CharacterClass::Fighter,
        RaceType::Human,
        3,
        AbilityScores::new(16, 14, 14, 10, 12, 8),
        28,
    )
    .with_skill(Skill::Athletics)
    .with_skill(Skill::Perception)
    .with_item(items::potion_of_healing());

    outfit(
        character,
        vec![items::longsword(), items::chain_shirt(), items::shield()],
    )
}

/// Level 3 elf wizard with a dagger and the default wizard spells.
pub fn create_sample_wizard(name: &str) -> Character {
    let character = Character::new(
        name,
        CharacterClass::Wizard,
        RaceType::Elf,
        3,
        AbilityScores::new(8, 16, 14, 16, 12, 10),
        17,
    )
    .with_skill(Skill::Arcana)
    .with_skill(Skill::Investigation)
    .with_spell_slots(1, 2)
    .with_spell_slots(2, 1);

    let character = learn_all(character, &["Fire Bolt", "Magic Missile", "Shield"]);
    outfit(character, vec![items::dagger()])
}

/// Level 3 dwarf cleric with mace, scale mail, shield, and healing spells.
pub fn create_sample_cleric(name: &str) -> Character {
    let character = Character::new(
        name,
        CharacterClass::Cleric,
        RaceType::Dwarf,
        3,
        AbilityScores::new(14, 10, 16, 10, 16, 12),
        24,
    )
    .with_skill(Skill::Medicine)
    .with_skill(Skill::Religion)
    .with_spell_slots(1, 2)
    .with_spell_slots(2, 1);

    let character = learn_all(
        character,
        &["Sacred Flame", "Cure Wounds", "Healing Word", "Guiding Bolt"],
    );
    outfit(
        character,
        vec![items::mace(), items::scale_mail(), items::shield()],
    )
}

/// A goblin skirmisher: scimitar, shortbow, leather armor.
pub fn create_goblin(name: &str) -> Character {
    let character = Character::new(
        name,
        CharacterClass::Rogue,
        RaceType::Halfling,
        1,
        AbilityScores::new(8, 14, 10, 10, 8, 8),
        7,
    )
    .with_skill(Skill::Stealth);

    outfit(
        character,
        vec![items::scimitar(), items::shortbow(), items::leather_armor()],
    )
}

/// An orc brute with a greataxe and hide armor.
pub fn create_orc(name: &str) -> Character {
    let character = Character::new(
        name,
        CharacterClass::Barbarian,
        RaceType::HalfOrc,
        1,
        AbilityScores::new(16, 12, 16, 7, 11, 10),
        15,
    )
    .with_skill(Skill::Intimidation);

    outfit(character, vec![items::greataxe(), items::hide_armor()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_modifier_floors_towards_negative_infinity() {
        let cases = [(1, -5), (8, -1), (9, -1), (10, 0), (11, 0), (12, 1), (15, 2), (20, 5), (30, 10)];
        for (score, expected) in cases {
            let scores = AbilityScores::new(score, 10, 10, 10, 10, 10);
            assert_eq!(scores.modifier(Ability::Strength), expected, "score {score}");
        }
    }

    #[test]
    fn test_damage_and_death() {
        let mut goblin = create_goblin("Snag");
        assert_eq!(goblin.current_hp(), 7);

        let result = goblin.take_damage(3);
        assert_eq!(result.damage_taken, 3);
        assert!(!result.died);
        assert_eq!(goblin.current_hp(), 4);

        let result = goblin.take_damage(50);
        assert_eq!(result.damage_taken, 4);
        assert!(result.died);
        assert_eq!(goblin.current_hp(), 0);
        assert_eq!(goblin.state(), LifeState::Dead);
    }

    #[test]
    fn test_heal_clamps_and_never_resurrects() {
        let mut fighter = create_sample_fighter("Roland");
        fighter.take_damage(10);
        assert_eq!(fighter.heal(100), 10);
        assert_eq!(fighter.current_hp(), fighter.max_hp());

        fighter.take_damage(1000);
        assert!(fighter.is_dead());
        assert_eq!(fighter.heal(10), 0);
        assert_eq!(fighter.current_hp(), 0);
        assert!(fighter.is_dead());
    }

    #[test]
    fn test_negative_amounts_are_ignored() {
        let mut fighter = create_sample_fighter("Roland");
        fighter.take_damage(5);
        assert_eq!(fighter.take_damage(-5).damage_taken, 0);
        assert_eq!(fighter.heal(-5), 0);
        assert_eq!(fighter.current_hp(), 23);
    }

    #[test]
    fn test_armor_class_from_equipment() {
        let mut character = Character::new(
            "Test",
            CharacterClass::Fighter,
            RaceType::Human,
            1,
            AbilityScores::new(10, 14, 10, 10, 10, 10),
            10,
        );
        assert_eq!(character.armor_class(), 12);

        character.equip(items::chain_shirt()).unwrap();
        assert_eq!(character.armor_class(), 15);

        // The best armor base wins; it does not stack.
        character.equip(items::leather_armor()).unwrap();
        assert_eq!(character.armor_class(), 15);

        character.equip(items::shield()).unwrap();
        character.equip(items::ring_of_protection()).unwrap();
        assert_eq!(character.armor_class(), 18);
        assert_eq!(character.calculate_armor_class(), 18);
        assert_eq!(character.equipped(EquipSlot::Accessory).len(), 1);

        let ring = character.unequip("ring of protection").unwrap();
        assert_eq!(ring.name, "Ring of Protection");
        assert_eq!(character.armor_class(), 17);
        assert!(character.equipped(EquipSlot::Accessory).is_empty());

        assert_eq!(
            character.unequip("Ring of Protection"),
            Err(CharacterError::NotEquipped("Ring of Protection".to_string()))
        );
    }

    #[test]
    fn test_potions_cannot_be_equipped() {
        let mut fighter = create_sample_fighter("Roland");
        let ac = fighter.armor_class();
        let result = fighter.equip(items::potion_of_healing());
        assert!(matches!(
            result,
            Err(CharacterError::InvalidEquip {
                item_type: ItemType::Potion,
                ..
            })
        ));
        assert_eq!(fighter.armor_class(), ac);
    }

    #[test]
    fn test_slot_consumption() {
        let mut wizard = create_sample_wizard("Elara");
        let missile = wizard.known_spell("magic missile").unwrap().clone();
        let fire_bolt = wizard.known_spell("Fire Bolt").unwrap().clone();

        assert!(wizard.can_cast(&missile));
        wizard.cast(&missile).unwrap();
        wizard.cast(&missile).unwrap();
        assert_eq!(wizard.slots_remaining(1), 0);
        assert!(!wizard.can_cast(&missile));
        assert!(matches!(
            wizard.cast(&missile),
            Err(CharacterError::NoSlotsAvailable { level: 1, .. })
        ));

        // Upcast with the level 2 slot.
        wizard.cast_at(&missile, 2).unwrap();
        assert_eq!(wizard.slots_remaining(2), 0);

        // Cantrips never use slots.
        for _ in 0..5 {
            wizard.cast(&fire_bolt).unwrap();
        }
    }

    #[test]
    fn test_restore_slots() {
        let mut wizard = create_sample_wizard("Elara");
        let missile = get_spell("Magic Missile").unwrap().clone();
        assert_eq!(wizard.max_slots(1), 2);
        assert_eq!(wizard.max_slots(2), 1);

        // Nothing to restore while full.
        assert!(!wizard.restore_slot(1));
        assert_eq!(wizard.slots_remaining(1), 2);

        wizard.cast(&missile).unwrap();
        wizard.cast(&missile).unwrap();
        wizard.cast_at(&missile, 2).unwrap();
        assert!(wizard.restore_slot(1));
        assert_eq!(wizard.slots_remaining(1), 1);

        wizard.restore_all_slots();
        assert_eq!(wizard.slots_remaining(1), 2);
        assert_eq!(wizard.slots_remaining(2), 1);
        assert!(!wizard.restore_slot(2));

        // A level the character never had stays empty.
        assert!(!wizard.restore_slot(3));
        assert_eq!(wizard.slots_remaining(3), 0);
    }

    #[test]
    fn test_cast_below_spell_level() {
        let mut wizard = create_sample_wizard("Elara");
        let fireball = get_spell("Fireball").unwrap().clone();
        wizard.spell_slots.insert(3, 1);
        assert!(matches!(
            wizard.cast_at(&fireball, 1),
            Err(CharacterError::SlotBelowSpellLevel { .. })
        ));
        assert_eq!(wizard.slots_remaining(1), 2);
    }

    #[test]
    fn test_learn_spell_respects_class() {
        let mut fighter = create_sample_fighter("Roland");
        assert!(matches!(
            fighter.learn_spell("Fireball"),
            Err(CharacterError::CannotLearn { .. })
        ));

        let mut wizard = create_sample_wizard("Elara");
        wizard.learn_spell("fireball").unwrap();
        assert!(wizard.known_spell("Fireball").is_some());
    }

    #[test]
    fn test_spellcasting_ability_by_class() {
        assert_eq!(create_sample_wizard("W").spellcasting_ability(), Ability::Intelligence);
        assert_eq!(create_sample_cleric("C").spellcasting_ability(), Ability::Wisdom);
        assert_eq!(create_sample_fighter("F").spellcasting_ability(), Ability::Intelligence);

        let cleric = create_sample_cleric("C");
        assert_eq!(cleric.spell_save_dc(), 8 + 2 + 3);
    }

    #[test]
    fn test_skill_checks() {
        let fighter = create_sample_fighter("Roland");
        assert_eq!(fighter.skill_modifier(Skill::Athletics), 3 + 2);
        assert_eq!(fighter.skill_modifier(Skill::Stealth), 2);

        let mut dice = ScriptedDice::new([10, 10]);
        let check = fighter.skill_check(Skill::Athletics, 15, &mut dice);
        assert_eq!(check.roll.total, 15);
        assert!(check.success);

        let check = fighter.skill_check_named("stealth", 15, &mut dice).unwrap();
        assert_eq!(check.roll.total, 12);
        assert!(!check.success);

        assert!(matches!(
            fighter.skill_check_named("juggling", 10, &mut dice),
            Err(CharacterError::UnknownSkill(_))
        ));
    }

    #[test]
    fn test_skill_and_ability_parsing() {
        assert_eq!("sleight_of_hand".parse::<Skill>().unwrap(), Skill::SleightOfHand);
        assert_eq!("Animal Handling".parse::<Skill>().unwrap(), Skill::AnimalHandling);
        assert_eq!("dex".parse::<Ability>().unwrap(), Ability::Dexterity);
        assert_eq!("Wisdom".parse::<Ability>().unwrap(), Ability::Wisdom);
        assert!("luck".parse::<Ability>().is_err());
    }

    #[test]
    fn test_inventory() {
        let mut fighter = create_sample_fighter("Roland");
        assert!(fighter.find_item("Potion of Healing").is_some());
        let potion = fighter.remove_item("potion of healing").unwrap();
        assert_eq!(potion.item_type, ItemType::Potion);
        assert!(fighter.find_item("Potion of Healing").is_none());
        assert!(matches!(
            fighter.remove_item("Potion of Healing"),
            Err(CharacterError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_primary_weapon_falls_back_to_unarmed() {
        let fighter = create_sample_fighter("Roland");
        assert_eq!(fighter.primary_weapon().name, "Longsword");

        let bare = Character::new(
            "Monk",
            CharacterClass::Monk,
            RaceType::Human,
            1,
            AbilityScores::default(),
            8,
        );
        assert_eq!(bare.primary_weapon().name, "Unarmed Strike");
    }
}
