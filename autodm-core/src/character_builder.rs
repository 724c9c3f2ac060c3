//! Character builder for D&D 5e character creation.
//!
//! Ability scores come from the standard array or `4d6kh3` rolls and are
//! assigned in the class's priority order; race, class and level fill in
//! the rest (hit points, proficiency, slots, skills, starting spells).

use crate::character::{Ability, AbilityScores, Character, CharacterClass, CharacterError, RaceType, Skill};
use crate::dice::{DiceError, DiceExpression, DiceSource};
use crate::grid::Position;
use crate::items::Item;
use thiserror::Error;

/// Method for determining ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbilityMethod {
    /// Standard array: 15, 14, 13, 12, 10, 8
    #[default]
    StandardArray,
    /// Roll 4d6, drop lowest, 6 times
    Rolled,
}

impl AbilityMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AbilityMethod::StandardArray => "Standard Array",
            AbilityMethod::Rolled => "Rolled",
        }
    }
}

/// Standard array values.
pub const STANDARD_ARRAY: [u8; 6] = [15, 14, 13, 12, 10, 8];

/// Error from character building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("character name is required")]
    MissingName,
    #[error("race selection is required")]
    MissingRace,
    #[error("class selection is required")]
    MissingClass,
    #[error("level must be between 1 and 20, got {0}")]
    InvalidLevel(u8),
    #[error("expected {expected} skills, got {got}")]
    InvalidSkillCount { expected: usize, got: usize },
    #[error("{0} is not available to a {1}")]
    SkillNotAvailable(Skill, CharacterClass),
    #[error("half-elf bonuses must go to two different abilities other than charisma")]
    InvalidHalfElfBonuses,
    #[error(transparent)]
    Dice(#[from] DiceError),
    #[error(transparent)]
    Character(#[from] CharacterError),
}

/// Builder for creating D&D 5e characters.
#[derive(Debug, Clone)]
pub struct CharacterBuilder {
    name: Option<String>,
    race: Option<RaceType>,
    class: Option<CharacterClass>,
    level: u8,
    ability_method: AbilityMethod,
    ability_scores: Option<AbilityScores>,
    selected_skills: Option<Vec<Skill>>,
    /// For Half-Elf: two additional +1 ability bonuses
    half_elf_bonus_abilities: Option<[Ability; 2]>,
    speed: Option<u32>,
    position: Option<Position>,
    equipment: Vec<Item>,
    inventory: Vec<Item>,
}

impl Default for CharacterBuilder {
    fn default() -> Self {
        Self {
            name: None,
            race: None,
            class: None,
            level: 1,
            ability_method: AbilityMethod::default(),
            ability_scores: None,
            selected_skills: None,
            half_elf_bonus_abilities: None,
            speed: None,
            position: None,
            equipment: Vec::new(),
            inventory: Vec::new(),
        }
    }
}

impl CharacterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn race(mut self, race: RaceType) -> Self {
        self.race = Some(race);
        self
    }

    pub fn class(mut self, class: CharacterClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    pub fn ability_method(mut self, method: AbilityMethod) -> Self {
        self.ability_method = method;
        self
    }

    /// Use these scores (before racial bonuses) instead of generating them.
    pub fn ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = Some(scores);
        self
    }

    /// Choose skill proficiencies from the class list. Without this, they
    /// are picked at random.
    pub fn skills(mut self, skills: Vec<Skill>) -> Self {
        self.selected_skills = Some(skills);
        self
    }

    /// For Half-Elf: set the two abilities that get +1 bonus. Without this,
    /// they are picked at random.
    pub fn half_elf_bonuses(mut self, abilities: [Ability; 2]) -> Self {
        self.half_elf_bonus_abilities = Some(abilities);
        self
    }

    pub fn speed(mut self, speed: u32) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Equip an item once the character is built.
    pub fn equip(mut self, item: Item) -> Self {
        self.equipment.push(item);
        self
    }

    /// Carry an item in the inventory.
    pub fn carry(mut self, item: Item) -> Self {
        self.inventory.push(item);
        self
    }

    /// Build the character. `dice` is only used for the parts left to
    /// chance: rolled scores, unchosen skills and half-elf bonuses.
    pub fn build(self, dice: &mut dyn DiceSource) -> Result<Character, BuilderError> {
        let name = self.name.ok_or(BuilderError::MissingName)?;
        let race = self.race.ok_or(BuilderError::MissingRace)?;
        let class = self.class.ok_or(BuilderError::MissingClass)?;
        if !(1..=20).contains(&self.level) {
            return Err(BuilderError::InvalidLevel(self.level));
        }
        let class_data = class.data();

        let mut abilities = match self.ability_scores {
            Some(scores) => scores,
            None => {
                let values = match self.ability_method {
                    AbilityMethod::StandardArray => STANDARD_ARRAY,
                    AbilityMethod::Rolled => roll_ability_scores(dice)?,
                };
                assign_by_priority(values, &class_data.ability_priority)
            }
        };

        race.apply_ability_bonuses(&mut abilities);
        if race == RaceType::HalfElf {
            let bonuses = match self.half_elf_bonus_abilities {
                Some(bonuses) => bonuses,
                None => {
                    let options: Vec<Ability> = Ability::all()
                        .into_iter()
                        .filter(|a| *a != Ability::Charisma)
                        .collect();
                    let picked = pick_distinct(&options, 2, dice);
                    [picked[0], picked[1]]
                }
            };
            if bonuses[0] == bonuses[1] || bonuses.contains(&Ability::Charisma) {
                return Err(BuilderError::InvalidHalfElfBonuses);
            }
            for ability in bonuses {
                abilities.increase(ability, 1);
            }
        }

        let skills = match self.selected_skills {
            Some(skills) => {
                if skills.len() != class_data.skill_count {
                    return Err(BuilderError::InvalidSkillCount {
                        expected: class_data.skill_count,
                        got: skills.len(),
                    });
                }
                if let Some(skill) = skills
                    .iter()
                    .find(|s| !class_data.skill_options.contains(*s))
                {
                    return Err(BuilderError::SkillNotAvailable(*skill, class));
                }
                skills
            }
            None => pick_distinct(class_data.skill_options, class_data.skill_count, dice),
        };

        let max_hp = hit_points(class, self.level, abilities.modifier(Ability::Constitution));
        let mut character = Character::new(name, class, race, self.level, abilities, max_hp);
        if let Some(speed) = self.speed {
            character = character.with_speed(speed);
        }
        if let Some(position) = self.position {
            character = character.with_position(position);
        }
        for skill in skills {
            character = character.with_skill(skill);
        }
        character.spell_slots = class_data.caster.slots_at(self.level);
        character.max_spell_slots = character.spell_slots.clone();
        for spell in class_data.default_spells {
            character.learn_spell(spell)?;
        }
        for item in self.equipment {
            character.equip(item)?;
        }
        for item in self.inventory {
            character.add_item(item);
        }
        Ok(character)
    }
}

/// Hit die plus CON at level 1, then the rounded-up average (die / 2 + 1)
/// plus CON for every level after. Every level adds at least 1.
pub fn hit_points(class: CharacterClass, level: u8, con_mod: i32) -> i32 {
    let die = class.hit_die() as i32;
    let first = (die + con_mod).max(1);
    let per_level = (die / 2 + 1 + con_mod).max(1);
    first + per_level * (level.max(1) as i32 - 1)
}

/// Roll a full set of six `4d6kh3` scores, highest first.
pub fn roll_ability_scores(dice: &mut dyn DiceSource) -> Result<[u8; 6], DiceError> {
    let expr = DiceExpression::parse("4d6kh3")?;
    let mut scores = [0u8; 6];
    for score in scores.iter_mut() {
        *score = expr.roll(dice).total.clamp(3, 18) as u8;
    }
    scores.sort_unstable_by(|a, b| b.cmp(a));
    Ok(scores)
}

fn assign_by_priority(values: [u8; 6], priority: &[Ability; 6]) -> AbilityScores {
    let mut sorted = values;
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut scores = AbilityScores::default();
    for (ability, value) in priority.iter().zip(sorted) {
        scores.set(*ability, value);
    }
    scores
}

/// Pick `count` distinct options, each uniformly from what is left.
fn pick_distinct<T: Copy>(options: &[T], count: usize, dice: &mut dyn DiceSource) -> Vec<T> {
    let mut remaining = options.to_vec();
    let mut picked = Vec::with_capacity(count);
    while picked.len() < count && !remaining.is_empty() {
        let index = dice.roll_die(remaining.len() as u32) as usize - 1;
        picked.push(remaining.remove(index.min(remaining.len() - 1)));
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items;
    use crate::spells::get_spell;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_build_fighter_standard_array() {
        let mut dice = ScriptedDice::default();
        let fighter = CharacterBuilder::new()
            .name("Roland")
            .race(RaceType::Human)
            .class(CharacterClass::Fighter)
            .level(3)
            .skills(vec![Skill::Athletics, Skill::Perception])
            .equip(items::longsword())
            .equip(items::chain_shirt())
            .carry(items::potion_of_healing())
            .build(&mut dice)
            .unwrap();

        // STR 15, CON 14, DEX 13, WIS 12, CHA 10, INT 8, +1 each for humans.
        assert_eq!(fighter.abilities, AbilityScores::new(16, 14, 15, 9, 13, 11));
        // 10 + 2, then 2 levels of (6 + 2).
        assert_eq!(fighter.max_hp(), 28);
        assert_eq!(fighter.current_hp(), 28);
        assert_eq!(fighter.proficiency_bonus, 2);
        assert_eq!(fighter.skill_modifier(Skill::Athletics), 3 + 2);
        assert_eq!(fighter.armor_class(), 13 + 2);
        assert!(fighter.spell_slots.is_empty());
        assert!(fighter.spells.is_empty());
        assert!(fighter.find_item("Potion of Healing").is_some());
    }

    #[test]
    fn test_build_wizard_gets_slots_and_spells() {
        let mut dice = ScriptedDice::new([1, 1]);
        let wizard = CharacterBuilder::new()
            .name("Elara")
            .race(RaceType::Elf)
            .class(CharacterClass::Wizard)
            .build(&mut dice)
            .unwrap();

        assert_eq!(wizard.abilities.intelligence, 15);
        assert_eq!(wizard.abilities.dexterity, 15);
        // d6 + CON 2
        assert_eq!(wizard.max_hp(), 8);
        assert_eq!(wizard.slots_remaining(1), 2);
        assert_eq!(wizard.slots_remaining(2), 0);
        for spell in ["Fire Bolt", "Magic Missile", "Shield"] {
            assert!(wizard.known_spell(spell).is_some(), "{spell}");
        }
        // Random skills: first option, then the first of what is left.
        assert_eq!(wizard.skills[&Skill::Arcana], 2);
        assert_eq!(wizard.skills[&Skill::History], 2);
        assert_eq!(wizard.skills[&Skill::Insight], 0);
    }

    #[test]
    fn test_half_caster_slots_start_at_level_two() {
        let build = |level| {
            CharacterBuilder::new()
                .name("Sir Kay")
                .race(RaceType::Dragonborn)
                .class(CharacterClass::Paladin)
                .level(level)
                .skills(vec![Skill::Athletics, Skill::Religion])
                .build(&mut ScriptedDice::default())
                .unwrap()
        };
        assert!(build(1).spell_slots.is_empty());
        assert_eq!(build(2).slots_remaining(1), 2);
        assert_eq!(build(5).slots_remaining(2), 1);
        assert!(build(1).known_spell("Cure Wounds").is_some());

        // Spent slots come back up to the level's maximum.
        let mut paladin = build(2);
        assert_eq!(paladin.max_slots(1), 2);
        let cure = get_spell("Cure Wounds").unwrap();
        paladin.cast(cure).unwrap();
        paladin.cast(cure).unwrap();
        assert!(!paladin.can_cast(cure));
        paladin.restore_all_slots();
        assert_eq!(paladin.slots_remaining(1), 2);
        assert!(!paladin.restore_slot(1));
    }

    #[test]
    fn test_missing_fields_and_bad_skills() {
        let mut dice = ScriptedDice::default();
        let err = CharacterBuilder::new()
            .race(RaceType::Human)
            .class(CharacterClass::Fighter)
            .build(&mut dice)
            .unwrap_err();
        assert_eq!(err, BuilderError::MissingName);

        let err = CharacterBuilder::new()
            .name("Roland")
            .race(RaceType::Human)
            .class(CharacterClass::Fighter)
            .skills(vec![Skill::Athletics])
            .build(&mut dice)
            .unwrap_err();
        assert_eq!(err, BuilderError::InvalidSkillCount { expected: 2, got: 1 });

        let err = CharacterBuilder::new()
            .name("Roland")
            .race(RaceType::Human)
            .class(CharacterClass::Fighter)
            .skills(vec![Skill::Athletics, Skill::Arcana])
            .build(&mut dice)
            .unwrap_err();
        assert_eq!(
            err,
            BuilderError::SkillNotAvailable(Skill::Arcana, CharacterClass::Fighter)
        );

        let err = CharacterBuilder::new()
            .name("Roland")
            .race(RaceType::Human)
            .class(CharacterClass::Fighter)
            .level(0)
            .build(&mut dice)
            .unwrap_err();
        assert_eq!(err, BuilderError::InvalidLevel(0));
    }

    #[test]
    fn test_half_elf_bonuses() {
        let mut dice = ScriptedDice::default();
        let bard = CharacterBuilder::new()
            .name("Lia")
            .race(RaceType::HalfElf)
            .class(CharacterClass::Bard)
            .ability_scores(AbilityScores::default())
            .half_elf_bonuses([Ability::Dexterity, Ability::Constitution])
            .skills(vec![Skill::Performance, Skill::Persuasion])
            .build(&mut dice)
            .unwrap();
        assert_eq!(bard.abilities, AbilityScores::new(10, 11, 11, 10, 10, 12));

        let err = CharacterBuilder::new()
            .name("Lia")
            .race(RaceType::HalfElf)
            .class(CharacterClass::Bard)
            .half_elf_bonuses([Ability::Charisma, Ability::Dexterity])
            .build(&mut dice)
            .unwrap_err();
        assert_eq!(err, BuilderError::InvalidHalfElfBonuses);
    }

    #[test]
    fn test_rolled_scores_keep_highest_three() {
        // Six sets of four dice; the lowest of each is dropped.
        let mut dice = ScriptedDice::new([
            6, 6, 6, 1, // 18
            5, 5, 5, 5, // 15
            1, 2, 3, 4, // 9
            4, 4, 4, 1, // 12
            3, 3, 3, 3, // 9
            2, 2, 2, 2, // 6
        ]);
        let scores = roll_ability_scores(&mut dice).unwrap();
        assert_eq!(scores, [18, 15, 12, 9, 9, 6]);
        assert_eq!(dice.remaining(), 0);
    }

    #[test]
    fn test_hit_points_never_drop_below_one_per_level() {
        assert_eq!(hit_points(CharacterClass::Wizard, 1, -5), 1);
        assert_eq!(hit_points(CharacterClass::Wizard, 3, -5), 3);
        assert_eq!(hit_points(CharacterClass::Barbarian, 1, 3), 15);
    }
}
