//! Combatants and the shared battle state the rules engine reads.

use crate::character::{Character, CharacterId};
use crate::grid::Grid;
use crate::turn::TurnState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the fight a combatant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "side A"),
            Side::B => write!(f, "side B"),
        }
    }
}

/// Who picks a combatant's intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    Player,
    Npc,
}

/// A character enrolled in a battle, with its side and turn budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub character: Character,
    pub side: Side,
    pub controller: Controller,
    pub turn: TurnState,
}

impl Combatant {
    /// The side is assigned when the battle is built.
    pub fn new(character: Character, controller: Controller) -> Self {
        let turn = TurnState::new(character.speed);
        Self {
            character,
            side: Side::A,
            controller,
            turn,
        }
    }

    pub fn player(character: Character) -> Self {
        Self::new(character, Controller::Player)
    }

    pub fn npc(character: Character) -> Self {
        Self::new(character, Controller::Npc)
    }

    pub fn id(&self) -> CharacterId {
        self.character.id
    }

    pub fn name(&self) -> &str {
        &self.character.name
    }

    pub fn is_alive(&self) -> bool {
        self.character.is_alive()
    }

    /// Fresh action budget and full movement.
    pub fn begin_turn(&mut self) {
        self.turn.reset(self.character.speed);
        self.character.reset_movement();
    }
}

/// Everything the rules engine needs to resolve an intent.
#[derive(Debug, Clone)]
pub struct BattleView {
    combatants: Vec<Combatant>,
    grid: Grid,
}

impl BattleView {
    pub fn new(combatants: Vec<Combatant>, grid: Grid) -> Self {
        Self { combatants, grid }
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn get(&self, id: CharacterId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: CharacterId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id() == id)
    }

    /// Case-insensitive lookup, dead or alive.
    pub fn find_by_name(&self, name: &str) -> Option<&Combatant> {
        let name = name.trim();
        self.combatants
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn living(&self, side: Side) -> impl Iterator<Item = &Combatant> {
        self.combatants
            .iter()
            .filter(move |c| c.side == side && c.is_alive())
    }

    pub fn is_side_defeated(&self, side: Side) -> bool {
        self.living(side).next().is_none()
    }

    /// Living combatants on the other side from `id`.
    pub fn enemies_of(&self, id: CharacterId) -> Vec<&Combatant> {
        match self.get(id) {
            Some(me) => self.living(me.side.opponent()).collect(),
            None => Vec::new(),
        }
    }

    /// Living combatants on the same side as `id`, including `id` itself.
    pub fn allies_of(&self, id: CharacterId) -> Vec<&Combatant> {
        match self.get(id) {
            Some(me) => self.living(me.side).collect(),
            None => Vec::new(),
        }
    }

    /// Grid distance in feet between two combatants.
    pub fn distance_feet(&self, a: CharacterId, b: CharacterId) -> Option<u32> {
        let a = self.get(a)?;
        let b = self.get(b)?;
        Some(
            self.grid
                .distance_feet(a.character.position, b.character.position),
        )
    }

    /// Living enemies within `range_feet` of `id`, closest first.
    pub fn enemies_in_range(&self, id: CharacterId, range_feet: u32) -> Vec<&Combatant> {
        let mut enemies: Vec<(u32, &Combatant)> = self
            .enemies_of(id)
            .into_iter()
            .filter_map(|enemy| {
                let distance = self.distance_feet(id, enemy.id())?;
                (distance <= range_feet).then_some((distance, enemy))
            })
            .collect();
        enemies.sort_by_key(|(distance, _)| *distance);
        enemies.into_iter().map(|(_, enemy)| enemy).collect()
    }

    pub fn nearest_enemy(&self, id: CharacterId) -> Option<&Combatant> {
        self.enemies_of(id)
            .into_iter()
            .filter_map(|enemy| Some((self.distance_feet(id, enemy.id())?, enemy)))
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, enemy)| enemy)
    }
}
