//! Initiative rolls and turn order.

use crate::character::{Ability, Character, CharacterId};
use crate::dice::{DiceExpression, DiceSource};
use serde::{Deserialize, Serialize};

/// One combatant's place in the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub id: CharacterId,
    pub name: String,
    /// The natural d20.
    pub roll: i32,
    pub modifier: i32,
    pub total: i32,
    pub dex_modifier: i32,
    /// Position in the roster the entry was rolled from; breaks remaining ties.
    pub seat: usize,
}

/// Roll `1d20 + initiative modifier` for each character and sort the results.
///
/// Higher totals go first; ties go to the higher dexterity modifier and
/// then to whoever came first in `characters`.
pub fn roll_initiative<'a>(
    characters: impl IntoIterator<Item = &'a Character>,
    dice: &mut dyn DiceSource,
) -> Vec<InitiativeEntry> {
    let mut entries: Vec<InitiativeEntry> = characters
        .into_iter()
        .enumerate()
        .map(|(seat, character)| {
            let modifier = character.initiative_modifier();
            let roll = DiceExpression::d20().with_modifier(modifier).roll(dice);
            InitiativeEntry {
                id: character.id,
                name: character.name.clone(),
                roll: roll.total - modifier,
                modifier,
                total: roll.total,
                dex_modifier: character.modifier(Ability::Dexterity),
                seat,
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then(b.dex_modifier.cmp(&a.dex_modifier))
            .then(a.seat.cmp(&b.seat))
    });
    entries
}

/// A fixed turn order that cycles forever, skipping combatants for whom
/// `is_active` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeOrder {
    entries: Vec<InitiativeEntry>,
    current: usize,
    round: u32,
}

impl InitiativeOrder {
    pub fn new(entries: Vec<InitiativeEntry>) -> Self {
        Self {
            entries,
            current: 0,
            round: 1,
        }
    }

    pub fn entries(&self) -> &[InitiativeEntry] {
        &self.entries
    }

    pub fn current(&self) -> Option<&InitiativeEntry> {
        self.entries.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Make sure the current entry is active, moving forward if it isn't.
    pub fn settle(&mut self, is_active: impl Fn(CharacterId) -> bool) -> Option<&InitiativeEntry> {
        match self.current() {
            Some(entry) if is_active(entry.id) => self.current(),
            _ => self.advance(is_active),
        }
    }

    /// Step to the next active entry, wrapping around (and counting a new
    /// round) past the end. Returns `None` if nobody is active.
    pub fn advance(&mut self, is_active: impl Fn(CharacterId) -> bool) -> Option<&InitiativeEntry> {
        let len = self.entries.len();
        for _ in 0..len {
            self.current += 1;
            if self.current >= len {
                self.current = 0;
                self.round += 1;
            }
            if is_active(self.entries[self.current].id) {
                return self.current();
            }
        }
        None
    }
}
