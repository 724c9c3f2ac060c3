//! Items and the standard item catalog.
//!
//! One [`Item`] type covers weapons, armor, potions, and trinkets; the
//! optional fields say what an item can do in a fight. The catalog holds
//! the common weapons, armor, potions, and accessories by name.

use crate::character::CharacterError;
use crate::dice::DiceExpression;
use crate::rules::DamageType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reach of an ordinary melee weapon, in feet.
pub const DEFAULT_REACH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Weapon,
    Armor,
    Potion,
    Scroll,
    Wand,
    Ring,
    Amulet,
    Miscellaneous,
}

impl ItemType {
    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Weapon => "weapon",
            ItemType::Armor => "armor",
            ItemType::Potion => "potion",
            ItemType::Scroll => "scroll",
            ItemType::Wand => "wand",
            ItemType::Ring => "ring",
            ItemType::Amulet => "amulet",
            ItemType::Miscellaneous => "miscellaneous",
        }
    }

    /// Where an item of this type goes when equipped, if anywhere.
    pub fn equip_slot(&self) -> Option<EquipSlot> {
        match self {
            ItemType::Weapon => Some(EquipSlot::Weapon),
            ItemType::Armor => Some(EquipSlot::Armor),
            ItemType::Ring | ItemType::Amulet => Some(EquipSlot::Accessory),
            ItemType::Potion | ItemType::Scroll | ItemType::Wand | ItemType::Miscellaneous => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Accessory,
}

/// How far a weapon reaches, in feet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponRange {
    Melee { reach: u32 },
    /// Attacks beyond `normal` (up to `long`) are made at disadvantage.
    Ranged { normal: u32, long: u32 },
}

impl WeaponRange {
    /// The farthest a target may be.
    pub fn max_feet(&self) -> u32 {
        match self {
            WeaponRange::Melee { reach } => *reach,
            WeaponRange::Ranged { long, .. } => *long,
        }
    }
}

impl Default for WeaponRange {
    fn default() -> Self {
        WeaponRange::Melee {
            reach: DEFAULT_REACH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub description: String,
    pub item_type: ItemType,
    /// Weapon damage dice, e.g. "1d8".
    pub damage: Option<String>,
    pub damage_type: Option<DamageType>,
    pub range: Option<WeaponRange>,
    /// Base AC when worn as armor.
    pub armor_class: Option<i32>,
    /// Flat AC bonus while equipped (shields, rings).
    pub ac_bonus: i32,
    pub hit_bonus: i32,
    /// Finesse weapons use the better of STR and DEX.
    pub finesse: bool,
    /// Healing dice for potions.
    pub healing: Option<String>,
    pub weight: f32,
}

impl Item {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            item_type,
            damage: None,
            damage_type: None,
            range: None,
            armor_class: None,
            ac_bonus: 0,
            hit_bonus: 0,
            finesse: false,
            healing: None,
            weight: 0.0,
        }
    }

    /// A melee weapon with 5 ft reach.
    pub fn weapon(name: impl Into<String>, damage: &str, damage_type: DamageType) -> Self {
        let mut item = Self::new(name, ItemType::Weapon);
        item.damage = Some(damage.to_string());
        item.damage_type = Some(damage_type);
        item.range = Some(WeaponRange::default());
        item
    }

    pub fn armor(name: impl Into<String>, base_ac: i32) -> Self {
        let mut item = Self::new(name, ItemType::Armor);
        item.armor_class = Some(base_ac);
        item
    }

    pub fn potion(name: impl Into<String>, healing: &str) -> Self {
        let mut item = Self::new(name, ItemType::Potion);
        item.healing = Some(healing.to_string());
        item
    }

    pub fn with_range(mut self, normal: u32, long: u32) -> Self {
        self.range = Some(WeaponRange::Ranged { normal, long });
        self
    }

    pub fn with_reach(mut self, reach: u32) -> Self {
        self.range = Some(WeaponRange::Melee { reach });
        self
    }

    pub fn with_ac_bonus(mut self, bonus: i32) -> Self {
        self.ac_bonus = bonus;
        self
    }

    pub fn with_hit_bonus(mut self, bonus: i32) -> Self {
        self.hit_bonus = bonus;
        self
    }

    pub fn finesse(mut self) -> Self {
        self.finesse = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_ranged(&self) -> bool {
        matches!(self.range, Some(WeaponRange::Ranged { .. }))
    }

    pub fn weapon_range(&self) -> WeaponRange {
        self.range.unwrap_or_default()
    }

    pub fn is_consumable(&self) -> bool {
        self.item_type == ItemType::Potion && self.healing.is_some()
    }

    /// Parsed weapon damage; items without damage dice deal 1.
    pub fn damage_dice(&self) -> Result<DiceExpression, CharacterError> {
        self.parse_dice(self.damage.as_deref().unwrap_or("1"))
    }

    pub fn healing_dice(&self) -> Option<Result<DiceExpression, CharacterError>> {
        self.healing.as_deref().map(|notation| self.parse_dice(notation))
    }

    fn parse_dice(&self, notation: &str) -> Result<DiceExpression, CharacterError> {
        DiceExpression::parse(notation).map_err(|source| CharacterError::BadItemDice {
            item: self.name.clone(),
            source,
        })
    }
}

// ============================================================================
// Named items
// ============================================================================

pub fn unarmed_strike() -> Item {
    Item::weapon("Unarmed Strike", "1", DamageType::Bludgeoning)
        .with_description("A punch, kick, or head-butt.")
}

pub fn dagger() -> Item {
    Item::weapon("Dagger", "1d4", DamageType::Piercing)
        .finesse()
        .with_weight(1.0)
}

pub fn mace() -> Item {
    Item::weapon("Mace", "1d6", DamageType::Bludgeoning).with_weight(4.0)
}

pub fn scimitar() -> Item {
    Item::weapon("Scimitar", "1d6", DamageType::Slashing)
        .finesse()
        .with_weight(3.0)
}

pub fn longsword() -> Item {
    Item::weapon("Longsword", "1d8", DamageType::Slashing).with_weight(3.0)
}

pub fn greataxe() -> Item {
    Item::weapon("Greataxe", "1d12", DamageType::Slashing).with_weight(7.0)
}

pub fn shortbow() -> Item {
    Item::weapon("Shortbow", "1d6", DamageType::Piercing)
        .with_range(80, 320)
        .with_weight(2.0)
}

pub fn longbow() -> Item {
    Item::weapon("Longbow", "1d8", DamageType::Piercing)
        .with_range(150, 600)
        .with_weight(2.0)
}

pub fn leather_armor() -> Item {
    Item::armor("Leather Armor", 11).with_weight(10.0)
}

pub fn hide_armor() -> Item {
    Item::armor("Hide Armor", 12).with_weight(12.0)
}

pub fn chain_shirt() -> Item {
    Item::armor("Chain Shirt", 13).with_weight(20.0)
}

pub fn scale_mail() -> Item {
    Item::armor("Scale Mail", 14).with_weight(45.0)
}

/// Shields add to AC without replacing the armor base.
pub fn shield() -> Item {
    Item::new("Shield", ItemType::Armor)
        .with_ac_bonus(2)
        .with_weight(6.0)
}

pub fn ring_of_protection() -> Item {
    Item::new("Ring of Protection", ItemType::Ring)
        .with_ac_bonus(1)
        .with_description("A silver band that turns aside blows.")
}

pub fn potion_of_healing() -> Item {
    Item::potion("Potion of Healing", "2d4+2")
        .with_description("A red liquid that glimmers when agitated.")
        .with_weight(0.5)
}

// ============================================================================
// Catalog
// ============================================================================

lazy_static::lazy_static! {
    /// Standard weapons.
    pub static ref WEAPONS: Vec<Item> = vec![
        unarmed_strike(),
        Item::weapon("Club", "1d4", DamageType::Bludgeoning).with_weight(2.0),
        dagger(),
        Item::weapon("Handaxe", "1d6", DamageType::Slashing).with_weight(2.0),
        mace(),
        Item::weapon("Quarterstaff", "1d6", DamageType::Bludgeoning).with_weight(4.0),
        Item::weapon("Spear", "1d6", DamageType::Piercing).with_weight(3.0),
        Item::weapon("Battleaxe", "1d8", DamageType::Slashing).with_weight(4.0),
        longsword(),
        Item::weapon("Rapier", "1d8", DamageType::Piercing).finesse().with_weight(2.0),
        scimitar(),
        Item::weapon("Shortsword", "1d6", DamageType::Piercing).finesse().with_weight(2.0),
        Item::weapon("Warhammer", "1d8", DamageType::Bludgeoning).with_weight(2.0),
        Item::weapon("Greatsword", "2d6", DamageType::Slashing).with_weight(6.0),
        greataxe(),
        Item::weapon("Glaive", "1d10", DamageType::Slashing).with_reach(10).with_weight(6.0),
        Item::weapon("Light Crossbow", "1d8", DamageType::Piercing)
            .with_range(80, 320)
            .with_weight(5.0),
        shortbow(),
        longbow(),
    ];

    /// Standard armor and shields.
    pub static ref ARMORS: Vec<Item> = vec![
        Item::armor("Padded Armor", 11).with_weight(8.0),
        leather_armor(),
        Item::armor("Studded Leather", 12).with_weight(13.0),
        hide_armor(),
        chain_shirt(),
        scale_mail(),
        Item::armor("Breastplate", 14).with_weight(20.0),
        Item::armor("Chain Mail", 16).with_weight(55.0),
        Item::armor("Plate Armor", 18).with_weight(65.0),
        shield(),
    ];

    /// Healing potions.
    pub static ref POTIONS: Vec<Item> = vec![
        potion_of_healing(),
        Item::potion("Potion of Greater Healing", "4d4+4").with_weight(0.5),
        Item::potion("Potion of Superior Healing", "8d4+8").with_weight(0.5),
    ];

    /// Rings and amulets.
    pub static ref ACCESSORIES: Vec<Item> = vec![
        ring_of_protection(),
        Item::new("Amulet of Health", ItemType::Amulet)
            .with_description("A heavy pendant set with a red stone."),
    ];
}

fn lookup(list: &[Item], name: &str) -> Option<Item> {
    list.iter()
        .find(|item| item.name.eq_ignore_ascii_case(name))
        .cloned()
}

/// Get a standard weapon by name.
pub fn get_weapon(name: &str) -> Option<Item> {
    lookup(&WEAPONS, name)
}

/// Get a standard armor piece by name.
pub fn get_armor(name: &str) -> Option<Item> {
    lookup(&ARMORS, name)
}

/// Get a standard potion by name.
pub fn get_potion(name: &str) -> Option<Item> {
    lookup(&POTIONS, name)
}

/// Try to find any standard item by name.
pub fn find_item(name: &str) -> Option<Item> {
    get_weapon(name)
        .or_else(|| get_armor(name))
        .or_else(|| get_potion(name))
        .or_else(|| lookup(&ACCESSORIES, name))
}
