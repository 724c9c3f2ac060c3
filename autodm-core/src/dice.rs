//! Dice notation parsing and rolling.
//!
//! Supports standard dice notation: XdY+Z, several dice groups in one
//! expression, keep highest/lowest, and advantage/disadvantage on d20 rolls.
//!
//! Every roll draws from a [`DiceSource`]. Battles own a seeded
//! [`RngDice`]; tests substitute a scripted source to pin exact results.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest number of dice a single group may roll.
pub const MAX_DICE: u32 = 100;

/// Largest die size accepted by the parser.
pub const MAX_SIDES: u32 = 1000;

/// Largest flat modifier a single term may carry.
pub const MAX_MODIFIER: i32 = 10_000;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice: {0}")]
    TooManyDice(u32),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// A source of die rolls.
pub trait DiceSource {
    /// Roll one die, returning a value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// A [`DiceSource`] backed by a `rand` RNG.
#[derive(Debug, Clone)]
pub struct RngDice<R = StdRng> {
    rng: R,
}

impl<R: Rng> RngDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngDice<StdRng> {
    /// Deterministic dice: the same seed always produces the same rolls.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> DiceSource for RngDice<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// One group of identical dice within an expression, e.g. the `4d6kh3` in `4d6kh3+2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

impl DiceComponent {
    fn has_keep(&self) -> bool {
        self.keep_highest.is_some() || self.keep_lowest.is_some()
    }
}

impl fmt::Display for DiceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if let Some(keep) = self.keep_highest {
            write!(f, "kh{keep}")?;
        }
        if let Some(keep) = self.keep_lowest {
            write!(f, "kl{keep}")?;
        }
        Ok(())
    }
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
}

impl DiceExpression {
    /// A single d20 with no modifier.
    pub fn d20() -> Self {
        Self {
            components: vec![DiceComponent {
                count: 1,
                sides: 20,
                keep_highest: None,
                keep_lowest: None,
            }],
            modifier: 0,
        }
    }

    /// A constant with no dice.
    pub fn flat(value: i32) -> Self {
        Self {
            components: Vec::new(),
            modifier: value,
        }
    }

    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let normalized = notation.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;
        let mut seen_term = false;
        let mut dangling_sign = false;

        for ch in normalized.chars() {
            match ch {
                '+' | '-' => {
                    if current.is_empty() {
                        // Only a single leading sign may appear without a term before it.
                        if seen_term || dangling_sign {
                            return Err(DiceError::InvalidNotation(notation.to_string()));
                        }
                    } else {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                        seen_term = true;
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                    dangling_sign = true;
                }
                c if c.is_whitespace() => continue,
                _ => {
                    current.push(ch);
                    dangling_sign = false;
                }
            }
        }

        if current.is_empty() {
            if dangling_sign {
                return Err(DiceError::InvalidNotation(notation.to_string()));
            }
        } else {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let Some(d_pos) = s.find('d') else {
            let value: i32 = s
                .parse()
                .ok()
                .filter(|v| *v <= MAX_MODIFIER)
                .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = modifier
                .checked_add(sign * value)
                .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;
            return Ok(());
        };

        if sign < 0 {
            return Err(DiceError::InvalidNotation(format!("-{s}")));
        }

        let count_str = &s[..d_pos];
        let rest = &s[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
        };

        let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
            let keep: u32 = rest[kh_pos + 2..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            (&rest[..kh_pos], Some(keep), None)
        } else if let Some(kl_pos) = rest.find("kl") {
            let keep: u32 = rest[kl_pos + 2..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            (&rest[..kl_pos], None, Some(keep))
        } else {
            (rest, None, None)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

        if count == 0 {
            return Err(DiceError::NoDice);
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice(count));
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::InvalidDieSize(sides));
        }
        if let Some(keep) = keep_highest.or(keep_lowest) {
            if keep == 0 || keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: s.to_string(),
                });
            }
        }

        components.push(DiceComponent {
            count,
            sides,
            keep_highest,
            keep_lowest,
        });
        Ok(())
    }

    /// Add a flat amount to the expression.
    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = self.modifier.saturating_add(modifier);
        self
    }

    /// Multiply every dice count by `factor` (cantrip damage tiers).
    pub fn scaled(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        let components = self
            .components
            .iter()
            .map(|c| DiceComponent {
                count: c.count.saturating_mul(factor),
                sides: c.sides,
                keep_highest: c.keep_highest.map(|k| k * factor),
                keep_lowest: c.keep_lowest.map(|k| k * factor),
            })
            .collect();
        Self {
            components,
            modifier: self.modifier,
        }
    }

    /// Append another expression's dice and modifier, merging plain groups of the same die.
    pub fn plus(mut self, other: &DiceExpression) -> Self {
        for extra in &other.components {
            let existing = self
                .components
                .iter_mut()
                .find(|c| c.sides == extra.sides && !c.has_keep() && !extra.has_keep());
            match existing {
                Some(component) => component.count += extra.count,
                None => self.components.push(extra.clone()),
            }
        }
        self.modifier += other.modifier;
        self
    }

    /// Expected value of a roll, ignoring keep rules.
    pub fn average(&self) -> f32 {
        let dice: f32 = self
            .components
            .iter()
            .map(|c| {
                let kept = c.keep_highest.or(c.keep_lowest).unwrap_or(c.count);
                kept as f32 * (c.sides as f32 + 1.0) / 2.0
            })
            .sum();
        dice + self.modifier as f32
    }

    /// Roll the dice expression and return the result.
    pub fn roll(&self, dice: &mut dyn DiceSource) -> RollResult {
        let mut component_results = Vec::with_capacity(self.components.len());

        for component in &self.components {
            let rolls: Vec<u32> = (0..component.count)
                .map(|_| dice.roll_die(component.sides))
                .collect();

            let mut kept = rolls.clone();
            if let Some(keep) = component.keep_highest {
                kept.sort_by(|a, b| b.cmp(a));
                kept.truncate(keep as usize);
            } else if let Some(keep) = component.keep_lowest {
                kept.sort();
                kept.truncate(keep as usize);
            }

            let subtotal: u32 = kept.iter().sum();
            component_results.push(ComponentResult {
                sides: component.sides,
                rolls,
                kept,
                subtotal,
            });
        }

        let dice_total = component_results
            .iter()
            .fold(0i32, |acc, c| acc.saturating_add(c.subtotal as i32));

        // Natural 20/1 only matter for a lone d20 (attack rolls, saves, checks).
        let d20_roll = if self.is_single_d20() {
            component_results.first().and_then(|c| c.rolls.first().copied())
        } else {
            None
        };

        RollResult {
            notation: self.to_string(),
            component_results,
            modifier: self.modifier,
            total: dice_total.saturating_add(self.modifier),
            natural_20: d20_roll == Some(20),
            natural_1: d20_roll == Some(1),
        }
    }

    /// Roll with advantage/disadvantage (only applies to single d20 rolls).
    pub fn roll_with_advantage(&self, advantage: Advantage, dice: &mut dyn DiceSource) -> RollResult {
        let keep_higher = match advantage {
            Advantage::Normal => return self.roll(dice),
            _ if !self.is_single_d20() => return self.roll(dice),
            Advantage::Advantage => true,
            Advantage::Disadvantage => false,
        };

        let roll1 = dice.roll_die(20);
        let roll2 = dice.roll_die(20);
        let chosen = if keep_higher {
            roll1.max(roll2)
        } else {
            roll1.min(roll2)
        };

        RollResult {
            notation: self.to_string(),
            component_results: vec![ComponentResult {
                sides: 20,
                rolls: vec![roll1, roll2],
                kept: vec![chosen],
                subtotal: chosen,
            }],
            modifier: self.modifier,
            total: (chosen as i32).saturating_add(self.modifier),
            natural_20: chosen == 20,
            natural_1: chosen == 1,
        }
    }

    pub fn is_single_d20(&self) -> bool {
        matches!(
            self.components.as_slice(),
            [DiceComponent {
                count: 1,
                sides: 20,
                keep_highest: None,
                keep_lowest: None,
            }]
        )
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dice: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        let dice = dice.join("+");
        match (dice.is_empty(), self.modifier) {
            (true, m) => write!(f, "{m}"),
            (false, 0) => write!(f, "{dice}"),
            (false, m) if m > 0 => write!(f, "{dice}+{m}"),
            (false, m) => write!(f, "{dice}{m}"),
        }
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub sides: u32,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub notation: String,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

impl RollResult {
    /// Every die rolled, including dropped ones, in roll order.
    pub fn rolls(&self) -> Vec<u32> {
        self.component_results
            .iter()
            .flat_map(|c| c.rolls.iter().copied())
            .collect()
    }

    /// The dice that counted towards the total.
    pub fn kept(&self) -> Vec<u32> {
        self.component_results
            .iter()
            .flat_map(|c| c.kept.iter().copied())
            .collect()
    }

    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice_parts: Vec<String> = self
            .component_results
            .iter()
            .map(|c| {
                if c.rolls.len() > c.kept.len() {
                    let mut kept_used = vec![false; c.kept.len()];
                    let shown: Vec<String> = c
                        .rolls
                        .iter()
                        .map(|&roll| {
                            let slot = c
                                .kept
                                .iter()
                                .enumerate()
                                .position(|(i, &k)| k == roll && !kept_used[i]);
                            match slot {
                                Some(i) => {
                                    kept_used[i] = true;
                                    roll.to_string()
                                }
                                None => format!("({roll})"),
                            }
                        })
                        .collect();
                    format!("[{}]", shown.join(", "))
                } else {
                    let shown: Vec<String> = c.rolls.iter().map(|r| r.to_string()).collect();
                    format!("[{}]", shown.join(", "))
                }
            })
            .collect();

        let dice_str = dice_parts.join(" + ");
        match self.modifier {
            0 => dice_str,
            m if dice_str.is_empty() => m.to_string(),
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{} - {}", dice_str, m.abs()),
        }
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }

    /// Check if this was a critical hit (natural 20 on attack).
    pub fn is_critical(&self) -> bool {
        self.natural_20
    }

    /// Check if this was a critical failure (natural 1 on attack).
    pub fn is_fumble(&self) -> bool {
        self.natural_1
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Roll dice from a notation string using thread-local randomness.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll(&mut RngDice::new(rand::thread_rng())))
}

/// Roll dice from a notation string using the given source.
pub fn roll_with(notation: &str, dice: &mut dyn DiceSource) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll(dice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components.len(), 1);
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].sides, 20);
        assert_eq!(expr.modifier, 0);
        assert!(expr.is_single_d20());
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        assert_eq!(expr.modifier, 5);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);

        let expr = DiceExpression::parse(" 1d4 + 1 ").unwrap();
        assert_eq!(expr.to_string(), "1d4+1");
    }

    #[test]
    fn test_parse_multiple_dice() {
        let expr = DiceExpression::parse("2d6+1d4+3").unwrap();
        assert_eq!(expr.components.len(), 2);
        assert_eq!(expr.modifier, 3);
    }

    #[test]
    fn test_parse_countless_and_flat() {
        let expr = DiceExpression::parse("d20").unwrap();
        assert!(expr.is_single_d20());

        let expr = DiceExpression::parse("5").unwrap();
        assert!(expr.components.is_empty());
        assert_eq!(expr.modifier, 5);
    }

    #[test]
    fn test_parse_keep_highest() {
        let expr = DiceExpression::parse("4d6kh3").unwrap();
        assert_eq!(expr.components[0].count, 4);
        assert_eq!(expr.components[0].keep_highest, Some(3));
    }

    #[test]
    fn test_invalid_keep_count() {
        let result = DiceExpression::parse("4d6kh5");
        assert!(matches!(
            result,
            Err(DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            })
        ));

        assert!(DiceExpression::parse("2d20kl3").is_err());
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_malformed_notation() {
        assert_eq!(DiceExpression::parse(""), Err(DiceError::NoDice));
        assert_eq!(DiceExpression::parse("0d6"), Err(DiceError::NoDice));
        assert_eq!(DiceExpression::parse("1d0"), Err(DiceError::InvalidDieSize(0)));
        assert_eq!(DiceExpression::parse("500d6"), Err(DiceError::TooManyDice(500)));
        for bad in ["abc", "2d", "d", "2x6", "1d6+", "1d6++2", "1d20-1d4", "2d6d4"] {
            assert!(
                matches!(DiceExpression::parse(bad), Err(DiceError::InvalidNotation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_oversized_modifiers_are_rejected() {
        for bad in ["1d20+2147483647", "2000000000+2000000000", "1d6+10001", "99999999999"] {
            assert!(
                matches!(DiceExpression::parse(bad), Err(DiceError::InvalidNotation(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(DiceExpression::parse("1d6+10000").unwrap().modifier, 10_000);
        assert_eq!(DiceExpression::parse("1d6-10000").unwrap().modifier, -10_000);

        let mut dice = ScriptedDice::new([20]);
        assert!(roll_with("1d20+2147483647", &mut dice).is_err());
    }

    #[test]
    fn test_modifier_arithmetic_saturates() {
        let expr = DiceExpression::flat(i32::MAX - 1).with_modifier(5);
        assert_eq!(expr.modifier, i32::MAX);

        let mut dice = ScriptedDice::new([20]);
        let result = DiceExpression::d20().with_modifier(i32::MAX).roll(&mut dice);
        assert_eq!(result.total, i32::MAX);
        assert!(result.natural_20);
    }

    #[test]
    fn test_scripted_roll_totals() {
        let mut dice = ScriptedDice::new([3, 5]);
        let result = roll_with("2d6+3", &mut dice).unwrap();
        assert_eq!(result.rolls(), vec![3, 5]);
        assert_eq!(result.total, 11);
        assert_eq!(result.to_string(), "[3, 5] + 3 = 11");
    }

    #[test]
    fn test_keep_highest_drops_lowest() {
        let mut dice = ScriptedDice::new([2, 6, 1, 4]);
        let result = roll_with("4d6kh3", &mut dice).unwrap();
        assert_eq!(result.total, 12);
        assert_eq!(result.rolls(), vec![2, 6, 1, 4]);
        assert_eq!(result.dice_display(), "[2, 6, (1), 4]");
    }

    #[test]
    fn test_roll_range() {
        let mut dice = RngDice::seeded(7);
        for _ in 0..100 {
            let result = roll_with("1d20+5", &mut dice).unwrap();
            assert!(result.total >= 6 && result.total <= 25);
        }
        for _ in 0..20 {
            let result = roll("3d4").unwrap();
            assert!(result.total >= 3 && result.total <= 12);
        }
    }

    #[test]
    fn test_seeded_dice_repeat() {
        let expr = DiceExpression::parse("8d6").unwrap();
        let a = expr.roll(&mut RngDice::seeded(42));
        let b = expr.roll(&mut RngDice::seeded(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_natural_detection() {
        let mut dice = ScriptedDice::new([20, 1]);
        let d20 = DiceExpression::d20().with_modifier(4);
        assert!(d20.roll(&mut dice).natural_20);
        assert!(d20.roll(&mut dice).natural_1);
    }

    #[test]
    fn test_disadvantage_keeps_lower() {
        let mut dice = ScriptedDice::new([17, 6]);
        let result = DiceExpression::d20()
            .with_modifier(3)
            .roll_with_advantage(Advantage::Disadvantage, &mut dice);
        assert_eq!(result.rolls(), vec![17, 6]);
        assert_eq!(result.kept(), vec![6]);
        assert_eq!(result.total, 9);
    }

    #[test]
    fn test_advantage_ignored_for_damage_dice() {
        let mut dice = ScriptedDice::new([4, 4]);
        let result = DiceExpression::parse("2d6")
            .unwrap()
            .roll_with_advantage(Advantage::Advantage, &mut dice);
        assert_eq!(result.total, 8);
    }

    #[test]
    fn test_scaling_and_plus() {
        let base = DiceExpression::parse("1d10").unwrap();
        assert_eq!(base.scaled(3).to_string(), "3d10");

        let upcast = DiceExpression::parse("8d6")
            .unwrap()
            .plus(&DiceExpression::parse("1d6").unwrap())
            .plus(&DiceExpression::parse("1d6").unwrap());
        assert_eq!(upcast.to_string(), "10d6");

        let mixed = DiceExpression::parse("1d8").unwrap().plus(&DiceExpression::parse("1d4+1").unwrap());
        assert_eq!(mixed.to_string(), "1d8+1d4+1");
        assert_eq!(mixed.average(), 8.0);
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Advantage),
            Advantage::Advantage
        );
    }
}
