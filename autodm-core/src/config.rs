//! Battle configuration.

use crate::grid::DEFAULT_FEET_PER_CELL;
use serde::{Deserialize, Serialize};

/// Settings for one battle.
///
/// Missing JSON fields take their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Map width in cells.
    pub grid_width: u32,

    /// Map height in cells.
    pub grid_height: u32,

    /// Feet covered by one cell.
    pub feet_per_cell: u32,

    /// Seed for dice and placement. `None` draws from the OS.
    pub seed: Option<u64>,

    /// Headless runs stop after this many rounds.
    pub max_rounds: Option<u32>,

    /// Scatter combatants over random free cells instead of keeping the
    /// positions they were given.
    pub randomize_positions: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            grid_width: 10,
            grid_height: 10,
            feet_per_cell: DEFAULT_FEET_PER_CELL,
            seed: None,
            max_rounds: Some(100),
            randomize_positions: true,
        }
    }
}

impl BattleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the map size in cells.
    pub fn with_grid(mut self, width: u32, height: u32) -> Self {
        self.grid_width = width;
        self.grid_height = height;
        self
    }

    pub fn with_feet_per_cell(mut self, feet: u32) -> Self {
        self.feet_per_cell = feet;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_rounds(mut self, rounds: Option<u32>) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Keep the positions combatants were created with.
    pub fn with_fixed_positions(mut self) -> Self {
        self.randomize_positions = false;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BattleConfig::default();
        assert_eq!((config.grid_width, config.grid_height), (10, 10));
        assert_eq!(config.feet_per_cell, 5);
        assert_eq!(config.max_rounds, Some(100));
        assert!(config.randomize_positions);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = BattleConfig::from_json(r#"{"grid_width": 20, "seed": 7}"#).unwrap();
        assert_eq!(config.grid_width, 20);
        assert_eq!(config.grid_height, 10);
        assert_eq!(config.seed, Some(7));

        assert_eq!(BattleConfig::from_json("{}").unwrap(), BattleConfig::default());
        assert!(BattleConfig::from_json("{\"grid_width\": -1}").is_err());
    }

    #[test]
    fn test_builders_and_json_roundtrip() {
        let config = BattleConfig::new()
            .with_grid(40, 5)
            .with_seed(42)
            .with_max_rounds(None)
            .with_fixed_positions();
        let json = config.to_json().unwrap();
        assert_eq!(BattleConfig::from_json(&json).unwrap(), config);
    }
}
