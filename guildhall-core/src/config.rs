//! Engine tuning.

use crate::persist::PersistError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Tunable constants for every resolver.
///
/// Missing fields fall back to [`EngineConfig::default`] when loaded from
/// JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Experience needed per level.
    pub xp_per_level: i32,

    /// Gemstones granted for each level gained.
    pub gemstones_on_level_up: i32,

    /// Health a resurrected user comes back with; also the floor for
    /// collateral damage.
    pub resurrection_hp: i32,

    /// Damage dealt to each guildmate by a paid resurrection.
    pub collateral_damage: i32,

    /// Lifetime of the sacrifice marker on guildmates.
    pub sacrifice_minutes: i64,

    /// Lifetime of the phone-loss penalty.
    pub phone_loss_minutes: i64,

    /// Experience modifier imposed by the study penalty (negative percent).
    pub study_penalty_percent: i32,

    /// Lifetime of the study penalty.
    pub study_penalty_minutes: i64,

    /// Minigame score points per gold coin.
    pub score_per_gold: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            xp_per_level: 1000,
            gemstones_on_level_up: 1,
            resurrection_hp: 10,
            collateral_damage: 15,
            sacrifice_minutes: 24 * 60,
            phone_loss_minutes: 24 * 60,
            study_penalty_percent: -50,
            study_penalty_minutes: 8 * 60,
            score_per_gold: 1,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_xp_per_level(mut self, xp: i32) -> Self {
        self.xp_per_level = xp;
        self
    }

    pub fn with_gemstones_on_level_up(mut self, gemstones: i32) -> Self {
        self.gemstones_on_level_up = gemstones;
        self
    }

    pub fn with_resurrection_hp(mut self, hp: i32) -> Self {
        self.resurrection_hp = hp;
        self
    }

    pub fn with_collateral_damage(mut self, damage: i32) -> Self {
        self.collateral_damage = damage;
        self
    }

    pub fn with_score_per_gold(mut self, points: i32) -> Self {
        self.score_per_gold = points;
        self
    }

    /// Level for a cumulative experience total. Level 1 starts at 0 xp.
    pub fn level_for(&self, xp: i32) -> i32 {
        xp.max(0) / self.xp_per_level.max(1) + 1
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
