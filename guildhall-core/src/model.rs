//! Game data model.
//!
//! Users, abilities, passive effects, guild enemies, cosmic events and
//! minigame sessions, plus the typed identifiers that link them.

use crate::dice::DiceExpression;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for users.
    UserId
);
id_type!(
    /// Unique identifier for guilds.
    GuildId
);
id_type!(
    /// Unique identifier for passive effect records.
    EffectId
);
id_type!(
    /// Unique identifier for enemy templates.
    EnemyId
);
id_type!(
    /// Unique identifier for a guild's enemy instance.
    GuildEnemyId
);
id_type!(
    /// Unique identifier for cosmic events.
    CosmicEventId
);
id_type!(
    /// Unique identifier for minigame sessions.
    GameId
);

// ============================================================================
// Users
// ============================================================================

/// Account role, supplied by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    New,
    Inactive,
    User,
    Admin,
}

impl Role {
    /// Whether this role may take part in gameplay at all.
    pub fn can_play(&self) -> bool {
        matches!(self, Role::User | Role::Admin)
    }
}

/// A player and every resource they hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    /// Gameplay archetype label (e.g. "Healer", "Mage").
    pub class: String,
    pub hp: i32,
    pub hp_max: i32,
    pub mana: i32,
    pub mana_max: i32,
    pub xp: i32,
    pub level: i32,
    pub gold: i32,
    pub gemstones: i32,
    pub arena_tokens: i32,
    /// Dungeon actions remaining.
    pub turns: i32,
    pub guild: Option<GuildId>,
    #[serde(default)]
    pub archived: bool,
}

impl User {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            role: Role::User,
            class: class.into(),
            hp: 100,
            hp_max: 100,
            mana: 20,
            mana_max: 20,
            xp: 0,
            level: 1,
            gold: 0,
            gemstones: 0,
            arena_tokens: 0,
            turns: 0,
            guild: None,
            archived: false,
        }
    }

    pub fn with_hp(mut self, hp: i32, hp_max: i32) -> Self {
        self.hp = hp;
        self.hp_max = hp_max;
        self
    }

    pub fn with_mana(mut self, mana: i32, mana_max: i32) -> Self {
        self.mana = mana;
        self.mana_max = mana_max;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn in_guild(mut self, guild: GuildId) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    /// Active users take part in guild cascades and global events.
    pub fn is_active(&self) -> bool {
        !self.archived && self.role.can_play()
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// Who an ability lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetShape {
    /// Only the caster.
    Caster,
    /// One chosen user.
    Single,
    /// Every living member of the caster's guild, caster included.
    All,
    /// Every living member of the caster's guild except the caster.
    Others,
}

/// What an ability does. One variant per ability type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AbilityEffect {
    Heal { amount: i32 },
    Mana { amount: i32 },
    Transfer { amount: i32 },
    Swap,
    /// Target takes `percent` more damage while active.
    Damage { percent: i32 },
    IncreaseHealth { amount: i32 },
    IncreaseMana { amount: i32 },
    DungeonAttack { dice: DiceExpression },
    TurnPassive { bonus: i32 },
    GoldPassive { percent: i32 },
    ManaPassive { bonus: i32 },
    HealthPassive { bonus: i32 },
    Protection { reduction: i32 },
    Experience { percent: i32 },
    Crit { percent: i32 },
    Postpone { days: i32 },
}

impl AbilityEffect {
    pub fn ability_type(&self) -> AbilityType {
        match self {
            AbilityEffect::Heal { .. } => AbilityType::Heal,
            AbilityEffect::Mana { .. } => AbilityType::Mana,
            AbilityEffect::Transfer { .. } => AbilityType::Transfer,
            AbilityEffect::Swap => AbilityType::Swap,
            AbilityEffect::Damage { .. } => AbilityType::Damage,
            AbilityEffect::IncreaseHealth { .. } => AbilityType::IncreaseHealth,
            AbilityEffect::IncreaseMana { .. } => AbilityType::IncreaseMana,
            AbilityEffect::DungeonAttack { .. } => AbilityType::DungeonAttack,
            AbilityEffect::TurnPassive { .. } => AbilityType::TurnPassive,
            AbilityEffect::GoldPassive { .. } => AbilityType::GoldPassive,
            AbilityEffect::ManaPassive { .. } => AbilityType::ManaPassive,
            AbilityEffect::HealthPassive { .. } => AbilityType::HealthPassive,
            AbilityEffect::Protection { .. } => AbilityType::Protection,
            AbilityEffect::Experience { .. } => AbilityType::Experience,
            AbilityEffect::Crit { .. } => AbilityType::Crit,
            AbilityEffect::Postpone { .. } => AbilityType::Postpone,
        }
    }

    /// The passive record this effect leaves behind, if it is a passive.
    pub fn passive(&self) -> Option<(EffectKind, i32)> {
        match *self {
            AbilityEffect::Damage { percent } => Some((EffectKind::Damage, percent)),
            AbilityEffect::IncreaseHealth { amount } => Some((EffectKind::IncreaseHealth, amount)),
            AbilityEffect::IncreaseMana { amount } => Some((EffectKind::IncreaseMana, amount)),
            AbilityEffect::TurnPassive { bonus } => Some((EffectKind::TurnPassive, bonus)),
            AbilityEffect::GoldPassive { percent } => Some((EffectKind::GoldPassive, percent)),
            AbilityEffect::ManaPassive { bonus } => Some((EffectKind::ManaPassive, bonus)),
            AbilityEffect::HealthPassive { bonus } => Some((EffectKind::Health, bonus)),
            AbilityEffect::Protection { reduction } => Some((EffectKind::Protection, reduction)),
            AbilityEffect::Experience { percent } => Some((EffectKind::Experience, percent)),
            AbilityEffect::Crit { percent } => Some((EffectKind::Crit, percent)),
            AbilityEffect::Postpone { days } => Some((EffectKind::Postpone, days)),
            AbilityEffect::Heal { .. }
            | AbilityEffect::Mana { .. }
            | AbilityEffect::Transfer { .. }
            | AbilityEffect::Swap
            | AbilityEffect::DungeonAttack { .. } => None,
        }
    }
}

/// Fieldless ability type tag, used where only the category matters
/// (cosmic-event blocking, analytics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityType {
    Heal,
    Mana,
    Transfer,
    Swap,
    Damage,
    IncreaseHealth,
    IncreaseMana,
    DungeonAttack,
    TurnPassive,
    GoldPassive,
    ManaPassive,
    HealthPassive,
    Protection,
    Experience,
    Crit,
    Postpone,
}

impl fmt::Display for AbilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    /// Unique key.
    pub name: String,
    pub category: String,
    pub effect: AbilityEffect,
    pub target: TargetShape,
    pub mana_cost: Option<i32>,
    pub health_cost: Option<i32>,
    /// Purchase price.
    pub gemstone_cost: Option<i32>,
    pub xp_given: i32,
    /// None means instant or permanent.
    pub duration_minutes: Option<i64>,
    pub parent: Option<String>,
}

impl Ability {
    pub fn new(name: impl Into<String>, effect: AbilityEffect, target: TargetShape) -> Self {
        Self {
            name: name.into(),
            category: "General".to_string(),
            effect,
            target,
            mana_cost: None,
            health_cost: None,
            gemstone_cost: None,
            xp_given: 0,
            duration_minutes: None,
            parent: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_mana_cost(mut self, cost: i32) -> Self {
        self.mana_cost = Some(cost);
        self
    }

    pub fn with_health_cost(mut self, cost: i32) -> Self {
        self.health_cost = Some(cost);
        self
    }

    pub fn with_price(mut self, gemstones: i32) -> Self {
        self.gemstone_cost = Some(gemstones);
        self
    }

    pub fn with_xp(mut self, xp: i32) -> Self {
        self.xp_given = xp;
        self
    }

    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn ability_type(&self) -> AbilityType {
        self.effect.ability_type()
    }
}

// ============================================================================
// Passive Effects
// ============================================================================

/// Category of a passive modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Flat bonus added to incoming heals.
    Health,
    /// Flat bonus added to mana gains.
    ManaPassive,
    /// Percent increase of damage taken.
    Damage,
    /// Flat reduction of damage taken.
    Protection,
    /// Percent change of experience gains.
    Experience,
    /// Percent change of gold gains.
    GoldPassive,
    /// Extra turns granted on replenishment.
    TurnPassive,
    /// Percent bonus to dungeon attack damage.
    Crit,
    /// Deadline extension marker.
    Postpone,
    /// Record of permanent max-health growth.
    IncreaseHealth,
    /// Record of permanent max-mana growth.
    IncreaseMana,
    /// Resurrection penalty marker.
    PhoneLoss,
    /// Marker on guildmates who absorbed a resurrection.
    Sacrifice,
}

/// A per-user modifier record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassiveEffect {
    pub id: EffectId,
    pub user: UserId,
    pub kind: EffectKind,
    pub value: i32,
    /// Ability name or penalty label that created this record.
    pub source: String,
    pub end_time: Option<DateTime<Utc>>,
}

impl PassiveEffect {
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.end_time.map_or(true, |end| end > at)
    }
}

// ============================================================================
// Dungeon
// ============================================================================

/// An enemy template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EnemyId,
    pub name: String,
    pub max_health: i32,
    pub attack: DiceExpression,
    pub xp: i32,
    pub gold: i32,
}

/// A guild's live instance of an enemy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEnemy {
    pub id: GuildEnemyId,
    pub guild: GuildId,
    pub enemy: EnemyId,
    /// May go negative internally; use [`GuildEnemy::displayed_health`].
    pub health: i32,
    /// Set once the kill reward has been distributed.
    pub rewarded: bool,
}

impl GuildEnemy {
    pub fn spawn(guild: GuildId, enemy: &Enemy) -> Self {
        Self {
            id: GuildEnemyId::new(),
            guild,
            enemy: enemy.id,
            health: enemy.max_health,
            rewarded: false,
        }
    }

    pub fn displayed_health(&self) -> i32 {
        self.health.max(0)
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }
}

// ============================================================================
// Cosmic Events
// ============================================================================

/// A daily global event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmicEvent {
    pub id: CosmicEventId,
    pub name: String,
    /// Relative weight; zero retires the event.
    pub frequency: u32,
    pub occurrences: u32,
    /// Ability type disabled while this event is selected.
    pub block_ability: Option<AbilityType>,
    pub automatic: bool,
    pub trigger_at_noon: bool,
    /// Effect applied to every active user.
    pub effect: Option<CosmicEffect>,
}

impl CosmicEvent {
    pub fn new(name: impl Into<String>, frequency: u32) -> Self {
        Self {
            id: CosmicEventId::new(),
            name: name.into(),
            frequency,
            occurrences: 0,
            block_ability: None,
            automatic: true,
            trigger_at_noon: false,
            effect: None,
        }
    }

    pub fn blocking(mut self, ability_type: AbilityType) -> Self {
        self.block_ability = Some(ability_type);
        self
    }

    pub fn with_effect(mut self, effect: AbilityEffect, duration_minutes: Option<i64>) -> Self {
        self.effect = Some(CosmicEffect {
            effect,
            duration_minutes,
        });
        self
    }

    /// Selection weight: `frequency / (occurrences + 1)`.
    pub fn weight(&self) -> f64 {
        f64::from(self.frequency) / (f64::from(self.occurrences) + 1.0)
    }
}

/// The effect part of a cosmic event, dispatched like an ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmicEffect {
    pub effect: AbilityEffect,
    pub duration_minutes: Option<i64>,
}

/// The single global "which event is live" row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmicSelection {
    pub selected: Option<CosmicEventId>,
    pub selected_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Minigames
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    Typing,
    WordSearch,
    DiceWager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Pending,
    InProgress,
    Finished,
}

/// A minigame session bought with an arena token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub user: UserId,
    pub kind: GameKind,
    pub status: GameStatus,
    pub score: i32,
    pub metadata: serde_json::Value,
    /// Gold credited when the session finished.
    pub reward: Option<i32>,
}

// ============================================================================
// Audit
// ============================================================================

/// One append-only moderation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub actor: Option<UserId>,
    pub message: String,
}
