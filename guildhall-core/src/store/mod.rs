//! Transactional store contracts.
//!
//! Every engine operation runs inside exactly one [`UnitOfWork`]: reads and
//! writes go through it, [`UnitOfWork::commit`] publishes them, and dropping
//! it without committing discards them. Durable backends implement these
//! traits; [`MemoryStore`] is the in-process implementation.

mod memory;

pub use memory::{MemoryStore, MemoryTx, WorldState};

use crate::model::{
    Ability, AuditEntry, CosmicEvent, CosmicSelection, EffectId, Enemy, EnemyId, Game, GameId,
    GuildEnemy, GuildEnemyId, GuildId, PassiveEffect, User, UserId,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// One all-or-nothing set of reads and writes.
pub trait UnitOfWork {
    // Users
    fn user(&self, id: UserId) -> Result<User, StoreError>;
    fn save_user(&mut self, user: &User) -> Result<(), StoreError>;
    fn guild_members(&self, guild: GuildId) -> Result<Vec<User>, StoreError>;
    fn users(&self) -> Result<Vec<User>, StoreError>;

    // Abilities and ownership
    fn ability(&self, name: &str) -> Result<Ability, StoreError>;
    fn owns_ability(&self, user: UserId, name: &str) -> Result<bool, StoreError>;
    fn grant_ability(&mut self, user: UserId, name: &str) -> Result<(), StoreError>;

    // Passive effects
    fn passives(&self, user: UserId) -> Result<Vec<PassiveEffect>, StoreError>;
    fn insert_passive(&mut self, effect: PassiveEffect) -> Result<(), StoreError>;
    fn delete_passive(&mut self, id: EffectId) -> Result<(), StoreError>;
    /// Physically remove records whose end time is at or before `now`.
    fn delete_expired_passives(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    // Dungeon
    fn enemy(&self, id: EnemyId) -> Result<Enemy, StoreError>;
    fn guild_enemy(&self, id: GuildEnemyId) -> Result<GuildEnemy, StoreError>;
    fn save_guild_enemy(&mut self, enemy: &GuildEnemy) -> Result<(), StoreError>;

    // Cosmic events
    fn cosmic_events(&self) -> Result<Vec<CosmicEvent>, StoreError>;
    fn save_cosmic_event(&mut self, event: &CosmicEvent) -> Result<(), StoreError>;
    fn cosmic_selection(&self) -> Result<CosmicSelection, StoreError>;
    fn save_cosmic_selection(&mut self, selection: &CosmicSelection) -> Result<(), StoreError>;

    // Minigames
    fn game(&self, id: GameId) -> Result<Game, StoreError>;
    fn save_game(&mut self, game: &Game) -> Result<(), StoreError>;

    // Audit
    fn append_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError>;

    fn audit(
        &mut self,
        at: DateTime<Utc>,
        actor: Option<UserId>,
        message: impl Into<String>,
    ) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        self.append_audit(AuditEntry {
            at,
            actor,
            message: message.into(),
        })
    }

    /// Publish every write made through this unit.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// A source of units of work.
pub trait Store: Send + Sync {
    type Tx<'a>: UnitOfWork
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>, StoreError>;
}
