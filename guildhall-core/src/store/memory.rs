//! In-process store.
//!
//! Transactions are serialized behind a mutex and operate on a private copy
//! of the state, which replaces the shared state only on commit.

use super::{Store, StoreError, UnitOfWork};
use crate::model::{
    Ability, AuditEntry, CosmicEvent, CosmicSelection, EffectId, Enemy, EnemyId, Game, GameId,
    GuildEnemy, GuildEnemyId, GuildId, PassiveEffect, User, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Everything the engine persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub users: BTreeMap<UserId, User>,
    pub abilities: BTreeMap<String, Ability>,
    pub owned: BTreeSet<(UserId, String)>,
    pub passives: Vec<PassiveEffect>,
    pub enemies: BTreeMap<EnemyId, Enemy>,
    pub guild_enemies: BTreeMap<GuildEnemyId, GuildEnemy>,
    /// Catalog order is selection order.
    pub cosmic_events: Vec<CosmicEvent>,
    pub cosmic_selection: CosmicSelection,
    pub games: BTreeMap<GameId, Game>,
    pub audit: Vec<AuditEntry>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: User) -> UserId {
        let id = user.id;
        self.users.insert(id, user);
        id
    }

    pub fn add_ability(&mut self, ability: Ability) {
        self.abilities.insert(ability.name.clone(), ability);
    }

    pub fn grant(&mut self, user: UserId, ability: &str) {
        self.owned.insert((user, ability.to_string()));
    }

    pub fn add_enemy(&mut self, enemy: Enemy) -> EnemyId {
        let id = enemy.id;
        self.enemies.insert(id, enemy);
        id
    }

    pub fn add_guild_enemy(&mut self, enemy: GuildEnemy) -> GuildEnemyId {
        let id = enemy.id;
        self.guild_enemies.insert(id, enemy);
        id
    }

    pub fn add_cosmic_event(&mut self, event: CosmicEvent) {
        self.cosmic_events.push(event);
    }
}

/// Mutex-guarded [`WorldState`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<WorldState>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: WorldState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Copy of the committed state.
    pub fn snapshot(&self) -> Result<WorldState, StoreError> {
        Ok(self.lock()?.clone())
    }

    /// Replace the committed state wholesale.
    pub fn restore(&self, state: WorldState) -> Result<(), StoreError> {
        *self.lock()? = state;
        Ok(())
    }

    /// Mutate committed state directly, outside any unit of work.
    pub fn seed<T>(&self, f: impl FnOnce(&mut WorldState) -> T) -> Result<T, StoreError> {
        Ok(f(&mut *self.lock()?))
    }

    /// Make the next commit fail, as a crashed backend would.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorldState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&self) -> Result<MemoryTx<'_>, StoreError> {
        let guard = self.lock()?;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            fail_on_commit: &self.fail_next_commit,
        })
    }
}

/// A unit of work over [`MemoryStore`]. Holds the store lock until dropped.
pub struct MemoryTx<'a> {
    guard: MutexGuard<'a, WorldState>,
    working: WorldState,
    fail_on_commit: &'a AtomicBool,
}

impl UnitOfWork for MemoryTx<'_> {
    fn user(&self, id: UserId) -> Result<User, StoreError> {
        self.working
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn save_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    fn guild_members(&self, guild: GuildId) -> Result<Vec<User>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|u| u.guild == Some(guild))
            .cloned()
            .collect())
    }

    fn users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.working.users.values().cloned().collect())
    }

    fn ability(&self, name: &str) -> Result<Ability, StoreError> {
        self.working
            .abilities
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("ability", name))
    }

    fn owns_ability(&self, user: UserId, name: &str) -> Result<bool, StoreError> {
        Ok(self.working.owned.contains(&(user, name.to_string())))
    }

    fn grant_ability(&mut self, user: UserId, name: &str) -> Result<(), StoreError> {
        self.working.grant(user, name);
        Ok(())
    }

    fn passives(&self, user: UserId) -> Result<Vec<PassiveEffect>, StoreError> {
        Ok(self
            .working
            .passives
            .iter()
            .filter(|p| p.user == user)
            .cloned()
            .collect())
    }

    fn insert_passive(&mut self, effect: PassiveEffect) -> Result<(), StoreError> {
        self.working.passives.push(effect);
        Ok(())
    }

    fn delete_passive(&mut self, id: EffectId) -> Result<(), StoreError> {
        let before = self.working.passives.len();
        self.working.passives.retain(|p| p.id != id);
        if self.working.passives.len() == before {
            return Err(StoreError::not_found("passive effect", id));
        }
        Ok(())
    }

    fn delete_expired_passives(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.working.passives.len();
        self.working.passives.retain(|p| p.is_active_at(now));
        Ok(before - self.working.passives.len())
    }

    fn enemy(&self, id: EnemyId) -> Result<Enemy, StoreError> {
        self.working
            .enemies
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("enemy", id))
    }

    fn guild_enemy(&self, id: GuildEnemyId) -> Result<GuildEnemy, StoreError> {
        self.working
            .guild_enemies
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("guild enemy", id))
    }

    fn save_guild_enemy(&mut self, enemy: &GuildEnemy) -> Result<(), StoreError> {
        self.working.guild_enemies.insert(enemy.id, enemy.clone());
        Ok(())
    }

    fn cosmic_events(&self) -> Result<Vec<CosmicEvent>, StoreError> {
        Ok(self.working.cosmic_events.clone())
    }

    fn save_cosmic_event(&mut self, event: &CosmicEvent) -> Result<(), StoreError> {
        match self
            .working
            .cosmic_events
            .iter_mut()
            .find(|e| e.id == event.id)
        {
            Some(existing) => *existing = event.clone(),
            None => self.working.cosmic_events.push(event.clone()),
        }
        Ok(())
    }

    fn cosmic_selection(&self) -> Result<CosmicSelection, StoreError> {
        Ok(self.working.cosmic_selection.clone())
    }

    fn save_cosmic_selection(&mut self, selection: &CosmicSelection) -> Result<(), StoreError> {
        self.working.cosmic_selection = selection.clone();
        Ok(())
    }

    fn game(&self, id: GameId) -> Result<Game, StoreError> {
        self.working
            .games
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("game", id))
    }

    fn save_game(&mut self, game: &Game) -> Result<(), StoreError> {
        self.working.games.insert(game.id, game.clone());
        Ok(())
    }

    fn append_audit(&mut self, entry: AuditEntry) -> Result<(), StoreError> {
        self.working.audit.push(entry);
        Ok(())
    }

    fn commit(mut self) -> Result<(), StoreError> {
        if self.fail_on_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("commit failed".to_string()));
        }
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
