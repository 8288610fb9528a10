//! Public engine facade.
//!
//! Every operation checks the caller, runs inside exactly one unit of work
//! and commits only on success. Analytics are emitted after the commit.
//!
//! # Example
//!
//! ```
//! use guildhall_core::{Caller, Engine, MemoryStore, Target};
//! use guildhall_core::model::{Ability, AbilityEffect, TargetShape, User};
//!
//! let store = MemoryStore::new();
//! let (healer, patient) = store
//!     .seed(|world| {
//!         let healer = world.add_user(User::new("Ada", "Healer"));
//!         let patient = world.add_user(User::new("Bo", "Warrior").with_hp(40, 100));
//!         world.add_ability(
//!             Ability::new("Mend", AbilityEffect::Heal { amount: 10 }, TargetShape::Single)
//!                 .with_mana_cost(2),
//!         );
//!         world.grant(healer, "Mend");
//!         (healer, patient)
//!     })
//!     .unwrap();
//!
//! let engine = Engine::new(store).with_seed(1);
//! engine
//!     .cast_ability(&Caller::player(healer), "Mend", Target::User(patient))
//!     .unwrap();
//! assert_eq!(engine.user(patient).unwrap().hp, 50);
//! ```

use crate::analytics::{emit, AnalyticsRecord, AnalyticsSink, NoopAnalytics, Trigger};
use crate::auth::Caller;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::cosmic;
use crate::error::GameError;
use crate::minigame;
use crate::model::{
    AbilityType, CosmicEventId, EffectKind, Game, GameId, GameKind, GuildEnemyId, User, UserId,
};
use crate::passives::{self, aggregate, ModifierQuery};
use crate::progression;
use crate::resolver::{AbilityResolver, Resolution, Target};
use crate::resurrection::{self, ResurrectionTier};
use crate::store::{Store, StoreError, UnitOfWork};
use crate::validator::ResourceValidator;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

/// The game rules bound to a store.
pub struct Engine<S: Store> {
    store: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl<S: Store> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            rng: Mutex::new(StdRng::from_entropy()),
            analytics: Arc::new(NoopAnalytics),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Deterministic dice and event draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `f` in one unit of work, committing only if it succeeds.
    fn run<'s, T>(
        &'s self,
        f: impl FnOnce(&mut S::Tx<'s>, &AbilityResolver<'_>, &mut StdRng) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let resolver = AbilityResolver::new(ResourceValidator::new(&self.config, self.now()));
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| GameError::system(StoreError::Poisoned))?;
        let mut tx = self.store.begin()?;
        let value = f(&mut tx, &resolver, &mut *rng)?;
        tx.commit()?;
        Ok(value)
    }

    fn record(
        &self,
        trigger: Trigger,
        actor: UserId,
        ability_type: Option<AbilityType>,
        resolution: &Resolution,
    ) {
        let metadata = serde_json::to_value(&resolution.changes).unwrap_or_default();
        emit(
            self.analytics.as_ref(),
            AnalyticsRecord {
                at: self.now(),
                trigger,
                actor,
                ability_type,
                metadata,
            },
        );
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Committed state of one user.
    pub fn user(&self, id: UserId) -> Result<User, GameError> {
        let tx = self.store.begin()?;
        Ok(tx.user(id)?)
    }

    /// Current total of one modifier kind for a user.
    pub fn modifier(&self, user: UserId, kind: EffectKind) -> Result<i32, GameError> {
        let tx = self.store.begin()?;
        Ok(aggregate(&tx, &ModifierQuery::new(user, kind, self.now()))?)
    }

    // ------------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------------

    pub fn buy_ability(&self, caller: &Caller, ability: &str) -> Result<Resolution, GameError> {
        caller.require_active()?;
        let now = self.now();
        let resolution =
            self.run(|tx, _, _| progression::purchase(tx, now, caller.user, ability))?;
        tracing::info!(user = %caller.user, ability, "ability purchased");
        Ok(resolution)
    }

    pub fn cast_ability(
        &self,
        caller: &Caller,
        ability: &str,
        target: Target,
    ) -> Result<Resolution, GameError> {
        caller.require_active()?;
        let (resolution, ability_type) = self.run(|tx, resolver, rng| {
            let resolution = resolver.cast(tx, rng, caller.user, ability, target)?;
            let ability_type = tx.ability(ability)?.ability_type();
            Ok((resolution, ability_type))
        })?;

        tracing::info!(user = %caller.user, ability, "ability cast");
        self.record(Trigger::AbilityCast, caller.user, Some(ability_type), &resolution);
        if resolution.enemy_defeated() {
            self.record(Trigger::DungeonReward, caller.user, Some(ability_type), &resolution);
        }
        Ok(resolution)
    }

    /// Attack a guild enemy with a dice ability.
    pub fn attack_enemy(
        &self,
        caller: &Caller,
        ability: &str,
        enemy: GuildEnemyId,
    ) -> Result<Resolution, GameError> {
        self.cast_ability(caller, ability, Target::Enemy(enemy))
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    pub fn resurrect(
        &self,
        caller: &Caller,
        target: UserId,
        tier: ResurrectionTier,
    ) -> Result<Resolution, GameError> {
        caller.require_admin()?;
        let config = &self.config;
        self.run(|tx, resolver, _| {
            resurrection::resurrect(tx, resolver.validator(), config, caller.user, target, tier)
        })
    }

    /// Draw the daily cosmic event.
    pub fn select_daily_event(&self, caller: &Caller) -> Result<Resolution, GameError> {
        caller.require_admin()?;
        self.run(|tx, resolver, rng| cosmic::select_daily(tx, rng, resolver))
    }

    /// Force a specific cosmic event.
    pub fn admin_select_event(
        &self,
        caller: &Caller,
        event: CosmicEventId,
    ) -> Result<Resolution, GameError> {
        caller.require_admin()?;
        let resolution =
            self.run(|tx, resolver, _| cosmic::select_by_id(tx, resolver, event, caller.user))?;
        tracing::info!(event = %event, admin = %caller.user, "cosmic event forced");
        Ok(resolution)
    }

    /// Apply the selected event's effect to every active user.
    pub fn apply_selected_event(&self, caller: &Caller) -> Result<Resolution, GameError> {
        caller.require_admin()?;
        self.run(|tx, resolver, _| cosmic::apply_selected(tx, resolver))
    }

    pub fn replenish_turns(&self, caller: &Caller, base: i32) -> Result<Resolution, GameError> {
        caller.require_admin()?;
        let now = self.now();
        let resolution = self.run(|tx, _, _| progression::replenish_turns(tx, now, base))?;
        tracing::info!(base, users = resolution.changes.len(), "turns replenished");
        Ok(resolution)
    }

    /// Physically delete expired passive effects.
    pub fn purge_expired(&self, caller: &Caller) -> Result<usize, GameError> {
        caller.require_admin()?;
        let now = self.now();
        self.run(|tx, _, _| Ok(passives::purge_expired(tx, now)?))
    }

    // ------------------------------------------------------------------------
    // Minigames
    // ------------------------------------------------------------------------

    pub fn start_game(
        &self,
        caller: &Caller,
        kind: GameKind,
        metadata: serde_json::Value,
    ) -> Result<Game, GameError> {
        caller.require_active()?;
        let (game, _) = self.run(|tx, resolver, _| {
            minigame::start(tx, resolver.validator(), caller.user, kind, metadata)
        })?;
        tracing::info!(user = %caller.user, game = %game.id, ?kind, "game started");
        Ok(game)
    }

    pub fn begin_game(&self, caller: &Caller, game: GameId) -> Result<Game, GameError> {
        caller.require_active()?;
        self.run(|tx, _, _| minigame::begin(tx, caller, game))
    }

    pub fn record_progress(
        &self,
        caller: &Caller,
        game: GameId,
        score: i32,
        metadata: Option<serde_json::Value>,
    ) -> Result<Game, GameError> {
        caller.require_active()?;
        self.run(|tx, _, _| minigame::record_progress(tx, caller, game, score, metadata))
    }

    pub fn finish_game(&self, caller: &Caller, game: GameId) -> Result<Resolution, GameError> {
        caller.require_active()?;
        let config = &self.config;
        let (finished, resolution) = self.run(|tx, resolver, _| {
            minigame::finish(tx, resolver.validator(), config, caller, game)
        })?;

        tracing::info!(
            user = %caller.user,
            game = %finished.id,
            reward = ?finished.reward,
            "game finished"
        );
        self.record(Trigger::GameFinished, caller.user, None, &resolution);
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemoryAnalytics;
    use crate::error::AuthError;
    use crate::model::{Ability, AbilityEffect, Role, TargetShape};
    use crate::store::MemoryStore;

    fn engine_with_healer() -> (Engine<MemoryStore>, UserId, UserId, Arc<MemoryAnalytics>) {
        let store = MemoryStore::new();
        let (a, b) = store
            .seed(|world| {
                let a = world.add_user(User::new("A", "Healer"));
                let b = world.add_user(User::new("B", "Warrior").with_hp(50, 100));
                world.add_ability(
                    Ability::new("Mend", AbilityEffect::Heal { amount: 10 }, TargetShape::Single)
                        .with_mana_cost(2)
                        .with_xp(20),
                );
                world.grant(a, "Mend");
                (a, b)
            })
            .unwrap();
        let analytics = Arc::new(MemoryAnalytics::new());
        let engine = Engine::new(store)
            .with_seed(5)
            .with_analytics(analytics.clone());
        (engine, a, b, analytics)
    }

    #[test]
    fn test_cast_commits_and_records() {
        let (engine, a, b, analytics) = engine_with_healer();
        engine
            .cast_ability(&Caller::player(a), "Mend", Target::User(b))
            .unwrap();
        assert_eq!(engine.user(b).unwrap().hp, 60);
        assert_eq!(analytics.count(Trigger::AbilityCast), 1);
    }

    #[test]
    fn test_analytics_failure_keeps_gameplay() {
        let (engine, a, b, analytics) = engine_with_healer();
        analytics.set_unavailable(true);
        engine
            .cast_ability(&Caller::player(a), "Mend", Target::User(b))
            .unwrap();
        assert_eq!(engine.user(b).unwrap().hp, 60);
    }

    #[test]
    fn test_commit_failure_is_system_error() {
        let (engine, a, b, _) = engine_with_healer();
        engine.store().fail_next_commit();
        let err = engine
            .cast_ability(&Caller::player(a), "Mend", Target::User(b))
            .unwrap_err();
        assert!(matches!(err, GameError::System { .. }));
        assert!(err.user_message().contains("retry later"));
        assert_eq!(engine.user(b).unwrap().hp, 50);
        assert_eq!(engine.user(a).unwrap().mana, 20);
    }

    #[test]
    fn test_roles_enforced() {
        let (engine, a, b, _) = engine_with_healer();
        let err = engine
            .cast_ability(&Caller::new(a, Role::Inactive), "Mend", Target::User(b))
            .unwrap_err();
        assert!(matches!(err, GameError::Authorization(AuthError::Inactive)));

        let err = engine
            .resurrect(&Caller::player(a), b, ResurrectionTier::Free)
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::Authorization(AuthError::AdminRequired)
        ));
    }
}
