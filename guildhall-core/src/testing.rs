//! Testing utilities.
//!
//! - [`TestWorld`] wraps an [`Engine`] over a [`MemoryStore`] with a manual
//!   clock, a fixed seed, an in-memory analytics sink and one guild.
//! - Assertion helpers for resources and refusal reasons.

use crate::analytics::MemoryAnalytics;
use crate::auth::Caller;
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{GameError, Reason};
use crate::model::{
    Ability, CosmicEvent, EffectKind, Enemy, GuildEnemy, GuildEnemyId, GuildId, Role, User,
    UserId,
};
use crate::passives::impose;
use crate::store::{MemoryStore, Store, UnitOfWork, WorldState};
use chrono::Duration;
use std::sync::Arc;

/// A ready-to-play world for scenario tests.
pub struct TestWorld {
    pub engine: Engine<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub analytics: Arc<MemoryAnalytics>,
    pub guild: GuildId,
    pub admin: Caller,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let analytics = Arc::new(MemoryAnalytics::new());
        let engine = Engine::new(MemoryStore::new())
            .with_config(config)
            .with_clock(clock.clone())
            .with_seed(42)
            .with_analytics(analytics.clone());

        let mut world = Self {
            engine,
            clock,
            analytics,
            guild: GuildId::new(),
            admin: Caller::admin(UserId::new()),
        };
        let admin = world.add_user(User::new("Teacher", "Staff").with_role(Role::Admin));
        world.admin = Caller::admin(admin);
        world
    }

    fn seed<T>(&self, f: impl FnOnce(&mut WorldState) -> T) -> T {
        self.engine
            .store()
            .seed(f)
            .expect("test store lock poisoned")
    }

    pub fn add_user(&self, user: User) -> UserId {
        self.seed(|world| world.add_user(user))
    }

    /// Add a user to the world's guild.
    pub fn add_member(&self, name: &str, class: &str) -> UserId {
        self.add_user(User::new(name, class).in_guild(self.guild))
    }

    pub fn add_ability(&self, ability: Ability) {
        self.seed(|world| world.add_ability(ability));
    }

    pub fn grant(&self, user: UserId, ability: &str) {
        self.seed(|world| world.grant(user, ability));
    }

    /// Register `enemy` and spawn it for the world's guild.
    pub fn spawn_enemy(&self, enemy: Enemy) -> GuildEnemyId {
        let guild = self.guild;
        self.seed(|world| {
            let spawned = world.add_guild_enemy(GuildEnemy::spawn(guild, &enemy));
            world.add_enemy(enemy);
            spawned
        })
    }

    pub fn add_cosmic_event(&self, event: CosmicEvent) {
        self.seed(|world| world.add_cosmic_event(event));
    }

    /// Give `user` a modifier that no ability owns.
    pub fn impose(&self, user: UserId, kind: EffectKind, value: i32, minutes: Option<i64>) {
        let mut tx = self.engine.store().begin().expect("test store lock poisoned");
        impose(&mut tx, user, kind, value, format!("{kind:?} (test)"), minutes, self.engine.now())
            .expect("impose failed");
        tx.commit().expect("commit failed");
    }

    pub fn update_user(&self, id: UserId, f: impl FnOnce(&mut User)) {
        self.seed(|world| world.users.get_mut(&id).map(f))
            .expect("unknown test user");
    }

    pub fn user(&self, id: UserId) -> User {
        self.engine.user(id).expect("unknown test user")
    }

    pub fn player(&self, id: UserId) -> Caller {
        Caller::player(id)
    }

    pub fn state(&self) -> WorldState {
        self.engine
            .store()
            .snapshot()
            .expect("test store lock poisoned")
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert hp and mana.
#[track_caller]
pub fn assert_resources(user: &User, hp: i32, mana: i32) {
    assert_eq!(
        (user.hp, user.mana),
        (hp, mana),
        "{}: expected hp {hp} mana {mana}, got hp {} mana {}",
        user.name,
        user.hp,
        user.mana
    );
}

/// Assert the invariant `0 <= value <= max` for hp and mana.
#[track_caller]
pub fn assert_within_limits(user: &User) {
    assert!(
        (0..=user.hp_max).contains(&user.hp),
        "{}: hp {} outside 0..={}",
        user.name,
        user.hp,
        user.hp_max
    );
    assert!(
        (0..=user.mana_max).contains(&user.mana),
        "{}: mana {} outside 0..={}",
        user.name,
        user.mana,
        user.mana_max
    );
}

/// Assert an operation was refused as invalid for `reason`.
#[track_caller]
pub fn assert_invalid<T: std::fmt::Debug>(result: Result<T, GameError>, reason: Reason) {
    match result {
        Err(GameError::InvalidState(actual)) => assert_eq!(actual, reason),
        other => panic!("Expected InvalidState({reason:?}), got {other:?}"),
    }
}

/// Assert an operation was a no-op.
#[track_caller]
pub fn assert_noop<T: std::fmt::Debug>(result: Result<T, GameError>) {
    match result {
        Err(GameError::NoOp(_)) => {}
        other => panic!("Expected NoOp, got {other:?}"),
    }
}
