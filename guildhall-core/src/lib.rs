//! Guild progression game engine.
//!
//! This crate provides:
//! - Resource validation for health, mana, experience and gold
//! - Time-bounded passive effects and modifier aggregation
//! - Ability resolution, dungeon combat and resurrection
//! - Weighted daily cosmic events
//! - A transactional store contract with an in-memory backend
//!
//! # Quick Start
//!
//! ```ignore
//! use guildhall_core::{catalog, Caller, Engine, MemoryStore, Target};
//!
//! let store = MemoryStore::new();
//! store.seed(catalog::install)?;
//!
//! let engine = Engine::new(store);
//! let resolution = engine.cast_ability(&Caller::player(user), "Mend", Target::User(friend))?;
//! println!("{}", resolution.narrative);
//! ```

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod cosmic;
pub mod dice;
mod dungeon;
pub mod engine;
pub mod error;
mod minigame;
pub mod model;
pub mod passives;
pub mod persist;
mod progression;
pub mod resolver;
pub mod resurrection;
pub mod store;
pub mod testing;
pub mod validator;

// Primary public API
pub use analytics::{AnalyticsRecord, AnalyticsSink, MemoryAnalytics, Trigger};
pub use auth::Caller;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AuthError, GameError, Reason};
pub use minigame::wager_of;
pub use persist::{PersistError, Snapshot};
pub use resolver::{Change, Resolution, Target};
pub use resurrection::ResurrectionTier;
pub use store::{MemoryStore, Store, StoreError, UnitOfWork, WorldState};
pub use testing::TestWorld;
pub use validator::ResourceValidator;
