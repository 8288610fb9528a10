//! Error taxonomy surfaced to the presentation layer.
//!
//! - [`GameError::Authorization`] always propagates unchanged.
//! - [`GameError::InvalidState`] and [`GameError::NoOp`] carry a [`Reason`]
//!   and guarantee nothing was mutated.
//! - [`GameError::System`] wraps store failures with a correlation token; the
//!   unit of work has been rolled back.

use crate::dice::DiceError;
use crate::model::{AbilityType, CosmicEventId, GameId, GameStatus, GuildEnemyId, UserId};
use crate::store::StoreError;
use chrono::Utc;
use std::fmt;
use thiserror::Error;

/// Caller is not allowed to run the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Account is not active")]
    Inactive,
    #[error("Administrator role required")]
    AdminRequired,
    #[error("Cannot act on another user's data")]
    NotOwner,
}

/// Why an action was refused without mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    CasterDead,
    TargetDead(UserId),
    TargetAlive(UserId),
    UnknownAbility(String),
    NotOwned(String),
    AlreadyOwned(String),
    MissingPrerequisite { ability: String, parent: String },
    InsufficientMana { needed: i32, available: i32 },
    InsufficientHealth { needed: i32, available: i32 },
    InsufficientGemstones { needed: i32, available: i32 },
    InsufficientGold { needed: i32, available: i32 },
    NoArenaTokens,
    NoTurns,
    NotADungeonAbility(String),
    EnemyDefeated(GuildEnemyId),
    WrongGuild,
    NoGuild,
    NoTarget,
    NotFound { kind: &'static str, id: String },
    SwapNotAllowed,
    AlreadyActive(String),
    BlockedByCosmicEvent(AbilityType),
    NoCosmicEventSelected,
    GameStatus {
        game: GameId,
        expected: GameStatus,
        actual: GameStatus,
    },
    HealthFull(UserId),
    ManaFull(UserId),
    TransferNothing,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::CasterDead => write!(f, "You are dead and cannot act"),
            Reason::TargetDead(_) => write!(f, "The target is dead"),
            Reason::TargetAlive(_) => write!(f, "The target is not dead"),
            Reason::UnknownAbility(name) => write!(f, "No ability named {name}"),
            Reason::NotOwned(name) => write!(f, "You do not own {name}"),
            Reason::AlreadyOwned(name) => write!(f, "You already own {name}"),
            Reason::MissingPrerequisite { ability, parent } => {
                write!(f, "{ability} requires {parent} first")
            }
            Reason::InsufficientMana { needed, available } => {
                write!(f, "Not enough mana ({available}/{needed})")
            }
            Reason::InsufficientHealth { needed, available } => {
                write!(f, "Not enough health ({available}/{needed})")
            }
            Reason::InsufficientGemstones { needed, available } => {
                write!(f, "Not enough gemstones ({available}/{needed})")
            }
            Reason::InsufficientGold { needed, available } => {
                write!(f, "Not enough gold ({available}/{needed})")
            }
            Reason::NoArenaTokens => write!(f, "No arena tokens left"),
            Reason::NoTurns => write!(f, "No dungeon turns left"),
            Reason::NotADungeonAbility(name) => write!(f, "{name} cannot attack enemies"),
            Reason::EnemyDefeated(_) => write!(f, "The enemy is already defeated"),
            Reason::WrongGuild => write!(f, "That enemy belongs to another guild"),
            Reason::NoGuild => write!(f, "You are not in a guild"),
            Reason::NoTarget => write!(f, "A target is required"),
            Reason::NotFound { kind, .. } => write!(f, "No such {kind}"),
            Reason::SwapNotAllowed => write!(f, "Health swap is not allowed right now"),
            Reason::AlreadyActive(name) => write!(f, "{name} is already active"),
            Reason::BlockedByCosmicEvent(kind) => {
                write!(f, "{kind} abilities are blocked by today's event")
            }
            Reason::NoCosmicEventSelected => write!(f, "No cosmic event is selected"),
            Reason::GameStatus {
                expected, actual, ..
            } => write!(f, "Game is {actual:?}, expected {expected:?}"),
            Reason::HealthFull(_) => write!(f, "Health is already full"),
            Reason::ManaFull(_) => write!(f, "Mana is already full"),
            Reason::TransferNothing => write!(f, "Nothing could be transferred"),
        }
    }
}

/// Timestamp-based token tying a user-facing message to a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationToken(pub String);

impl CorrelationToken {
    pub fn now() -> Self {
        Self(Utc::now().format("%Y%m%d%H%M%S%3f").to_string())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthError),

    #[error("{0}")]
    InvalidState(Reason),

    #[error("{0}")]
    NoOp(Reason),

    #[error("System failure (ref {token}): {source}")]
    System {
        token: CorrelationToken,
        source: StoreError,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GameError {
    pub fn invalid(reason: Reason) -> Self {
        GameError::InvalidState(reason)
    }

    pub fn noop(reason: Reason) -> Self {
        GameError::NoOp(reason)
    }

    /// Convert a store failure, logging it under a fresh token.
    pub fn system(source: StoreError) -> Self {
        let token = CorrelationToken::now();
        tracing::error!(token = %token, error = %source, "store failure, unit of work rolled back");
        GameError::System { token, source }
    }

    /// Message safe to show to the player.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Authorization(e) => e.to_string(),
            GameError::InvalidState(reason) | GameError::NoOp(reason) => reason.to_string(),
            GameError::System { token, .. } => {
                format!("Something went wrong, please retry later (ref {token})")
            }
            GameError::Configuration(_) => "The game is misconfigured".to_string(),
        }
    }

    pub fn reason(&self) -> Option<&Reason> {
        match self {
            GameError::InvalidState(reason) | GameError::NoOp(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, GameError::NoOp(_))
    }
}

impl From<StoreError> for GameError {
    fn from(source: StoreError) -> Self {
        GameError::system(source)
    }
}

/// Lookup of an id the caller handed us: a missing record is bad input,
/// anything else is a store failure.
pub(crate) fn lookup<T>(result: std::result::Result<T, StoreError>) -> std::result::Result<T, GameError> {
    result.map_err(|e| match e {
        StoreError::NotFound { kind, id } => GameError::invalid(Reason::NotFound { kind, id }),
        other => GameError::system(other),
    })
}

impl From<DiceError> for GameError {
    fn from(e: DiceError) -> Self {
        GameError::Configuration(e.to_string())
    }
}

/// Raised when the cosmic event catalog cannot produce a selection.
pub(crate) fn empty_catalog() -> GameError {
    GameError::Configuration("cosmic event catalog is empty".to_string())
}

pub(crate) fn unselectable_catalog() -> GameError {
    GameError::Configuration("every cosmic event is retired (zero frequency)".to_string())
}

pub(crate) fn unknown_event(id: CosmicEventId) -> GameError {
    GameError::Configuration(format!("unknown cosmic event {id}"))
}

pub type Result<T> = std::result::Result<T, GameError>;
