//! Minigame sessions.
//!
//! A session costs one arena token and moves `Pending -> InProgress ->
//! Finished`. Finishing converts the score into gold through the gold
//! validator, exactly once; a negative score earns nothing. Dice wagers
//! escrow their stake up front.

use crate::auth::Caller;
use crate::config::EngineConfig;
use crate::error::{lookup, GameError, Reason};
use crate::model::{Game, GameId, GameKind, GameStatus, UserId};
use crate::resolver::{Change, Resolution};
use crate::store::UnitOfWork;
use crate::validator::ResourceValidator;

fn load_owned<T: UnitOfWork>(tx: &T, caller: &Caller, id: GameId) -> Result<Game, GameError> {
    let game = lookup(tx.game(id))?;
    caller.require_self(game.user)?;
    Ok(game)
}

fn expect_status(game: &Game, expected: GameStatus) -> Result<(), GameError> {
    if game.status != expected {
        return Err(GameError::invalid(Reason::GameStatus {
            game: game.id,
            expected,
            actual: game.status,
        }));
    }
    Ok(())
}

/// Stake declared in a dice wager's metadata.
pub fn wager_of(metadata: &serde_json::Value) -> i32 {
    metadata
        .get("wager")
        .and_then(serde_json::Value::as_i64)
        .and_then(|w| i32::try_from(w).ok())
        .unwrap_or(0)
        .max(0)
}

pub(crate) fn start<T: UnitOfWork>(
    tx: &mut T,
    validator: &ResourceValidator<'_>,
    user_id: UserId,
    kind: GameKind,
    metadata: serde_json::Value,
) -> Result<(Game, Resolution), GameError> {
    let mut user = tx.user(user_id)?;
    if user.arena_tokens <= 0 {
        return Err(GameError::invalid(Reason::NoArenaTokens));
    }

    let mut resolution = Resolution::new(format!("{} started a {kind:?} game", user.name));
    if kind == GameKind::DiceWager {
        let stake = validator.spend_gold(&user, wager_of(&metadata))?;
        user.gold += stake;
        resolution = resolution.with_change(Change::gold(&user, stake));
    }

    user.arena_tokens -= 1;
    tx.save_user(&user)?;

    let game = Game {
        id: GameId::new(),
        user: user_id,
        kind,
        status: GameStatus::Pending,
        score: 0,
        metadata,
        reward: None,
    };
    tx.save_game(&game)?;

    Ok((
        game,
        resolution.with_change(Change::ArenaTokenSpent {
            user: user_id,
            remaining: user.arena_tokens,
        }),
    ))
}

pub(crate) fn begin<T: UnitOfWork>(
    tx: &mut T,
    caller: &Caller,
    id: GameId,
) -> Result<Game, GameError> {
    let mut game = load_owned(&*tx, caller, id)?;
    expect_status(&game, GameStatus::Pending)?;
    game.status = GameStatus::InProgress;
    tx.save_game(&game)?;
    Ok(game)
}

pub(crate) fn record_progress<T: UnitOfWork>(
    tx: &mut T,
    caller: &Caller,
    id: GameId,
    score: i32,
    metadata: Option<serde_json::Value>,
) -> Result<Game, GameError> {
    let mut game = load_owned(&*tx, caller, id)?;
    expect_status(&game, GameStatus::InProgress)?;
    game.score = score;
    if let Some(metadata) = metadata {
        game.metadata = metadata;
    }
    tx.save_game(&game)?;
    Ok(game)
}

pub(crate) fn finish<T: UnitOfWork>(
    tx: &mut T,
    validator: &ResourceValidator<'_>,
    config: &EngineConfig,
    caller: &Caller,
    id: GameId,
) -> Result<(Game, Resolution), GameError> {
    let mut game = load_owned(&*tx, caller, id)?;
    expect_status(&game, GameStatus::InProgress)?;

    let user_id = caller.user;
    let mut user = tx.user(user_id)?;
    let proposed = (game.score / config.score_per_gold.max(1)).max(0);
    let reward = validator.gold(&*tx, &user, proposed)?;
    user.gold += reward;
    tx.save_user(&user)?;

    game.status = GameStatus::Finished;
    game.reward = Some(reward);
    tx.save_game(&game)?;
    tx.audit(
        validator.now(),
        Some(user_id),
        format!("{} finished a {:?} game: {} gold", user.name, game.kind, reward),
    )?;

    let resolution = Resolution::new(format!("{} earned {} gold", user.name, reward))
        .with_change(Change::gold(&user, reward));
    Ok((game, resolution))
}
