//! Passive effect store.
//!
//! Passive effects are per-user modifier records. The validator layer only
//! ever sees them through [`aggregate`] / [`Modifiers`], which always filter
//! on expiry, so expired rows may linger until [`purge_expired`] runs.

use crate::error::{GameError, Reason};
use crate::model::{Ability, EffectId, EffectKind, PassiveEffect, User, UserId};
use crate::store::{StoreError, UnitOfWork};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// "Total modifier of kind X for user U, as of T."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierQuery {
    pub user: UserId,
    pub kind: EffectKind,
    pub as_of: DateTime<Utc>,
}

impl ModifierQuery {
    pub fn new(user: UserId, kind: EffectKind, as_of: DateTime<Utc>) -> Self {
        Self { user, kind, as_of }
    }
}

/// Sum of active effect values matching the query.
pub fn aggregate<T: UnitOfWork>(tx: &T, query: &ModifierQuery) -> Result<i32, StoreError> {
    Ok(tx
        .passives(query.user)?
        .iter()
        .filter(|p| p.kind == query.kind && p.is_active_at(query.as_of))
        .map(|p| p.value)
        .sum())
}

/// All active totals for one user, loaded once per resolution step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    totals: HashMap<EffectKind, i32>,
}

impl Modifiers {
    pub fn load<T: UnitOfWork>(
        tx: &T,
        user: UserId,
        as_of: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let mut totals = HashMap::new();
        for effect in tx.passives(user)? {
            if effect.is_active_at(as_of) {
                *totals.entry(effect.kind).or_insert(0) += effect.value;
            }
        }
        Ok(Self { totals })
    }

    pub fn get(&self, kind: EffectKind) -> i32 {
        self.totals.get(&kind).copied().unwrap_or(0)
    }
}

/// Effects currently active for a user.
pub fn active_effects<T: UnitOfWork>(
    tx: &T,
    user: UserId,
    as_of: DateTime<Utc>,
) -> Result<Vec<PassiveEffect>, StoreError> {
    Ok(tx
        .passives(user)?
        .into_iter()
        .filter(|p| p.is_active_at(as_of))
        .collect())
}

/// Activate a passive-type ability on `user`.
///
/// The caller owns `user` and must save it: stat-growth abilities raise the
/// max resource on it permanently, independent of the record's expiry.
pub fn activate<T: UnitOfWork>(
    tx: &mut T,
    user: &mut User,
    ability: &Ability,
    now: DateTime<Utc>,
) -> Result<PassiveEffect, GameError> {
    activate_effect(tx, user, ability, ability.duration_minutes, now)
}

/// [`activate`] with an explicit lifetime, for effects not taken from the
/// ability record itself (cosmic events).
pub(crate) fn activate_effect<T: UnitOfWork>(
    tx: &mut T,
    user: &mut User,
    ability: &Ability,
    duration_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> Result<PassiveEffect, GameError> {
    let (kind, value) = ability.effect.passive().ok_or_else(|| {
        GameError::Configuration(format!("{} is not a passive ability", ability.name))
    })?;

    let active = active_effects(&*tx, user.id, now)?;
    if active.iter().any(|p| p.source == ability.name) {
        return Err(GameError::invalid(Reason::AlreadyActive(ability.name.clone())));
    }

    // Postpones never stack: a different tier replaces the active one.
    if kind == EffectKind::Postpone {
        for previous in active.iter().filter(|p| p.kind == EffectKind::Postpone) {
            tx.delete_passive(previous.id)?;
            tracing::debug!(user = %user.id, replaced = %previous.source, "postpone replaced");
        }
    }

    match kind {
        EffectKind::IncreaseHealth => user.hp_max += value,
        EffectKind::IncreaseMana => user.mana_max += value,
        _ => {}
    }

    let effect = PassiveEffect {
        id: EffectId::new(),
        user: user.id,
        kind,
        value,
        source: ability.name.clone(),
        end_time: duration_minutes.map(|m| now + Duration::minutes(m)),
    };
    tx.insert_passive(effect.clone())?;
    Ok(effect)
}

/// Impose a punitive or marker effect that no ability owns.
pub fn impose<T: UnitOfWork>(
    tx: &mut T,
    user: UserId,
    kind: EffectKind,
    value: i32,
    source: impl Into<String>,
    minutes: Option<i64>,
    now: DateTime<Utc>,
) -> Result<PassiveEffect, StoreError> {
    let effect = PassiveEffect {
        id: EffectId::new(),
        user,
        kind,
        value,
        source: source.into(),
        end_time: minutes.map(|m| now + Duration::minutes(m)),
    };
    tx.insert_passive(effect.clone())?;
    Ok(effect)
}

/// Delete expired records. Aggregation never depends on this having run.
pub fn purge_expired<T: UnitOfWork>(tx: &mut T, now: DateTime<Utc>) -> Result<usize, StoreError> {
    let removed = tx.delete_expired_passives(now)?;
    if removed > 0 {
        tracing::debug!(removed, "purged expired passive effects");
    }
    Ok(removed)
}
