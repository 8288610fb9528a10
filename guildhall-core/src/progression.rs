//! Ability purchases and turn replenishment.

use crate::error::{GameError, Reason};
use crate::model::{EffectKind, UserId};
use crate::passives::{aggregate, ModifierQuery};
use crate::resolver::{Change, Resolution};
use crate::store::{StoreError, UnitOfWork};
use chrono::{DateTime, Utc};

/// Buy `name` for `buyer` with gemstones. The parent ability, if any, must
/// already be owned.
pub(crate) fn purchase<T: UnitOfWork>(
    tx: &mut T,
    now: DateTime<Utc>,
    buyer: UserId,
    name: &str,
) -> Result<Resolution, GameError> {
    let mut user = tx.user(buyer)?;
    if tx.owns_ability(buyer, name)? {
        return Err(GameError::invalid(Reason::AlreadyOwned(name.to_string())));
    }
    let ability = match tx.ability(name) {
        Ok(ability) => ability,
        Err(StoreError::NotFound { .. }) => {
            return Err(GameError::invalid(Reason::UnknownAbility(name.to_string())))
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(parent) = &ability.parent {
        if !tx.owns_ability(buyer, parent)? {
            return Err(GameError::invalid(Reason::MissingPrerequisite {
                ability: ability.name.clone(),
                parent: parent.clone(),
            }));
        }
    }

    let price = ability.gemstone_cost.unwrap_or(0);
    if user.gemstones < price {
        return Err(GameError::invalid(Reason::InsufficientGemstones {
            needed: price,
            available: user.gemstones,
        }));
    }

    user.gemstones -= price;
    tx.save_user(&user)?;
    tx.grant_ability(buyer, &ability.name)?;

    let narrative = format!("{} learned {}", user.name, ability.name);
    tx.audit(now, Some(buyer), narrative.as_str())?;

    Ok(Resolution::new(narrative)
        .with_change(Change::GemstonesSpent {
            user: buyer,
            amount: price,
            remaining: user.gemstones,
        })
        .with_change(Change::AbilityGranted {
            user: buyer,
            ability: ability.name,
        }))
}

/// Add `base` turns plus each user's turn bonus to every active user.
pub(crate) fn replenish_turns<T: UnitOfWork>(
    tx: &mut T,
    now: DateTime<Utc>,
    base: i32,
) -> Result<Resolution, GameError> {
    let mut changes = Vec::new();
    for mut user in tx.users()?.into_iter().filter(|u| u.is_active()) {
        let bonus = aggregate(&*tx, &ModifierQuery::new(user.id, EffectKind::TurnPassive, now))?;
        let granted = (base + bonus).max(0);
        user.turns += granted;
        tx.save_user(&user)?;
        changes.push(Change::TurnsChanged {
            user: user.id,
            amount: granted,
            remaining: user.turns,
        });
    }

    let narrative = format!("Turns replenished for {} users", changes.len());
    tx.audit(now, None, narrative.as_str())?;
    Ok(Resolution::new(narrative).with_changes(changes))
}
