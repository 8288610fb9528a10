//! Resurrection and its guild-wide cascade.
//!
//! Bringing a user back sets their health to the configured resurrection
//! value. Every tier except [`ResurrectionTier::Free`] also punishes the
//! revived user and makes every other active guild member pay collateral
//! damage, floored so nobody is pushed below resurrection health. The whole
//! cascade shares one unit of work.

use crate::config::EngineConfig;
use crate::error::{lookup, GameError, Reason};
use crate::model::{EffectKind, UserId};
use crate::passives::impose;
use crate::resolver::{Change, Resolution, Roster};
use crate::store::UnitOfWork;
use crate::validator::ResourceValidator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity chosen by the administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResurrectionTier {
    Free,
    /// Phone confiscated for a day.
    Phone,
    /// Mandatory study session: halved experience for a few hours.
    Study,
    /// Both penalties.
    Detention,
}

impl ResurrectionTier {
    pub fn is_free(&self) -> bool {
        matches!(self, ResurrectionTier::Free)
    }

    fn phone_loss(&self) -> bool {
        matches!(self, ResurrectionTier::Phone | ResurrectionTier::Detention)
    }

    fn study(&self) -> bool {
        matches!(self, ResurrectionTier::Study | ResurrectionTier::Detention)
    }
}

impl fmt::Display for ResurrectionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResurrectionTier::Free => "free",
            ResurrectionTier::Phone => "phone",
            ResurrectionTier::Study => "study",
            ResurrectionTier::Detention => "detention",
        };
        write!(f, "{label}")
    }
}

pub(crate) fn resurrect<T: UnitOfWork>(
    tx: &mut T,
    validator: &ResourceValidator<'_>,
    config: &EngineConfig,
    actor: UserId,
    target: UserId,
    tier: ResurrectionTier,
) -> Result<Resolution, GameError> {
    let now = validator.now();
    let mut roster = Roster::new();
    let mut changes = Vec::new();

    let revived = lookup(roster.load(&*tx, target))?;
    if !revived.is_dead() {
        return Err(GameError::invalid(Reason::TargetAlive(target)));
    }
    let restored = config.resurrection_hp.min(revived.hp_max);
    let gained = restored - revived.hp;
    revived.hp = restored;
    changes.push(Change::hp(revived, gained));
    changes.push(Change::Resurrected {
        user: target,
        hp: restored,
    });
    let revived_name = revived.name.clone();
    let guild = revived.guild;

    if tier.phone_loss() {
        let effect = impose(
            tx,
            target,
            EffectKind::PhoneLoss,
            1,
            "Phone confiscated",
            Some(config.phone_loss_minutes),
            now,
        )?;
        changes.push(Change::passive(&effect));
    }
    if tier.study() {
        let effect = impose(
            tx,
            target,
            EffectKind::Experience,
            config.study_penalty_percent,
            "Study session",
            Some(config.study_penalty_minutes),
            now,
        )?;
        changes.push(Change::passive(&effect));
    }

    let mut sacrificed = 0;
    if let (false, Some(guild)) = (tier.is_free(), guild) {
        let others: Vec<UserId> = tx
            .guild_members(guild)?
            .into_iter()
            .filter(|m| m.id != target && m.is_active())
            .map(|m| m.id)
            .collect();

        for member in others {
            let user = roster.load(&*tx, member)?;
            let damage =
                validator.damage(&*tx, user, config.collateral_damage, config.resurrection_hp)?;
            user.hp -= damage;
            changes.push(Change::hp(user, -damage));

            let marker = impose(
                tx,
                member,
                EffectKind::Sacrifice,
                1,
                format!("Sacrifice for {revived_name}"),
                Some(config.sacrifice_minutes),
                now,
            )?;
            changes.push(Change::passive(&marker));
            sacrificed += 1;
        }
    }

    roster.save(tx)?;
    let narrative = format!("{revived_name} was resurrected ({tier})");
    tx.audit(
        now,
        Some(actor),
        format!("{narrative}, {sacrificed} guildmates sacrificed"),
    )?;

    tracing::info!(user = %target, %tier, sacrificed, "resurrection cascade applied");
    Ok(Resolution::new(narrative).with_changes(changes))
}
