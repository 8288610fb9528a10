//! Ability resolution.
//!
//! A cast runs in three steps:
//! 1. preconditions (caster alive, ownership, costs, cosmic block),
//! 2. the effect for the ability's variant,
//! 3. finalization: one mana debit, the health cost and one experience
//!    credit for the caster.
//!
//! Users are loaded into a [`Roster`], mutated in memory and written back
//! only after all three steps succeed. Any error leaves the unit of work
//! uncommitted, so a refused cast changes nothing.

use crate::cosmic;
use crate::dice::DiceRoll;
use crate::dungeon;
use crate::error::{GameError, Reason};
use crate::model::{
    Ability, AbilityEffect, CosmicEventId, EffectKind, GuildEnemyId, PassiveEffect, TargetShape,
    User, UserId,
};
use crate::passives;
use crate::store::{StoreError, UnitOfWork};
use crate::validator::{clamp_transfer, ResourceValidator, XpGain};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

// ============================================================================
// Resolution
// ============================================================================

/// What a cast is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Whatever the ability's shape implies (the caster or the guild).
    Default,
    User(UserId),
    Enemy(GuildEnemyId),
}

/// The result of resolving one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub changes: Vec<Change>,
    pub narrative: String,
}

impl Resolution {
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            changes: Vec::new(),
            narrative: narrative.into(),
        }
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_changes(mut self, changes: impl IntoIterator<Item = Change>) -> Self {
        self.changes.extend(changes);
        self
    }

    /// Net health change for one user.
    pub fn hp_delta(&self, user: UserId) -> i32 {
        self.changes
            .iter()
            .map(|c| match c {
                Change::HpChanged { user: u, amount, .. } if *u == user => *amount,
                _ => 0,
            })
            .sum()
    }

    /// Net mana change for one user.
    pub fn mana_delta(&self, user: UserId) -> i32 {
        self.changes
            .iter()
            .map(|c| match c {
                Change::ManaChanged { user: u, amount, .. } if *u == user => *amount,
                _ => 0,
            })
            .sum()
    }

    pub fn enemy_defeated(&self) -> bool {
        self.changes
            .iter()
            .any(|c| matches!(c, Change::EnemyDefeated { .. }))
    }
}

/// A concrete state change made by a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    HpChanged {
        user: UserId,
        amount: i32,
        new_current: i32,
        new_max: i32,
    },
    ManaChanged {
        user: UserId,
        amount: i32,
        new_current: i32,
        new_max: i32,
    },
    PassiveActivated {
        user: UserId,
        kind: EffectKind,
        value: i32,
        source: String,
        end_time: Option<DateTime<Utc>>,
    },
    ExperienceGained {
        user: UserId,
        amount: i32,
        total: i32,
    },
    LeveledUp {
        user: UserId,
        level: i32,
        gemstones: i32,
    },
    GoldChanged {
        user: UserId,
        amount: i32,
        total: i32,
    },
    GemstonesSpent {
        user: UserId,
        amount: i32,
        remaining: i32,
    },
    TurnsChanged {
        user: UserId,
        amount: i32,
        remaining: i32,
    },
    ArenaTokenSpent {
        user: UserId,
        remaining: i32,
    },
    DiceRolled {
        roll: DiceRoll,
        purpose: String,
    },
    EnemyDamaged {
        enemy: GuildEnemyId,
        amount: i32,
        health: i32,
    },
    EnemyDefeated {
        enemy: GuildEnemyId,
    },
    Resurrected {
        user: UserId,
        hp: i32,
    },
    AbilityGranted {
        user: UserId,
        ability: String,
    },
    CosmicEventSelected {
        event: CosmicEventId,
        name: String,
    },
}

impl Change {
    pub(crate) fn hp(user: &User, amount: i32) -> Self {
        Change::HpChanged {
            user: user.id,
            amount,
            new_current: user.hp,
            new_max: user.hp_max,
        }
    }

    pub(crate) fn mana(user: &User, amount: i32) -> Self {
        Change::ManaChanged {
            user: user.id,
            amount,
            new_current: user.mana,
            new_max: user.mana_max,
        }
    }

    pub(crate) fn gold(user: &User, amount: i32) -> Self {
        Change::GoldChanged {
            user: user.id,
            amount,
            total: user.gold,
        }
    }

    pub(crate) fn passive(effect: &PassiveEffect) -> Self {
        Change::PassiveActivated {
            user: effect.user,
            kind: effect.kind,
            value: effect.value,
            source: effect.source.clone(),
            end_time: effect.end_time,
        }
    }
}

// ============================================================================
// Roster
// ============================================================================

/// Users touched by one resolution, saved together at the end.
#[derive(Debug, Default)]
pub(crate) struct Roster {
    users: BTreeMap<UserId, User>,
}

impl Roster {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn load<T: UnitOfWork>(&mut self, tx: &T, id: UserId) -> Result<&mut User, StoreError> {
        match self.users.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(tx.user(id)?)),
        }
    }

    pub(crate) fn save<T: UnitOfWork>(self, tx: &mut T) -> Result<(), StoreError> {
        for user in self.users.values() {
            tx.save_user(user)?;
        }
        Ok(())
    }
}

/// Credit experience through the validator and audit any level-up.
pub(crate) fn credit_experience<T: UnitOfWork>(
    tx: &mut T,
    validator: &ResourceValidator<'_>,
    user: &mut User,
    proposed: i32,
) -> Result<Vec<Change>, StoreError> {
    let gain: XpGain = validator.experience_and_level(&*tx, user, proposed)?;
    let mut changes = vec![Change::ExperienceGained {
        user: user.id,
        amount: gain.applied,
        total: user.xp,
    }];
    if gain.leveled() {
        tx.audit(
            validator.now(),
            Some(user.id),
            format!(
                "{} reached level {} (+{} gemstones)",
                user.name, gain.new_level, gain.gemstones
            ),
        )?;
        changes.push(Change::LeveledUp {
            user: user.id,
            level: gain.new_level,
            gemstones: gain.gemstones,
        });
    }
    Ok(changes)
}

// ============================================================================
// Resolver
// ============================================================================

pub struct AbilityResolver<'c> {
    validator: ResourceValidator<'c>,
}

impl<'c> AbilityResolver<'c> {
    pub fn new(validator: ResourceValidator<'c>) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &ResourceValidator<'c> {
        &self.validator
    }

    /// Cast `ability_name` as `caster`.
    pub fn cast<T: UnitOfWork, R: Rng>(
        &self,
        tx: &mut T,
        rng: &mut R,
        caster: UserId,
        ability_name: &str,
        target: Target,
    ) -> Result<Resolution, GameError> {
        let mut roster = Roster::new();
        let ability = self.check_preconditions(&*tx, &mut roster, caster, ability_name)?;

        let mut changes = match (&ability.effect, target) {
            (AbilityEffect::DungeonAttack { .. }, Target::Enemy(enemy)) => dungeon::attack(
                tx,
                rng,
                &self.validator,
                &mut roster,
                caster,
                &ability,
                enemy,
            )?,
            (AbilityEffect::DungeonAttack { .. }, _) => {
                return Err(GameError::invalid(Reason::NoTarget))
            }
            (_, Target::Enemy(_)) => {
                return Err(GameError::invalid(Reason::NotADungeonAbility(
                    ability.name.clone(),
                )))
            }
            _ => {
                let caster_user = roster.load(&*tx, caster)?.clone();
                let targets = self.targets(&*tx, &caster_user, &ability, target)?;
                self.apply(
                    tx,
                    &mut roster,
                    Some(caster),
                    &ability,
                    ability.duration_minutes,
                    &targets,
                )?
            }
        };

        changes.extend(self.finalize(tx, &mut roster, caster, &ability)?);

        let caster_name = roster.load(&*tx, caster)?.name.clone();
        roster.save(tx)?;
        let narrative = format!("{} cast {}", caster_name, ability.name);
        tx.audit(self.validator.now(), Some(caster), narrative.as_str())?;

        Ok(Resolution::new(narrative).with_changes(changes))
    }

    fn check_preconditions<T: UnitOfWork>(
        &self,
        tx: &T,
        roster: &mut Roster,
        caster: UserId,
        name: &str,
    ) -> Result<Ability, GameError> {
        let user = roster.load(tx, caster)?;
        if user.is_dead() {
            return Err(GameError::invalid(Reason::CasterDead));
        }
        if !tx.owns_ability(caster, name)? {
            return Err(GameError::invalid(Reason::NotOwned(name.to_string())));
        }
        let ability = load_ability(tx, name)?;

        let mana_cost = ability.mana_cost.unwrap_or(0);
        if user.mana < mana_cost {
            return Err(GameError::invalid(Reason::InsufficientMana {
                needed: mana_cost,
                available: user.mana,
            }));
        }
        check_health_cost(user, &ability)?;

        if let Some(event) = cosmic::selected_event(tx)? {
            if event.block_ability == Some(ability.ability_type()) {
                return Err(GameError::invalid(Reason::BlockedByCosmicEvent(
                    ability.ability_type(),
                )));
            }
        }

        Ok(ability)
    }

    fn targets<T: UnitOfWork>(
        &self,
        tx: &T,
        caster: &User,
        ability: &Ability,
        target: Target,
    ) -> Result<Vec<UserId>, GameError> {
        match ability.target {
            TargetShape::Caster => Ok(vec![caster.id]),
            TargetShape::Single => match target {
                Target::User(id) => match tx.user(id) {
                    Ok(user) if user.is_active() => Ok(vec![id]),
                    Ok(_) | Err(StoreError::NotFound { .. }) => {
                        Err(GameError::invalid(Reason::NoTarget))
                    }
                    Err(e) => Err(e.into()),
                },
                _ => Err(GameError::invalid(Reason::NoTarget)),
            },
            TargetShape::All | TargetShape::Others => {
                let guild = caster
                    .guild
                    .ok_or_else(|| GameError::invalid(Reason::NoGuild))?;
                Ok(tx
                    .guild_members(guild)?
                    .into_iter()
                    .filter(|m| m.is_active() && !m.is_dead())
                    .filter(|m| ability.target == TargetShape::All || m.id != caster.id)
                    .map(|m| m.id)
                    .collect())
            }
        }
    }

    /// Apply an effect to each target, with no costs or rewards.
    ///
    /// With several targets, targets that would be no-ops are skipped and
    /// the whole application is a no-op only if every target is.
    pub(crate) fn apply<T: UnitOfWork>(
        &self,
        tx: &mut T,
        roster: &mut Roster,
        actor: Option<UserId>,
        ability: &Ability,
        duration_minutes: Option<i64>,
        targets: &[UserId],
    ) -> Result<Vec<Change>, GameError> {
        if targets.is_empty() {
            return Err(GameError::invalid(Reason::NoTarget));
        }
        let spread = targets.len() > 1
            || matches!(ability.target, TargetShape::All | TargetShape::Others);

        let mut changes = Vec::new();
        let mut skipped = None;
        for &target in targets {
            match self.apply_one(tx, roster, actor, ability, duration_minutes, target) {
                Ok(mut applied) => changes.append(&mut applied),
                Err(e) if spread && is_skippable(&e) => {
                    skipped.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        if changes.is_empty() {
            return Err(skipped.unwrap_or_else(|| GameError::invalid(Reason::NoTarget)));
        }
        Ok(changes)
    }

    fn apply_one<T: UnitOfWork>(
        &self,
        tx: &mut T,
        roster: &mut Roster,
        actor: Option<UserId>,
        ability: &Ability,
        duration_minutes: Option<i64>,
        target: UserId,
    ) -> Result<Vec<Change>, GameError> {
        match &ability.effect {
            AbilityEffect::Heal { amount } => {
                let user = roster.load(&*tx, target)?;
                let heal = self.validator.healing(&*tx, user, *amount)?;
                if heal == 0 {
                    return Err(GameError::noop(Reason::HealthFull(target)));
                }
                user.hp += heal;
                Ok(vec![Change::hp(user, heal)])
            }

            AbilityEffect::Mana { amount } => {
                let user = roster.load(&*tx, target)?;
                if user.is_dead() {
                    return Err(GameError::invalid(Reason::TargetDead(target)));
                }
                let gain = self.validator.mana(&*tx, user, *amount)?;
                if gain == 0 {
                    return Err(GameError::noop(Reason::ManaFull(target)));
                }
                user.mana += gain;
                Ok(vec![Change::mana(user, gain)])
            }

            AbilityEffect::Transfer { amount } => {
                let source = require_actor(actor, ability)?;
                if source == target {
                    return Err(GameError::invalid(Reason::NoTarget));
                }
                let receiver = roster.load(&*tx, target)?;
                if receiver.is_dead() {
                    return Err(GameError::invalid(Reason::TargetDead(target)));
                }
                let (room_mana, room_max) = (receiver.mana, receiver.mana_max);
                let available = roster.load(&*tx, source)?.mana;

                let moved = clamp_transfer(available, room_mana, room_max, *amount);
                if moved == 0 {
                    return Err(GameError::noop(Reason::TransferNothing));
                }

                let giver = roster.load(&*tx, source)?;
                giver.mana -= moved;
                let debit = Change::mana(giver, -moved);
                let receiver = roster.load(&*tx, target)?;
                receiver.mana += moved;
                let credit = Change::mana(receiver, moved);
                Ok(vec![debit, credit])
            }

            AbilityEffect::Swap => {
                let source = require_actor(actor, ability)?;
                if source == target {
                    return Err(GameError::invalid(Reason::SwapNotAllowed));
                }
                let other = roster.load(&*tx, target)?;
                if other.is_dead() {
                    return Err(GameError::invalid(Reason::TargetDead(target)));
                }
                let (target_hp, target_max) = (other.hp, other.hp_max);
                let me = roster.load(&*tx, source)?;
                let (caster_hp, caster_max) = (me.hp, me.hp_max);

                if caster_hp <= target_hp || caster_hp > target_max || target_hp > caster_max {
                    return Err(GameError::invalid(Reason::SwapNotAllowed));
                }

                me.hp = target_hp;
                let given = Change::hp(me, target_hp - caster_hp);
                let other = roster.load(&*tx, target)?;
                other.hp = caster_hp;
                let taken = Change::hp(other, caster_hp - target_hp);
                Ok(vec![given, taken])
            }

            AbilityEffect::DungeonAttack { .. } => Err(GameError::Configuration(format!(
                "{} only targets dungeon enemies",
                ability.name
            ))),

            _ => {
                let user = roster.load(&*tx, target)?;
                if user.is_dead() {
                    return Err(GameError::invalid(Reason::TargetDead(target)));
                }
                let effect = passives::activate_effect(
                    tx,
                    user,
                    ability,
                    duration_minutes,
                    self.validator.now(),
                )?;
                Ok(vec![Change::passive(&effect)])
            }
        }
    }

    fn finalize<T: UnitOfWork>(
        &self,
        tx: &mut T,
        roster: &mut Roster,
        caster: UserId,
        ability: &Ability,
    ) -> Result<Vec<Change>, GameError> {
        let mut changes = Vec::new();
        let user = roster.load(&*tx, caster)?;

        // The transferred mana is the cost.
        if !matches!(ability.effect, AbilityEffect::Transfer { .. }) {
            let cost = ability.mana_cost.unwrap_or(0);
            if cost > 0 {
                let debit = self.validator.mana(&*tx, user, -cost)?;
                user.mana += debit;
                changes.push(Change::mana(user, debit));
            }
        }

        check_health_cost(user, ability)?;
        let health = ability.health_cost.unwrap_or(0);
        if health > 0 {
            user.hp -= health;
            changes.push(Change::hp(user, -health));
        }

        changes.extend(credit_experience(
            tx,
            &self.validator,
            user,
            ability.xp_given,
        )?);
        Ok(changes)
    }
}

fn load_ability<T: UnitOfWork>(tx: &T, name: &str) -> Result<Ability, GameError> {
    match tx.ability(name) {
        Ok(ability) => Ok(ability),
        Err(StoreError::NotFound { .. }) => Err(GameError::Configuration(format!(
            "ability {name} is owned but missing from the catalog"
        ))),
        Err(e) => Err(e.into()),
    }
}

fn check_health_cost(user: &User, ability: &Ability) -> Result<(), GameError> {
    let cost = ability.health_cost.unwrap_or(0);
    if cost > 0 && user.hp <= cost {
        return Err(GameError::invalid(Reason::InsufficientHealth {
            needed: cost + 1,
            available: user.hp,
        }));
    }
    Ok(())
}

fn require_actor(actor: Option<UserId>, ability: &Ability) -> Result<UserId, GameError> {
    actor.ok_or_else(|| GameError::Configuration(format!("{} needs a caster", ability.name)))
}

fn is_skippable(e: &GameError) -> bool {
    e.is_noop() || matches!(e.reason(), Some(Reason::AlreadyActive(_)))
}
