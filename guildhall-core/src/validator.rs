//! Resource validators.
//!
//! Each validator turns a *proposed* delta into the *actual* delta to apply,
//! given the current value, hard limits and the user's active passive
//! modifiers. The clamp arithmetic lives in pure functions so it can be
//! checked in isolation; [`ResourceValidator`] loads modifiers from the unit
//! of work and feeds them in.
//!
//! No validator ever returns a delta that would push a resource outside
//! `[0, max]`.

use crate::config::EngineConfig;
use crate::error::{GameError, Reason};
use crate::model::{EffectKind, User};
use crate::passives::Modifiers;
use crate::store::{StoreError, UnitOfWork};
use chrono::{DateTime, Utc};

// ============================================================================
// Pure clamps
// ============================================================================

/// Heal amount for a living target, or `None` if the target is dead.
pub fn clamp_heal(current: i32, max: i32, proposed: i32, bonus: i32) -> Option<i32> {
    if current <= 0 {
        return None;
    }
    Some((proposed + bonus).min(max - current).max(0))
}

/// Damage after percent increase, flat protection and the survival floor.
pub fn clamp_damage(
    current: i32,
    proposed: i32,
    increase_percent: i32,
    protection: i32,
    floor: i32,
) -> i32 {
    let scaled = scale_percent(proposed, increase_percent);
    let reduced = (scaled - protection).max(0);
    let headroom = (current - floor).max(0);
    reduced.min(headroom)
}

/// Mana delta: gains get the bonus and stop at max, costs stop at zero.
pub fn clamp_mana(current: i32, max: i32, delta: i32, bonus: i32) -> i32 {
    if delta >= 0 {
        (delta + bonus).min(max - current).max(0)
    } else {
        delta.max(-current)
    }
}

/// Experience after the percent modifier, never negative.
pub fn scale_xp(proposed: i32, percent: i32) -> i32 {
    scale_percent(proposed, percent).max(0)
}

/// Gold delta: gains get the percent bonus, losses stop at the balance.
pub fn clamp_gold(current: i32, delta: i32, percent: i32) -> i32 {
    if delta >= 0 {
        scale_percent(delta, percent).max(0)
    } else {
        delta.max(-current.max(0))
    }
}

/// Dungeon damage after the attacker's crit bonus.
pub fn crit_damage(base: i32, percent: i32) -> i32 {
    scale_percent(base.max(0), percent).max(0)
}

fn scale_percent(value: i32, percent: i32) -> i32 {
    let scaled = i64::from(value) * (100 + i64::from(percent)) / 100;
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Mana that can move from a source to a target without creating or
/// destroying any.
pub fn clamp_transfer(source_mana: i32, target_mana: i32, target_max: i32, amount: i32) -> i32 {
    amount
        .min(source_mana)
        .min(target_max - target_mana)
        .max(0)
}

// ============================================================================
// Store-backed validator
// ============================================================================

/// Result of an experience grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub applied: i32,
    pub old_level: i32,
    pub new_level: i32,
    pub gemstones: i32,
}

impl XpGain {
    pub fn leveled(&self) -> bool {
        self.new_level > self.old_level
    }
}

/// Validators bound to one engine configuration and one instant.
#[derive(Debug, Clone, Copy)]
pub struct ResourceValidator<'c> {
    config: &'c EngineConfig,
    now: DateTime<Utc>,
}

impl<'c> ResourceValidator<'c> {
    pub fn new(config: &'c EngineConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn modifiers<T: UnitOfWork>(&self, tx: &T, user: &User) -> Result<Modifiers, StoreError> {
        Modifiers::load(tx, user.id, self.now)
    }

    /// Actual heal for `target`. Dead targets are refused.
    pub fn healing<T: UnitOfWork>(
        &self,
        tx: &T,
        target: &User,
        proposed: i32,
    ) -> Result<i32, GameError> {
        let bonus = self.modifiers(tx, target)?.get(EffectKind::Health);
        let actual = clamp_heal(target.hp, target.hp_max, proposed, bonus)
            .ok_or_else(|| GameError::invalid(Reason::TargetDead(target.id)))?;
        tracing::debug!(user = %target.id, proposed, bonus, actual, "heal validated");
        Ok(actual)
    }

    /// Actual damage for `target`, never taking it below `floor`.
    pub fn damage<T: UnitOfWork>(
        &self,
        tx: &T,
        target: &User,
        proposed: i32,
        floor: i32,
    ) -> Result<i32, StoreError> {
        let modifiers = self.modifiers(tx, target)?;
        let actual = clamp_damage(
            target.hp,
            proposed,
            modifiers.get(EffectKind::Damage),
            modifiers.get(EffectKind::Protection),
            floor,
        );
        tracing::debug!(user = %target.id, proposed, floor, actual, "damage validated");
        Ok(actual)
    }

    /// Outgoing dungeon damage for `attacker`.
    pub fn attack_damage<T: UnitOfWork>(
        &self,
        tx: &T,
        attacker: &User,
        base: i32,
    ) -> Result<i32, StoreError> {
        let percent = self.modifiers(tx, attacker)?.get(EffectKind::Crit);
        Ok(crit_damage(base, percent))
    }

    /// Actual mana delta for `user`.
    pub fn mana<T: UnitOfWork>(&self, tx: &T, user: &User, delta: i32) -> Result<i32, StoreError> {
        let bonus = if delta > 0 {
            self.modifiers(tx, user)?.get(EffectKind::ManaPassive)
        } else {
            0
        };
        Ok(clamp_mana(user.mana, user.mana_max, delta, bonus))
    }

    /// Scale, apply and level up. Gemstones for levels gained are added to
    /// `user` in the same mutation as the experience.
    pub fn experience_and_level<T: UnitOfWork>(
        &self,
        tx: &T,
        user: &mut User,
        proposed: i32,
    ) -> Result<XpGain, StoreError> {
        let percent = self.modifiers(tx, user)?.get(EffectKind::Experience);
        let applied = scale_xp(proposed, percent);
        Ok(self.apply_experience(user, applied))
    }

    fn apply_experience(&self, user: &mut User, applied: i32) -> XpGain {
        let old_level = user.level;
        user.xp += applied;
        let new_level = self.config.level_for(user.xp).max(old_level);
        let gemstones = (new_level - old_level) * self.config.gemstones_on_level_up;
        user.level = new_level;
        user.gemstones += gemstones;

        if new_level > old_level {
            tracing::info!(user = %user.id, old_level, new_level, gemstones, "level up");
        }

        XpGain {
            applied,
            old_level,
            new_level,
            gemstones,
        }
    }

    /// Actual gold delta for `user`.
    pub fn gold<T: UnitOfWork>(&self, tx: &T, user: &User, delta: i32) -> Result<i32, StoreError> {
        let percent = if delta > 0 {
            self.modifiers(tx, user)?.get(EffectKind::GoldPassive)
        } else {
            0
        };
        Ok(clamp_gold(user.gold, delta, percent))
    }

    /// Debit for a deliberate spend. Unlike wager losses, an overspend is
    /// refused rather than clamped.
    pub fn spend_gold(&self, user: &User, amount: i32) -> Result<i32, GameError> {
        let amount = amount.max(0);
        if amount > user.gold {
            return Err(GameError::invalid(Reason::InsufficientGold {
                needed: amount,
                available: user.gold,
            }));
        }
        Ok(-amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;
    use crate::passives::impose;
    use crate::store::{MemoryStore, Store};

    #[test]
    fn test_heal_clamps_to_max() {
        assert_eq!(clamp_heal(95, 100, 10, 0), Some(5));
        assert_eq!(clamp_heal(50, 100, 10, 5), Some(15));
        assert_eq!(clamp_heal(100, 100, 10, 0), Some(0));
    }

    #[test]
    fn test_heal_refuses_dead() {
        assert_eq!(clamp_heal(0, 100, 10, 0), None);
    }

    #[test]
    fn test_damage_scaling_and_protection() {
        // 50% more damage taken, 4 flat protection: 20 * 1.5 - 4 = 26
        assert_eq!(clamp_damage(100, 20, 50, 4, 0), 26);
        // Protection larger than damage
        assert_eq!(clamp_damage(100, 3, 0, 10, 0), 0);
    }

    #[test]
    fn test_damage_respects_floor() {
        assert_eq!(clamp_damage(30, 50, 0, 0, 0), 30);
        assert_eq!(clamp_damage(30, 50, 0, 0, 10), 20);
        // Already under the floor: nothing
        assert_eq!(clamp_damage(5, 50, 0, 0, 10), 0);
    }

    #[test]
    fn test_damage_property_grid() {
        for damage in [0, 1, 7, 20, 64] {
            for protection in [0, 3, 30] {
                for hp in [0, 5, 50, 100] {
                    for floor in [0, 10] {
                        let actual = clamp_damage(hp, damage, 50, protection, floor);
                        let expected = (damage * 3 / 2 - protection).max(0);
                        assert!(actual <= expected);
                        assert!(actual >= 0);
                        assert!(hp - actual >= floor.min(hp));
                        if hp - expected >= floor {
                            assert_eq!(actual, expected);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_mana_gain_and_cost() {
        assert_eq!(clamp_mana(10, 20, 5, 0), 5);
        assert_eq!(clamp_mana(10, 20, 5, 10), 10);
        assert_eq!(clamp_mana(20, 20, 5, 3), 0);
        // Costs ignore the bonus and never overdraw.
        assert_eq!(clamp_mana(10, 20, -4, 0), -4);
        assert_eq!(clamp_mana(3, 20, -4, 0), -3);
    }

    #[test]
    fn test_crit_scaling() {
        assert_eq!(crit_damage(10, 0), 10);
        assert_eq!(crit_damage(10, 50), 15);
        assert_eq!(crit_damage(-3, 50), 0);
    }

    #[test]
    fn test_transfer_conserves_mana() {
        for source in [0, 3, 10, 20] {
            for target in [0, 5, 19, 20] {
                for amount in [0, 1, 5, 50] {
                    let moved = clamp_transfer(source, target, 20, amount);
                    assert!(moved >= 0);
                    assert!(source - moved >= 0);
                    assert!(target + moved <= 20);
                }
            }
        }
    }

    #[test]
    fn test_gold_gain_and_loss() {
        assert_eq!(clamp_gold(10, 20, 50), 30);
        assert_eq!(clamp_gold(10, -4, 50), -4);
        assert_eq!(clamp_gold(10, -40, 0), -10);
    }

    #[test]
    fn test_spend_gold_refuses_overspend() {
        let config = EngineConfig::default();
        let validator = ResourceValidator::new(&config, Utc::now());
        let mut user = User::new("Ada", "Mage");
        user.gold = 10;
        assert_eq!(validator.spend_gold(&user, 4).unwrap(), -4);
        let err = validator.spend_gold(&user, 11).unwrap_err();
        assert_eq!(
            err.reason(),
            Some(&Reason::InsufficientGold {
                needed: 11,
                available: 10
            })
        );
    }

    #[test]
    fn test_validators_are_idempotent() {
        assert_eq!(clamp_heal(40, 100, 25, 5), clamp_heal(40, 100, 25, 5));
        assert_eq!(clamp_damage(40, 25, 50, 5, 10), clamp_damage(40, 25, 50, 5, 10));
    }

    #[test]
    fn test_multi_level_gemstones() {
        let config = EngineConfig::default().with_gemstones_on_level_up(3);
        let now = Utc::now();
        let validator = ResourceValidator::new(&config, now);
        let store = MemoryStore::new();
        let tx = store.begin().unwrap();

        let mut user = User::new("Ada", "Mage");
        user.xp = 900;
        user.level = 1;

        // 900 + 2200 = 3100 -> level 4: three levels gained.
        let gain = validator.experience_and_level(&tx, &mut user, 2200).unwrap();
        assert_eq!(gain.applied, 2200);
        assert_eq!((gain.old_level, gain.new_level), (1, 4));
        assert_eq!(gain.gemstones, 9);
        assert_eq!(user.gemstones, 9);
        assert_eq!(user.level, 4);
        assert!(gain.leveled());
    }

    #[test]
    fn test_experience_modifier_from_passives() {
        let config = EngineConfig::default();
        let now = Utc::now();
        let validator = ResourceValidator::new(&config, now);
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();

        let mut user = User::new("Ada", "Mage");
        impose(&mut tx, user.id, EffectKind::Experience, 50, "Scholar", None, now).unwrap();
        impose(&mut tx, user.id, EffectKind::Experience, -20, "Penalty", Some(60), now).unwrap();

        let gain = validator.experience_and_level(&tx, &mut user, 100).unwrap();
        assert_eq!(gain.applied, 130);
        assert_eq!(user.xp, 130);
        assert!(!gain.leveled());
    }

    #[test]
    fn test_healing_validator_uses_health_bonus() {
        let config = EngineConfig::default();
        let now = Utc::now();
        let validator = ResourceValidator::new(&config, now);
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();

        let target = User::new("Bo", "Warrior").with_hp(50, 100);
        impose(&mut tx, target.id, EffectKind::Health, 5, "Blessing", None, now).unwrap();
        assert_eq!(validator.healing(&tx, &target, 10).unwrap(), 15);

        let dead = User::new("Cy", "Warrior").with_hp(0, 100);
        let err = validator.healing(&tx, &dead, 10).unwrap_err();
        assert_eq!(err.reason(), Some(&Reason::TargetDead(dead.id)));
    }

    #[test]
    fn test_damage_validator_uses_debuffs() {
        let config = EngineConfig::default();
        let now = Utc::now();
        let validator = ResourceValidator::new(&config, now);
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();

        let target = User::new("Bo", "Warrior").with_hp(100, 100);
        impose(&mut tx, target.id, EffectKind::Damage, 50, "Curse", None, now).unwrap();
        impose(&mut tx, target.id, EffectKind::Protection, 4, "Shield", None, now).unwrap();
        impose(&mut tx, UserId::new(), EffectKind::Protection, 99, "Other", None, now).unwrap();

        assert_eq!(validator.damage(&tx, &target, 20, 0).unwrap(), 26);
    }
}
