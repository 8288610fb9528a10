//! Dungeon combat against a guild's shared enemy.
//!
//! One attack spends one turn, rolls the ability's dice and takes the result
//! off the enemy's health pool. The first attack that brings the pool to zero
//! or below pays every active guild member exactly once; the `rewarded` flag
//! on the enemy guards later attacks.

use crate::error::{lookup, GameError, Reason};
use crate::model::{Ability, AbilityEffect, GuildEnemy, GuildEnemyId, UserId};
use crate::resolver::{credit_experience, Change, Roster};
use crate::store::UnitOfWork;
use crate::validator::ResourceValidator;
use rand::Rng;

/// Resolve one dungeon attack by `attacker` with a dice ability.
pub(crate) fn attack<T: UnitOfWork, R: Rng>(
    tx: &mut T,
    rng: &mut R,
    validator: &ResourceValidator<'_>,
    roster: &mut Roster,
    attacker: UserId,
    ability: &Ability,
    enemy_id: GuildEnemyId,
) -> Result<Vec<Change>, GameError> {
    let dice = match &ability.effect {
        AbilityEffect::DungeonAttack { dice } => dice,
        _ => {
            return Err(GameError::invalid(Reason::NotADungeonAbility(
                ability.name.clone(),
            )))
        }
    };

    let user = roster.load(&*tx, attacker)?;
    if user.turns <= 0 {
        return Err(GameError::invalid(Reason::NoTurns));
    }
    let mut target = lookup(tx.guild_enemy(enemy_id))?;
    match user.guild {
        None => return Err(GameError::invalid(Reason::NoGuild)),
        Some(guild) if guild != target.guild => return Err(GameError::invalid(Reason::WrongGuild)),
        Some(_) => {}
    }
    if target.is_defeated() {
        return Err(GameError::invalid(Reason::EnemyDefeated(enemy_id)));
    }
    let template = tx.enemy(target.enemy)?;

    let roll = dice.roll_with_rng(rng);
    let damage = validator.attack_damage(&*tx, user, roll.damage())?;
    target.health -= damage;
    user.turns -= 1;

    let attacker_name = user.name.clone();
    let mut changes = vec![
        Change::DiceRolled {
            roll,
            purpose: format!("{} attack", ability.name),
        },
        Change::EnemyDamaged {
            enemy: enemy_id,
            amount: damage,
            health: target.displayed_health(),
        },
        Change::TurnsChanged {
            user: attacker,
            amount: -1,
            remaining: user.turns,
        },
    ];
    tx.audit(
        validator.now(),
        Some(attacker),
        format!(
            "{} hit {} with {} for {} ({} left)",
            attacker_name,
            template.name,
            ability.name,
            damage,
            target.displayed_health()
        ),
    )?;

    tracing::debug!(
        enemy = %enemy_id,
        damage,
        health = target.health,
        "dungeon attack resolved"
    );

    if target.is_defeated() && !target.rewarded {
        target.rewarded = true;
        changes.push(Change::EnemyDefeated { enemy: enemy_id });
        changes.extend(distribute_reward(
            tx,
            validator,
            roster,
            &target,
            &template.name,
            template.xp,
            template.gold,
        )?);
    }

    tx.save_guild_enemy(&target)?;
    Ok(changes)
}

fn distribute_reward<T: UnitOfWork>(
    tx: &mut T,
    validator: &ResourceValidator<'_>,
    roster: &mut Roster,
    enemy: &GuildEnemy,
    enemy_name: &str,
    xp: i32,
    gold: i32,
) -> Result<Vec<Change>, GameError> {
    let members: Vec<UserId> = tx
        .guild_members(enemy.guild)?
        .into_iter()
        .filter(|m| m.is_active())
        .map(|m| m.id)
        .collect();

    tracing::info!(
        enemy = %enemy.id,
        members = members.len(),
        xp,
        gold,
        "enemy defeated, distributing reward"
    );

    let mut changes = Vec::new();
    for member in members {
        let user = roster.load(&*tx, member)?;
        changes.extend(credit_experience(tx, validator, user, xp)?);
        let earned = validator.gold(&*tx, user, gold)?;
        user.gold += earned;
        changes.push(Change::gold(user, earned));
        tx.audit(
            validator.now(),
            Some(member),
            format!(
                "{} earned {} xp and {} gold for defeating {}",
                user.name, xp, earned, enemy_name
            ),
        )?;
    }
    Ok(changes)
}
