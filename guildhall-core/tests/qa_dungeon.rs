//! QA tests for dungeon combat.

use guildhall_core::dice::DiceExpression;
use guildhall_core::model::{
    Ability, AbilityEffect, EffectKind, Enemy, EnemyId, GuildEnemy, GuildEnemyId, GuildId, TargetShape,
    UserId,
};
use guildhall_core::testing::assert_invalid;
use guildhall_core::{Change, Reason, Target, TestWorld, Trigger};

fn weapon(name: &str, notation: &str) -> Ability {
    Ability::new(
        name,
        AbilityEffect::DungeonAttack {
            dice: DiceExpression::parse(notation).unwrap(),
        },
        TargetShape::Single,
    )
    .with_xp(10)
}

fn enemy(health: i32) -> Enemy {
    Enemy {
        id: EnemyId::new(),
        name: "Goblin".to_string(),
        max_health: health,
        attack: DiceExpression::parse("1d4").unwrap(),
        xp: 100,
        gold: 20,
    }
}

/// A guild of a fighter with `turns` turns and one guildmate.
fn party(turns: i32) -> (TestWorld, UserId, UserId) {
    let world = TestWorld::new();
    world.add_ability(weapon("Sword", "1d4"));
    world.add_ability(weapon("Maul", "1d4+60"));
    world.add_ability(weapon("Hammer", "10"));
    let hero = world.add_member("Hero", "Fighter");
    let mate = world.add_member("Mate", "Healer");
    world.update_user(hero, |u| u.turns = turns);
    for name in ["Sword", "Maul", "Hammer"] {
        world.grant(hero, name);
    }
    (world, hero, mate)
}

// =============================================================================
// Attacks
// =============================================================================

#[test]
fn test_attack_spends_turn_and_leaves_attacker_untouched() {
    let (world, hero, _) = party(3);
    let goblin = world.spawn_enemy(enemy(1000));

    let resolution = world
        .engine
        .attack_enemy(&world.player(hero), "Sword", goblin)
        .expect("attack should resolve");

    let health = world.state().guild_enemies[&goblin].health;
    assert!((996..=999).contains(&health), "enemy at {health}");
    let fighter = world.user(hero);
    assert_eq!(fighter.turns, 2);
    assert_eq!(fighter.hp, 100);
    assert_eq!(fighter.xp, 10);
    assert!(!resolution.enemy_defeated());
    assert_eq!(world.analytics.count(Trigger::DungeonReward), 0);
}

#[test]
fn test_health_cost_attack_against_hard_hitter() {
    let (world, hero, _) = party(3);
    world.add_ability(weapon("Reckless Swing", "2d6").with_health_cost(5));
    world.grant(hero, "Reckless Swing");
    world.update_user(hero, |u| u.hp = 8);
    let mut ogre = enemy(1000);
    ogre.attack = DiceExpression::parse("1d4+10").unwrap();
    let ogre = world.spawn_enemy(ogre);

    world
        .engine
        .attack_enemy(&world.player(hero), "Reckless Swing", ogre)
        .expect("attack should resolve");

    let fighter = world.user(hero);
    assert_eq!(fighter.hp, 3);
    assert_eq!(fighter.turns, 2);
    assert!(world.state().guild_enemies[&ogre].health < 1000);
}

#[test]
fn test_unknown_enemy_is_refused() {
    let (world, hero, _) = party(1);
    let err = world
        .engine
        .attack_enemy(&world.player(hero), "Sword", GuildEnemyId::new())
        .unwrap_err();
    assert!(matches!(
        err.reason(),
        Some(Reason::NotFound { kind: "guild enemy", .. })
    ));
    assert_eq!(world.user(hero).turns, 1);
}

#[test]
fn test_crit_scales_attack_damage() {
    let (world, hero, _) = party(1);
    let goblin = world.spawn_enemy(enemy(1000));
    world.impose(hero, EffectKind::Crit, 50, Some(60));

    world
        .engine
        .attack_enemy(&world.player(hero), "Hammer", goblin)
        .expect("attack should resolve");
    assert_eq!(world.state().guild_enemies[&goblin].health, 985);
}

#[test]
fn test_no_turns_left() {
    let (world, hero, _) = party(0);
    let goblin = world.spawn_enemy(enemy(50));
    assert_invalid(
        world
            .engine
            .attack_enemy(&world.player(hero), "Sword", goblin),
        Reason::NoTurns,
    );
}

#[test]
fn test_non_dungeon_ability_cannot_target_enemy() {
    let (world, hero, _) = party(3);
    world.add_ability(Ability::new(
        "Mend",
        AbilityEffect::Heal { amount: 10 },
        TargetShape::Single,
    ));
    world.grant(hero, "Mend");
    let goblin = world.spawn_enemy(enemy(50));

    assert_invalid(
        world
            .engine
            .cast_ability(&world.player(hero), "Mend", Target::Enemy(goblin)),
        Reason::NotADungeonAbility("Mend".to_string()),
    );
}

#[test]
fn test_enemy_of_another_guild() {
    let (world, hero, _) = party(3);
    let template = enemy(50);
    let foreign = world
        .engine
        .store()
        .seed(|state| {
            let spawned = state.add_guild_enemy(GuildEnemy::spawn(GuildId::new(), &template));
            state.add_enemy(template.clone());
            spawned
        })
        .unwrap();

    assert_invalid(
        world
            .engine
            .attack_enemy(&world.player(hero), "Sword", foreign),
        Reason::WrongGuild,
    );
    assert_eq!(world.user(hero).turns, 3);
}

// =============================================================================
// Rewards
// =============================================================================

#[test]
fn test_defeat_rewards_guild_exactly_once() {
    let (world, hero, mate) = party(3);
    let goblin = world.spawn_enemy(enemy(50));

    let resolution = world
        .engine
        .attack_enemy(&world.player(hero), "Maul", goblin)
        .expect("attack should resolve");
    assert!(resolution.enemy_defeated());

    let state = world.state();
    assert!(state.guild_enemies[&goblin].rewarded);
    assert_eq!(state.guild_enemies[&goblin].displayed_health(), 0);

    let (fighter, healer) = (world.user(hero), world.user(mate));
    assert_eq!((fighter.xp, fighter.gold), (110, 20));
    assert_eq!((healer.xp, healer.gold), (100, 20));
    // The administrator is outside the guild.
    assert_eq!(world.user(world.admin.user).gold, 0);

    let gold_changes = resolution
        .changes
        .iter()
        .filter(|c| matches!(c, Change::GoldChanged { .. }))
        .count();
    assert_eq!(gold_changes, 2);

    assert_invalid(
        world
            .engine
            .attack_enemy(&world.player(hero), "Sword", goblin),
        Reason::EnemyDefeated(goblin),
    );
    assert_eq!(world.user(mate).gold, 20);
    assert_eq!(world.analytics.count(Trigger::DungeonReward), 1);
}

#[test]
fn test_gold_bonus_applies_to_reward() {
    let (world, hero, mate) = party(1);
    let goblin = world.spawn_enemy(enemy(50));
    world.impose(mate, EffectKind::GoldPassive, 50, None);

    world
        .engine
        .attack_enemy(&world.player(hero), "Maul", goblin)
        .expect("attack should resolve");
    assert_eq!(world.user(hero).gold, 20);
    assert_eq!(world.user(mate).gold, 30);
}
