//! QA tests for the resurrection cascade.

use guildhall_core::model::{Ability, AbilityEffect, EffectKind, TargetShape, UserId};
use guildhall_core::testing::assert_invalid;
use guildhall_core::{AuthError, GameError, Reason, ResurrectionTier, Target, TestWorld};

/// A guild with one dead member and three living ones at 100, 12 and 100 hp.
fn fallen_guild() -> (TestWorld, UserId, [UserId; 3]) {
    let world = TestWorld::new();
    let fallen = world.add_member("Fallen", "Fighter");
    let strong = world.add_member("Strong", "Guardian");
    let weak = world.add_member("Weak", "Mage");
    let other = world.add_member("Other", "Healer");
    world.update_user(fallen, |u| u.hp = 0);
    world.update_user(weak, |u| u.hp = 12);
    (world, fallen, [strong, weak, other])
}

#[test]
fn test_phone_tier_cascades_to_guild() {
    let (world, fallen, [strong, weak, other]) = fallen_guild();

    world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Phone)
        .expect("resurrection should resolve");

    assert_eq!(world.user(fallen).hp, 10);
    assert_eq!(world.engine.modifier(fallen, EffectKind::PhoneLoss).unwrap(), 1);
    assert_eq!(world.engine.modifier(fallen, EffectKind::Experience).unwrap(), 0);

    assert_eq!(world.user(strong).hp, 85);
    assert_eq!(world.user(weak).hp, 10);
    assert_eq!(world.user(other).hp, 85);
    for member in [strong, weak, other] {
        assert_eq!(
            world.engine.modifier(member, EffectKind::Sacrifice).unwrap(),
            1
        );
    }
    assert_eq!(world.engine.modifier(fallen, EffectKind::Sacrifice).unwrap(), 0);
}

#[test]
fn test_free_tier_costs_nobody() {
    let (world, fallen, [strong, weak, _]) = fallen_guild();

    world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Free)
        .expect("resurrection should resolve");

    assert_eq!(world.user(fallen).hp, 10);
    assert_eq!(world.user(strong).hp, 100);
    assert_eq!(world.user(weak).hp, 12);
    assert!(world.state().passives.is_empty());
}

#[test]
fn test_study_penalty_halves_experience() {
    let (world, fallen, _) = fallen_guild();
    world.add_ability(
        Ability::new("Focus", AbilityEffect::Mana { amount: 5 }, TargetShape::Caster).with_xp(40),
    );
    world.grant(fallen, "Focus");
    world.update_user(fallen, |u| u.mana = 0);

    world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Study)
        .expect("resurrection should resolve");
    assert_eq!(world.engine.modifier(fallen, EffectKind::Experience).unwrap(), -50);

    world
        .engine
        .cast_ability(&world.player(fallen), "Focus", Target::Default)
        .expect("focus should resolve");
    assert_eq!(world.user(fallen).xp, 20);
}

#[test]
fn test_collateral_respects_damage_modifiers() {
    let (world, fallen, [strong, _, _]) = fallen_guild();
    world.impose(strong, EffectKind::Damage, 50, None);
    world.impose(strong, EffectKind::Protection, 3, None);

    world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Detention)
        .expect("resurrection should resolve");

    // 15 * 150% = 22, less 3 protection.
    assert_eq!(world.user(strong).hp, 81);
    assert_eq!(world.engine.modifier(fallen, EffectKind::PhoneLoss).unwrap(), 1);
    assert_eq!(world.engine.modifier(fallen, EffectKind::Experience).unwrap(), -50);
}

#[test]
fn test_living_target_is_refused() {
    let (world, _, [strong, _, _]) = fallen_guild();
    assert_invalid(
        world
            .engine
            .resurrect(&world.admin, strong, ResurrectionTier::Phone),
        Reason::TargetAlive(strong),
    );
}

#[test]
fn test_players_cannot_resurrect() {
    let (world, fallen, [strong, _, _]) = fallen_guild();
    let err = world
        .engine
        .resurrect(&world.player(strong), fallen, ResurrectionTier::Free)
        .unwrap_err();
    assert!(matches!(
        err,
        GameError::Authorization(AuthError::AdminRequired)
    ));
    assert_eq!(world.user(fallen).hp, 0);
}

#[test]
fn test_failed_commit_rolls_back_whole_cascade() {
    let (world, fallen, [strong, weak, _]) = fallen_guild();
    let before = world.state();
    world.engine.store().fail_next_commit();

    let err = world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Detention)
        .unwrap_err();
    assert!(matches!(err, GameError::System { .. }));
    assert!(err.user_message().contains("ref"));

    assert_eq!(world.state(), before);
    assert_eq!(world.user(fallen).hp, 0);
    assert_eq!(world.user(strong).hp, 100);
    assert_eq!(world.user(weak).hp, 12);

    // The next attempt goes through.
    world
        .engine
        .resurrect(&world.admin, fallen, ResurrectionTier::Detention)
        .expect("retry should resolve");
    assert_eq!(world.user(fallen).hp, 10);
}

#[test]
fn test_unknown_target_is_refused() {
    let (world, _, _) = fallen_guild();
    let before = world.state();
    let err = world
        .engine
        .resurrect(&world.admin, UserId::new(), ResurrectionTier::Free)
        .unwrap_err();
    assert!(matches!(
        err,
        GameError::InvalidState(Reason::NotFound { kind: "user", .. })
    ));
    assert_eq!(world.state(), before);
}
