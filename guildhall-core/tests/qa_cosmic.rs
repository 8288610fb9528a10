//! QA tests for cosmic event selection and effects.

use guildhall_core::cosmic::pick_weighted;
use guildhall_core::model::{
    Ability, AbilityEffect, AbilityType, CosmicEvent, CosmicEventId, EffectKind, TargetShape,
};
use guildhall_core::testing::assert_invalid;
use guildhall_core::{catalog, Change, GameError, Reason, Target, TestWorld};
use rand::rngs::StdRng;
use rand::SeedableRng;

// =============================================================================
// Weighted draw
// =============================================================================

#[test]
fn test_zero_frequency_is_never_drawn() {
    let events = vec![
        CosmicEvent::new("Sun", 10),
        CosmicEvent::new("Moon", 10),
        CosmicEvent::new("Void", 0),
    ];
    let mut rng = StdRng::seed_from_u64(11);
    let mut counts = [0; 3];
    for _ in 0..4000 {
        counts[pick_weighted(&events, &mut rng).unwrap()] += 1;
    }
    assert_eq!(counts[2], 0);
    assert!((1700..=2300).contains(&counts[0]), "{counts:?}");
}

#[test]
fn test_repeats_lower_the_odds() {
    let mut stale = CosmicEvent::new("Stale", 10);
    stale.occurrences = 3;
    let events = vec![stale, CosmicEvent::new("Fresh", 10)];

    let mut rng = StdRng::seed_from_u64(5);
    let stale_draws = (0..2000)
        .filter(|_| pick_weighted(&events, &mut rng).unwrap() == 0)
        .count();
    // Expected 2000 * 2.5 / 12.5 = 400.
    assert!((300..=500).contains(&stale_draws), "{stale_draws}");
}

#[test]
fn test_daily_draw_needs_a_catalog() {
    let world = TestWorld::new();
    assert!(matches!(
        world.engine.select_daily_event(&world.admin),
        Err(GameError::Configuration(_))
    ));

    world.add_cosmic_event(CosmicEvent::new("Void", 0));
    assert!(matches!(
        world.engine.select_daily_event(&world.admin),
        Err(GameError::Configuration(_))
    ));
}

// =============================================================================
// Selection
// =============================================================================

#[test]
fn test_daily_draw_counts_occurrence_and_applies_effect() {
    let world = TestWorld::new();
    let rain = CosmicEvent::new("Spring Rain", 5).with_effect(AbilityEffect::Heal { amount: 15 }, None);
    let rain_id = rain.id;
    world.add_cosmic_event(rain);
    let hurt = world.add_member("Hurt", "Fighter");
    let dead = world.add_member("Dead", "Fighter");
    world.update_user(hurt, |u| u.hp = 50);
    world.update_user(dead, |u| u.hp = 0);

    let resolution = world
        .engine
        .select_daily_event(&world.admin)
        .expect("draw should resolve");
    assert!(resolution
        .changes
        .iter()
        .any(|c| matches!(c, Change::CosmicEventSelected { event, .. } if *event == rain_id)));

    let state = world.state();
    assert_eq!(state.cosmic_selection.selected, Some(rain_id));
    assert_eq!(state.cosmic_events[0].occurrences, 1);
    assert_eq!(world.user(hurt).hp, 65);
    assert_eq!(world.user(dead).hp, 0);
}

#[test]
fn test_selection_replaces_previous_event() {
    let world = TestWorld::new();
    world.add_cosmic_event(CosmicEvent::new("Sun", 10));
    world.add_cosmic_event(CosmicEvent::new("Moon", 10));

    for _ in 0..6 {
        world
            .engine
            .select_daily_event(&world.admin)
            .expect("draw should resolve");
    }
    let state = world.state();
    let drawn: u32 = state.cosmic_events.iter().map(|e| e.occurrences).sum();
    assert_eq!(drawn, 6);
    assert!(state.cosmic_selection.selected.is_some());
}

#[test]
fn test_admin_selection_blocks_ability_type() {
    let world = TestWorld::new();
    let drought = CosmicEvent::new("Drought", 10).blocking(AbilityType::Heal);
    let drought_id = drought.id;
    world.add_cosmic_event(drought);
    world.add_ability(
        Ability::new("Mend", AbilityEffect::Heal { amount: 10 }, TargetShape::Single)
            .with_mana_cost(2),
    );
    let healer = world.add_member("Healer", "Healer");
    let patient = world.add_member("Patient", "Fighter");
    world.update_user(patient, |u| u.hp = 40);
    world.grant(healer, "Mend");

    world
        .engine
        .admin_select_event(&world.admin, drought_id)
        .expect("selection should resolve");
    assert_eq!(world.state().cosmic_events[0].occurrences, 0);

    assert_invalid(
        world
            .engine
            .cast_ability(&world.player(healer), "Mend", Target::User(patient)),
        Reason::BlockedByCosmicEvent(AbilityType::Heal),
    );
    assert_eq!(world.user(healer).mana, 20);
}

#[test]
fn test_unknown_event_is_configuration_error() {
    let world = TestWorld::new();
    assert!(matches!(
        world
            .engine
            .admin_select_event(&world.admin, CosmicEventId::new()),
        Err(GameError::Configuration(_))
    ));
}

#[test]
fn test_noon_event_waits_for_explicit_apply() {
    let world = TestWorld::new();
    let mut moon = CosmicEvent::new("Blood Moon", 10)
        .with_effect(AbilityEffect::Damage { percent: 25 }, Some(24 * 60));
    moon.trigger_at_noon = true;
    world.add_cosmic_event(moon);
    let member = world.add_member("Member", "Fighter");

    assert_invalid(
        world.engine.apply_selected_event(&world.admin),
        Reason::NoCosmicEventSelected,
    );

    world
        .engine
        .select_daily_event(&world.admin)
        .expect("draw should resolve");
    assert_eq!(world.engine.modifier(member, EffectKind::Damage).unwrap(), 0);

    world
        .engine
        .apply_selected_event(&world.admin)
        .expect("apply should resolve");
    assert_eq!(world.engine.modifier(member, EffectKind::Damage).unwrap(), 25);
    assert_eq!(
        world
            .engine
            .modifier(world.admin.user, EffectKind::Damage)
            .unwrap(),
        25
    );

    // Applying twice leaves a single curse per user.
    world
        .engine
        .apply_selected_event(&world.admin)
        .expect("repeat apply should resolve");
    assert_eq!(world.engine.modifier(member, EffectKind::Damage).unwrap(), 25);
}

#[test]
fn test_starter_deck_draws() {
    let world = TestWorld::new();
    world.engine.store().seed(catalog::install).unwrap();

    for _ in 0..20 {
        world
            .engine
            .select_daily_event(&world.admin)
            .expect("draw should resolve");
    }
    let state = world.state();
    let retired = state
        .cosmic_events
        .iter()
        .find(|e| e.frequency == 0)
        .expect("starter deck has a retired event");
    assert_eq!(retired.occurrences, 0);
}
