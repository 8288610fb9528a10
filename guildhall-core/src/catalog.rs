//! Starter content: the ability tree and the cosmic event deck.

use crate::dice::DiceExpression;
use crate::model::{Ability, AbilityEffect, AbilityType, CosmicEvent, Enemy, EnemyId, TargetShape};
use crate::store::WorldState;

fn dice(notation: &str) -> DiceExpression {
    // Catalog notation is fixed at compile time and covered by tests.
    DiceExpression::parse(notation).unwrap_or_else(|_| DiceExpression::constant(0))
}

lazy_static::lazy_static! {
    /// Abilities available for purchase, roots before children.
    pub static ref STARTER_ABILITIES: Vec<Ability> = vec![
        // Healer
        Ability::new("Mend", AbilityEffect::Heal { amount: 10 }, TargetShape::Single)
            .with_category("Healer")
            .with_mana_cost(2)
            .with_xp(20)
            .with_price(1),
        Ability::new("Prayer", AbilityEffect::Heal { amount: 8 }, TargetShape::Others)
            .with_category("Healer")
            .with_mana_cost(6)
            .with_xp(40)
            .with_price(2)
            .with_parent("Mend"),
        Ability::new("Blessing", AbilityEffect::HealthPassive { bonus: 3 }, TargetShape::All)
            .with_category("Healer")
            .with_mana_cost(8)
            .with_xp(60)
            .with_price(3)
            .with_duration(8 * 60)
            .with_parent("Prayer"),
        // Mage
        Ability::new("Focus", AbilityEffect::Mana { amount: 5 }, TargetShape::Single)
            .with_category("Mage")
            .with_health_cost(5)
            .with_xp(20)
            .with_price(1),
        Ability::new("Siphon", AbilityEffect::Transfer { amount: 5 }, TargetShape::Single)
            .with_category("Mage")
            .with_xp(20)
            .with_price(2)
            .with_parent("Focus"),
        Ability::new("Hex", AbilityEffect::Damage { percent: 50 }, TargetShape::Single)
            .with_category("Mage")
            .with_mana_cost(4)
            .with_xp(30)
            .with_price(2)
            .with_duration(24 * 60)
            .with_parent("Focus"),
        Ability::new("Wellspring", AbilityEffect::IncreaseMana { amount: 5 }, TargetShape::Caster)
            .with_category("Mage")
            .with_mana_cost(10)
            .with_xp(80)
            .with_price(4)
            .with_parent("Siphon"),
        // Guardian
        Ability::new("Stone Skin", AbilityEffect::Protection { reduction: 3 }, TargetShape::Caster)
            .with_category("Guardian")
            .with_mana_cost(3)
            .with_xp(20)
            .with_price(1)
            .with_duration(12 * 60),
        Ability::new("Vigor", AbilityEffect::IncreaseHealth { amount: 10 }, TargetShape::Caster)
            .with_category("Guardian")
            .with_mana_cost(10)
            .with_xp(80)
            .with_price(4)
            .with_parent("Stone Skin"),
        Ability::new("Exchange", AbilityEffect::Swap, TargetShape::Single)
            .with_category("Guardian")
            .with_mana_cost(5)
            .with_xp(40)
            .with_price(3)
            .with_parent("Stone Skin"),
        // Fighter
        Ability::new("Strike", AbilityEffect::DungeonAttack { dice: dice("1d6") }, TargetShape::Single)
            .with_category("Fighter")
            .with_xp(10)
            .with_price(1),
        Ability::new("Cleave", AbilityEffect::DungeonAttack { dice: dice("2d8+2") }, TargetShape::Single)
            .with_category("Fighter")
            .with_mana_cost(4)
            .with_xp(20)
            .with_price(3)
            .with_parent("Strike"),
        Ability::new("Keen Edge", AbilityEffect::Crit { percent: 25 }, TargetShape::Caster)
            .with_category("Fighter")
            .with_mana_cost(5)
            .with_xp(30)
            .with_price(2)
            .with_duration(24 * 60)
            .with_parent("Strike"),
        // Scholar
        Ability::new("Study Group", AbilityEffect::Experience { percent: 20 }, TargetShape::All)
            .with_category("Scholar")
            .with_mana_cost(8)
            .with_xp(30)
            .with_price(2)
            .with_duration(4 * 60),
        Ability::new("Extension I", AbilityEffect::Postpone { days: 1 }, TargetShape::Caster)
            .with_category("Scholar")
            .with_mana_cost(10)
            .with_price(3)
            .with_duration(24 * 60)
            .with_parent("Study Group"),
        Ability::new("Extension II", AbilityEffect::Postpone { days: 2 }, TargetShape::Caster)
            .with_category("Scholar")
            .with_mana_cost(15)
            .with_price(5)
            .with_duration(48 * 60)
            .with_parent("Extension I"),
        // Merchant
        Ability::new("Stamina", AbilityEffect::TurnPassive { bonus: 1 }, TargetShape::Caster)
            .with_category("Merchant")
            .with_xp(10)
            .with_price(2),
        Ability::new("Golden Touch", AbilityEffect::GoldPassive { percent: 25 }, TargetShape::Caster)
            .with_category("Merchant")
            .with_mana_cost(5)
            .with_xp(20)
            .with_price(3)
            .with_duration(24 * 60)
            .with_parent("Stamina"),
        Ability::new("Meditation", AbilityEffect::ManaPassive { bonus: 2 }, TargetShape::Caster)
            .with_category("Merchant")
            .with_xp(10)
            .with_price(2)
            .with_duration(24 * 60)
            .with_parent("Stamina"),
    ];

    /// The daily cosmic event deck.
    pub static ref COSMIC_EVENTS: Vec<CosmicEvent> = vec![
        CosmicEvent::new("Clear Skies", 20),
        CosmicEvent::new("Drought", 8).blocking(AbilityType::Heal),
        CosmicEvent::new("Mana Storm", 8).blocking(AbilityType::Transfer),
        CosmicEvent::new("Blood Moon", 5)
            .with_effect(AbilityEffect::Damage { percent: 25 }, Some(24 * 60)),
        CosmicEvent::new("Spring Rain", 6)
            .with_effect(AbilityEffect::Heal { amount: 15 }, None),
        CosmicEvent::new("Scholar's Eclipse", 4)
            .with_effect(AbilityEffect::Experience { percent: 10 }, Some(24 * 60)),
        CosmicEvent::new("Eternal Night", 0).blocking(AbilityType::Swap),
    ];
}

/// Look up a starter ability by name.
pub fn find_ability(name: &str) -> Option<&'static Ability> {
    STARTER_ABILITIES.iter().find(|a| a.name == name)
}

/// A basic enemy template for a fresh dungeon.
pub fn training_dummy() -> Enemy {
    Enemy {
        id: EnemyId::new(),
        name: "Training Dummy".to_string(),
        max_health: 50,
        attack: dice("1d4"),
        xp: 100,
        gold: 20,
    }
}

/// Load the starter catalog into a world.
pub fn install(state: &mut WorldState) {
    for ability in STARTER_ABILITIES.iter() {
        state.add_ability(ability.clone());
    }
    for event in COSMIC_EVENTS.iter() {
        state.add_cosmic_event(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_dice_parse() {
        for ability in STARTER_ABILITIES.iter() {
            if let AbilityEffect::DungeonAttack { dice } = &ability.effect {
                assert!(dice.bounds().1 > 0, "{} has no damage", ability.name);
            }
        }
    }

    #[test]
    fn test_parents_exist_and_come_first() {
        for (index, ability) in STARTER_ABILITIES.iter().enumerate() {
            if let Some(parent) = &ability.parent {
                let position = STARTER_ABILITIES
                    .iter()
                    .position(|a| &a.name == parent)
                    .unwrap_or_else(|| panic!("{} has unknown parent {parent}", ability.name));
                assert!(position < index);
            }
        }
    }

    #[test]
    fn test_names_unique() {
        let mut names: Vec<_> = STARTER_ABILITIES.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), STARTER_ABILITIES.len());
        assert!(find_ability("Mend").is_some());
        assert!(find_ability("Fireball").is_none());
    }

    #[test]
    fn test_install_seeds_world() {
        let mut state = WorldState::new();
        install(&mut state);
        assert_eq!(state.abilities.len(), STARTER_ABILITIES.len());
        assert_eq!(state.cosmic_events.len(), COSMIC_EVENTS.len());
    }
}
