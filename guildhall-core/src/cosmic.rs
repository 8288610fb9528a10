//! Daily cosmic event selection.
//!
//! Each event is weighted by `frequency / (occurrences + 1)`, so events that
//! have already come up often become rarer. Zero-frequency events are retired
//! and can never be drawn.

use crate::error::{empty_catalog, unknown_event, unselectable_catalog, GameError, Reason};
use crate::model::{Ability, CosmicEvent, CosmicEventId, CosmicSelection, TargetShape, UserId};
use crate::resolver::{AbilityResolver, Change, Resolution, Roster};
use crate::store::{StoreError, UnitOfWork};
use rand::Rng;

/// Index of the drawn event.
pub fn pick_weighted<R: Rng>(events: &[CosmicEvent], rng: &mut R) -> Result<usize, GameError> {
    if events.is_empty() {
        return Err(empty_catalog());
    }
    let total: f64 = events.iter().map(CosmicEvent::weight).sum();
    if total <= 0.0 {
        return Err(unselectable_catalog());
    }

    let mut draw = rng.gen_range(0.0..total);
    let mut last = 0;
    for (index, event) in events.iter().enumerate() {
        let weight = event.weight();
        if weight <= 0.0 {
            continue;
        }
        if draw < weight {
            return Ok(index);
        }
        draw -= weight;
        last = index;
    }
    // Rounding can leave a sliver past the final weight.
    Ok(last)
}

/// The currently selected event, if any.
pub fn selected_event<T: UnitOfWork>(tx: &T) -> Result<Option<CosmicEvent>, StoreError> {
    let selection = tx.cosmic_selection()?;
    let Some(id) = selection.selected else {
        return Ok(None);
    };
    Ok(tx.cosmic_events()?.into_iter().find(|e| e.id == id))
}

/// Draw today's event, replacing the previous selection and counting the
/// occurrence.
pub(crate) fn select_daily<T: UnitOfWork, R: Rng>(
    tx: &mut T,
    rng: &mut R,
    resolver: &AbilityResolver<'_>,
) -> Result<Resolution, GameError> {
    let events = tx.cosmic_events()?;
    let index = pick_weighted(&events, rng)?;
    let mut event = events[index].clone();
    event.occurrences += 1;
    tx.save_cosmic_event(&event)?;

    let mut resolution = select(tx, resolver, &event)?;
    if event.automatic && !event.trigger_at_noon && event.effect.is_some() {
        resolution.changes.extend(apply_event(tx, resolver, &event)?);
    }
    tracing::info!(event = %event.name, occurrences = event.occurrences, "cosmic event drawn");
    Ok(resolution)
}

/// Select a specific event without counting an occurrence.
pub(crate) fn select_by_id<T: UnitOfWork>(
    tx: &mut T,
    resolver: &AbilityResolver<'_>,
    id: CosmicEventId,
    actor: UserId,
) -> Result<Resolution, GameError> {
    let event = tx
        .cosmic_events()?
        .into_iter()
        .find(|e| e.id == id)
        .ok_or_else(|| unknown_event(id))?;
    let resolution = select(tx, resolver, &event)?;
    tx.audit(
        resolver.validator().now(),
        Some(actor),
        format!("{} selected by an administrator", event.name),
    )?;
    Ok(resolution)
}

/// Apply the selected event's effect to every active user.
pub(crate) fn apply_selected<T: UnitOfWork>(
    tx: &mut T,
    resolver: &AbilityResolver<'_>,
) -> Result<Resolution, GameError> {
    let event = selected_event(&*tx)?
        .ok_or_else(|| GameError::invalid(Reason::NoCosmicEventSelected))?;
    let changes = apply_event(tx, resolver, &event)?;
    let narrative = format!("{} takes effect", event.name);
    tx.audit(resolver.validator().now(), None, narrative.as_str())?;
    Ok(Resolution::new(narrative).with_changes(changes))
}

fn select<T: UnitOfWork>(
    tx: &mut T,
    resolver: &AbilityResolver<'_>,
    event: &CosmicEvent,
) -> Result<Resolution, GameError> {
    let now = resolver.validator().now();
    // Overwriting the single selection row unselects the previous event.
    tx.save_cosmic_selection(&CosmicSelection {
        selected: Some(event.id),
        selected_at: Some(now),
    })?;
    tx.audit(now, None, format!("Cosmic event: {}", event.name))?;

    Ok(Resolution::new(format!("Today's cosmic event is {}", event.name)).with_change(
        Change::CosmicEventSelected {
            event: event.id,
            name: event.name.clone(),
        },
    ))
}

fn apply_event<T: UnitOfWork>(
    tx: &mut T,
    resolver: &AbilityResolver<'_>,
    event: &CosmicEvent,
) -> Result<Vec<Change>, GameError> {
    let Some(cosmic) = &event.effect else {
        return Ok(Vec::new());
    };
    let targets: Vec<UserId> = tx
        .users()?
        .into_iter()
        .filter(|u| u.is_active() && !u.is_dead())
        .map(|u| u.id)
        .collect();
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let ability = Ability::new(event.name.clone(), cosmic.effect.clone(), TargetShape::All)
        .with_category("Cosmic");
    let mut roster = Roster::new();
    let changes = match resolver.apply(
        tx,
        &mut roster,
        None,
        &ability,
        cosmic.duration_minutes,
        &targets,
    ) {
        Ok(changes) => changes,
        // Nobody was affected; the event still stands.
        Err(e) if e.is_noop() || matches!(e.reason(), Some(Reason::AlreadyActive(_))) => {
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    roster.save(tx)?;

    tracing::info!(event = %event.name, affected = targets.len(), "cosmic event applied");
    Ok(changes)
}
