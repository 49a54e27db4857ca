//! One-shot simulation of a whole schedule.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use sortie_core::{ActivityDirectiveId, Duration, Schedule};
use tracing::info;

use crate::config::SimulationConfig;
use crate::engine::Engine;
use crate::error::SimulationError;
use crate::model::MissionModel;
use crate::results::{assemble, SimulationResults};

/// Simulate `schedule` from `start_time` for `duration` with default
/// engine settings.
pub fn simulate(
    model: Arc<MissionModel>,
    schedule: &Schedule,
    start_time: DateTime<Utc>,
    duration: Duration,
) -> Result<SimulationResults, SimulationError> {
    simulate_with(model, schedule, &SimulationConfig::new(start_time, duration))
}

/// Simulate `schedule` under an explicit configuration.
///
/// Every directive is instantiated before any simulated time passes, so
/// argument errors surface without side effects.
pub fn simulate_with(
    model: Arc<MissionModel>,
    schedule: &Schedule,
    config: &SimulationConfig,
) -> Result<SimulationResults, SimulationError> {
    config.validate()?;
    info!(
        directives = schedule.len(),
        start = %config.start_time,
        duration = %config.duration,
        "simulation starting"
    );
    let mut engine = Engine::new(model, config.engine.clone())?;
    schedule_all(&mut engine, schedule)?;
    engine.run_until(config.duration)?;
    let results = assemble(&engine, config.start_time, config.duration)?;
    let metrics = engine.metrics();
    info!(
        batches = metrics.batches,
        task_steps = metrics.task_steps,
        simulated = results.simulated_activities.len(),
        unfinished = results.unfinished_activities.len(),
        violations = results.constraint_violations.len(),
        wall_time_us = metrics.wall_time_us,
        "simulation finished"
    );
    Ok(results)
}

/// Schedule every directive, anchors before their dependents.
pub(crate) fn schedule_all(engine: &mut Engine, schedule: &Schedule) -> Result<(), SimulationError> {
    for id in resolve_order(schedule)? {
        if let Some(directive) = schedule.get(id) {
            engine.schedule_directive(id, directive)?;
        }
    }
    Ok(())
}

/// Directive ids ordered so that each anchor precedes what is anchored to
/// it. Otherwise schedule order is kept.
pub(crate) fn resolve_order(schedule: &Schedule) -> Result<Vec<ActivityDirectiveId>, SimulationError> {
    let mut ordered: IndexSet<ActivityDirectiveId> = IndexSet::with_capacity(schedule.len());
    for (id, _) in schedule.iter() {
        if ordered.contains(&id) {
            continue;
        }
        // Walk up the anchor chain, then emit it root-first.
        let mut chain: IndexSet<ActivityDirectiveId> = IndexSet::new();
        let mut cursor = id;
        loop {
            if !chain.insert(cursor) {
                return Err(SimulationError::AnchorCycle { directive: cursor });
            }
            let directive = schedule
                .get(cursor)
                .ok_or(SimulationError::UnknownDirective { directive: cursor })?;
            match directive.anchor {
                Some(anchor) if !ordered.contains(&anchor.directive) => {
                    if !schedule.contains(anchor.directive) {
                        return Err(SimulationError::UnknownAnchor {
                            directive: cursor,
                            anchor: anchor.directive,
                        });
                    }
                    cursor = anchor.directive;
                }
                _ => break,
            }
        }
        ordered.extend(chain.into_iter().rev());
    }
    Ok(ordered.into_iter().collect())
}
