//! Incremental simulation across a growing schedule.
//!
//! [`IncrementalSimulationDriver`] keeps one engine alive while a planner
//! adds directives one at a time. Appending a directive that starts after
//! everything simulated so far extends the live engine. Anything else
//! rebuilds the engine from scratch, since the history cannot be
//! un-replayed past a change in causal order. That covers a consumed
//! directive that changed or was removed, and a new directive at or before
//! the instant the engine has reached. Daemons and result queries move
//! that instant as well as directives do.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sortie_core::{ActivityDirectiveId, Duration, Schedule, TaskId};
use tracing::debug;

use crate::config::EngineConfig;
use crate::driver::schedule_all;
use crate::engine::Engine;
use crate::error::SimulationError;
use crate::model::MissionModel;
use crate::results::{assemble, SimulationResults};

struct CachedResults {
    epoch: DateTime<Utc>,
    horizon: Duration,
    results: SimulationResults,
}

/// One long-lived engine fed one directive at a time.
pub struct IncrementalSimulationDriver {
    model: Arc<MissionModel>,
    config: EngineConfig,
    engine: Engine,
    consumed: Schedule,
    cache: Option<CachedResults>,
    resets: u64,
}

impl IncrementalSimulationDriver {
    /// A driver with an empty schedule.
    pub fn new(model: Arc<MissionModel>, config: EngineConfig) -> Result<Self, SimulationError> {
        let engine = Engine::new(Arc::clone(&model), config.clone())?;
        Ok(Self {
            model,
            config,
            engine,
            consumed: Schedule::new(),
            cache: None,
            resets: 0,
        })
    }

    /// Add directive `id` from `schedule` and simulate until it (and every
    /// directive before it) has finished.
    ///
    /// `schedule` is the planner's whole current schedule. If directives
    /// already simulated differ from their entries in it, the engine is
    /// rebuilt from the current versions.
    pub fn simulate_activity(
        &mut self,
        schedule: &Schedule,
        id: ActivityDirectiveId,
    ) -> Result<(), SimulationError> {
        let directive = schedule
            .get(id)
            .ok_or(SimulationError::UnknownDirective { directive: id })?;
        self.cache = None;

        let stale = self
            .consumed
            .iter()
            .any(|(consumed, d)| schedule.get(consumed) != Some(d));
        if !stale && self.consumed.contains(id) {
            return Ok(());
        }
        // Daemons and result queries advance the engine too, so an empty
        // `consumed` does not mean nothing has run.
        let started = self.engine.metrics().batches > 0;
        let late = match self.engine.resolve_start(directive) {
            Some(start) => started && start <= self.engine.now(),
            None => directive.start_offset.is_negative(),
        };

        if stale || late || self.engine.is_failed() {
            let keep: Schedule = schedule
                .iter()
                .filter(|(d, _)| *d == id || self.consumed.contains(*d))
                .map(|(d, directive)| (d, directive.clone()))
                .collect();
            debug!(
                directive = %id,
                stale,
                late,
                directives = keep.len(),
                "rebuilding incremental engine"
            );
            let mut engine = Engine::new(Arc::clone(&self.model), self.config.clone())?;
            schedule_all(&mut engine, &keep)?;
            run_until_all_joined(&mut engine)?;
            self.engine = engine;
            self.consumed = keep;
            self.resets += 1;
        } else {
            self.engine.schedule_directive(id, directive)?;
            self.consumed.insert(id, directive.clone());
            run_until_all_joined(&mut self.engine)?;
        }
        Ok(())
    }

    /// Results for `[0, horizon]` with calendar times relative to `epoch`.
    ///
    /// A request with the cached epoch and a horizon within the cached one
    /// returns the cached results unchanged. Otherwise the engine first runs
    /// every job due at or before `horizon`, then results are recomputed.
    pub fn get_simulation_results_up_to(
        &mut self,
        epoch: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<SimulationResults, SimulationError> {
        if let Some(cached) = &self.cache {
            if cached.epoch == epoch && horizon <= cached.horizon {
                return Ok(cached.results.clone());
            }
        }
        // Appends since the last query may have queued work inside the
        // covered span, so always drain up to the horizon.
        self.engine.run_until(horizon)?;
        let results = assemble(&self.engine, epoch, horizon)?;
        self.cache = Some(CachedResults {
            epoch,
            horizon,
            results: results.clone(),
        });
        Ok(results)
    }

    /// Duration of the activity created for `id`, once it has finished.
    pub fn get_activity_duration(&self, id: ActivityDirectiveId) -> Option<Duration> {
        self.engine
            .task_for_directive(id)
            .and_then(|task| self.engine.task_duration(task))
    }

    /// Instant of the engine's most recent batch.
    pub fn current_time(&self) -> Duration {
        self.engine.now()
    }

    /// Drop all simulated state and consumed directives.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        self.engine = Engine::new(Arc::clone(&self.model), self.config.clone())?;
        self.consumed = Schedule::new();
        self.cache = None;
        self.resets += 1;
        Ok(())
    }

    /// The live engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// How many times the engine has been rebuilt.
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

fn run_until_all_joined(engine: &mut Engine) -> Result<(), SimulationError> {
    let tasks: Vec<TaskId> = engine.directive_tasks().map(|(_, task)| task).collect();
    engine.run_until_joined(&tasks)?;
    Ok(())
}
