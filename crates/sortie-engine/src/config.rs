//! Engine and simulation configuration, validation, and error types.
//!
//! [`EngineConfig`] is the builder input for an [`Engine`](crate::Engine);
//! [`SimulationConfig`] adds the plan epoch and horizon for one-shot runs.
//! Both expose `validate()`, which constructors call before any state is
//! allocated.

use chrono::{DateTime, Utc};
use sortie_core::Duration;
use sortie_history::{HistoryConfig, HistoryError};
use thiserror::Error;

// ── EngineConfig ────────────────────────────────────────────────

/// Configuration for one engine instance.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// History snapshot policy.
    pub history: HistoryConfig,
    /// Upper bound on consecutive batches at a single instant. Guards
    /// against tasks that yield with zero delay forever. Default: 10_000.
    pub max_batches_per_instant: usize,
    /// Include the pre-simulation state as the first profile sample even
    /// when effects at t=0 immediately replace it. Default: true.
    pub sample_initial_state: bool,
}

impl EngineConfig {
    /// Default livelock guard.
    pub const DEFAULT_MAX_BATCHES_PER_INSTANT: usize = 10_000;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.history.validate()?;
        if self.max_batches_per_instant == 0 {
            return Err(ConfigError::ZeroBatchLimit);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            max_batches_per_instant: Self::DEFAULT_MAX_BATCHES_PER_INSTANT,
            sample_initial_state: true,
        }
    }
}

// ── SimulationConfig ────────────────────────────────────────────

/// Parameters of a one-shot simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Calendar instant corresponding to `Duration::ZERO`.
    pub start_time: DateTime<Utc>,
    /// Horizon: how far past `start_time` to simulate.
    pub duration: Duration,
    /// Engine settings.
    pub engine: EngineConfig,
}

impl SimulationConfig {
    /// Default engine settings over `[start_time, start_time + duration]`.
    pub fn new(start_time: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start_time,
            duration,
            engine: EngineConfig::default(),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.duration.is_negative() {
            return Err(ConfigError::NegativeDuration {
                duration: self.duration,
            });
        }
        if self.duration.add_to(self.start_time).is_err() {
            return Err(ConfigError::EpochOverflow {
                duration: self.duration,
            });
        }
        Ok(())
    }
}

// ── ConfigError ─────────────────────────────────────────────────

/// Errors detected by `validate()`.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// History configuration is invalid.
    #[error(transparent)]
    History(#[from] HistoryError),
    /// `max_batches_per_instant` is zero.
    #[error("max_batches_per_instant must be at least 1")]
    ZeroBatchLimit,
    /// The simulation horizon is negative.
    #[error("simulation duration {duration} is negative")]
    NegativeDuration {
        /// The configured duration.
        duration: Duration,
    },
    /// `start_time + duration` is outside the calendar range.
    #[error("simulation end ({duration} after start) is out of calendar range")]
    EpochOverflow {
        /// The configured duration.
        duration: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(SimulationConfig::new(epoch(), Duration::HOUR).validate().is_ok());
    }

    #[test]
    fn zero_batch_limit_rejected() {
        let config = EngineConfig {
            max_batches_per_instant: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroBatchLimit));
    }

    #[test]
    fn history_errors_surface() {
        let config = EngineConfig {
            history: HistoryConfig {
                snapshot_interval: 0,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::History(_))));
    }

    #[test]
    fn negative_and_overflowing_durations_rejected() {
        let negative = SimulationConfig::new(epoch(), Duration::from_micros(-1));
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::NegativeDuration { .. })
        ));
        let huge = SimulationConfig::new(epoch(), Duration::MAX);
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::EpochOverflow { .. })
        ));
    }
}
