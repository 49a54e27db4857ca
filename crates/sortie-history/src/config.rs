//! History configuration parameters.

use crate::error::HistoryError;

/// Configuration for the history arena.
///
/// Validated when the history is created; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Materialize a full cell snapshot every this many trunk commits.
    ///
    /// Default: 64. Lower values trade memory for shorter replay paths on
    /// queries. Must be at least 1.
    pub snapshot_interval: usize,
}

impl HistoryConfig {
    /// Default commits between snapshots.
    pub const DEFAULT_SNAPSHOT_INTERVAL: usize = 64;

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.snapshot_interval == 0 {
            return Err(HistoryError::InvalidConfig {
                reason: "snapshot_interval must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Self::DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(HistoryConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_rejected() {
        let config = HistoryConfig {
            snapshot_interval: 0,
        };
        assert!(matches!(
            config.validate(),
            Err(HistoryError::InvalidConfig { .. })
        ));
    }
}
