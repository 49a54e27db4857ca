//! Constraints over resource profiles and their violation windows.

use serde::{Deserialize, Serialize};
use sortie_core::{Duration, RealDynamics, SerializedValue, TimeError, Window};

use crate::results::ProfileSegment;

/// What a constraint requires of its resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintKind {
    /// A real resource must stay within `[lower, upper]`.
    RealBounds {
        /// Resource name.
        resource: String,
        /// Inclusive lower bound.
        lower: f64,
        /// Inclusive upper bound.
        upper: f64,
    },
    /// A discrete resource must take one of the listed values.
    DiscreteOneOf {
        /// Resource name.
        resource: String,
        /// Permitted values.
        allowed: Vec<SerializedValue>,
    },
}

/// A named requirement over one resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint name, reported with violations.
    pub name: String,
    /// The requirement.
    pub kind: ConstraintKind,
}

impl Constraint {
    /// `lower <= resource <= upper` at all times.
    pub fn real_between(
        name: impl Into<String>,
        resource: impl Into<String>,
        lower: f64,
        upper: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::RealBounds {
                resource: resource.into(),
                lower,
                upper,
            },
        }
    }

    /// `resource` is always one of `allowed`.
    pub fn discrete_one_of(
        name: impl Into<String>,
        resource: impl Into<String>,
        allowed: Vec<SerializedValue>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ConstraintKind::DiscreteOneOf {
                resource: resource.into(),
                allowed,
            },
        }
    }

    /// The constrained resource.
    pub fn resource(&self) -> &str {
        match &self.kind {
            ConstraintKind::RealBounds { resource, .. }
            | ConstraintKind::DiscreteOneOf { resource, .. } => resource,
        }
    }

    /// True if the resource is real-valued.
    pub fn is_real(&self) -> bool {
        matches!(self.kind, ConstraintKind::RealBounds { .. })
    }
}

/// Where a constraint does not hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// The violated constraint.
    pub constraint: String,
    /// Resources involved.
    pub resource_names: Vec<String>,
    /// Disjoint, ordered violation windows in plan time.
    pub windows: Vec<Window>,
}

/// Violation windows of a real-bounds constraint over a profile.
pub(crate) fn real_violations(
    profile: &[ProfileSegment<RealDynamics>],
    lower: f64,
    upper: f64,
) -> Result<Vec<Window>, TimeError> {
    let mut windows = Vec::new();
    for segment in profile.iter().filter(|s| s.extent.is_positive()) {
        for window in segment.dynamics.when_not_between(lower, upper, segment.extent) {
            windows.push(window.shifted(segment.start)?);
        }
    }
    Ok(coalesce(windows))
}

/// Violation windows of a discrete allowed-set constraint over a profile.
pub(crate) fn discrete_violations(
    profile: &[ProfileSegment<SerializedValue>],
    allowed: &[SerializedValue],
) -> Result<Vec<Window>, TimeError> {
    let mut windows = Vec::new();
    for segment in profile.iter().filter(|s| s.extent.is_positive()) {
        if !allowed.contains(&segment.dynamics) {
            windows.push(Window::new(segment.start, segment.start.plus(segment.extent)?));
        }
    }
    Ok(coalesce(windows))
}

/// Merge ordered windows that overlap or abut at microsecond resolution.
fn coalesce(windows: Vec<Window>) -> Vec<Window> {
    let mut merged: Vec<Window> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end.saturating_plus(Duration::EPSILON) => {
                last.end = last.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn secs(n: i64) -> Duration {
        Duration::of(n, Duration::SECOND).unwrap()
    }

    fn segment<D>(start: i64, extent: i64, dynamics: D) -> ProfileSegment<D> {
        ProfileSegment {
            start: secs(start),
            extent: secs(extent),
            dynamics,
        }
    }

    #[test]
    fn real_bounds_find_crossing() {
        // 4 - 1/s: negative after t=4s.
        let profile = vec![segment(0, 10, RealDynamics::linear(4.0, -1.0))];
        let windows = real_violations(&profile, 0.0, f64::INFINITY).unwrap();
        assert_eq!(
            windows,
            vec![Window::new(secs(4).saturating_plus(Duration::EPSILON), secs(10))]
        );
    }

    #[test]
    fn adjacent_segment_windows_coalesce() {
        let profile = vec![
            segment(0, 2, RealDynamics::constant(-1.0)),
            segment(2, 3, RealDynamics::constant(-5.0)),
            segment(5, 1, RealDynamics::constant(1.0)),
        ];
        let windows = real_violations(&profile, 0.0, 10.0).unwrap();
        assert_eq!(windows, vec![Window::new(secs(0), secs(5))]);
    }

    #[test]
    fn zero_extent_segments_are_ignored() {
        let profile = vec![
            segment(0, 0, RealDynamics::constant(-1.0)),
            segment(0, 5, RealDynamics::constant(1.0)),
        ];
        assert!(real_violations(&profile, 0.0, 10.0).unwrap().is_empty());
    }

    #[test]
    fn discrete_allowed_set() {
        let profile = vec![
            segment(0, 2, json!("Chiquita")),
            segment(2, 3, json!("Fyffes")),
            segment(5, 1, json!("Dole")),
        ];
        let windows = discrete_violations(&profile, &[json!("Chiquita"), json!("Dole")]).unwrap();
        assert_eq!(windows, vec![Window::new(secs(2), secs(5))]);
    }

    #[test]
    fn constraint_accessors() {
        let c = Constraint::discrete_one_of("producer", "/producer", vec![json!("Dole")]);
        assert_eq!(c.resource(), "/producer");
        assert!(!c.is_real());
        assert!(Constraint::real_between("n", "/fruit", 0.0, 1.0).is_real());
    }
}
