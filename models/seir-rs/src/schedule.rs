use serde::{Deserialize, Serialize};

use crate::error::SeirError;

/// Quarantine intervention: free spread until `intervention_start`, the
/// reproduction number pinned to `quarantine_r` until `intervention_end`,
/// then a linear ramp of `delta_r` per day up to `post_release_r`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionSchedule {
    pub intervention_start: usize,
    pub intervention_end: usize,
    pub quarantine_r: f64,
    pub post_release_r: f64,
    pub delta_r: f64,
}

impl Default for InterventionSchedule {
    fn default() -> Self {
        Self {
            intervention_start: 74,
            intervention_end: 74 + 75,
            quarantine_r: 1.0,
            post_release_r: 1.0,
            delta_r: 0.0025,
        }
    }
}

impl InterventionSchedule {
    /// A schedule that never intervenes within `horizon` days.
    pub fn none(horizon: usize) -> Self {
        Self {
            intervention_start: horizon,
            intervention_end: horizon,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SeirError> {
        if self.intervention_end < self.intervention_start {
            return Err(SeirError::config(format!(
                "intervention_end ({}) is before intervention_start ({})",
                self.intervention_end, self.intervention_start
            )));
        }
        for (name, value) in [
            ("quarantine_r", self.quarantine_r),
            ("post_release_r", self.post_release_r),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SeirError::config(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if !self.delta_r.is_finite() || self.delta_r < 0.0 {
            return Err(SeirError::config(format!(
                "delta_r must be a non-negative number, got {}",
                self.delta_r
            )));
        }
        Ok(())
    }
}

/// Reproduction number in effect on `day`, given the value in effect on the
/// day before.
pub fn next_r0(day: usize, current_r0: f64, schedule: &InterventionSchedule) -> f64 {
    if day < schedule.intervention_start {
        current_r0
    } else if day < schedule.intervention_end {
        schedule.quarantine_r
    } else if current_r0 < schedule.post_release_r {
        // Last ramp step clamps onto the target.
        f64::min(current_r0 + schedule.delta_r, schedule.post_release_r)
    } else {
        schedule.post_release_r
    }
}
