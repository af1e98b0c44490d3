//! Alignment of model days with calendar days.
//!
//! The offset is found by an exhaustive search that matches the model death
//! curve against reported deaths. The error metric compares log-transformed
//! series, weighted by `1 / sqrt(1 + ln(model + 1))`, which stresses relative
//! error on small counts. Both the metric and the default window of 150 days
//! are empirical and can be tuned.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::SeirError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Use this offset instead of searching.
    pub offset: Option<usize>,
    /// Offsets `0..search_window` are tried.
    pub search_window: usize,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            offset: None,
            search_window: 150,
        }
    }
}

/// Weighted RMS log error between `real` and `model` delayed by `offset`
/// days. The delayed model is zero-padded or cut to the length of `real`.
pub fn alignment_error(real: &[f64], model: &[f64], offset: usize) -> f64 {
    if real.is_empty() {
        return 0.0;
    }
    let sum: f64 = real
        .iter()
        .enumerate()
        .map(|(day, &r)| {
            let m = day
                .checked_sub(offset)
                .and_then(|model_day| model.get(model_day))
                .copied()
                .unwrap_or(0.0);
            let (log_r, log_m) = (r.max(0.0).ln_1p(), m.max(0.0).ln_1p());
            (log_r - log_m).powi(2) / (1.0 + log_m)
        })
        .sum();
    (sum / real.len() as f64).sqrt()
}

/// Smallest offset in `0..window` minimising [`alignment_error`].
pub fn find_offset(real: &[f64], model: &[f64], window: usize) -> Result<usize, SeirError> {
    if real.is_empty() {
        return Err(SeirError::Alignment("reported death series is empty".into()));
    }
    if let Some(day) = real.iter().position(|d| !d.is_finite()) {
        return Err(SeirError::Alignment(format!(
            "reported death count on day {day} is not a number"
        )));
    }
    if real.iter().all(|&d| d == 0.0) {
        return Err(SeirError::Alignment(
            "reported death series has no deaths to match".into(),
        ));
    }
    if window == 0 {
        return Err(SeirError::Alignment("offset search window is empty".into()));
    }

    let mut best = (0, f64::INFINITY);
    for offset in 0..window {
        let error = alignment_error(real, model, offset);
        if error < best.1 {
            best = (offset, error);
        }
    }
    log::info!("date offset: {} (error {:.4})", best.0, best.1);
    Ok(best.0)
}

pub fn resolve_offset(
    real: &[f64],
    model: &[f64],
    config: &AlignmentConfig,
) -> Result<usize, SeirError> {
    match config.offset {
        Some(offset) => {
            log::info!("date offset: {offset} (fixed)");
            Ok(offset)
        }
        None => find_offset(real, model, config.search_window),
    }
}

/// Calendar date of each model day. Reported day `j` lines up with model day
/// `j - offset`, so model day `k` falls on `first_date + k + offset`.
pub fn model_dates(
    first_date: NaiveDate,
    days: usize,
    offset: usize,
) -> Result<Vec<NaiveDate>, SeirError> {
    (0..days)
        .map(|day| {
            first_date
                .checked_add_days(Days::new((day + offset) as u64))
                .ok_or_else(|| {
                    SeirError::Alignment(format!("model day {day} is past the calendar range"))
                })
        })
        .collect()
}
