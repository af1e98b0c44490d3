use chrono::NaiveDate;

use crate::{data::RegionSeries, observables::ObservableSeries, seir::Trajectory};

pub const ACTUAL_HEADER: [&str; 4] = ["name", "date", "cases", "deaths"];
pub const MODEL_HEADER: [&str; 6] = [
    "name",
    "date",
    "predicted cases",
    "predicted deaths",
    "r0 value",
    "fatality rate",
];
pub const TRAJECTORY_HEADER: [&str; 7] = [
    "day",
    "date",
    "susceptible",
    "exposed",
    "infected",
    "recovered",
    "r0",
];

pub fn actual_rows(series: &RegionSeries) -> Vec<Vec<String>> {
    series
        .dates
        .iter()
        .zip(&series.cases)
        .zip(&series.deaths)
        .map(|((date, cases), deaths)| {
            vec![
                series.name.clone(),
                date.to_string(),
                cases.to_string(),
                deaths.to_string(),
            ]
        })
        .collect()
}

/// One row per model day. `r0` is the configured initial reproduction number.
pub fn model_rows(
    name: &str,
    dates: &[NaiveDate],
    observables: &ObservableSeries,
    r0: f64,
    fatality_rate: f64,
) -> Vec<Vec<String>> {
    dates
        .iter()
        .zip(&observables.reported_cases)
        .zip(&observables.deaths)
        .map(|((date, cases), deaths)| {
            vec![
                name.to_string(),
                date.to_string(),
                cases.to_string(),
                deaths.to_string(),
                r0.to_string(),
                fatality_rate.to_string(),
            ]
        })
        .collect()
}

pub fn trajectory_rows(dates: &[NaiveDate], trajectory: &Trajectory) -> Vec<Vec<String>> {
    dates
        .iter()
        .zip(trajectory.states())
        .zip(trajectory.r0())
        .enumerate()
        .map(|(day, ((date, state), r0))| {
            vec![
                day.to_string(),
                date.to_string(),
                state.susceptible.to_string(),
                state.exposed.to_string(),
                state.infected.to_string(),
                state.recovered.to_string(),
                r0.to_string(),
            ]
        })
        .collect()
}
