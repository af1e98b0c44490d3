use chrono::NaiveDate;

use crate::{
    alignment,
    data::RegionSeries,
    error::SeirError,
    observables::{self, ObservableSeries},
    parameters::{RunConfig, VirusParameters},
    seir::{SeirModel, Trajectory},
};

/// Everything one run produces, ready for reporting.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub virus: VirusParameters,
    pub trajectory: Trajectory,
    pub observables: ObservableSeries,
    pub offset: usize,
    /// Calendar date of each model day.
    pub dates: Vec<NaiveDate>,
}

impl ModelRun {
    pub fn date_of(&self, day: usize) -> Option<NaiveDate> {
        self.dates.get(day).copied()
    }

    pub fn total_deaths(&self) -> f64 {
        self.observables.deaths.iter().copied().fold(0.0, f64::max)
    }
}

pub fn run_model(
    config: &RunConfig,
    reported: &RegionSeries,
    population: f64,
) -> Result<ModelRun, SeirError> {
    let simulation = config.simulation(population)?;
    let virus = simulation.virus;
    log::info!(
        "sigma: {:.3}  1/sigma: {:.3}  gamma: {:.3}  1/gamma: {:.3}",
        virus.sigma(),
        1.0 / virus.sigma(),
        virus.gamma(),
        1.0 / virus.gamma()
    );
    match virus.doubling_time() {
        Some(days) => log::info!("doubling every ~{days:.1} days"),
        None => log::info!("r0 of 1: no initial growth"),
    }

    let trajectory = SeirModel::simulate(&simulation)?;
    let observables = observables::project(&trajectory, &virus, &config.lags);
    if !observables.deaths.iter().any(|&d| d > 0.0) {
        return Err(SeirError::Alignment(format!(
            "model projects no deaths within {} days",
            config.horizon
        )));
    }
    let offset =
        alignment::resolve_offset(&reported.deaths, &observables.deaths, &config.alignment)?;
    let first_date = reported
        .first_date()
        .ok_or_else(|| SeirError::Alignment("reported series has no dates".into()))?;
    let dates = alignment::model_dates(first_date, trajectory.len(), offset)?;

    Ok(ModelRun {
        virus,
        trajectory,
        observables,
        offset,
        dates,
    })
}
