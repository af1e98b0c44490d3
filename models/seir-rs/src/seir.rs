use nalgebra::Vector4;
use serde::Serialize;

use crate::{
    error::SeirError,
    ode::DormandPrince,
    parameters::VirusParameters,
    schedule::{InterventionSchedule, next_r0},
};

/// Negative compartment values down to this fraction of the population are
/// solver noise and get clamped to zero; anything lower aborts the run.
const NEGATIVE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationState {
    pub susceptible: f64,
    pub exposed: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl SimulationState {
    pub fn total(&self) -> f64 {
        self.susceptible + self.exposed + self.infected + self.recovered
    }
}

impl From<&Vector4<f64>> for SimulationState {
    fn from(y: &Vector4<f64>) -> Self {
        Self {
            susceptible: y[0],
            exposed: y[1],
            infected: y[2],
            recovered: y[3],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub population: f64,
    /// Seeded into the exposed compartment on day 0.
    pub initial_infected: f64,
    pub virus: VirusParameters,
    pub schedule: InterventionSchedule,
    pub horizon: usize,
}

impl SimulationConfig {
    pub fn new(
        population: f64,
        initial_infected: f64,
        virus: VirusParameters,
        schedule: InterventionSchedule,
        horizon: usize,
    ) -> Result<Self, SeirError> {
        if !population.is_finite() || population <= 0.0 {
            return Err(SeirError::config(format!(
                "population must be positive, got {population}"
            )));
        }
        if !(0.0..=population).contains(&initial_infected) {
            return Err(SeirError::config(format!(
                "initial_infected ({initial_infected}) must lie within [0, {population}]"
            )));
        }
        if horizon == 0 {
            return Err(SeirError::config("horizon must be at least one day"));
        }
        schedule.validate()?;
        Ok(Self {
            population,
            initial_infected,
            virus,
            schedule,
            horizon,
        })
    }
}

/// Daily model state plus the reproduction number in effect over each day.
#[derive(Debug, Clone)]
pub struct Trajectory {
    states: Vec<SimulationState>,
    r0: Vec<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[SimulationState] {
        &self.states
    }

    pub fn r0(&self) -> &[f64] {
        &self.r0
    }

    pub fn susceptible(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.susceptible).collect()
    }

    pub fn exposed(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.exposed).collect()
    }

    pub fn infected(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.infected).collect()
    }

    pub fn recovered(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.recovered).collect()
    }
}

/// Right-hand side of the SEIR system.
pub fn derivative(
    y: &Vector4<f64>,
    beta: f64,
    sigma: f64,
    gamma: f64,
    population: f64,
) -> Vector4<f64> {
    let (s, e, i) = (y[0], y[1], y[2]);
    let infections = beta * s * i / population;
    Vector4::new(
        -infections,
        infections - sigma * e,
        sigma * e - gamma * i,
        gamma * i,
    )
}

pub struct SeirModel {}

impl SeirModel {
    /// Integrates the model one day at a time. Before each day the
    /// intervention schedule picks that day's reproduction number, which then
    /// stays fixed until the next day boundary.
    pub fn simulate(config: &SimulationConfig) -> Result<Trajectory, SeirError> {
        let population = config.population;
        let mut virus = config.virus;
        let mut solver = DormandPrince::default();
        let mut y = Vector4::new(
            population - config.initial_infected,
            config.initial_infected,
            0.0,
            0.0,
        );
        let floor = -NEGATIVE_TOLERANCE * population;

        let mut states = Vec::with_capacity(config.horizon);
        let mut r0 = Vec::with_capacity(config.horizon);
        for day in 0..config.horizon {
            states.push(SimulationState::from(&y));
            virus = virus.with_r0(next_r0(day, virus.r0(), &config.schedule))?;
            r0.push(virus.r0());
            if day + 1 == config.horizon {
                break;
            }

            let (beta, sigma, gamma) = (virus.beta(), virus.sigma(), virus.gamma());
            solver
                .integrate(&mut y, day as f64, (day + 1) as f64, |_, y| {
                    derivative(y, beta, sigma, gamma, population)
                })
                .map_err(|err| SeirError::integration(day, err.to_string()))?;

            for value in y.iter_mut() {
                if *value < floor {
                    return Err(SeirError::integration(
                        day,
                        format!("compartment fell to {value}"),
                    ));
                }
                if *value < 0.0 {
                    log::debug!("day {}: clamping {value:e} to zero", day + 1);
                    *value = 0.0;
                }
            }
        }

        Ok(Trajectory { states, r0 })
    }
}
