pub mod alignment;
pub mod data;
pub mod error;
pub mod observables;
pub mod ode;
pub mod output;
pub mod parameters;
pub mod pipeline;
pub mod schedule;
pub mod seir;
pub mod shift;

pub use error::SeirError;
pub use parameters::{Lags, RunConfig, VirusInputs, VirusParameters};
pub use pipeline::{ModelRun, run_model};
pub use schedule::{InterventionSchedule, next_r0};
pub use seir::{SeirModel, SimulationConfig, SimulationState, Trajectory};
