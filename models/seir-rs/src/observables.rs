use serde::Serialize;

use crate::{
    parameters::{Lags, VirusParameters},
    seir::Trajectory,
    shift::shift,
};

/// Model outputs comparable to public health reporting, one entry per
/// model day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableSeries {
    /// Cumulative confirmed cases.
    pub reported_cases: Vec<f64>,
    /// Deaths as reported, cumulative over the removed compartment.
    pub deaths: Vec<f64>,
}

pub fn project(trajectory: &Trajectory, virus: &VirusParameters, lags: &Lags) -> ObservableSeries {
    ObservableSeries {
        reported_cases: project_reported_cases(&trajectory.infected(), virus, lags),
        deaths: project_deaths(&trajectory.recovered(), virus, lags),
    }
}

/// Deaths accumulate with removals, scaled by the fatality rate. "Recovered"
/// here means having left the infectious compartment, alive or dead.
pub fn cumulative_deaths(recovered: &[f64], fatality_rate: f64) -> Vec<f64> {
    let mut deaths = Vec::with_capacity(recovered.len());
    let mut previous_recovered = 0.0;
    let mut previous_deaths = 0.0;
    for &r in recovered {
        let d = previous_deaths + fatality_rate * (r - previous_recovered);
        deaths.push(d);
        previous_recovered = r;
        previous_deaths = d;
    }
    deaths
}

/// Days by which the death series is moved right, relative to removal.
pub fn death_shift(virus: &VirusParameters, lags: &Lags) -> f64 {
    1.0 / virus.gamma()
        - virus.time_presymptomatic()
        - lags.symptom_to_hospital
        - lags.time_in_hospital
        - lags.communication
}

/// Days from infectiousness to a confirmed case being announced.
pub fn case_shift(virus: &VirusParameters, lags: &Lags) -> f64 {
    virus.time_presymptomatic() + lags.symptom_to_hospital + lags.test + lags.communication
}

pub fn project_deaths(recovered: &[f64], virus: &VirusParameters, lags: &Lags) -> Vec<f64> {
    shift(
        &cumulative_deaths(recovered, virus.fatality_rate()),
        death_shift(virus, lags),
    )
}

/// Cumulative confirmed cases. Interpolation undershoot is clamped to zero
/// before summing so the result never decreases.
pub fn project_reported_cases(infected: &[f64], virus: &VirusParameters, lags: &Lags) -> Vec<f64> {
    let found: Vec<f64> = infected
        .iter()
        .map(|i| i * virus.detection_ratio())
        .collect();
    shift(&found, case_shift(virus, lags))
        .into_iter()
        .scan(0.0, |total, daily| {
            *total += daily.max(0.0);
            Some(*total)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        parameters::VirusInputs,
        schedule::InterventionSchedule,
        seir::{SeirModel, SimulationConfig},
    };

    fn virus() -> VirusParameters {
        VirusParameters::new(VirusInputs {
            fatality_rate: 0.01,
            ..VirusInputs::default()
        })
        .unwrap()
    }

    #[test]
    fn test_cumulative_deaths() {
        let deaths = cumulative_deaths(&[0.0, 0.0, 10.0, 10.0, 30.0], 0.01);
        let expected = [0.0, 0.0, 0.1, 0.1, 0.3];
        for (d, e) in deaths.iter().zip(expected) {
            assert!((d - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_shift_amounts() {
        let virus = virus();
        let lags = Lags::default();
        // 1/gamma = 2.96 with the default virus inputs
        assert!((death_shift(&virus, &lags) - (2.96 - 2.5 - 5.0 - 12.0 - 2.0)).abs() < 1e-9);
        assert!((case_shift(&virus, &lags) - (2.5 + 5.0 + 3.0 + 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_whole_day_lags_shift_exactly() {
        // With these inputs 1/gamma is 3.0, so both shifts are whole days.
        let virus = VirusParameters::new(VirusInputs {
            fatality_rate: 0.01,
            generation_time: 3.5,
            incubation_period: 4.0,
            time_presymptomatic: 2.0,
            asymptomatic_fraction: 0.5,
            detection_divisor: 5.0,
            ..VirusInputs::default()
        })
        .unwrap();
        let lags = Lags {
            symptom_to_hospital: 1.0,
            test: 1.0,
            time_in_hospital: 1.0,
            communication: 0.0,
        };
        assert!((1.0 / virus.gamma() - 3.0).abs() < 1e-12);
        // 3 - 2 - 1 - 1 - 0 = -1: deaths move one day left
        let deaths = project_deaths(&[0.0, 0.0, 10.0, 10.0, 30.0], &virus, &lags);
        let expected = [0.0, 0.1, 0.1, 0.3, 0.0];
        for (d, e) in deaths.iter().zip(expected) {
            assert!((d - e).abs() < 1e-12, "{deaths:?}");
        }
        // 2 + 1 + 1 + 0 = 4 days right, detection ratio 0.1
        let cases = project_reported_cases(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0], &virus, &lags);
        let expected = [0.0, 0.0, 0.0, 0.0, 1.0, 3.0];
        for (c, e) in cases.iter().zip(expected) {
            assert!((c - e).abs() < 1e-12, "{cases:?}");
        }
    }

    #[test]
    fn test_projection_of_simulation() {
        let virus = VirusParameters::new(VirusInputs {
            r0: 2.5,
            ..VirusInputs::default()
        })
        .unwrap();
        let config = SimulationConfig::new(
            1_000_000.0,
            1.0,
            virus,
            InterventionSchedule::default(),
            365,
        )
        .unwrap();
        let trajectory = SeirModel::simulate(&config).unwrap();
        let observables = project(&trajectory, &virus, &Lags::default());

        assert_eq!(observables.reported_cases.len(), trajectory.len());
        assert_eq!(observables.deaths.len(), trajectory.len());
        for pair in observables.reported_cases.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        // Cases lag infections, so the first days see nothing reported.
        assert!(observables.reported_cases[..12].iter().all(|&c| c == 0.0));
        let final_deaths = virus.fatality_rate() * trajectory.recovered()[364];
        let peak_deaths = observables.deaths.iter().cloned().fold(0.0, f64::max);
        assert!(peak_deaths <= final_deaths * 1.01);
        assert!(peak_deaths > 0.0);
    }
}
