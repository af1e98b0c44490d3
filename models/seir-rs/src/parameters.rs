use serde::{Deserialize, Serialize};

use crate::{
    alignment::AlignmentConfig, data::RegionConfig, error::SeirError,
    schedule::InterventionSchedule, seir::SimulationConfig,
};

/// Empirical inputs describing the virus. Everything else in
/// [`VirusParameters`] is derived from these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirusInputs {
    /// Infection fatality rate, as a probability.
    pub fatality_rate: f64,
    /// Mean serial interval in days.
    pub generation_time: f64,
    /// Days from infection to symptom onset.
    pub incubation_period: f64,
    /// Fraction of infections that never show symptoms.
    pub asymptomatic_fraction: f64,
    /// Basic reproduction number at the start of the outbreak.
    pub r0: f64,
    /// Days before symptom onset during which a case is already infectious.
    pub time_presymptomatic: f64,
    /// One in this many symptomatic infections is confirmed by a test.
    pub detection_divisor: f64,
}

impl Default for VirusInputs {
    fn default() -> Self {
        Self {
            fatality_rate: 0.0036,
            generation_time: 4.18,
            incubation_period: 5.2,
            asymptomatic_fraction: 0.35,
            r0: 2.2,
            time_presymptomatic: 2.5,
            detection_divisor: 10.0,
        }
    }
}

/// Virus rate constants, always consistent with their [`VirusInputs`].
///
/// The value is immutable. The `with_*` methods derive a new instance with
/// one input replaced and every dependent rate recomputed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirusParameters {
    inputs: VirusInputs,
    sigma: f64,
    gamma: f64,
    beta: f64,
    detection_ratio: f64,
    eigen_rate: f64,
}

impl VirusParameters {
    pub fn new(inputs: VirusInputs) -> Result<Self, SeirError> {
        check_probability("fatality_rate", inputs.fatality_rate)?;
        check_probability("asymptomatic_fraction", inputs.asymptomatic_fraction)?;
        if inputs.asymptomatic_fraction >= 1.0 {
            return Err(SeirError::config(
                "asymptomatic_fraction must be below 1, otherwise no case is ever detected",
            ));
        }
        check_positive("generation_time", inputs.generation_time)?;
        check_positive("incubation_period", inputs.incubation_period)?;
        check_positive("r0", inputs.r0)?;
        check_positive("detection_divisor", inputs.detection_divisor)?;
        if !inputs.time_presymptomatic.is_finite() || inputs.time_presymptomatic < 0.0 {
            return Err(SeirError::config(format!(
                "time_presymptomatic must be a non-negative number, got {}",
                inputs.time_presymptomatic
            )));
        }
        if inputs.incubation_period <= inputs.time_presymptomatic {
            return Err(SeirError::config(format!(
                "incubation_period ({}) must exceed time_presymptomatic ({})",
                inputs.incubation_period, inputs.time_presymptomatic
            )));
        }

        let sigma = 1.0 / (inputs.incubation_period - inputs.time_presymptomatic);
        let infectious_half = inputs.generation_time - 1.0 / sigma;
        if infectious_half <= 0.0 {
            return Err(SeirError::config(format!(
                "generation_time ({}) must exceed the latent period ({})",
                inputs.generation_time,
                1.0 / sigma
            )));
        }
        let gamma = 1.0 / (2.0 * infectious_half);
        let beta = inputs.r0 * gamma;
        let detection_ratio = (1.0 - inputs.asymptomatic_fraction) / inputs.detection_divisor;
        let rate_sum = sigma + gamma;
        let eigen_rate = 0.5
            * (-rate_sum
                + (rate_sum * rate_sum + 4.0 * sigma * gamma * (inputs.r0 - 1.0)).sqrt());

        let params = Self {
            inputs,
            sigma,
            gamma,
            beta,
            detection_ratio,
            eigen_rate,
        };
        if [sigma, gamma, beta, detection_ratio, eigen_rate]
            .iter()
            .any(|v| !v.is_finite())
        {
            return Err(SeirError::config(format!(
                "derived virus rates are not finite: {params:?}"
            )));
        }
        Ok(params)
    }

    pub fn inputs(&self) -> &VirusInputs {
        &self.inputs
    }

    pub fn fatality_rate(&self) -> f64 {
        self.inputs.fatality_rate
    }

    pub fn generation_time(&self) -> f64 {
        self.inputs.generation_time
    }

    pub fn incubation_period(&self) -> f64 {
        self.inputs.incubation_period
    }

    pub fn asymptomatic_fraction(&self) -> f64 {
        self.inputs.asymptomatic_fraction
    }

    pub fn r0(&self) -> f64 {
        self.inputs.r0
    }

    pub fn time_presymptomatic(&self) -> f64 {
        self.inputs.time_presymptomatic
    }

    pub fn detection_divisor(&self) -> f64 {
        self.inputs.detection_divisor
    }

    /// Rate of progression from exposed to infectious (1/day).
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Rate of removal from the infectious compartment (1/day).
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Transmission rate, `r0 * gamma`.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn detection_ratio(&self) -> f64 {
        self.detection_ratio
    }

    /// Dominant eigenvalue of the linearised SEIR system (1/day).
    pub fn eigen_rate(&self) -> f64 {
        self.eigen_rate
    }

    /// Days for the infected count to double in the early exponential phase.
    /// Negative values are halving times. `None` when r0 is exactly 1.
    pub fn doubling_time(&self) -> Option<f64> {
        (self.eigen_rate != 0.0).then(|| std::f64::consts::LN_2 / self.eigen_rate)
    }

    pub fn with_r0(&self, r0: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs { r0, ..self.inputs })
    }

    pub fn with_fatality_rate(&self, fatality_rate: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            fatality_rate,
            ..self.inputs
        })
    }

    pub fn with_generation_time(&self, generation_time: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            generation_time,
            ..self.inputs
        })
    }

    pub fn with_incubation_period(&self, incubation_period: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            incubation_period,
            ..self.inputs
        })
    }

    pub fn with_asymptomatic_fraction(&self, asymptomatic_fraction: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            asymptomatic_fraction,
            ..self.inputs
        })
    }

    pub fn with_time_presymptomatic(&self, time_presymptomatic: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            time_presymptomatic,
            ..self.inputs
        })
    }

    pub fn with_detection_divisor(&self, detection_divisor: f64) -> Result<Self, SeirError> {
        Self::new(VirusInputs {
            detection_divisor,
            ..self.inputs
        })
    }
}

impl TryFrom<VirusInputs> for VirusParameters {
    type Error = SeirError;

    fn try_from(inputs: VirusInputs) -> Result<Self, Self::Error> {
        Self::new(inputs)
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), SeirError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SeirError::config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), SeirError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SeirError::config(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

/// Reporting delays, in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lags {
    pub symptom_to_hospital: f64,
    pub test: f64,
    pub time_in_hospital: f64,
    pub communication: f64,
}

impl Default for Lags {
    fn default() -> Self {
        Self {
            symptom_to_hospital: 5.0,
            test: 3.0,
            time_in_hospital: 12.0,
            communication: 2.0,
        }
    }
}

impl Lags {
    pub fn validate(&self) -> Result<(), SeirError> {
        for (name, value) in [
            ("symptom_to_hospital", self.symptom_to_hospital),
            ("test", self.test),
            ("time_in_hospital", self.time_in_hospital),
            ("communication", self.communication),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SeirError::config(format!(
                    "lag {name} must be a non-negative number of days, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// The `input` table of a run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub region: RegionConfig,
    /// Overrides the population lookup when set.
    pub population: Option<u64>,
    pub initial_infected: f64,
    /// Number of simulated days.
    pub horizon: usize,
    pub virus: VirusInputs,
    pub schedule: InterventionSchedule,
    pub lags: Lags,
    pub alignment: AlignmentConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            population: None,
            initial_infected: 1.0,
            horizon: 365,
            virus: VirusInputs::default(),
            schedule: InterventionSchedule::default(),
            lags: Lags::default(),
            alignment: AlignmentConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn simulation(&self, population: f64) -> Result<SimulationConfig, SeirError> {
        self.lags.validate()?;
        SimulationConfig::new(
            population,
            self.initial_infected,
            VirusParameters::new(self.virus)?,
            self.schedule,
            self.horizon,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn defaults() -> VirusParameters {
        VirusParameters::new(VirusInputs::default()).unwrap()
    }

    #[test]
    fn test_default_rates() {
        let virus = defaults();
        assert!((virus.sigma() - 1.0 / 2.7).abs() < 1e-12);
        assert!((virus.gamma() - 1.0 / 2.96).abs() < 1e-12);
        assert!((virus.detection_ratio() - 0.065).abs() < 1e-12);
        let doubling = virus.doubling_time().unwrap();
        assert!((doubling - 4.058).abs() < 0.01, "doubling time {doubling}");
    }

    #[test]
    fn test_beta_follows_r0() {
        let virus = defaults();
        for r0 in [0.5, 1.0, 1.3, 2.5, 6.0] {
            let next = virus.with_r0(r0).unwrap();
            assert_eq!(next.r0(), r0);
            assert!((next.beta() - r0 * next.gamma()).abs() < 1e-12);
            assert_eq!(next.gamma(), virus.gamma());
        }
    }

    #[test]
    fn test_beta_consistent_after_every_input_change() {
        let virus = defaults();
        let derived = [
            virus.with_generation_time(5.0).unwrap(),
            virus.with_incubation_period(6.1).unwrap(),
            virus.with_time_presymptomatic(2.0).unwrap(),
            virus.with_asymptomatic_fraction(0.5).unwrap(),
            virus.with_detection_divisor(30.0).unwrap(),
            virus.with_fatality_rate(0.01).unwrap(),
        ];
        for next in derived {
            let sigma = 1.0 / (next.incubation_period() - next.time_presymptomatic());
            let gamma = 1.0 / (2.0 * (next.generation_time() - 1.0 / sigma));
            assert!((next.sigma() - sigma).abs() < 1e-12);
            assert!((next.gamma() - gamma).abs() < 1e-12);
            assert!((next.beta() - next.r0() * gamma).abs() < 1e-12);
            assert!(
                (next.detection_ratio()
                    - (1.0 - next.asymptomatic_fraction()) / next.detection_divisor())
                .abs()
                    < 1e-12
            );
        }
    }

    #[test]
    fn test_presymptomatic_change_cascades_to_beta() {
        let virus = defaults();
        let next = virus.with_time_presymptomatic(1.5).unwrap();
        assert!((next.sigma() - 1.0 / 3.7).abs() < 1e-12);
        assert!(next.gamma() != virus.gamma());
        assert!((next.beta() - 2.2 * next.gamma()).abs() < 1e-12);
    }

    #[test]
    fn test_r0_of_one_has_no_doubling_time() {
        let virus = defaults().with_r0(1.0).unwrap();
        assert_eq!(virus.eigen_rate(), 0.0);
        assert_eq!(virus.doubling_time(), None);
        let shrinking = defaults().with_r0(0.8).unwrap();
        assert!(shrinking.doubling_time().unwrap() < 0.0);
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        let virus = defaults();
        assert!(matches!(
            virus.with_incubation_period(2.5),
            Err(SeirError::Configuration(_))
        ));
        assert!(virus.with_time_presymptomatic(6.0).is_err());
        assert!(virus.with_generation_time(2.0).is_err());
        assert!(virus.with_r0(0.0).is_err());
        assert!(virus.with_r0(f64::NAN).is_err());
        assert!(virus.with_detection_divisor(0.0).is_err());
        assert!(virus.with_fatality_rate(1.5).is_err());
        assert!(virus.with_asymptomatic_fraction(1.0).is_err());
        assert!(virus.with_time_presymptomatic(-1.0).is_err());
    }

    #[test]
    fn test_invalid_lags_rejected() {
        assert!(Lags::default().validate().is_ok());
        for lags in [
            Lags {
                communication: f64::NAN,
                ..Lags::default()
            },
            Lags {
                time_in_hospital: f64::INFINITY,
                ..Lags::default()
            },
            Lags {
                test: -1.0,
                ..Lags::default()
            },
        ] {
            assert!(matches!(lags.validate(), Err(SeirError::Configuration(_))));
            let config = RunConfig {
                lags,
                ..RunConfig::default()
            };
            assert!(matches!(
                config.simulation(1000.0),
                Err(SeirError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_run_config_defaults_from_partial_json() {
        let config: RunConfig = serde_json::from_value(serde_json::json!({
            "horizon": 200,
            "virus": { "r0": 2.5 },
            "schedule": { "intervention_start": 10 }
        }))
        .unwrap();
        assert_eq!(config.horizon, 200);
        assert_eq!(config.virus.r0, 2.5);
        assert_eq!(config.virus.generation_time, 4.18);
        assert_eq!(config.schedule.intervention_start, 10);
        assert_eq!(config.schedule.intervention_end, 149);
        assert_eq!(config.lags, Lags::default());
        assert_eq!(config.alignment.offset, None);
        assert_eq!(config.alignment.search_window, 150);
    }

    #[test]
    fn test_default_run_document_parses() {
        let env = seir_runner::Environment::from_toml_str(include_str!("../params/default.toml"))
            .unwrap()
            .with_input_type::<RunConfig>()
            .unwrap();
        let config = env.input.unwrap();
        assert_eq!(config.virus.r0, 2.5);
        assert_eq!(config.virus.detection_divisor, 30.0);
        assert_eq!(config.region.kind, crate::data::RegionKind::Nation);
        assert_eq!(config.schedule, InterventionSchedule::default());
        assert!(VirusParameters::new(config.virus).is_ok());
        assert!(config.simulation(1000.0).is_ok());
    }
}
