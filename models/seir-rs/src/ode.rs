//! Adaptive Dormand-Prince 5(4) integrator for small fixed-size ODE systems.
//!
//! The step controller always lands exactly on the requested end time, so a
//! caller can integrate day by day and change the right-hand side between
//! calls.

use nalgebra::SVector;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// Fifth-order weights; also the last stage row.
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between fifth- and fourth-order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OdeError {
    #[error("non-finite state at t = {t}")]
    NonFinite { t: f64 },

    #[error("step size underflow (h = {h:e}) at t = {t}")]
    StepUnderflow { t: f64, h: f64 },

    #[error("step budget of {max_steps} exhausted at t = {t}")]
    TooManySteps { t: f64, max_steps: usize },
}

#[derive(Debug, Clone)]
pub struct DormandPrince {
    pub tolerance: Tolerance,
    pub max_steps: usize,
    pub min_step: f64,
    /// Step size proposed by the controller for the next step.
    step: f64,
}

impl DormandPrince {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            max_steps: 100_000,
            min_step: 1e-12,
            step: 0.1,
        }
    }

    /// Advance `y` from `t0` to `t1` in place. On error `y` is left at the
    /// last accepted state.
    pub fn integrate<const D: usize, F>(
        &mut self,
        y: &mut SVector<f64, D>,
        t0: f64,
        t1: f64,
        f: F,
    ) -> Result<(), OdeError>
    where
        F: Fn(f64, &SVector<f64, D>) -> SVector<f64, D>,
    {
        let mut t = t0;
        let mut steps = 0;
        while t < t1 {
            if steps == self.max_steps {
                return Err(OdeError::TooManySteps {
                    t,
                    max_steps: self.max_steps,
                });
            }
            steps += 1;

            let remaining = t1 - t;
            let last = self.step >= remaining;
            let h = if last { remaining } else { self.step };
            if h < self.min_step && !last {
                return Err(OdeError::StepUnderflow { t, h });
            }

            let (y_new, err) = self.try_step(&f, t, y, h);
            if !y_new.iter().all(|v| v.is_finite()) {
                // Retry with a smaller step before giving up.
                self.step = h * MIN_FACTOR;
                if self.step < self.min_step {
                    return Err(OdeError::NonFinite { t });
                }
                continue;
            }

            let norm = self.error_norm(y, &y_new, &err);
            let factor = if norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };

            if norm <= 1.0 {
                *y = y_new;
                t = if last { t1 } else { t + h };
                self.step = h * factor;
            } else {
                self.step = h * factor.min(1.0);
                if self.step < self.min_step {
                    return Err(OdeError::StepUnderflow { t, h: self.step });
                }
            }
        }
        Ok(())
    }

    fn try_step<const D: usize, F>(
        &self,
        f: &F,
        t: f64,
        y: &SVector<f64, D>,
        h: f64,
    ) -> (SVector<f64, D>, SVector<f64, D>)
    where
        F: Fn(f64, &SVector<f64, D>) -> SVector<f64, D>,
    {
        let k1 = f(t, y);
        let k2 = f(t + C2 * h, &(y + k1 * (h * A21)));
        let k3 = f(t + C3 * h, &(y + (k1 * A31 + k2 * A32) * h));
        let k4 = f(t + C4 * h, &(y + (k1 * A41 + k2 * A42 + k3 * A43) * h));
        let k5 = f(
            t + C5 * h,
            &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * h),
        );
        let k6 = f(
            t + h,
            &(y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * h),
        );
        let y_new = y + (k1 * B1 + k3 * B3 + k4 * B4 + k5 * B5 + k6 * B6) * h;
        let k7 = f(t + h, &y_new);
        let err = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * h;
        (y_new, err)
    }

    fn error_norm<const D: usize>(
        &self,
        y: &SVector<f64, D>,
        y_new: &SVector<f64, D>,
        err: &SVector<f64, D>,
    ) -> f64 {
        let Tolerance { rtol, atol } = self.tolerance;
        let sum: f64 = (0..D)
            .map(|i| {
                let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
                (err[i] / scale).powi(2)
            })
            .sum();
        (sum / D as f64).sqrt()
    }
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self::new(Tolerance::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Vector1, Vector2};

    #[test]
    fn test_exponential_decay() {
        let mut solver = DormandPrince::new(Tolerance {
            rtol: 1e-10,
            atol: 1e-14,
        });
        let mut y = Vector1::new(1.0);
        for day in 0..10 {
            solver
                .integrate(&mut y, day as f64, (day + 1) as f64, |_, y| -y)
                .unwrap();
            let exact = (-((day + 1) as f64)).exp();
            assert!((y[0] - exact).abs() / exact < 1e-8, "day {day}: {}", y[0]);
        }
    }

    #[test]
    fn test_harmonic_oscillator_lands_on_end_time() {
        let mut solver = DormandPrince::default();
        let mut y = Vector2::new(1.0, 0.0);
        let end = 2.0 * std::f64::consts::PI;
        solver
            .integrate(&mut y, 0.0, end, |_, y| Vector2::new(y[1], -y[0]))
            .unwrap();
        assert!((y[0] - 1.0).abs() < 1e-8);
        assert!(y[1].abs() < 1e-8);
    }

    #[test]
    fn test_zero_length_interval_is_noop() {
        let mut solver = DormandPrince::default();
        let mut y = Vector1::new(3.0);
        solver.integrate(&mut y, 5.0, 5.0, |_, y| -y).unwrap();
        assert_eq!(y[0], 3.0);
    }

    #[test]
    fn test_step_budget() {
        let mut solver = DormandPrince::default();
        solver.max_steps = 3;
        let mut y = Vector1::new(1.0);
        let result = solver.integrate(&mut y, 0.0, 1000.0, |_, y| -y);
        assert!(matches!(result, Err(OdeError::TooManySteps { .. })));
    }

    #[test]
    fn test_finite_time_blow_up_fails() {
        // y' = y^2 with y(0) = 1 blows up at t = 1.
        let mut solver = DormandPrince::default();
        let mut y = Vector1::new(1.0);
        let result = solver.integrate(&mut y, 0.0, 2.0, |_, y| y.component_mul(y));
        assert!(result.is_err());
    }
}
