//! Delay of a daily series by a possibly fractional number of days.
//!
//! `shift(series, d)` returns `out[i] = series(i - d)`. Positive `d` delays
//! the series (moves it right). Samples shifted in from outside the window
//! are zero and samples shifted out are dropped. Whole-day shifts copy
//! samples exactly. Fractional shifts evaluate an interpolating cubic
//! B-spline; the spline coefficients use mirror-symmetric boundaries.

/// Pole of the cubic B-spline prefilter, `sqrt(3) - 2`.
const POLE: f64 = -0.267_949_192_431_122_7;

/// Shifts closer than this to a whole day are treated as whole.
const WHOLE_DAY_EPSILON: f64 = 1e-9;

pub fn shift(series: &[f64], days: f64) -> Vec<f64> {
    let n = series.len();
    if n == 0 || !days.is_finite() {
        return vec![0.0; n];
    }

    let rounded = days.round();
    if (days - rounded).abs() < WHOLE_DAY_EPSILON {
        return shift_whole(series, rounded as i64);
    }

    let coefficients = spline_coefficients(series);
    let last = (n - 1) as f64;
    (0..n)
        .map(|i| {
            let x = i as f64 - days;
            if x < 0.0 || x > last {
                0.0
            } else {
                evaluate(&coefficients, x)
            }
        })
        .collect()
}

fn shift_whole(series: &[f64], days: i64) -> Vec<f64> {
    let n = series.len() as i64;
    // Anything beyond the series length empties it
    let days = days.clamp(-n, n);
    (0..n)
        .map(|i| {
            let source = i - days;
            if (0..n).contains(&source) {
                series[source as usize]
            } else {
                0.0
            }
        })
        .collect()
}

/// Cubic B-spline coefficients interpolating `samples` (Unser's recursive
/// filter: one causal and one anti-causal pass).
fn spline_coefficients(samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    if n == 1 {
        return samples.to_vec();
    }

    let gain = (1.0 - POLE) * (1.0 - 1.0 / POLE);
    let mut c: Vec<f64> = samples.iter().map(|s| s * gain).collect();

    c[0] = causal_initial(&c);
    for k in 1..n {
        c[k] += POLE * c[k - 1];
    }
    c[n - 1] = (POLE / (POLE * POLE - 1.0)) * (c[n - 1] + POLE * c[n - 2]);
    for k in (0..n - 1).rev() {
        c[k] = POLE * (c[k + 1] - c[k]);
    }
    c
}

/// Initial value of the causal pass for a mirror-extended signal.
fn causal_initial(c: &[f64]) -> f64 {
    let n = c.len();
    let inverse = 1.0 / POLE;
    let mut zn = POLE;
    let mut z2n = POLE.powi((n - 1) as i32);
    let mut sum = c[0] + z2n * c[n - 1];
    z2n *= z2n * inverse;
    for &value in &c[1..n - 1] {
        sum += (zn + z2n) * value;
        zn *= POLE;
        z2n *= inverse;
    }
    sum / (1.0 - zn * zn)
}

fn evaluate(coefficients: &[f64], x: f64) -> f64 {
    let n = coefficients.len() as i64;
    let base = x.floor() as i64;
    (base - 1..=base + 2)
        .map(|j| coefficients[mirror(j, n)] * cubic_bspline(x - j as f64))
        .sum()
}

fn mirror(index: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut k = index.rem_euclid(period);
    if k >= n {
        k = period - k;
    }
    k as usize
}

fn cubic_bspline(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        2.0 / 3.0 - t * t + t * t * t / 2.0
    } else if t < 2.0 {
        (2.0 - t).powi(3) / 6.0
    } else {
        0.0
    }
}
