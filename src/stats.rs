//! Streaming statistics over session records.

use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford's algorithm).
#[derive(Default)]
pub struct Accumulator {
    count: usize,
    mean: f64,
    sum_sq_diff: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn add(&mut self, val: f64) {
        self.count += 1;

        let diff_before = val - self.mean;
        self.mean += diff_before / self.count as f64;

        let diff_after = val - self.mean;
        self.sum_sq_diff += diff_before * diff_after;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.mean }
    }

    pub fn std_dev(&self) -> f64 {
        if self.count > 1 {
            (self.sum_sq_diff / (self.count - 1) as f64).sqrt()
        } else {
            f64::NAN
        }
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            count: self.count,
            mean: self.mean(),
            std_dev: self.std_dev(),
        }
    }
}

/// A time series of session-level values.
///
/// Long simulations need an equilibration cutoff and a correlation-aware
/// error estimate: the report discards the initial transient found by the
/// marginal standard error rule and estimates the SEM with the
/// Flyvbjerg-Petersen blocking method.
#[derive(Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let i_equil = optimal_equilibration_index(&self.vals);
        let equil_vals = &self.vals[i_equil..];
        TimeSeriesReport {
            mean: mean(equil_vals),
            std_dev: variance(equil_vals).sqrt(),
            sem: blocking_sem(equil_vals),
            is_equil: i_equil != self.vals.len() / 2,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn variance(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean via the Flyvbjerg-Petersen blocking method.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocked = vals.to_vec();
    let mut n_vals = blocked.len();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while n_vals >= 2 {
        let sem2_est = variance(&blocked) / n_vals as f64;
        let sem2_err = sem2_est * (2.0 / (n_vals as f64 - 1.0)).sqrt();
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_err);

        blocked = blocked
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
        n_vals = blocked.len();
    }

    for (idx, &sem2_est) in sem2_ests.iter().enumerate() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(sem2_errs[idx..].iter())
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);

        if sem2_est > max_low {
            return sem2_est.sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Equilibration cutoff via the marginal standard error rule.
fn optimal_equilibration_index(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    let mut opt_i_equil = n_vals / 2;
    if n_vals < 2 {
        return opt_i_equil;
    }

    let mut min_mse = f64::INFINITY;
    let n_idxs = n_vals.ilog2() + 1;
    let i_equils: Vec<_> = (0..n_idxs)
        .map(|idx| n_vals / 2_usize.pow(n_idxs - idx))
        .collect();

    for i_equil in i_equils {
        let tail = &vals[i_equil..];
        let n_tail = tail.len();

        let var = variance(tail);
        let mse = var * (n_tail - 1) as f64 / n_tail.pow(2) as f64;

        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_tracks_mean_and_std_dev() {
        let mut acc = Accumulator::default();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert_eq!(report.count, 8);
        assert!((report.mean - 5.0).abs() < 1e-12);
        // Sample variance of the classic example is 32/7.
        assert!((report.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_accumulator_reports_nan() {
        let report = Accumulator::default().report();
        assert!(report.mean.is_nan());
        assert!(report.std_dev.is_nan());
    }

    #[test]
    fn time_series_of_a_constant_has_zero_error() {
        let mut series = TimeSeries::default();
        for _ in 0..64 {
            series.push(3.0);
        }
        let report = series.report();
        assert!((report.mean - 3.0).abs() < 1e-12);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
    }
}
