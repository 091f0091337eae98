//! Observables over session-record trajectories.

use crate::config::Config;
use crate::session::SessionRecord;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

pub trait Obs {
    fn update(&mut self, record: &SessionRecord) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Fraction of choice rounds resolved to the null (skip) option.
#[derive(Default)]
pub struct NullChoiceRate {
    acc: Accumulator,
}

impl Obs for NullChoiceRate {
    fn update(&mut self, record: &SessionRecord) -> Result<()> {
        if record.session_choice_count == 0 {
            return Ok(());
        }
        self.acc
            .add(record.null_choice_count as f64 / record.session_choice_count as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "null_choice_rate": self.acc.report() })
    }
}

/// Choice rounds per session.
#[derive(Default)]
pub struct ChoicesPerSession {
    acc: Accumulator,
}

impl Obs for ChoicesPerSession {
    fn update(&mut self, record: &SessionRecord) -> Result<()> {
        self.acc.add(record.session_choice_count as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "choices_per_session": self.acc.report() })
    }
}

/// Time spent per session.
#[derive(Default)]
pub struct TimeSpent {
    acc: Accumulator,
}

impl Obs for TimeSpent {
    fn update(&mut self, record: &SessionRecord) -> Result<()> {
        self.acc.add(record.time_spent);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "time_spent": self.acc.report() })
    }
}

/// Mean absolute interest, tracked in session order: drifting users
/// polarize toward the interest extremes.
#[derive(Default)]
pub struct Polarization {
    time_series: TimeSeries,
}

impl Obs for Polarization {
    fn update(&mut self, record: &SessionRecord) -> Result<()> {
        if record.final_interests.is_empty() {
            return Ok(());
        }
        let mean_abs = record
            .final_interests
            .iter()
            .map(|interest| interest.abs())
            .sum::<f64>()
            / record.final_interests.len() as f64;
        self.time_series.push(mean_abs);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "polarization": self.time_series.report() })
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(NullChoiceRate::default()),
            Box::new(ChoicesPerSession::default()),
            Box::new(TimeSpent::default()),
            Box::new(Polarization::default()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    /// Fold one trajectory file (one record per session) into the
    /// observables.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let records_per_file = self.cfg.output.sessions_per_user * self.cfg.user.n_users;
        for _ in 0..records_per_file {
            let record: SessionRecord =
                decode::from_read(&mut reader).context("failed to read session record")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&record).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(choices: usize, nulls: usize, interests: Vec<f64>) -> SessionRecord {
        SessionRecord {
            user_id: 0,
            session_choice_count: choices,
            null_choice_count: nulls,
            time_spent: choices as f64 * 10.0,
            final_interests: interests,
        }
    }

    #[test]
    fn null_choice_rate_averages_per_session_fractions() {
        let mut obs = NullChoiceRate::default();
        obs.update(&record(10, 5, vec![0.0])).unwrap();
        obs.update(&record(10, 0, vec![0.0])).unwrap();

        let report = obs.report();
        let mean = report["null_choice_rate"]["mean"].as_f64().unwrap();
        assert!((mean - 0.25).abs() < 1e-12);
    }

    #[test]
    fn polarization_tracks_mean_absolute_interest() {
        let mut obs = Polarization::default();
        for _ in 0..8 {
            obs.update(&record(1, 0, vec![0.5, -0.5])).unwrap();
        }
        let report = obs.report();
        let mean = report["polarization"]["mean"].as_f64().unwrap();
        assert!((mean - 0.5).abs() < 1e-12);
    }
}
