//! Simulation configuration.

use crate::choice::ChoiceModelKind;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub user: UserConfig,
    pub session: SessionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Number of documents in the corpus.
    pub n_documents: usize,
    /// Number of topics a document can be about.
    pub n_topics: usize,
    /// Probability that a topic is skewed low/high quality (2 elements).
    pub prob_quality_direction: Vec<f64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Number of simulated users.
    pub n_users: usize,
    /// Weight of document quality vs interest match in satisfaction.
    pub fanatic_ratio: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Budget each session starts with.
    pub initial_budget: f64,
    /// Candidate shortlist size (m).
    pub n_candidates: usize,
    /// Slate size (k).
    pub slate_size: usize,
    /// Choice model variant.
    pub choice_model: ChoiceModelKind,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Sessions simulated per user in one run segment.
    pub sessions_per_user: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.corpus.n_documents, 1..10_000_000).context("invalid number of documents")?;
        check_num(self.corpus.n_topics, 1..10_000).context("invalid number of topics")?;
        check_vec(&self.corpus.prob_quality_direction, 2, true)
            .context("invalid quality direction probabilities")?;

        check_num(self.user.n_users, 1..1_000_000).context("invalid number of users")?;
        check_num(self.user.fanatic_ratio, 0.0..=1.0).context("invalid fanatic ratio")?;

        if !self.session.initial_budget.is_finite() || self.session.initial_budget <= 0.0 {
            bail!(
                "initial budget must be positive and finite, but is {}",
                self.session.initial_budget
            );
        }
        check_num(self.session.n_candidates, 1..=self.corpus.n_documents)
            .context("invalid candidate shortlist size")?;
        check_num(self.session.slate_size, 1..=self.session.n_candidates)
            .context("invalid slate size")?;

        check_num(self.output.sessions_per_user, 1..100_000)
            .context("invalid number of sessions per user")?;

        Ok(())
    }
}

pub(crate) fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

pub(crate) fn check_vec(vec: &[f64], exp_len: usize, prob_vec: bool) -> Result<()> {
    // Ensure vector has expected length.
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    if !prob_vec {
        return Ok(());
    }
    // For probability vectors: non-negative elements summing to ~1.0.
    if vec.iter().any(|&ele| ele < 0.0) {
        bail!("vector must have only non-negative elements");
    }
    let sum: f64 = vec.iter().sum();
    let tol = 1e-8;
    if (sum - 1.0).abs() > tol {
        bail!("vector must sum to 1.0 (tolerance: {tol}), but sums to {sum}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            corpus: CorpusConfig {
                n_documents: 100,
                n_topics: 10,
                prob_quality_direction: vec![0.7, 0.3],
            },
            user: UserConfig {
                n_users: 8,
                fanatic_ratio: 0.5,
            },
            session: SessionConfig {
                initial_budget: 200.0,
                n_candidates: 20,
                slate_size: 5,
                choice_model: ChoiceModelKind::Softmax,
            },
            output: OutputConfig {
                sessions_per_user: 4,
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn slate_size_cannot_exceed_the_shortlist() {
        let mut config = valid_config();
        config.session.slate_size = 21;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shortlist_cannot_exceed_the_corpus() {
        let mut config = valid_config();
        config.session.n_candidates = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_budget_is_rejected() {
        let mut config = valid_config();
        config.session.initial_budget = 0.0;
        assert!(config.validate().is_err());
        config.session.initial_budget = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_probability_vectors_are_rejected() {
        let mut config = valid_config();
        config.corpus.prob_quality_direction = vec![0.7, 0.4];
        assert!(config.validate().is_err());

        config.corpus.prob_quality_direction = vec![1.2, -0.2];
        assert!(config.validate().is_err());

        config.corpus.prob_quality_direction = vec![1.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_a_toml_document() {
        let toml_str = r#"
[corpus]
n_documents = 100
n_topics = 10
prob_quality_direction = [0.7, 0.3]

[user]
n_users = 8
fanatic_ratio = 0.5

[session]
initial_budget = 200.0
n_candidates = 20
slate_size = 5
choice_model = "softmax"

[output]
sessions_per_user = 4
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config, valid_config());
    }
}
