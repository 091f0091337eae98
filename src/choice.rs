//! User choice models: turn slate interest scores into a propensity
//! distribution over the slate plus the null option and sample one outcome.

use crate::corpus::Document;
use crate::user::UserAgent;
use anyhow::{Context, Result};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, weighted::WeightedIndex};
use serde::{Deserialize, Serialize};

/// Outcome of a choice round: a slate position, or `None` for the null
/// (skip) option.
pub type Choice = Option<usize>;

pub trait ChoiceModel {
    /// Compute propensities over the slate plus the null option and sample
    /// one outcome.
    ///
    /// The returned vector has `slate.len() + 1` entries summing to 1; the
    /// last entry is the null option. An empty slate is valid and
    /// degenerates to the null option with propensity 1.
    fn choose(
        &self,
        user: &UserAgent,
        slate: &[&Document],
        rng: &mut ChaCha12Rng,
    ) -> Result<(Vec<f64>, Choice)>;
}

/// Choice model variant, selected by configuration.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceModelKind {
    Softmax,
    Linear,
}

impl ChoiceModelKind {
    pub fn build(self) -> Box<dyn ChoiceModel> {
        match self {
            Self::Softmax => Box::new(SoftmaxChoice),
            Self::Linear => Box::new(LinearChoice),
        }
    }
}

fn interest_scores(user: &UserAgent, slate: &[&Document]) -> Vec<f64> {
    let mut scores: Vec<f64> = slate
        .iter()
        .map(|document| user.inspect_document(document))
        .collect();
    scores.push(user.null_interest());
    scores
}

fn sample_choice(
    propensities: &[f64],
    slate_len: usize,
    rng: &mut ChaCha12Rng,
) -> Result<Choice> {
    let index = WeightedIndex::new(propensities)
        .context("failed to build choice distribution")?
        .sample(rng);
    Ok(if index == slate_len { None } else { Some(index) })
}

/// Multinomial logit: propensities are the softmax of the interest scores.
/// Well defined for any score sign, and every option (the null one
/// included) keeps a nonzero propensity.
pub struct SoftmaxChoice;

impl ChoiceModel for SoftmaxChoice {
    fn choose(
        &self,
        user: &UserAgent,
        slate: &[&Document],
        rng: &mut ChaCha12Rng,
    ) -> Result<(Vec<f64>, Choice)> {
        let scores = interest_scores(user, slate);

        // Max-shift for numerical stability.
        let max = scores.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mut propensities: Vec<f64> = scores.iter().map(|score| (score - max).exp()).collect();
        let sum: f64 = propensities.iter().sum();
        propensities.iter_mut().for_each(|p| *p /= sum);

        let choice = sample_choice(&propensities, slate.len(), rng)?;
        Ok((propensities, choice))
    }
}

/// Raw-score normalization: scores are shifted to non-negative when any is
/// negative and divided by their sum. The strict-minimum option ends up
/// with propensity 0; a zero-mass score vector degenerates to the uniform
/// distribution.
pub struct LinearChoice;

impl ChoiceModel for LinearChoice {
    fn choose(
        &self,
        user: &UserAgent,
        slate: &[&Document],
        rng: &mut ChaCha12Rng,
    ) -> Result<(Vec<f64>, Choice)> {
        let mut scores = interest_scores(user, slate);

        let min = scores.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        if min < 0.0 {
            scores.iter_mut().for_each(|score| *score -= min);
        }

        let sum: f64 = scores.iter().sum();
        let propensities: Vec<f64> = if sum > 0.0 {
            scores.iter().map(|score| score / sum).collect()
        } else {
            vec![1.0 / scores.len() as f64; scores.len()]
        };

        let choice = sample_choice(&propensities, slate.len(), rng)?;
        Ok((propensities, choice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn slate_docs() -> Vec<Document> {
        (0..3)
            .map(|index| Document::new(index, index, 3, 1.0, 10.0))
            .collect()
    }

    fn models() -> Vec<Box<dyn ChoiceModel>> {
        vec![
            ChoiceModelKind::Softmax.build(),
            ChoiceModelKind::Linear.build(),
        ]
    }

    #[test]
    fn propensities_cover_slate_and_null_and_sum_to_one() {
        let mut rng = ChaCha12Rng::seed_from_u64(31);
        let user = UserAgent::with_interests(0, vec![0.5, -0.2, 0.8], 0.5);
        let docs = slate_docs();
        let slate: Vec<&Document> = docs.iter().collect();

        for model in models() {
            let (propensities, choice) = model.choose(&user, &slate, &mut rng).unwrap();
            assert_eq!(propensities.len(), 4);
            let sum: f64 = propensities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            if let Some(position) = choice {
                assert!(position < 3);
            }
        }
    }

    #[test]
    fn null_propensity_stays_below_the_best_item() {
        let mut rng = ChaCha12Rng::seed_from_u64(32);
        // Interest scores [0.5, -0.2, 0.8]; the null score (-0.3) is lowest.
        let user = UserAgent::with_interests(0, vec![0.5, -0.2, 0.8], 0.5);
        let docs = slate_docs();
        let slate: Vec<&Document> = docs.iter().collect();

        for model in models() {
            let (propensities, _) = model.choose(&user, &slate, &mut rng).unwrap();
            assert!(propensities[3] < propensities[2]);
        }
    }

    #[test]
    fn softmax_keeps_every_option_reachable() {
        let mut rng = ChaCha12Rng::seed_from_u64(33);
        let user = UserAgent::with_interests(0, vec![0.5, -0.2, 0.8], 0.5);
        let docs = slate_docs();
        let slate: Vec<&Document> = docs.iter().collect();

        let (propensities, _) = SoftmaxChoice.choose(&user, &slate, &mut rng).unwrap();
        assert!(propensities.iter().all(|&p| p > 0.0));
    }

    #[test]
    fn all_negative_scores_still_normalize() {
        let mut rng = ChaCha12Rng::seed_from_u64(34);
        let user = UserAgent::with_interests(0, vec![-0.9, -0.8, -0.7], 0.5);
        let docs = slate_docs();
        let slate: Vec<&Document> = docs.iter().collect();

        for model in models() {
            let (propensities, _) = model.choose(&user, &slate, &mut rng).unwrap();
            let sum: f64 = propensities.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(propensities.iter().all(|p| p.is_finite() && *p >= 0.0));
        }
    }

    #[test]
    fn empty_slate_degenerates_to_the_null_option() {
        let mut rng = ChaCha12Rng::seed_from_u64(35);
        let user = UserAgent::with_interests(0, vec![0.1, 0.2], 0.5);

        for model in models() {
            let (propensities, choice) = model.choose(&user, &[], &mut rng).unwrap();
            assert_eq!(propensities, vec![1.0]);
            assert_eq!(choice, None);
        }
    }
}
