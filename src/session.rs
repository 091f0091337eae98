//! Per-user session loop: choice, consumption, interest drift, and budget
//! depletion.

use crate::choice::ChoiceModel;
use crate::corpus::{Corpus, Document};
use crate::user::UserAgent;
use anyhow::{Context, Result, bail};
use rand::seq::index;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};

/// Scale of the satisfaction-dependent budget bonus. The 0.9 cap keeps the
/// net depletion of every choice round strictly positive while satisfaction
/// stays within the default quality bounds (|S| <= 3.4).
const BUDGET_BONUS_SCALE: f64 = 0.9 / 3.4;

/// Hard cap on choice rounds in one session. Sampled qualities are
/// unbounded, so budget depletion is only almost-surely finite; exceeding
/// the cap means depletion stalled under a pathological configuration.
const MAX_SESSION_STEPS: usize = 10_000;

/// Fraction of a document consumed in one choice round.
///
/// Extension seam for a partial-consumption model (e.g. a truncated
/// gaussian over `[0, 1]`); only full consumption is wired in today.
pub trait PortionSampler {
    fn sample_portion(&self, rng: &mut ChaCha12Rng) -> f64;
}

pub struct FullConsumption;

impl PortionSampler for FullConsumption {
    fn sample_portion(&self, _rng: &mut ChaCha12Rng) -> f64 {
        1.0
    }
}

/// External-collaborator contract: narrow the corpus to `n_candidates`
/// items and return an ordered slate of at most `slate_size` document ids,
/// without duplicates.
pub trait SlatePolicy {
    fn build_slate(
        &mut self,
        corpus: &Corpus,
        user: &UserAgent,
        n_candidates: usize,
        slate_size: usize,
        rng: &mut ChaCha12Rng,
    ) -> Result<Vec<usize>>;
}

/// Stand-in policy: a uniform shortlist without replacement, truncated to
/// the slate size.
pub struct UniformSlatePolicy;

impl SlatePolicy for UniformSlatePolicy {
    fn build_slate(
        &mut self,
        corpus: &Corpus,
        _user: &UserAgent,
        n_candidates: usize,
        slate_size: usize,
        rng: &mut ChaCha12Rng,
    ) -> Result<Vec<usize>> {
        let shortlist = index::sample(rng, corpus.len(), n_candidates.min(corpus.len()));
        Ok(shortlist.iter().take(slate_size).collect())
    }
}

/// Session-end record exposed to the tabular logger.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: usize,
    pub session_choice_count: usize,
    pub null_choice_count: usize,
    pub time_spent: f64,
    pub final_interests: Vec<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionParams {
    pub initial_budget: f64,
    /// Candidate shortlist size (m).
    pub n_candidates: usize,
    /// Slate size (k).
    pub slate_size: usize,
}

/// Run one session: repeated choice rounds until the budget is exhausted.
///
/// Resets the user's transient state, then folds the session aggregates
/// into the lifetime history on termination.
pub fn run_session(
    user: &mut UserAgent,
    corpus: &Corpus,
    policy: &mut dyn SlatePolicy,
    choice_model: &dyn ChoiceModel,
    portions: &dyn PortionSampler,
    params: &SessionParams,
    rng: &mut ChaCha12Rng,
) -> Result<SessionRecord> {
    user.begin_session(params.initial_budget);

    let mut steps = 0;
    while user.current_budget() > 0.0 {
        if steps >= MAX_SESSION_STEPS {
            bail!(
                "session for user {} did not deplete its budget within {MAX_SESSION_STEPS} choice rounds",
                user.id()
            );
        }
        let slate_ids = policy
            .build_slate(corpus, user, params.n_candidates, params.slate_size, rng)
            .context("failed to build slate")?;
        consume_once(user, corpus, &slate_ids, choice_model, portions, rng)
            .context("failed to perform choice round")?;
        steps += 1;
    }

    user.end_session(params.initial_budget);

    Ok(SessionRecord {
        user_id: user.id(),
        session_choice_count: user.session_choice_count(),
        null_choice_count: user.session_null_choice_count(),
        time_spent: user.session_time_spent(),
        final_interests: user.interests().to_vec(),
    })
}

/// One choice round: choose from the slate (or skip), record the
/// consumption, drift the consumed topic's interest, and deplete the
/// budget.
pub fn consume_once(
    user: &mut UserAgent,
    corpus: &Corpus,
    slate_ids: &[usize],
    choice_model: &dyn ChoiceModel,
    portions: &dyn PortionSampler,
    rng: &mut ChaCha12Rng,
) -> Result<()> {
    let slate: Vec<&Document> = slate_ids
        .iter()
        .map(|&id| corpus.document(id))
        .collect::<Result<_>>()
        .context("slate references a document outside the corpus")?;

    let portion = portions.sample_portion(rng);

    let (_propensities, choice) = choice_model
        .choose(user, &slate, rng)
        .context("failed to sample user choice")?;
    let chosen = match choice {
        Some(position) => slate[position],
        None => corpus.null_document(),
    };

    user.update_stats(chosen, portion);

    let satisfaction = user.satisfaction(chosen);

    // Interest drift: the direction of the polarization step is drawn from
    // the current interest score, mapped from [-1, 1] to a probability.
    let prob_forward = ((user.inspect_document(chosen) + 1.0) / 2.0).clamp(0.0, 1.0);
    let forward = Bernoulli::new(prob_forward)
        .context("failed to build drift direction distribution")?
        .sample(rng);
    user.drift_interests(chosen, forward);

    // Budget depletion, offset by the satisfaction bonus: dissatisfaction
    // accelerates depletion, satisfaction slows it.
    let bonus = BUDGET_BONUS_SCALE * chosen.length() * satisfaction;
    user.spend_budget(chosen.length() - bonus);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::{ChoiceModelKind, LinearChoice};
    use rand::SeedableRng;

    const PARAMS: SessionParams = SessionParams {
        initial_budget: 200.0,
        n_candidates: 10,
        slate_size: 5,
    };

    fn small_corpus(seed: u64) -> (Corpus, ChaCha12Rng) {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        let corpus = Corpus::generate(50, 5, &[0.7, 0.3], &mut rng).unwrap();
        (corpus, rng)
    }

    #[test]
    fn sessions_terminate_within_the_step_bound() {
        for seed in [41, 42, 43, 44, 45] {
            let (corpus, mut rng) = small_corpus(seed);
            let mut user = UserAgent::new(0, 5, 0.5, &mut rng).unwrap();
            let choice_model = ChoiceModelKind::Softmax.build();

            let record = run_session(
                &mut user,
                &corpus,
                &mut UniformSlatePolicy,
                choice_model.as_ref(),
                &FullConsumption,
                &PARAMS,
                &mut rng,
            )
            .unwrap();

            assert!(user.current_budget() <= 0.0);
            assert!(record.session_choice_count >= 1);
            assert!(record.session_choice_count < MAX_SESSION_STEPS);
            assert!(record.null_choice_count <= record.session_choice_count);
            assert_eq!(record.final_interests.len(), 5);
        }
    }

    #[test]
    fn lifetime_history_grows_across_sessions() {
        let (corpus, mut rng) = small_corpus(46);
        let mut user = UserAgent::new(7, 5, 0.5, &mut rng).unwrap();
        let choice_model = ChoiceModelKind::Softmax.build();

        for expected_sessions in 1..=3 {
            let record = run_session(
                &mut user,
                &corpus,
                &mut UniformSlatePolicy,
                choice_model.as_ref(),
                &FullConsumption,
                &PARAMS,
                &mut rng,
            )
            .unwrap();
            assert_eq!(record.user_id, 7);
            assert_eq!(user.historical_num_sessions(), expected_sessions);
        }
        assert!(user.historical_num_choices() >= 3);
    }

    #[test]
    fn drift_touches_only_the_chosen_topic() {
        let (corpus, mut rng) = small_corpus(47);
        let mut user = UserAgent::new(0, 5, 0.5, &mut rng).unwrap();
        user.begin_session(200.0);

        let before = user.interests().to_vec();
        let slate_ids = vec![0, 1, 2];
        consume_once(
            &mut user,
            &corpus,
            &slate_ids,
            &crate::choice::SoftmaxChoice,
            &FullConsumption,
            &mut rng,
        )
        .unwrap();

        let chosen_topic = match user.last_choice() {
            // Null choice: the zero topic vector moves nothing.
            None => None,
            Some(id) => corpus
                .document(id)
                .unwrap()
                .topic()
                .iter()
                .position(|&t| t == 1.0),
        };

        for (index, (old, new)) in before.iter().zip(user.interests()).enumerate() {
            if Some(index) != chosen_topic {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn satisfaction_bonus_offsets_budget_depletion() {
        // One-document slate, full interest in its topic: the linear model
        // gives the null option propensity 0, so the choice is forced.
        let document = crate::corpus::Document::new(0, 0, 2, 2.0, 10.0);
        let corpus = Corpus::from_documents(2, vec![document]);
        let mut user = UserAgent::with_interests(0, vec![1.0, 0.0], 1.0);
        let mut rng = ChaCha12Rng::seed_from_u64(48);

        user.begin_session(200.0);
        consume_once(
            &mut user,
            &corpus,
            &[0],
            &LinearChoice,
            &FullConsumption,
            &mut rng,
        )
        .unwrap();

        assert_eq!(user.last_choice(), Some(0));
        // Depletion is length minus bonus: 10 - (0.9 / 3.4) * 10 * 2.
        let expected = 200.0 - (10.0 - (0.9 / 3.4) * 10.0 * 2.0);
        assert!((user.current_budget() - expected).abs() < 1e-12);
    }

    #[test]
    fn slates_outside_the_corpus_are_rejected() {
        let (corpus, mut rng) = small_corpus(49);
        let mut user = UserAgent::new(0, 5, 0.5, &mut rng).unwrap();
        user.begin_session(200.0);

        let choice_model = ChoiceModelKind::Softmax.build();
        let result = consume_once(
            &mut user,
            &corpus,
            &[0, 9999],
            choice_model.as_ref(),
            &FullConsumption,
            &mut rng,
        );
        assert!(result.is_err());
    }
}
