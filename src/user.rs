//! Synthetic user model: latent interests, satisfaction, and lifetime
//! bookkeeping.

use crate::config::check_num;
use crate::corpus::Document;
use anyhow::{Context, Result};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Baseline attractiveness of consuming nothing; constant for all users.
pub const NULL_INTEREST: f64 = -0.3;

/// Rate at which a consumed topic's interest moves toward an extreme.
const INTEREST_ANCHOR: f64 = 0.3;

/// User of the simulation.
///
/// Holds the latent interest vector (one component per topic, each in
/// `[-1, 1]`), fixed behavioral parameters, lifetime history counters that
/// grow monotonically across sessions, and transient state for the session
/// currently running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAgent {
    id: usize,
    interests: Vec<f64>,
    fanatic_ratio: f64,
    null_interest: f64,

    historical_topic_views: Vec<f64>,
    historical_topic_time: Vec<f64>,
    historical_topic_quality: Vec<f64>,
    historical_num_sessions: usize,
    historical_num_choices: usize,
    historical_num_null_choices: usize,
    historical_time_spent: f64,
    historical_budget_spent: f64,
    historical_max_choices_per_session: usize,
    historical_min_choices_per_session: usize,

    current_budget: f64,
    session_choice_count: usize,
    session_null_choice_count: usize,
    session_time_spent: f64,
    /// Most recent choice; `None` is the null option.
    last_choice: Option<usize>,
}

impl UserAgent {
    /// Create a new user with interests drawn uniformly from `[-1, 1]`.
    pub fn new(
        id: usize,
        n_topics: usize,
        fanatic_ratio: f64,
        rng: &mut ChaCha12Rng,
    ) -> Result<Self> {
        check_num(fanatic_ratio, 0.0..=1.0).context("invalid fanatic ratio")?;

        let interest_dist = Uniform::new_inclusive(-1.0, 1.0)?;
        let interests = (0..n_topics).map(|_| interest_dist.sample(rng)).collect();

        Ok(Self {
            id,
            interests,
            fanatic_ratio,
            null_interest: NULL_INTEREST,
            historical_topic_views: vec![0.0; n_topics],
            historical_topic_time: vec![0.0; n_topics],
            historical_topic_quality: vec![0.0; n_topics],
            historical_num_sessions: 0,
            historical_num_choices: 0,
            historical_num_null_choices: 0,
            historical_time_spent: 0.0,
            historical_budget_spent: 0.0,
            historical_max_choices_per_session: 0,
            historical_min_choices_per_session: 0,
            current_budget: 0.0,
            session_choice_count: 0,
            session_null_choice_count: 0,
            session_time_spent: 0.0,
            last_choice: None,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn interests(&self) -> &[f64] {
        &self.interests
    }

    pub fn fanatic_ratio(&self) -> f64 {
        self.fanatic_ratio
    }

    pub fn null_interest(&self) -> f64 {
        self.null_interest
    }

    pub fn current_budget(&self) -> f64 {
        self.current_budget
    }

    pub fn session_choice_count(&self) -> usize {
        self.session_choice_count
    }

    pub fn session_null_choice_count(&self) -> usize {
        self.session_null_choice_count
    }

    pub fn session_time_spent(&self) -> f64 {
        self.session_time_spent
    }

    pub fn last_choice(&self) -> Option<usize> {
        self.last_choice
    }

    pub fn historical_num_sessions(&self) -> usize {
        self.historical_num_sessions
    }

    pub fn historical_num_choices(&self) -> usize {
        self.historical_num_choices
    }

    pub fn historical_num_null_choices(&self) -> usize {
        self.historical_num_null_choices
    }

    pub fn historical_topic_views(&self) -> &[f64] {
        &self.historical_topic_views
    }

    /// Interest score I(u, d): dot product of interests and document topic.
    ///
    /// Always 0 for the null sentinel; its attractiveness comes entirely
    /// from [`NULL_INTEREST`].
    pub fn inspect_document(&self, document: &Document) -> f64 {
        self.interests
            .iter()
            .zip(document.topic())
            .map(|(interest, topic)| interest * topic)
            .sum()
    }

    /// Satisfaction S(u, d): convex combination of document quality and
    /// interest match, weighted by the fanatic ratio.
    pub fn satisfaction(&self, document: &Document) -> f64 {
        self.fanatic_ratio * document.quality()
            + (1.0 - self.fanatic_ratio) * self.inspect_document(document)
    }

    pub(crate) fn begin_session(&mut self, budget: f64) {
        self.current_budget = budget;
        self.session_choice_count = 0;
        self.session_null_choice_count = 0;
        self.session_time_spent = 0.0;
        self.last_choice = None;
    }

    /// Record one consumed document.
    ///
    /// Time credited to the history cannot exceed the remaining budget.
    pub(crate) fn update_stats(&mut self, document: &Document, portion: f64) {
        let time = (document.length() * portion).min(self.current_budget);
        self.historical_time_spent += time;
        self.session_time_spent += time;

        for (index, &topic) in document.topic().iter().enumerate() {
            self.historical_topic_views[index] += topic;
            self.historical_topic_time[index] +=
                (topic * portion * document.length()).min(self.current_budget);
            self.historical_topic_quality[index] += topic * document.quality();
        }

        if document.is_null() {
            self.historical_num_null_choices += 1;
            self.session_null_choice_count += 1;
        }
        self.session_choice_count += 1;
        self.last_choice = if document.is_null() {
            None
        } else {
            Some(document.id())
        };
    }

    /// Polarize the interest components of the consumed topic: add the
    /// movement-toward-extreme delta when `forward`, subtract it otherwise.
    /// Components stay in `[-1, 1]`.
    pub(crate) fn drift_interests(&mut self, document: &Document, forward: bool) {
        for (interest, &topic) in self.interests.iter_mut().zip(document.topic()) {
            let delta =
                (INTEREST_ANCHOR - INTEREST_ANCHOR * interest.abs()) * -*interest * topic;
            let update = if forward { delta } else { -delta };
            *interest = (*interest + update).clamp(-1.0, 1.0);
        }
    }

    pub(crate) fn spend_budget(&mut self, amount: f64) {
        self.current_budget -= amount;
    }

    /// Fold the finished session's aggregates into the lifetime history.
    pub(crate) fn end_session(&mut self, initial_budget: f64) {
        self.historical_num_choices += self.session_choice_count;
        self.historical_budget_spent += initial_budget - self.current_budget;

        if self.historical_num_sessions == 0 {
            self.historical_max_choices_per_session = self.session_choice_count;
            self.historical_min_choices_per_session = self.session_choice_count;
        } else {
            self.historical_max_choices_per_session = self
                .historical_max_choices_per_session
                .max(self.session_choice_count);
            self.historical_min_choices_per_session = self
                .historical_min_choices_per_session
                .min(self.session_choice_count);
        }
        self.historical_num_sessions += 1;
    }

    #[cfg(test)]
    pub(crate) fn with_interests(id: usize, interests: Vec<f64>, fanatic_ratio: f64) -> Self {
        let n_topics = interests.len();
        Self {
            id,
            interests,
            fanatic_ratio,
            null_interest: NULL_INTEREST,
            historical_topic_views: vec![0.0; n_topics],
            historical_topic_time: vec![0.0; n_topics],
            historical_topic_quality: vec![0.0; n_topics],
            historical_num_sessions: 0,
            historical_num_choices: 0,
            historical_num_null_choices: 0,
            historical_time_spent: 0.0,
            historical_budget_spent: 0.0,
            historical_max_choices_per_session: 0,
            historical_min_choices_per_session: 0,
            current_budget: 0.0,
            session_choice_count: 0,
            session_null_choice_count: 0,
            session_time_spent: 0.0,
            last_choice: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn historical_time_spent(&self) -> f64 {
        self.historical_time_spent
    }

    #[cfg(test)]
    pub(crate) fn historical_min_max_choices(&self) -> (usize, usize) {
        (
            self.historical_min_choices_per_session,
            self.historical_max_choices_per_session,
        )
    }
}
