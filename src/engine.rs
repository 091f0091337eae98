//! Simulation engine: owns the corpus, the user population, and the random
//! source, and drives sessions segment by segment.

use crate::config::Config;
use crate::corpus::Corpus;
use crate::session::{FullConsumption, SessionParams, UniformSlatePolicy, run_session};
use crate::user::UserAgent;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, corpus, user population, and random number
/// generator, and provides methods to initialize, run, save, and load
/// simulations. Serializing the whole engine (random source included)
/// makes runs exactly resumable; users keep their lifetime history across
/// segments.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    corpus: Corpus,
    users: Vec<UserAgent>,
    session_rounds_done: usize,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with a freshly generated corpus and user
    /// population.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = ChaCha12Rng::try_from_os_rng()?;

        let corpus = Corpus::generate(
            cfg.corpus.n_documents,
            cfg.corpus.n_topics,
            &cfg.corpus.prob_quality_direction,
            &mut rng,
        )
        .context("failed to generate corpus")?;

        let mut users = Vec::with_capacity(cfg.user.n_users);
        for id in 0..cfg.user.n_users {
            let user = UserAgent::new(id, cfg.corpus.n_topics, cfg.user.fanatic_ratio, &mut rng)
                .with_context(|| format!("failed to create user {id}"))?;
            users.push(user);
        }

        Ok(Self {
            cfg,
            corpus,
            users,
            session_rounds_done: 0,
            rng,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Simulate one segment (`sessions_per_user` sessions for every user)
    /// and append one record per session to a binary trajectory file.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        log::info!(
            "simulating segment starting at session round {}",
            self.session_rounds_done
        );

        let choice_model = self.cfg.session.choice_model.build();
        let mut policy = UniformSlatePolicy;
        let portions = FullConsumption;
        let params = SessionParams {
            initial_budget: self.cfg.session.initial_budget,
            n_candidates: self.cfg.session.n_candidates,
            slate_size: self.cfg.session.slate_size,
        };

        for round in 0..self.cfg.output.sessions_per_user {
            for user in &mut self.users {
                let record = run_session(
                    user,
                    &self.corpus,
                    &mut policy,
                    choice_model.as_ref(),
                    &portions,
                    &params,
                    &mut self.rng,
                )
                .with_context(|| format!("failed to run session for user {}", user.id()))?;

                encode::write(&mut writer, &record).context("failed to serialize session record")?;
            }
            self.session_rounds_done += 1;

            let progress = 100.0 * (round + 1) as f64 / self.cfg.output.sessions_per_user as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}
