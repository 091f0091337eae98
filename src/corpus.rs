//! Document corpus generation.

use crate::config::check_vec;
use crate::dist::{Constant, PowerLaw, gaussian};
use anyhow::{Context, Result, bail};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Uniform, weighted::WeightedIndex};
use serde::{Deserialize, Serialize};

/// Exponent of the topic popularity power law.
const TOPIC_EXPONENT: f64 = 2.0;
/// Magnitude of the per-topic quality skew.
const QUALITY_DIRECTION: f64 = 3.0;
/// Standard deviation of document quality within a topic.
const QUALITY_STD_DEV: f64 = 2.0;
/// Session-time cost of fully consuming a document.
const DOCUMENT_LENGTH: f64 = 10.0;

/// Id reserved for the null sentinel; never a corpus key.
pub const NULL_DOCUMENT_ID: usize = usize::MAX;
const NULL_DOCUMENT_QUALITY: f64 = -0.5;
const NULL_DOCUMENT_LENGTH: f64 = 0.5;

/// One content item. Immutable once generated.
///
/// The topic vector is one-hot, except for the null sentinel whose topic
/// vector is all zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: usize,
    topic: Vec<f64>,
    quality: f64,
    length: f64,
}

impl Document {
    pub(crate) fn new(
        id: usize,
        topic_index: usize,
        n_topics: usize,
        quality: f64,
        length: f64,
    ) -> Self {
        let mut topic = vec![0.0; n_topics];
        topic[topic_index] = 1.0;
        Self {
            id,
            topic,
            quality,
            length,
        }
    }

    /// The "consumed nothing" sentinel.
    fn null(n_topics: usize) -> Self {
        Self {
            id: NULL_DOCUMENT_ID,
            topic: vec![0.0; n_topics],
            quality: NULL_DOCUMENT_QUALITY,
            length: NULL_DOCUMENT_LENGTH,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn topic(&self) -> &[f64] {
        &self.topic
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn is_null(&self) -> bool {
        self.id == NULL_DOCUMENT_ID
    }
}

/// Fixed population of documents with dense ids `0..len`, in generation
/// order. Read-only for the whole run; the null sentinel is owned here as a
/// single shared instance.
#[derive(Debug, Serialize, Deserialize)]
pub struct Corpus {
    n_topics: usize,
    documents: Vec<Document>,
    null: Document,
}

impl Corpus {
    /// Generate a corpus.
    ///
    /// Topic popularity follows a power law; each topic is consistently
    /// skewed good or bad: its quality direction is drawn from
    /// `{-3, +3}` weighted by `prob_quality_direction`, its mean quality
    /// uniformly between 0 and that direction, and document quality from a
    /// gaussian around that mean. Every per-topic quality distribution is
    /// built before the first document is sampled.
    pub fn generate(
        n_documents: usize,
        n_topics: usize,
        prob_quality_direction: &[f64],
        rng: &mut ChaCha12Rng,
    ) -> Result<Self> {
        if n_documents == 0 {
            bail!("corpus must contain at least one document");
        }
        if n_topics == 0 {
            bail!("corpus must cover at least one topic");
        }
        check_vec(prob_quality_direction, 2, true)
            .context("invalid quality direction probabilities")?;

        log::debug!("generating corpus: {n_documents} documents over {n_topics} topics");

        let topic_dist = PowerLaw::new(TOPIC_EXPONENT, n_topics)
            .context("failed to build topic popularity distribution")?;
        let direction_dist = WeightedIndex::new(prob_quality_direction)
            .context("failed to build quality direction distribution")?;

        let mut quality_dists = Vec::with_capacity(n_topics);
        for _ in 0..n_topics {
            let direction = if direction_dist.sample(rng) == 0 {
                -QUALITY_DIRECTION
            } else {
                QUALITY_DIRECTION
            };
            let mean_quality = Uniform::new(direction.min(0.0), direction.max(0.0))?.sample(rng);
            quality_dists.push(gaussian(mean_quality, QUALITY_STD_DEV)?);
        }

        let length_dist = Constant::new(DOCUMENT_LENGTH)?;

        let documents = (0..n_documents)
            .map(|id| {
                let topic_index = topic_dist.sample(rng);
                Document::new(
                    id,
                    topic_index,
                    n_topics,
                    quality_dists[topic_index].sample(rng),
                    length_dist.sample(rng),
                )
            })
            .collect();

        Ok(Self {
            n_topics,
            documents,
            null: Document::null(n_topics),
        })
    }

    pub fn n_topics(&self) -> usize {
        self.n_topics
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document(&self, id: usize) -> Result<&Document> {
        self.documents
            .get(id)
            .with_context(|| format!("no document with id {id}"))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// The shared null sentinel. Not a corpus member.
    pub fn null_document(&self) -> &Document {
        &self.null
    }

    #[cfg(test)]
    pub(crate) fn from_documents(n_topics: usize, documents: Vec<Document>) -> Self {
        Self {
            n_topics,
            documents,
            null: Document::null(n_topics),
        }
    }
}
