//! Parametric probability distributions used for corpus and user modeling.
//!
//! All distributions are built once, validated eagerly, and may be
//! re-sampled any number of times given a random source.

use anyhow::{Context, Result, bail};
use rand::Rng;
use rand_distr::{Distribution, Normal, weighted::WeightedIndex};

/// Discrete power law over ranks `1..=support`.
///
/// The pmf is proportional to `1 / rank^exponent` and normalized to sum
/// to 1. Samples are 0-based support indices (rank minus one).
#[derive(Debug, Clone)]
pub struct PowerLaw {
    index: WeightedIndex<f64>,
    pmf: Vec<f64>,
}

impl PowerLaw {
    pub fn new(exponent: f64, support: usize) -> Result<Self> {
        if !exponent.is_finite() || exponent <= 0.0 {
            bail!("power law exponent must be positive and finite, but is {exponent}");
        }
        if support == 0 {
            bail!("power law support must not be empty");
        }

        let mut pmf: Vec<f64> = (1..=support)
            .map(|rank| 1.0 / (rank as f64).powf(exponent))
            .collect();
        let sum: f64 = pmf.iter().sum();
        pmf.iter_mut().for_each(|mass| *mass /= sum);

        let index = WeightedIndex::new(&pmf).context("failed to build power law index")?;

        Ok(Self { index, pmf })
    }

    pub fn pmf(&self) -> &[f64] {
        &self.pmf
    }
}

impl Distribution<usize> for PowerLaw {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.index.sample(rng)
    }
}

/// Gaussian with validated parameters.
pub fn gaussian(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    if !mean.is_finite() {
        bail!("gaussian mean must be finite, but is {mean}");
    }
    if !std_dev.is_finite() || std_dev <= 0.0 {
        bail!("gaussian standard deviation must be positive and finite, but is {std_dev}");
    }
    Normal::new(mean, std_dev).context("failed to build gaussian")
}

/// Gaussian restricted to `[low, high]`.
#[derive(Debug, Clone, Copy)]
pub struct TruncatedGaussian {
    normal: Normal<f64>,
    low: f64,
    high: f64,
}

impl TruncatedGaussian {
    pub fn new(mean: f64, std_dev: f64, low: f64, high: f64) -> Result<Self> {
        let normal = gaussian(mean, std_dev)?;
        if !low.is_finite() || !high.is_finite() || low >= high {
            bail!("truncation bounds must be finite with low < high, but are [{low}, {high}]");
        }
        Ok(Self { normal, low, high })
    }
}

impl Distribution<f64> for TruncatedGaussian {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        // Rejection sampling, bounded so a far-tail truncation cannot spin
        // forever; the fallback clamps the last draw into the bounds.
        const MAX_REJECTIONS: usize = 1000;
        for _ in 0..MAX_REJECTIONS {
            let val = self.normal.sample(rng);
            if (self.low..=self.high).contains(&val) {
                return val;
            }
        }
        self.normal.sample(rng).clamp(self.low, self.high)
    }
}

/// Degenerate distribution that always yields the same value.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            bail!("constant value must be finite, but is {value}");
        }
        Ok(Self { value })
    }
}

impl Distribution<f64> for Constant {
    fn sample<R: Rng + ?Sized>(&self, _rng: &mut R) -> f64 {
        self.value
    }
}
