//! Probability distributions for the randomly drawn attributes of firms.
use anyhow::{Result, anyhow, ensure};
use rand::Rng;
use rand::distr::weighted::WeightedIndex;
use rand::distr::{Distribution, Uniform};
use rand_distr::LogNormal;
use serde::{Deserialize, Serialize};

/// A distribution from which a firm attribute is drawn, as written in `model.toml`.
///
/// The variant is given by the `dist` key, e.g. `{ dist = "uniform", min = 0.3, max = 0.8 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case", deny_unknown_fields)]
pub enum ParameterDistribution {
    /// Uniform on `[min, max)`
    Uniform {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
    /// Log-normal with the given median, clipped to `[min, max]`
    Lognormal {
        /// The median of the distribution (before clipping)
        median: f64,
        /// Standard deviation of the underlying normal distribution
        sigma: f64,
        /// Lower clipping bound
        min: f64,
        /// Upper clipping bound
        max: f64,
    },
    /// One of a set of values, chosen with the given relative weights
    Discrete {
        /// Possible values
        values: Vec<f64>,
        /// Relative weights (normalised when sampling)
        weights: Vec<f64>,
    },
    /// Always the same value
    Fixed {
        /// The value
        value: f64,
    },
}

impl ParameterDistribution {
    /// Check that the distribution's parameters are valid
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Uniform { min, max } => check_bounds(*min, *max),
            Self::Lognormal {
                median,
                sigma,
                min,
                max,
            } => {
                ensure!(
                    median.is_finite() && *median > 0.0,
                    "Log-normal median must be a finite positive number"
                );
                ensure!(
                    sigma.is_finite() && *sigma >= 0.0,
                    "Log-normal sigma must be a finite non-negative number"
                );
                check_bounds(*min, *max)
            }
            Self::Discrete { values, weights } => {
                ensure!(!values.is_empty(), "Discrete distribution has no values");
                ensure!(
                    values.len() == weights.len(),
                    "Discrete distribution has {} values but {} weights",
                    values.len(),
                    weights.len()
                );
                ensure!(
                    values.iter().all(|v| v.is_finite()),
                    "Discrete distribution values must be finite"
                );
                ensure!(
                    weights.iter().all(|w| w.is_finite() && *w >= 0.0),
                    "Discrete distribution weights must be finite and non-negative"
                );
                ensure!(
                    weights.iter().sum::<f64>() > 0.0,
                    "Discrete distribution weights must have a positive sum"
                );
                Ok(())
            }
            Self::Fixed { value } => {
                ensure!(value.is_finite(), "Fixed value must be finite");
                Ok(())
            }
        }
    }

    /// The smallest and largest values which can be drawn.
    ///
    /// For discrete distributions only values with non-zero weight are considered.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Uniform { min, max } | Self::Lognormal { min, max, .. } => (*min, *max),
            Self::Discrete { values, weights } => values
                .iter()
                .zip(weights)
                .filter(|(_, w)| **w > 0.0)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (v, _)| {
                    (lo.min(*v), hi.max(*v))
                }),
            Self::Fixed { value } => (*value, *value),
        }
    }

    /// Create a sampler for this distribution
    pub fn sampler(&self) -> Result<Sampler> {
        self.validate()?;

        let sampler = match self {
            Self::Uniform { min, max } if max <= min => Sampler::Fixed(*min),
            Self::Uniform { min, max } => Sampler::Uniform(
                Uniform::new(*min, *max)
                    .map_err(|err| anyhow!("Invalid uniform distribution: {err}"))?,
            ),
            Self::Lognormal {
                median,
                sigma,
                min,
                max,
            } => Sampler::Lognormal {
                dist: LogNormal::new(median.ln(), *sigma)
                    .map_err(|err| anyhow!("Invalid log-normal distribution: {err}"))?,
                min: *min,
                max: *max,
            },
            Self::Discrete { values, weights } => Sampler::Discrete {
                values: values.clone(),
                index: WeightedIndex::new(weights)
                    .map_err(|err| anyhow!("Invalid discrete distribution: {err}"))?,
            },
            Self::Fixed { value } => Sampler::Fixed(*value),
        };

        Ok(sampler)
    }
}

/// Check the lower and upper bounds of a distribution
fn check_bounds(min: f64, max: f64) -> Result<()> {
    ensure!(
        min.is_finite() && max.is_finite(),
        "Distribution bounds must be finite"
    );
    ensure!(
        min <= max,
        "Distribution lower bound ({min}) is greater than upper bound ({max})"
    );

    Ok(())
}

/// A ready-to-use form of a [`ParameterDistribution`]
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Always returns the same value
    Fixed(f64),
    /// Uniform on a half-open interval
    Uniform(Uniform<f64>),
    /// Log-normal, clipped to `[min, max]`
    Lognormal {
        /// The unclipped distribution
        dist: LogNormal<f64>,
        /// Lower clipping bound
        min: f64,
        /// Upper clipping bound
        max: f64,
    },
    /// Weighted choice among values
    Discrete {
        /// Possible values
        values: Vec<f64>,
        /// Index distribution over `values`
        index: WeightedIndex<f64>,
    },
}

impl Distribution<f64> for Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Fixed(value) => *value,
            Self::Uniform(dist) => dist.sample(rng),
            Self::Lognormal { dist, min, max } => dist.sample(rng).clamp(*min, *max),
            Self::Discrete { values, index } => values[index.sample(rng)],
        }
    }
}
