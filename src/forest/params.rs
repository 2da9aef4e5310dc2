use log::warn;
use serde::{Deserialize, Serialize};

use crate::{IsolationForestError, Result};

// Guards `⌊f·N⌋` against products such as 0.29 * 100 = 28.999999999999996.
const FRACTION_EPSILON: f64 = 1e-9;

/// Rows drawn per tree: a fraction of the training set or an absolute count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    Fraction(f64),
    Count(usize),
}

/// Features considered per tree: a fraction of the dimensionality or an absolute count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Fraction(f64),
    Count(usize),
}

enum Amount {
    Fraction(f64),
    Count(usize),
}

/// Values `<= 1.0` are fractions, values `> 1.0` must be whole counts.
fn parse_amount(name: &str, value: f64) -> Result<Amount> {
    if !value.is_finite() || value <= 0.0 {
        return Err(IsolationForestError::invalid(format!(
            "{name} must be positive, got {value}"
        )));
    }
    if value <= 1.0 {
        Ok(Amount::Fraction(value))
    } else if value.fract() == 0.0 && value <= usize::MAX as f64 {
        Ok(Amount::Count(value as usize))
    } else {
        Err(IsolationForestError::invalid(format!(
            "{name} above 1.0 must be a whole number, got {value}"
        )))
    }
}

impl TryFrom<f64> for MaxSamples {
    type Error = IsolationForestError;

    fn try_from(value: f64) -> Result<Self> {
        Ok(match parse_amount("max_samples", value)? {
            Amount::Fraction(f) => Self::Fraction(f),
            Amount::Count(c) => Self::Count(c),
        })
    }
}

impl TryFrom<f64> for MaxFeatures {
    type Error = IsolationForestError;

    fn try_from(value: f64) -> Result<Self> {
        Ok(match parse_amount("max_features", value)? {
            Amount::Fraction(f) => Self::Fraction(f),
            Amount::Count(c) => Self::Count(c),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub num_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: f64,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_seed: u64,
}

/// Parameters with sample and feature counts fixed against a concrete training set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParams {
    pub num_estimators: usize,
    pub sample_size: usize,
    pub feature_count: usize,
    pub bootstrap: bool,
    pub random_seed: u64,
    pub contamination: f64,
}

impl IsolationForestParams {
    pub fn builder() -> IsolationForestParamsBuilder {
        IsolationForestParamsBuilder::new()
    }

    /// Range checks that do not depend on the training data.
    pub fn validate(&self) -> Result<()> {
        if self.num_estimators < 1 {
            return Err(IsolationForestError::invalid(
                "num_estimators must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.contamination) {
            return Err(IsolationForestError::invalid(format!(
                "contamination must be in [0, 1), got {}",
                self.contamination
            )));
        }
        match self.max_samples {
            MaxSamples::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(IsolationForestError::invalid(format!(
                    "max_samples fraction must be in (0, 1], got {f}"
                )))
            }
            MaxSamples::Count(c) if c < 2 => {
                return Err(IsolationForestError::invalid(format!(
                    "max_samples count must be at least 2, got {c}"
                )))
            }
            _ => {}
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(IsolationForestError::invalid(format!(
                    "max_features fraction must be in (0, 1], got {f}"
                )))
            }
            MaxFeatures::Count(0) => {
                return Err(IsolationForestError::invalid(
                    "max_features count must be at least 1",
                ))
            }
            _ => {}
        }
        Ok(())
    }

    /// Fixes the subsample size and feature count for `n_rows` rows of `n_features` features.
    pub fn resolve(&self, n_rows: usize, n_features: usize) -> Result<ResolvedParams> {
        self.validate()?;
        if n_rows == 0 {
            return Err(IsolationForestError::EmptyDataset);
        }

        let sample_size = match self.max_samples {
            MaxSamples::Fraction(f) => (f * n_rows as f64 + FRACTION_EPSILON).floor() as usize,
            MaxSamples::Count(c) if c > n_rows && !self.bootstrap => {
                warn!(
                    "max_samples ({c}) is greater than the number of rows ({n_rows}); \
                     using {n_rows} rows per tree"
                );
                n_rows
            }
            MaxSamples::Count(c) => c,
        };
        if sample_size < 2 {
            return Err(IsolationForestError::invalid(format!(
                "max_samples resolves to {sample_size} of {n_rows} rows; at least 2 are required"
            )));
        }

        let feature_count = match self.max_features {
            MaxFeatures::Fraction(f) => {
                (f * n_features as f64 + FRACTION_EPSILON).floor() as usize
            }
            MaxFeatures::Count(c) => c,
        };
        if feature_count < 1 || feature_count > n_features {
            return Err(IsolationForestError::invalid(format!(
                "max_features resolves to {feature_count} features; must be in [1, {n_features}]"
            )));
        }

        Ok(ResolvedParams {
            num_estimators: self.num_estimators,
            sample_size,
            feature_count,
            bootstrap: self.bootstrap,
            random_seed: self.random_seed,
            contamination: self.contamination,
        })
    }
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            num_estimators: 100,
            max_samples: MaxSamples::Count(256),
            contamination: 0.0,
            max_features: MaxFeatures::Fraction(1.0),
            bootstrap: false,
            random_seed: 1,
        }
    }
}

// Builder for IsolationForestParams
#[derive(Debug, Clone)]
pub struct IsolationForestParamsBuilder {
    num_estimators: usize,
    max_samples: f64,
    contamination: f64,
    max_features: f64,
    bootstrap: bool,
    random_seed: u64,
}

impl IsolationForestParamsBuilder {
    pub fn new() -> Self {
        Self {
            num_estimators: 100,
            max_samples: 256.0,
            contamination: 0.0,
            max_features: 1.0,
            bootstrap: false,
            random_seed: 1,
        }
    }

    pub fn num_estimators(mut self, num_estimators: usize) -> Self {
        self.num_estimators = num_estimators;
        self
    }

    /// `<= 1.0` is a fraction of the training rows, `> 1.0` an absolute count.
    pub fn max_samples(mut self, max_samples: f64) -> Self {
        self.max_samples = max_samples;
        self
    }

    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// `<= 1.0` is a fraction of the features, `> 1.0` an absolute count.
    pub fn max_features(mut self, max_features: f64) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    pub fn build(self) -> Result<IsolationForestParams> {
        let params = IsolationForestParams {
            num_estimators: self.num_estimators,
            max_samples: MaxSamples::try_from(self.max_samples)?,
            contamination: self.contamination,
            max_features: MaxFeatures::try_from(self.max_features)?,
            bootstrap: self.bootstrap,
            random_seed: self.random_seed,
        };
        params.validate()?;
        Ok(params)
    }
}

impl Default for IsolationForestParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
