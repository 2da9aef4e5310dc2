//! Isolation Forest outlier detection.
//!
//! Trees are grown on small random subsamples with random axis-parallel splits; points that
//! get isolated after few splits are anomalous. Training and scoring are parallel across trees
//! and rows when the `use-rayon` feature is enabled.
pub mod codec;
pub mod error;
pub mod forest;
pub mod test_data;
pub mod tree;

use ndarray::{Array1, ArrayView2};

pub use error::IsolationForestError;
pub use forest::{
    fitter::{fit, train},
    params::{IsolationForestParams, IsolationForestParamsBuilder, MaxFeatures, MaxSamples},
    IsolationForest, Prediction,
};
pub use tree::IsolationTree;

pub type Result<T> = std::result::Result<T, IsolationForestError>;

#[derive(Debug, Clone)]
pub struct FitResult {
    pub scores: Array1<f64>,
    pub labels: Array1<bool>,
    pub outlier_fraction: f64,
}

pub trait FittedModel {
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;
}
