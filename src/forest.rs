pub mod fitter;
pub mod params;
pub mod threshold;

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{
    tree::{path, IsolationTree},
    FittedModel, IsolationForestError, Result,
};

#[cfg(feature = "use-rayon")]
use rayon::prelude::*;

/// Threshold used when no contamination is expected; no score in `(0, 1]` reaches it.
pub const NO_OUTLIER_THRESHOLD: f64 = f64::MAX;

/// Resolved training configuration stored alongside the trees.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestMetadata {
    pub num_estimators: usize,
    pub max_samples: usize,
    pub max_features: usize,
    pub bootstrap: bool,
    pub random_seed: u64,
    pub contamination: f64,
    pub threshold: f64,
    pub num_features: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub score: f64,
    pub is_outlier: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    metadata: ForestMetadata,
    avg_path_length_c: f64,
}

impl IsolationForest {
    pub(crate) fn new(trees: Vec<IsolationTree>, metadata: ForestMetadata) -> Self {
        let avg_path_length_c = path::average_path_length(metadata.max_samples);
        Self {
            trees,
            metadata,
            avg_path_length_c,
        }
    }

    pub(crate) fn with_threshold(mut self, threshold: f64) -> Self {
        self.metadata.threshold = threshold;
        self
    }

    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    pub fn metadata(&self) -> &ForestMetadata {
        &self.metadata
    }

    pub fn threshold(&self) -> f64 {
        self.metadata.threshold
    }

    pub fn num_features(&self) -> usize {
        self.metadata.num_features
    }

    pub fn is_outlier(&self, score: f64) -> bool {
        score >= self.metadata.threshold
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.metadata.num_features {
            return Err(IsolationForestError::DimensionMismatch {
                expected: self.metadata.num_features,
                actual: width,
            });
        }
        Ok(())
    }

    /// `2^(-E[h(x)] / c(ψ))` for a row of the training width.
    fn score_unchecked(&self, row: ArrayView1<f64>) -> f64 {
        // Collected in tree order and summed sequentially so the result does not depend on
        // how the work was scheduled.
        #[cfg(not(feature = "use-rayon"))]
        let path_lengths: Vec<f64> = self
            .trees
            .iter()
            .map(|tree| path::path_length(tree, row))
            .collect();

        #[cfg(feature = "use-rayon")]
        let path_lengths: Vec<f64> = self
            .trees
            .par_iter()
            .map(|tree| path::path_length(tree, row))
            .collect();

        let mean_path_length = path_lengths.iter().sum::<f64>() / path_lengths.len() as f64;
        2.0_f64.powf(-mean_path_length / self.avg_path_length_c)
    }

    pub fn score_one(&self, row: ArrayView1<f64>) -> Result<f64> {
        self.check_width(row.len())?;
        Ok(self.score_unchecked(row))
    }

    /// Anomaly score of every row of `x`.
    pub fn score_samples(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_width(x.ncols())?;

        #[cfg(not(feature = "use-rayon"))]
        let scores: Vec<f64> = (0..x.nrows())
            .map(|i| self.score_unchecked(x.row(i)))
            .collect();

        #[cfg(feature = "use-rayon")]
        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_unchecked(x.row(i)))
            .collect();

        Ok(Array1::from(scores))
    }

    /// Score and outlier label of every row of `x`.
    pub fn score(&self, x: ArrayView2<f64>) -> Result<Vec<Prediction>> {
        let scores = self.score_samples(x)?;
        Ok(scores
            .iter()
            .map(|&score| Prediction {
                score,
                is_outlier: self.is_outlier(score),
            })
            .collect())
    }

    pub fn predict_labels(&self, x: ArrayView2<f64>) -> Result<Array1<bool>> {
        Ok(self.score_samples(x)?.mapv(|score| self.is_outlier(score)))
    }

    /// Scores rows of possibly differing lengths; a row of the wrong width fails on its own
    /// without affecting the others.
    pub fn score_rows(&self, rows: &[Vec<f64>]) -> Vec<Result<Prediction>> {
        rows.iter()
            .map(|row| {
                let score = self.score_one(ArrayView1::from(row.as_slice()))?;
                Ok(Prediction {
                    score,
                    is_outlier: self.is_outlier(score),
                })
            })
            .collect()
    }
}

impl FittedModel for IsolationForest {
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.score_samples(x)
    }
}
