use std::{error::Error, path::Path};

use csv::ReaderBuilder;
use ndarray::{s, Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// `n_rows` points drawn from a standard normal in `n_cols` dimensions.
pub fn gaussian_blob(n_rows: usize, n_cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((n_rows, n_cols), || rng.sample(StandardNormal))
}

/// Standard normal cluster of `n_inliers` points with `outlier` appended as the last row.
pub fn gaussian_cluster_with_outlier(n_inliers: usize, outlier: &[f64], seed: u64) -> Array2<f64> {
    let mut x = Array2::zeros((n_inliers + 1, outlier.len()));
    x.slice_mut(s![..n_inliers, ..])
        .assign(&gaussian_blob(n_inliers, outlier.len(), seed));
    x.row_mut(n_inliers).assign(&ArrayView1::from(outlier));
    x
}

/// Reads a headered CSV of numeric columns into a feature matrix, one row per record.
pub fn load_features_csv(path: impl AsRef<Path>) -> Result<Array2<f64>, Box<dyn Error>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut values = Vec::new();
    let mut n_rows = 0;
    let mut n_cols = 0;
    for result in rdr.records() {
        let record = result?;
        n_cols = record.len();
        for field in record.iter() {
            values.push(field.trim().parse::<f64>()?);
        }
        n_rows += 1;
    }
    Ok(Array2::from_shape_vec((n_rows, n_cols), values)?)
}
