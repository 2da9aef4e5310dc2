use rand::{seq::index::sample, Rng};

use crate::{IsolationForestError, Result};

/// Rows and features one tree is grown on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub rows: Vec<usize>,
    pub features: Vec<usize>,
}

/// Draws `sample_size` row indices out of `n_rows` (with replacement when `bootstrap`) and
/// `feature_count` distinct feature indices out of `n_features`.
pub fn draw_sample<R: Rng + ?Sized>(
    n_rows: usize,
    n_features: usize,
    sample_size: usize,
    feature_count: usize,
    bootstrap: bool,
    rng: &mut R,
) -> Result<Sample> {
    if n_rows == 0 {
        return Err(IsolationForestError::EmptyDataset);
    }
    if sample_size < 2 {
        return Err(IsolationForestError::invalid(format!(
            "subsample size must be at least 2, got {sample_size}"
        )));
    }
    if !bootstrap && sample_size > n_rows {
        return Err(IsolationForestError::invalid(format!(
            "subsample size {sample_size} exceeds {n_rows} rows without bootstrap"
        )));
    }
    if feature_count < 1 || feature_count > n_features {
        return Err(IsolationForestError::invalid(format!(
            "feature count must be in [1, {n_features}], got {feature_count}"
        )));
    }

    let rows: Vec<usize> = if bootstrap {
        (0..sample_size).map(|_| rng.gen_range(0..n_rows)).collect()
    } else {
        sample(rng, n_rows, sample_size).into_vec()
    };
    let features = sample(rng, n_features, feature_count).into_vec();

    Ok(Sample { rows, features })
}
