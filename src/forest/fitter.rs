use std::time::Instant;

use log::{debug, info, warn};
use ndarray::ArrayView2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    tree::{builder::build_tree, sampler::draw_sample, IsolationTree},
    FitResult, IsolationForestError, Result,
};

use super::{
    params::{IsolationForestParams, ResolvedParams},
    threshold::select_threshold,
    ForestMetadata, IsolationForest, NO_OUTLIER_THRESHOLD,
};

#[cfg(feature = "use-rayon")]
use rayon::prelude::*;

/// Trains a forest on the rows of `x` and returns it with the training scores and labels.
pub fn fit(
    x: ArrayView2<f64>,
    hyperparameters: &IsolationForestParams,
) -> Result<(FitResult, IsolationForest)> {
    check_training_data(x)?;
    let resolved = hyperparameters.resolve(x.nrows(), x.ncols())?;
    let ResolvedParams {
        num_estimators,
        sample_size,
        feature_count,
        bootstrap,
        random_seed,
        contamination,
    } = resolved;
    info!(
        "Fitting {num_estimators} trees on {} rows x {} features (sample_size={sample_size}, \
         feature_count={feature_count}, bootstrap={bootstrap}, seed={random_seed})",
        x.nrows(),
        x.ncols()
    );
    let start = Instant::now();

    // Pre-generate seeds for each tree
    let mut rng = StdRng::seed_from_u64(random_seed);
    let seeds: Vec<u64> = (0..num_estimators).map(|_| rng.gen()).collect();

    #[cfg(not(feature = "use-rayon"))]
    let trees: Result<Vec<IsolationTree>> = seeds
        .iter()
        .map(|&seed| grow_tree(x, &resolved, seed))
        .collect();

    #[cfg(feature = "use-rayon")]
    let trees: Result<Vec<IsolationTree>> = seeds
        .into_par_iter()
        .map(|seed| grow_tree(x, &resolved, seed))
        .collect();

    let trees = trees?;
    debug!("Built {} trees in {:?}", trees.len(), start.elapsed());

    let forest = IsolationForest::new(
        trees,
        ForestMetadata {
            num_estimators,
            max_samples: sample_size,
            max_features: feature_count,
            bootstrap,
            random_seed,
            contamination,
            threshold: NO_OUTLIER_THRESHOLD,
            num_features: x.ncols(),
        },
    );

    let scores = forest.score_samples(x)?;
    let threshold = if contamination > 0.0 {
        select_threshold(&scores.to_vec(), contamination)?
    } else {
        NO_OUTLIER_THRESHOLD
    };
    let forest = forest.with_threshold(threshold);

    let labels = scores.mapv(|score| forest.is_outlier(score));
    let n_outliers = labels.iter().filter(|&&label| label).count();
    let outlier_fraction = n_outliers as f64 / x.nrows() as f64;
    if contamination > 0.0 && (outlier_fraction - contamination).abs() > 1.0 / x.nrows() as f64 {
        warn!(
            "Expected outlier fraction {contamination}, but {outlier_fraction} of the training \
             rows score at or above the threshold {threshold}; scores are likely tied"
        );
    }
    info!(
        "Fitted isolation forest in {:?}: threshold={threshold}, {n_outliers} training outliers",
        start.elapsed()
    );

    Ok((
        FitResult {
            scores,
            labels,
            outlier_fraction,
        },
        forest,
    ))
}

/// Trains a forest on the rows of `x`.
pub fn train(
    x: ArrayView2<f64>,
    hyperparameters: &IsolationForestParams,
) -> Result<IsolationForest> {
    fit(x, hyperparameters).map(|(_, forest)| forest)
}

fn grow_tree(x: ArrayView2<f64>, resolved: &ResolvedParams, seed: u64) -> Result<IsolationTree> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sample = draw_sample(
        x.nrows(),
        x.ncols(),
        resolved.sample_size,
        resolved.feature_count,
        resolved.bootstrap,
        &mut rng,
    )?;
    Ok(build_tree(x, &sample, &mut rng))
}

fn check_training_data(x: ArrayView2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(IsolationForestError::EmptyDataset);
    }
    if x.ncols() == 0 {
        return Err(IsolationForestError::invalid("training rows have no features"));
    }
    if let Some(((row, col), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(IsolationForestError::NonFiniteValue { row, col });
    }
    Ok(())
}
