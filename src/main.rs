use std::time::SystemTime;

use isoforest::{
    fit,
    test_data::{gaussian_cluster_with_outlier, load_features_csv},
    IsolationForestParams,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let x = match std::env::args().nth(1) {
        Some(path) => {
            println!("Loading features from {path}");
            load_features_csv(path)?
        }
        None => {
            println!("Generating 999 points around the origin and one at (50, 50)");
            gaussian_cluster_with_outlier(999, &[50.0, 50.0], 7)
        }
    };
    println!("Fitting on {} rows x {} features", x.nrows(), x.ncols());

    let params = IsolationForestParams::builder()
        .contamination(0.01)
        .random_seed(7)
        .build()?;

    let start = SystemTime::now();
    let (fit_result, forest) = fit(x.view(), &params)?;
    println!("Time elapsed: {:?}", start.elapsed()?);
    println!(
        "Threshold: {:.6}, outlier fraction: {:.4}",
        forest.threshold(),
        fit_result.outlier_fraction
    );

    let mut ranked: Vec<(usize, f64)> = fit_result.scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (row, score) in ranked.iter().take(5) {
        println!(
            "row {row}: score {score:.6}, outlier {}",
            fit_result.labels[*row]
        );
    }
    Ok(())
}
