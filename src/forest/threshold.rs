use crate::{IsolationForestError, Result};

/// Inclusive (type 7) quantile of ascending `sorted`, interpolating linearly between the
/// order statistics around `(n - 1) * q`. `None` for an empty slice.
pub fn quantile_inclusive(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * q;
    let lo = (h.floor() as usize).min(last);
    let hi = (h.ceil() as usize).min(last);
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Score at the `(1 - contamination)` quantile of the training scores.
pub fn select_threshold(scores: &[f64], contamination: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&contamination) {
        return Err(IsolationForestError::invalid(format!(
            "contamination must be in [0, 1), got {contamination}"
        )));
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_inclusive(&sorted, 1.0 - contamination).ok_or(IsolationForestError::EmptyDataset)
}
