//! Robust averaging of replicate distance measurements.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::tolerance::{ToleranceTracker, TrackerError};

/// Substitute for a zero median absolute deviation.
pub const MAD_EPSILON: f64 = 0.001;

/// Scale making the MAD a consistent estimator of the standard deviation.
const MODIFIED_Z_SCALE: f64 = 0.6745;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("no measurements left to aggregate")]
    InsufficientData,
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// One aggregated replicate set, judged against the tracker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMeasurement {
    pub timestamp: DateTime<Local>,
    pub in_tolerance: bool,
    /// Mean of the inlier `reference - height` distances.
    pub average_distance: f64,
    /// `reference - average_distance`.
    pub relative_height: f64,
}

/// Median; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Keep samples whose modified z-score magnitude is below `z_threshold`.
pub fn reject_outliers_modified_z(values: &[f64], z_threshold: f64) -> Vec<f64> {
    let Some(center) = median(values) else {
        return Vec::new();
    };
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mad = match median(&deviations) {
        Some(m) if m > 0.0 => m,
        _ => MAD_EPSILON,
    };
    values
        .iter()
        .copied()
        .filter(|v| (MODIFIED_Z_SCALE * (v - center) / mad).abs() < z_threshold)
        .collect()
}

/// Outlier-rejected mean of `values`.
pub fn aggregate(values: &[f64], z_threshold: f64) -> Result<f64, AggregateError> {
    let kept = reject_outliers_modified_z(values, z_threshold);
    if kept.is_empty() {
        return Err(AggregateError::InsufficientData);
    }
    if kept.len() < values.len() {
        log::debug!("rejected {} of {} samples", values.len() - kept.len(), values.len());
    }
    // running mean returns a constant input unchanged
    let mut mean = 0.0;
    for (k, v) in kept.iter().enumerate() {
        mean += (v - mean) / (k + 1) as f64;
    }
    Ok(mean)
}

/// Aggregate `distances` and judge the average level against `tracker`.
pub fn summarize(
    distances: &[f64],
    z_threshold: f64,
    tracker: &ToleranceTracker,
    reference_index: usize,
    timestamp: DateTime<Local>,
) -> Result<AggregatedMeasurement, AggregateError> {
    let average_distance = aggregate(distances, z_threshold)?;
    let reference = tracker.reference(reference_index)?.height;
    let relative_height = reference - average_distance;
    let in_tolerance = tracker.in_tolerance(relative_height)?;
    Ok(AggregatedMeasurement {
        timestamp,
        in_tolerance,
        average_distance,
        relative_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tolerance::ToleranceBounds;
    use approx::assert_abs_diff_eq;
    use meniscus_core::ImageSize;

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn constant_input_is_returned_exactly() {
        for n in [1, 3, 5, 7] {
            let values = vec![0.123_456_789; n];
            assert_eq!(aggregate(&values, 1.0), Ok(0.123_456_789));
        }
    }

    #[test]
    fn single_outlier_is_rejected() {
        let values = [0.10, 0.10, 0.10, 0.10, 0.90];
        assert_eq!(reject_outliers_modified_z(&values, 1.0), vec![0.10; 4]);
        assert_abs_diff_eq!(aggregate(&values, 1.0).expect("mean"), 0.10, epsilon = 1e-12);
    }

    #[test]
    fn spread_samples_within_threshold_are_averaged() {
        let values = [0.1, 0.2, 0.3];
        assert_abs_diff_eq!(aggregate(&values, 3.5).expect("mean"), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn empty_or_fully_rejected_input_is_insufficient() {
        assert_eq!(aggregate(&[], 1.0), Err(AggregateError::InsufficientData));
        // median 0.5, MAD 0.5: both samples score 0.6745
        assert_eq!(
            aggregate(&[0.0, 1.0], 0.5),
            Err(AggregateError::InsufficientData)
        );
    }

    #[test]
    fn summarize_judges_the_average_level() {
        let size = ImageSize::new(100, 100);
        let mut tracker = ToleranceTracker::new();
        tracker.set_reference(&[0.5], size).expect("reference");
        tracker
            .set_tolerance(
                ToleranceBounds::TwoSided {
                    first: 0.45,
                    second: 0.55,
                },
                size,
            )
            .expect("tolerance");

        let now = Local::now();
        let m = summarize(&[0.02, 0.02, 0.02], 1.0, &tracker, 0, now).expect("summary");
        assert_eq!(m.timestamp, now);
        assert!(m.in_tolerance);
        assert_abs_diff_eq!(m.relative_height, 0.48, epsilon = 1e-12);

        let m = summarize(&[-0.1, -0.1, -0.1], 1.0, &tracker, 0, now).expect("summary");
        assert!(!m.in_tolerance);
        assert_abs_diff_eq!(m.average_distance, -0.1, epsilon = 1e-12);

        assert_eq!(
            summarize(&[0.0], 1.0, &tracker, 3, now),
            Err(AggregateError::Tracker(TrackerError::NoReference))
        );
    }
}
