//! Quality filtering and cost summation

use crate::reading::IntervalReading;

/// First finalized reading, in input order
pub fn select_final(readings: &[IntervalReading]) -> Option<&IntervalReading> {
    readings.iter().find(|r| r.quality.is_final())
}

/// Sum of `costsAll` over finalized readings; unusable costs count as zero
pub fn sum_cost(readings: &[IntervalReading]) -> f64 {
    readings
        .iter()
        .filter(|r| r.quality.is_final())
        .filter_map(IntervalReading::cost)
        .sum()
}
