//! Peak-counting policy: a locus is unstable when its length distribution shows
//! more peaks than stable references usually do.

use crate::msi::{
    histogram::LengthHistogram,
    result::{Evidence, LocusResult, Status},
};
use crate::utils::{math, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct PeakParams {
    pub min_depth: usize,
    /// Minimum bucket height to count as a peak, as a fraction of the highest bucket.
    pub peak_height_cutoff: f64,
    /// Number of baseline standard deviations tolerated above the baseline mean.
    pub std_dev_rate: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            min_depth: 150,
            peak_height_cutoff: 0.05,
            std_dev_rate: 2.0,
        }
    }
}

impl PeakParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.peak_height_cutoff) {
            return Err(format!(
                "Peak height cutoff must be between 0.0 and 1.0, got: {}",
                self.peak_height_cutoff
            ));
        }
        if self.std_dev_rate.is_nan() || self.std_dev_rate < 0.0 {
            return Err(format!(
                "Standard deviation rate must be non-negative, got: {}",
                self.std_dev_rate
            ));
        }
        Ok(())
    }
}

/// Peak count statistics over the stable references of one locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakBaseline {
    /// Undefined without stable references.
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub n_references: usize,
}

impl PeakBaseline {
    pub fn from_peak_counts(peak_counts: &[usize]) -> Self {
        let counts = peak_counts.iter().map(|&n| n as f64).collect::<Vec<_>>();
        Self {
            mean: math::mean(&counts),
            std_dev: math::std_dev(&counts),
            n_references: counts.len(),
        }
    }
}

/// Number of buckets reaching `peak_height_cutoff` times the highest bucket.
pub fn count_peaks(histogram: &LengthHistogram, peak_height_cutoff: f64) -> usize {
    let highest = match histogram.highest_peak() {
        Some(peak) => peak,
        None => return 0,
    };
    let min_height = peak_height_cutoff * highest.count as f64;
    histogram
        .iter()
        .filter(|(_, count)| *count as f64 >= min_height)
        .count()
}

/// Strict comparison when no tolerance margin is left above the mean.
fn exceeds_baseline(nb_peaks: usize, mean: f64, std_dev: f64, std_dev_rate: f64) -> bool {
    let margin = std_dev_rate * std_dev;
    let nb_peaks = nb_peaks as f64;
    if margin == 0.0 {
        nb_peaks > mean
    } else {
        nb_peaks >= mean + margin
    }
}

pub fn classify(
    histogram: &LengthHistogram,
    baseline: &PeakBaseline,
    params: &PeakParams,
) -> LocusResult {
    let mut result = LocusResult {
        status: Status::Undetermined,
        score: None,
        histogram: histogram.clone(),
        evidence: Evidence::Peaks {
            nb_peaks: None,
            highest_peak: None,
        },
    };
    if histogram.support() < params.min_depth {
        return result;
    }

    let nb_peaks = count_peaks(histogram, params.peak_height_cutoff);
    result.evidence = Evidence::Peaks {
        nb_peaks: Some(nb_peaks),
        highest_peak: histogram.highest_peak(),
    };

    if let (Some(mean), Some(std_dev)) = (baseline.mean, baseline.std_dev) {
        result.status = if exceeds_baseline(nb_peaks, mean, std_dev, params.std_dev_rate) {
            Status::Unstable
        } else {
            Status::Stable
        };
        result.score = math::normal_upper_tail(nb_peaks as f64, mean, std_dev);
    }
    result
}
