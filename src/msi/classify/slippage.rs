//! Slippage policy: scores how much of the length distribution has shifted
//! away from the reference repeat length.

use crate::msi::{
    histogram::LengthHistogram,
    result::{Evidence, LocusResult, SlippageScores, Status},
};
use crate::utils::{math, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SlippageParams {
    pub min_depth: usize,
    /// Quantile of the stable reference scores used as the instability threshold.
    pub threshold_quantile: f64,
}

impl Default for SlippageParams {
    fn default() -> Self {
        Self {
            min_depth: 60,
            threshold_quantile: 0.95,
        }
    }
}

impl SlippageParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold_quantile) {
            return Err(format!(
                "Threshold quantile must be between 0.0 and 1.0, got: {}",
                self.threshold_quantile
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlippageBaseline {
    /// Scores of the stable references, ascending.
    pub stable_scores: Vec<f64>,
    /// Undefined without stable references.
    pub threshold: Option<f64>,
    pub reference_length: u32,
}

impl SlippageBaseline {
    pub fn from_scores(mut scores: Vec<f64>, reference_length: u32, quantile: f64) -> Self {
        scores.retain(|s| s.is_finite());
        scores.sort_by(|a, b| a.total_cmp(b));
        let threshold = math::quantile(&scores, quantile);
        Self {
            stable_scores: scores,
            threshold,
            reference_length,
        }
    }
}

/// Slippage scores of `histogram` against `reference_length`, both in [0, 1].
///
/// `proportion` is the fraction of observations whose length differs from the
/// reference; `shift` is `1 - 1/d` where `d` is the mean absolute length
/// difference of those observations (0 when nothing slipped).
pub fn slippage_scores(histogram: &LengthHistogram, reference_length: u32) -> Option<SlippageScores> {
    let support = histogram.support();
    if support == 0 {
        return None;
    }

    let (slipped, total_shift) = histogram
        .iter()
        .filter(|(length, _)| *length != reference_length)
        .fold((0usize, 0usize), |(n, shift), (length, count)| {
            (
                n + count,
                shift + count * length.abs_diff(reference_length) as usize,
            )
        });

    let shift = if slipped == 0 {
        0.0
    } else {
        1.0 - slipped as f64 / total_shift as f64
    };

    Some(SlippageScores {
        proportion: slipped as f64 / support as f64,
        shift,
    })
}

pub fn classify(
    histogram: &LengthHistogram,
    baseline: &SlippageBaseline,
    params: &SlippageParams,
) -> LocusResult {
    let mut result = LocusResult {
        status: Status::Undetermined,
        score: None,
        histogram: histogram.clone(),
        evidence: Evidence::Slippage {
            scores: None,
            reference_length: baseline.reference_length,
        },
    };
    if histogram.support() < params.min_depth {
        return result;
    }

    let scores = slippage_scores(histogram, baseline.reference_length);
    result.evidence = Evidence::Slippage {
        scores,
        reference_length: baseline.reference_length,
    };

    if let (Some(scores), Some(threshold)) = (scores, baseline.threshold) {
        result.status = if scores.proportion >= threshold {
            Status::Unstable
        } else {
            Status::Stable
        };
        result.score = Some(scores.proportion);
    }
    result
}
