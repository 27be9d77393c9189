//! Sample Consensus Aggregator: combines locus calls into one sample call.

use super::result::{LocusResult, Sample, SampleCall, Status};
use crate::utils::Result;
use std::str::FromStr;

pub const DEFAULT_INSTABILITY_COUNT: usize = 3;
pub const DEFAULT_INSTABILITY_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusMethod {
    /// Unstable when at least `instability_count` loci are unstable.
    Count,
    /// Unstable when the unstable fraction of voting loci reaches `instability_ratio`.
    Ratio,
    /// Unstable when more than half of the voting loci are unstable.
    Majority,
}

impl FromStr for ConsensusMethod {
    type Err = &'static str;
    fn from_str(method: &str) -> std::result::Result<Self, Self::Err> {
        match method {
            "count" => Ok(ConsensusMethod::Count),
            "ratio" => Ok(ConsensusMethod::Ratio),
            "majority" => Ok(ConsensusMethod::Majority),
            _ => Err("Invalid consensus method. Options are: count, ratio, majority"),
        }
    }
}

/// Minimum amount of voting loci needed for a sample call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VotingGate {
    Loci(usize),
    /// Voting loci over all loci with a result.
    Ratio(f64),
}

#[derive(Debug, Clone)]
pub struct ConsensusParams {
    pub method: ConsensusMethod,
    pub min_voting: VotingGate,
    /// Only meaningful with `ConsensusMethod::Count`.
    pub instability_count: Option<usize>,
    /// Only meaningful with `ConsensusMethod::Ratio`.
    pub instability_ratio: Option<f64>,
    pub undetermined_weight: f64,
    pub locus_weight_is_score: bool,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            method: ConsensusMethod::Ratio,
            min_voting: VotingGate::Loci(3),
            instability_count: None,
            instability_ratio: None,
            undetermined_weight: 0.0,
            locus_weight_is_score: false,
        }
    }
}

impl ConsensusParams {
    pub fn validate(&self) -> Result<()> {
        if self.method != ConsensusMethod::Count && self.instability_count.is_some() {
            return Err(
                "The parameter instability-count can only be used with consensus method 'count'"
                    .to_string(),
            );
        }
        if self.method != ConsensusMethod::Ratio && self.instability_ratio.is_some() {
            return Err(
                "The parameter instability-ratio can only be used with consensus method 'ratio'"
                    .to_string(),
            );
        }
        let is_unit = |value: f64| (0.0..=1.0).contains(&value);
        if !is_unit(self.instability_ratio()) {
            return Err(format!(
                "The instability ratio must be between 0.0 and 1.0, got: {}",
                self.instability_ratio()
            ));
        }
        if let VotingGate::Ratio(ratio) = self.min_voting {
            if !is_unit(ratio) {
                return Err(format!(
                    "The minimum voting ratio must be between 0.0 and 1.0, got: {}",
                    ratio
                ));
            }
        }
        if !self.undetermined_weight.is_finite() || self.undetermined_weight < 0.0 {
            return Err(format!(
                "The undetermined weight must be a non-negative number, got: {}",
                self.undetermined_weight
            ));
        }
        Ok(())
    }

    pub fn instability_count(&self) -> usize {
        self.instability_count.unwrap_or(DEFAULT_INSTABILITY_COUNT)
    }

    pub fn instability_ratio(&self) -> f64 {
        self.instability_ratio.unwrap_or(DEFAULT_INSTABILITY_RATIO)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteCounts {
    pub nb_stable: usize,
    pub nb_unstable: usize,
    pub nb_total: usize,
}

impl VoteCounts {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a LocusResult>) -> Self {
        let mut counts = VoteCounts::default();
        for result in results {
            counts.nb_total += 1;
            match result.status {
                Status::Stable => counts.nb_stable += 1,
                Status::Unstable => counts.nb_unstable += 1,
                Status::Undetermined | Status::Unset => {}
            }
        }
        counts
    }

    pub fn nb_voting(&self) -> usize {
        self.nb_stable + self.nb_unstable
    }
}

pub fn sample_status(counts: &VoteCounts, params: &ConsensusParams) -> Status {
    let nb_voting = counts.nb_voting();
    let enough_voters = match params.min_voting {
        VotingGate::Loci(min_loci) => nb_voting >= min_loci,
        VotingGate::Ratio(min_ratio) => {
            counts.nb_total > 0 && nb_voting as f64 / counts.nb_total as f64 >= min_ratio
        }
    };
    if nb_voting == 0 || !enough_voters {
        return Status::Undetermined;
    }

    let is_unstable = match params.method {
        ConsensusMethod::Count => counts.nb_unstable >= params.instability_count(),
        ConsensusMethod::Ratio => {
            counts.nb_unstable as f64 / nb_voting as f64 >= params.instability_ratio()
        }
        ConsensusMethod::Majority => 2 * counts.nb_unstable > nb_voting,
    };
    if is_unstable {
        Status::Unstable
    } else {
        Status::Stable
    }
}

/// Weighted mean of the locus scores; loci without a call are down-weighted by `undetermined_weight`.
pub fn sample_score<'a>(
    results: impl IntoIterator<Item = &'a LocusResult>,
    params: &ConsensusParams,
) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for result in results {
        let score = match result.score {
            Some(score) if score.is_finite() => score,
            _ => continue,
        };
        let mut weight = if params.locus_weight_is_score {
            score
        } else {
            1.0
        };
        if !result.status.is_voting() {
            weight *= params.undetermined_weight;
        }
        weighted_sum += weight * score;
        total_weight += weight;
    }

    if total_weight > 0.0 && total_weight.is_finite() {
        Some(weighted_sum / total_weight)
    } else {
        None
    }
}

pub fn aggregate(results: &[&LocusResult], params: &ConsensusParams) -> SampleCall {
    let counts = VoteCounts::from_results(results.iter().copied());
    SampleCall {
        status: sample_status(&counts, params),
        score: sample_score(results.iter().copied(), params),
    }
}

/// Consensus over the `method` results of a sample.
pub fn aggregate_sample(sample: &Sample, method: &str, params: &ConsensusParams) -> SampleCall {
    let results = sample
        .method_results(method)
        .map(|(_, result)| result)
        .collect::<Vec<_>>();
    let call = aggregate(&results, params);
    log::debug!(
        "{}: {} from {} loci ({:?})",
        sample.name,
        call.status,
        results.len(),
        call.score
    );
    call
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msi::histogram::LengthHistogram;
    use approx::assert_relative_eq;

    fn result(status: Status, score: Option<f64>) -> LocusResult {
        let mut result = LocusResult::lengths(LengthHistogram::new(), false);
        result.status = status;
        result.score = score;
        result
    }

    fn calls(nb_stable: usize, nb_unstable: usize, nb_undetermined: usize) -> Vec<LocusResult> {
        let mut results = Vec::new();
        results.extend((0..nb_stable).map(|_| result(Status::Stable, None)));
        results.extend((0..nb_unstable).map(|_| result(Status::Unstable, None)));
        results.extend((0..nb_undetermined).map(|_| result(Status::Undetermined, None)));
        results
    }

    fn status_of(results: &[LocusResult], params: &ConsensusParams) -> Status {
        aggregate(&results.iter().collect::<Vec<_>>(), params).status
    }

    fn params(method: ConsensusMethod, min_voting_loci: usize) -> ConsensusParams {
        ConsensusParams {
            method,
            min_voting: VotingGate::Loci(min_voting_loci),
            ..Default::default()
        }
    }

    #[test]
    fn majority_tie_is_stable() {
        let params = params(ConsensusMethod::Majority, 2);
        assert_eq!(status_of(&calls(2, 2, 0), &params), Status::Stable);
        assert_eq!(status_of(&calls(1, 2, 0), &params), Status::Unstable);
        assert_eq!(status_of(&calls(2, 1, 5), &params), Status::Stable);
    }

    #[test]
    fn ratio_threshold_is_inclusive() {
        let params = ConsensusParams {
            instability_ratio: Some(0.33),
            ..params(ConsensusMethod::Ratio, 3)
        };
        assert_eq!(status_of(&calls(2, 1, 0), &params), Status::Unstable);
        assert_eq!(status_of(&calls(4, 1, 0), &params), Status::Stable);
    }

    #[test]
    fn count_threshold_is_inclusive() {
        let params = ConsensusParams {
            instability_count: Some(2),
            ..params(ConsensusMethod::Count, 3)
        };
        assert_eq!(status_of(&calls(10, 2, 0), &params), Status::Unstable);
        assert_eq!(status_of(&calls(10, 1, 0), &params), Status::Stable);
    }

    #[test]
    fn below_min_voting_loci_is_undetermined() {
        for method in [
            ConsensusMethod::Count,
            ConsensusMethod::Ratio,
            ConsensusMethod::Majority,
        ] {
            let params = params(method, 4);
            assert_eq!(status_of(&calls(0, 3, 10), &params), Status::Undetermined);
            assert_eq!(status_of(&calls(0, 4, 10), &params), Status::Unstable);
        }
    }

    #[test]
    fn below_min_voting_ratio_is_undetermined() {
        let params = ConsensusParams {
            min_voting: VotingGate::Ratio(0.5),
            ..Default::default()
        };
        assert_eq!(status_of(&calls(1, 1, 3), &params), Status::Undetermined);
        assert_eq!(status_of(&calls(2, 1, 3), &params), Status::Unstable);
    }

    #[test]
    fn no_voting_loci_is_undetermined() {
        let params = params(ConsensusMethod::Majority, 0);
        assert_eq!(status_of(&calls(0, 0, 3), &params), Status::Undetermined);
        assert_eq!(status_of(&[], &params), Status::Undetermined);
    }

    #[test]
    fn score_is_mean_of_scored_loci() {
        let results = [
            result(Status::Stable, Some(0.2)),
            result(Status::Unstable, Some(0.8)),
            result(Status::Stable, None),
            result(Status::Undetermined, Some(0.9)),
        ];
        let params = ConsensusParams::default();
        assert_relative_eq!(sample_score(&results, &params).unwrap(), 0.5);

        let params = ConsensusParams {
            undetermined_weight: 1.0,
            ..Default::default()
        };
        assert_relative_eq!(sample_score(&results, &params).unwrap(), 1.9 / 3.0);
    }

    #[test]
    fn score_weighted_by_locus_score() {
        let results = [
            result(Status::Stable, Some(0.2)),
            result(Status::Unstable, Some(0.8)),
        ];
        let params = ConsensusParams {
            locus_weight_is_score: true,
            ..Default::default()
        };
        // (0.2 * 0.2 + 0.8 * 0.8) / (0.2 + 0.8)
        assert_relative_eq!(sample_score(&results, &params).unwrap(), 0.68);
    }

    #[test]
    fn score_without_contributing_loci_is_null() {
        let params = ConsensusParams::default();
        assert_eq!(sample_score(&calls(2, 1, 0), &params), None);
        let results = [result(Status::Undetermined, Some(0.4))];
        assert_eq!(sample_score(&results, &params), None);
    }

    #[test]
    fn conflicting_parameters_are_rejected() {
        let ratio_with_count = ConsensusParams {
            method: ConsensusMethod::Majority,
            instability_count: Some(3),
            ..Default::default()
        };
        assert!(ratio_with_count.validate().is_err());

        let count_with_ratio = ConsensusParams {
            method: ConsensusMethod::Count,
            instability_ratio: Some(0.3),
            ..Default::default()
        };
        assert!(count_with_ratio.validate().is_err());

        let ratio = ConsensusParams {
            instability_ratio: Some(1.3),
            ..Default::default()
        };
        assert!(ratio.validate().is_err());

        let negative_weight = ConsensusParams {
            undetermined_weight: -0.5,
            ..Default::default()
        };
        assert!(negative_weight.validate().is_err());

        assert!(ConsensusParams::default().validate().is_ok());
    }
}
