//! Method-keyed results attached to loci and samples.

use super::{
    histogram::{LengthHistogram, Peak},
    locus::Locus,
};
use crate::utils::{GenomicRegion, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "MSS", alias = "stable")]
    Stable,
    #[serde(rename = "MSI", alias = "unstable")]
    Unstable,
    #[serde(alias = "undetermined")]
    Undetermined,
    #[default]
    Unset,
}

impl Status {
    /// Only stable and unstable calls take part in sample voting.
    pub fn is_voting(&self) -> bool {
        matches!(self, Status::Stable | Status::Unstable)
    }

    pub const ALL: [Status; 4] = [
        Status::Stable,
        Status::Unstable,
        Status::Undetermined,
        Status::Unset,
    ];
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MSS" | "stable" => Ok(Status::Stable),
            "MSI" | "unstable" => Ok(Status::Unstable),
            "Undetermined" | "undetermined" => Ok(Status::Undetermined),
            "Unset" | "unset" | "None" | "" => Ok(Status::Unset),
            _ => Err(format!("Invalid status: '{}'", s)),
        }
    }
}

/// A missing or null status reads as `Unset`.
fn status_or_unset<'de, D>(deserializer: D) -> std::result::Result<Status, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Status>::deserialize(deserializer)?.unwrap_or_default())
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoding = match self {
            Status::Stable => "MSS",
            Status::Unstable => "MSI",
            Status::Undetermined => "Undetermined",
            Status::Unset => "Unset",
        };
        write!(f, "{}", encoding)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageScores {
    /// Fraction of observations away from the reference length.
    pub proportion: f64,
    /// Magnitude of the shift among slipped observations.
    pub shift: f64,
}

/// Method-specific data stored next to a locus call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    Lengths {
        /// Counts are read pairs combined into fragments.
        fragments: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference_length: Option<u32>,
    },
    Peaks {
        nb_peaks: Option<usize>,
        highest_peak: Option<Peak>,
    },
    Slippage {
        scores: Option<SlippageScores>,
        reference_length: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocusResult {
    #[serde(default, deserialize_with = "status_or_unset")]
    pub status: Status,
    #[serde(default)]
    pub score: Option<f64>,
    pub histogram: LengthHistogram,
    pub evidence: Evidence,
}

impl LocusResult {
    /// Raw extraction output, without any call.
    pub fn lengths(histogram: LengthHistogram, fragments: bool) -> Self {
        Self {
            status: Status::Unset,
            score: None,
            histogram,
            evidence: Evidence::Lengths {
                fragments,
                reference_length: None,
            },
        }
    }

    pub fn support(&self) -> usize {
        self.histogram.support()
    }

    /// Reference repeat length recorded in the result metadata, if any.
    pub fn reference_length(&self) -> Option<u32> {
        match self.evidence {
            Evidence::Lengths {
                reference_length, ..
            } => reference_length,
            Evidence::Slippage {
                reference_length, ..
            } => Some(reference_length),
            Evidence::Peaks { .. } => None,
        }
    }

    pub fn slippage_scores(&self) -> Option<SlippageScores> {
        match self.evidence {
            Evidence::Slippage { scores, .. } => scores,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MsiLocus {
    pub name: String,
    #[serde(default)]
    pub results: BTreeMap<String, LocusResult>,
}

/// Sample-level consensus call for one method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleCall {
    #[serde(default, deserialize_with = "status_or_unset")]
    pub status: Status,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    #[serde(default)]
    pub loci: BTreeMap<GenomicRegion, MsiLocus>,
    #[serde(default)]
    pub results: BTreeMap<String, SampleCall>,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loci: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }

    /// Returns the entry for `locus`, creating an empty one if needed.
    pub fn add_locus(&mut self, locus: &Locus) -> &mut MsiLocus {
        self.loci
            .entry(locus.region.clone())
            .or_insert_with(|| MsiLocus {
                name: locus.name.clone(),
                results: BTreeMap::new(),
            })
    }

    pub fn set_result(&mut self, locus: &Locus, method: &str, result: LocusResult) {
        self.add_locus(locus)
            .results
            .insert(method.to_string(), result);
    }

    pub fn result(&self, region: &GenomicRegion, method: &str) -> Option<&LocusResult> {
        self.loci
            .get(region)
            .and_then(|locus| locus.results.get(method))
    }

    /// Results of one method, in locus order.
    pub fn method_results<'a>(
        &'a self,
        method: &'a str,
    ) -> impl Iterator<Item = (&'a GenomicRegion, &'a LocusResult)> + 'a {
        self.loci
            .iter()
            .filter_map(move |(region, locus)| locus.results.get(method).map(|res| (region, res)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(start: u32, name: &str) -> Locus {
        Locus::new(GenomicRegion::new("chr1", start, start + 20).unwrap(), name)
    }

    #[test]
    fn status_parses_report_and_plain_names() {
        assert_eq!("MSS".parse::<Status>().unwrap(), Status::Stable);
        assert_eq!("unstable".parse::<Status>().unwrap(), Status::Unstable);
        assert_eq!("Undetermined".parse::<Status>().unwrap(), Status::Undetermined);
        assert!("maybe".parse::<Status>().is_err());
    }

    #[test]
    fn only_determined_statuses_vote() {
        assert!(Status::Stable.is_voting());
        assert!(Status::Unstable.is_voting());
        assert!(!Status::Undetermined.is_voting());
        assert!(!Status::Unset.is_voting());
    }

    #[test]
    fn results_of_different_methods_coexist() {
        let mut sample = Sample::new("S1");
        let target = locus(100, "BAT26");
        let histogram: LengthHistogram = [(26, 10)].into_iter().collect();
        sample.set_result(&target, "aln", LocusResult::lengths(histogram.clone(), false));
        let mut call = LocusResult::lengths(histogram, false);
        call.status = Status::Stable;
        sample.set_result(&target, "mSINGSLike", call);

        assert_eq!(sample.loci.len(), 1);
        assert_eq!(sample.loci[&target.region].results.len(), 2);
        assert_eq!(
            sample.result(&target.region, "aln").unwrap().status,
            Status::Unset
        );
        assert_eq!(
            sample.result(&target.region, "mSINGSLike").unwrap().status,
            Status::Stable
        );
    }

    #[test]
    fn method_results_skip_loci_without_method() {
        let mut sample = Sample::new("S1");
        sample.add_locus(&locus(100, "A"));
        sample.set_result(&locus(300, "B"), "aln", LocusResult::lengths(LengthHistogram::new(), false));
        let regions: Vec<String> = sample.method_results("aln").map(|(r, _)| r.to_string()).collect();
        assert_eq!(regions, vec!["chr1:300-320"]);
    }

    #[test]
    fn status_serializes_as_report_codes() {
        let call = SampleCall {
            status: Status::Unstable,
            score: Some(0.5),
        };
        assert_eq!(
            serde_json::to_string(&call).unwrap(),
            r#"{"status":"MSI","score":0.5}"#
        );
    }

    #[test]
    fn null_or_missing_status_reads_as_unset() {
        let result: LocusResult = serde_json::from_str(
            r#"{"status": null, "score": null, "histogram": {"20": 3},
                "evidence": {"kind": "lengths", "fragments": false}}"#,
        )
        .unwrap();
        assert_eq!(result.status, Status::Unset);
        assert_eq!(result.support(), 3);

        let call: SampleCall = serde_json::from_str(r#"{"status": null, "score": null}"#).unwrap();
        assert_eq!(call.status, Status::Unset);
        let call: SampleCall = serde_json::from_str(r#"{"score": 0.5}"#).unwrap();
        assert_eq!(call.status, Status::Unset);
    }
}
