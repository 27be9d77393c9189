//! Baseline Builder: per-locus statistics of the stable reference samples.

use super::{
    classify::{peaks, slippage, Classifier, PeakBaseline, SlippageBaseline},
    locus::Locus,
    result::{LocusResult, Sample, Status},
};
use crate::utils::{GenomicRegion, Result};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Baseline {
    Peaks(PeakBaseline),
    Slippage(SlippageBaseline),
}

/// Builds the baseline of `locus` from the reference results recorded for it.
///
/// Only references whose status is exactly stable contribute.
pub fn build(locus: &Locus, references: &[&LocusResult], classifier: &Classifier) -> Result<Baseline> {
    let stable = references
        .iter()
        .filter(|res| res.status == Status::Stable)
        .collect_vec();

    let baseline = match classifier {
        Classifier::Peaks(params) => {
            let peak_counts = stable
                .iter()
                .map(|res| peaks::count_peaks(&res.histogram, params.peak_height_cutoff))
                .collect_vec();
            Baseline::Peaks(PeakBaseline::from_peak_counts(&peak_counts))
        }
        Classifier::Slippage(params) => {
            let reference_length = reference_length(locus, references)?;
            let scores = stable
                .iter()
                .filter_map(|res| {
                    res.slippage_scores()
                        .or_else(|| slippage::slippage_scores(&res.histogram, reference_length))
                        .map(|scores| scores.proportion)
                })
                .collect_vec();
            Baseline::Slippage(SlippageBaseline::from_scores(
                scores,
                reference_length,
                params.threshold_quantile,
            ))
        }
    };

    log::debug!(
        "{}: baseline from {} stable of {} references",
        locus.id(),
        stable.len(),
        references.len()
    );
    Ok(baseline)
}

/// Reference repeat length shared by all references; the locus length when none is recorded.
fn reference_length(locus: &Locus, references: &[&LocusResult]) -> Result<u32> {
    let lengths = references
        .iter()
        .filter_map(|res| res.reference_length())
        .unique()
        .sorted()
        .collect_vec();
    match lengths.as_slice() {
        [] => Ok(locus.region.len()),
        [length] => Ok(*length),
        _ => Err(format!(
            "Conflicting reference lengths for locus {} ({}): {}",
            locus.id(),
            locus.name,
            lengths.iter().join(", ")
        )),
    }
}

/// Read-only baselines of every reference locus for one run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BaselineTable {
    baselines: BTreeMap<GenomicRegion, Baseline>,
}

impl BaselineTable {
    /// Builds one baseline per locus seen in the references, using their `method` results.
    pub fn build(references: &[Sample], method: &str, classifier: &Classifier) -> Result<Self> {
        let mut loci: BTreeMap<&GenomicRegion, (&str, Vec<&LocusResult>)> = BTreeMap::new();
        for sample in references {
            for (region, msi_locus) in &sample.loci {
                let entry = loci
                    .entry(region)
                    .or_insert_with(|| (msi_locus.name.as_str(), Vec::new()));
                if let Some(result) = msi_locus.results.get(method) {
                    entry.1.push(result);
                }
            }
        }

        let baselines = loci
            .into_par_iter()
            .map(|(region, (name, results))| {
                let locus = Locus::new(region.clone(), name);
                build(&locus, &results, classifier).map(|baseline| (region.clone(), baseline))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        log::info!("Built baselines for {} loci", baselines.len());
        Ok(Self { baselines })
    }

    pub fn get(&self, region: &GenomicRegion) -> Result<&Baseline> {
        self.baselines
            .get(region)
            .ok_or_else(|| format!("Locus {} is missing from the baseline", region))
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
