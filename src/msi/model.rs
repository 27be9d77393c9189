//! Curation of the reference samples a baseline is learnt from.

use super::{
    histogram::LengthHistogram,
    locus::Locus,
    result::{Evidence, LocusResult, Sample, Status},
};
use crate::utils::{GenomicRegion, Result};
use std::{
    collections::{BTreeMap, BTreeSet},
    io::BufRead,
};

/// Known locus statuses of reference samples.
///
/// Read from a table with the columns `sample locus_position method_id key value [type]`;
/// only rows with `key` equal to `status` are kept.
#[derive(Debug, Clone, Default)]
pub struct StatusAnnotations {
    pub method: String,
    pub by_sample: BTreeMap<String, BTreeMap<GenomicRegion, Status>>,
}

impl StatusAnnotations {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        const MIN_FIELD_COUNT: usize = 5;
        let mut methods = BTreeSet::new();
        let mut by_sample: BTreeMap<String, BTreeMap<GenomicRegion, Status>> = BTreeMap::new();

        for (line_number, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| format!("Error reading line {}: {}", line_number + 1, e))?;
            if line.trim().is_empty() || line.starts_with("sample\t") || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < MIN_FIELD_COUNT {
                return Err(format!(
                    "Expected at least {} fields 'sample locus_position method_id key value' at line {}: {}",
                    MIN_FIELD_COUNT,
                    line_number + 1,
                    line
                ));
            }
            if fields[3] != "status" {
                continue;
            }
            let region = GenomicRegion::from_string(fields[1])
                .map_err(|e| format!("Invalid locus at line {}: {}", line_number + 1, e))?;
            let status = fields[4]
                .parse::<Status>()
                .map_err(|e| format!("Invalid status at line {}: {}", line_number + 1, e))?;
            methods.insert(fields[2].to_string());
            by_sample
                .entry(fields[0].to_string())
                .or_default()
                .insert(region, status);
        }

        if methods.len() != 1 {
            return Err(format!(
                "The annotations must contain exactly one method_id, found: {:?}",
                methods
            ));
        }
        let method = methods.into_iter().next().unwrap_or_default();
        Ok(Self { method, by_sample })
    }
}

/// Copies the `data_method` results of each sample under the annotation method, with the known status.
pub fn annotate_statuses(
    samples: &mut [Sample],
    annotations: &StatusAnnotations,
    data_method: &str,
) -> Result<()> {
    for sample in samples.iter_mut() {
        let statuses = annotations
            .by_sample
            .get(&sample.name)
            .ok_or_else(|| format!("Sample {} has no status annotation", sample.name))?;

        for (region, status) in statuses {
            let (histogram, fragments) = match sample.result(region, data_method) {
                Some(result) => (result.histogram.clone(), is_fragments(result)),
                None => (LengthHistogram::new(), false),
            };
            let name = sample
                .loci
                .get(region)
                .map_or_else(|| region.to_string(), |locus| locus.name.clone());
            let result = LocusResult {
                status: *status,
                score: None,
                histogram,
                evidence: Evidence::Lengths {
                    fragments,
                    reference_length: Some(region.len()),
                },
            };
            sample.set_result(&Locus::new(region.clone(), name), &annotations.method, result);
        }
    }
    Ok(())
}

fn is_fragments(result: &LocusResult) -> bool {
    matches!(
        result.evidence,
        Evidence::Lengths {
            fragments: true,
            ..
        }
    )
}

/// Adds the loci a sample lacks, without results.
pub fn populate_loci(samples: &mut [Sample], loci: &[Locus]) {
    for sample in samples.iter_mut() {
        for locus in loci {
            sample.add_locus(locus);
        }
    }
}

/// Drops `method` results that are not stable/unstable or have less than `min_support`
/// observations, then drops the samples left without any result. Returns the number of
/// removed results.
pub fn prune_results(samples: &mut Vec<Sample>, method: &str, min_support: usize) -> usize {
    let mut n_removed = 0;
    for sample in samples.iter_mut() {
        for msi_locus in sample.loci.values_mut() {
            let keep = msi_locus
                .results
                .get(method)
                .map(|res| res.status.is_voting() && res.support() >= min_support);
            if keep == Some(false) {
                msi_locus.results.remove(method);
                n_removed += 1;
            }
        }
    }

    samples.retain(|sample| {
        let has_results = sample.method_results(method).next().is_some();
        if !has_results {
            log::warn!("Sample {} has no usable reference locus", sample.name);
        }
        has_results
    });
    n_removed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusStatusCounts {
    pub name: String,
    pub counts: BTreeMap<Status, usize>,
}

/// Number of samples per status at each locus.
pub fn status_counts(samples: &[Sample], method: &str) -> BTreeMap<GenomicRegion, LocusStatusCounts> {
    let mut by_locus: BTreeMap<GenomicRegion, LocusStatusCounts> = BTreeMap::new();
    for sample in samples {
        for (region, msi_locus) in &sample.loci {
            let entry = by_locus
                .entry(region.clone())
                .or_insert_with(|| LocusStatusCounts {
                    name: msi_locus.name.clone(),
                    counts: Status::ALL.iter().map(|&status| (status, 0)).collect(),
                });
            if let Some(result) = msi_locus.results.get(method) {
                *entry.counts.entry(result.status).or_insert(0) += 1;
            }
        }
    }
    by_locus
}

/// Modal lengths of the stable references at each locus, sorted.
///
/// References need more than `min_support / 2` observations; equal peaks resolve
/// to the longest length.
pub fn stable_peaks(samples: &[Sample], method: &str, min_support: usize) -> BTreeMap<GenomicRegion, Vec<u32>> {
    let mut by_locus: BTreeMap<GenomicRegion, Vec<u32>> = BTreeMap::new();
    for sample in samples {
        for (region, msi_locus) in &sample.loci {
            let peaks = by_locus.entry(region.clone()).or_default();
            let result = match msi_locus.results.get(method) {
                Some(result) if result.status == Status::Stable => result,
                _ => continue,
            };
            if result.support() as f64 > min_support as f64 / 2.0 {
                if let Some(peak) = result.histogram.tallest_peak() {
                    peaks.push(peak.length);
                }
            }
        }
    }
    for peaks in by_locus.values_mut() {
        peaks.sort_unstable();
    }
    by_locus
}
