//! Per-locus distribution of observed repeat lengths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of reads (or fragments) observed at each repeat length.
///
/// Buckets are kept sorted by length and never hold a zero count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<u32, usize>", into = "BTreeMap<u32, usize>")]
pub struct LengthHistogram {
    counts: BTreeMap<u32, usize>,
}

/// Modal bucket of a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    pub length: u32,
    pub count: usize,
}

impl LengthHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, length: u32) {
        self.add_count(length, 1);
    }

    pub fn add_count(&mut self, length: u32, count: usize) {
        if count > 0 {
            *self.counts.entry(length).or_insert(0) += count;
        }
    }

    pub fn get(&self, length: u32) -> usize {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// Total number of observations.
    pub fn support(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.counts.iter().map(|(&length, &count)| (length, count))
    }

    /// Highest bucket; equal heights resolve to the shortest length.
    pub fn highest_peak(&self) -> Option<Peak> {
        let mut best: Option<Peak> = None;
        for (length, count) in self.iter() {
            if best.map_or(true, |peak| count > peak.count) {
                best = Some(Peak { length, count });
            }
        }
        best
    }

    /// Highest bucket; equal heights resolve to the longest length.
    pub fn tallest_peak(&self) -> Option<Peak> {
        let mut best: Option<Peak> = None;
        for (length, count) in self.iter() {
            if best.map_or(true, |peak| count >= peak.count) {
                best = Some(Peak { length, count });
            }
        }
        best
    }
}

impl From<BTreeMap<u32, usize>> for LengthHistogram {
    fn from(counts: BTreeMap<u32, usize>) -> Self {
        let mut histogram = LengthHistogram::new();
        for (length, count) in counts {
            histogram.add_count(length, count);
        }
        histogram
    }
}

impl From<LengthHistogram> for BTreeMap<u32, usize> {
    fn from(histogram: LengthHistogram) -> Self {
        histogram.counts
    }
}

impl FromIterator<(u32, usize)> for LengthHistogram {
    fn from_iter<I: IntoIterator<Item = (u32, usize)>>(iter: I) -> Self {
        let mut histogram = LengthHistogram::new();
        for (length, count) in iter {
            histogram.add_count(length, count);
        }
        histogram
    }
}
