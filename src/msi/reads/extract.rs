//! Length Extractor: turns reads overlapping a microsatellite into a length histogram.
//!

use super::AlignedRead;
use crate::msi::{histogram::LengthHistogram, locus::Locus};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ExtractParams {
    /// Aligned flank required on each side of the microsatellite.
    pub padding: u32,
    pub count_duplicates: bool,
    /// Mates of a pair are combined into one fragment observation.
    pub stitched: bool,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            padding: 2,
            count_duplicates: false,
            stitched: false,
        }
    }
}

pub fn extract<R: AlignedRead>(locus: &Locus, reads: &[R], params: &ExtractParams) -> LengthHistogram {
    let mut histogram = LengthHistogram::new();
    let mut mates: HashMap<&[u8], Vec<u32>> = HashMap::new();
    let mut n_filt = 0;

    for read in reads {
        if !is_usable(read, params) || !spans_locus(locus, read, params.padding) {
            n_filt += 1;
            continue;
        }
        let length = observed_length(locus, read);
        if params.stitched && read.is_paired() {
            mates.entry(read.qname()).or_default().push(length);
        } else {
            histogram.add(length);
        }
    }

    let mut n_discordant = 0;
    for lengths in mates.values() {
        match lengths.as_slice() {
            [first, second] if first == second => histogram.add(*first),
            _ => n_discordant += 1,
        }
    }

    log::debug!(
        "{}: {} observations, {} reads filtered, {} pairs discarded",
        locus.id(),
        histogram.support(),
        n_filt,
        n_discordant
    );
    histogram
}

fn is_usable<R: AlignedRead>(read: &R, params: &ExtractParams) -> bool {
    !read.is_secondary() && (params.count_duplicates || !read.is_duplicate())
}

/// The read must cover the locus plus `padding` aligned bases on both sides.
fn spans_locus<R: AlignedRead>(locus: &Locus, read: &R, padding: u32) -> bool {
    let padding = padding as i64;
    read.ref_start() <= locus.region.start as i64 - padding
        && read.ref_end() >= locus.region.end as i64 + padding
}

/// Counts read bases aligned inside the locus. Inserted bases following an
/// in-locus base are counted; those right before the first locus base are
/// counted once that base is reached, others in the flanks are not.
pub fn observed_length<R: AlignedRead>(locus: &Locus, read: &R) -> u32 {
    let mut length = 0;
    let mut pending_insertion = 0;
    let mut prev_in_locus = false;
    for pos in read.ref_positions() {
        match pos {
            Some(pos) => {
                prev_in_locus = locus.region.contains(pos);
                if prev_in_locus {
                    length += 1 + pending_insertion;
                }
                pending_insertion = 0;
            }
            None if prev_in_locus => length += 1,
            None => pending_insertion += 1,
        }
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::GenomicRegion;

    #[derive(Debug, Clone)]
    struct TestRead {
        name: String,
        paired: bool,
        duplicate: bool,
        secondary: bool,
        positions: Vec<Option<i64>>,
    }

    impl TestRead {
        /// Builds a read from a compact alignment: `M` aligned, `I` inserted, `D` deleted, `S` clipped.
        fn new(name: &str, start: i64, ops: &str) -> Self {
            let mut positions = Vec::new();
            let mut pos = start;
            for op in ops.chars() {
                match op {
                    'M' => {
                        positions.push(Some(pos));
                        pos += 1;
                    }
                    'D' => pos += 1,
                    'I' | 'S' => positions.push(None),
                    _ => panic!("Unknown op {}", op),
                }
            }
            Self {
                name: name.to_string(),
                paired: false,
                duplicate: false,
                secondary: false,
                positions,
            }
        }

        fn paired(mut self) -> Self {
            self.paired = true;
            self
        }
    }

    impl AlignedRead for TestRead {
        fn qname(&self) -> &[u8] {
            self.name.as_bytes()
        }
        fn is_paired(&self) -> bool {
            self.paired
        }
        fn is_duplicate(&self) -> bool {
            self.duplicate
        }
        fn is_secondary(&self) -> bool {
            self.secondary
        }
        fn ref_start(&self) -> i64 {
            self.positions.iter().flatten().copied().min().unwrap_or(0)
        }
        fn ref_end(&self) -> i64 {
            self.positions.iter().flatten().map(|p| p + 1).max().unwrap_or(0)
        }
        fn ref_positions(&self) -> Box<dyn Iterator<Item = Option<i64>> + '_> {
            Box::new(self.positions.iter().copied())
        }
    }

    // Locus covers [100, 110)
    fn locus() -> Locus {
        Locus::new(GenomicRegion::new("chr1", 100, 110).unwrap(), "MS1")
    }

    fn ops(parts: &[(char, usize)]) -> String {
        parts.iter().map(|(c, n)| c.to_string().repeat(*n)).collect()
    }

    #[test]
    fn reference_length_read_measures_locus_length() {
        let read = TestRead::new("r1", 90, &ops(&[('M', 30)]));
        assert_eq!(observed_length(&locus(), &read), 10);
    }

    #[test]
    fn insertion_inside_locus_extends_length() {
        let read = TestRead::new("r1", 90, &ops(&[('M', 15), ('I', 2), ('M', 15)]));
        assert_eq!(observed_length(&locus(), &read), 12);
    }

    #[test]
    fn insertion_after_last_locus_base_is_counted() {
        let read = TestRead::new("r1", 90, &ops(&[('M', 20), ('I', 3), ('M', 10)]));
        assert_eq!(observed_length(&locus(), &read), 13);
    }

    #[test]
    fn insertion_in_flank_is_not_counted() {
        let flank = TestRead::new("r1", 90, &ops(&[('M', 5), ('I', 4), ('M', 25)]));
        assert_eq!(observed_length(&locus(), &flank), 10);
        let last_flank_base = TestRead::new("r2", 90, &ops(&[('M', 9), ('I', 2), ('M', 21)]));
        assert_eq!(observed_length(&locus(), &last_flank_base), 10);
    }

    #[test]
    fn insertion_before_first_locus_base_is_counted() {
        // left-aligned expansion reported between the flank and the repeat
        let adjacent = TestRead::new("r1", 90, &ops(&[('M', 10), ('I', 2), ('M', 20)]));
        assert_eq!(observed_length(&locus(), &adjacent), 12);
        let expansion = TestRead::new("r2", 90, &ops(&[('M', 10), ('I', 3), ('M', 20)]));
        assert_eq!(observed_length(&locus(), &expansion), 13);
        let histogram = extract(&locus(), &[expansion], &ExtractParams::default());
        assert_eq!(histogram.get(13), 1);
    }

    #[test]
    fn deletion_inside_locus_shortens_length() {
        let read = TestRead::new("r1", 90, &ops(&[('M', 12), ('D', 3), ('M', 15)]));
        assert_eq!(observed_length(&locus(), &read), 7);
    }

    #[test]
    fn soft_clips_are_not_counted() {
        let read = TestRead::new("r1", 90, &ops(&[('S', 5), ('M', 30), ('S', 5)]));
        assert_eq!(observed_length(&locus(), &read), 10);
    }

    #[test]
    fn padding_boundary_is_inclusive() {
        let params = ExtractParams::default();
        let exact = TestRead::new("r1", 98, &ops(&[('M', 14)]));
        let short_left = TestRead::new("r2", 99, &ops(&[('M', 13)]));
        let short_right = TestRead::new("r3", 98, &ops(&[('M', 13)]));
        let histogram = extract(&locus(), &[exact, short_left, short_right], &params);
        assert_eq!(histogram.support(), 1);
        assert_eq!(histogram.get(10), 1);
    }

    #[test]
    fn reads_outside_padded_window_contribute_nothing() {
        let params = ExtractParams::default();
        let before = TestRead::new("r1", 10, &ops(&[('M', 50)]));
        let after = TestRead::new("r2", 200, &ops(&[('M', 50)]));
        let histogram = extract(&locus(), &[before, after], &params);
        assert!(histogram.is_empty());
    }

    #[test]
    fn secondary_and_duplicate_reads_are_skipped() {
        let mut secondary = TestRead::new("r1", 90, &ops(&[('M', 30)]));
        secondary.secondary = true;
        let mut duplicate = TestRead::new("r2", 90, &ops(&[('M', 30)]));
        duplicate.duplicate = true;
        let reads = [secondary.clone(), duplicate.clone()];

        let histogram = extract(&locus(), &reads, &ExtractParams::default());
        assert_eq!(histogram.support(), 0);

        let params = ExtractParams {
            count_duplicates: true,
            ..Default::default()
        };
        let histogram = extract(&locus(), &reads, &params);
        assert_eq!(histogram.support(), 1);
    }

    #[test]
    fn support_equals_accepted_reads() {
        let reads = vec![
            TestRead::new("r1", 90, &ops(&[('M', 30)])),
            TestRead::new("r2", 85, &ops(&[('M', 17), ('D', 1), ('M', 20)])),
            TestRead::new("r3", 90, &ops(&[('M', 30)])),
            TestRead::new("r4", 105, &ops(&[('M', 30)])),
        ];
        let histogram = extract(&locus(), &reads, &ExtractParams::default());
        assert_eq!(histogram.support(), 3);
        assert_eq!(histogram.get(10), 2);
        assert_eq!(histogram.get(9), 1);
    }

    #[test]
    fn stitched_pairs_count_once_when_mates_agree() {
        let params = ExtractParams {
            stitched: true,
            ..Default::default()
        };
        let reads = vec![
            TestRead::new("p1", 90, &ops(&[('M', 30)])).paired(),
            TestRead::new("p1", 95, &ops(&[('M', 30)])).paired(),
            TestRead::new("p2", 90, &ops(&[('M', 30)])).paired(),
            TestRead::new("p2", 90, &ops(&[('M', 15), ('I', 1), ('M', 15)])).paired(),
            TestRead::new("p3", 90, &ops(&[('M', 30)])).paired(),
            TestRead::new("single", 90, &ops(&[('M', 15), ('I', 1), ('M', 15)])),
        ];
        let histogram = extract(&locus(), &reads, &params);
        assert_eq!(histogram.support(), 2);
        assert_eq!(histogram.get(10), 1);
        assert_eq!(histogram.get(11), 1);
    }

    #[test]
    fn unstitched_pairs_count_each_mate() {
        let reads = vec![
            TestRead::new("p1", 90, &ops(&[('M', 30)])).paired(),
            TestRead::new("p1", 95, &ops(&[('M', 30)])).paired(),
        ];
        let histogram = extract(&locus(), &reads, &ExtractParams::default());
        assert_eq!(histogram.get(10), 2);
    }
}
