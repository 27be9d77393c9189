//! Alignment view needed to measure repeat lengths.
//!

use rust_htslib::bam::{self, ext::BamRecordExtensions};

/// An aligned read as seen by the length extractor.
pub trait AlignedRead {
    /// Template name shared by the mates of a pair.
    fn qname(&self) -> &[u8];
    fn is_paired(&self) -> bool;
    fn is_duplicate(&self) -> bool;
    fn is_secondary(&self) -> bool;
    /// 0-based position of the first aligned reference base.
    fn ref_start(&self) -> i64;
    /// 0-based position past the last aligned reference base.
    fn ref_end(&self) -> i64;
    /// Reference position of every read base, `None` for bases without one
    /// (insertions and soft clips).
    fn ref_positions(&self) -> Box<dyn Iterator<Item = Option<i64>> + '_>;
}

impl AlignedRead for bam::Record {
    fn qname(&self) -> &[u8] {
        bam::Record::qname(self)
    }

    fn is_paired(&self) -> bool {
        bam::Record::is_paired(self)
    }

    fn is_duplicate(&self) -> bool {
        bam::Record::is_duplicate(self)
    }

    fn is_secondary(&self) -> bool {
        bam::Record::is_secondary(self)
    }

    fn ref_start(&self) -> i64 {
        self.reference_start()
    }

    fn ref_end(&self) -> i64 {
        self.reference_end()
    }

    fn ref_positions(&self) -> Box<dyn Iterator<Item = Option<i64>> + '_> {
        self.reference_positions_full()
    }
}
