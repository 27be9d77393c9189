use crate::utils::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Genomic interval in 0-based, half-open coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenomicRegion {
    pub contig: String,
    pub start: u32,
    pub end: u32,
}

impl GenomicRegion {
    pub fn new(contig: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        if start >= end {
            return Err(format!("Invalid region: start {} >= end {}", start, end));
        }

        Ok(Self {
            contig: contig.into(),
            start,
            end,
        })
    }

    pub fn from_string(encoding: &str) -> Result<Self> {
        let error_msg = || format!("Invalid region encoding: {}", encoding);
        let elements: Vec<&str> = encoding.split(&[':', '-']).collect();

        if elements.len() != 3 {
            return Err(error_msg());
        }

        let start: u32 = elements[1].parse().map_err(|_| error_msg())?;
        let end: u32 = elements[2].parse().map_err(|_| error_msg())?;

        Self::new(elements[0].to_string(), start, end)
    }

    pub fn contains(&self, position: i64) -> bool {
        position >= self.start as i64 && position < self.end as i64
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

impl TryFrom<String> for GenomicRegion {
    type Error = String;

    fn try_from(encoding: String) -> Result<Self> {
        Self::from_string(&encoding)
    }
}

impl From<GenomicRegion> for String {
    fn from(region: GenomicRegion) -> Self {
        region.to_string()
    }
}
