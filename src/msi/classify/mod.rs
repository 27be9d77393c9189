pub mod peaks;
pub mod slippage;

pub use peaks::{PeakBaseline, PeakParams};
pub use slippage::{SlippageBaseline, SlippageParams};

use super::{baseline::Baseline, histogram::LengthHistogram, locus::Locus, result::LocusResult};
use crate::utils::Result;
use std::str::FromStr;

/// Locus classification policy of a run.
#[derive(Debug, Clone)]
pub enum Classifier {
    Peaks(PeakParams),
    Slippage(SlippageParams),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Peaks,
    Slippage,
}

impl FromStr for ClassifierKind {
    type Err = &'static str;
    fn from_str(kind: &str) -> std::result::Result<Self, Self::Err> {
        match kind {
            "peaks" => Ok(ClassifierKind::Peaks),
            "slippage" => Ok(ClassifierKind::Slippage),
            _ => Err("Invalid classifier. Options are: peaks, slippage"),
        }
    }
}

impl Classifier {
    /// Default name of the method under which calls are stored.
    pub fn method_name(&self) -> &'static str {
        match self {
            Classifier::Peaks(_) => "mSINGSLike",
            Classifier::Slippage(_) => "SlippageLike",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Classifier::Peaks(params) => params.validate(),
            Classifier::Slippage(params) => params.validate(),
        }
    }

    /// Calls one locus of one sample; the histogram is carried unchanged into the result.
    pub fn classify(
        &self,
        locus: &Locus,
        histogram: &LengthHistogram,
        baseline: &Baseline,
    ) -> Result<LocusResult> {
        match (self, baseline) {
            (Classifier::Peaks(params), Baseline::Peaks(baseline)) => {
                Ok(peaks::classify(histogram, baseline, params))
            }
            (Classifier::Slippage(params), Baseline::Slippage(baseline)) => {
                Ok(slippage::classify(histogram, baseline, params))
            }
            _ => Err(format!(
                "Baseline of locus {} was not built for the {} classifier",
                locus.id(),
                self.method_name()
            )),
        }
    }
}
