//! One classification pass: evaluated samples against the baselines of a reference set.

use super::{
    baseline::BaselineTable,
    classify::Classifier,
    consensus::{aggregate_sample, ConsensusParams},
    locus::Locus,
    result::Sample,
};
use crate::utils::Result;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Method holding the extracted histograms of the evaluated samples.
    pub data_method: String,
    /// Method under which locus and sample calls are stored.
    pub status_method: String,
    /// Method holding the known statuses of the references.
    pub model_method: String,
    pub classifier: Classifier,
    pub consensus: ConsensusParams,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        self.consensus.validate()?;
        if self.data_method == self.status_method {
            return Err(format!(
                "Status method must differ from the data method '{}'",
                self.data_method
            ));
        }
        Ok(())
    }

    pub fn build_baselines(&self, references: &[Sample]) -> Result<BaselineTable> {
        BaselineTable::build(references, &self.model_method, &self.classifier)
    }
}

/// Classifies every locus of every sample and stores the locus and sample calls
/// under `config.status_method`. The `data_method` results are left untouched, so
/// repeated passes give identical calls.
pub fn classify_samples(samples: &mut [Sample], baselines: &BaselineTable, config: &RunConfig) -> Result<()> {
    config.validate()?;
    samples
        .par_iter_mut()
        .try_for_each(|sample| classify_sample(sample, baselines, config))?;
    log::info!(
        "Classified {} samples with {}",
        samples.len(),
        config.status_method
    );
    Ok(())
}

fn classify_sample(sample: &mut Sample, baselines: &BaselineTable, config: &RunConfig) -> Result<()> {
    let mut calls = Vec::with_capacity(sample.loci.len());
    for (region, msi_locus) in &sample.loci {
        let data = msi_locus.results.get(&config.data_method).ok_or_else(|| {
            format!(
                "Sample {} has no {} result at locus {} ({})",
                sample.name, config.data_method, region, msi_locus.name
            )
        })?;
        let baseline = baselines
            .get(region)
            .map_err(|e| format!("Sample {}: {}", sample.name, e))?;
        let locus = Locus::new(region.clone(), msi_locus.name.as_str());
        let call = config.classifier.classify(&locus, &data.histogram, baseline)?;
        log::debug!(
            "{} {}: {} ({:?})",
            sample.name,
            locus.id(),
            call.status,
            call.score
        );
        calls.push((locus, call));
    }

    for (locus, call) in calls {
        sample.set_result(&locus, &config.status_method, call);
    }
    let sample_call = aggregate_sample(sample, &config.status_method, &config.consensus);
    sample
        .results
        .insert(config.status_method.clone(), sample_call);
    Ok(())
}
