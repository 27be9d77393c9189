use crate::cli::ClassifyArgs;
use crate::msi::{
    classify::{Classifier, ClassifierKind, PeakParams, SlippageParams},
    consensus::{ConsensusParams, VotingGate},
    report::{read_report, read_reports, write_json, write_report},
    result::Sample,
    run::{classify_samples, RunConfig},
};
use crate::utils::{create_writer, open_output_file, Result};
use rayon::ThreadPoolBuilder;
use std::io::Write;

const DEFAULT_MIN_VOTING_LOCI: usize = 3;

pub fn classify(args: ClassifyArgs) -> Result<()> {
    let config = run_config(&args);
    config.validate()?;

    let references = read_report(&args.model_path)?;
    let mut samples = read_reports(&args.evaluated_paths)?;
    log::info!(
        "Classifying {} samples against {} references with {}",
        samples.len(),
        references.len(),
        config.status_method
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .thread_name(|i| format!("msicall-{}", i))
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))?;
    let baselines = pool.install(|| -> Result<_> {
        let baselines = config.build_baselines(&references)?;
        if baselines.is_empty() {
            return Err(format!(
                "Model {} has no locus to build baselines from",
                args.model_path.display()
            ));
        }
        classify_samples(&mut samples, &baselines, &config)?;
        Ok(baselines)
    })?;

    if args.output_baselines {
        let baselines_writer =
            create_writer(&args.output_prefix, "baselines.json", open_output_file)?;
        write_json(baselines_writer, &baselines)?;
    }
    let calls_writer = create_writer(&args.output_prefix, "samples.tsv", open_output_file)?;
    write_sample_calls(calls_writer, &samples, &config.status_method)?;
    let report_writer = create_writer(&args.output_prefix, "report.json", open_output_file)?;
    write_report(report_writer, &samples)
}

fn run_config(args: &ClassifyArgs) -> RunConfig {
    let classifier = match args.classifier {
        ClassifierKind::Peaks => {
            let defaults = PeakParams::default();
            Classifier::Peaks(PeakParams {
                min_depth: args.min_depth.unwrap_or(defaults.min_depth),
                peak_height_cutoff: args.peak_height_cutoff,
                std_dev_rate: args.std_dev_rate,
            })
        }
        ClassifierKind::Slippage => {
            let defaults = SlippageParams::default();
            Classifier::Slippage(SlippageParams {
                min_depth: args.min_depth.unwrap_or(defaults.min_depth),
                threshold_quantile: args.threshold_quantile,
            })
        }
    };

    let min_voting = match (args.min_voting_loci, args.min_voting_ratio) {
        (_, Some(ratio)) => VotingGate::Ratio(ratio),
        (Some(n), None) => VotingGate::Loci(n),
        (None, None) => VotingGate::Loci(DEFAULT_MIN_VOTING_LOCI),
    };

    let status_method = args
        .status_method
        .clone()
        .unwrap_or_else(|| classifier.method_name().to_string());

    RunConfig {
        data_method: args.data_method.clone(),
        status_method,
        model_method: args.model_method.clone(),
        classifier,
        consensus: ConsensusParams {
            method: args.consensus_method,
            min_voting,
            instability_count: args.instability_count,
            instability_ratio: args.instability_ratio,
            undetermined_weight: args.undetermined_weight,
            locus_weight_is_score: args.locus_weight_is_score,
        },
    }
}

fn write_sample_calls<W: Write>(mut writer: W, samples: &[Sample], method: &str) -> Result<()> {
    let to_err = |e: std::io::Error| format!("Failed to write sample calls: {}", e);
    writeln!(writer, "sample\tstatus\tscore").map_err(to_err)?;
    for sample in samples {
        let (status, score) = match sample.results.get(method) {
            Some(call) => (
                call.status.to_string(),
                call.score.map_or_else(|| ".".to_string(), |s| format!("{:.5}", s)),
            ),
            None => ("Unset".to_string(), ".".to_string()),
        };
        writeln!(writer, "{}\t{}\t{}", sample.name, status, score).map_err(to_err)?;
    }
    writer.flush().map_err(to_err)
}
