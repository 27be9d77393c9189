use crate::cli::ModelArgs;
use crate::msi::{
    locus::load_loci,
    model::{self as curation, LocusStatusCounts, StatusAnnotations},
    report::{read_reports, write_json, write_report},
    result::Status,
};
use crate::utils::{create_writer, open_output_file, open_text_reader, GenomicRegion, Result};
use itertools::Itertools;
use std::{collections::BTreeMap, io::Write};

pub fn model(args: ModelArgs) -> Result<()> {
    let mut samples = read_reports(&args.lengths_paths)?;
    log::info!("Loaded {} reference samples", samples.len());

    let annotations = StatusAnnotations::from_reader(open_text_reader(&args.loci_status_path)?)?;
    let method = annotations.method.clone();

    if let Some(loci_path) = &args.loci_path {
        let loci = load_loci(loci_path)?;
        curation::populate_loci(&mut samples, &loci);
    }
    curation::annotate_statuses(&mut samples, &annotations, &args.data_method)?;

    let n_removed = curation::prune_results(&mut samples, &method, args.min_support);
    log::info!(
        "Removed {} reference results without a usable status or below {} support; {} samples left",
        n_removed,
        args.min_support,
        samples.len()
    );
    if samples.is_empty() {
        return Err("No reference sample left to build the model".into());
    }

    let counts = curation::status_counts(&samples, &method);
    let peaks = curation::stable_peaks(&samples, &method, args.min_support);

    let counts_writer = create_writer(&args.output_prefix, "status_counts.tsv", open_output_file)?;
    write_status_counts(counts_writer, &counts)?;
    let peaks_writer = create_writer(&args.output_prefix, "stable_peaks.json", open_output_file)?;
    write_json(peaks_writer, &peaks)?;

    let model_writer = create_writer(&args.output_prefix, "model.json", open_output_file)?;
    write_report(model_writer, &samples)
}

fn write_status_counts<W: Write>(
    mut writer: W,
    counts: &BTreeMap<GenomicRegion, LocusStatusCounts>,
) -> Result<()> {
    let to_err = |e: std::io::Error| format!("Failed to write status counts: {}", e);
    writeln!(
        writer,
        "locus_position\tname\t{}",
        Status::ALL.iter().join("\t")
    )
    .map_err(to_err)?;
    for (region, locus_counts) in counts {
        writeln!(
            writer,
            "{}\t{}\t{}",
            region,
            locus_counts.name,
            Status::ALL
                .iter()
                .map(|status| locus_counts.counts.get(status).copied().unwrap_or(0))
                .join("\t")
        )
        .map_err(to_err)?;
    }
    writer.flush().map_err(to_err)
}
