use crate::cli::ExtractArgs;
use crate::msi::{
    locus::{stream_loci_into_channel, Locus},
    reads::{extract as extract_lengths, ExtractParams},
    report::write_report,
    result::{LocusResult, Sample},
};
use crate::utils::{
    create_writer, get_bam_header, get_sample_name, is_bam_mapped, open_output_file, Result,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::bam::{self, Read, Record};
use std::{cell::RefCell, path::PathBuf, thread};

#[derive(Debug, Clone)]
struct ThreadContextParams {
    reads_path: PathBuf,
}

thread_local! {
    static CTX_PARAMS: RefCell<Option<ThreadContextParams>> = const { RefCell::new(None) };
}

fn create_thread_local_bam_reader() -> bam::IndexedReader {
    let path = CTX_PARAMS.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .expect("Thread context parameters not initialized for BAM path")
            .reads_path
            .clone()
    });
    bam::IndexedReader::from_path(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to initialize BAM reader for path {}: {}",
            path.display(),
            e
        )
    })
}

thread_local! {
    static THREAD_BAM_READER: RefCell<bam::IndexedReader> = RefCell::new(create_thread_local_bam_reader());
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

pub fn extract(args: ExtractArgs) -> Result<()> {
    let bam_header = get_bam_header(&args.reads_path)?;
    if !is_bam_mapped(&bam_header) {
        return Err("Input BAM is not mapped".into());
    }

    let sample_name = match args.sample_name {
        Some(name) => name,
        None => get_sample_name(&args.reads_path, &bam_header)?,
    };

    let (sender_locus, receiver_locus) = bounded(CHANNEL_BUFFER_SIZE);
    let loci_path = args.loci_path.clone();
    let locus_stream_thread =
        thread::spawn(move || stream_loci_into_channel(&loci_path, sender_locus));

    let (sender_result, receiver_result) = bounded::<(Locus, LocusResult)>(CHANNEL_BUFFER_SIZE);
    let method_name = args.method_name.clone();
    let writer_thread = thread::spawn(move || {
        let mut sample = Sample::new(sample_name);
        for (locus, result) in &receiver_result {
            sample.set_result(&locus, &method_name, result);
        }
        sample
    });

    let params = ExtractParams {
        padding: args.padding,
        count_duplicates: args.count_duplicates,
        stitched: args.reads_stitched,
    };

    log::debug!(
        "Initializing thread pool with {} threads...",
        args.num_threads
    );

    let pool = initialize_thread_pool(
        args.num_threads,
        ThreadContextParams {
            reads_path: args.reads_path.clone(),
        },
    )?;
    let errors = pool.install(|| {
        process_loci(receiver_locus, &sender_result, |locus| {
            extract_locus(locus, &params)
        })
    });

    // Clean-up
    drop(sender_result);
    let sample = writer_thread.join().expect("Writer thread panicked");
    log::trace!("Writer thread finished");
    match locus_stream_thread
        .join()
        .expect("Locus stream thread panicked")
    {
        Ok(_) => log::trace!("Locus stream thread finished"),
        Err(e) => return Err(format!("Locus streaming failed: {}", e)),
    }

    if !errors.is_empty() {
        for err in &errors {
            log::error!("{}", err);
        }
        return Err(format!(
            "Length extraction failed for {} loci, first error: {}",
            errors.len(),
            errors[0]
        ));
    }

    log::info!(
        "{}: length distributions of {} loci",
        sample.name,
        sample.loci.len()
    );
    let report_writer = create_writer(&args.output_prefix, "lengths.json", open_output_file)?;
    write_report(report_writer, &[sample])
}

/// Runs `analyze` on every streamed locus and forwards the results to the writer.
/// Returns the errors of BED lines and loci that could not be processed, sorted.
fn process_loci<F>(
    receiver_locus: Receiver<Result<Locus>>,
    sender_result: &Sender<(Locus, LocusResult)>,
    analyze: F,
) -> Vec<String>
where
    F: Fn(&Locus) -> Result<LocusResult> + Send + Sync,
{
    let mut errors: Vec<String> = receiver_locus
        .into_iter()
        .par_bridge()
        .map_with(sender_result, |s, locus_result| {
            let locus = locus_result?;
            let result = analyze(&locus).map_err(|e| {
                format!("Error extracting locus {} ({}): {}", locus.id(), locus.name, e)
            })?;
            s.send((locus, result))
                .map_err(|e| format!("Failed to send locus result to writer thread: {}", e))
        })
        .filter_map(|res| res.err())
        .collect();
    errors.sort();
    errors
}

fn extract_locus(locus: &Locus, params: &ExtractParams) -> Result<LocusResult> {
    THREAD_BAM_READER.with(|reader_cell| {
        let mut reader = reader_cell.borrow_mut();
        let reads = fetch_reads(locus, params.padding, &mut reader)?;
        let histogram = extract_lengths(locus, &reads, params);
        Ok(LocusResult::lengths(histogram, params.stitched))
    })
}

/// Reads overlapping the locus and its padding; filtering is left to the extractor.
fn fetch_reads(locus: &Locus, padding: u32, bam: &mut bam::IndexedReader) -> Result<Vec<Record>> {
    let (start, end) = extraction_window(locus, padding);
    let extraction_region = (locus.region.contig.as_str(), start, end);

    let mut reads = Vec::new();
    if let Err(msg) = bam.fetch(extraction_region) {
        log::warn!("Fetch error: {}", msg);
        return Ok(reads);
    }

    let mut record = Record::new();
    while let Some(result) = bam.read(&mut record) {
        match result {
            Ok(_) => {
                if record.is_unmapped() {
                    continue;
                }
                reads.push(record.clone());
            }
            Err(err) => Err(err.to_string())?,
        }
    }
    Ok(reads)
}

fn extraction_window(locus: &Locus, padding: u32) -> (u32, u32) {
    (
        locus.region.start.saturating_sub(padding),
        locus.region.end.saturating_add(padding),
    )
}

fn initialize_thread_pool(
    num_threads: usize,
    thread_context: ThreadContextParams,
) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("msicall-{}", i))
        .start_handler(move |_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = Some(thread_context.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_PARAMS.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| format!("Failed to initialize thread pool: {}", e))
}
