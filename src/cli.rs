use crate::msi::{classify::ClassifierKind, consensus::ConsensusMethod};
use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="msicall",
          version=&**FULL_VERSION,
          about="Microsatellite instability caller for targeted sequencing data",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Microsatellite length extraction from aligned reads")]
    Extract(ExtractArgs),
    #[clap(about = "Reference model construction from annotated samples")]
    Model(ModelArgs),
    #[clap(about = "Locus and sample instability classification")]
    Classify(ClassifyArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("extract")))]
#[command(arg_required_else_help(true))]
pub struct ExtractArgs {
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reads")]
    #[clap(help = "Indexed BAM file with aligned reads")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "loci")]
    #[clap(help = "BED file with microsatellite coordinates")]
    #[clap(value_name = "LOCI")]
    #[arg(value_parser = check_file_exists)]
    pub loci_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "sample-name")]
    #[clap(value_name = "SAMPLE_NAME")]
    #[clap(help = "Sample name")]
    #[clap(default_value = None)]
    #[arg(value_parser = check_name_nonempty)]
    pub sample_name: Option<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "method-name")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Method name under which the length distributions are stored")]
    #[clap(default_value = "aln")]
    #[arg(value_parser = check_name_nonempty)]
    pub method_name: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "padding")]
    #[clap(value_name = "PADDING")]
    #[clap(help = "Number of aligned bases required on both sides of the microsatellite")]
    #[clap(default_value = "2")]
    pub padding: u32,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "count-duplicates")]
    #[clap(help = "Count reads flagged as duplicates")]
    pub count_duplicates: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "reads-stitched")]
    #[clap(help = "Combine the two mates of a pair into one fragment observation")]
    pub reads_stitched: bool,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("model")))]
#[command(arg_required_else_help(true))]
pub struct ModelArgs {
    #[clap(required = true)]
    #[clap(short = 'l')]
    #[clap(long = "lengths")]
    #[clap(help = "Length reports of the reference samples")]
    #[clap(value_name = "LENGTHS")]
    #[clap(num_args = 1..)]
    #[arg(value_parser = check_file_exists)]
    pub lengths_paths: Vec<PathBuf>,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "loci-status")]
    #[clap(help = "TSV file with the known status of each locus in each reference sample")]
    #[clap(value_name = "STATUS")]
    #[arg(value_parser = check_file_exists)]
    pub loci_status_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 'b')]
    #[clap(long = "loci")]
    #[clap(help = "BED file with microsatellite coordinates, to list loci without data")]
    #[clap(value_name = "LOCI")]
    #[arg(value_parser = check_file_exists)]
    pub loci_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "data-method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Method holding the length distributions in the length reports")]
    #[clap(default_value = "aln")]
    #[arg(value_parser = check_name_nonempty)]
    pub data_method: String,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-support")]
    #[clap(value_name = "MIN_SUPPORT")]
    #[clap(help = "Minimum number of reads or fragments for a reference locus to be kept")]
    #[clap(default_value = "200")]
    pub min_support: usize,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("classify")))]
#[command(arg_required_else_help(true))]
pub struct ClassifyArgs {
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "model")]
    #[clap(help = "Reference model report")]
    #[clap(value_name = "MODEL")]
    #[arg(value_parser = check_file_exists)]
    pub model_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'e')]
    #[clap(long = "evaluated")]
    #[clap(help = "Length reports of the samples to classify")]
    #[clap(value_name = "EVALUATED")]
    #[clap(num_args = 1..)]
    #[arg(value_parser = check_file_exists)]
    pub evaluated_paths: Vec<PathBuf>,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 'c')]
    #[clap(long = "classifier")]
    #[clap(value_name = "CLASSIFIER")]
    #[clap(help = "Locus classification policy (peaks or slippage)")]
    #[clap(default_value = "peaks")]
    pub classifier: ClassifierKind,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "output-baselines")]
    #[clap(help = "Also write the per-locus baselines")]
    pub output_baselines: bool,

    #[clap(help_heading("Methods"))]
    #[clap(long = "data-method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Method holding the length distributions of the evaluated samples")]
    #[clap(default_value = "aln")]
    #[arg(value_parser = check_name_nonempty)]
    pub data_method: String,

    #[clap(help_heading("Methods"))]
    #[clap(long = "status-method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Method under which calls are stored [default: mSINGSLike or SlippageLike]")]
    #[arg(value_parser = check_name_nonempty)]
    pub status_method: Option<String>,

    #[clap(help_heading("Methods"))]
    #[clap(long = "model-method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Method holding the known statuses in the model")]
    #[clap(default_value = "model")]
    #[arg(value_parser = check_name_nonempty)]
    pub model_method: String,

    #[clap(help_heading("Locus classification"))]
    #[clap(long = "min-depth")]
    #[clap(value_name = "MIN_DEPTH")]
    #[clap(help = "Minimum number of reads or fragments to classify a locus [default: 150 for peaks, 60 for slippage]")]
    pub min_depth: Option<usize>,

    #[clap(help_heading("Locus classification"))]
    #[clap(long = "peak-height-cutoff")]
    #[clap(value_name = "CUTOFF")]
    #[clap(help = "Minimum peak height as a fraction of the highest peak")]
    #[clap(default_value = "0.05")]
    #[arg(value_parser = ensure_unit_float)]
    pub peak_height_cutoff: f64,

    #[clap(help_heading("Locus classification"))]
    #[clap(long = "std-dev-rate")]
    #[clap(value_name = "RATE")]
    #[clap(help = "Number of baseline standard deviations tolerated above the baseline mean")]
    #[clap(default_value = "2.0")]
    #[arg(value_parser = ensure_non_negative_float)]
    pub std_dev_rate: f64,

    #[clap(help_heading("Locus classification"))]
    #[clap(long = "threshold-quantile")]
    #[clap(value_name = "QUANTILE")]
    #[clap(help = "Quantile of the stable reference scores used as slippage threshold")]
    #[clap(default_value = "0.95")]
    #[arg(value_parser = ensure_unit_float)]
    pub threshold_quantile: f64,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "consensus-method")]
    #[clap(value_name = "METHOD")]
    #[clap(help = "Sample consensus rule (count, ratio or majority)")]
    #[clap(default_value = "ratio")]
    pub consensus_method: ConsensusMethod,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "min-voting-loci")]
    #[clap(value_name = "N")]
    #[clap(help = "Minimum number of stable or unstable loci to call a sample [default: 3]")]
    #[clap(conflicts_with = "min_voting_ratio")]
    pub min_voting_loci: Option<usize>,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "min-voting-ratio")]
    #[clap(value_name = "RATIO")]
    #[clap(help = "Minimum fraction of stable or unstable loci to call a sample")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_voting_ratio: Option<f64>,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "instability-count")]
    #[clap(value_name = "N")]
    #[clap(help = "Number of unstable loci making a sample unstable, with the count method [default: 3]")]
    pub instability_count: Option<usize>,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "instability-ratio")]
    #[clap(value_name = "RATIO")]
    #[clap(help = "Fraction of unstable loci making a sample unstable, with the ratio method [default: 0.2]")]
    #[arg(value_parser = ensure_unit_float)]
    pub instability_ratio: Option<f64>,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "undetermined-weight")]
    #[clap(value_name = "WEIGHT")]
    #[clap(help = "Weight of undetermined loci in the sample score")]
    #[clap(default_value = "0.0")]
    #[arg(value_parser = ensure_non_negative_float)]
    pub undetermined_weight: f64,

    #[clap(help_heading("Sample consensus"))]
    #[clap(long = "locus-weight-is-score")]
    #[clap(help = "Weight each locus by its score in the sample score")]
    pub locus_weight_is_score: bool,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn check_name_nonempty(s: &str) -> Result<String> {
    if s.trim().is_empty() {
        Err("Name cannot be an empty string".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn ensure_non_negative_float(s: &str) -> Result<f64> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("The value must be non-negative, got: {}", value))
    }
}
