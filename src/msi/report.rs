//! JSON reports: a list of samples with their method-keyed results.

use super::result::Sample;
use crate::utils::{open_text_reader, Result};
use serde::Serialize;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub fn read_report(path: &Path) -> Result<Vec<Sample>> {
    let reader = open_text_reader(path)?;
    let samples: Vec<Sample> = serde_json::from_reader(reader)
        .map_err(|e| format!("Invalid report {}: {}", path.display(), e))?;
    log::debug!("Read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Reads several reports; sample names must be unique across them.
pub fn read_reports(paths: &[PathBuf]) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = Vec::new();
    for path in paths {
        for sample in read_report(path)? {
            if samples.iter().any(|s| s.name == sample.name) {
                return Err(format!(
                    "Sample {} is present more than once ({})",
                    sample.name,
                    path.display()
                ));
            }
            samples.push(sample);
        }
    }
    Ok(samples)
}

pub fn write_report<W: Write>(writer: W, samples: &[Sample]) -> Result<()> {
    write_json(writer, samples)
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| format!("Failed to write JSON output: {}", e))?;
    writeln!(writer)
        .and_then(|_| writer.flush())
        .map_err(|e| format!("Failed to write JSON output: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msi::{
        locus::Locus,
        result::{LocusResult, SampleCall, Status},
    };
    use crate::utils::{open_output_file, GenomicRegion};

    fn sample(name: &str) -> Sample {
        let locus = Locus::new(GenomicRegion::new("chr2", 47414420, 47414446).unwrap(), "BAT26");
        let mut sample = Sample::new(name);
        let mut result = LocusResult::lengths([(26, 120), (25, 8)].into_iter().collect(), true);
        result.status = Status::Unstable;
        result.score = Some(0.5);
        sample.set_result(&locus, "aln", result);
        sample.results.insert(
            "calls".into(),
            SampleCall {
                status: Status::Unstable,
                score: Some(0.5),
            },
        );
        sample
    }

    #[test]
    fn report_written_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.report.json");
        let samples = vec![sample("S1"), sample("S2")];
        write_report(open_output_file(path.to_str().unwrap()).unwrap(), &samples).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"chr2:47414420-47414446\""));
        assert!(content.contains("\"MSI\""));
        assert_eq!(read_report(&path).unwrap(), samples);
    }

    #[test]
    fn report_with_plain_status_names_ok() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let content = r#"[{"name": "R1", "loci": {"chr1:10-30": {"name": "MS1", "results": {
            "model": {"status": "stable", "histogram": {"20": 150},
                      "evidence": {"kind": "lengths", "fragments": false}}}}}}]"#;
        std::fs::write(&path, content).unwrap();
        let samples = read_report(&path).unwrap();
        let region = GenomicRegion::new("chr1", 10, 30).unwrap();
        let result = samples[0].result(&region, "model").unwrap();
        assert_eq!(result.status, Status::Stable);
        assert_eq!(result.support(), 150);
        assert!(samples[0].results.is_empty());
    }

    #[test]
    fn read_reports_duplicate_sample_err() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        write_report(open_output_file(first.to_str().unwrap()).unwrap(), &[sample("S1")]).unwrap();
        write_report(open_output_file(second.to_str().unwrap()).unwrap(), &[sample("S1")]).unwrap();
        let err = read_reports(&[first, second]).unwrap_err();
        assert!(err.contains("S1"));
    }

    #[test]
    fn read_report_missing_file_err() {
        assert!(read_report(Path::new("/nonexistent/report.json")).is_err());
    }
}
