use crate::utils::Result;
use rust_htslib::bam::{self, Read};
use std::{collections::HashSet, path::Path};

pub fn get_bam_header(bam_path: &Path) -> Result<bam::Header> {
    let bam = bam::IndexedReader::from_path(bam_path)
        .map_err(|e| format!("Failed to create bam reader: {}", e))?;
    Ok(bam::Header::from_template(bam.header()))
}

pub fn is_bam_mapped(bam_header: &bam::Header) -> bool {
    // Fetching by region needs the SQ lines of a mapped, indexed BAM
    String::from_utf8_lossy(&bam_header.to_bytes())
        .lines()
        .any(|line| line.starts_with("@SQ"))
}

/// Picks the sample name from the read groups, falling back to the file name up to its first dot.
pub fn get_sample_name(reads_path: &Path, bam_header: &bam::Header) -> Result<String> {
    let header_hashmap = bam_header.to_hashmap();
    let mut sample_names = HashSet::new();

    if let Some(rg_fields) = header_hashmap.get("RG") {
        for rg_field in rg_fields {
            if let Some(sample_name) = rg_field.get("SM") {
                sample_names.insert(sample_name.to_owned());
            }
        }
    }

    if sample_names.len() == 1 {
        if let Some(sample_name) = sample_names.into_iter().next() {
            return Ok(sample_name);
        }
    } else if sample_names.is_empty() {
        log::warn!("No sample names found");
    } else {
        log::warn!("Multiple sample names found");
    }

    sample_name_from_path(reads_path)
}

fn sample_name_from_path(reads_path: &Path) -> Result<String> {
    reads_path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .ok_or_else(|| format!("Invalid reads file name: {}", reads_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_name_from_path_strips_all_extensions() {
        let name = sample_name_from_path(Path::new("/data/H2291-1_S15.sorted.bam")).unwrap();
        assert_eq!(name, "H2291-1_S15");
    }

    #[test]
    fn sample_name_from_hidden_file_err() {
        assert!(sample_name_from_path(Path::new("/data/.bam")).is_err());
    }
}
