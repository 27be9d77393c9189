use crate::utils::{open_text_reader, GenomicRegion, Result};
use crossbeam_channel::Sender;
use std::{
    io::{BufRead, BufReader, Read as ioRead},
    path::Path,
};

/// A targeted microsatellite.
///
/// Identity is the interval alone: two loci with the same region are the same
/// locus whatever their names.
#[derive(Debug, Clone)]
pub struct Locus {
    pub region: GenomicRegion,
    pub name: String,
}

impl PartialEq for Locus {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region
    }
}

impl Eq for Locus {}

impl Locus {
    pub fn new(region: GenomicRegion, name: impl Into<String>) -> Self {
        Self {
            region,
            name: name.into(),
        }
    }

    /// Parses a BED line (`chrom start end [name ...]`); BED coordinates are kept as is.
    pub fn from_bed_line(line: &str) -> Result<Self> {
        const MIN_FIELD_COUNT: usize = 3;
        let split_line: Vec<&str> = line.split_whitespace().collect();
        if split_line.len() < MIN_FIELD_COUNT {
            return Err(format!(
                "Expected at least {} fields in the format 'chrom start end [name]', found {}: {}",
                MIN_FIELD_COUNT,
                split_line.len(),
                line
            ));
        }

        let parse_coord = |value: &str| {
            value
                .parse::<u32>()
                .map_err(|_| format!("Invalid coordinate '{}' in line: {}", value, line))
        };
        let region = GenomicRegion::new(
            split_line[0],
            parse_coord(split_line[1])?,
            parse_coord(split_line[2])?,
        )?;

        let name = match split_line.get(3) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => region.to_string(),
        };

        Ok(Locus { region, name })
    }

    pub fn id(&self) -> String {
        self.region.to_string()
    }
}

fn is_bed_content(line: &str) -> bool {
    let line = line.trim();
    !(line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser"))
}

pub fn get_loci(
    catalog_reader: BufReader<Box<dyn ioRead>>,
) -> impl Iterator<Item = Result<Locus>> {
    catalog_reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| is_bed_content(l)))
        .map(|(line_number, result_line)| {
            result_line
                .map_err(|e| format!("Error at BED line {}: {}", line_number + 1, e))
                .and_then(|line| {
                    Locus::from_bed_line(&line)
                        .map_err(|e| format!("Error at BED line {}: {}", line_number + 1, e))
                })
        })
}

pub fn load_loci(loci_path: &Path) -> Result<Vec<Locus>> {
    get_loci(open_text_reader(loci_path)?).collect()
}

pub fn stream_loci_into_channel(loci_path: &Path, sender: Sender<Result<Locus>>) -> Result<()> {
    let catalog_reader = open_text_reader(loci_path)?;
    for locus in get_loci(catalog_reader) {
        sender
            .send(locus)
            .map_err(|e| format!("Failed to send locus through channel: {}", e))?;
    }
    Ok(())
}
