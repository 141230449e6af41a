//! FASTA reading using noodles.
//!
//! Reads whole records (name + sequence) for index construction and query input.
//! Supports both uncompressed and gzip/bgzip compressed files.
//!
//! Supported extensions:
//! - `.fa`, `.fasta`, `.fna` (uncompressed)
//! - `.fa.gz`, `.fasta.gz`, `.fna.gz` (gzip compressed)
//! - `.fa.bgz`, `.fasta.bgz`, `.fna.bgz` (bgzip compressed)

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::fasta;
use thiserror::Error;

use crate::core::sequence::clean_sequence;
use crate::utils::validation::check_record_limit;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FASTA: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Too many FASTA records: {0} exceeds maximum allowed")]
    TooManyRecords(usize),
}

/// One named sequence from a FASTA file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: Vec<u8>,
}

/// Check if the path has a FASTA extension
pub fn is_fasta_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();

    // Check for gzipped FASTA
    if path_str.ends_with(".fa.gz")
        || path_str.ends_with(".fasta.gz")
        || path_str.ends_with(".fna.gz")
        || path_str.ends_with(".fa.bgz")
        || path_str.ends_with(".fasta.bgz")
        || path_str.ends_with(".fna.bgz")
    {
        return true;
    }

    // Check for uncompressed FASTA
    matches!(
        path.extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase)
            .as_deref(),
        Some("fa" | "fasta" | "fna")
    )
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

fn open(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let file = std::fs::File::open(path)?;
    if is_gzipped(path) {
        // bgzip is a series of gzip members
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read every record of a FASTA file.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if
/// parsing fails, `ParseError::InvalidFormat` if no records are found, or
/// `ParseError::TooManyRecords` if the limit is exceeded.
pub fn read_fasta_file(path: &Path) -> Result<Vec<SequenceRecord>, ParseError> {
    read_fasta(open(path)?)
}

/// Read every record from a FASTA stream
///
/// # Errors
///
/// See [`read_fasta_file`].
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<SequenceRecord>, ParseError> {
    let mut fasta_reader = fasta::io::Reader::new(reader);
    let mut records = Vec::new();

    for result in fasta_reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        // Check record limit for DOS protection
        if check_record_limit(records.len()).is_some() {
            return Err(ParseError::TooManyRecords(records.len()));
        }

        records.push(SequenceRecord {
            name: String::from_utf8_lossy(record.name()).to_string(),
            sequence: record.sequence().as_ref().to_vec(),
        });
    }

    if records.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No sequences found in FASTA file".to_string(),
        ));
    }

    Ok(records)
}

/// Load a query sequence from a file.
///
/// FASTA files contribute their first record; anything else is read as plain
/// sequence text with an optional leading header line.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_query_file(path: &Path) -> Result<String, ParseError> {
    if is_fasta_file(path) {
        let mut records = read_fasta_file(path)?;
        if records.len() > 1 {
            tracing::warn!(
                "{} has {} records; searching only '{}'",
                path.display(),
                records.len(),
                records[0].name
            );
        }
        let first = records.swap_remove(0);
        return Ok(String::from_utf8_lossy(&first.sequence).into_owned());
    }

    let mut text = String::new();
    open(path)?.read_to_string(&mut text)?;
    Ok(clean_sequence(text.trim()))
}
