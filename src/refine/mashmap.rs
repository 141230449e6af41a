//! MashMap as a [`SequenceAligner`].
//!
//! Output lines are whitespace-separated:
//! `query qlen qstart qend strand ref rlen rstart rend identity`. PAF-style
//! output from newer releases carries identity as an `id:f:` tag instead.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::refine::{AlignmentHit, RefineError, SequenceAligner, Strand};

pub const DEFAULT_PROGRAM: &str = "mashmap";

#[derive(Debug, Clone)]
pub struct MashmapAligner {
    program: PathBuf,
    threads: usize,
    segment_length: Option<u64>,
    percent_identity: Option<f64>,
}

impl Default for MashmapAligner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl MashmapAligner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            threads: 1,
            segment_length: None,
            percent_identity: None,
        }
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Minimum mapped segment length (`-s`)
    #[must_use]
    pub fn with_segment_length(mut self, length: u64) -> Self {
        self.segment_length = Some(length);
        self
    }

    /// Minimum percent identity (`--pi`)
    #[must_use]
    pub fn with_percent_identity(mut self, identity: f64) -> Self {
        self.percent_identity = Some(identity);
        self
    }

    fn command(&self, reference: &Path, query: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-r")
            .arg(reference)
            .arg("-q")
            .arg(query)
            .arg("-o")
            .arg(output)
            .arg("-t")
            .arg(self.threads.to_string());
        if let Some(length) = self.segment_length {
            command.arg("-s").arg(length.to_string());
        }
        if let Some(identity) = self.percent_identity {
            command.arg("--pi").arg(identity.to_string());
        }
        command
    }
}

fn write_fasta(path: &Path, name: &str, sequence: &[u8]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, ">{name}")?;
    for line in sequence.chunks(80) {
        file.write_all(line)?;
        file.write_all(b"\n")?;
    }
    file.flush()
}

impl SequenceAligner for MashmapAligner {
    fn align(&self, reference: &[u8], query: &[u8]) -> Result<Vec<AlignmentHit>, RefineError> {
        let workdir = tempfile::tempdir()?;
        let ref_path = workdir.path().join("ref.fa");
        let query_path = workdir.path().join("query.fa");
        let out_path = workdir.path().join("mashmap.out");
        write_fasta(&ref_path, "ref", reference)?;
        write_fasta(&query_path, "query", query)?;

        tracing::debug!(
            "running {} on {} bp reference, {} bp query",
            self.program.display(),
            reference.len(),
            query.len()
        );
        let output = self.command(&ref_path, &query_path, &out_path).output()?;
        if !output.status.success() {
            return Err(RefineError::AlignerFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = std::fs::read_to_string(&out_path)?;
        parse_mashmap_output(&text)
    }
}

fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    idx: usize,
    line: usize,
    what: &str,
) -> Result<T, RefineError> {
    fields[idx]
        .parse()
        .map_err(|_| RefineError::MalformedOutput {
            line,
            reason: format!("invalid {what} '{}'", fields[idx]),
        })
}

/// Parse MashMap output into hits; blank lines are skipped.
///
/// # Errors
///
/// Returns `RefineError::MalformedOutput` for lines with too few columns,
/// unparseable numbers or a missing identity.
pub fn parse_mashmap_output(text: &str) -> Result<Vec<AlignmentHit>, RefineError> {
    let mut hits = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 10 {
            return Err(RefineError::MalformedOutput {
                line,
                reason: format!("expected at least 10 columns, found {}", fields.len()),
            });
        }

        let strand = match fields[4] {
            "+" => Strand::Forward,
            "-" => Strand::Reverse,
            other => {
                return Err(RefineError::MalformedOutput {
                    line,
                    reason: format!("invalid strand '{other}'"),
                })
            }
        };

        let tagged = fields
            .iter()
            .find_map(|f| f.strip_prefix("id:f:"))
            .and_then(|v| v.parse::<f64>().ok())
            .map(|fraction| fraction * 100.0);
        let identity = match tagged {
            Some(identity) => identity,
            None => parse_field(&fields, 9, line, "identity")?,
        };

        hits.push(AlignmentHit {
            query_name: fields[0].to_string(),
            query_length: parse_field(&fields, 1, line, "query length")?,
            query_start: parse_field(&fields, 2, line, "query start")?,
            query_end: parse_field(&fields, 3, line, "query end")?,
            strand,
            ref_name: fields[5].to_string(),
            ref_length: parse_field(&fields, 6, line, "reference length")?,
            ref_start: parse_field(&fields, 7, line, "reference start")?,
            ref_end: parse_field(&fields, 8, line, "reference end")?,
            identity,
        });
    }

    Ok(hits)
}
