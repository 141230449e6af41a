//! Query sequence preparation.
//!
//! Sequences arrive as pasted text, optionally with a single FASTA header line and
//! arbitrary line wrapping. Everything downstream works on a flat byte slice.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SequenceError {
    #[error("Query sequence is empty")]
    Empty,

    #[error("Fragment size must be greater than zero")]
    ZeroFragmentSize,
}

/// Strip a leading `>` header line and all line breaks.
///
/// Only the first line is treated as a header; later `>` lines are kept as
/// sequence characters.
#[must_use]
pub fn clean_sequence(raw: &str) -> String {
    let body = if raw.starts_with('>') {
        match raw.find(['\n', '\r']) {
            Some(end) => &raw[end..],
            None => "",
        }
    } else {
        raw
    };

    body.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// Complement of a single uppercase base. Other bytes are returned unchanged.
#[inline]
#[must_use]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        other => other,
    }
}

/// Reverse complement of an uppercase sequence.
///
/// Non-ACGT bytes (N, ambiguity codes, lowercase) keep their position in the
/// reversed sequence without being complemented.
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Split a sequence into non-overlapping fragments of `fragment_size` bases.
///
/// Only whole fragments are returned; a trailing remainder shorter than
/// `fragment_size` is dropped.
///
/// # Errors
///
/// Returns `SequenceError::ZeroFragmentSize` if `fragment_size` is zero.
pub fn fragments(seq: &[u8], fragment_size: usize) -> Result<Vec<&[u8]>, SequenceError> {
    if fragment_size == 0 {
        return Err(SequenceError::ZeroFragmentSize);
    }
    Ok(seq.chunks_exact(fragment_size).collect())
}

/// Uppercase a cleaned sequence, rejecting empty input.
///
/// # Errors
///
/// Returns `SequenceError::Empty` if there is nothing left to search.
pub fn normalize(seq: &str) -> Result<Vec<u8>, SequenceError> {
    if seq.is_empty() {
        return Err(SequenceError::Empty);
    }
    Ok(seq.bytes().map(|b| b.to_ascii_uppercase()).collect())
}
