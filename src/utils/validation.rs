//! Centralized validation and helper functions.

use crate::core::types::QueryMode;

/// Shortest query accepted in containment mode
pub const MIN_QUERY_LENGTH: usize = 5_000;

/// Longest query accepted in any mode
pub const MAX_QUERY_LENGTH: usize = 300_000;

/// Maximum number of FASTA records read from one file (DOS protection)
pub const MAX_FASTA_RECORDS: usize = 100_000;

/// Security-related constants for input validation
pub const MAX_INDEX_NAME_LENGTH: usize = 128;

/// A length in base pairs, displayed as `5kbp` / `500bp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasePairs(pub usize);

impl std::fmt::Display for BasePairs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 > 0 && self.0 % 1_000 == 0 {
            write!(f, "{}kbp", self.0 / 1_000)
        } else {
            write!(f, "{}bp", self.0)
        }
    }
}

/// Request validation error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Query length must be between {min} and {max} (got {len} bp)")]
    QueryLength {
        len: usize,
        min: BasePairs,
        max: BasePairs,
    },
    #[error("Empty index name provided")]
    EmptyIndexName,
    #[error("Index name too long: exceeds {MAX_INDEX_NAME_LENGTH} characters")]
    IndexNameTooLong,
    #[error("Invalid index name: only letters, digits, '.', '-' and '_' are allowed")]
    InvalidIndexName,
    #[error("Fragment size must be greater than zero")]
    ZeroFragmentSize,
    #[error("Substitution rate must be in [0, 1), got {0}")]
    SubstitutionRate(f64),
}

/// Accepted query lengths for one search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPolicy {
    pub min: usize,
    pub max: usize,
}

impl Default for LengthPolicy {
    fn default() -> Self {
        Self {
            min: MIN_QUERY_LENGTH,
            max: MAX_QUERY_LENGTH,
        }
    }
}

impl LengthPolicy {
    /// Policy for a query mode, with optional per-index overrides.
    ///
    /// Fragment-vote queries need at least one whole fragment; the containment
    /// minimum does not apply to them.
    #[must_use]
    pub fn for_mode(mode: QueryMode, min_override: Option<usize>, max_override: Option<usize>) -> Self {
        let max = max_override.unwrap_or(MAX_QUERY_LENGTH);
        let min = match mode {
            QueryMode::Containment => min_override.unwrap_or(MIN_QUERY_LENGTH),
            QueryMode::FragmentVote { fragment_size } => fragment_size,
        };
        Self { min, max }
    }

    /// # Errors
    ///
    /// Returns `ValidationError::QueryLength` if `len` is outside `[min, max]`.
    pub fn check(&self, len: usize) -> Result<(), ValidationError> {
        if len < self.min || len > self.max {
            return Err(ValidationError::QueryLength {
                len,
                min: BasePairs(self.min),
                max: BasePairs(self.max),
            });
        }
        Ok(())
    }
}

/// Validate an index name received from a client.
///
/// # Errors
///
/// Returns `ValidationError::EmptyIndexName` if the name is blank,
/// `ValidationError::IndexNameTooLong` if it exceeds the limit, or
/// `ValidationError::InvalidIndexName` if it contains anything beyond
/// letters, digits, `.`, `-` and `_` (including path traversal).
pub fn validate_index_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyIndexName);
    }
    if name.len() > MAX_INDEX_NAME_LENGTH {
        return Err(ValidationError::IndexNameTooLong);
    }
    if name.contains("..")
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidIndexName);
    }
    Ok(())
}

/// Validate the expected substitution rate of a query.
///
/// # Errors
///
/// Returns `ValidationError::SubstitutionRate` unless `0 <= rate < 1`.
pub fn validate_substitution_rate(rate: f64) -> Result<f64, ValidationError> {
    if rate.is_finite() && (0.0..1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ValidationError::SubstitutionRate(rate))
    }
}

/// Check if adding another FASTA record would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new record.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_record_limit(count: usize) -> Option<String> {
    if count >= MAX_FASTA_RECORDS {
        Some(format!(
            "Too many FASTA records: adding another would exceed maximum of {MAX_FASTA_RECORDS}"
        ))
    } else {
        None
    }
}
