//! Query sketching: minimizer extraction and Bloom membership encoding.
//!
//! A query is reduced to its (w, k)-minimizers, which are then inserted into a
//! single-hash Bloom filter whose size matches the index it will be compared
//! against. The set bits of that filter select the index rows to read.
//!
//! ```rust
//! use flashmap::sketch::bloom::MembershipFilter;
//! use flashmap::sketch::minimizer::{extract_minimizers, MinimizerParams};
//!
//! let seq = b"ACGTTGCAAGGCTTACGGATCCATGA".repeat(8);
//! let minimizers = extract_minimizers(&seq, &MinimizerParams::default());
//! let filter = MembershipFilter::from_minimizers(&minimizers, 1_000).unwrap();
//! assert!(filter.count_ones() <= minimizers.len());
//! ```

pub mod bloom;
pub mod minimizer;
