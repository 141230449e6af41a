//! Core data types for sequence search.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`sequence`]: Query sequence cleanup, reverse complement and fragmenting
//! - [`types`]: Index names, query modes, buckets and per-bucket hit records
//!
//! ## Strandedness
//!
//! Every minimizer is canonical: the smaller of the forward and reverse-complement
//! k-mer hashes. A query and its reverse complement therefore sketch to the same
//! set of minimizers and hit the same buckets.

pub mod sequence;
pub mod types;
