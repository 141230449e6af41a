//! Input file parsers.
//!
//! - **FASTA**: reference sequences for index construction and query files,
//!   plain or gzip/bgzip compressed
//!
//! ## Example
//!
//! ```rust,no_run
//! use flashmap::parsing::fasta::read_fasta_file;
//! use std::path::Path;
//!
//! let records = read_fasta_file(Path::new("reference.fa.gz")).unwrap();
//! for record in &records {
//!     println!("{}\t{}", record.name, record.sequence.len());
//! }
//! ```

pub mod fasta;
