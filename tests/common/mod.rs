//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use flashmap::index::builder::{build_index, BuildOptions};
use flashmap::index::store::IndexCatalog;
use flashmap::parsing::fasta::SequenceRecord;
use tempfile::TempDir;

/// Deterministic pseudo-random DNA
pub fn lcg_sequence(len: usize, mut state: u64) -> Vec<u8> {
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            b"ACGT"[((state >> 33) & 3) as usize]
        })
        .collect()
}

pub fn text(seq: &[u8]) -> String {
    String::from_utf8(seq.to_vec()).unwrap()
}

pub struct Fixture {
    pub dir: TempDir,
    pub catalog_path: PathBuf,
    pub chr1: Vec<u8>,
}

impl Fixture {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn catalog(&self) -> IndexCatalog {
        IndexCatalog::load_from_file(&self.catalog_path).unwrap()
    }
}

pub fn records() -> Vec<SequenceRecord> {
    vec![
        SequenceRecord {
            name: "chr1".to_string(),
            sequence: lcg_sequence(60_000, 101),
        },
        SequenceRecord {
            name: "chr2".to_string(),
            sequence: lcg_sequence(40_000, 202),
        },
    ]
}

/// chr1 (60 kbp) and chr2 (40 kbp) in 20 kbp buckets, written as index "demo"
/// with its bucket map and a catalog file in a temporary directory
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let records = records();
    let options = BuildOptions {
        bucket_size: 20_000,
        filter_size: Some(20_000),
        ..BuildOptions::default()
    };
    let built = build_index(&records, &options).unwrap();
    built
        .write(
            &dir.path().join("demo.fmi"),
            Some(&dir.path().join("demo.buckets.json")),
        )
        .unwrap();

    let mut catalog = IndexCatalog::new();
    catalog.add_index(built.catalog_entry(
        "demo",
        "Demo reference",
        "demo.fmi",
        Some("demo.buckets.json"),
    ));
    let catalog_path = dir.path().join("indexes.json");
    std::fs::write(&catalog_path, catalog.to_json().unwrap()).unwrap();

    Fixture {
        dir,
        catalog_path,
        chr1: records[0].sequence.clone(),
    }
}

/// Write the fixture reference as a FASTA file
pub fn write_reference_fasta(path: &std::path::Path) {
    let mut out = String::new();
    for record in records() {
        out.push('>');
        out.push_str(&record.name);
        out.push('\n');
        for line in record.sequence.chunks(80) {
            out.push_str(std::str::from_utf8(line).unwrap());
            out.push('\n');
        }
    }
    std::fs::write(path, out).unwrap();
}
