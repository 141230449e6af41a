use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::types::IndexName;
use crate::index::IndexError;
use crate::sketch::bloom::BloomHash;
use crate::sketch::minimizer::MinimizerParams;

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// On-disk layout of an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexFormat {
    /// Header + payload written by `flashmap index build`
    #[default]
    Framed,
    /// Bare 16-bit word array; needs `num_cols` and `bloom_hash` in the entry
    Raw,
}

/// One searchable index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: IndexName,
    pub display_name: String,

    /// Local path or `http(s)://` URL of the index file
    pub path: String,

    #[serde(default)]
    pub format: IndexFormat,

    /// Column count, required for raw indexes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cols: Option<usize>,

    /// Expected Bloom filter size; checked against the loaded index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_filter_size: Option<usize>,

    /// Local path or URL of the bucket map JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_map: Option<String>,

    /// Minimizer parameters for raw indexes (framed indexes carry their own)
    #[serde(default)]
    pub minimizer: MinimizerParams,

    /// How rows were filled; required for raw indexes, checked against the
    /// header of framed ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bloom_hash: Option<BloomHash>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_query_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_query_length: Option<usize>,
}

impl IndexEntry {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: IndexName::new(name),
            display_name: display_name.into(),
            path: path.into(),
            format: IndexFormat::Framed,
            num_cols: None,
            bloom_filter_size: None,
            bucket_map: None,
            minimizer: MinimizerParams::default(),
            bloom_hash: None,
            min_query_length: None,
            max_query_length: None,
        }
    }
}

/// Where an index (or bucket map) lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    Remote(String),
    Local(PathBuf),
}

impl std::fmt::Display for IndexLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Serializable catalog format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: String,
    pub created_at: String,
    pub indexes: Vec<IndexEntry>,
}

/// The set of indexes a search can target
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    pub indexes: Vec<IndexEntry>,

    /// Index: name -> position in indexes vec
    name_to_index: HashMap<IndexName, usize>,

    /// Directory relative paths resolve against
    base_dir: Option<PathBuf>,
}

impl IndexCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the embedded default catalog
    pub fn load_embedded() -> Result<Self, IndexError> {
        // Embedded at compile time via build.rs
        const EMBEDDED_CATALOG: &str = include_str!("../../catalogs/default_indexes.json");
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load catalog from a JSON file; relative index paths resolve against
    /// the file's directory
    pub fn load_from_file(path: &Path) -> Result<Self, IndexError> {
        let content = std::fs::read_to_string(path)?;
        let mut catalog = Self::from_json(&content)?;
        catalog.base_dir = path.parent().map(Path::to_path_buf);
        Ok(catalog)
    }

    /// Parse catalog from JSON string
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let data: CatalogData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                "Catalog version mismatch (expected {}, found {})",
                CATALOG_VERSION,
                data.version
            );
        }

        let mut catalog = Self::new();
        for entry in data.indexes {
            catalog.add_index(entry);
        }
        Ok(catalog)
    }

    /// Add an index; a later entry with the same name replaces the earlier one
    pub fn add_index(&mut self, entry: IndexEntry) {
        if let Some(&existing) = self.name_to_index.get(&entry.name) {
            tracing::warn!("Replacing duplicate catalog entry '{}'", entry.name);
            self.indexes[existing] = entry;
            return;
        }
        self.name_to_index
            .insert(entry.name.clone(), self.indexes.len());
        self.indexes.push(entry);
    }

    /// Get an index by name
    pub fn get(&self, name: &IndexName) -> Option<&IndexEntry> {
        self.name_to_index.get(name).map(|&idx| &self.indexes[idx])
    }

    /// Get an index by name or fail with `IndexError::NotFound`
    pub fn require(&self, name: &IndexName) -> Result<&IndexEntry, IndexError> {
        self.get(name)
            .ok_or_else(|| IndexError::NotFound(name.to_string()))
    }

    /// Resolve a catalog path (index or bucket map) to a location
    pub fn resolve(&self, path: &str) -> IndexLocation {
        if path.starts_with("http://") || path.starts_with("https://") {
            return IndexLocation::Remote(path.to_string());
        }
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => IndexLocation::Local(base.join(path)),
            _ => IndexLocation::Local(path.to_path_buf()),
        }
    }

    /// Export catalog to JSON
    pub fn to_json(&self) -> Result<String, IndexError> {
        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            indexes: self.indexes.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of indexes in catalog
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_catalog() {
        let catalog = IndexCatalog::load_embedded().unwrap();
        assert!(!catalog.is_empty());

        let hg38 = catalog.get(&IndexName::new("hg38")).unwrap();
        assert_eq!(hg38.format, IndexFormat::Framed);
        assert_eq!(hg38.minimizer, MinimizerParams::default());
        assert!(matches!(
            catalog.resolve(&hg38.path),
            IndexLocation::Remote(_)
        ));
    }

    #[test]
    fn test_unknown_index() {
        let catalog = IndexCatalog::load_embedded().unwrap();
        assert!(catalog.get(&IndexName::new("mm39")).is_none());
        let err = catalog.require(&IndexName::new("mm39")).unwrap_err();
        assert!(matches!(err, IndexError::NotFound(name) if name == "mm39"));
    }

    #[test]
    fn test_relative_paths_resolve_against_catalog_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = IndexCatalog::new();
        catalog.add_index(IndexEntry::new("demo", "Demo", "demo.fmi"));
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, catalog.to_json().unwrap()).unwrap();

        let loaded = IndexCatalog::load_from_file(&path).unwrap();
        assert_eq!(
            loaded.resolve("demo.fmi"),
            IndexLocation::Local(dir.path().join("demo.fmi"))
        );
        assert_eq!(
            loaded.resolve("/data/abs.fmi"),
            IndexLocation::Local(PathBuf::from("/data/abs.fmi"))
        );
    }

    #[test]
    fn test_duplicate_name_replaces() {
        let mut catalog = IndexCatalog::new();
        catalog.add_index(IndexEntry::new("demo", "First", "a.fmi"));
        catalog.add_index(IndexEntry::new("demo", "Second", "b.fmi"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get(&IndexName::new("demo")).unwrap().display_name,
            "Second"
        );
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "version": "1.0.0",
            "created_at": "2024-01-01T00:00:00Z",
            "indexes": [{"name": "x", "display_name": "X", "path": "x.fmi"}]
        }"#;
        let catalog = IndexCatalog::from_json(json).unwrap();
        let entry = &catalog.indexes[0];
        assert_eq!(entry.format, IndexFormat::Framed);
        assert_eq!(entry.num_cols, None);
        assert_eq!(entry.bucket_map, None);
        assert_eq!(entry.bloom_hash, None);
    }

    #[test]
    fn test_embedded_raw_entries_declare_bloom_hash() {
        let catalog = IndexCatalog::load_embedded().unwrap();
        for entry in catalog.indexes.iter().filter(|e| e.format == IndexFormat::Raw) {
            assert_eq!(entry.bloom_hash, Some(BloomHash::Murmur3Decimal), "{}", entry.name);
        }
    }

    #[test]
    fn test_foreign_bloom_hash_parses_as_unsupported() {
        let json = r#"{
            "version": "1.0.0",
            "created_at": "2024-01-01T00:00:00Z",
            "indexes": [{
                "name": "legacy", "display_name": "Legacy", "path": "legacy.bin",
                "format": "raw", "num_cols": 384, "bloom_hash": "xxhash64_double"
            }]
        }"#;
        let catalog = IndexCatalog::from_json(json).unwrap();
        assert_eq!(catalog.indexes[0].bloom_hash, Some(BloomHash::Unsupported));
    }
}
