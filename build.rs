use std::path::Path;

const CATALOG_PATH: &str = "catalogs/default_indexes.json";
const WORD_BITS: u64 = 16;
const SUPPORTED_BLOOM_HASH: &str = "murmur3_decimal";

fn main() {
    let catalog_path = Path::new(CATALOG_PATH);
    validate_catalog_file(catalog_path);
    set_build_dependencies();
}

fn validate_catalog_file(catalog_path: &Path) {
    // Ensure catalog exists at build time
    assert!(
        catalog_path.exists(),
        "\n\nCATALOG BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the catalog file before building.\n",
        catalog_path.display()
    );

    let catalog_contents = std::fs::read_to_string(catalog_path).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            catalog_path.display()
        );
    });

    let catalog: serde_json::Value = serde_json::from_str(&catalog_contents).unwrap_or_else(|e| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            catalog_path.display()
        );
    });

    validate_catalog_structure(&catalog);
}

fn validate_catalog_structure(catalog: &serde_json::Value) {
    assert!(
        catalog.is_object(),
        "\n\nCATALOG BUILD ERROR: Root must be a JSON object\n\
         Got: {catalog}\n"
    );

    let indexes = catalog.get("indexes").unwrap_or_else(|| {
        panic!(
            "\n\nCATALOG BUILD ERROR: Missing 'indexes' field\n\
             The catalog must have a top-level 'indexes' array.\n"
        );
    });

    let entries = indexes.as_array().unwrap_or_else(|| {
        panic!(
            "\n\nCATALOG BUILD ERROR: 'indexes' must be an array\n\
             Got: {indexes}\n"
        );
    });

    for (i, entry) in entries.iter().enumerate() {
        validate_entry(entry, i);
    }

    println!("cargo:warning=Validated catalog: {} indexes", entries.len());
}

fn validate_entry(entry: &serde_json::Value, index: usize) {
    let name = entry
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>");

    for field in ["name", "display_name", "path"] {
        assert!(
            entry.get(field).and_then(serde_json::Value::as_str).is_some(),
            "\n\nCATALOG BUILD ERROR: Index '{name}' (index {index}) missing '{field}' field\n"
        );
    }

    // Raw indexes carry no header, so the catalog must give the column count
    let is_raw = entry.get("format").and_then(|v| v.as_str()) == Some("raw");
    let num_cols = entry.get("num_cols").and_then(serde_json::Value::as_u64);
    if is_raw {
        assert!(
            num_cols.is_some(),
            "\n\nCATALOG BUILD ERROR: Raw index '{name}' missing 'num_cols' field\n"
        );
    }
    let bloom_hash = entry.get("bloom_hash").and_then(|v| v.as_str());
    if is_raw {
        assert!(
            bloom_hash.is_some(),
            "\n\nCATALOG BUILD ERROR: Raw index '{name}' missing 'bloom_hash' field\n\
             Raw payloads can only be searched if their rows were filled with '{SUPPORTED_BLOOM_HASH}'.\n"
        );
    }
    if let Some(hash) = bloom_hash {
        assert!(
            hash == SUPPORTED_BLOOM_HASH,
            "\n\nCATALOG BUILD ERROR: Index '{name}' uses Bloom hash '{hash}'\n\
             Only '{SUPPORTED_BLOOM_HASH}' indexes can be searched.\n"
        );
    }
    if let Some(cols) = num_cols {
        assert!(
            cols > 0 && cols % WORD_BITS == 0,
            "\n\nCATALOG BUILD ERROR: Index '{name}' has num_cols {cols}\n\
             Column counts must be a positive multiple of {WORD_BITS}.\n"
        );
    }
}

fn set_build_dependencies() {
    // Tell cargo to rerun if catalog changes
    println!("cargo:rerun-if-changed={CATALOG_PATH}");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
