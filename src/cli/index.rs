use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};

use crate::cli::{load_catalog, OutputFormat};
use crate::core::types::IndexName;
use crate::index::builder::{
    build_from_fasta, BuildOptions, DEFAULT_BUCKET_SIZE, DEFAULT_CONTAINMENT_THRESHOLD,
};
use crate::index::loader::{CancelToken, IndexLoader};
use crate::index::store::{IndexCatalog, IndexEntry};
use crate::sketch::minimizer::{MinimizerParams, DEFAULT_KMER_SIZE, DEFAULT_WINDOW_SIZE};
use crate::utils::validation::validate_index_name;

#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub command: IndexCommands,
}

#[derive(Subcommand)]
pub enum IndexCommands {
    /// Build an index from a FASTA file
    Build {
        /// Reference FASTA (optionally gzip compressed)
        #[arg(required = true)]
        input: PathBuf,

        /// Output index path (`.gz` suffix compresses)
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Index name for the catalog entry (defaults to the output file stem)
        #[arg(long)]
        name: Option<String>,

        /// Human-readable name
        #[arg(long)]
        display_name: Option<String>,

        /// Bases per bucket
        #[arg(long, default_value_t = DEFAULT_BUCKET_SIZE)]
        bucket_size: usize,

        /// Bases each bucket extends into the next
        #[arg(long, default_value = "0")]
        overlap: usize,

        /// Fixed Bloom filter size (computed when omitted)
        #[arg(long)]
        filter_size: Option<usize>,

        /// Containment level used to size the filter
        #[arg(long, default_value_t = DEFAULT_CONTAINMENT_THRESHOLD)]
        containment: f64,

        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: usize,

        #[arg(long, default_value_t = DEFAULT_KMER_SIZE)]
        kmer_size: usize,

        /// Bucket map output path (defaults to `<output>.buckets.json`)
        #[arg(long)]
        bucket_map: Option<PathBuf>,

        /// Catalog file to add the new index to (created if missing)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Overwrite existing output files
        #[arg(long)]
        force: bool,
    },

    /// List all indexes in the catalog
    List {
        /// Path to custom catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show details of an index
    Show {
        /// Index name
        #[arg(required = true)]
        name: String,

        /// Path to custom catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Load the index and report its header
        #[arg(long)]
        inspect: bool,
    },
}

/// Run the index command
///
/// # Errors
///
/// Returns an error if the catalog or index cannot be read or written.
pub fn run(args: IndexArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        IndexCommands::Build {
            input,
            output,
            name,
            display_name,
            bucket_size,
            overlap,
            filter_size,
            containment,
            window_size,
            kmer_size,
            bucket_map,
            catalog,
            force,
        } => {
            let options = BuildOptions {
                bucket_size,
                overlap,
                filter_size,
                containment_threshold: containment,
                params: MinimizerParams {
                    window_size,
                    kmer_size,
                    ..MinimizerParams::default()
                },
            };
            let outputs = BuildOutputs {
                index: output,
                bucket_map,
                catalog,
            };
            run_build(&input, &outputs, name, display_name, &options, force, format, verbose)
        }
        IndexCommands::List { catalog } => run_list(catalog.as_deref(), format, verbose),
        IndexCommands::Show {
            name,
            catalog,
            inspect,
        } => run_show(&name, catalog.as_deref(), inspect, format),
    }
}

struct BuildOutputs {
    index: PathBuf,
    bucket_map: Option<PathBuf>,
    catalog: Option<PathBuf>,
}

/// Path of `target` as written into a catalog at `catalog_path`
fn catalog_relative(target: &Path, catalog_path: &Path) -> String {
    let same_dir = match (target.parent(), catalog_path.parent()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    match target.file_name() {
        Some(file_name) if same_dir => file_name.to_string_lossy().into_owned(),
        _ => std::fs::canonicalize(target)
            .unwrap_or_else(|_| target.to_path_buf())
            .to_string_lossy()
            .into_owned(),
    }
}

#[allow(clippy::too_many_arguments)]
#[allow(clippy::fn_params_excessive_bools)]
fn run_build(
    input: &Path,
    outputs: &BuildOutputs,
    name: Option<String>,
    display_name: Option<String>,
    options: &BuildOptions,
    force: bool,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let bucket_map_path = outputs
        .bucket_map
        .clone()
        .unwrap_or_else(|| outputs.index.with_extension("buckets.json"));

    for path in [&outputs.index, &bucket_map_path] {
        if path.exists() && !force {
            anyhow::bail!(
                "Output file {} already exists. Use --force to overwrite.",
                path.display()
            );
        }
    }

    let name = name.unwrap_or_else(|| {
        outputs
            .index
            .file_stem()
            .map_or_else(|| "index".to_string(), |s| s.to_string_lossy().into_owned())
    });
    validate_index_name(&name)?;
    let display_name = display_name.unwrap_or_else(|| name.clone());

    if verbose {
        eprintln!("Building index '{name}' from {}", input.display());
    }
    let built = build_from_fasta(input, options)?;
    built.write(&outputs.index, Some(&bucket_map_path))?;

    let entry = match &outputs.catalog {
        Some(catalog_path) => {
            let entry = built.catalog_entry(
                &name,
                &display_name,
                &catalog_relative(&outputs.index, catalog_path),
                Some(&catalog_relative(&bucket_map_path, catalog_path)),
            );
            let mut catalog = if catalog_path.exists() {
                IndexCatalog::load_from_file(catalog_path)?
            } else {
                IndexCatalog::new()
            };
            catalog.add_index(entry.clone());
            std::fs::write(catalog_path, catalog.to_json()?)?;
            entry
        }
        None => built.catalog_entry(
            &name,
            &display_name,
            &outputs.index.to_string_lossy(),
            Some(&bucket_map_path.to_string_lossy()),
        ),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entry)?),
        OutputFormat::Text | OutputFormat::Tsv => {
            println!("Built index '{}'", entry.name);
            println!("  Buckets:           {}", built.num_buckets());
            println!("  Columns:           {}", built.index.num_cols());
            println!("  Bloom filter size: {}", built.index.num_rows());
            println!("  Max minimizers:    {}", built.max_bucket_minimizers);
            println!("  Index:             {}", outputs.index.display());
            println!("  Bucket map:        {}", bucket_map_path.display());
            if let Some(catalog_path) = &outputs.catalog {
                println!("  Catalog:           {}", catalog_path.display());
            }
        }
    }

    Ok(())
}

fn run_list(catalog_path: Option<&Path>, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path)?;

    if verbose {
        eprintln!("Loaded catalog with {} indexes", catalog.len());
    }

    match format {
        OutputFormat::Text => {
            // Calculate column widths dynamically
            let name_width = catalog
                .indexes
                .iter()
                .map(|e| e.name.0.len())
                .max()
                .unwrap_or(4)
                .max(4);
            let display_width = catalog
                .indexes
                .iter()
                .map(|e| e.display_name.len().min(40))
                .max()
                .unwrap_or(12)
                .max(12);

            println!("Index Catalog ({} indexes)\n", catalog.len());
            println!(
                "{:<name_w$} {:<disp_w$} {:>8} {:>10}",
                "Name",
                "Display name",
                "Columns",
                "Filter",
                name_w = name_width,
                disp_w = display_width
            );
            println!("{}", "-".repeat(name_width + display_width + 21));

            for entry in &catalog.indexes {
                println!(
                    "{:<name_w$} {:<disp_w$} {:>8} {:>10}",
                    entry.name.0,
                    truncate(&entry.display_name, display_width),
                    optional(entry.num_cols),
                    optional(entry.bloom_filter_size),
                    name_w = name_width,
                    disp_w = display_width
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&catalog.indexes)?);
        }
        OutputFormat::Tsv => {
            println!("name\tdisplay_name\tformat\tnum_cols\tbloom_filter_size\tpath");
            for entry in &catalog.indexes {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    entry.name,
                    entry.display_name,
                    format_name(entry),
                    optional(entry.num_cols),
                    optional(entry.bloom_filter_size),
                    entry.path
                );
            }
        }
    }

    Ok(())
}

fn run_show(
    name: &str,
    catalog_path: Option<&Path>,
    inspect: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog_path)?;
    let entry = catalog.require(&IndexName::new(name))?;

    let header = if inspect {
        let rt = tokio::runtime::Runtime::new()?;
        let index = rt.block_on(IndexLoader::new().load(&catalog, entry, &CancelToken::never()))?;
        Some(index.header().clone())
    } else {
        None
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entry": entry,
                "header": header,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text | OutputFormat::Tsv => {
            println!("{} ({})", entry.display_name, entry.name);
            println!("  Path:              {}", catalog.resolve(&entry.path));
            println!("  Format:            {}", format_name(entry));
            println!("  Columns:           {}", optional(entry.num_cols));
            println!("  Bloom filter size: {}", optional(entry.bloom_filter_size));
            println!(
                "  Minimizers:        w={} k={} seed={}",
                entry.minimizer.window_size, entry.minimizer.kmer_size, entry.minimizer.seed
            );
            if let Some(hash) = entry.bloom_hash {
                println!("  Bloom hash:        {hash}");
            }
            if let Some(map) = &entry.bucket_map {
                println!("  Bucket map:        {}", catalog.resolve(map));
            }
            if let Some(header) = header {
                println!("  Loaded:            {} rows x {} columns", header.num_rows, header.num_cols);
                println!("  Payload MD5:       {}", header.payload_md5);
                println!("  Created:           {}", header.created_at);
            }
        }
    }

    Ok(())
}

fn format_name(entry: &IndexEntry) -> &'static str {
    match entry.format {
        crate::index::store::IndexFormat::Framed => "framed",
        crate::index::store::IndexFormat::Raw => "raw",
    }
}

fn optional(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
