use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::cli::{load_catalog, OutputFormat};
use crate::core::sequence::clean_sequence;
use crate::core::types::{QueryMode, DEFAULT_FRAGMENT_SIZE};
use crate::index::loader::CancelToken;
use crate::matching::search::{SearchConfig, SearchEngine, SearchRequest, SearchResponse};
use crate::parsing::fasta::{read_fasta_file, read_query_file};
use crate::refine::mashmap::{MashmapAligner, DEFAULT_PROGRAM};
use crate::refine::{to_mapped_region, MappedRegion, SequenceAligner};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Score the whole query by minimizer containment
    Containment,
    /// Count fragments fully contained in each bucket
    FragmentVote,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Query file (FASTA or plain sequence), or `-` for stdin
    #[arg(required = true)]
    pub input: PathBuf,

    /// Index to search
    #[arg(short, long, default_value = "hg38")]
    pub index: String,

    /// Path to custom catalog file
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Expected per-base divergence between query and reference (0 disables score filtering)
    #[arg(short = 's', long, default_value = "0")]
    pub substitution_rate: f64,

    /// Matching strategy
    #[arg(short, long, default_value = "containment")]
    pub mode: ModeArg,

    /// Fragment length for fragment-vote mode
    #[arg(long, default_value_t = DEFAULT_FRAGMENT_SIZE)]
    pub fragment_size: usize,

    /// Drop buckets whose raw containment is below this value
    #[arg(long, default_value = "0")]
    pub min_containment: f64,

    /// Maximum number of hits to show
    #[arg(short = 'n', long, default_value = "20")]
    pub max_results: usize,

    /// Reference FASTA used to refine the best hits with MashMap
    #[arg(long)]
    pub refine_with: Option<PathBuf>,

    /// MashMap executable
    #[arg(long, default_value = DEFAULT_PROGRAM)]
    pub mashmap: PathBuf,

    /// Number of top hits to refine
    #[arg(long, default_value = "3")]
    pub refine_top: usize,

    /// Threads given to MashMap
    #[arg(long, default_value = "1")]
    pub threads: usize,

    /// Minimum segment length MashMap reports (its own default when omitted)
    #[arg(long)]
    pub segment_length: Option<u64>,

    /// Minimum percent identity MashMap reports (its own default when omitted)
    #[arg(long)]
    pub percent_identity: Option<f64>,
}

impl SearchArgs {
    fn query_mode(&self) -> QueryMode {
        match self.mode {
            ModeArg::Containment => QueryMode::Containment,
            ModeArg::FragmentVote => QueryMode::FragmentVote {
                fragment_size: self.fragment_size,
            },
        }
    }

    fn aligner(&self) -> MashmapAligner {
        let mut aligner = MashmapAligner::new(&self.mashmap).with_threads(self.threads);
        if let Some(length) = self.segment_length {
            aligner = aligner.with_segment_length(length);
        }
        if let Some(identity) = self.percent_identity {
            aligner = aligner.with_percent_identity(identity);
        }
        aligner
    }
}

/// Refinement results for one bucket
#[derive(Debug, serde::Serialize)]
struct RefinedBucket {
    bucket: usize,
    location: String,
    regions: Vec<MappedRegion>,
}

/// Run the search command
///
/// # Errors
///
/// Returns an error if the query cannot be read, the search fails, or
/// refinement fails.
pub fn run(args: SearchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let query = read_query(&args)?;
    if verbose {
        eprintln!("Read {} bp query from {}", query.len(), args.input.display());
    }

    let catalog = load_catalog(args.catalog.as_deref())?;
    let engine = SearchEngine::new(catalog).with_config(SearchConfig {
        min_containment: args.min_containment,
        ..SearchConfig::default()
    });
    let request = SearchRequest::new(query.clone(), args.index.clone())
        .with_substitution_rate(args.substitution_rate)
        .with_mode(args.query_mode());

    let rt = tokio::runtime::Runtime::new()?;
    let response = rt.block_on(async {
        let (handle, cancel) = CancelToken::pair();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; cancelling search");
                handle.cancel();
            }
        });
        let result = engine.search(&request, &cancel).await;
        interrupt.abort();
        result
    })?;

    let refined = match &args.refine_with {
        Some(reference) => refine(&args, reference, &query, &response, verbose)?,
        None => Vec::new(),
    };

    match format {
        OutputFormat::Text => print_text(&response, &refined, args.max_results),
        OutputFormat::Json => print_json(&response, &refined, args.max_results)?,
        OutputFormat::Tsv => print_tsv(&response, args.max_results),
    }

    Ok(())
}

fn read_query(args: &SearchArgs) -> anyhow::Result<String> {
    if args.input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(clean_sequence(text.trim()));
    }
    if !args.input.exists() {
        anyhow::bail!("Query file not found: {}", args.input.display());
    }
    Ok(read_query_file(&args.input)?)
}

/// Align the query against the reference slices of the top-ranked buckets
fn refine(
    args: &SearchArgs,
    reference: &std::path::Path,
    query: &str,
    response: &SearchResponse,
    verbose: bool,
) -> anyhow::Result<Vec<RefinedBucket>> {
    if response.locations.is_empty() {
        anyhow::bail!(
            "Index '{}' has no bucket map; cannot refine hits",
            response.index
        );
    }

    let records: HashMap<String, Vec<u8>> = read_fasta_file(reference)?
        .into_iter()
        .map(|r| (r.name, r.sequence))
        .collect();
    let aligner = args.aligner();
    let query = query.as_bytes();

    let mut refined = Vec::new();
    for (bucket_id, _) in response.ranked().into_iter().take(args.refine_top) {
        let Some(bucket) = response.locations.get(&bucket_id) else {
            continue;
        };
        let Some(sequence) = records.get(&bucket.ref_name) else {
            tracing::warn!("reference has no sequence named '{}'", bucket.ref_name);
            continue;
        };

        let start = usize::try_from(bucket.bucket_start)?.min(sequence.len());
        let end = usize::try_from(bucket.bucket_end)?.min(sequence.len());
        if verbose {
            eprintln!("Refining bucket {bucket_id} ({})", bucket.name());
        }
        let regions = aligner
            .align(&sequence[start..end], query)?
            .iter()
            .map(|hit| to_mapped_region(bucket, hit))
            .collect();

        refined.push(RefinedBucket {
            bucket: bucket_id,
            location: bucket.name(),
            regions,
        });
    }

    Ok(refined)
}

fn location_label(response: &SearchResponse, bucket: usize) -> String {
    response
        .locations
        .get(&bucket)
        .map_or_else(|| "-".to_string(), crate::core::types::Bucket::name)
}

fn print_text(response: &SearchResponse, refined: &[RefinedBucket], max_results: usize) {
    println!("=== flashmap search ===\n");
    println!("Index:    {}", response.index);
    println!("Mode:     {}", response.mode);
    println!("Query:    {} bp, {} minimizers", response.query_length, response.num_query_minimizers);
    if response.num_fragments > 1 {
        println!("Fragments: {}", response.num_fragments);
    }
    println!();

    if response.hits.is_empty() {
        println!("No buckets matched the query.");
        return;
    }

    let ranked = response.ranked();
    let labels: Vec<String> = ranked
        .iter()
        .take(max_results)
        .map(|(id, _)| location_label(response, *id))
        .collect();
    let loc_width = labels.iter().map(String::len).max().unwrap_or(8).max(8);

    println!("{:>6}  {:<loc_w$}  {:>10}", "Bucket", "Location", "Score", loc_w = loc_width);
    println!("{}", "-".repeat(loc_width + 20));
    for ((id, hit), label) in ranked.iter().take(max_results).zip(&labels) {
        println!(
            "{:>6}  {:<loc_w$}  {:>10}",
            id,
            label,
            hit.score_label(),
            loc_w = loc_width
        );
    }
    if ranked.len() > max_results {
        println!("\n... and {} more buckets", ranked.len() - max_results);
    }

    if !refined.is_empty() {
        println!("\nRefined mappings:");
        for bucket in refined {
            println!("  Bucket {} ({})", bucket.bucket, bucket.location);
            if bucket.regions.is_empty() {
                println!("    no mappings");
            }
            for region in &bucket.regions {
                println!(
                    "    {} {} query {}-{} identity {:.2}%",
                    region.name(),
                    region.strand,
                    region.query_start,
                    region.query_end,
                    region.identity
                );
            }
        }
    }
}

fn print_json(
    response: &SearchResponse,
    refined: &[RefinedBucket],
    max_results: usize,
) -> anyhow::Result<()> {
    let ranked: Vec<serde_json::Value> = response
        .ranked()
        .into_iter()
        .take(max_results)
        .map(|(id, hit)| {
            serde_json::json!({
                "bucket": id,
                "location": response.locations.get(&id),
                "hit": hit,
            })
        })
        .collect();

    let mut json = serde_json::to_value(response)?;
    if let Some(obj) = json.as_object_mut() {
        obj.insert("ranked".to_string(), serde_json::Value::Array(ranked));
        if !refined.is_empty() {
            obj.insert("refined".to_string(), serde_json::to_value(refined)?);
        }
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_tsv(response: &SearchResponse, max_results: usize) {
    println!("bucket\tlocation\tscore\tcontainment");
    for (id, hit) in response.ranked().into_iter().take(max_results) {
        let containment = match hit {
            crate::core::types::HitRecord::Containment { containment, .. } => {
                format!("{containment:.4}")
            }
            crate::core::types::HitRecord::Votes { .. } => "-".to_string(),
        };
        println!(
            "{id}\t{}\t{}\t{containment}",
            location_label(response, id),
            hit.score_label()
        );
    }
}
