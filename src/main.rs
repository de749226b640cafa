use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use redletter::blocks::{BlockExtractor, CueSet};
use redletter::corpus::Corpus;
use redletter::oracle::OllamaOracle;
use redletter::output::{CitationReport, ReferenceList, RunMode, RunStats};
use redletter::pipeline::{extract_tagged_citations, CancellationFlag, CuePipeline, RunOutput};
use redletter::reader::{DocumentReader, ReaderConfig};
use redletter::RunConfig;

#[derive(Parser, Debug)]
#[command(name = "redletter")]
#[command(about = "Attribute quoted speech in versified texts to verse references")]
#[command(version)]
struct Cli {
    /// JSON run configuration overriding the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress console progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, global = true, default_value = "run_stats.json")]
    stats_out: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group delimiter-marked tokens in a document and resolve them against the corpus
    Tagged(TaggedArgs),
    /// Detect reported-speech blocks from opener and terminator cues
    Cues(CueArgs),
    /// Condense a citation file into a book -> chapter -> verse-range list
    References(ReferenceArgs),
}

#[derive(Args, Debug)]
struct TaggedArgs {
    /// Marked-up source document
    document: PathBuf,

    /// Corpus JSON (book -> chapter -> verse -> text)
    #[arg(long)]
    corpus: PathBuf,

    /// Candidate books for resolution, comma separated
    #[arg(long, value_delimiter = ',')]
    books: Option<Vec<String>>,

    #[arg(long)]
    start_tag: Option<String>,

    #[arg(long)]
    end_tag: Option<String>,

    /// Maximum character gap between tokens of one quote
    #[arg(long)]
    gap_threshold: Option<usize>,

    /// Matches must score strictly above this ratio
    #[arg(long)]
    similarity_threshold: Option<f64>,

    /// Use memory-mapped I/O instead of async buffered
    #[arg(long)]
    use_mmap: bool,

    /// Citation output file path
    #[arg(long, default_value = "citations.json")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct CueArgs {
    /// Corpus JSON (book -> chapter -> verse -> text)
    #[arg(long)]
    corpus: PathBuf,

    /// Books to scan, comma separated
    #[arg(long, value_delimiter = ',')]
    books: Option<Vec<String>>,

    /// Refine each block through the oracle
    #[arg(long)]
    oracle: bool,

    #[arg(long)]
    oracle_url: Option<String>,

    #[arg(long)]
    oracle_model: Option<String>,

    #[arg(long)]
    oracle_timeout_secs: Option<u64>,

    /// Concurrent oracle calls per chapter
    #[arg(long)]
    oracle_concurrency: Option<usize>,

    /// Citation output file path
    #[arg(long, default_value = "cue_citations.json")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ReferenceArgs {
    /// Citation file written by `tagged` or `cues`
    citations: PathBuf,

    #[arg(long, default_value = "Verses containing attributed speech")]
    description: String,

    #[arg(long, default_value = "Can be applied to any edition with the same verse numbering")]
    note: String,

    /// Reference list output file path
    #[arg(long, default_value = "references.json")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging enables observability and debugging in production
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let cli = Cli::parse();

    info!("Starting redletter");
    info!(?cli, "Parsed CLI arguments");

    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path).await?,
        None => RunConfig::default(),
    };

    match cli.command {
        Command::Tagged(args) => {
            apply_tagged_overrides(&mut config, &args);
            let output = run_tagged(&args, &config).await?;
            finish_run(output, &args.out, &cli.stats_out).await
        }
        Command::Cues(args) => {
            apply_cue_overrides(&mut config, &args);
            let output = run_cues(&args, &config, !cli.no_progress).await?;
            finish_run(output, &args.out, &cli.stats_out).await
        }
        Command::References(args) => run_references(&args).await,
    }
}

fn apply_tagged_overrides(config: &mut RunConfig, args: &TaggedArgs) {
    if let Some(books) = &args.books {
        config.tagged_books = books.clone();
    }
    if let Some(tag) = &args.start_tag {
        config.grouping.start_tag = tag.clone();
    }
    if let Some(tag) = &args.end_tag {
        config.grouping.end_tag = tag.clone();
    }
    if let Some(gap) = args.gap_threshold {
        config.grouping.gap_threshold = gap;
    }
    if let Some(threshold) = args.similarity_threshold {
        config.resolver.similarity_threshold = threshold;
    }
}

fn apply_cue_overrides(config: &mut RunConfig, args: &CueArgs) {
    if let Some(books) = &args.books {
        config.cue_books = books.clone();
    }
    if args.oracle {
        config.oracle.enabled = true;
    }
    if let Some(url) = &args.oracle_url {
        config.oracle.url = url.clone();
    }
    if let Some(model) = &args.oracle_model {
        config.oracle.model = model.clone();
    }
    if let Some(secs) = args.oracle_timeout_secs {
        config.oracle.timeout_secs = secs;
    }
    if let Some(width) = args.oracle_concurrency {
        config.oracle.concurrency = width;
    }
}

async fn run_tagged(args: &TaggedArgs, config: &RunConfig) -> Result<RunOutput> {
    // WHY: validate inputs early to fail fast with a clear error
    if !args.document.is_file() {
        anyhow::bail!("Document does not exist: {}", args.document.display());
    }

    let corpus = Corpus::load(&args.corpus).await?;
    let reader = DocumentReader::new(ReaderConfig {
        use_mmap: args.use_mmap,
    });
    let (document, read_stats) = reader.read_document(&args.document).await?;
    info!(
        "Decoded {} chars from {} as {:?}",
        read_stats.chars_decoded, read_stats.file_path, read_stats.encoding
    );

    // resolution is CPU-bound and may take a while on a full document
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract_tagged_citations(&document, &corpus, &config))
        .await
        .context("Tagged extraction task panicked")?
}

async fn run_cues(args: &CueArgs, config: &RunConfig, show_progress: bool) -> Result<RunOutput> {
    let corpus = Corpus::load(&args.corpus).await?;
    let extractor = BlockExtractor::new(CueSet::default_openers()?, CueSet::default_terminators()?);

    let cancellation = CancellationFlag::new();
    let signal_flag = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current chapter");
            signal_flag.cancel();
        }
    });

    let mut pipeline = CuePipeline::new(&corpus, extractor)
        .with_cancellation(cancellation)
        .with_progress(show_progress);
    if config.oracle.enabled {
        info!(
            "Oracle refinement enabled: {} ({})",
            config.oracle.url, config.oracle.model
        );
        let oracle = OllamaOracle::new(&config.oracle)?;
        pipeline = pipeline.with_oracle(Arc::new(oracle), config.oracle.clone());
    }

    pipeline.run(&config.cue_books).await
}

async fn finish_run(output: RunOutput, out: &Path, stats_out: &Path) -> Result<()> {
    let stats: RunStats = output.stats.clone();
    let report = output.into_report();
    report.write_json(out).await?;
    stats.write_json(stats_out).await?;

    println!("redletter v{} - {} run complete", env!("CARGO_PKG_VERSION"), stats.mode);
    println!("  Citations: {}", stats.citations);
    println!("  Resolved: {}, unresolved: {}", stats.resolved, stats.unresolved);
    if stats.mode == RunMode::Cues {
        println!("  Chapters scanned: {}", stats.chapters_scanned);
        if stats.oracle_refined + stats.oracle_failed > 0 {
            println!(
                "  Oracle refined: {}, kept after oracle failure: {}",
                stats.oracle_refined, stats.oracle_failed
            );
        }
    }
    if stats.cancelled {
        println!("  Run was cancelled; output holds completed chapters only");
    }
    println!("  Output: {}", out.display());

    info!(
        "Run completed: {} citations in {}ms",
        stats.citations, stats.processing_time_ms
    );
    Ok(())
}

async fn run_references(args: &ReferenceArgs) -> Result<()> {
    let report = CitationReport::load(&args.citations).await?;
    let list = ReferenceList::from_citations(&report.citations, &args.description, &args.note);
    list.write_json(&args.out).await?;

    println!("Created {}", args.out.display());
    println!(
        "Citations with a reference: {} of {}",
        report.resolved_count(),
        report.total_citations
    );
    println!("Total books with references: {}", list.total_books);
    println!("Total individual verses: {}", list.verse_count());
    Ok(())
}
