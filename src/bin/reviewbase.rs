use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reviewbase::enrichment::{AbstractSource, CrossrefClient};
use reviewbase::ingestion::{
    discover_exports, format_dedup_report, ingest_exports, Deduplicator, ExportFile,
};
use reviewbase::logging::init_logging;
use reviewbase::orchestration::{log_event, EventType};
use reviewbase::records::SourceDatabase;
use reviewbase::screening::{
    compare_ledgers, format_agreement, format_screening_status, format_session_state,
    CsvDecisionStore, DecisionStore, ResumeMode, ScreeningRunner, ScreeningStats, ScriptedReviewer,
    SessionEnd, StopSignal, TerminalReviewer,
};
use reviewbase::ReviewManager;
use serde_json::json;

/// Deduplicate bibliographic exports and screen them title/abstract first.
#[derive(Debug, Parser)]
#[command(name = "reviewbase", version, about = "Scoping review screening workbench")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Review slug to operate on (defaults to the active review)
    #[arg(short, long, global = true)]
    review: Option<String>,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a review and make it active
    Init { name: String },
    /// List reviews in the workspace
    List,
    /// Make an existing review active
    Use { slug: String },
    /// Ingest exports, deduplicate them and store the canonical records
    Ingest(IngestArgs),
    /// Screen undecided records interactively
    Screen(ScreenArgs),
    /// Show screening progress and the last session
    Status,
    /// Compare two decision stores with Cohen's kappa
    Agreement { first: PathBuf, second: PathBuf },
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// PubMed CSV export
    #[arg(long = "pubmed", value_name = "FILE")]
    pubmed: Vec<PathBuf>,
    /// Web of Science tab-delimited export
    #[arg(long = "wos", value_name = "FILE")]
    wos: Vec<PathBuf>,
    /// Folder whose exports are detected by header
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ScreenArgs {
    /// Present every record again, overwriting stored decisions
    #[arg(long)]
    restart: bool,
    /// Fetch missing abstracts from Crossref
    #[arg(long)]
    enrich: bool,
    /// Highlight this keyword in titles and abstracts (repeatable)
    #[arg(short, long = "keyword", value_name = "WORD")]
    keywords: Vec<String>,
    /// Read reviewer answers from a file instead of the terminal
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("reviewbase error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Agreement { first, second } => agreement(first, second)?,
        Commands::Init { name } => {
            let mut manager = ReviewManager::new()?;
            let review = manager.create_review(&name)?;
            println!(
                "Created review '{}' ({}) at {}",
                review.name,
                review.slug,
                review.root.display()
            );
        }
        Commands::List => {
            let manager = ReviewManager::new()?;
            let active = manager.config.last_active_review.clone();
            for review in manager.list_reviews()? {
                let marker = if active.as_deref() == Some(review.slug.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {} ({})", review.slug, review.name);
            }
        }
        Commands::Use { slug } => {
            let mut manager = ReviewManager::new()?;
            let review = manager.set_active_review(&slug)?;
            println!("Active review: {}", review.slug);
        }
        Commands::Ingest(args) => ingest(&ReviewManager::new()?, cli.review.as_deref(), args)?,
        Commands::Screen(args) => screen(&ReviewManager::new()?, cli.review.as_deref(), args)?,
        Commands::Status => status(&ReviewManager::new()?, cli.review.as_deref())?,
    }
    Ok(())
}

fn ingest(manager: &ReviewManager, slug: Option<&str>, args: IngestArgs) -> Result<()> {
    let review = manager.resolve_review(slug)?;
    let mut files: Vec<ExportFile> = args
        .pubmed
        .into_iter()
        .map(|path| ExportFile::new(path, SourceDatabase::Pubmed))
        .chain(
            args.wos
                .into_iter()
                .map(|path| ExportFile::new(path, SourceDatabase::WebOfScience)),
        )
        .collect();
    let mut discovery_issues = Vec::new();
    if let Some(dir) = &args.dir {
        let (found, issues) = discover_exports(dir)?;
        files.extend(found);
        discovery_issues = issues;
    }
    if files.is_empty() {
        anyhow::bail!("Nothing to ingest; pass --pubmed, --wos or --dir");
    }

    let mut outcome = ingest_exports(&files);
    outcome.summary.issues.extend(discovery_issues);
    println!("{}", outcome.summary.describe());
    for issue in &outcome.summary.issues {
        let location = match issue.line {
            Some(line) => format!("{}:{line}", issue.path.display()),
            None => issue.path.display().to_string(),
        };
        println!("  {location} {:?}: {}", issue.reason, issue.message);
    }
    log_event(
        &review,
        EventType::ExportsIngested,
        json!({
            "files": files.iter().map(|f| f.path.display().to_string()).collect::<Vec<_>>(),
            "rows_read": outcome.summary.rows_read,
            "ingested": outcome.summary.ingested,
            "skipped": outcome.summary.skipped,
        }),
    )?;

    let dedup = Deduplicator::new()
        .with_title_conflict_threshold(manager.config.dedup.title_conflict_threshold)
        .run(&outcome.records);
    println!("{}", format_dedup_report(&dedup.report));
    manager.save_canonical_records(&review, &dedup.records)?;
    log_event(
        &review,
        EventType::DeduplicationCompleted,
        json!({
            "total_input": dedup.report.total_input,
            "total_canonical": dedup.report.total_canonical,
            "conflicts": dedup.report.conflicts.len(),
        }),
    )?;
    println!(
        "Stored {} canonical records for review '{}'.",
        dedup.records.len(),
        review.slug
    );
    Ok(())
}

fn screen(manager: &ReviewManager, slug: Option<&str>, args: ScreenArgs) -> Result<()> {
    let review = manager.resolve_review(slug)?;
    let runner = ScreeningRunner::new(manager, review);
    let resume = if args.restart {
        ResumeMode::Restart
    } else {
        ResumeMode::Continue
    };
    let enrichment: Option<Box<dyn AbstractSource>> =
        if args.enrich || manager.config.enrichment.enabled {
            Some(Box::new(CrossrefClient::new(&manager.config.enrichment)?))
        } else {
            None
        };
    let stop = StopSignal::new();

    let report = match &args.replay {
        Some(path) => {
            let mut reviewer = ScriptedReviewer::from_file(path)?;
            runner.run(&mut reviewer, resume, enrichment, &stop)?
        }
        None => {
            let stdin = io::stdin();
            let mut reviewer =
                TerminalReviewer::new(stdin.lock(), io::stdout()).with_keywords(&args.keywords)?;
            runner.run(&mut reviewer, resume, enrichment, &stop)?
        }
    };
    println!("{}", report.describe());
    if report.end == SessionEnd::Failed {
        if let Some(err) = report.error {
            return Err(err).context("Screening ended because decisions could not be saved");
        }
    }
    Ok(())
}

fn status(manager: &ReviewManager, slug: Option<&str>) -> Result<()> {
    let review = manager.resolve_review(slug)?;
    let records = manager.load_canonical_records(&review)?;
    let ledger = manager.decision_store(&review).load()?;
    println!("Review '{}' ({})", review.name, review.slug);
    println!("{}", format_screening_status(&ScreeningStats::compute(&records, &ledger)));
    let runner = ScreeningRunner::new(manager, review);
    match runner.latest_session()? {
        Some(state) => println!("{}", format_session_state(&state)),
        None => println!("No screening sessions yet."),
    }
    Ok(())
}

fn agreement(first: PathBuf, second: PathBuf) -> Result<()> {
    let first_ledger = CsvDecisionStore::new(&first)
        .load()
        .with_context(|| format!("Unable to read decisions from {:?}", first))?;
    let second_ledger = CsvDecisionStore::new(&second)
        .load()
        .with_context(|| format!("Unable to read decisions from {:?}", second))?;
    println!("{}", format_agreement(&compare_ledgers(&first_ledger, &second_ledger)));
    Ok(())
}
