use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use photark::config::Config;
use photark::db::Database;
use photark::extractor::{self, strategies::Strategy, MetadataExtractor};
use photark::pathdate::PathDateExtractor;
use photark::planner::{self, Planner};
use photark::scanner::{progress::format_bytes, uuid::drive_uuid, ScanOutcome, Scanner};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "photark")]
#[command(author, version, about = "Consolidate photo archives into a dated catalog")]
struct Cli {
    /// Path to the catalog database (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Path to a config file
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inventory a source root into the catalog
    Scan {
        /// Source root to scan (optional with --resume or --status)
        root: Option<PathBuf>,

        /// Resume an interrupted scan
        #[arg(long)]
        resume: bool,

        /// Show scan sessions and exit
        #[arg(long)]
        status: bool,

        /// Print a status line every N files
        #[arg(long)]
        progress_interval: Option<u64>,
    },

    /// Derive path-based date signals for scanned files
    ResolveDates {
        /// Reprocess every file, not just new ones
        #[arg(long)]
        reprocess: bool,

        /// Files per update batch
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },

    /// Extract metadata from media files with exiftool
    ExtractMetadata {
        /// Which files to process: full or selective (default from config)
        #[arg(long)]
        strategy: Option<String>,

        /// Files per exiftool invocation
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum files to process this run
        #[arg(long)]
        limit: Option<usize>,

        /// Show extraction statistics and exit
        #[arg(long)]
        stats: bool,
    },

    /// Build the placement plan for a scanned session
    Plan {
        /// Source root selecting the session (default: most recent)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Minimum share of dated images before bucketing
        #[arg(long)]
        min_coverage: Option<f64>,

        /// Agreement share at which a date is adopted
        #[arg(long)]
        min_prevalence: Option<f64>,

        /// Calendar-month spread at which a folder is bucketed
        #[arg(long)]
        max_span: Option<i64>,

        /// Show plan statistics and exit
        #[arg(long)]
        stats: bool,
    },

    /// Run the full pipeline: scan, resolve-dates, extract-metadata, plan
    Run {
        /// Source root to process
        root: PathBuf,

        /// Metadata extraction strategy: full or selective
        #[arg(long)]
        metadata_strategy: Option<String>,
    },
}

fn main() -> ExitCode {
    photark::logging::init();

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || {
            cancel.store(true, Ordering::SeqCst);
        });
    }

    match run(cancel) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cancel: Arc<AtomicBool>) -> Result<u8> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }

    match cli.command {
        Command::Scan {
            root,
            resume,
            status,
            progress_interval,
        } => {
            if let Some(interval) = progress_interval {
                config.scanner.progress_interval = interval;
            }
            if status {
                return cmd_scan_status(&config);
            }
            cmd_scan(&config, root, resume, cancel)
        }
        Command::ResolveDates {
            reprocess,
            batch_size,
        } => cmd_resolve_dates(&config, reprocess, batch_size),
        Command::ExtractMetadata {
            strategy,
            batch_size,
            limit,
            stats,
        } => {
            if let Some(strategy) = strategy {
                config.extractor.strategy = strategy;
            }
            if let Some(batch_size) = batch_size {
                config.extractor.batch_size = batch_size;
            }
            if let Some(limit) = limit {
                config.extractor.limit = Some(limit);
            }
            if stats {
                return cmd_extract_stats(&config);
            }
            cmd_extract_metadata(&config, cancel)
        }
        Command::Plan {
            source,
            min_coverage,
            min_prevalence,
            max_span,
            stats,
        } => {
            if let Some(v) = min_coverage {
                config.planner.min_coverage = v;
            }
            if let Some(v) = min_prevalence {
                config.planner.min_prevalence = v;
            }
            if let Some(v) = max_span {
                config.planner.max_date_span_months = v;
            }
            cmd_plan(&config, source, stats, cancel)
        }
        Command::Run {
            root,
            metadata_strategy,
        } => {
            if let Some(strategy) = metadata_strategy {
                config.extractor.strategy = strategy;
            }
            cmd_run(&config, &root, cancel)
        }
    }
}

fn cmd_scan(
    config: &Config,
    root: Option<PathBuf>,
    resume: bool,
    cancel: Arc<AtomicBool>,
) -> Result<u8> {
    let db = Database::open(&config.database_path)?;

    let root = match root {
        Some(root) => root,
        None if resume => {
            let session = db
                .find_latest_resumable_session()?
                .ok_or_else(|| anyhow!("No interrupted scan found to resume"))?;
            println!("Resuming scan of: {}", session.source_root);
            PathBuf::from(session.source_root)
        }
        None => return Err(anyhow!("ROOT is required unless --resume is used")),
    };

    // The UUID oracle runs before any catalog mutation; failure aborts here.
    let uuid = drive_uuid(&root)?;

    let scanner = Scanner::new(&db, config.scanner.clone(), cancel);
    match scanner.scan(&root, &uuid, resume)? {
        ScanOutcome::Completed(_) => Ok(0),
        ScanOutcome::Interrupted(_) => Ok(EXIT_INTERRUPTED),
    }
}

fn cmd_scan_status(config: &Config) -> Result<u8> {
    if !config.database_path.exists() {
        println!("No catalog found. Run 'photark scan' first.");
        return Ok(0);
    }

    let db = Database::open(&config.database_path)?;
    let sessions = db.list_sessions()?;
    if sessions.is_empty() {
        println!("No scan sessions found.");
        return Ok(0);
    }

    println!("\nScan Sessions:");
    println!("{}", "-".repeat(80));
    println!(
        "{:<35} {:<12} {:>10} {:>12}",
        "Source", "Status", "Files", "Size"
    );
    println!("{}", "-".repeat(80));
    for session in sessions {
        println!(
            "{:<35} {:<12} {:>10} {:>12}",
            truncate_left(&session.source_root, 34),
            session.status.as_str(),
            session.files_scanned,
            format_bytes(session.total_bytes as u64),
        );
    }
    Ok(0)
}

fn cmd_resolve_dates(config: &Config, reprocess: bool, batch_size: usize) -> Result<u8> {
    let db = open_existing(config)?;
    println!("Extracting dates from paths...");
    let stats = PathDateExtractor::new(&db, batch_size).extract_all(reprocess)?;

    println!();
    println!("Path Date Extraction Complete:");
    println!("  Total files processed: {}", stats.total_files);
    println!("  Files with hierarchy date: {}", stats.files_with_hierarchy);
    println!("  Files with folder date: {}", stats.files_with_folder);
    println!("  Files with filename date: {}", stats.files_with_filename);
    println!("  Files with any signal: {}", stats.files_with_any);
    Ok(0)
}

fn cmd_extract_stats(config: &Config) -> Result<u8> {
    let db = open_existing(config)?;
    let stats = extractor::stored_stats(&db)?;
    println!("Metadata Extraction Statistics:");
    println!("  Total extracted: {}", stats.total);
    println!("  Successful: {}", stats.success);
    println!("  Skipped: {}", stats.skipped);
    println!("  Errors: {}", stats.errors);
    println!("  With date: {}", stats.with_date);
    println!("  With GPS: {}", stats.with_gps);
    Ok(0)
}

fn cmd_extract_metadata(config: &Config, cancel: Arc<AtomicBool>) -> Result<u8> {
    let db = open_existing(config)?;
    let strategy = Strategy::parse(&config.extractor.strategy)?;
    let limit = config.extractor.limit;

    let extractor = MetadataExtractor::new(&db, config.extractor.clone(), cancel.clone())?;
    println!("Starting metadata extraction (strategy: {})", strategy.name());
    println!("exiftool version: {}", extractor.tool_version());

    let stats = extractor.extract_all(strategy, limit)?;

    println!();
    println!("Metadata Extraction Complete:");
    println!("  Total files processed: {}", stats.total_files);
    println!("  Successfully extracted: {}", stats.files_extracted);
    println!("  Skipped (too small): {}", stats.files_skipped);
    println!("  With original date: {}", stats.files_with_date_original);
    println!("  With GPS: {}", stats.files_with_gps);
    println!("  Errors: {}", stats.files_failed);

    if cancel.load(Ordering::SeqCst) {
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(0)
}

fn cmd_plan(
    config: &Config,
    source: Option<PathBuf>,
    stats_only: bool,
    cancel: Arc<AtomicBool>,
) -> Result<u8> {
    let db = open_existing(config)?;

    let session = match source {
        Some(root) => {
            // Sessions are keyed by the canonical root the scanner stored.
            let root = root.canonicalize().unwrap_or(root);
            let root_str = root.to_string_lossy();
            db.find_session_by_root(&root_str)?
                .ok_or_else(|| anyhow!("No scan session found for {root_str}"))?
        }
        None => db
            .find_latest_session()?
            .ok_or_else(|| anyhow!("No scan sessions in the catalog; run 'photark scan' first"))?,
    };

    if stats_only {
        let stats = planner::stored_stats(&db, session.id)?;
        println!("Plan Statistics for {}:", session.source_root);
        println!("  Folders planned: {}", stats.folders);
        for (source, count) in &stats.folders_by_source {
            println!("    {source}: {count}");
        }
        for (bucket, count) in &stats.folders_by_bucket {
            println!("    bucket _{bucket}: {count}");
        }
        println!("  Files planned: {}", stats.files);
        println!("  Potential duplicates: {}", stats.potential_duplicates);
        println!("  Sidecars: {}", stats.sidecars);
        return Ok(0);
    }

    println!("Planning session for {}", session.source_root);
    let stats = match Planner::new(&db, config.planner.clone(), cancel.clone()).plan(session.id) {
        Ok(stats) => stats,
        Err(e) if cancel.load(Ordering::SeqCst) => {
            eprintln!("{e:#}");
            return Ok(EXIT_INTERRUPTED);
        }
        Err(e) => return Err(e),
    };

    println!();
    println!("Planning Complete:");
    println!("  Folders planned: {}", stats.folders_planned);
    for (source, count) in &stats.folders_by_source {
        println!("    {source}: {count}");
    }
    println!("  Files planned: {}", stats.files_planned);
    println!("  Potential duplicates: {}", stats.potential_duplicates);
    println!("  Sidecars: {}", stats.sidecars);
    Ok(0)
}

fn cmd_run(config: &Config, root: &PathBuf, cancel: Arc<AtomicBool>) -> Result<u8> {
    println!("{}", "=".repeat(60));
    println!("PHOTARK PIPELINE");
    println!("{}", "=".repeat(60));

    println!("\n[1/4] SCANNING FILES");
    println!("{}", "-".repeat(40));
    let code = cmd_scan(config, Some(root.clone()), false, cancel.clone())?;
    if code != 0 {
        return Ok(code);
    }

    println!("\n[2/4] EXTRACTING DATES FROM PATHS");
    println!("{}", "-".repeat(40));
    cmd_resolve_dates(config, false, 1000)?;

    println!("\n[3/4] EXTRACTING METADATA");
    println!("{}", "-".repeat(40));
    let code = cmd_extract_metadata(config, cancel.clone())?;
    if code != 0 {
        return Ok(code);
    }

    println!("\n[4/4] PLANNING TARGETS");
    println!("{}", "-".repeat(40));
    let code = cmd_plan(config, Some(root.clone()), false, cancel)?;
    if code != 0 {
        return Ok(code);
    }

    println!("\n{}", "=".repeat(60));
    println!("PIPELINE COMPLETE");
    println!("{}", "=".repeat(60));
    println!("\nCatalog: {}", config.database_path.display());
    Ok(0)
}

fn open_existing(config: &Config) -> Result<Database> {
    if !config.database_path.exists() {
        return Err(anyhow!(
            "No catalog found at {}. Run 'photark scan' first.",
            config.database_path.display()
        ));
    }
    Database::open(&config.database_path)
}

fn truncate_left(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        let tail: String = text
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{tail}")
    }
}
