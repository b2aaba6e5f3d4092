//! fsjson - Concurrent filesystem scanner producing mergeable JSON snapshots.
//!
//! Usage:
//!   fsjson scan [PATH]          Scan a directory into a snapshot
//!   fsjson merge FILE...        Merge snapshots into one
//!   fsjson search FILE          Filter a snapshot by name, type, size and time
//!   fsjson duplicates FILE      List files sharing a content hash
//!   fsjson --help               Show help

use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use fsjson_analyze::{
    DuplicateConfig, DuplicateFinder, MergeOptions, Merger, NamePattern, OutputShape, Page,
    SearchQuery, SizeFilter, TimeFilter, search,
};
use fsjson_core::{Category, Node, Snapshot, human_size};
use fsjson_scan::{ScanConfig, ScanError, Scanner};

#[derive(Parser)]
#[command(
    name = "fsjson",
    version,
    about = "Concurrent filesystem scanner producing mergeable JSON snapshots",
    long_about = "fsjson scans a directory tree into a JSON snapshot (flat record list \
                  or nested tree), merges snapshots from several scans, and answers \
                  search and duplicate queries over them."
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory into a snapshot
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Case-insensitive path substrings to skip (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        workers: usize,

        /// Maximum concurrent listings/hashes (0 = unlimited)
        #[arg(long, default_value_t = fsjson_core::DEFAULT_IO_LIMIT)]
        io_limit: usize,

        /// Do not hash file contents
        #[arg(long)]
        no_hash: bool,

        /// Output file
        #[arg(short, long, default_value = "structure.json")]
        output: PathBuf,

        /// Write the flat record list instead of a tree
        #[arg(long)]
        flat: bool,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Merge several snapshots into one
    Merge {
        /// Snapshot files, merged left to right
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Keep only the first same-named file per directory
        #[arg(long)]
        dedupe: bool,

        /// Write the flat record list instead of a tree
        #[arg(long)]
        flat: bool,

        /// Output file
        #[arg(short, long, default_value = "merged.json")]
        output: PathBuf,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Search a snapshot
    Search(SearchArgs),

    /// Find files with identical content
    Duplicates {
        /// Snapshot file
        input: PathBuf,

        /// Minimum file size to consider (e.g., "0", "1KB", "10MB")
        #[arg(long, default_value = "0")]
        min_size: String,

        /// Maximum number of groups to show (0 = all)
        #[arg(short = 'n', long, default_value_t = 0)]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Snapshot file
    input: PathBuf,

    /// Name pattern; `*` matches any run, `?` one character
    #[arg(short, long)]
    query: Option<String>,

    /// Only consider paths starting with this prefix
    #[arg(long)]
    path: Option<String>,

    /// Categories to include (comma separated)
    #[arg(short = 't', long = "type", value_delimiter = ',')]
    types: Vec<Category>,

    /// Size strictly greater than (e.g. 10MB)
    #[arg(long, value_name = "SIZE")]
    size_gt: Option<String>,
    /// Size at least
    #[arg(long, value_name = "SIZE")]
    size_gte: Option<String>,
    /// Size strictly less than
    #[arg(long, value_name = "SIZE")]
    size_lt: Option<String>,
    /// Size at most
    #[arg(long, value_name = "SIZE")]
    size_lte: Option<String>,
    /// Size exactly
    #[arg(long, value_name = "SIZE")]
    size_eq: Option<String>,

    /// Inclusive size range
    #[arg(long, value_name = "MIN,MAX")]
    size_between: Option<String>,

    /// Created after (YYYY-MM-DD[THH:MM[:SS]] or RFC 3339)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    created_gt: Option<DateTime<Utc>>,
    /// Created at or after
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    created_gte: Option<DateTime<Utc>>,
    /// Created before
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    created_lt: Option<DateTime<Utc>>,
    /// Created at or before
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    created_lte: Option<DateTime<Utc>>,

    /// Modified after (YYYY-MM-DD[THH:MM[:SS]] or RFC 3339)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    modified_gt: Option<DateTime<Utc>>,
    /// Modified at or after
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    modified_gte: Option<DateTime<Utc>>,
    /// Modified before
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    modified_lt: Option<DateTime<Utc>>,
    /// Modified at or before
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    modified_lte: Option<DateTime<Utc>>,

    /// Maximum results (0 or negative = all)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    limit: i64,

    /// Results to skip
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Output format
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Scan {
            path,
            exclude,
            workers,
            io_limit,
            no_hash,
            output,
            flat,
            pretty,
        } => {
            let config = ScanConfig::builder()
                .root(path)
                .exclusions(exclude)
                .workers(workers)
                .io_limit(io_limit)
                .skip_hash(no_hash)
                .build()
                .map_err(ScanError::from)?;
            run_scan(&config, &output, !flat, pretty)?;
        }
        Command::Merge {
            inputs,
            dedupe,
            flat,
            output,
            pretty,
        } => {
            let shape = if flat { OutputShape::Flat } else { OutputShape::Tree };
            let options = MergeOptions::builder()
                .dedupe(dedupe)
                .shape(shape)
                .pretty(pretty)
                .build()
                .map_err(|e| eyre!("Invalid merge options: {e}"))?;
            run_merge(options, &inputs, &output)?;
        }
        Command::Search(args) => {
            run_search(args)?;
        }
        Command::Duplicates {
            input,
            min_size,
            top,
            format,
        } => {
            run_duplicates(&input, &min_size, top, format)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fsjson=debug" } else { "fsjson=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Scan a directory and write the snapshot.
fn run_scan(config: &ScanConfig, output: &Path, tree: bool, pretty: bool) -> Result<()> {
    let scanner = Scanner::new();
    let mut progress_rx = scanner.subscribe();
    let reporter = thread::spawn(move || {
        loop {
            match progress_rx.blocking_recv() {
                Ok(progress) => tracing::info!(
                    phase = ?progress.phase,
                    entries = progress.collected,
                    bytes = %human_size(progress.bytes),
                    rate = format_args!("{:.0}/s", progress.entries_per_second()),
                    "progress"
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = scanner.scan(config).context("Scan failed");
    // Closing the channel ends the reporter loop.
    drop(scanner);
    join_reporter(reporter);
    let result = result?;

    let stats = result.stats;
    let duration = result.duration;
    let root = result.root_path.clone();
    result
        .into_snapshot(tree)
        .write(output, pretty)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!();
    eprintln!("{}", "─".repeat(60));
    eprintln!(" {} - {}", root.display(), human_size(stats.bytes));
    eprintln!(" {} files, {} directories", stats.files, stats.dirs);
    if stats.dropped > 0 || stats.hash_failures > 0 {
        eprintln!(
            " {} entries skipped, {} files unhashed",
            stats.dropped, stats.hash_failures
        );
    }
    eprintln!(" Scanned in {:.2}s", duration.as_secs_f64());
    eprintln!(" Written to {}", output.display());
    eprintln!("{}", "─".repeat(60));

    Ok(())
}

/// Merge snapshot files.
/// Wait for the progress reporter. Returns false if it panicked.
fn join_reporter(reporter: thread::JoinHandle<()>) -> bool {
    match reporter.join() {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!("progress reporter panicked; scan output is unaffected");
            false
        }
    }
}

fn run_merge(options: MergeOptions, inputs: &[PathBuf], output: &Path) -> Result<()> {
    let outcome = Merger::new(options)
        .merge_to_file(inputs, output)
        .context("Merge failed")?;

    for warning in &outcome.warnings {
        eprintln!(" skipped {}: {}", warning.path.display(), warning.message);
    }
    eprintln!(
        " Merged {} snapshot(s) into {} ({}, {} files)",
        outcome.merged_inputs,
        output.display(),
        outcome.tree.size_human,
        outcome.tree.count_files()
    );
    Ok(())
}

fn load_tree(path: &Path) -> Result<Node> {
    let snapshot =
        Snapshot::read(path).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(snapshot.into_tree())
}

/// Search a snapshot.
fn run_search(args: SearchArgs) -> Result<()> {
    let tree = load_tree(&args.input)?;
    let query = build_query(&args)?;
    let page = search(&tree, &query);

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        OutputFormat::Text => {
            for hit in &page.results {
                println!(
                    "{:>12}  {:<6}  {}",
                    human_size(hit.size_bytes),
                    hit.category,
                    hit.full_path_orig
                );
            }
            println!();
            println!(" {} shown, {} matched", page.results.len(), page.total);
            for (category, count) in &page.stats {
                println!("   {category}: {count}");
            }
        }
    }
    Ok(())
}

fn build_query(args: &SearchArgs) -> Result<SearchQuery> {
    let name = args
        .query
        .as_deref()
        .filter(|q| !q.is_empty())
        .map(NamePattern::new)
        .transpose()?;

    let mut size = Vec::new();
    let size_clauses: [(&Option<String>, fn(u64) -> SizeFilter); 5] = [
        (&args.size_gt, SizeFilter::Gt),
        (&args.size_gte, SizeFilter::Gte),
        (&args.size_lt, SizeFilter::Lt),
        (&args.size_lte, SizeFilter::Lte),
        (&args.size_eq, SizeFilter::Eq),
    ];
    for (value, make) in size_clauses {
        if let Some(value) = value {
            size.push(make(parse_size(value)?));
        }
    }
    if let Some(range) = &args.size_between {
        let Some((min, max)) = range.split_once(',') else {
            bail!("--size-between expects MIN,MAX, got {range:?}");
        };
        size.push(SizeFilter::between(parse_size(min)?, parse_size(max)?)?);
    }

    type Bound = Option<DateTime<Utc>>;
    let time_clauses = |gt: Bound, gte: Bound, lt: Bound, lte: Bound| -> Vec<TimeFilter> {
        [
            gt.map(TimeFilter::Gt),
            gte.map(TimeFilter::Gte),
            lt.map(TimeFilter::Lt),
            lte.map(TimeFilter::Lte),
        ]
        .into_iter()
        .flatten()
        .collect()
    };

    Ok(SearchQuery {
        name,
        start_path: args.path.clone(),
        categories: args.types.iter().copied().collect(),
        size,
        created: time_clauses(
            args.created_gt,
            args.created_gte,
            args.created_lt,
            args.created_lte,
        ),
        modified: time_clauses(
            args.modified_gt,
            args.modified_gte,
            args.modified_lt,
            args.modified_lte,
        ),
        page: Page::new(args.offset, args.limit),
    })
}

/// Report duplicate groups in a snapshot.
fn run_duplicates(input: &Path, min_size: &str, top_n: usize, format: OutputFormat) -> Result<()> {
    let tree = load_tree(input)?;
    let config = DuplicateConfig::builder()
        .min_size(parse_size(min_size)?)
        .max_groups(top_n)
        .build()
        .map_err(|e| eyre!("Invalid duplicate configuration: {e}"))?;
    let report = DuplicateFinder::with_config(config).find_duplicates(&tree);

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Duplicate File Report");
            println!("{}", "─".repeat(70));
            println!();

            if report.groups.is_empty() {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.total_groups, report.total_files
                );
                let wasted: u64 = report.groups.iter().map(|g| g.wasted_bytes()).sum();
                println!(" Reclaimable in shown groups: {}", human_size(wasted));
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} total)",
                        i + 1,
                        group.count,
                        human_size(group.size)
                    );
                    for path in &group.paths {
                        println!("   {path}");
                    }
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Parse a size string (e.g., "512", "1KB", "10MB", "1.5G").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(digits_end);
    let num: f64 = num
        .parse()
        .with_context(|| format!("Invalid size {s:?}"))?;

    let multiplier: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1 << 10,
        "M" | "MB" => 1 << 20,
        "G" | "GB" => 1 << 30,
        "T" | "TB" => 1 << 40,
        other => bail!("Unknown size unit {other:?}"),
    };
    Ok((num * multiplier as f64) as u64)
}

/// Parse RFC 3339 or `YYYY-MM-DD[THH:MM[:SS]]` (taken as UTC).
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(eyre!("Invalid time {s:?}; expected YYYY-MM-DD[THH:MM[:SS]] or RFC 3339"))
}
