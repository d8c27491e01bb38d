use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use ipcheck_range::IpRange;
use ipcheck_whitelist::{IpWhitelist, WhitelistConfig, WHITELIST_ENV};
use serde::Serialize;
use std::io::Read;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod batch;

use batch::{read_addresses, BatchChecker, BatchResult};

/// IP range parser and white-list checker
#[derive(Parser)]
#[command(name = "ipcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "human", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse range specifications and show their bounds
    Parse(ParseArgs),
    /// Check whether an address is white-listed
    Check(CheckArgs),
    /// Check many addresses from file or stdin
    Batch(BatchArgs),
}

#[derive(Parser)]
struct ParseArgs {
    /// Range specifications (e.g., 10.0.0.0/8, ::1-::128)
    #[arg(value_name = "SPEC", required = true)]
    specs: Vec<String>,
}

/// Where the white-list comes from; falls back to IPCHECK_WHITELIST
#[derive(Args)]
struct SourceArgs {
    /// Comma-separated white-list
    #[arg(short, long, value_name = "LIST")]
    ranges: Option<String>,

    /// White-list file (comma or line separated, # comments)
    #[arg(short, long, value_name = "FILE", conflicts_with = "ranges")]
    file: Option<PathBuf>,
}

#[derive(Parser)]
struct CheckArgs {
    /// IP address to check
    #[arg(value_name = "ADDRESS")]
    address: String,

    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Parser)]
struct BatchArgs {
    /// Input file with one address per line (use '-' for stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Option<String>,

    #[command(flatten)]
    source: SourceArgs,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable table output
    Human,
    /// JSON output (pretty-printed)
    Json,
    /// JSON output (compact)
    JsonCompact,
    /// CSV output
    Csv,
}

#[derive(Serialize)]
struct RangeReport {
    spec: String,
    family: Option<String>,
    lower: Option<String>,
    upper: Option<String>,
    size: Option<String>,
    error: Option<String>,
}

impl RangeReport {
    fn new(spec: &str) -> Self {
        match IpRange::parse(spec) {
            Ok(range) => Self {
                spec: spec.to_string(),
                family: Some(range.family().to_string()),
                lower: Some(range.lower_bound().to_string()),
                upper: Some(range.upper_bound().to_string()),
                size: Some(range.size().to_string()),
                error: None,
            },
            Err(e) => Self {
                spec: spec.to_string(),
                family: None,
                lower: None,
                upper: None,
                size: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct CheckReport {
    address: String,
    valid: bool,
    whitelisted: bool,
    active_ranges: usize,
    rejected_entries: usize,
}

impl CheckReport {
    fn new(whitelist: &IpWhitelist, address: &str) -> Self {
        let snapshot = whitelist.snapshot();
        let valid = address.trim().parse::<IpAddr>().is_ok();

        Self {
            address: address.to_string(),
            valid,
            whitelisted: valid && whitelist.is_whitelisted(address),
            active_ranges: snapshot.ranges().len(),
            rejected_entries: snapshot.rejected().len(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Parse(args) => handle_parse(args, cli.output)?,
        Commands::Check(args) => handle_check(args, cli.output)?,
        Commands::Batch(args) => handle_batch(args, cli.output)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_whitelist(source: &SourceArgs) -> Result<IpWhitelist> {
    let config = if let Some(ref ranges) = source.ranges {
        WhitelistConfig::from_value(ranges.as_str())
    } else if let Some(ref path) = source.file {
        WhitelistConfig::from_file(path)
            .with_context(|| format!("Failed to read white-list from {}", path.display()))?
    } else {
        WhitelistConfig::from_env_or_default()
            .with_context(|| format!("Failed to read white-list from {}", WHITELIST_ENV))?
    };

    if config.is_empty() {
        warn!(
            "No white-list configured (use --ranges, --file or {})",
            WHITELIST_ENV
        );
    }

    Ok(IpWhitelist::from_config(&config))
}

fn handle_parse(args: ParseArgs, format: OutputFormat) -> Result<()> {
    let reports: Vec<RangeReport> = args.specs.iter().map(|s| RangeReport::new(s)).collect();

    match format {
        OutputFormat::Human => print_ranges_human(&reports),
        OutputFormat::Json => print_json(&reports, true)?,
        OutputFormat::JsonCompact => print_json(&reports, false)?,
        OutputFormat::Csv => print_csv(&reports)?,
    }
    Ok(())
}

fn handle_check(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let whitelist = load_whitelist(&args.source)?;
    let report = CheckReport::new(&whitelist, &args.address);

    match format {
        OutputFormat::Human => print_check_human(&report),
        OutputFormat::Json => print_json(&report, true)?,
        OutputFormat::JsonCompact => print_json(&report, false)?,
        OutputFormat::Csv => print_csv(std::slice::from_ref(&report))?,
    }
    Ok(())
}

fn handle_batch(args: BatchArgs, format: OutputFormat) -> Result<()> {
    let whitelist = Arc::new(load_whitelist(&args.source)?);

    let input = match args.input.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read addresses from {}", path))?,
    };

    let checker = BatchChecker::new(Arc::clone(&whitelist), args.workers)?;
    let results = checker.check(read_addresses(&input));

    match format {
        OutputFormat::Human => print_batch_human(&results),
        OutputFormat::Json => print_json(&results, true)?,
        OutputFormat::JsonCompact => print_json(&results, false)?,
        OutputFormat::Csv => print_csv(&results)?,
    }
    Ok(())
}

fn print_ranges_human(reports: &[RangeReport]) {
    println!();
    println!("{}", "IP Ranges".bold().cyan());
    println!("{}", "─".repeat(50).dimmed());

    for report in reports {
        println!("{:>15}: {}", "Spec".bold(), report.spec);

        if let Some(ref error) = report.error {
            println!("{:>15}: {}", "Error".bold(), error.red());
            println!();
            continue;
        }

        if let Some(ref family) = report.family {
            println!("{:>15}: {}", "Family".bold(), family);
        }
        if let (Some(lower), Some(upper)) = (&report.lower, &report.upper) {
            println!("{:>15}: {}", "Lower".bold(), lower.green());
            println!("{:>15}: {}", "Upper".bold(), upper.green());
        }
        if let Some(ref size) = report.size {
            println!("{:>15}: {}", "Addresses".bold(), size);
        }
        println!();
    }
}

fn print_check_human(report: &CheckReport) {
    println!();
    println!("{}", "White-list Check".bold().cyan());
    println!("{}", "─".repeat(50).dimmed());
    println!("{:>15}: {}", "Address".bold(), report.address);

    let verdict = if !report.valid {
        "invalid".yellow()
    } else if report.whitelisted {
        "white-listed".green()
    } else {
        "not white-listed".red()
    };
    println!("{:>15}: {}", "Result".bold(), verdict);
    println!("{:>15}: {}", "Ranges".bold(), report.active_ranges);

    if report.rejected_entries > 0 {
        println!(
            "{:>15}: {}",
            "Skipped".bold(),
            report.rejected_entries.to_string().yellow()
        );
    }
    println!();
}

fn print_batch_human(results: &[BatchResult]) {
    for result in results {
        let verdict = if !result.valid {
            "invalid".yellow()
        } else if result.whitelisted {
            "white-listed".green()
        } else {
            "not white-listed".red()
        };
        println!("{:<40} {}", result.address, verdict);
    }

    let hits = results.iter().filter(|r| r.whitelisted).count();
    println!("{}", "─".repeat(50).dimmed());
    println!("{} of {} white-listed", hits, results.len());
}

fn print_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }
    Ok(())
}

fn print_csv<T: Serialize>(records: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}
