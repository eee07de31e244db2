use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use niche_harvest::batch::{BatchOrchestrator, ProgressSink};
use niche_harvest::cancel::CancelToken;
use niche_harvest::catalog::Catalog;
use niche_harvest::client::NichesHttpClient;
use niche_harvest::config::{ConfigLoader, HarvestConfig, parse_categories};
use niche_harvest::error::NichesError;
use niche_harvest::output::{FetchSummary, JsonOutput, StderrProgress};
use niche_harvest::sheet::SpreadsheetParser;
use niche_harvest::store::Store;

#[derive(Parser)]
#[command(name = "niche-harvest")]
#[command(about = "Download per-category niche exports, parse them and snapshot the records")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch and parse exports for a set of categories")]
    Fetch(FetchArgs),
    #[command(about = "Parse a local .xlsx export and print its records")]
    Parse(ParseArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Categories, e.g. `1-19` or `3,5,8-10`. Falls back to the config file.
    #[arg(long, short)]
    categories: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    retries: Option<u32>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    page_size: Option<u64>,

    #[arg(long)]
    skip: Option<u64>,

    #[arg(long)]
    max_pages: Option<u32>,

    /// Cancel whatever is still running after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,

    #[arg(long)]
    out: Option<Utf8PathBuf>,

    #[arg(long)]
    no_store: bool,
}

#[derive(Args)]
struct ParseArgs {
    file: PathBuf,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<NichesError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &NichesError) -> u8 {
    match error {
        NichesError::InvalidInput(_)
        | NichesError::InvalidCategory(_)
        | NichesError::MissingConfig(_)
        | NichesError::ConfigRead(_)
        | NichesError::ConfigParse(_)
        | NichesError::InvalidConfig(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch(args) => run_fetch(args, cli.quiet),
        Commands::Parse(args) => run_parse(args),
    }
}

fn apply_overrides(config: &mut HarvestConfig, args: &FetchArgs) {
    if let Some(value) = args.concurrency {
        config.max_concurrency = value;
    }
    if let Some(value) = args.retries {
        config.max_retries = value;
    }
    if let Some(value) = args.timeout_secs {
        config.request_timeout = Duration::from_secs(value);
    }
    if let Some(value) = args.page_size {
        config.page_size = value;
    }
    if let Some(value) = args.skip {
        config.start_offset = value;
    }
    if args.max_pages.is_some() {
        config.max_pages = args.max_pages;
    }
}

fn run_fetch(args: FetchArgs, quiet: bool) -> miette::Result<ExitCode> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    let mut config = resolved.harvest;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let categories = match &args.categories {
        Some(spec) => parse_categories(spec)?,
        None => resolved.categories,
    };

    let cancel = match args.deadline_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let client = NichesHttpClient::new(&config)?;
    let orchestrator = BatchOrchestrator::new(client, &config)?;
    let sink: &dyn ProgressSink = if quiet { &JsonOutput } else { &StderrProgress };
    let report = orchestrator.run(&categories, &cancel, sink)?;

    let catalog = Catalog::from_records(&report.records);
    let snapshot = if args.no_store {
        None
    } else {
        let store = match args.out {
            Some(root) => Store::new_with_root(root),
            None => Store::new()?,
        };
        Some(store.write_snapshot(&report, &catalog)?)
    };

    let mut summary = FetchSummary::new(&report);
    summary.goods = Some(catalog.goods.len());
    summary.skipped_rows = Some(catalog.skipped.len());
    summary.snapshot = snapshot;
    JsonOutput::print_summary(&summary).into_diagnostic()?;

    if report.is_total_failure() {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_parse(args: ParseArgs) -> miette::Result<ExitCode> {
    let payload = std::fs::read(&args.file)
        .map_err(|err| NichesError::Filesystem(format!("{}: {err}", args.file.display())))?;
    let records = SpreadsheetParser::parse(&payload).map_err(NichesError::from)?;
    JsonOutput::print_records(&records).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}
