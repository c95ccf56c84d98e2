use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use shopbot_catalog::config::ImportConfig;
use shopbot_catalog::convert::ConversionReport;
use shopbot_catalog::reconcile::SyncReport;
use shopbot_catalog::sample::write_sample_data;
use shopbot_catalog::scan::ScanReport;
use shopbot_catalog::store::{ListFilter, ProductStore};
use shopbot_catalog::sync::{self, ImportPaths};
use shopbot_catalog::{CatalogError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose).and_then(|_| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| CatalogError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    let config = ImportConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Command::Convert(args) => {
            let report = sync::spreadsheet_to_export(&args.input, &args.export, &config)?;
            print_conversion(&report);
        }
        Command::Sync(args) => {
            let mut store = ProductStore::open(&args.database)?;
            let report =
                sync::export_to_store(&args.export, &mut store, &config, Utc::now(), args.dry_run)?;
            print_sync(&report);
        }
        Command::Scan(args) => {
            let mut store = ProductStore::open(&args.database)?;
            let report = sync::assets_to_store(&args.root, &mut store, &config, Utc::now())?;
            print_scan(&report);
        }
        Command::Import(args) => {
            let mut store = ProductStore::open(&args.database)?;
            let paths = ImportPaths {
                spreadsheet: args.input,
                export: args.export,
                assets: args.assets,
            };
            let report = sync::import(&paths, &mut store, &config, Utc::now())?;
            print_conversion(&report.conversion);
            print_sync(&report.sync);
            if let Some(scan) = &report.scan {
                print_scan(scan);
            }
        }
        Command::Stats(args) => {
            let store = ProductStore::open(&args.database)?;
            println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
        }
        Command::List(args) => {
            let store = ProductStore::open(&args.database)?;
            let filter = if args.publishable {
                ListFilter::Publishable
            } else {
                ListFilter::All
            };
            println!("{}", serde_json::to_string_pretty(&store.list(filter)?)?);
        }
        Command::Sample(args) => {
            let sample = write_sample_data(&args.output)?;
            println!(
                "wrote {} products to {} with assets under {}",
                sample.products,
                sample.spreadsheet.display(),
                sample.assets.display()
            );
        }
    }
    Ok(())
}

fn print_conversion(report: &ConversionReport) {
    println!(
        "converted: exported {}, rejected {}, price issues {}",
        report.exported,
        report.missing_identity.len(),
        report.price_issues.len()
    );
    for error in &report.missing_identity {
        println!("  rejected: {error}");
    }
    for issue in &report.price_issues {
        println!("  price: {} '{}': {}", issue.code, issue.raw, issue.error);
    }
}

fn print_sync(report: &SyncReport) {
    println!(
        "synchronized: {}, rejected lines {}",
        report.summary(),
        report.rejected.len()
    );
    for rejected in &report.rejected {
        println!("  rejected: {rejected}");
    }
    for (code, error) in report.held_back() {
        println!("  held back: {code}: {error}");
    }
    for failure in report.failures() {
        println!("  failed: {failure}");
    }
}

fn print_scan(report: &ScanReport) {
    println!(
        "scanned: attached {}, unchanged {}, orphans {}, failed {}, unreadable {}, without folder {}",
        report.attached.len(),
        report.unchanged.len(),
        report.orphans.len(),
        report.failed.len(),
        report.unreadable.len(),
        report.without_folder.len()
    );
    for orphan in &report.orphans {
        println!("  orphan folder: {}", orphan.path.display());
    }
    for (code, reason) in &report.unreadable {
        println!("  unreadable: {code}: {reason}");
    }
    for failure in &report.failed {
        println!("  failed: {failure}");
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile the vendor product spreadsheet, the product store and the asset folders."
)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert the vendor spreadsheet into the intermediate CSV export.
    Convert(ConvertArgs),
    /// Reconcile the intermediate export into the product store.
    Sync(SyncArgs),
    /// Reconcile the asset folder tree into the product store.
    Scan(ScanArgs),
    /// Convert, synchronise and (optionally) scan in one go.
    Import(ImportArgs),
    /// Print store statistics as JSON.
    Stats(DatabaseArgs),
    /// Print stored products as JSON.
    List(ListArgs),
    /// Write a sample spreadsheet and asset tree.
    Sample(SampleArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Vendor spreadsheet (.xlsx or .csv).
    #[arg(long)]
    input: PathBuf,

    /// Intermediate CSV export to write.
    #[arg(long)]
    export: PathBuf,
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Intermediate CSV export to read.
    #[arg(long)]
    export: PathBuf,

    /// SQLite product store.
    #[arg(long)]
    database: PathBuf,

    /// Report what would change without writing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Directory holding one folder per product code.
    #[arg(long)]
    root: PathBuf,

    /// SQLite product store.
    #[arg(long)]
    database: PathBuf,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Vendor spreadsheet (.xlsx or .csv).
    #[arg(long)]
    input: PathBuf,

    /// Intermediate CSV export to write and reconcile from.
    #[arg(long)]
    export: PathBuf,

    /// SQLite product store.
    #[arg(long)]
    database: PathBuf,

    /// Directory holding one folder per product code.
    #[arg(long)]
    assets: Option<PathBuf>,
}

#[derive(clap::Args)]
struct DatabaseArgs {
    /// SQLite product store.
    #[arg(long)]
    database: PathBuf,
}

#[derive(clap::Args)]
struct ListArgs {
    /// SQLite product store.
    #[arg(long)]
    database: PathBuf,

    /// Only products ready for publishing.
    #[arg(long)]
    publishable: bool,
}

#[derive(clap::Args)]
struct SampleArgs {
    /// Directory to write the sample data into.
    #[arg(long)]
    output: PathBuf,
}
