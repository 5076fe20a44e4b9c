//! CLI entry point for the batch ISO remuxer
//!
//! `discover` builds a catalog from directories of disc images, `process`
//! remuxes the main feature of every pending disc, and `status` summarizes a
//! catalog. Ctrl-C stops either phase cleanly.

use clap::{ArgAction, Args, Parser, Subcommand};
use iso_remux::config::ConfigError;
use iso_remux::{
    check_makemkvcon_available, derive_plan, discover, discs_from_paths, load_catalog,
    save_catalog, scan_disc_images, summarize, CheckpointError, Config, DiscTool,
    DiscoveryError, InspectSettings, MakeMkv, RemuxError, RemuxOrchestrator, RemuxSettings,
    ScanError, StartupError,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Batch remuxer: extract the main feature of each disc image into MKV
#[derive(Parser, Debug)]
#[command(name = "iso-remux")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan directories for disc images and record their main features
    Discover(DiscoverArgs),
    /// Remux the main feature of every pending disc in a catalog
    Process(ProcessArgs),
    /// Print a summary of a catalog
    Status {
        /// Catalog document to read
        #[arg(long)]
        load_json: PathBuf,
    },
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Directory to search for disc images (repeatable)
    #[arg(long = "in-dir", required = true, num_args = 1..)]
    in_dirs: Vec<PathBuf>,

    /// Where to write the catalog
    #[arg(long)]
    json: PathBuf,

    /// Minimum title length in seconds
    #[arg(long)]
    min_length: Option<u32>,

    /// Fraction of the image size a title must exceed
    #[arg(long)]
    size_cutoff: Option<f64>,

    /// Discs inspected in parallel (0 = one per core)
    #[arg(long)]
    workers: Option<u32>,

    /// Skip the makemkvcon availability check
    #[arg(long)]
    skip_checks: bool,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Catalog written by `discover` or a previous checkpoint
    #[arg(long)]
    load_json: PathBuf,

    /// Root directory for the remuxed files
    #[arg(long)]
    out_dir: PathBuf,

    /// Only remux discs with these names (title, folder or file name)
    #[arg(long, num_args = 1..)]
    filter: Vec<String>,

    /// Where to write the catalog if the batch stops early
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Log failed remuxes and keep going
    #[arg(long)]
    continue_on_error: bool,

    /// Skip the makemkvcon availability check
    #[arg(long)]
    skip_checks: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Startup(#[from] StartupError),

    #[error("{0}")]
    Scan(#[from] ScanError),

    #[error("{0}; nothing was saved")]
    Discovery(#[from] DiscoveryError),

    #[error(
        "Discovery interrupted; {inspected} inspected discs written to {}. Run discover again for a complete catalog",
        path.display()
    )]
    PartialDiscovery { path: PathBuf, inspected: usize },

    #[error("{0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("{0}")]
    Remux(#[from] RemuxError),

    #[error("Directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("File does not exist: {}", .0.display())]
    MissingFile(PathBuf),
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            cancel.cancel();
        }
    });
}

async fn preflight(binary: &str, skip: bool) -> Result<(), CliError> {
    if skip {
        warn!("skipping startup checks (--skip-checks enabled)");
        return Ok(());
    }
    match check_makemkvcon_available(binary).await? {
        Some(version) => info!(binary, %version, "makemkvcon found"),
        None => info!(binary, "makemkvcon found"),
    }
    Ok(())
}

async fn run_discover(
    args: DiscoverArgs,
    mut config: Config,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    if let Some(secs) = args.min_length {
        config.discovery.min_length_secs = secs;
    }
    if let Some(cutoff) = args.size_cutoff {
        config.discovery.size_cutoff = cutoff;
    }
    if let Some(workers) = args.workers {
        config.discovery.workers = workers;
    }
    config.validate()?;

    if let Some(missing) = args.in_dirs.iter().find(|dir| !dir.is_dir()) {
        return Err(CliError::MissingDirectory(missing.clone()));
    }
    preflight(&config.makemkv.binary, args.skip_checks).await?;

    let images = scan_disc_images(&args.in_dirs)?;
    let discs = discs_from_paths(images)?;
    info!(images = discs.len(), "scan complete");

    let plan = derive_plan(&config);
    let tool: Arc<dyn DiscTool> = Arc::new(MakeMkv::new(config.makemkv.binary.clone()));
    let catalog = match discover(
        discs,
        tool,
        InspectSettings::from(&config.discovery),
        plan.discovery_workers as usize,
        cancel,
    )
    .await
    {
        Ok(catalog) => catalog,
        Err(err) => return Err(save_interrupted_discovery(err, &args.json)),
    };

    save_catalog(&catalog, &args.json)?;
    info!(path = %args.json.display(), discs = catalog.len(), "catalog written");
    println!("{}", summarize(&catalog));
    Ok(())
}

/// Writes the discs inspected before an interruption to `destination`.
fn save_interrupted_discovery(err: DiscoveryError, destination: &Path) -> CliError {
    let DiscoveryError::Interrupted { inspected } = &err;
    if inspected.is_empty() {
        return CliError::Discovery(err);
    }
    match save_catalog(inspected, destination) {
        Ok(()) => {
            warn!(
                path = %destination.display(),
                discs = inspected.len(),
                "discovery interrupted, inspected discs written"
            );
            CliError::PartialDiscovery {
                path: destination.to_path_buf(),
                inspected: inspected.len(),
            }
        }
        Err(e) => {
            error!(error = %e, "could not write inspected discs after interruption");
            CliError::Checkpoint(e)
        }
    }
}

async fn run_process(
    args: ProcessArgs,
    config: Config,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    if !args.load_json.is_file() {
        return Err(CliError::MissingFile(args.load_json));
    }
    if !args.out_dir.is_dir() {
        return Err(CliError::MissingDirectory(args.out_dir));
    }
    preflight(&config.makemkv.binary, args.skip_checks).await?;

    let mut catalog = load_catalog(&args.load_json)?;
    info!(path = %args.load_json.display(), discs = catalog.len(), "catalog loaded");

    let settings = RemuxSettings {
        output_root: args.out_dir,
        checkpoint_path: args
            .checkpoint
            .unwrap_or_else(|| config.process.checkpoint_path.clone()),
        min_length_secs: config.discovery.min_length_secs,
        continue_on_error: args.continue_on_error || config.process.continue_on_error,
        filter: args.filter,
    };
    let tool: Arc<dyn DiscTool> = Arc::new(MakeMkv::new(config.makemkv.binary.clone()));
    let orchestrator = RemuxOrchestrator::new(tool, settings);

    let report = orchestrator.run(&mut catalog, cancel).await?;

    save_catalog(&catalog, &args.load_json)?;
    info!(
        remuxed = report.remuxed,
        failed = report.failed,
        path = %args.load_json.display(),
        "catalog updated"
    );
    Ok(())
}

fn run_status(load_json: PathBuf) -> Result<(), CliError> {
    if !load_json.is_file() {
        return Err(CliError::MissingFile(load_json));
    }
    let catalog = load_catalog(&load_json)?;
    println!("{}", summarize(&catalog));
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match Config::load_or_default(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let result = match cli.command {
        Command::Discover(args) => run_discover(args, config, &cancel).await,
        Command::Process(args) => run_process(args, config, &cancel).await,
        Command::Status { load_json } => run_status(load_json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
