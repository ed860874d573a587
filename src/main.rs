//! Salesboard - sales, order and product dashboards
//!
//! A CLI tool that serves top-customer and top-product rankings over HTTP
//! and renders sectioned dashboards from CSV and JSON sources.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, bind failure, unwritable output, etc.)
//!   2 - A dashboard section failed and --fail-on-error was set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod server;
mod source;
mod table;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use source::{CachedSource, SourceLoader, TableCache};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // The config file may turn on verbose logging, so load it first
    let (config, origin) = match prepare_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, config.general.verbose)?;

    info!("Salesboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    origin.log();

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Salesboard failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .salesboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to change sources, cache lifetime and dashboard sections.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) -> Result<()> {
    let level = args.log_level(config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Dispatch the subcommand. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    match args.command {
        Command::Serve { .. } => {
            println!("🚀 Serving on http://{}", config.server.bind);
            println!("   Orders: {}", config.server.orders_source);
            server::serve(&config).await?;
            Ok(0)
        }
        Command::Report { fail_on_error, .. } => {
            run_report(&config, args.quiet, fail_on_error).await
        }
        Command::InitConfig => Ok(0),
    }
}

/// Build the dashboard and write it out.
async fn run_report(config: &Config, quiet: bool, fail_on_error: bool) -> Result<i32> {
    let loader = SourceLoader::new(config.cache.fetch_timeout_seconds)?;
    let source = CachedSource::new(loader, TableCache::new(config.cache.ttl()));

    println!("📊 Building dashboard: {}", config.report.title);
    for (name, identifier) in &config.sources {
        println!("   {}: {}", name, identifier);
    }

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(config.report.sections.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} sections ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    };

    let dashboard = report::build_dashboard(
        &source,
        &config.report.title,
        &config.sources,
        &config.report.sections,
        &progress,
    )
    .await;

    let output = Path::new(&config.report.output);
    match config.report.format {
        OutputFormat::Markdown => report::write_report(&dashboard, output),
        OutputFormat::Json => report::write_json_report(&dashboard, output),
    }
    .with_context(|| format!("Failed to write dashboard to {}", output.display()))?;

    let summary = &dashboard.summary;
    println!("\n📋 Dashboard Summary:");
    println!("   Sections: {}", summary.total);
    println!(
        "   - ✅ Rendered: {} | ℹ️ Empty: {} | ⚠️ Failed: {}",
        summary.rendered, summary.empty, summary.failed
    );
    println!("   Duration: {:.1}s", dashboard.metadata.duration_seconds);
    println!("\n✅ Dashboard saved to: {}", output.display());

    if fail_on_error && summary.failed > 0 {
        eprintln!(
            "\n⛔ {} section(s) failed. Failing (exit code 2).",
            summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Where the configuration came from.
#[derive(Debug)]
enum ConfigOrigin {
    Explicit(PathBuf),
    DefaultFile,
    BuiltIn,
    /// The default file exists but could not be loaded.
    Fallback(String),
}

impl ConfigOrigin {
    /// Report the origin once the subscriber is installed.
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigOrigin::DefaultFile => info!("Loaded default config from {}", DEFAULT_CONFIG_FILE),
            ConfigOrigin::BuiltIn => debug!("No config file found, using defaults"),
            ConfigOrigin::Fallback(reason) => warn!("Failed to load config: {}", reason),
        }
    }
}

/// Load, merge and validate the configuration.
fn prepare_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    let (mut config, origin) = load_config(args)?;
    config.merge_with_args(args)?;
    config.validate()?;
    Ok((config, origin))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigOrigin::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigOrigin::BuiltIn)),
        Err(e) => Ok((Config::default(), ConfigOrigin::Fallback(format!("{:#}", e)))),
    }
}
