//! Errand Crawler CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use errand_crawler::{
    config,
    error::{AppError, Result},
    models::{Config, TimeWindow},
    pipeline::{self, Runner},
    sources::ExportSource,
    storage::LocalStorage,
    utils,
};
use tokio_util::sync::CancellationToken;

/// Errand Crawler - channel errand report classifier
#[derive(Parser, Debug)]
#[command(
    name = "errand-crawler",
    version,
    about = "Fetches channel histories and classifies errand reports by region"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, classify and save the parts of a window not stored yet
    Run {
        /// First day of the window (YYYY-MM-DD, local midnight)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the window (YYYY-MM-DD, local midnight)
        #[arg(long)]
        to: NaiveDate,

        /// Skip writing the summary report
        #[arg(long)]
        no_report: bool,
    },

    /// Write the summary report for stored records
    Report {
        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,
    },

    /// Show the stored time range
    Info,

    /// Validate configuration and dictionaries
    Validate,
}

/// Initialize logging before the configuration is read.
///
/// `RUST_LOG` takes precedence; otherwise `--verbose` selects debug and the
/// level from the configuration is applied by [`apply_log_level`].
fn init_logging(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
}

/// Apply the configured level unless `RUST_LOG` or `--verbose` decided it.
fn apply_log_level(config: &Config, verbose: bool) {
    if verbose || std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    log::set_max_level(utils::log::level_filter(&config.logging.level));
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = config::load_config(&cli.config)?;
    apply_log_level(&config, cli.verbose);

    log::info!("Errand Crawler starting...");
    log::debug!("Configuration: {}", cli.config.display());

    let storage = Arc::new(LocalStorage::new(&config.paths.storage_dir));

    match cli.command {
        Command::Run {
            from,
            to,
            no_report,
        } => {
            let window = TimeWindow::from_local_dates(from, to)?;
            let matchers = config::build_matchers(&config)?;
            let source = Arc::new(ExportSource::load_dir(
                &config.paths.export_dir,
                &config.source_names(),
            )?);

            utils::log::header(&format!("Errand run {}", window));
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());

            let runner = Runner::from_config(&config, source, matchers, storage.clone());
            match runner.run(window, &cancel).await {
                Ok(_) => {}
                Err(AppError::Cancelled) => {
                    log::warn!("Run cancelled before completion");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            if !no_report {
                pipeline::run_report(storage.as_ref(), window, &config.paths.report_dir).await?;
            }
        }

        Command::Report { from, to } => {
            let window = TimeWindow::from_local_dates(from, to)?;
            if pipeline::run_report(storage.as_ref(), window, &config.paths.report_dir)
                .await?
                .is_none()
            {
                log::info!("Nothing to report.");
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root().display());
            match storage.manifest().await? {
                Some(manifest) => {
                    log::info!("Stored records: {}", manifest.count);
                    match manifest.range() {
                        Some((min, max)) => log::info!("Stored range: {} .. {}", min, max),
                        None => log::info!("Stored range: empty"),
                    }
                    log::info!("Last updated: {}", manifest.updated_at);
                }
                None => log::info!("No records stored yet."),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config::build_matchers(&config) {
                log::error!("Validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} sources, dictionaries compiled)",
                config.sources.len()
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
