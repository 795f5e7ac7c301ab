//! pagewatch CLI
//!
//! Batch entry point, intended to be invoked by an external scheduler
//! (cron, CI). One `run` invocation performs one complete watch cycle.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pagewatch::{
    config::{Config, NotifyMode},
    error::Result,
    models::WatchSource,
    notify::{self, SmtpMailer},
    pipeline,
    services::SubscriptionResolver,
    storage::StateStore,
};

/// pagewatch - announcement page watcher
#[derive(Parser, Debug)]
#[command(
    name = "pagewatch",
    version,
    about = "Watches announcement pages for changes and emails subscribers"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one watch cycle: fetch, detect, persist, notify
    Run {
        /// Build notifications but do not send them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration, source list and subscriptions
    Validate,

    /// Show a summary of the persisted state
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run { dry_run } => {
            config.validate()?;

            let mut output = pipeline::execute(&config).await?;

            if dry_run {
                log::info!(
                    "Dry run: {} message(s) built, none sent",
                    output.messages.len()
                );
                for message in &output.messages {
                    log::debug!("Would send to {}: {}", message.to, message.subject);
                }
            } else if !output.messages.is_empty() {
                // Credentials are only required once a send is actually due.
                let mailer = SmtpMailer::from_config(&config.smtp)?;
                notify::dispatch(&mailer, &output.messages, &mut output.report).await;
            }

            output.report.log_summary();
        }

        Command::Validate => {
            log::info!("Validating configuration from {}", cli.config.display());
            config.validate()?;
            log::info!("✓ Config OK");

            let sources = WatchSource::load_all(&config.paths.sources_file)?;
            log::info!(
                "✓ Source list OK ({} source(s) in {})",
                sources.len(),
                config.paths.sources_file
            );

            if config.notify.mode == NotifyMode::PerSubscriber {
                let map = SubscriptionResolver::load(&config.paths.subscriptions_file)?.resolve();
                let recipients: usize = map.values().map(|set| set.len()).sum();
                log::info!(
                    "✓ Subscriptions OK ({} label(s), {} recipient entries)",
                    map.len(),
                    recipients
                );
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            let store = StateStore::load(&config.paths.state_file).await?;
            if store.is_empty() {
                log::info!("No persisted state yet at {}", config.paths.state_file);
                return Ok(());
            }

            let with_fingerprint = store
                .records()
                .values()
                .filter(|r| r.fingerprint.is_some())
                .count();
            let with_error = store
                .records()
                .values()
                .filter(|r| r.last_error.is_some())
                .count();
            let last_checked = store.records().values().map(|r| r.last_checked_at).max();

            log::info!("State file: {}", config.paths.state_file);
            log::info!(
                "{} record(s), {} with fingerprints, {} with errors",
                store.len(),
                with_fingerprint,
                with_error
            );
            if let Some(ts) = last_checked {
                log::info!("Most recent check: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }

    Ok(())
}
