//! Harvester CLI
//!
//! Runs the web server, or a one-shot harvest straight to an export
//! file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pepites_harvester::error::Result;
use pepites_harvester::export;
use pepites_harvester::harvest::{HarvestSink, ListingSource, Orchestrator};
use pepites_harvester::models::{Config, Record};
use pepites_harvester::server::{self, AppState};
use pepites_harvester::services::{AnnuaireClient, DirectoryClient};
use pepites_harvester::utils::http::create_client;
use tokio_util::sync::CancellationToken;

/// Startup directory and school directory harvester
#[derive(Parser, Debug)]
#[command(
    name = "pepites-harvester",
    version,
    about = "Web-triggered harvester for the startup directory and the school directory API"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve,

    /// One-shot startup directory harvest to an export file
    Harvest {
        /// Listing pages to crawl (0 = all pages)
        #[arg(long, default_value_t = 1)]
        pages: usize,

        /// Also visit each startup's detail page
        #[arg(long)]
        details: bool,

        /// Restrict to one category slug
        #[arg(long)]
        category: Option<String>,

        /// Crawl every discovered category
        #[arg(long)]
        all_categories: bool,

        /// Export format: csv or xlsx
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// One-shot school directory harvest to an export file
    Schools {
        /// Department code or name to filter by
        #[arg(long)]
        department: Option<String>,

        /// Record cap (0 = all)
        #[arg(long, default_value_t = 0)]
        max_records: usize,

        /// Export format: csv or xlsx
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Sink for one-shot runs: progress goes to the log, batches are
/// dropped (the run's return value carries the records).
struct ConsoleSink;

impl HarvestSink for ConsoleSink {
    fn progress(&self, current: usize, total: usize, message: &str) {
        info!("[{}/{}] {}", current, total, message);
    }

    fn records(&self, _batch: Vec<Record>) {}
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Serve => {
            let state = AppState::new(config)?;
            server::serve(state).await?;
        }

        Command::Harvest {
            pages,
            details,
            category,
            all_categories,
            format,
        } => {
            let client = create_client(&config.crawler)?;
            let directory = Arc::new(DirectoryClient::new(client, config.crawler.clone()))
                as Arc<dyn ListingSource>;
            let orchestrator =
                Orchestrator::new(directory, &config.crawler, CancellationToken::new());

            let startups = if all_categories {
                orchestrator.run_all_categories(details, &ConsoleSink).await
            } else {
                orchestrator
                    .run(pages, details, category.as_deref(), &ConsoleSink)
                    .await
            };

            let records: Vec<Record> = startups.into_iter().map(Record::from).collect();
            let path = export::export(
                &records,
                &format,
                Path::new(&config.export.data_dir),
                "startups",
            )?;
            info!("wrote {}", path.display());
        }

        Command::Schools {
            department,
            max_records,
            format,
        } => {
            let client = create_client(&config.crawler)?;
            let annuaire = AnnuaireClient::new(client, config.annuaire.clone());

            let schools = annuaire
                .run(
                    department.as_deref(),
                    max_records,
                    &ConsoleSink,
                    &CancellationToken::new(),
                )
                .await;

            let records: Vec<Record> = schools.into_iter().map(Record::from).collect();
            let path = export::export(
                &records,
                &format,
                Path::new(&config.export.data_dir),
                "schools",
            )?;
            info!("wrote {}", path.display());
        }

        Command::Validate => {
            // Validation already ran above; reaching this point means ok
            info!("Config OK");
        }
    }

    Ok(())
}
