//! trendwatchd - The trendwatch background service
//!
//! This is the main entry point for the trendwatchd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - WebDriver browser backend and persisted sessions
//! - Scrape pipeline and price alert monitor
//! - Scheduler loop

mod quotes;
mod service;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trendwatch_util::default_config_path;

use crate::service::Service;

/// trendwatchd - Trending topic tracker and price alert service
#[derive(Parser, Debug)]
#[command(name = "trendwatchd")]
#[command(about = "Trending topic tracker and price alert service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/trendwatch/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set TRENDWATCH_DATA_DIR env var)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", env = "TRENDWATCH_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler (default)
    Run,

    /// Scrape the trending page once and exit
    Scrape,

    /// Log in by hand in a visible browser window and save the session
    Login,

    /// Check every price alert once and exit
    Alerts,

    /// Print stored trends
    List {
        /// Maximum number of trends (default: schedule.dashboard_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only trends seen in the last N hours, hottest first
        #[arg(long)]
        since_hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "trendwatchd starting");

    let service = Service::new(&args.config, args.data_dir.clone())?;
    match args.command.unwrap_or(Command::Run) {
        Command::Run => service.run().await,
        Command::Scrape => service.scrape_once().await,
        Command::Login => service.manual_login().await,
        Command::Alerts => service.alerts_once().await,
        Command::List { limit, since_hours } => {
            service.list(limit, since_hours.map(|h| Duration::from_secs(h * 3600)))
        }
    }
}
