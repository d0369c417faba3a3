//! Config validation CLI tool
//!
//! Validates a trendwatchd configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use trendwatch_util::default_config_path;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a trendwatchd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            eprintln!("  validate-config config.example.toml");
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match trendwatch_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", trendwatch_config::CURRENT_CONFIG_VERSION);
            println!("  Site: {} ({})", settings.site.id, settings.site.base_url);
            println!("  Trends: {}", settings.site.trends_url);
            println!(
                "  Scrape every {}s, alerts every {}s",
                settings.schedule.scrape_interval.as_secs(),
                settings.schedule.alert_interval.as_secs()
            );

            let creds = &settings.site.credentials;
            let status = if settings.site.credentials.resolve().is_some() { "set" } else { "missing" };
            println!(
                "  Credentials: ${} / ${} ({})",
                creds.username_env, creds.password_env, status
            );

            if !settings.price_alerts.is_empty() {
                println!();
                println!("Price alerts:");
                for rule in &settings.price_alerts {
                    println!("  - {} {} {}", rule.symbol, rule.condition, rule.target_price);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                trendwatch_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                trendwatch_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                trendwatch_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                trendwatch_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        trendwatch_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
