//! Texnouz Booking CLI service
//!
//! Headless reservation and payment settlement engine, suitable for a
//! systemd service, Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/texnouz-booking/config.toml)
//! booking-service
//!
//! # Custom config path
//! booking-service --config /etc/texnouz-booking/config.toml
//!
//! # Write a config file with every default filled in
//! booking-service --init-config
//!
//! # Validate config without starting
//! booking-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use texnouz_booking::config::AppConfig;
use texnouz_booking::runtime::{init_tracing, BookingRuntime, RuntimeOptions};

#[derive(Parser, Debug)]
#[command(
    name = "booking-service",
    version,
    about = "Charging connector reservation and payment settlement engine",
    long_about = "Texnouz Booking - holds connector slots, settles payment callbacks \
                  and expires unpaid or no-show reservations.\n\n\
                  Default config: ~/.config/texnouz-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "BOOKING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database URL.
    #[arg(long)]
    database_url: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting.
    #[arg(long)]
    check: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(texnouz_booking::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            if cli.check {
                error!("Invalid configuration in {}: {}", config_path.display(), e);
                return Err(e.into());
            }
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            AppConfig::default()
        }
    };

    if let Some(url) = cli.database_url {
        info!("CLI override: database_url = {}", url);
        config.database.url = url;
    }
    if let Some(ref level) = cli.log_level {
        info!("CLI override: log_level = {}", level);
        config.logging.level = level.clone();
    }

    if cli.init_config {
        config.save(&config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    if cli.check {
        config.validate()?;
        println!("Configuration is valid");
        println!("   Config file     : {}", config_path.display());
        println!("   Database        : {}", config.database.url);
        println!("   Payment grace   : {} min", config.booking.payment_grace_minutes);
        println!("   Expiry sweep    : every {}s", config.scheduler.expiry_interval_secs);
        println!("   No-show sweep   : every {}s", config.scheduler.no_show_interval_secs);
        println!("   Log level       : {}", config.logging.level);
        return Ok(());
    }

    let runtime = BookingRuntime::start(RuntimeOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    runtime.install_signal_handler();

    info!("Press Ctrl+C to shutdown gracefully.");

    runtime.shutdown_signal().wait().await;
    runtime.wait().await;

    Ok(())
}
