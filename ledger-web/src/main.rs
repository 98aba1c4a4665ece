//! Ledger Web Server
//!
//! Multi-user work ledger with role-based access control.

use anyhow::Context;
use clap::Parser;
use ledger_core::{init_logging, LedgerConfig};
use ledger_web::LedgerServerBuilder;
use std::path::PathBuf;
use tracing::info;

/// Ledger Web Server - multi-user work ledger with export and audit log
#[derive(Parser)]
#[command(name = "ledger-web")]
#[command(about = "HTTP service for multi-user ledger record keeping")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, e.g. sqlite://ledger.db
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Expose internal error details in responses
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Command-line flags win over file and environment values
    fn apply(self, config: &mut LedgerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.debug {
            config.server.debug = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables before reading configuration
    dotenvy::dotenv().ok();

    let mut config =
        LedgerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    init_logging(&config.logging).context("Failed to initialize logging")?;
    info!(
        address = %config.address(),
        database = %config.database.url,
        "Starting ledger server"
    );

    let server = LedgerServerBuilder::new()
        .config(config)
        .build()
        .await
        .context("Failed to build server")?;

    server.start().await.context("Server failed")?;
    Ok(())
}
