//! inbox-gateway: unified inbox gateway binary
//!
//! Usage:
//!   inbox-gateway           - Start the webhook + API server
//!   inbox-gateway --help    - Show help
//!   inbox-gateway --version - Show version

use anyhow::Context;
use inbox_core::{Config, SqliteStore};
use inbox_gateway::{AppState, start_server};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Webhook + API server
    Server,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("inbox-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting inbox-gateway...");
    tracing::info!("Database: {}", config.storage.db_path);

    let store = SqliteStore::new(&config.storage.db_path)
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    let state = AppState::from_config(&config, store).context("Failed to build application")?;
    if state.whatsapp.is_none() && state.instagram.is_none() {
        tracing::warn!("No channels configured; webhooks will be rejected");
    }
    tracing::info!("Loaded {} tenant mappings", config.tenants.len());

    start_server(config.server.port, state).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("inbox-gateway - Unified inbox gateway for WhatsApp and Instagram");
    println!();
    println!("Usage:");
    println!("  inbox-gateway           Start the webhook + API server");
    println!("  inbox-gateway --help    Show this help message");
    println!("  inbox-gateway --version Show version");
    println!();
    println!("Configuration is read from ./inbox-gateway.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  SERVER_PORT                 HTTP port (default: 3000)");
    println!("  DB_PATH                     SQLite database path (default: data/inbox-gateway.db)");
    println!("  HTTP_TIMEOUT_SECS           Provider request timeout (default: 30)");
    println!("  TWILIO_ACCOUNT_SID          Twilio account SID (enables WhatsApp)");
    println!("  TWILIO_AUTH_TOKEN           Twilio auth token");
    println!("  TWILIO_WHATSAPP_NUMBER      Business WhatsApp number");
    println!("  TWILIO_WEBHOOK_URL          Public webhook URL for signature checks");
    println!("  TWILIO_VALIDATE_SIGNATURE   Check X-Twilio-Signature (true/false)");
    println!("  INSTAGRAM_ACCESS_TOKEN      Instagram Graph API token (enables Instagram)");
    println!("  INSTAGRAM_BUSINESS_ACCOUNT_ID  Business account id");
    println!("  INSTAGRAM_VERIFY_TOKEN      Webhook handshake token");
    println!("  INSTAGRAM_APP_SECRET        App secret for payload signatures");
    println!("  RUST_LOG                    Log filter (default: info)");
}
