use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use flowgate_crypto::RsaKeyPairManager;
use flowgate_flows::ContactFlow;
use flowgate_service::{
    config::FlowServiceConfig,
    server::{run_server, AppState},
};
use tokio::{net::TcpListener, sync::watch};
use tracing::info;
use tracing_appender::{
    non_blocking,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    prelude::*,
    EnvFilter, Registry,
};

/// The name of the environment variable for the platform app secret
const APP_SECRET: &str = "APP_SECRET";
/// The name of the environment variable carrying the private key PEM inline
const PRIVATE_KEY: &str = "PRIVATE_KEY";
/// The name of the environment variable for the private key passphrase
const PASSPHRASE: &str = "PASSPHRASE";
/// The directory where the logs are stored.
const LOGS: &str = "./logs";
/// The log file name.
const LOG_FILE: &str = "flowgate-node.log";

/// Command line arguments for the flow endpoint node
#[derive(Parser)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(LOGS).context("Failed to setup logging")?;
    dotenv().ok();

    let args = Args::parse();
    let config = FlowServiceConfig::from_file_path(args.config_path);

    info!("Starting flow endpoint node");

    let app_secret = std::env::var(APP_SECRET)
        .context(format!("Variable {APP_SECRET} not set in the .env file"))?;
    let passphrase = std::env::var(PASSPHRASE).unwrap_or_default();

    // The key PEM can be supplied inline through the environment, the way
    // the platform's quickstarts do, or through a file named in the config.
    let private_pem = match std::env::var(PRIVATE_KEY) {
        Ok(pem) => pem,
        Err(_) => {
            let key_path = config
                .private_key_path
                .as_deref()
                .context("Neither PRIVATE_KEY nor private_key_path is configured")?;
            std::fs::read_to_string(key_path).context("Failed to read private key file")?
        }
    };

    // Decrypted once here; request tasks share the immutable handle.
    let key_manager = RsaKeyPairManager::from_pem(&private_pem, &passphrase)
        .context("Failed to load the RSA private key")?;

    let (shutdown_sender, _shutdown_receiver) = watch::channel(false);

    let app_state = AppState {
        app_secret: Arc::new(app_secret.into_bytes()),
        key_manager: Arc::new(key_manager),
        flow_handler: Arc::new(ContactFlow),
        webhook_verify_token: Arc::new(config.webhook_verify_token.clone()),
    };

    let tcp_listener = TcpListener::bind(&config.service_bind_address)
        .await
        .context("Failed to bind TCP listener")?;

    info!(
        target = "flowgate-node",
        event = "flow_service_spawn",
        bind_address = config.service_bind_address,
        "Starting flow endpoint service"
    );

    run_server(app_state, tcp_listener, shutdown_sender).await?;

    info!(
        target = "flowgate-node",
        event = "flow_service_shutdown",
        "Flow endpoint node shut down successfully"
    );
    Ok(())
}

/// Configure logging with JSON formatting, file output, and console output
fn setup_logging<P: AsRef<Path>>(log_dir: P) -> Result<()> {
    // Set up file appender with rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE);

    // Create a non-blocking writer
    let (non_blocking_appender, _guard) = non_blocking(file_appender);

    // Create JSON formatter for file output
    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_appender);

    // Create console formatter for development
    let console_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_span_events(FmtSpan::ENTER);

    // Create filter from environment variable or default to info
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flowgate_node=debug"));

    // Combine layers with filter
    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
