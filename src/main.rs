use std::sync::Arc;

use tracing::info;
use tracing_subscriber::prelude::*;

use airi::config::Config;
use airi::server::{self, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("airi: {e}");
        std::process::exit(1);
    });

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("airi.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting airi...");
    if config.eleven_api_key.is_none() {
        info!("No speech API key, audio replies disabled");
    }
    if config.base_url.is_none() {
        info!("No BASE_URL, generated audio will not be addressable");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind port {port}: {e}"));

    info!("Airi-chan running on :{port}");

    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
