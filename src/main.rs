//! # PCM Audio Streamer - Main Application Entry Point
//!
//! HTTP service that takes a WAV filename, converts the file to 8 kHz G.711 A-law,
//! and forwards the encoded bytes to a downstream audio consumer.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **state**: Shared configuration and metrics
//! - **health**: Health and metrics endpoints
//! - **library**: Filename validation and WAV loading from the audio directory
//! - **audio**: RIFF/WAVE parsing, resampling, A-law encoding, and the pipeline tying them together
//! - **forward**: Delivery of encoded audio to the downstream endpoint
//! - **middleware**: Request logging and metrics collection
//! - **handlers**: HTTP request handlers
//! - **error**: Error types and their HTTP responses

mod audio;
mod config;
mod error;
mod forward;
mod handlers;
mod health;
mod library;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use forward::Forwarder;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGINT or SIGTERM arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting pcm-audio-streamer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        files_dir = %config.audio.files_dir,
        target_sample_rate = config.audio.target_sample_rate,
        downstream = %config.forwarding.url,
        "Configuration loaded"
    );

    let app_state = AppState::new(config.clone());
    if !app_state.audio_library().is_available() {
        warn!(
            "Audio directory {} does not exist, every playback request will fail until it does",
            config.audio.files_dir
        );
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // awc clients are tied to the worker's runtime, so one per worker
            .app_data(web::Data::new(Forwarder::new()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure_routes)
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging, filtered by `RUST_LOG`.
///
/// Defaults to `pcm_audio_streamer=debug,actix_web=info` when `RUST_LOG` is unset.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pcm_audio_streamer=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
