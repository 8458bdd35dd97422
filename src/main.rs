//! Zentinel SOAP dispatch server binary.
//!
//! Run with: `zentinel-soap-dispatch --config config.yaml`
//!
//! Serves the endpoints declared in the configuration over HTTP.

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use zentinel_soap_dispatch::transport::TransportHeaders;
use zentinel_soap_dispatch::{
    DispatcherConfig, MessageDispatcher, SoapMessageReceiver, StaticEndpoint, TransportMessage,
    TransportResponse,
};

/// SOAP dispatch server for Zentinel.
///
/// Routes SOAP 1.1/1.2 requests to the configured endpoints by payload root,
/// SOAP action or WS-Addressing action, answering with responses or faults.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address, overriding `server.listen`
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting Zentinel SOAP dispatch server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config file: {}", args.config.display());

    // Load configuration
    let config: DispatcherConfig = if args.config.exists() {
        let content = tokio::fs::read_to_string(&args.config)
            .await
            .context("Failed to read config file")?;
        serde_yaml::from_str(&content).context("Failed to parse config file")?
    } else {
        info!("Config file not found, using defaults");
        DispatcherConfig::default()
    };

    info!(
        endpoints = config.endpoints.len(),
        addressing = config.addressing.enabled,
        validation = config.validation.enabled,
        soap_version = %config.settings.soap_version,
        "Configuration loaded"
    );

    let mut endpoints = HashMap::new();
    for entry in &config.endpoints {
        let endpoint = StaticEndpoint::from_config(entry)
            .with_context(|| format!("Invalid endpoint '{}'", entry.name))?;
        endpoints.insert(entry.name.clone(), endpoint.into_endpoint());
    }
    let dispatcher = MessageDispatcher::from_config(&config, &endpoints)
        .context("Failed to build dispatcher")?;
    let receiver = Arc::new(SoapMessageReceiver::from_config(
        &config.settings,
        Arc::new(dispatcher),
    ));

    let app = Router::new()
        .route(&config.server.path, post(soap_handler))
        .layer(DefaultBodyLimit::max(config.settings.max_body_size))
        .with_state(receiver);

    let listen = args.listen.unwrap_or(config.server.listen);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    info!(addr = %listen, path = %config.server.path, "SOAP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("SOAP dispatch server stopped");
    Ok(())
}

async fn soap_handler(
    State(receiver): State<Arc<SoapMessageReceiver>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let transport_headers: TransportHeaders = headers
        .iter()
        .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
        .collect();
    let message = TransportMessage::new(transport_headers, body.to_vec());

    // Dispatch is synchronous; keep it off the async workers.
    match tokio::task::spawn_blocking(move || receiver.receive(message)).await {
        Ok(response) => into_http(response),
        Err(e) => {
            error!(error = %e, "Dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn into_http(response: TransportResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let Some(message) = response.message else {
        return status.into_response();
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in message.headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(message.body)).unwrap_or_else(|e| {
        error!(error = %e, "Invalid response headers");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, stopping server");
}
