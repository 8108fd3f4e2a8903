//! Front desk - visitor intake chat for the reception kiosk
//!
//! Drives each kiosk conversation through a pure state machine and hands
//! every visitor message to the external message processor.

mod api;
mod config;
mod directory;
mod extractor;
mod processor;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::AppConfig;
use directory::{HttpVisitorDirectory, VisitorDirectory};
use processor::{HttpMessageProcessor, LoggingProcessor, MessageProcessor};
use runtime::{SessionManager, SessionSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frontdesk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        processor_url = %config.processor_url,
        directory_url = %config.directory_url,
        reset_delay_secs = config.reset_delay.as_secs(),
        processor_timeout_secs = config.processor_timeout.as_secs(),
        confirmation_steps = ?config.confirmation_steps,
        "Configuration loaded"
    );

    // Message processor, with request logging
    let http_processor: Arc<dyn MessageProcessor> = Arc::new(HttpMessageProcessor::new(
        &config.processor_url,
        config.processor_timeout,
    )?);
    let processor: Arc<dyn MessageProcessor> = Arc::new(LoggingProcessor::new(http_processor));

    let directory: Arc<dyn VisitorDirectory> = Arc::new(HttpVisitorDirectory::new(
        &config.directory_url,
        config.processor_timeout,
    )?);

    // Create application state
    let sessions = SessionManager::new(
        processor,
        SessionSettings {
            reset_delay: config.reset_delay,
            confirmation_steps: config.confirmation_steps.clone(),
        },
    );
    let state = AppState::new(sessions, directory);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(compression),
    );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Front desk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
