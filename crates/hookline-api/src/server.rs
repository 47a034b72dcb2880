//! HTTP server configuration and request routing.
//!
//! Axum server setup with tracing, timeout enforcement, request-id
//! injection, and graceful shutdown. Routes are limited to the inbound
//! receiver and health probe; outbound delivery never goes through HTTP
//! handlers.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::handlers::{
    self,
    receive::{LoggingEventHandler, ReceivedEventHandler},
};

/// Credentials of the trusted automation partner.
///
/// These are this system's own inbound credentials, distinct from any
/// tenant's outbound webhook settings.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// API key the partner must present.
    pub api_key: String,
    /// Shared secret for signature verification over raw request bodies.
    pub shared_secret: String,
}

/// Shared application state, owned by the composition root.
///
/// Constructed explicitly and injected; there are no module-level
/// singletons, so tests instantiate isolated instances freely.
pub struct AppState {
    /// Inbound partner credentials.
    pub config: ReceiverConfig,
    /// Processor for accepted inbound events.
    pub handler: Arc<dyn ReceivedEventHandler>,
}

impl AppState {
    /// Creates state with the default logging handler.
    pub fn new(config: ReceiverConfig) -> Self {
        Self { config, handler: Arc::new(LoggingEventHandler) }
    }

    /// Creates state with a custom inbound event handler.
    pub fn with_handler(config: ReceiverConfig, handler: Arc<dyn ReceivedEventHandler>) -> Self {
        Self { config, handler }
    }
}

/// Creates the Axum router with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/webhooks/receive",
            post(handlers::receive_webhook).get(handlers::receive_discovery),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject a request ID into all responses.
///
/// Adds an `X-Request-Id` header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Binds to the specified address and serves requests until a shutdown
/// signal is received.
///
/// # Errors
///
/// Returns `std::io::Error` if the port is already in use or the network
/// interface is unavailable.
pub async fn start_server(state: Arc<AppState>, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        },
    }
}
