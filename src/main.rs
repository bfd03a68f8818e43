//! # Tweet Service
//!
//! A Rust web service implementing the tweet side of a Twitter-like social
//! network. See the library documentation for features and endpoints.
//!
//! ## Environment Variables
//!
//! - `DATABASE_URL`: PostgreSQL connection string (in-memory store when unset)
//! - `PORT`: Server port (defaults to 3000)
//! - `LINK_PREVIEWS`: set to `true` to fetch link previews
//! - `RUST_LOG`: log filter, e.g. `info` or `tweet_service=debug`

use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use tweet_service::{
    router, start_publish_cronjob, AppConfig, MemoryStore, PgStore, TweetService, TweetStore,
};
use tweet_service::tweets::LinkPreviewClient;

/// Main entry point for the tweet service.
///
/// This function initializes the logging system, connects the store, starts
/// the scheduled-tweet publisher and serves the HTTP API until terminated.
///
/// # Example Usage
///
/// ```bash
/// # Run on the in-memory store, default port 3000
/// cargo run
///
/// # Run against PostgreSQL with debug logging
/// DATABASE_URL=postgres://localhost/tweets RUST_LOG=debug cargo run
/// ```
///
/// # Panics
///
/// This function will panic if:
/// - `PORT` is not a valid port number
/// - The server port cannot be bound (e.g., port already in use)
#[tokio::main]
async fn main() {
    // Initialize the logging system
    env_logger::init();

    let config = AppConfig::from_env();

    let store: Arc<dyn TweetStore> = match &config.database_url {
        Some(url) => match PgStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to initialize PostgreSQL store: {}", e);
                return;
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    let mut service = TweetService::new(store);
    if config.link_previews {
        match LinkPreviewClient::new(config.link_preview_timeout) {
            Ok(client) => {
                info!("Link previews enabled");
                service = service.with_link_previews(client);
            }
            Err(e) => error!("Failed to build link preview client, previews disabled: {}", e),
        }
    }

    // Start the scheduled tweet publisher
    let scheduler = match start_publish_cronjob(service.clone(), &config.publish_cron).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Failed to create cronjob scheduler: {}", e);
            return;
        }
    };
    if let Err(e) = scheduler.start().await {
        error!("Failed to start cronjob scheduler: {}", e);
        return;
    }
    info!("Scheduled tweet publisher started");

    // Build the HTTP application with all routes and middleware
    let app = router(service).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Starting tweet service on {}", addr);

    // Bind to the address and start serving requests
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }
}
