//! # The Pearl Destinations
//!
//! Serves two things from one process:
//!
//! - the destination-management API (destinations and per-tourist wishlists,
//!   stored in SQLite), and
//! - the tourist-facing destination detail page, which reads destinations and
//!   updates wishlists through that API over HTTP.
//!
//! The page reaches the API at `remote.base_url`, so the two halves can also be
//! deployed separately.

mod client;
mod config;
mod database;
mod destination;
mod page;
mod server;
mod wishlist;

use client::RemoteClient;
use database::Database;
use destination::DestinationLoader;
use page::PageState;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wishlist::{TouristId, WishlistService};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("PEARL_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Load configuration
    let config = config::Config::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration: {}. Using defaults.", e);
        config::Config::default()
    });

    info!("Starting {} v{}", config.app.name, config.app.version);

    let database = Arc::new(Database::connect(&config.database).await?);

    let remote = RemoteClient::from_config(&config.remote)?;
    info!(base_url = remote.base_url(), "destination service client ready");
    let page_state = PageState {
        loader: Arc::new(DestinationLoader::new(remote.clone(), config.remote.revalidate())),
        wishlists: WishlistService::new(remote),
        default_tourist: TouristId(config.tourist.default_id),
        atomic_upsert: config.page.atomic_upsert,
    };

    let app = server::router(database)
        .merge(page::router(page_state))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(config.server_address()).await?;
    info!("Server starting on http://{}", config.server_address());
    axum::serve(listener, app).await?;

    Ok(())
}
