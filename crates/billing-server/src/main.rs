//! Billing HTTP Server
//!
//! Axum-based server exposing the cart, checkout, payment verification,
//! webhook and domain endpoints of the billing core.

mod config;
mod handlers;
mod routes;
mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();
    let (state, processor) = AppState::from_env().await?;
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 billing server running on http://{}", server.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /cart, POST /cart/add      - Cart");
    tracing::info!("  POST /checkout                  - Invoice-first checkout");
    tracing::info!("  POST /payments/create-order     - Mint gateway order");
    tracing::info!("  POST /payments/verify-payment   - Verify payment");
    tracing::info!("  POST /payments/verify-and-complete - Verify and complete");
    tracing::info!("  POST /webhooks/razorpay         - Gateway webhook");

    axum::serve(listener, app).await?;

    // The router held the last handle on the services; let queued jobs finish
    if let Err(e) = processor.await {
        tracing::error!(error = %e, "Fulfillment processor ended abnormally");
    }

    Ok(())
}
