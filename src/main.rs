use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pickup_dispatch::api;
use pickup_dispatch::config::Config;
use pickup_dispatch::error::AppError;
use pickup_dispatch::payments::StubGateway;
use pickup_dispatch::seed;
use pickup_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let payments = Arc::new(StubGateway::new(config.payment_return_url.clone()));
    let state = Arc::new(AppState::new(
        config.pricing,
        payments,
        config.event_buffer_size,
    ));

    if config.seed_demo {
        seed::seed_demo(&state)?;
    }

    let app = api::rest::router(state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        price_per_bag = config.pricing.price_per_bag,
        courier_rate_per_bag = config.pricing.courier_rate_per_bag,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
