use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::utils::{config::get_config, embedding::EmbeddingProvider};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config, validated at startup
    let config = get_config()?;

    let embeddings = EmbeddingProvider::from_config(&config, None)?;
    info!(
        embedding_backend = embeddings.backend_label(),
        embedding_dimension = embeddings.dimension(),
        "Embedding provider initialized"
    );

    let api_state = ApiState::new(&config, embeddings);

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(AppState { api_state });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
