use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use foliodiff_backend::external::alphavantage::AlphaVantageProvider;
use foliodiff_backend::state::AppState;
use foliodiff_backend::{app, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    let provider = AlphaVantageProvider::from_env()
        .map_err(|e| anyhow::anyhow!("failed to initialize market data provider: {e}"))?;
    let state = AppState::new(pool, Arc::new(provider));

    let app = app::create_app(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("foliodiff backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
