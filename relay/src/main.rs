use anyhow::Context;
use redscribe_core::config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "relay=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let path = std::env::var("REDSCRIBE_CONFIG").unwrap_or_else(|_| "redscribe.toml".to_string());
    let config = AppConfig::load(&path)
        .with_context(|| format!("failed to load configuration from {}", path))?;
    let settings = config.relay;

    let app = relay::create_router(settings.clone()).context("failed to build relay")?;
    let listener = TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address))?;
    info!(address = %settings.bind_address, upstream = %settings.upstream, "Relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down relay");
        })
        .await?;
    Ok(())
}
