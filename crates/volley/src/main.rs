use tracing_subscriber::EnvFilter;
use volley::{RelayConfig, VolleyError, VolleyServerBuilder};

#[tokio::main]
async fn main() -> Result<(), VolleyError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env()?;
    tracing::info!(
        addr = %config.bind_addr(),
        origins = %config.allowed_origins,
        host_claim = ?config.host_claim,
        "starting relay"
    );

    let server = VolleyServerBuilder::from_config(&config).build().await?;
    server.run().await
}
