//! Rescue Radar API server

use rescue_radar::{api, build_state, config::AppConfig, errors::RescueRadarError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), RescueRadarError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Defaults, then config/default.toml, then environment
    let config = AppConfig::load()?;
    config.validate()?;

    let state = build_state(&config).await?;
    api::serve(&config.server, state).await?;

    info!("Rescue Radar stopped");
    Ok(())
}
