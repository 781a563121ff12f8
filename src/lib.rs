//! Rescue Radar: latest-state store for victim sensor readings
//!
//! Field devices post readings keyed by `victim_id`; each post creates or
//! overwrites that victim's single row, pushes the new state to live
//! listeners and becomes visible through the list and export endpoints.

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod export;
pub mod models;
pub mod notify;
pub mod service;

use std::sync::Arc;

use api::AppState;
use config::AppConfig;
use database::Database;
use errors::RescueRadarError;
use notify::Broadcaster;
use service::ReadingService;
use tracing::info;

/// Resolve optional capabilities and wire up the shared state
pub async fn build_state(config: &AppConfig) -> Result<AppState, RescueRadarError> {
    let database = Database::connect(&config.database).await?;
    if config.database.init_on_startup {
        database.init_schema().await?;
    }

    let notifier = if config.realtime.enabled {
        info!("Live updates enabled");
        Some(Broadcaster::new(config.realtime.capacity))
    } else {
        info!("Live updates disabled");
        None
    };
    let renderer = export::default_renderer(config.export.pdf_enabled);

    Ok(AppState {
        service: ReadingService::new(database, notifier.clone()),
        write_key: Arc::from(config.auth.write_key.as_str()),
        notifier,
        renderer,
    })
}
