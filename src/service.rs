//! Upsert and query operations over the reading store

use chrono::Utc;
use tracing::info;

use crate::{
    database::Database,
    errors::RescueRadarError,
    models::{Reading, ReadingPayload, UpsertOutcome},
    notify::Broadcaster,
};

/// Upper bound on rows returned by the recent scan and the export
pub const RECENT_LIMIT: u32 = 500;

/// Applies incoming readings and answers queries.
///
/// Live notification is optional: without a [`Broadcaster`] upserts behave
/// exactly the same, they just reach nobody.
#[derive(Debug, Clone)]
pub struct ReadingService {
    database: Database,
    notifier: Option<Broadcaster>,
}

impl ReadingService {
    pub fn new(database: Database, notifier: Option<Broadcaster>) -> Self {
        Self { database, notifier }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Create or overwrite the row for the payload's victim.
    ///
    /// Validation failures happen before anything touches the store. The
    /// fan-out runs only after the write committed and cannot fail the call.
    pub async fn record(&self, payload: ReadingPayload) -> Result<UpsertOutcome, RescueRadarError> {
        let reading = payload.into_new_reading()?;
        let outcome = self.database.upsert(&reading, Utc::now()).await?;

        if let Some(notifier) = &self.notifier {
            notifier.publish(&outcome.reading);
        }

        info!(
            "{} victim {} distance={:.2}",
            outcome.action, outcome.reading.victim_id, outcome.reading.distance_cm
        );
        Ok(outcome)
    }

    /// The most recently updated readings, newest first
    pub async fn recent(&self) -> Result<Vec<Reading>, RescueRadarError> {
        self.database.list_recent(RECENT_LIMIT).await
    }

    pub async fn latest(&self) -> Result<Option<Reading>, RescueRadarError> {
        Ok(self.database.list_recent(1).await?.into_iter().next())
    }

    pub async fn find(&self, victim_id: &str) -> Result<Reading, RescueRadarError> {
        self.database
            .find_by_victim_id(victim_id)
            .await?
            .ok_or_else(|| RescueRadarError::NotFound(victim_id.to_string()))
    }
}
