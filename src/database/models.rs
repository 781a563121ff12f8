// src/database/models.rs
use chrono::DateTime;

use crate::{
    errors::RescueRadarError,
    models::{Reading, UpsertAction, UpsertOutcome},
};

/// Row of `victim_readings`, timestamps in UTC microseconds
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ReadingRow {
    pub id: i64,
    pub victim_id: String,
    pub distance_cm: f64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub gas_ppm: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: i64,
    pub recorded_at: i64,
}

impl ReadingRow {
    /// A row fresh from an insert has never been refreshed, so both
    /// timestamps agree; every update moves `recorded_at` strictly forward.
    pub fn into_outcome(self) -> Result<UpsertOutcome, RescueRadarError> {
        let action = if self.created_at == self.recorded_at {
            UpsertAction::Created
        } else {
            UpsertAction::Updated
        };
        Ok(UpsertOutcome {
            action,
            reading: self.try_into()?,
        })
    }
}

impl TryFrom<ReadingRow> for Reading {
    type Error = RescueRadarError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::from_timestamp_micros(row.recorded_at)
            .ok_or(RescueRadarError::InvalidTimestamp(row.recorded_at))?;
        Ok(Reading {
            id: row.id,
            victim_id: row.victim_id,
            distance_cm: row.distance_cm,
            temperature_c: row.temperature_c,
            humidity_pct: row.humidity_pct,
            gas_ppm: row.gas_ppm,
            latitude: row.latitude,
            longitude: row.longitude,
            timestamp,
        })
    }
}
