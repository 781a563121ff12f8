// src/database.rs
mod models;

use chrono::{DateTime, Utc};
use sqlx::{any::AnyPoolOptions, AnyPool};
use tracing::{debug, error, info};

use crate::{
    config::{DatabaseBackend, DatabaseConfig},
    errors::RescueRadarError,
    models::{NewReading, Reading, UpsertOutcome},
};
use models::ReadingRow;

const READING_COLUMNS: &str = "id, victim_id, distance_cm, temperature_c, humidity_pct, \
     gas_ppm, latitude, longitude, created_at, recorded_at";

/// Reading store, one row per victim
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    backend: DatabaseBackend,
}

impl Database {
    /// Wrap an existing pool
    pub fn new(pool: AnyPool, backend: DatabaseBackend) -> Self {
        Self { pool, backend }
    }

    /// Connect with default pool settings
    pub async fn from_url(url: &str) -> Result<Self, RescueRadarError> {
        let config = DatabaseConfig {
            url: url.to_string(),
            max_connections: 5,
            acquire_timeout: std::time::Duration::from_secs(10),
            init_on_startup: false,
        };
        Self::connect(&config).await
    }

    /// Open a pool against the configured engine
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RescueRadarError> {
        config.validate()?;
        let backend = config.backend()?;
        sqlx::any::install_default_drivers();

        info!(
            "Connecting to {:?} database: max_connections={}, acquire_timeout={:?}",
            backend, config.max_connections, config.acquire_timeout
        );

        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!("Failed to open database: {}", e);
                RescueRadarError::DatabaseConnectionError(e.to_string())
            })?;

        Ok(Self::new(pool, backend))
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Create table `victim_readings` and its index if absent
    pub async fn init_schema(&self) -> Result<(), RescueRadarError> {
        let create_table = match self.backend {
            DatabaseBackend::Sqlite => {
                "CREATE TABLE IF NOT EXISTS victim_readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    victim_id TEXT NOT NULL UNIQUE,
                    distance_cm REAL NOT NULL,
                    temperature_c REAL,
                    humidity_pct REAL,
                    gas_ppm REAL,
                    latitude REAL,
                    longitude REAL,
                    created_at INTEGER NOT NULL,
                    recorded_at INTEGER NOT NULL
                )"
            }
            DatabaseBackend::Postgres => {
                "CREATE TABLE IF NOT EXISTS victim_readings (
                    id BIGSERIAL PRIMARY KEY,
                    victim_id TEXT NOT NULL UNIQUE,
                    distance_cm DOUBLE PRECISION NOT NULL,
                    temperature_c DOUBLE PRECISION,
                    humidity_pct DOUBLE PRECISION,
                    gas_ppm DOUBLE PRECISION,
                    latitude DOUBLE PRECISION,
                    longitude DOUBLE PRECISION,
                    created_at BIGINT NOT NULL,
                    recorded_at BIGINT NOT NULL
                )"
            }
        };

        sqlx::query(create_table).execute(&self.pool).await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_victim_readings_recorded_at \
             ON victim_readings(recorded_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("Schema for victim_readings is in place");
        Ok(())
    }

    /// Look up the current row for a victim
    pub async fn find_by_victim_id(
        &self,
        victim_id: &str,
    ) -> Result<Option<Reading>, RescueRadarError> {
        let sql = format!("SELECT {READING_COLUMNS} FROM victim_readings WHERE victim_id = $1");
        let row: Option<ReadingRow> = sqlx::query_as(&sql)
            .bind(victim_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Reading::try_from).transpose()
    }

    /// Insert or overwrite the row for `reading.victim_id` in one statement.
    ///
    /// The unique index on `victim_id` arbitrates concurrent writers, so two
    /// requests for the same victim never produce two rows. On conflict the
    /// refreshed timestamp is the later of `now` and one microsecond past the
    /// stored value.
    pub async fn upsert(
        &self,
        reading: &NewReading,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, RescueRadarError> {
        let now_us = now.timestamp_micros();
        let sql = format!(
            "INSERT INTO victim_readings (
                victim_id, distance_cm, temperature_c, humidity_pct,
                gas_ppm, latitude, longitude, created_at, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (victim_id) DO UPDATE SET
                distance_cm = excluded.distance_cm,
                temperature_c = excluded.temperature_c,
                humidity_pct = excluded.humidity_pct,
                gas_ppm = excluded.gas_ppm,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                recorded_at = CASE
                    WHEN excluded.recorded_at > victim_readings.recorded_at
                        THEN excluded.recorded_at
                    ELSE victim_readings.recorded_at + 1
                END
            RETURNING {READING_COLUMNS}"
        );

        let row: ReadingRow = sqlx::query_as(&sql)
            .bind(reading.victim_id.as_str())
            .bind(reading.distance_cm)
            .bind(reading.temperature_c)
            .bind(reading.humidity_pct)
            .bind(reading.gas_ppm)
            .bind(reading.latitude)
            .bind(reading.longitude)
            .bind(now_us)
            .bind(now_us)
            .fetch_one(&self.pool)
            .await?;

        let outcome = row.into_outcome()?;
        debug!(
            "Upserted victim {} as row {} ({})",
            outcome.reading.victim_id, outcome.reading.id, outcome.action
        );
        Ok(outcome)
    }

    /// Most recently updated rows, newest first
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Reading>, RescueRadarError> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM victim_readings \
             ORDER BY recorded_at DESC, id DESC LIMIT $1"
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Reading::try_from).collect()
    }
}
