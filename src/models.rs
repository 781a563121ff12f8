//! Data models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::errors::RescueRadarError;
use serde_json::{Map, Value};

/// Latest known state of one victim, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Surrogate identifier assigned by the store
    pub id: i64,
    /// Natural key, unique across the table
    pub victim_id: String,
    /// Distance to the victim in centimetres
    pub distance_cm: f64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub gas_ppm: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Time of the last create or update, UTC
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Both GPS coordinates, when the device reported a full fix
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Validated reading ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub victim_id: String,
    pub distance_cm: f64,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub gas_ppm: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Reading as posted by a field device.
///
/// Every field is read on its own, so one unusable value (wrong type, out of
/// range) only blanks that field. Auxiliary sensor values that cannot be
/// read as numbers become `None`; only the distance is mandatory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingPayload {
    pub victim_id: Option<String>,
    pub distance_cm: Option<Value>,
    pub distance: Option<Value>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub gas: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ReadingPayload {
    /// Parse a request body. Anything that is not a JSON object reads as an
    /// empty payload, which then fails on the missing distance. A repeated
    /// key keeps its last value.
    pub fn from_slice(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => Self::from_fields(fields),
            _ => Self::default(),
        }
    }

    fn from_fields(mut fields: Map<String, Value>) -> Self {
        let number = |key: &str| fields.get(key).and_then(coerce_f64);
        let temperature = number("temperature");
        let humidity = number("humidity");
        let gas = number("gas");
        let latitude = number("latitude");
        let longitude = number("longitude");

        Self {
            victim_id: fields.remove("victim_id").and_then(victim_id_text),
            distance_cm: fields.remove("distance_cm").filter(|v| !v.is_null()),
            distance: fields.remove("distance").filter(|v| !v.is_null()),
            temperature,
            humidity,
            gas,
            latitude,
            longitude,
        }
    }

    /// Check the distance and fill in a victim id when none was sent
    pub fn into_new_reading(self) -> Result<NewReading, RescueRadarError> {
        let raw_distance = self
            .distance_cm
            .or(self.distance)
            .ok_or_else(|| RescueRadarError::validation("distance_cm required"))?;
        let distance_cm = coerce_f64(&raw_distance)
            .ok_or_else(|| RescueRadarError::validation("invalid distance value"))?;

        Ok(NewReading {
            victim_id: self.victim_id.unwrap_or_else(generate_victim_id),
            distance_cm,
            temperature_c: self.temperature,
            humidity_pct: self.humidity,
            gas_ppm: self.gas,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Whether an upsert inserted a new row or overwrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpsertAction {
    Created,
    Updated,
}

impl std::fmt::Display for UpsertAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertAction::Created => write!(f, "CREATED"),
            UpsertAction::Updated => write!(f, "UPDATED"),
        }
    }
}

/// Result of applying one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub reading: Reading,
}

/// Payload pushed to live listeners
#[derive(Debug, Clone, Serialize)]
pub struct ReadingUpdate<'a> {
    pub reading: &'a Reading,
}

/// `vic-` followed by 8 random hex characters. Collisions are not checked.
pub fn generate_victim_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("vic-{}", &hex[..8])
}

/// Best-effort numeric coercion of a JSON value
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }?;
    number.is_finite().then_some(number)
}

/// ISO-8601 with microseconds and a `Z` suffix
fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Non-empty strings are used verbatim, numbers by their decimal text
fn victim_id_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
