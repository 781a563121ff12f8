//! Tabular report of recent readings
//!
//! The table is built here independently of any document format; a
//! [`ReportRenderer`] turns it into bytes. Which renderer exists is decided
//! once at startup.

#[cfg(feature = "pdf-export")]
pub mod pdf;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{errors::RescueRadarError, models::Reading};

pub const REPORT_TITLE: &str = "Rescue Radar - Victim Readings Report";

pub const COLUMNS: [&str; 8] = [
    "ID",
    "Victim ID",
    "Distance (cm)",
    "Temp (C)",
    "Humidity (%)",
    "Gas (ppm)",
    "GPS",
    "Timestamp",
];

const NOT_AVAILABLE: &str = "N/A";

/// Formatted report, every cell already rendered as text
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<[String; 8]>,
}

impl Report {
    pub fn from_readings(readings: &[Reading], generated_at: DateTime<Utc>) -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            generated_at,
            rows: readings.iter().map(report_row).collect(),
        }
    }
}

fn report_row(reading: &Reading) -> [String; 8] {
    let gps = match reading.position() {
        Some((lat, lon)) => format!("{lat:.6}, {lon:.6}"),
        None => NOT_AVAILABLE.to_string(),
    };
    [
        reading.id.to_string(),
        reading.victim_id.clone(),
        format!("{:.1}", reading.distance_cm),
        format_optional(reading.temperature_c, 1),
        format_optional(reading.humidity_pct, 1),
        format_optional(reading.gas_ppm, 0),
        gps,
        reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ]
}

fn format_optional(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Turns a [`Report`] into a downloadable document
pub trait ReportRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn file_name(&self) -> &'static str;

    fn render(&self, report: &Report) -> Result<Vec<u8>, RescueRadarError>;
}

/// Renderer available in this build, if export is enabled
pub fn default_renderer(enabled: bool) -> Option<Arc<dyn ReportRenderer>> {
    if !enabled {
        info!("Report export disabled by configuration");
        return None;
    }

    #[cfg(feature = "pdf-export")]
    return Some(Arc::new(pdf::PdfRenderer::default()));

    #[cfg(not(feature = "pdf-export"))]
    {
        tracing::warn!("Built without the pdf-export feature, report export disabled");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading() -> Reading {
        Reading {
            id: 3,
            victim_id: "vic-a1b2c3d4".to_string(),
            distance_cm: 42.46,
            temperature_c: Some(0.0),
            humidity_pct: None,
            gas_ppm: Some(412.6),
            latitude: Some(60.1920591),
            longitude: Some(24.9458312),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
        }
    }

    #[test]
    fn row_formatting() {
        let row = report_row(&reading());
        assert_eq!(
            row,
            [
                "3",
                "vic-a1b2c3d4",
                "42.5",
                "0.0",
                "N/A",
                "413",
                "60.192059, 24.945831",
                "2024-03-01 12:30:05 UTC",
            ]
        );
    }

    #[test]
    fn gps_requires_both_coordinates() {
        let mut only_lat = reading();
        only_lat.longitude = None;
        assert_eq!(report_row(&only_lat)[6], "N/A");
    }

    #[test]
    fn report_keeps_reading_order() {
        let mut newer = reading();
        newer.id = 4;
        let report = Report::from_readings(&[newer, reading()], Utc::now());
        assert_eq!(report.title, REPORT_TITLE);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0][0], "4");
        assert_eq!(report.rows[1][0], "3");
    }

    #[test]
    fn disabled_export_has_no_renderer() {
        assert!(default_renderer(false).is_none());
    }
}
