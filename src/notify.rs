//! Live listener fan-out
//!
//! Every successful upsert is pushed to whoever is connected at that moment.
//! Nothing is queued for absent listeners and nothing is retried; a listener
//! that falls behind by more than the channel capacity skips updates.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{Reading, ReadingUpdate};

/// Handle for publishing reading updates to live listeners
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Register a new listener
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push `{"reading": ...}` to all connected listeners.
    ///
    /// Returns how many listeners were handed the update. Failures are
    /// logged and reported as zero deliveries, never as errors.
    pub fn publish(&self, reading: &Reading) -> usize {
        let message = match serde_json::to_string(&ReadingUpdate { reading }) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to encode update for victim {}: {}", reading.victim_id, e);
                return 0;
            }
        };

        match self.tx.send(message) {
            Ok(listeners) => {
                debug!("Pushed update for victim {} to {} listeners", reading.victim_id, listeners);
                listeners
            }
            Err(_) => {
                debug!("No live listeners for update of victim {}", reading.victim_id);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading() -> Reading {
        Reading {
            id: 1,
            victim_id: "vic-live".to_string(),
            distance_cm: 12.0,
            temperature_c: None,
            humidity_pct: None,
            gas_ppm: Some(400.0),
            latitude: None,
            longitude: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_listeners_is_harmless() {
        let broadcaster = Broadcaster::new(4);
        assert_eq!(broadcaster.listener_count(), 0);
        assert_eq!(broadcaster.publish(&reading()), 0);
    }

    #[tokio::test]
    async fn every_listener_receives_update() {
        let broadcaster = Broadcaster::new(4);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.publish(&reading()), 2);

        for rx in [&mut first, &mut second] {
            let message = rx.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&message).unwrap();
            assert_eq!(value["reading"]["victim_id"], "vic-live");
            assert_eq!(value["reading"]["gas_ppm"], 400.0);
        }
    }

    #[tokio::test]
    async fn slow_listener_skips_instead_of_blocking() {
        let broadcaster = Broadcaster::new(1);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(&reading());
        broadcaster.publish(&reading());

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
