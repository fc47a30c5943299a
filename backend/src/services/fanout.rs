//! Best-effort broadcast of accepted readings to connected observers.
//!
//! No buffering and no replay: observers that are not subscribed at send
//! time receive nothing and catch up through the query endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::services::validator::TelemetryMessage;

/// Event name observers receive on the WebSocket.
pub const DEVICE_UPDATE_EVENT: &str = "device-update";

/// A live update for a single accepted reading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub device_id: String,
    pub device_name: String,
    pub data: UpdateData,
}

/// The reading payload carried by a [`DeviceUpdate`]. `timestamp` is the
/// server-assigned ingestion time, not the producer's measurement time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateData {
    pub voltage: f64,
    pub current: f64,
    pub battery_soh: f64,
    pub soh_measurement_time: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeviceUpdate {
    pub fn new(message: &TelemetryMessage, ingested_at: NaiveDateTime) -> Self {
        Self {
            device_id: message.device_id.clone(),
            device_name: message.device_name.clone(),
            data: UpdateData {
                voltage: message.voltage,
                current: message.current,
                battery_soh: message.battery_soh,
                soh_measurement_time: message.soh_measurement_time.clone(),
                timestamp: DateTime::from_naive_utc_and_offset(ingested_at, Utc),
            },
        }
    }
}

/// Fans updates out to every current subscriber. Cheap to clone.
#[derive(Clone)]
pub struct UpdateBroadcaster {
    tx: broadcast::Sender<DeviceUpdate>,
}

impl UpdateBroadcaster {
    /// `capacity` bounds how far a slow observer may lag before it starts
    /// dropping updates.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceUpdate> {
        self.tx.subscribe()
    }

    /// Fire-and-forget send. Returns how many observers were reached; zero
    /// subscribers is not an error.
    pub fn publish(&self, update: DeviceUpdate) -> usize {
        match self.tx.send(update) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No observers connected, update dropped");
                0
            }
        }
    }
}
