//! The ingestion pipeline: validate, persist, broadcast.
//!
//! Each inbound message is handled to completion before the transport hands
//! over the next one, so readings for a single device land in delivery
//! order. A message that fails anywhere is logged and dropped; there is no
//! retry and no response channel back to the producer.

use chrono::Utc;
use log::{debug, error, warn};

use crate::models::NewReading;
use crate::services::fanout::{DeviceUpdate, UpdateBroadcaster};
use crate::services::store::{StoreError, TelemetryStore};
use crate::services::validator::{self, RejectReason};

/// Terminal state of one inbound message.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Validated, persisted and broadcast.
    Stored { reading_id: i64 },
    /// Dropped by the validator; nothing was written.
    Rejected(RejectReason),
    /// Dropped because a store operation failed; the reading is lost.
    PersistFailed(StoreError),
}

#[derive(Clone)]
pub struct IngestPipeline {
    store: TelemetryStore,
    broadcaster: UpdateBroadcaster,
}

impl IngestPipeline {
    pub fn new(store: TelemetryStore, broadcaster: UpdateBroadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// Run one raw message through the full pipeline. The device upsert must
    /// succeed before the reading insert is attempted: the reading's foreign
    /// key depends on the device row existing.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let message = match validator::parse_message(topic, payload) {
            Ok(message) => message,
            Err(reason) => {
                warn!("Dropping message on `{}`: {}", topic, reason);
                return IngestOutcome::Rejected(reason);
            }
        };

        debug!(
            "Received data from {}: voltage={} current={} battery_soh={}",
            message.device_id, message.voltage, message.current, message.battery_soh
        );

        if let Err(e) = self
            .store
            .upsert_device(&message.device_id, &message.device_name)
        {
            error!("Error upserting device {}: {}", message.device_id, e);
            return IngestOutcome::PersistFailed(e);
        }

        let ingested_at = Utc::now().naive_utc();
        let new_reading = NewReading {
            device_id: &message.device_id,
            voltage: message.voltage,
            current: message.current,
            battery_soh: message.battery_soh,
            soh_measurement_time: message.soh_measurement_time.as_deref(),
            ingested_at,
        };

        let reading_id = match self.store.insert_reading(&new_reading) {
            Ok(id) => id,
            Err(e) => {
                error!("Error inserting reading for {}: {}", message.device_id, e);
                return IngestOutcome::PersistFailed(e);
            }
        };

        self.broadcaster
            .publish(DeviceUpdate::new(&message, ingested_at));

        IngestOutcome::Stored { reading_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pipeline() -> (IngestPipeline, TelemetryStore, UpdateBroadcaster) {
        let store = TelemetryStore::new(crate::db::test_pool());
        let broadcaster = UpdateBroadcaster::new(8);
        let pipeline = IngestPipeline::new(store.clone(), broadcaster.clone());
        (pipeline, store, broadcaster)
    }

    #[test]
    fn test_valid_message_is_stored_and_broadcast() {
        let (pipeline, store, broadcaster) = test_pipeline();
        let mut rx = broadcaster.subscribe();

        let outcome = pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":12.5,"current":2.1,"battery_soh":95.0}"#,
        );
        assert!(matches!(outcome, IngestOutcome::Stored { .. }));

        let device = store.get_device("dev-1").unwrap().unwrap();
        assert_eq!(device.name, "dev-1");

        let reading = store.latest_reading("dev-1").unwrap().unwrap();
        assert_eq!(reading.voltage, 12.5);
        assert_eq!(reading.current, 2.1);
        assert_eq!(reading.battery_soh, 95.0);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.device_id, "dev-1");
        assert_eq!(update.data.voltage, 12.5);
    }

    #[test]
    fn test_zero_voltage_is_accepted() {
        let (pipeline, store, _broadcaster) = test_pipeline();

        let outcome = pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":0,"current":2.1,"battery_soh":95.0}"#,
        );
        assert!(matches!(outcome, IngestOutcome::Stored { .. }));

        let reading = store.latest_reading("dev-1").unwrap().unwrap();
        assert_eq!(reading.voltage, 0.0);
    }

    #[test]
    fn test_missing_current_leaves_store_untouched() {
        let (pipeline, store, broadcaster) = test_pipeline();
        let mut rx = broadcaster.subscribe();

        let outcome = pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":12.5,"battery_soh":95.0}"#,
        );
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(RejectReason::MissingField("current"))
        ));

        assert!(store.get_device("dev-1").unwrap().is_none());
        assert_eq!(store.stats().unwrap().total_readings, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bad_topic_leaves_store_untouched() {
        let (pipeline, store, broadcaster) = test_pipeline();
        let mut rx = broadcaster.subscribe();

        let outcome = pipeline.handle_message(
            "devices/dev-1/bogus/data",
            br#"{"voltage":12.5,"current":2.1,"battery_soh":95.0}"#,
        );
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected(RejectReason::MalformedTopic)
        ));

        assert_eq!(store.stats().unwrap().total_devices, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_device_name_updates_on_later_message() {
        let (pipeline, store, _broadcaster) = test_pipeline();

        pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"device_name":"Old","voltage":1,"current":1,"battery_soh":1}"#,
        );
        pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"device_name":"New","voltage":2,"current":2,"battery_soh":2}"#,
        );

        let device = store.get_device("dev-1").unwrap().unwrap();
        assert_eq!(device.name, "New");
        assert_eq!(store.list_devices().unwrap().len(), 1);
    }

    #[test]
    fn test_latest_follows_insert_order_not_measurement_time() {
        let (pipeline, store, _broadcaster) = test_pipeline();

        pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":1,"current":1,"battery_soh":1,"soh_measurement_time":"2026-08-01T12:00:00Z"}"#,
        );
        pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":2,"current":2,"battery_soh":2,"soh_measurement_time":"2026-08-01T08:00:00Z"}"#,
        );

        let latest = store.latest_reading("dev-1").unwrap().unwrap();
        assert_eq!(latest.voltage, 2.0);
        assert_eq!(
            latest.soh_measurement_time.as_deref(),
            Some("2026-08-01T08:00:00Z")
        );
    }

    #[test]
    fn test_broadcast_carries_ingestion_timestamp() {
        let (pipeline, store, broadcaster) = test_pipeline();
        let mut rx = broadcaster.subscribe();

        pipeline.handle_message(
            "devices/dev-1/data",
            br#"{"voltage":12.5,"current":2.1,"battery_soh":95.0,"soh_measurement_time":"2020-01-01T00:00:00Z"}"#,
        );

        let update = rx.try_recv().unwrap();
        let stored = store.latest_reading("dev-1").unwrap().unwrap();
        assert_eq!(update.data.timestamp.naive_utc(), stored.ingested_at);
        assert_ne!(
            update.data.soh_measurement_time.as_deref().unwrap(),
            update.data.timestamp.to_rfc3339()
        );
    }
}
