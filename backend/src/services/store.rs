//! Durable storage for devices and their readings.
//!
//! All writers and readers share one [`TelemetryStore`] handle over the
//! connection pool; conflicting writes are serialized by the database, so
//! callers never need external locking.

use crate::db::DbPool;
use crate::models::{Device, NewDevice, NewReading, Reading};
use crate::schema::{devices, readings};
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::DatabaseErrorKind;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

/// Default page size for reading history queries.
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
/// Hard cap on a single history page.
pub const MAX_HISTORY_LIMIT: i64 = 1000;

const ACTIVE_WINDOW_MINUTES: i64 = 5;

/// Error types for store operations
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    ForeignKeyViolation,
    Query(diesel::result::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "database unavailable: {}", msg),
            StoreError::ForeignKeyViolation => write!(f, "foreign key violation"),
            StoreError::Query(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::ForeignKeyViolation
            }
            other => StoreError::Query(other),
        }
    }
}

/// Aggregate counters for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_devices: i64,
    pub active_devices: i64,
    pub total_readings: i64,
}

/// Handle over the device/reading tables. Cheap to clone; every clone shares
/// the same pool.
#[derive(Clone)]
pub struct TelemetryStore {
    pool: DbPool,
}

impl TelemetryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<PooledConnection<ConnectionManager<SqliteConnection>>, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Insert the device or, if the id already exists, overwrite its name and
    /// refresh `last_seen`. Atomic under concurrent calls for the same id:
    /// racing first-writes converge to a single row instead of one of them
    /// failing on the primary key.
    pub fn upsert_device(&self, device_id: &str, name: &str) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();

        diesel::insert_into(devices::table)
            .values(&NewDevice {
                id: device_id,
                name,
                last_seen: now,
            })
            .on_conflict(devices::id)
            .do_update()
            .set((devices::name.eq(name), devices::last_seen.eq(now)))
            .execute(&mut conn)?;

        Ok(())
    }

    /// Append a reading. Fails with [`StoreError::ForeignKeyViolation`] when
    /// the device row does not exist. Readings are immutable once written.
    pub fn insert_reading(&self, reading: &NewReading<'_>) -> Result<i64, StoreError> {
        let mut conn = self.conn()?;

        let id = diesel::insert_into(readings::table)
            .values(reading)
            .returning(readings::id)
            .get_result(&mut conn)?;

        Ok(id)
    }

    pub fn get_device(&self, device_id: &str) -> Result<Option<Device>, StoreError> {
        let mut conn = self.conn()?;

        let device = devices::table
            .find(device_id)
            .first(&mut conn)
            .optional()?;

        Ok(device)
    }

    /// All devices, most recently seen first.
    pub fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let mut conn = self.conn()?;

        let rows = devices::table
            .order(devices::last_seen.desc())
            .load(&mut conn)?;

        Ok(rows)
    }

    /// Most recent reading by ingestion time. The row id breaks timestamp
    /// ties, so "latest" always means last inserted, never the reading with
    /// the newest producer-supplied measurement time.
    pub fn latest_reading(&self, device_id: &str) -> Result<Option<Reading>, StoreError> {
        let mut conn = self.conn()?;

        let reading = readings::table
            .filter(readings::device_id.eq(device_id))
            .order((readings::ingested_at.desc(), readings::id.desc()))
            .first(&mut conn)
            .optional()?;

        Ok(reading)
    }

    /// A page of readings in descending ingestion order. Negative inputs are
    /// clamped to zero.
    pub fn history_page(
        &self,
        device_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Reading>, StoreError> {
        let mut conn = self.conn()?;

        let rows = readings::table
            .filter(readings::device_id.eq(device_id))
            .order((readings::ingested_at.desc(), readings::id.desc()))
            .limit(limit.max(0))
            .offset(offset.max(0))
            .load(&mut conn)?;

        Ok(rows)
    }

    /// Three independent aggregate counts; no single consistent snapshot.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut conn = self.conn()?;

        let total_devices: i64 = devices::table.count().get_result(&mut conn)?;

        let cutoff = Utc::now().naive_utc() - chrono::Duration::minutes(ACTIVE_WINDOW_MINUTES);
        let active_devices: i64 = devices::table
            .filter(devices::last_seen.gt(cutoff))
            .count()
            .get_result(&mut conn)?;

        let total_readings: i64 = readings::table.count().get_result(&mut conn)?;

        Ok(StoreStats {
            total_devices,
            active_devices,
            total_readings,
        })
    }
}
