//! Battery Telemetry Backend Library
//!
//! This library provides the core functionality for the battery telemetry
//! service, including:
//! - MQTT ingestion of device readings (validate, persist, broadcast)
//! - Durable device and reading storage
//! - Live WebSocket fanout of accepted readings
//! - Read-only query endpoints for dashboards

pub mod api;
pub mod db;
pub mod integrations;
pub mod models;
pub mod schema;
pub mod services;
