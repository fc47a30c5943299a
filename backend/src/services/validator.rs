//! Parses and validates raw telemetry messages before anything touches the
//! database. Pure functions of the topic and payload bytes.

use serde::Deserialize;
use serde_json::Value;

/// First topic segment for device telemetry.
pub const TOPIC_NAMESPACE: &str = "devices";
/// Last topic segment for device telemetry.
pub const TOPIC_SUFFIX: &str = "data";
/// Wildcard filter covering all device data topics.
pub const TELEMETRY_TOPIC_FILTER: &str = "devices/+/data";

/// Why an inbound message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MalformedTopic,
    MalformedPayload(String),
    MissingField(&'static str),
    InvalidNumber(&'static str),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MalformedTopic => write!(f, "malformed topic"),
            RejectReason::MalformedPayload(msg) => write!(f, "malformed payload: {}", msg),
            RejectReason::MissingField(field) => write!(f, "missing required field `{}`", field),
            RejectReason::InvalidNumber(field) => {
                write!(f, "non-numeric value for field `{}`", field)
            }
        }
    }
}

impl std::error::Error for RejectReason {}

/// A validated telemetry message, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryMessage {
    pub device_id: String,
    pub device_name: String,
    pub voltage: f64,
    pub current: f64,
    pub battery_soh: f64,
    pub soh_measurement_time: Option<String>,
}

/// Wire shape of a telemetry payload. Numeric fields stay as raw JSON values
/// so that `0`, `null` and absent are three distinguishable cases.
#[derive(Debug, Deserialize)]
struct RawPayload {
    device_name: Option<String>,
    voltage: Option<Value>,
    current: Option<Value>,
    battery_soh: Option<Value>,
    soh_measurement_time: Option<String>,
}

/// Extract the device id from a `devices/{device_id}/data` topic.
pub fn parse_device_topic(topic: &str) -> Option<&str> {
    let mut segments = topic.split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(ns), Some(device_id), Some(suffix), None)
            if ns == TOPIC_NAMESPACE && suffix == TOPIC_SUFFIX && !device_id.is_empty() =>
        {
            Some(device_id)
        }
        _ => None,
    }
}

/// Validate a raw message and produce a [`TelemetryMessage`], or the reason
/// it was rejected. No side effects.
pub fn parse_message(topic: &str, payload: &[u8]) -> Result<TelemetryMessage, RejectReason> {
    let device_id = parse_device_topic(topic).ok_or(RejectReason::MalformedTopic)?;

    let raw: RawPayload = serde_json::from_slice(payload)
        .map_err(|e| RejectReason::MalformedPayload(e.to_string()))?;

    let voltage = require_number(raw.voltage.as_ref(), "voltage")?;
    let current = require_number(raw.current.as_ref(), "current")?;
    let battery_soh = require_number(raw.battery_soh.as_ref(), "battery_soh")?;

    // An empty name is treated the same as an absent one.
    let device_name = raw
        .device_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| device_id.to_string());

    Ok(TelemetryMessage {
        device_id: device_id.to_string(),
        device_name,
        voltage,
        current,
        battery_soh,
        soh_measurement_time: raw.soh_measurement_time,
    })
}

/// Required-and-numeric check. `0` is a valid value; only absent or `null`
/// counts as missing. Strings are coerced like the producers' firmware
/// formats them; anything non-finite is rejected rather than stored.
fn require_number(value: Option<&Value>, field: &'static str) -> Result<f64, RejectReason> {
    let value = value.ok_or(RejectReason::MissingField(field))?;

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(RejectReason::InvalidNumber(field)),
    }
}
