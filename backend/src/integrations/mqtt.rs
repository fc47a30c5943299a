//! MQTT connection management for telemetry ingestion
//!
//! Maintains a single subscription to the device data topic and hands every
//! inbound publish to the ingestion pipeline. The broker connection is
//! supervised here: on any connection error the loop waits a fixed delay and
//! polls again, forever. Nothing is buffered across an outage; messages
//! published while disconnected are lost at the transport.

use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

use crate::services::ingest::IngestPipeline;
use crate::services::validator::TELEMETRY_TOPIC_FILTER;

/// Configuration for the MQTT connection
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: format!("telemetry-backend-{}", uuid::Uuid::new_v4()),
            username: None,
            password: None,
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    /// Build a configuration from `MQTT_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.broker_host = host;
        }
        if let Some(port) = std::env::var("MQTT_BROKER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            config.broker_port = port;
        }
        config.username = std::env::var("MQTT_USERNAME").ok();
        config.password = std::env::var("MQTT_PASSWORD").ok();
        if let Some(delay) = std::env::var("MQTT_RECONNECT_SECS")
            .ok()
            .and_then(|d| d.parse().ok())
        {
            config.reconnect_delay_secs = delay;
        }
        config
    }

    /// Translate into rumqttc connection options.
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }
        options
    }
}

/// Owns the broker connection and feeds the ingestion pipeline.
pub struct MqttListener {
    config: MqttConfig,
    pipeline: IngestPipeline,
}

impl MqttListener {
    pub fn new(config: MqttConfig, pipeline: IngestPipeline) -> Self {
        Self { config, pipeline }
    }

    /// Run the connection loop. Never returns; the caller decides the task's
    /// lifetime.
    pub async fn run(self) {
        let reconnect_delay = Duration::from_secs(self.config.reconnect_delay_secs);

        info!(
            "Connecting to MQTT broker at {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        let (client, mut eventloop) = AsyncClient::new(self.config.options(), 100);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    // Subscribing on every ConnAck covers reconnects too.
                    match client
                        .subscribe(TELEMETRY_TOPIC_FILTER, QoS::AtLeastOnce)
                        .await
                    {
                        Ok(()) => info!("Subscribed to {}", TELEMETRY_TOPIC_FILTER),
                        Err(e) => error!("Failed to subscribe to topic: {}", e),
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("MQTT subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    // Handled to completion before the next poll, so readings
                    // for one device keep their delivery order.
                    self.pipeline
                        .handle_message(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        "MQTT connection error: {}, retrying in {}s",
                        e,
                        reconnect_delay.as_secs()
                    );
                    tokio::time::sleep(reconnect_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_config_default() {
        let config = MqttConfig::default();
        assert_eq!(config.broker_host, "localhost");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert!(config.username.is_none());
        assert!(config.client_id.starts_with("telemetry-backend-"));
    }

    #[test]
    fn test_mqtt_config_options_carry_credentials() {
        let config = MqttConfig {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            ..MqttConfig::default()
        };
        let options = config.options();
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "secret".to_string()))
        );
    }
}
