//! MQTT Test Publisher - publishes synthetic device telemetry
//!
//! Usage: publisher [device_id] [interval_ms]
//!
//! Publishes a randomized valid reading to `devices/{device_id}/data` on the
//! given interval until Ctrl-C. Broker settings come from the same `MQTT_*`
//! environment variables as the backend.

use std::env;
use std::time::Duration;

use backend::integrations::mqtt::MqttConfig;
use chrono::Utc;
use rand::Rng;
use rumqttc::{AsyncClient, QoS};
use serde_json::json;

fn sample_payload(device_id: &str) -> serde_json::Value {
    let mut rng = rand::rng();
    let voltage: f64 = rng.random_range(10.0..15.0); // V
    let current: f64 = rng.random_range(1.0..4.0); // A
    let battery_soh: f64 = rng.random_range(85.0..100.0); // percent

    json!({
        "device_name": format!("Test Device {}", device_id),
        "voltage": (voltage * 100.0).round() / 100.0,
        "current": (current * 100.0).round() / 100.0,
        "battery_soh": (battery_soh * 10.0).round() / 10.0,
        "soh_measurement_time": Utc::now().to_rfc3339(),
    })
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args: Vec<String> = env::args().collect();
    let device_id = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "test-device-001".to_string());
    let interval_ms: u64 = args.get(2).and_then(|v| v.parse().ok()).unwrap_or(60_000);

    let config = MqttConfig::from_env();
    let reconnect_delay = Duration::from_secs(config.reconnect_delay_secs);
    let topic = format!("devices/{}/data", device_id);

    log::info!(
        "Publishing to {} on {}:{} every {}ms",
        topic,
        config.broker_host,
        config.broker_port,
        interval_ms
    );

    let (client, mut eventloop) = AsyncClient::new(config.options(), 10);

    // Drive the connection in the background; this binary only publishes.
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                log::error!("MQTT connection error: {}", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = sample_payload(&device_id);
                match client
                    .publish(&topic, QoS::AtLeastOnce, false, payload.to_string())
                    .await
                {
                    Ok(()) => log::info!(
                        "Published voltage={}V current={}A battery_soh={}%",
                        payload["voltage"], payload["current"], payload["battery_soh"]
                    ),
                    Err(e) => log::error!("Failed to publish: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                let _ = client.disconnect().await;
                break;
            }
        }
    }
}
