use crate::services::store::{TelemetryStore, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List all devices, most recently seen first
#[get("")]
pub async fn list_devices(store: web::Data<TelemetryStore>) -> impl Responder {
    match store.list_devices() {
        Ok(devices) => HttpResponse::Ok().json(devices),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

/// Get a specific device
#[get("/{device_id}")]
pub async fn get_device(
    store: web::Data<TelemetryStore>,
    path: web::Path<String>,
) -> impl Responder {
    let device_id = path.into_inner();

    match store.get_device(&device_id) {
        Ok(Some(device)) => HttpResponse::Ok().json(device),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Device not found"
        })),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

/// Get the latest reading for a device
#[get("/{device_id}/latest")]
pub async fn latest_reading(
    store: web::Data<TelemetryStore>,
    path: web::Path<String>,
) -> impl Responder {
    let device_id = path.into_inner();

    match store.latest_reading(&device_id) {
        Ok(Some(reading)) => HttpResponse::Ok().json(reading),
        // Clients treat an empty object as "no readings yet".
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({})),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

/// Get paginated reading history for a device
#[get("/{device_id}/history")]
pub async fn reading_history(
    store: web::Data<TelemetryStore>,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let device_id = path.into_inner();
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(0, MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    match store.history_page(&device_id, limit, offset) {
        Ok(readings) => HttpResponse::Ok().json(readings),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    fn seeded_store() -> TelemetryStore {
        let store = TelemetryStore::new(crate::db::test_pool());
        store.upsert_device("dev-1", "Battery A").unwrap();
        store
    }

    fn app_config(store: TelemetryStore) -> impl Fn(&mut web::ServiceConfig) {
        move |cfg: &mut web::ServiceConfig| {
            cfg.app_data(web::Data::new(store.clone())).service(
                web::scope("/api/devices")
                    .service(list_devices)
                    .service(latest_reading)
                    .service(reading_history)
                    .service(get_device),
            );
        }
    }

    #[test]
    fn test_history_query_deserialization() {
        let query: HistoryQuery = serde_json::from_str(r#"{"limit": 5, "offset": 10}"#).unwrap();
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.offset, Some(10));

        let query: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(query.limit.is_none());
        assert!(query.offset.is_none());
    }

    #[actix_rt::test]
    async fn test_list_devices_returns_seeded_device() {
        let app =
            test::init_service(App::new().configure(app_config(seeded_store()))).await;

        let req = test::TestRequest::get().uri("/api/devices").to_request();
        let devices: Vec<crate::models::Device> =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "dev-1");
    }

    #[actix_rt::test]
    async fn test_get_unknown_device_returns_not_found() {
        let app =
            test::init_service(App::new().configure(app_config(seeded_store()))).await;

        let req = test::TestRequest::get()
            .uri("/api/devices/ghost")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_latest_without_readings_returns_empty_object() {
        let app =
            test::init_service(App::new().configure(app_config(seeded_store()))).await;

        let req = test::TestRequest::get()
            .uri("/api/devices/dev-1/latest")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, serde_json::json!({}));
    }

    #[actix_rt::test]
    async fn test_history_respects_limit_and_offset() {
        let store = seeded_store();
        for _ in 0..3 {
            store
                .insert_reading(&crate::models::NewReading {
                    device_id: "dev-1",
                    voltage: 12.0,
                    current: 2.0,
                    battery_soh: 90.0,
                    soh_measurement_time: None,
                    ingested_at: chrono::Utc::now().naive_utc(),
                })
                .unwrap();
        }
        let app = test::init_service(App::new().configure(app_config(store))).await;

        let req = test::TestRequest::get()
            .uri("/api/devices/dev-1/history?limit=2")
            .to_request();
        let page: Vec<crate::models::Reading> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/devices/dev-1/history?offset=3")
            .to_request();
        let rest: Vec<crate::models::Reading> = test::call_and_read_body_json(&app, req).await;
        assert!(rest.is_empty());
    }
}
