use crate::services::store::TelemetryStore;
use actix_web::{get, web, HttpResponse, Responder};

/// Aggregate dashboard counters
#[get("")]
pub async fn get_stats(store: web::Data<TelemetryStore>) -> impl Responder {
    match store.stats() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}
