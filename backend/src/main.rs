use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};

use backend::api;
use backend::db;
use backend::integrations::mqtt::{MqttConfig, MqttListener};
use backend::services::fanout::UpdateBroadcaster;
use backend::services::ingest::IngestPipeline;
use backend::services::store::TelemetryStore;

#[get("/")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "Battery Telemetry Backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // DB pool initialization
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "telemetry.db".to_string());
    let pool = db::init_pool(&database_url);

    let store = TelemetryStore::new(pool);
    let broadcaster = UpdateBroadcaster::new(256);
    let pipeline = IngestPipeline::new(store.clone(), broadcaster.clone());

    // Supervised ingestion loop; reconnects on a fixed delay forever.
    let listener = MqttListener::new(MqttConfig::from_env(), pipeline);
    let ingest_task = actix_web::rt::spawn(listener.run());

    let port: u16 = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    log::info!(
        "Starting Battery Telemetry Backend at http://0.0.0.0:{}",
        port
    );

    let result = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .service(health_check)
            .configure(api::config)
    })
    .bind(("0.0.0.0", port))?
    .shutdown_timeout(10)
    .run()
    .await;

    // The HTTP server has drained; stop ingesting and exit.
    ingest_task.abort();
    log::info!("Shutdown complete");

    result
}
