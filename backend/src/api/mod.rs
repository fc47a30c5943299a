use actix_web::web;

pub mod devices;
pub mod stats;
pub mod ws;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Device queries
    cfg.service(
        web::scope("/api/devices")
            .service(devices::list_devices)
            .service(devices::latest_reading)
            .service(devices::reading_history)
            .service(devices::get_device),
    );

    // Dashboard stats
    cfg.service(web::scope("/api/stats").service(stats::get_stats));

    // Live updates
    cfg.service(ws::device_updates);
}
