pub mod config;
pub mod playback;

pub use config::*;
pub use playback::*;

use crate::health;
use actix_web::web;

/// Register every HTTP route.
///
/// `/play_file` and `/health` live at the root for existing callers; everything is
/// also reachable under `/api/v1`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/config", web::get().to(get_config))
            .route("/config", web::put().to(update_config))
            .route("/play_file", web::post().to(play_file)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/play_file", web::post().to(play_file));
}
