use crate::config::AppConfig;
use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

fn config_json(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "forwarding": {
            "url": config.forwarding.url,
            "timeout_secs": config.forwarding.timeout_secs
        },
        "audio": {
            "files_dir": config.audio.files_dir,
            "target_sample_rate": config.audio.target_sample_rate,
            "max_file_bytes": config.audio.max_file_bytes
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_json(&config)
    })))
}

/// Partially update the runtime configuration.
///
/// Server host/port changes are stored but only take effect on restart. The timeout,
/// target rate and size limit apply to the next request. The audio directory and the
/// forwarding URL are startup-only and a request naming either gets a 400.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    info!(
        timeout_secs = current_config.forwarding.timeout_secs,
        target_sample_rate = current_config.audio.target_sample_rate,
        max_file_bytes = current_config.audio.max_file_bytes,
        "Configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_json(&current_config)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_update_then_read_config() {
        let state = AppState::new(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/config", web::get().to(get_config))
                .route("/config", web::put().to(update_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/config")
            .set_json(json!({"forwarding": {"timeout_secs": 5}, "audio": {"target_sample_rate": 16000}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["forwarding"]["timeout_secs"], 5);
        assert_eq!(body["config"]["audio"]["target_sample_rate"], 16000);
        assert_eq!(state.get_config().conversion_policy().target_sample_rate, 16000);
    }

    #[actix_web::test]
    async fn test_audio_dir_and_downstream_are_not_runtime_settable() {
        let base = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        std::fs::write(elsewhere.path().join("private.wav"), b"RIFF").unwrap();

        let mut config = AppConfig::default();
        config.audio.files_dir = base.path().display().to_string();
        let state = AppState::new(config);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/config", web::put().to(update_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/config")
            .set_json(json!({
                "audio": {"files_dir": elsewhere.path().display().to_string()},
                "forwarding": {"url": "http://169.254.169.254/latest"}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri("/config")
            .set_json(json!({"forwarding": {"url": "http://169.254.169.254/latest"}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(state.audio_library().base_dir(), base.path());
        assert_eq!(state.get_config().forwarding.url, "http://127.0.0.1:8080/audio_input");
        assert!(state.audio_library().load("private.wav").is_err());
    }

    #[actix_web::test]
    async fn test_invalid_update_is_rejected() {
        let state = AppState::new(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/config", web::put().to(update_config)),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/config")
            .set_json(json!({"audio": {"target_sample_rate": 0}}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.get_config().audio.target_sample_rate, 8000);
    }
}
