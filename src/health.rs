use crate::state::{AppMetrics, AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let library = config.audio_library();
    let audio_dir_available = library.is_available();

    HttpResponse::Ok().json(json!({
        "status": if audio_dir_available { "healthy" } else { "degraded" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "conversions": conversion_summary(&metrics, config.audio.target_sample_rate)
        },
        "audio": {
            "files_dir": library.base_dir().display().to_string(),
            "available": audio_dir_available,
            "target_sample_rate": config.audio.target_sample_rate,
            "encoding": "G.711 A-law"
        },
        "forwarding": {
            "url": config.forwarding.url,
            "timeout_secs": config.forwarding.timeout_secs
        },
        "memory": get_memory_info()
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    let endpoint_stats: Vec<_> = metrics
        .endpoint_metrics
        .iter()
        .map(|(endpoint, metric)| {
            json!({
                "endpoint": endpoint,
                "request_count": metric.request_count,
                "error_count": metric.error_count,
                "error_rate": metric.error_rate(),
                "average_duration_ms": metric.average_duration_ms(),
                "total_duration_ms": metric.total_duration_ms
            })
        })
        .collect();

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": metrics.error_rate(),
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "conversions": conversion_summary(&metrics, config.audio.target_sample_rate),
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

/// `output_rate` is the configured target rate; A-law is one byte per sample.
fn conversion_summary(metrics: &AppMetrics, output_rate: u32) -> serde_json::Value {
    let seconds_forwarded = match output_rate {
        0 => 0.0,
        rate => metrics.bytes_forwarded as f64 / rate as f64,
    };

    json!({
        "completed": metrics.conversions_completed,
        "failed": metrics.conversions_failed,
        "in_flight": metrics.in_flight,
        "bytes_forwarded": metrics.bytes_forwarded,
        "approx_seconds_forwarded": (seconds_forwarded * 10.0).round() / 10.0
    })
}

fn get_memory_info() -> serde_json::Value {
    #[cfg(target_os = "linux")]
    {
        let pid = process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let field_bytes = |name: &str| {
                status
                    .lines()
                    .find(|line| line.starts_with(name))
                    .and_then(|line| line.split_whitespace().nth(1))
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map(|kb| kb * 1024)
                    .unwrap_or(0)
            };

            return json!({
                "resident_memory_bytes": field_bytes("VmRSS:"),
                "virtual_memory_bytes": field_bytes("VmSize:"),
                "available": true
            });
        }
    }

    json!({
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false,
        "note": format!("Memory info not available for process {}", process::id())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_forwarded_follows_output_rate() {
        let metrics = AppMetrics {
            bytes_forwarded: 32000,
            ..Default::default()
        };

        assert_eq!(conversion_summary(&metrics, 8000)["approx_seconds_forwarded"], 4.0);
        assert_eq!(conversion_summary(&metrics, 16000)["approx_seconds_forwarded"], 2.0);
        assert_eq!(conversion_summary(&metrics, 0)["approx_seconds_forwarded"], 0.0);
    }
}
