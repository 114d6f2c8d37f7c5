//! # Playback Handler
//!
//! `POST /play_file` with a plain-text filename as the body. The named WAV file is
//! loaded from the audio directory, converted to 8 kHz G.711 A-law, and forwarded to
//! the downstream endpoint.
//!
//! ## Flow:
//! 1. Trim the body and reject an empty filename (400)
//! 2. Load + convert on the blocking pool (file I/O and number crunching)
//! 3. Forward the encoded bytes (502 if the downstream refuses)
//! 4. Report what was sent
//!
//! ## Response:
//! ```json
//! {
//!   "status": "forwarded",
//!   "conversion_id": "5b7c...",
//!   "file": "greeting.wav",
//!   "source": { "sample_rate": 16000, "channels": 1, "bits_per_sample": 16 },
//!   "output": { "sample_rate": 8000, "samples": 8000, "bytes": 8000, "content_type": "audio/PCMA" },
//!   "timestamp": "2025-01-01T12:00:00Z"
//! }
//! ```

use crate::error::{AppError, AppResult};
use crate::forward::Forwarder;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Format of the file as stored, echoed back to the client.
#[derive(Debug, Clone, Copy)]
struct SourceFormat {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

pub async fn play_file(
    state: web::Data<AppState>,
    forwarder: web::Data<Forwarder>,
    body: String,
) -> AppResult<HttpResponse> {
    let filename = body.trim().to_string();
    if filename.is_empty() {
        return Err(AppError::BadRequest("Filename required".to_string()));
    }

    let conversion_id = Uuid::new_v4();
    // Library, pipeline and forwarding target all come from this one snapshot
    let config = state.get_config();
    let library = config.audio_library();
    let pipeline = config.conversion_pipeline();
    let guard = state.begin_conversion();

    info!(
        %conversion_id,
        file = %filename,
        target_rate = pipeline.policy().target_sample_rate,
        "Playing file"
    );

    let name = filename.clone();
    let converted = web::block(move || -> AppResult<_> {
        let descriptor = library.load(&name)?;
        debug!(frames = descriptor.frame_count(), sample_rate = descriptor.sample_rate, "Loaded {}", name);
        let source = SourceFormat {
            sample_rate: descriptor.sample_rate,
            channels: descriptor.channel_count,
            bits_per_sample: descriptor.bits_per_sample,
        };
        let encoded = pipeline.convert(&descriptor)?;
        Ok((source, encoded))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))
    .and_then(|result| result);

    let (source, encoded) = converted.map_err(|e| {
        warn!(%conversion_id, file = %filename, error = %e, "Conversion failed");
        e
    })?;

    info!(
        %conversion_id,
        source_rate = source.sample_rate,
        output_rate = encoded.sample_rate,
        samples = encoded.sample_count(),
        "Converted to A-law"
    );

    let receipt = forwarder
        .forward(&config.forwarding.url, &encoded, config.forwarding_timeout())
        .await
        .map_err(|e| {
            warn!(%conversion_id, url = %config.forwarding.url, error = %e, "Forwarding failed");
            AppError::from(e)
        })?;

    guard.complete(receipt.bytes_sent as u64);

    Ok(HttpResponse::Ok().json(json!({
        "status": "forwarded",
        "conversion_id": conversion_id,
        "file": filename,
        "source": {
            "sample_rate": source.sample_rate,
            "channels": source.channels,
            "bits_per_sample": source.bits_per_sample
        },
        "output": {
            "sample_rate": encoded.sample_rate,
            "samples": encoded.sample_count(),
            "bytes": receipt.bytes_sent,
            "content_type": encoded.content_type
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
