//! # Downstream Forwarding
//!
//! Delivers encoded A-law audio to the downstream consumer with a single HTTP POST.
//! The body is the raw byte buffer, no container; the `Content-Type` header tells the
//! receiver what it is. There are no retries: a failed delivery is reported back to
//! the caller, who decides what to tell the client.

use crate::audio::EncodedAudio;
use actix_web::http::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to send request: {0}")]
    Send(String),

    #[error("downstream endpoint returned status {0}")]
    Status(u16),
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardReceipt {
    pub bytes_sent: usize,
    pub status: u16,
}

/// HTTP client for the downstream endpoint.
///
/// ## Rust Concepts:
/// - **awc::Client is not Send**: it belongs to one actix worker thread, so each
///   worker builds its own `Forwarder` inside the `HttpServer::new` factory
pub struct Forwarder {
    client: awc::Client,
}

impl Forwarder {
    pub fn new() -> Self {
        Self {
            client: awc::Client::default(),
        }
    }

    /// POST `audio` to `url`, failing on anything but 200 OK.
    ///
    /// The body is sized, so `Content-Length` is derived from it.
    pub async fn forward(
        &self,
        url: &str,
        audio: &EncodedAudio,
        timeout: Duration,
    ) -> Result<ForwardReceipt, ForwardError> {
        let bytes_sent = audio.frames.len();

        let response = self
            .client
            .post(url)
            .insert_header((CONTENT_TYPE, audio.content_type))
            .timeout(timeout)
            .send_body(audio.frames.clone())
            .await
            .map_err(|e| ForwardError::Send(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            warn!(url = %url, status, "Downstream rejected audio");
            return Err(ForwardError::Status(status));
        }

        info!(url = %url, bytes = bytes_sent, "Forwarded audio downstream");
        Ok(ForwardReceipt { bytes_sent, status })
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}
