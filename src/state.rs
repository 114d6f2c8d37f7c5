//! # Application State Management
//!
//! State shared by all HTTP workers: the runtime configuration and service metrics.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc<RwLock<T>> Pattern
//! - **Arc**: every worker's `web::Data<AppState>` points at the same data
//! - **RwLock**: many concurrent readers, or one writer
//! - Locks are held only long enough to copy a value out or bump a counter
//!
//! ### What is NOT here
//! The conversion pipeline keeps no state at all. Each request builds its pipeline
//! and audio library from a config snapshot and owns all of its buffers, so nothing
//! about a conversion is shared between requests except the counters below.

use crate::config::AppConfig;
use crate::library::AudioLibrary;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime via `PUT /config`)
    pub config: Arc<RwLock<AppConfig>>,

    /// Request and conversion counters
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Counters collected across all requests.
///
/// ## Why these metrics matter:
/// - **conversions_completed / conversions_failed**: how often files make it downstream
/// - **bytes_forwarded**: total A-law bytes delivered (one byte = 125 µs of 8 kHz audio)
/// - **in_flight**: conversions currently between file read and downstream response
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub conversions_completed: u64,
    pub conversions_failed: u64,
    pub bytes_forwarded: u64,
    pub in_flight: u32,

    /// Key: endpoint name (e.g., "POST /play_file")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Per-endpoint request statistics.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// A lock is only poisoned if a writer panicked mid-update; the counters and
    /// config are still usable, so recover the guard rather than propagate the panic.
    fn read_metrics(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so a slow request never blocks a config update.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = new_config;
        Ok(())
    }

    /// Audio library rooted at the currently configured directory.
    ///
    /// Request handlers that also need other settings should build everything from
    /// one `get_config()` snapshot instead.
    pub fn audio_library(&self) -> AudioLibrary {
        self.get_config().audio_library()
    }

    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    /// Record the duration and outcome of one request to `endpoint`.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark a conversion as started.
    ///
    /// ## RAII:
    /// The returned guard counts the conversion as in flight until it is dropped.
    /// Call `ConversionGuard::complete` on success; dropping it without that counts
    /// the conversion as failed, so every early `?` return is accounted for.
    pub fn begin_conversion(&self) -> ConversionGuard {
        self.write_metrics().in_flight += 1;
        ConversionGuard {
            metrics: self.metrics.clone(),
            bytes_forwarded: None,
        }
    }

    /// Get a snapshot of current metrics (used by `/health` and `/metrics`).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.read_metrics().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// In-flight marker for one conversion; see `AppState::begin_conversion`.
pub struct ConversionGuard {
    metrics: Arc<RwLock<AppMetrics>>,
    bytes_forwarded: Option<u64>,
}

impl ConversionGuard {
    /// Record a successful delivery of `bytes` encoded bytes.
    pub fn complete(mut self, bytes: u64) {
        self.bytes_forwarded = Some(bytes);
    }
}

impl Drop for ConversionGuard {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.in_flight = metrics.in_flight.saturating_sub(1);

        match self.bytes_forwarded {
            Some(bytes) => {
                metrics.conversions_completed += 1;
                metrics.bytes_forwarded += bytes;
            }
            None => metrics.conversions_failed += 1,
        }
    }
}

impl AppMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
