//! # Configuration Management
//!
//! Loads service configuration from several sources, highest priority first:
//! 1. Deployment overrides (`HOST`, `PORT`, `DOWNSTREAM_URL`, `AUDIO_DIR`)
//! 2. Environment variables: `APP_<SECTION>__<FIELD>`, e.g. `APP_FORWARDING__TIMEOUT_SECS=10`
//! 3. Configuration file (`config.toml`, optional)
//! 4. Default values (the `Default` impl below)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: the same structs are filled from TOML, env vars, and JSON updates
//! - **Builder pattern**: `config::Config::builder()` stacks the sources
//!
//! ## Sections:
//! - **server**: where to listen
//! - **forwarding**: where encoded audio is delivered
//! - **audio**: where WAV files live and how they are converted

use crate::audio::{ConversionPipeline, ConversionPolicy};
use crate::library::AudioLibrary;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: `Serialize` lets the defaults seed the config builder,
///   `Deserialize` turns the merged sources back into this struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub forwarding: ForwardingConfig,
    pub audio: AudioConfig,
}

/// Listening address for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Downstream consumer of the encoded audio.
///
/// ## Fields:
/// - `url`: endpoint that receives the A-law bytes via POST
/// - `timeout_secs`: per-request timeout for the delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Audio file location and conversion settings.
///
/// ## Fields:
/// - `files_dir`: base directory that request filenames are resolved against
/// - `target_sample_rate`: output rate of the conversion (8000 for telephony)
/// - `max_file_bytes`: larger files are refused before being read into memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub files_dir: String,
    pub target_sample_rate: u32,
    pub max_file_bytes: u64,
}

/// Fields that only config.toml or the environment may set.
const RUNTIME_LOCKED_FIELDS: [(&str, &str); 2] = [("audio", "files_dir"), ("forwarding", "url")];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8556,
            },
            forwarding: ForwardingConfig {
                url: "http://127.0.0.1:8080/audio_input".to_string(),
                timeout_secs: 30,
            },
            audio: AudioConfig {
                files_dir: "./audio_files".to_string(),
                target_sample_rate: 8000,
                max_file_bytes: 50 * 1024 * 1024, // 50 MiB
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=9000`: override the listening port
    /// - `APP_AUDIO__FILES_DIR=/srv/audio`: override the audio directory
    /// - `DOWNSTREAM_URL=http://10.0.0.5:8080/audio_input`: deployment shortcut
    ///
    /// The double underscore separates section from field so that field names
    /// containing `_` (like `files_dir`) survive the mapping.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Short names used by deployment platforms and the original command-line flags
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("DOWNSTREAM_URL", "forwarding.url"),
            ("AUDIO_DIR", "audio.files_dir"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Forwarding URL is an http(s) URL and the timeout is non-zero
    /// - Target sample rate and file size limit are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        let url = self.forwarding.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "Forwarding URL must start with http:// or https://, got '{}'",
                self.forwarding.url
            ));
        }

        if self.forwarding.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Forwarding timeout must be greater than 0"));
        }

        if self.audio.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("Target sample rate must be greater than 0"));
        }

        if self.audio.max_file_bytes == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        Ok(())
    }

    /// Conversion policy derived from the audio section.
    pub fn conversion_policy(&self) -> ConversionPolicy {
        ConversionPolicy {
            target_sample_rate: self.audio.target_sample_rate,
        }
    }

    /// Audio library rooted at this config's directory and size limit.
    pub fn audio_library(&self) -> AudioLibrary {
        AudioLibrary::new(&self.audio.files_dir, self.audio.max_file_bytes)
    }

    pub fn conversion_pipeline(&self) -> ConversionPipeline {
        ConversionPipeline::new(self.conversion_policy())
    }

    pub fn forwarding_timeout(&self) -> Duration {
        Duration::from_secs(self.forwarding.timeout_secs)
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only fields present in the JSON change. For example
    /// `{"forwarding": {"timeout_secs": 10}}` shortens the delivery timeout and leaves
    /// everything else alone. The result is validated before returning.
    ///
    /// ## Startup-only fields:
    /// `audio.files_dir` and `forwarding.url` decide which files can be read and where
    /// their contents are sent. They come from config.toml or the environment only;
    /// a runtime update naming either is rejected as a whole.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        for (section, field) in RUNTIME_LOCKED_FIELDS {
            if partial_config.get(section).and_then(|s| s.get(field)).is_some() {
                return Err(anyhow::anyhow!(
                    "{}.{} cannot be changed at runtime",
                    section,
                    field
                ));
            }
        }

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} out of range", port))?;
            }
        }

        if let Some(forwarding) = partial_config.get("forwarding") {
            if let Some(timeout) = forwarding.get("timeout_secs").and_then(|v| v.as_u64()) {
                self.forwarding.timeout_secs = timeout;
            }
        }

        if let Some(audio) = partial_config.get("audio") {
            if let Some(rate) = audio.get("target_sample_rate").and_then(|v| v.as_u64()) {
                self.audio.target_sample_rate = u32::try_from(rate)
                    .map_err(|_| anyhow::anyhow!("Target sample rate {} out of range", rate))?;
            }
            if let Some(limit) = audio.get("max_file_bytes").and_then(|v| v.as_u64()) {
                self.audio.max_file_bytes = limit;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8556);
        assert_eq!(config.forwarding.url, "http://127.0.0.1:8080/audio_input");
        assert_eq!(config.audio.files_dir, "./audio_files");
        assert_eq!(config.conversion_policy(), ConversionPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forwarding.url = "ftp://example.com/audio".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.target_sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forwarding.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"forwarding": {"timeout_secs": 10}, "audio": {"target_sample_rate": 16000}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.forwarding_timeout(), Duration::from_secs(10));
        assert_eq!(config.conversion_policy().target_sample_rate, 16000);
        // Untouched fields keep their values
        assert_eq!(config.server.port, 8556);
        assert_eq!(config.forwarding.url, "http://127.0.0.1:8080/audio_input");
    }

    #[test]
    fn test_config_update_rejects_startup_only_fields() {
        let mut config = AppConfig::default();

        let err = config
            .update_from_json(r#"{"audio": {"files_dir": "/etc", "target_sample_rate": 16000}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("audio.files_dir"));

        let err = config
            .update_from_json(r#"{"forwarding": {"url": "http://169.254.169.254/latest"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("forwarding.url"));

        // Rejected as a whole: the accompanying rate change is not applied either
        assert_eq!(config.audio.files_dir, "./audio_files");
        assert_eq!(config.audio.target_sample_rate, 8000);
        assert_eq!(config.forwarding.url, "http://127.0.0.1:8080/audio_input");
    }

    #[test]
    fn test_config_update_rejects_invalid_result() {
        let mut config = AppConfig::default();
        assert!(config.update_from_json(r#"{"audio": {"target_sample_rate": 0}}"#).is_err());
        assert!(config.update_from_json(r#"{"server": {"port": 70000}}"#).is_err());
        assert!(config.update_from_json("not json").is_err());
    }

    #[test]
    fn test_request_parts_come_from_one_snapshot() {
        let mut config = AppConfig::default();
        config.audio.files_dir = "/srv/audio".to_string();
        config.audio.max_file_bytes = 1024;
        config.audio.target_sample_rate = 16000;

        let library = config.audio_library();
        assert_eq!(library.base_dir(), std::path::Path::new("/srv/audio"));
        assert_eq!(config.conversion_pipeline().policy().target_sample_rate, 16000);
    }

    #[test]
    fn test_forwarding_timeout() {
        let config = AppConfig::default();
        assert_eq!(config.forwarding_timeout(), Duration::from_secs(30));
    }
}
