//! # Audio Library
//!
//! Resolves request filenames to WAV files under a fixed base directory and parses them.
//!
//! ## Filename Rules:
//! - must not be empty
//! - must not contain `..` (path traversal)
//! - must not contain `/` or `\` (path separators)
//! - must end in `.wav` (any case)
//!
//! Loading is blocking file I/O. Request handlers run it on actix's blocking thread
//! pool via `web::block` so the async workers stay free.

use crate::audio::{wav, AudioStreamDescriptor, ConversionError};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Why a filename was refused before touching the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("filename required")]
    Empty,

    #[error("path traversal detected")]
    PathTraversal,

    #[error("path separators not allowed")]
    PathSeparator,

    #[error("only WAV files are supported")]
    NotWav,
}

/// Failures while locating, opening, or parsing a library file.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] FilenameError),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("file {name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("failed to open file: {0}")]
    Open(io::Error),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Check a request filename against the library rules.
pub fn validate_filename(filename: &str) -> Result<(), FilenameError> {
    if filename.is_empty() {
        return Err(FilenameError::Empty);
    }
    if filename.contains("..") {
        return Err(FilenameError::PathTraversal);
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(FilenameError::PathSeparator);
    }
    if !filename.to_lowercase().ends_with(".wav") {
        return Err(FilenameError::NotWav);
    }
    Ok(())
}

/// A directory of WAV files that requests may name.
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    base_dir: PathBuf,
    max_file_bytes: u64,
}

impl AudioLibrary {
    pub fn new(base_dir: impl Into<PathBuf>, max_file_bytes: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_file_bytes,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether the base directory currently exists (reported by the health check).
    pub fn is_available(&self) -> bool {
        self.base_dir.is_dir()
    }

    /// Validate `filename`, then open and parse it.
    ///
    /// ## Returns:
    /// - **Ok(descriptor)**: the fully parsed stream
    /// - **Err(InvalidFilename)**: the name broke a filename rule
    /// - **Err(NotFound)** / **Err(TooLarge)**: checked via file metadata before reading
    /// - **Err(Conversion)**: the file is not a usable WAV container
    pub fn load(&self, filename: &str) -> Result<AudioStreamDescriptor, LibraryError> {
        validate_filename(filename)?;

        let path = self.base_dir.join(filename);
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(LibraryError::NotFound(filename.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound(filename.to_string()))
            }
            Err(e) => return Err(LibraryError::Open(e)),
        };

        if metadata.len() > self.max_file_bytes {
            return Err(LibraryError::TooLarge {
                name: filename.to_string(),
                size: metadata.len(),
                limit: self.max_file_bytes,
            });
        }

        let file = File::open(&path).map_err(LibraryError::Open)?;
        debug!(path = %path.display(), size = metadata.len(), "Parsing WAV file");

        Ok(wav::parse(BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mono_wav(rate: u32, samples: &[i16]) -> Vec<u8> {
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn test_filename_validation() {
        assert_eq!(validate_filename("greeting.wav"), Ok(()));
        assert_eq!(validate_filename("GREETING.WAV"), Ok(()));
        assert_eq!(validate_filename(""), Err(FilenameError::Empty));
        assert_eq!(validate_filename("../secret.wav"), Err(FilenameError::PathTraversal));
        assert_eq!(validate_filename("a..b.wav"), Err(FilenameError::PathTraversal));
        assert_eq!(validate_filename("dir/file.wav"), Err(FilenameError::PathSeparator));
        assert_eq!(validate_filename("dir\\file.wav"), Err(FilenameError::PathSeparator));
        assert_eq!(validate_filename("song.mp3"), Err(FilenameError::NotWav));
        assert_eq!(validate_filename("wav"), Err(FilenameError::NotWav));
    }

    #[test]
    fn test_load_parses_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tone.wav"), mono_wav(16000, &[1, -2, 3, -4])).unwrap();

        let library = AudioLibrary::new(dir.path(), 1024 * 1024);
        assert!(library.is_available());

        let descriptor = library.load("tone.wav").unwrap();
        assert_eq!(descriptor.sample_rate, 16000);
        assert_eq!(descriptor.frame_count(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let library = AudioLibrary::new(dir.path(), 1024);
        assert!(matches!(
            library.load("absent.wav"),
            Err(LibraryError::NotFound(name)) if name == "absent.wav"
        ));
    }

    #[test]
    fn test_load_rejects_invalid_name_without_io() {
        let library = AudioLibrary::new("/nonexistent/dir", 1024);
        assert!(matches!(
            library.load("../etc/passwd.wav"),
            Err(LibraryError::InvalidFilename(FilenameError::PathTraversal))
        ));
    }

    #[test]
    fn test_load_enforces_size_limit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("long.wav"), mono_wav(8000, &[0; 100])).unwrap();

        let library = AudioLibrary::new(dir.path(), 64);
        assert!(matches!(
            library.load("long.wav"),
            Err(LibraryError::TooLarge { limit: 64, .. })
        ));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fake.wav"), b"ID3 this is an mp3").unwrap();

        let library = AudioLibrary::new(dir.path(), 1024);
        assert!(matches!(
            library.load("fake.wav"),
            Err(LibraryError::Conversion(ConversionError::NotWavContainer))
        ));
    }
}
