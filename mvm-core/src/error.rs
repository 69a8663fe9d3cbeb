//! Error types for the launcher core.

use std::path::PathBuf;

use thiserror::Error;

use crate::volume::FourCC;

/// Errors that can occur while assembling or inspecting boot volumes.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Not a bootable Mac disk image: {0}")]
    NotBootable(PathBuf),

    #[error("Cannot open disk image: {0}")]
    Mount(PathBuf),

    #[error("File {0} not found in disk image")]
    FileNotFound(String),

    #[error("Resource {kind} #{id} not found")]
    ResourceNotFound { kind: FourCC, id: i16 },

    #[error("'{option}' not configured for System version {}", .version >> 8)]
    MissingOption { option: &'static str, version: u16 },

    #[error("Volume mounted read-only")]
    ReadOnly,

    #[error("Volume is full")]
    VolumeFull,

    #[error("File {0} already exists")]
    FileExists(String),

    #[error("{what} too long: {len} bytes (max {max})")]
    NameTooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Malformed resource fork: {0}")]
    ResourceFork(String),

    #[error("Invalid volume image: {0}")]
    BadImage(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Cannot stage emulator runtime: {0}")]
    Stage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for launcher operations.
pub type LaunchResult<T> = Result<T, LaunchError>;
