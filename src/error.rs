//! Error types for calibration data and the tuning stream.

use thiserror::Error;

/// Errors raised while reading or writing a tuning stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream truncated while reading {field}: needed {needed} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("Unrecognized stream header")]
    BadMagic,
    #[error("Unsupported stream version {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid value {value} for {field}")]
    InvalidTag { field: &'static str, value: u32 },
    #[error("{0} unexpected bytes after the last field")]
    TrailingBytes(usize),
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("Blend mask raster is corrupt: {0}")]
    MaskRaster(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by tuning and session operations.
#[derive(Error, Debug)]
pub enum TuningError {
    #[error("Sub-screen index {index} out of range for screen '{screen}' ({count} sub-screens)")]
    SubScreenOutOfRange {
        screen: String,
        index: u32,
        count: u32,
    },
    #[error("Unknown screen '{0}'")]
    UnknownScreen(String),
    #[error("Invalid session mode: {0}")]
    InvalidMode(String),
    #[error("No tuning at index {0}")]
    NoSuchTuning(usize),
    #[error("Failed to load tuning {index}: {source}")]
    Load {
        index: usize,
        #[source]
        source: StreamError,
    },
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("Config file error: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] ron::Error),
}
