//! Error types for the PCM pipeline.
//!
//! Ingest itself never fails; these cover construction and configuration.
//! The capture layer reports device failures through `anyhow`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Sample rates must be positive
    #[error("Invalid sample rate: {0}Hz")]
    InvalidSampleRate(u32),

    /// TOML parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Values that parse but make no sense
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file I/O
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
