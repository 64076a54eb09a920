use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the application shell
///
/// The simulation core never fails; only terminal, file and setup work can.
#[derive(Error, Debug)]
pub enum AppError {
    /// Terminal or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be read
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for this program
    #[error("cannot parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A numeric configuration value is unusable
    #[error("invalid value {value} for {field}")]
    InvalidConfig { field: &'static str, value: f64 },

    /// The log subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}
