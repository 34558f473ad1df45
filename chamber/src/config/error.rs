use crate::config::BlobFormat;
use config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChamberConfigError {
    // Setting registered twice in the registry
    #[error("Configuration option '{0}' is already declared")]
    AlreadyDeclared(String),

    // Error from config crate
    #[error("Error from the config crate")]
    Config(#[from] ConfigError),

    // Malformed override configuration, nothing was merged
    #[error("Failed to decode {format} configuration: {reason}")]
    DecodeFailed { format: BlobFormat, reason: String },

    // Error from serde crate
    #[error("Serde error")]
    Serde(#[from] serde_json::Error),

    // Flag bound to a name that was never declared
    #[error("Unknown configuration option '{0}'")]
    UnknownSetting(String),
}
