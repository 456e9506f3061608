use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "API token is not set. Provide it in one of:\n\
        - the DANUBEDATA_API_TOKEN environment variable\n\
        - api_token in ~/.config/danubedata/config.yaml\n\
        - the provider configuration passed by the host"
    )]
    MissingApiToken,

    #[error("Invalid base URL '{0}': must start with http:// or https://")]
    InvalidBaseUrl(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
