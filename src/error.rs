use std::path::PathBuf;
use thiserror::Error;

use crate::data::store::StoreError;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error("unknown time zone '{0}'")]
    TimeZone(String),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("unable to access security directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("password salt missing from '{0}'")]
    MissingSalt(PathBuf),
    #[error("user auth keys missing from '{0}'")]
    MissingKeys(PathBuf),
    #[cfg(feature = "generate-security")]
    #[error("unable to generate user auth keys: {0}")]
    KeyGeneration(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error(transparent)]
    Store(#[from] StoreError),

    // External errors
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}
