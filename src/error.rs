//! Error types

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid project: {0}")]
    Validation(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("WiX toolset not found. Install from https://wixtoolset.org/")]
    ToolsetNotFound,

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid wildcard pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, WixError>;
