use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the shared settings and preference layer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported language: {0:?}")]
    UnsupportedLanguage(String),

    #[error("could not encode preferences: {0}")]
    PreferencesEncode(#[from] serde_json::Error),

    #[error("could not write preferences to {}: {source}", .path.display())]
    PreferencesWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
