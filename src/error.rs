//! Error types for lspmap.
//!
//! Only user-facing failures live here (bad root, bad config, unwritable
//! output). Engine and transport problems degrade locally and are never
//! surfaced as errors; see `protocol` and `session`.

use std::path::PathBuf;

/// Unified error type for lspmap.
#[derive(Debug, thiserror::Error)]
pub enum LspMapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid root directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Serialization error: {0}")]
    SerializeError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, LspMapError>;
