use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("remote returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("{tool} failed: {message}")]
    Transform { tool: String, message: String },

    #[error("archive integrity check failed: {0}")]
    #[diagnostic(help("remove the archive from the staging folder and run again"))]
    ArchiveIntegrity(String),

    #[error("malformed source identifier: {0}")]
    MappingParse(String),

    #[error("invalid canonical identifier: {0}")]
    InvalidUid(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("expected asset is missing: {0}")]
    MissingAsset(String),

    #[error("unreadable item metadata: {0}")]
    Metadata(String),

    #[error("failed to read mapping file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse mapping file: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DatasetError {
    /// Fatal errors abort the whole acquirer instead of a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DatasetError::ArchiveIntegrity(_))
    }

    pub(crate) fn fs(err: impl std::fmt::Display) -> Self {
        DatasetError::Filesystem(err.to_string())
    }
}
