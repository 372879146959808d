//! Custom error types for the common library
//!
//! This module defines the errors raised by the media store, the CSV
//! exporter and the configuration loader.

use thiserror::Error;

use crate::models::{MediaId, MediaStatus};

/// Errors raised by store commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No item with this id exists (never uploaded or already deleted)
    #[error("Media item not found: {0}")]
    NotFound(MediaId),

    /// The requested lifecycle transition is not allowed from the current status
    #[error("Media item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: MediaId,
        from: MediaStatus,
        to: MediaStatus,
    },

    /// Metadata edits require a completed item
    #[error("Media item {id} has no metadata to edit (status: {status})")]
    NotEditable { id: MediaId, status: MediaStatus },

    /// Keywords must contain at least one non-whitespace character
    #[error("Keyword must not be empty")]
    EmptyKeyword,

    /// Keyword removal index past the end of the list
    #[error("Keyword index {index} out of range ({len} keywords)")]
    KeywordIndexOutOfRange { index: usize, len: usize },
}

/// Errors raised by the CSV exporter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// No completed item carries metadata
    #[error("No completed files with metadata to export.")]
    NothingToExport,
}

/// Errors raised while loading or validating settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Configuration sources could not be read or deserialized
    #[error("Configuration error: {0}")]
    Load(#[from] config::ConfigError),

    /// A setting holds a value outside its accepted range
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
