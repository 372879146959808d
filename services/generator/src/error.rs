//! Error types for metadata generation

use common::SettingsError;
use thiserror::Error;

/// Failure of a single generation call
///
/// The display text becomes the item's error message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No usable credential was supplied
    #[error("API Key not configured. Please set your Google AI Studio API key.")]
    Configuration,

    /// The model answered with JSON of the wrong shape
    #[error("Invalid metadata format received from API: {0}")]
    InvalidFormat(String),

    /// Transport failure, error status, or unparsable response
    #[error("Failed to generate metadata: {0}")]
    Generation(String),
}

/// Errors raised when starting a generation run
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A run is already in progress
    #[error("Generation is already running")]
    AlreadyRunning,

    /// The run settings failed validation
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
}
