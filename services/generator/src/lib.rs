//! Metadata generation for uploaded media
//!
//! The orchestrator walks pending items one at a time and asks a
//! `MetadataGenerator` (Gemini in production) for a title, description and
//! keyword list for each.

pub mod client;
pub mod encoding;
pub mod error;
pub mod orchestrator;
pub mod prompt;

pub use client::{GeminiClient, GeminiConfig, MetadataGenerator};
pub use error::{GenerationError, OrchestratorError};
pub use orchestrator::{Orchestrator, RunHandle, RunSummary};
