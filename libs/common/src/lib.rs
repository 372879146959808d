//! Common library for the Matanest application
//!
//! This crate owns the media workflow state shared by the generator and the
//! HTTP service: the data model, the state-owning media store, upload
//! intake, previews, the metadata editor model, CSV export and
//! configuration.

pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod intake;
pub mod models;
pub mod preview;
pub mod store;

pub use error::{ExportError, SettingsError, StoreError, StoreResult};
pub use models::{GenerationSettings, MediaFile, MediaId, MediaItemView, MediaStatus, Metadata};
pub use store::MediaStore;

/// Example usage of the media store
///
/// ```rust,no_run
/// use common::export::render_csv;
/// use common::intake::{IntakeLimits, IntakePolicy, UploadedFile, intake};
/// use common::MediaStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MediaStore::new();
///     let policy = IntakePolicy::new(IntakeLimits::default())?;
///     let upload = UploadedFile {
///         name: "sunset.jpg".to_string(),
///         content_type: Some("image/jpeg".to_string()),
///         data: std::fs::read("sunset.jpg")?,
///     };
///     let report = intake(&store, &policy, vec![upload]).await;
///     println!("Accepted {} files", report.accepted.len());
///
///     // ... run generation, then export
///     let csv = render_csv(&store.snapshot().await)?;
///     std::fs::write(csv.filename, csv.content)?;
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
