//! Upload intake
//!
//! Turns a batch of uploaded files into pending media items. Files are
//! checked one by one against the configured limits; a rejected file never
//! blocks the rest of the batch.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::error::SettingsError;
use crate::models::{MediaFile, MediaId};
use crate::store::MediaStore;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Limits applied to uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeLimits {
    /// When false every file is accepted as-is
    pub enforce_limits: bool,
    /// Maximum number of items held in the collection
    pub max_files: usize,
    /// Maximum size of a single file in bytes
    pub max_file_bytes: u64,
    /// Accepted MIME types; `type/*` wildcards are allowed
    pub accepted_types: Vec<String>,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            enforce_limits: true,
            max_files: 500,
            max_file_bytes: 50 * 1024 * 1024,
            accepted_types: [
                "image/jpeg",
                "image/png",
                "image/svg+xml",
                "image/gif",
                "video/mp4",
                "video/quicktime",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// A file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Resolve the MIME type and take ownership of the bytes
    pub fn into_media_file(self) -> MediaFile {
        let mime_type = resolve_mime(&self.name, self.content_type.as_deref());
        MediaFile::new(self.name, mime_type, self.data)
    }
}

/// Pick the MIME type for an upload
///
/// The declared content type wins unless it is missing or the generic
/// octet-stream; otherwise the type is guessed from the file extension.
pub fn resolve_mime(filename: &str, declared: Option<&str>) -> String {
    let declared = declared
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != FALLBACK_MIME);

    declared
        .or_else(|| mime_guess::from_path(filename).first_raw().map(String::from))
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

/// Why a file was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    TooManyFiles { max_files: usize },
    TooLarge { size: u64, max_file_bytes: u64 },
    UnsupportedType { mime_type: String },
    Empty,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::TooManyFiles { max_files } => {
                write!(f, "collection already holds the maximum of {} files", max_files)
            }
            RejectionReason::TooLarge {
                size,
                max_file_bytes,
            } => write!(f, "file is {} bytes, limit is {} bytes", size, max_file_bytes),
            RejectionReason::UnsupportedType { mime_type } => {
                write!(f, "unsupported file type {}", mime_type)
            }
            RejectionReason::Empty => f.write_str("file is empty"),
        }
    }
}

/// A rejected file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub filename: String,
    #[serde(flatten)]
    pub reason: RejectionReason,
}

/// Outcome of one intake batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeReport {
    pub accepted: Vec<MediaId>,
    pub rejected: Vec<Rejection>,
}

/// Compiled intake limits
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    limits: IntakeLimits,
    accepted: Vec<Regex>,
}

impl IntakePolicy {
    pub fn new(limits: IntakeLimits) -> Result<Self, SettingsError> {
        let accepted = limits
            .accepted_types
            .iter()
            .map(|pattern| compile_mime_pattern(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { limits, accepted })
    }

    /// Policy that accepts everything
    pub fn permissive() -> Self {
        Self {
            limits: IntakeLimits {
                enforce_limits: false,
                ..IntakeLimits::default()
            },
            accepted: Vec::new(),
        }
    }

    pub fn limits(&self) -> &IntakeLimits {
        &self.limits
    }

    /// Per-file checks; the collection cap is applied by the store
    pub fn check(&self, file: &MediaFile) -> Result<(), RejectionReason> {
        if !self.limits.enforce_limits {
            return Ok(());
        }

        if file.size() == 0 {
            return Err(RejectionReason::Empty);
        }

        if file.size() > self.limits.max_file_bytes {
            return Err(RejectionReason::TooLarge {
                size: file.size(),
                max_file_bytes: self.limits.max_file_bytes,
            });
        }

        if !self.accepted.iter().any(|regex| regex.is_match(&file.mime_type)) {
            return Err(RejectionReason::UnsupportedType {
                mime_type: file.mime_type.clone(),
            });
        }

        Ok(())
    }
}

fn compile_mime_pattern(pattern: &str) -> Result<Regex, SettingsError> {
    let pattern = pattern.trim();
    let (kind, subtype) = pattern.split_once('/').ok_or_else(|| SettingsError::Invalid {
        field: "accepted_types",
        reason: format!("'{}' is not a type/subtype pattern", pattern),
    })?;

    let subtype = if subtype == "*" {
        "[^/]+".to_string()
    } else {
        regex::escape(subtype)
    };

    Regex::new(&format!("(?i)^{}/{}$", regex::escape(kind), subtype)).map_err(|e| {
        SettingsError::Invalid {
            field: "accepted_types",
            reason: e.to_string(),
        }
    })
}

/// Accept a batch of uploads into the store
///
/// Accepted files are appended in upload order with status pending.
pub async fn intake(
    store: &MediaStore,
    policy: &IntakePolicy,
    files: Vec<UploadedFile>,
) -> IntakeReport {
    let mut report = IntakeReport::default();
    let mut candidates = Vec::with_capacity(files.len());

    for upload in files {
        let file = upload.into_media_file();
        match policy.check(&file) {
            Ok(()) => candidates.push(file),
            Err(reason) => {
                warn!("Rejected upload {}: {}", file.name, reason);
                report.rejected.push(Rejection {
                    filename: file.name,
                    reason,
                });
            }
        }
    }

    let cap = policy
        .limits
        .enforce_limits
        .then_some(policy.limits.max_files);
    let (accepted, overflow) = store.append_bounded(candidates, cap).await;

    for file in overflow {
        let reason = RejectionReason::TooManyFiles {
            max_files: policy.limits.max_files,
        };
        warn!("Rejected upload {}: {}", file.name, reason);
        report.rejected.push(Rejection {
            filename: file.name,
            reason,
        });
    }

    info!(
        "Intake accepted {} files, rejected {}",
        accepted.len(),
        report.rejected.len()
    );
    report.accepted = accepted;
    report
}
