use std::fmt;

use crate::attachment::{AttachmentSource, RejectedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// User-visible message raised by a composer operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// One per batch, however many files in it failed.
    FilesRejected {
        source: AttachmentSource,
        rejected: Vec<RejectedFile>,
    },
    CameraUnavailable,
    SignInRequired,
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Self::FilesRejected { .. } | Self::SignInRequired => NoticeLevel::Warning,
            Self::CameraUnavailable => NoticeLevel::Error,
        }
    }

    /// Headline sentence, without the per-file list.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::FilesRejected {
                source: AttachmentSource::Picker,
                ..
            } => {
                "Some files are invalid. Ensure files are PDF, Image, Text, CSV, Excel, or Word format and under 10MB."
            }
            Self::FilesRejected {
                source: AttachmentSource::Camera,
                ..
            } => "Some images are invalid. Only image files under 10MB are allowed from the camera.",
            Self::CameraUnavailable => "Camera not supported on this device.",
            Self::SignInRequired => "You must be signed in to send a message.",
        }
    }

    /// Full text including which files were dropped and why.
    pub fn message(&self) -> String {
        match self {
            Self::FilesRejected { rejected, .. } if !rejected.is_empty() => {
                let details = rejected
                    .iter()
                    .map(|file| format!("{} ({})", file.name, file.reason))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} Rejected: {details}.", self.headline())
            }
            _ => self.headline().to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message())
    }
}
