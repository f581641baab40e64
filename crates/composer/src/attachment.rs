use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::preview::{PreviewHandle, PreviewUrl};

/// Largest file the composer will stage, from either entry point.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Extensions accepted from the file picker, compared case-insensitively.
pub const PICKER_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "txt", "csv", "xlsx", "xls", "xlsm", "docx", "doc",
];

/// Entry point a batch of files arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSource {
    Picker,
    Camera,
}

/// One user-selected blob with its name and declared media type.
///
/// Bytes are shared, so cloning a file for the outgoing request does not copy
/// the payload.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    name: String,
    media_type: String,
    size: u64,
    bytes: Arc<[u8]>,
}

impl AttachmentFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Builds a file whose media type is guessed from its name.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let media_type = guess_media_type(&name);
        Self::new(name, media_type, bytes)
    }

    /// Metadata-only file for blobs whose contents were never loaded, e.g. a
    /// picked file already known to exceed [`MAX_ATTACHMENT_BYTES`].
    ///
    /// Such a file still takes part in validation so the batch notice counts it.
    pub fn declared(name: impl Into<String>, media_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size,
            bytes: Arc::from(Vec::<u8>::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Lowercased text after the final `.` of the name, if any.
    pub fn extension(&self) -> Option<String> {
        let (_, extension) = self.name.rsplit_once('.')?;
        if extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::classify(&self.name, &self.media_type)
    }
}

impl fmt::Debug for AttachmentFile {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AttachmentFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Guesses a media type from a file name, falling back to octet-stream.
pub fn guess_media_type(name: &str) -> String {
    mime_guess::from_path(Path::new(name))
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Display and wire classification of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Text,
    Csv,
    Excel,
    Word,
}

impl AttachmentKind {
    /// Media type wins over extension for images; everything else checks both.
    pub fn classify(name: &str, media_type: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .unwrap_or_default();

        if media_type.starts_with("image/") {
            Self::Image
        } else if extension == "pdf" || media_type == "application/pdf" {
            Self::Pdf
        } else if extension == "csv" || media_type.contains("csv") {
            Self::Csv
        } else if matches!(extension.as_str(), "xlsx" | "xls" | "xlsm")
            || media_type.contains("spreadsheet")
            || media_type.contains("ms-excel")
        {
            Self::Excel
        } else if matches!(extension.as_str(), "docx" | "doc")
            || media_type.contains("wordprocessing")
            || media_type == "application/msword"
        {
            Self::Word
        } else {
            Self::Text
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Image => "Image",
            Self::Text => "Text",
            Self::Csv => "CSV",
            Self::Excel => "Excel",
            Self::Word => "Word",
        }
    }

    /// Whether the payload is plain text that can be inlined into a prompt.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Csv)
    }
}

/// Why a single file was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    UnsupportedExtension { extension: Option<String> },
    NotAnImage { media_type: String },
    TooLarge { size: u64, limit: u64 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedExtension { extension: Some(extension) } => {
                write!(formatter, "unsupported file type .{extension}")
            }
            Self::UnsupportedExtension { extension: None } => {
                write!(formatter, "missing file extension")
            }
            Self::NotAnImage { media_type } => write!(formatter, "{media_type} is not an image"),
            Self::TooLarge { size, limit } => write!(
                formatter,
                "{} exceeds the {} limit",
                format_size(*size),
                format_size(*limit)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub name: String,
    pub reason: RejectionReason,
}

/// Checks one file against the rule for its entry point.
///
/// Type is checked before size, so a file failing both reports its type.
pub fn validate(file: &AttachmentFile, source: AttachmentSource) -> Result<(), RejectionReason> {
    match source {
        AttachmentSource::Picker => {
            let extension = file.extension();
            let allowed = extension
                .as_deref()
                .is_some_and(|extension| PICKER_EXTENSIONS.contains(&extension));
            if !allowed {
                return Err(RejectionReason::UnsupportedExtension { extension });
            }
        }
        AttachmentSource::Camera => {
            if !file.is_image() {
                return Err(RejectionReason::NotAnImage {
                    media_type: file.media_type().to_string(),
                });
            }
        }
    }

    if file.size() > MAX_ATTACHMENT_BYTES {
        return Err(RejectionReason::TooLarge {
            size: file.size(),
            limit: MAX_ATTACHMENT_BYTES,
        });
    }

    Ok(())
}

/// Splits a batch into files that pass validation, in arrival order, and rejections.
pub fn partition_batch(
    files: Vec<AttachmentFile>,
    source: AttachmentSource,
) -> (Vec<AttachmentFile>, Vec<RejectedFile>) {
    let mut accepted = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();

    for file in files {
        match validate(&file, source) {
            Ok(()) => accepted.push(file),
            Err(reason) => rejected.push(RejectedFile {
                name: file.name().to_string(),
                reason,
            }),
        }
    }

    (accepted, rejected)
}

/// A file the composer owns together with its preview handle.
#[derive(Debug)]
pub struct StagedAttachment {
    file: AttachmentFile,
    preview: PreviewHandle,
}

impl StagedAttachment {
    pub(crate) fn new(file: AttachmentFile, preview: PreviewHandle) -> Self {
        Self { file, preview }
    }

    pub fn file(&self) -> &AttachmentFile {
        &self.file
    }

    pub fn preview_url(&self) -> &PreviewUrl {
        self.preview.url()
    }

    pub fn kind(&self) -> AttachmentKind {
        self.file.kind()
    }
}

/// Human-readable size in binary units, as shown in notices and attachment chips.
pub fn format_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}
