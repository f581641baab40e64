use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::attachment::AttachmentFile;
use crate::error::SendResult;
use crate::preview::PreviewUrl;
use crate::run::{RunLike, SentFile};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque identifier of the conversation a composer posts into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A staged file paired with the preview it is displayed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePreview {
    pub file: AttachmentFile,
    pub preview_url: PreviewUrl,
}

impl From<FilePreview> for SentFile {
    fn from(preview: FilePreview) -> Self {
        Self {
            file: preview.file,
            preview_url: preview.preview_url,
        }
    }
}

/// Everything a single submit hands to the send collaborator.
///
/// `files` and `file_previews` are parallel and in staging order;
/// `file_previews` is `None` when nothing was attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub conversation_id: Option<ConversationId>,
    pub user_input: String,
    pub files: Vec<AttachmentFile>,
    pub file_previews: Option<Vec<FilePreview>>,
}

impl SendRequest {
    pub fn has_attachments(&self) -> bool {
        !self.files.is_empty()
    }
}

/// Transmits one composed message and produces the run it created.
///
/// Timeouts and retries are the implementation's business.
pub trait MessageSender: Send + Sync {
    fn send_message<'a>(&'a self, request: SendRequest) -> BoxFuture<'a, SendResult<RunLike>>;
}
