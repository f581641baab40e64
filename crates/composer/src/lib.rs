#![deny(unsafe_code)]

//! Attachment staging and submission for the zova message composer.
//!
//! The crate is UI-free: hosts feed it file selections and text, run the
//! futures it hands out on their own executor, and apply the results back.

pub mod attachment;
pub mod camera;
pub mod composer;
pub mod error;
pub mod notice;
pub mod preview;
pub mod run;
pub mod send;
pub mod session;

pub use attachment::{
    AttachmentFile, AttachmentKind, AttachmentSource, MAX_ATTACHMENT_BYTES, PICKER_EXTENSIONS,
    RejectedFile, RejectionReason, StagedAttachment, format_size, guess_media_type, validate,
};
pub use camera::{
    CameraDevice, CameraLease, CameraProbe, CameraSupport, DeviceNodeCamera, NoCamera,
    platform_camera,
};
pub use composer::{
    Composer, ComposerDeps, PendingSubmit, SubmissionRejection, SubmissionState,
    SubmissionTransition, SubmitCompletion, SubmitResolution, SubmitSkip, SubmitStart,
    SubmitTicket,
};
pub use error::{CameraError, CameraResult, SendError, SendResult};
pub use notice::{Notice, NoticeLevel};
pub use preview::{MemoryPreviewStore, PreviewHandle, PreviewStore, PreviewUrl};
pub use run::{
    ArtifactData, ArtifactId, Cell, ChartData, InputFile, OutputArtifact, PdfReportData, RunId,
    RunLike, RunStatus, SentFile, TableData, TextData, TextPayload,
};
pub use send::{BoxFuture, ConversationId, FilePreview, MessageSender, SendRequest};
pub use session::{SessionSlot, SessionSource, SessionToken};
