use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::attachment::{AttachmentFile, AttachmentSource, StagedAttachment, partition_batch};
use crate::camera::{CameraDevice, CameraProbe, CameraSupport};
use crate::error::{SendError, SendResult};
use crate::notice::Notice;
use crate::preview::{PreviewHandle, PreviewStore};
use crate::run::RunLike;
use crate::send::{ConversationId, FilePreview, MessageSender, SendRequest};
use crate::session::SessionSource;

/// Identifies one dispatched submission so its completion can be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmitTicket(pub u64);

/// Single-flight submission lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting(SubmitTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTransition {
    Begin(SubmitTicket),
    Resolve(SubmitTicket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionRejection {
    AlreadySubmitting {
        active: SubmitTicket,
        attempted: SubmitTicket,
    },
    NoActiveSubmission,
    TicketMismatch {
        active: SubmitTicket,
        attempted: SubmitTicket,
    },
}

pub type SubmissionTransitionResult = Result<SubmissionState, SubmissionRejection>;

impl SubmissionState {
    pub fn active_ticket(&self) -> Option<SubmitTicket> {
        match self {
            Self::Submitting(ticket) => Some(*ticket),
            Self::Idle => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting(_))
    }

    /// `Begin` is only legal from `Idle`; `Resolve` must name the active ticket.
    pub fn apply(&self, transition: SubmissionTransition) -> SubmissionTransitionResult {
        match (self, transition) {
            (Self::Idle, SubmissionTransition::Begin(ticket)) => Ok(Self::Submitting(ticket)),
            (Self::Submitting(active), SubmissionTransition::Begin(attempted)) => {
                Err(SubmissionRejection::AlreadySubmitting {
                    active: *active,
                    attempted,
                })
            }
            (Self::Submitting(active), SubmissionTransition::Resolve(ticket))
                if *active == ticket =>
            {
                Ok(Self::Idle)
            }
            (Self::Submitting(active), SubmissionTransition::Resolve(attempted)) => {
                Err(SubmissionRejection::TicketMismatch {
                    active: *active,
                    attempted,
                })
            }
            (Self::Idle, SubmissionTransition::Resolve(_)) => {
                Err(SubmissionRejection::NoActiveSubmission)
            }
        }
    }
}

/// Why `begin_submit` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitSkip {
    InFlight,
    Empty,
}

/// Synchronous half of a submit.
pub enum SubmitStart {
    /// No session: a local run that never reaches the network.
    Blocked(RunLike),
    Ignored(SubmitSkip),
    Dispatched(PendingSubmit),
}

/// Flags its submission as abandoned when dropped before the send finished.
struct AbandonOnDrop {
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl AbandonOnDrop {
    fn new(abandoned: Arc<AtomicBool>) -> Self {
        Self {
            abandoned,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
        }
    }
}

/// A dispatched request waiting to be sent.
///
/// It owns a snapshot of the draft, so edits made while it is outstanding do
/// not change what goes out. Dropping it, or the future returned by
/// [`PendingSubmit::send`], before the collaborator answers hands the composer
/// back to `Idle`.
pub struct PendingSubmit {
    ticket: SubmitTicket,
    request: SendRequest,
    sender: Arc<dyn MessageSender>,
    guard: AbandonOnDrop,
}

impl PendingSubmit {
    pub fn ticket(&self) -> SubmitTicket {
        self.ticket
    }

    pub fn request(&self) -> &SendRequest {
        &self.request
    }

    pub async fn send(self) -> SubmitCompletion {
        let Self {
            ticket,
            request,
            sender,
            guard,
        } = self;

        let result = sender.send_message(request).await;
        guard.disarm();
        SubmitCompletion { ticket, result }
    }
}

/// Outcome of the send collaborator, to be fed back into `finish_submit`.
#[derive(Debug)]
pub struct SubmitCompletion {
    pub ticket: SubmitTicket,
    pub result: SendResult<RunLike>,
}

#[derive(Debug)]
pub enum SubmitResolution {
    /// The run created by this submit; the composer keeps no copy.
    Delivered(RunLike),
    /// The draft was kept for a retry.
    Failed(SendError),
    /// Completion did not belong to the active submission and was ignored.
    Stale,
}

/// Collaborators injected into a composer.
pub struct ComposerDeps {
    pub previews: Arc<dyn PreviewStore>,
    pub sender: Arc<dyn MessageSender>,
    pub session: Arc<dyn SessionSource>,
    pub camera: Arc<dyn CameraDevice>,
}

/// Draft text, staged attachments and the single-flight submit machine.
pub struct Composer {
    conversation_id: Option<ConversationId>,
    text: String,
    attachments: Vec<StagedAttachment>,
    submission: SubmissionState,
    camera_support: CameraSupport,
    camera: Option<Arc<dyn CameraDevice>>,
    previews: Arc<dyn PreviewStore>,
    sender: Arc<dyn MessageSender>,
    session: Arc<dyn SessionSource>,
    next_ticket: u64,
    /// Set by the active submission's guard if it was dropped unfinished.
    abandoned: Arc<AtomicBool>,
}

impl Composer {
    pub fn new(deps: ComposerDeps) -> Self {
        Self {
            conversation_id: None,
            text: String::new(),
            attachments: Vec::new(),
            submission: SubmissionState::Idle,
            camera_support: CameraSupport::Unknown,
            camera: Some(deps.camera),
            previews: deps.previews,
            sender: deps.sender,
            session: deps.session,
            next_ticket: 1,
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_conversation_id(&mut self, conversation_id: Option<ConversationId>) {
        self.conversation_id = conversation_id;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn attachments(&self) -> &[StagedAttachment] {
        &self.attachments
    }

    /// True while a dispatched submit is still outstanding.
    pub fn is_submitting(&self) -> bool {
        self.submission.is_submitting() && !self.abandoned.load(Ordering::Acquire)
    }

    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || !self.attachments.is_empty()
    }

    /// Whether the send action should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.is_submitting() && self.has_content()
    }

    pub fn camera_support(&self) -> CameraSupport {
        self.camera_support
    }

    /// Hands out the capability probe; only the first call returns one.
    pub fn start_camera_probe(&mut self) -> Option<CameraProbe> {
        self.camera.take().map(CameraProbe::new)
    }

    /// Records the probe result. Later results are ignored once resolved.
    pub fn apply_camera_support(&mut self, support: CameraSupport) {
        if self.camera_support.is_resolved() {
            tracing::debug!(
                current = ?self.camera_support,
                ignored = ?support,
                "camera support already resolved"
            );
            return;
        }
        self.camera_support = support;
    }

    /// Gate for the camera entry point.
    ///
    /// An unresolved probe does not block capture.
    pub fn request_camera_capture(&self) -> Result<(), Notice> {
        match self.camera_support {
            CameraSupport::Unsupported => Err(Notice::CameraUnavailable),
            CameraSupport::Unknown | CameraSupport::Supported => Ok(()),
        }
    }

    /// Validates a batch and stages the survivors after the existing attachments.
    ///
    /// Returns at most one notice for the whole batch.
    pub fn add_files(&mut self, files: Vec<AttachmentFile>, source: AttachmentSource) -> Option<Notice> {
        let selected = files.len();
        let (accepted, rejected) = partition_batch(files, source);

        self.attachments.reserve(accepted.len());
        for file in accepted {
            let preview = PreviewHandle::allocate(&self.previews, &file);
            self.attachments.push(StagedAttachment::new(file, preview));
        }

        if rejected.is_empty() {
            tracing::debug!(?source, staged = selected, total = self.attachments.len(), "staged files");
            return None;
        }

        tracing::warn!(
            ?source,
            selected,
            rejected = rejected.len(),
            total = self.attachments.len(),
            "dropped invalid files from batch"
        );
        Some(Notice::FilesRejected { source, rejected })
    }

    /// Removes and releases the attachment at `index`. Out of range is a no-op.
    pub fn remove_attachment(&mut self, index: usize) -> bool {
        if index >= self.attachments.len() {
            tracing::debug!(index, len = self.attachments.len(), "ignored out-of-range removal");
            return false;
        }

        // Dropping the staged attachment revokes its preview.
        drop(self.attachments.remove(index));
        true
    }

    /// Releases every staged preview and empties the sequence.
    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// Runs the submit preconditions in order and, if they pass, enters `Submitting`.
    pub fn begin_submit(&mut self) -> SubmitStart {
        self.reclaim_abandoned();

        if self.session.token().is_none() {
            tracing::info!("submit blocked: no authenticated session");
            return SubmitStart::Blocked(RunLike::blocked(self.text.clone()));
        }

        if self.is_submitting() {
            return SubmitStart::Ignored(SubmitSkip::InFlight);
        }

        if !self.has_content() {
            return SubmitStart::Ignored(SubmitSkip::Empty);
        }

        let ticket = SubmitTicket(self.next_ticket);
        match self.submission.apply(SubmissionTransition::Begin(ticket)) {
            Ok(next) => self.submission = next,
            Err(rejection) => {
                tracing::warn!(?rejection, "submit transition rejected");
                return SubmitStart::Ignored(SubmitSkip::InFlight);
            }
        }
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.abandoned = Arc::new(AtomicBool::new(false));

        let request = self.snapshot_request();
        tracing::debug!(
            ticket = ticket.0,
            files = request.files.len(),
            chars = request.user_input.len(),
            "dispatching submit"
        );

        SubmitStart::Dispatched(PendingSubmit {
            ticket,
            request,
            sender: Arc::clone(&self.sender),
            guard: AbandonOnDrop::new(Arc::clone(&self.abandoned)),
        })
    }

    /// Returns to `Idle` if the active submission was dropped before it finished.
    fn reclaim_abandoned(&mut self) {
        let Some(ticket) = self.submission.active_ticket() else {
            return;
        };
        if !self.abandoned.load(Ordering::Acquire) {
            return;
        }

        match self.submission.apply(SubmissionTransition::Resolve(ticket)) {
            Ok(next) => {
                tracing::warn!(ticket = ticket.0, "submit abandoned before completion; back to idle");
                self.submission = next;
            }
            Err(rejection) => {
                tracing::warn!(ticket = ticket.0, ?rejection, "could not reclaim abandoned submit");
            }
        }
    }

    /// Applies the collaborator's outcome and returns to `Idle`.
    ///
    /// Success clears the draft and releases every staged preview; failure keeps both.
    pub fn finish_submit(&mut self, completion: SubmitCompletion) -> SubmitResolution {
        let SubmitCompletion { ticket, result } = completion;

        match self.submission.apply(SubmissionTransition::Resolve(ticket)) {
            Ok(next) => self.submission = next,
            Err(rejection) => {
                tracing::warn!(ticket = ticket.0, ?rejection, "ignored stale submit completion");
                return SubmitResolution::Stale;
            }
        }

        match result {
            Ok(run) => {
                let released = self.attachments.len();
                self.text.clear();
                self.clear_attachments();
                tracing::info!(
                    ticket = ticket.0,
                    run_id = %run.id,
                    status = run.status.label(),
                    released,
                    "submit delivered"
                );
                SubmitResolution::Delivered(run)
            }
            Err(error) => {
                tracing::warn!(ticket = ticket.0, error = %error, "submit failed; draft kept for retry");
                SubmitResolution::Failed(error)
            }
        }
    }

    /// Runs a whole submit to completion on the caller's task.
    ///
    /// The composer is borrowed for the duration, so hosts that must stay
    /// editable while sending use `begin_submit`/`finish_submit` instead.
    pub async fn submit(&mut self) -> Option<RunLike> {
        match self.begin_submit() {
            SubmitStart::Blocked(run) => Some(run),
            SubmitStart::Ignored(_) => None,
            SubmitStart::Dispatched(pending) => {
                let completion = pending.send().await;
                match self.finish_submit(completion) {
                    SubmitResolution::Delivered(run) => Some(run),
                    SubmitResolution::Failed(_) | SubmitResolution::Stale => None,
                }
            }
        }
    }

    fn snapshot_request(&self) -> SendRequest {
        let files = self
            .attachments
            .iter()
            .map(|attachment| attachment.file().clone())
            .collect::<Vec<_>>();

        let file_previews = if self.attachments.is_empty() {
            None
        } else {
            Some(
                self.attachments
                    .iter()
                    .map(|attachment| FilePreview {
                        file: attachment.file().clone(),
                        preview_url: attachment.preview_url().clone(),
                    })
                    .collect(),
            )
        };

        SendRequest {
            conversation_id: self.conversation_id.clone(),
            user_input: self.text.trim().to_string(),
            files,
            file_previews,
        }
    }
}

impl Drop for Composer {
    fn drop(&mut self) {
        if !self.attachments.is_empty() {
            tracing::debug!(
                released = self.attachments.len(),
                "composer dropped; releasing staged previews"
            );
        }
    }
}
