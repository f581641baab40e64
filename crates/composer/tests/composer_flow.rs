use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use zova_composer::{
    AttachmentFile, AttachmentSource, BoxFuture, CameraDevice, CameraError, CameraLease,
    CameraResult, CameraSupport, Composer, ComposerDeps, MAX_ATTACHMENT_BYTES, MessageSender,
    NoCamera, Notice, PreviewStore, PreviewUrl, RunId, RunLike, RunStatus, SendError,
    SendRequest, SendResult, SessionSlot, SessionToken, SubmitResolution, SubmitSkip,
    SubmitStart, SubmitTicket,
};

const MIB: u64 = 1024 * 1024;

#[derive(Default)]
struct RecordingPreviews {
    next: Mutex<u64>,
    created: Mutex<Vec<PreviewUrl>>,
    revocations: Mutex<HashMap<PreviewUrl, u32>>,
}

impl RecordingPreviews {
    fn revocations_of(&self, url: &PreviewUrl) -> u32 {
        self.revocations.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn created(&self) -> Vec<PreviewUrl> {
        self.created.lock().unwrap().clone()
    }

    fn live(&self) -> Vec<PreviewUrl> {
        self.created()
            .into_iter()
            .filter(|url| self.revocations_of(url) == 0)
            .collect()
    }
}

impl PreviewStore for RecordingPreviews {
    fn create(&self, file: &AttachmentFile) -> PreviewUrl {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let url = PreviewUrl::new(format!("blob:test/{}/{}", *next, file.name()));
        self.created.lock().unwrap().push(url.clone());
        url
    }

    fn revoke(&self, url: &PreviewUrl) -> bool {
        let mut revocations = self.revocations.lock().unwrap();
        let count = revocations.entry(url.clone()).or_insert(0);
        *count += 1;
        *count == 1
    }
}

/// Records every request and answers from a script, defaulting to a completed run.
#[derive(Default)]
struct ScriptedSender {
    requests: Mutex<Vec<SendRequest>>,
    failures: Mutex<VecDeque<SendError>>,
}

impl ScriptedSender {
    fn fail_next(&self, error: SendError) {
        self.failures.lock().unwrap().push_back(error);
    }

    fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl MessageSender for ScriptedSender {
    fn send_message<'a>(&'a self, request: SendRequest) -> BoxFuture<'a, SendResult<RunLike>> {
        Box::pin(async move {
            let failure = self.failures.lock().unwrap().pop_front();
            let user_input = request.user_input.clone();
            self.requests.lock().unwrap().push(request);

            if let Some(error) = failure {
                return Err(error);
            }

            let mut run = RunLike::blocked(user_input);
            run.id = RunId::Number(self.calls() as u64);
            run.status = RunStatus::Completed;
            run.final_output = Some("done".to_string());
            Ok(run)
        })
    }
}

/// Never answers, like a request stuck on a dead connection.
struct HangingSender;

impl MessageSender for HangingSender {
    fn send_message<'a>(&'a self, _request: SendRequest) -> BoxFuture<'a, SendResult<RunLike>> {
        Box::pin(std::future::pending())
    }
}

struct Harness {
    composer: Composer,
    previews: Arc<RecordingPreviews>,
    sender: Arc<ScriptedSender>,
    session: Arc<SessionSlot>,
}

fn harness() -> Harness {
    harness_with_camera(Arc::new(NoCamera))
}

fn harness_with_camera(camera: Arc<dyn CameraDevice>) -> Harness {
    let previews = Arc::new(RecordingPreviews::default());
    let sender = Arc::new(ScriptedSender::default());
    let session = Arc::new(SessionSlot::new(SessionToken::new("valid-token")));

    let composer = Composer::new(ComposerDeps {
        previews: previews.clone(),
        sender: sender.clone(),
        session: session.clone(),
        camera,
    });

    Harness {
        composer,
        previews,
        sender,
        session,
    }
}

fn composer_with_sender(sender: Arc<dyn MessageSender>) -> Composer {
    Composer::new(ComposerDeps {
        previews: Arc::new(RecordingPreviews::default()),
        sender,
        session: Arc::new(SessionSlot::new(SessionToken::new("valid-token"))),
        camera: Arc::new(NoCamera),
    })
}

fn file(name: &str, media_type: &str, size: u64) -> AttachmentFile {
    AttachmentFile::declared(name, media_type, size)
}

fn staged_names(composer: &Composer) -> Vec<String> {
    composer
        .attachments()
        .iter()
        .map(|attachment| attachment.file().name().to_string())
        .collect()
}

fn transport_error() -> SendError {
    SendError::Transport {
        stage: "test",
        message: "connection reset".to_string(),
    }
}

#[test]
fn oversized_pdf_and_small_png_stage_only_the_png_with_one_notice() {
    let mut h = harness();

    let notice = h.composer.add_files(
        vec![
            file("q3.pdf", "application/pdf", 12 * MIB),
            file("chart.png", "image/png", 2 * MIB),
        ],
        AttachmentSource::Picker,
    );

    assert_eq!(staged_names(&h.composer), vec!["chart.png"]);
    match notice {
        Some(Notice::FilesRejected { source, rejected }) => {
            assert_eq!(source, AttachmentSource::Picker);
            assert_eq!(rejected.len(), 1);
            assert_eq!(rejected[0].name, "q3.pdf");
        }
        other => panic!("expected a single rejection notice, got {other:?}"),
    }
    assert_eq!(h.previews.created().len(), 1);
}

#[test]
fn clean_batch_raises_no_notice_and_appends_after_existing_files() {
    let mut h = harness();

    assert_eq!(
        h.composer.add_files(
            vec![file("a.txt", "text/plain", 1), file("b.csv", "text/csv", 1)],
            AttachmentSource::Picker,
        ),
        None
    );
    let notice = h.composer.add_files(
        vec![
            file("c.jpg", "image/jpeg", 1),
            file("d.gif", "image/gif", 1),
            file("e.docx", "application/octet-stream", MAX_ATTACHMENT_BYTES),
        ],
        AttachmentSource::Picker,
    );

    assert!(matches!(notice, Some(Notice::FilesRejected { ref rejected, .. }) if rejected.len() == 1));
    assert_eq!(
        staged_names(&h.composer),
        vec!["a.txt", "b.csv", "c.jpg", "e.docx"]
    );
}

#[test]
fn camera_batches_accept_only_images() {
    let mut h = harness();

    let notice = h.composer.add_files(
        vec![
            file("IMG_0001.heic", "image/heic", 3 * MIB),
            file("scan.pdf", "application/pdf", MIB),
            file("IMG_0002.jpg", "image/jpeg", 11 * MIB),
        ],
        AttachmentSource::Camera,
    );

    assert_eq!(staged_names(&h.composer), vec!["IMG_0001.heic"]);
    assert!(matches!(
        notice,
        Some(Notice::FilesRejected { source: AttachmentSource::Camera, ref rejected }) if rejected.len() == 2
    ));
}

#[test]
fn removing_one_attachment_releases_only_its_preview() {
    let mut h = harness();
    h.composer.add_files(
        vec![
            file("same.txt", "text/plain", 4),
            file("same.txt", "text/plain", 4),
            file("other.png", "image/png", 4),
        ],
        AttachmentSource::Picker,
    );
    let urls = h.previews.created();

    assert!(h.composer.remove_attachment(1));

    assert_eq!(h.previews.revocations_of(&urls[0]), 0);
    assert_eq!(h.previews.revocations_of(&urls[1]), 1);
    assert_eq!(h.previews.revocations_of(&urls[2]), 0);
    assert_eq!(staged_names(&h.composer), vec!["same.txt", "other.png"]);
    let remaining = h
        .composer
        .attachments()
        .iter()
        .map(|attachment| attachment.preview_url().clone())
        .collect::<Vec<_>>();
    assert_eq!(remaining, vec![urls[0].clone(), urls[2].clone()]);
}

#[test]
fn out_of_range_removal_is_a_no_op() {
    let mut h = harness();
    h.composer
        .add_files(vec![file("a.txt", "text/plain", 1)], AttachmentSource::Picker);

    assert!(!h.composer.remove_attachment(1));
    assert!(!h.composer.remove_attachment(usize::MAX));
    assert_eq!(staged_names(&h.composer), vec!["a.txt"]);
    assert!(h.previews.live().len() == 1);
}

#[tokio::test]
async fn summarize_scenario_delivers_once_and_clears_text() {
    let mut h = harness();
    h.composer.set_text("Summarize Q3 revenue");

    let pending = match h.composer.begin_submit() {
        SubmitStart::Dispatched(pending) => pending,
        _ => panic!("expected dispatch"),
    };
    assert!(h.composer.is_submitting());
    assert!(!h.composer.can_submit());

    let completion = pending.send().await;
    let resolution = h.composer.finish_submit(completion);

    let requests = h.sender.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].user_input, "Summarize Q3 revenue");
    assert!(requests[0].files.is_empty());
    assert_eq!(requests[0].file_previews, None);

    match resolution {
        SubmitResolution::Delivered(run) => {
            assert_eq!(run.status, RunStatus::Completed);
            assert_eq!(run.user_input, "Summarize Q3 revenue");
        }
        other => panic!("expected delivery, got {other:?}"),
    }
    assert_eq!(h.composer.text(), "");
    assert!(!h.composer.is_submitting());
}

#[tokio::test]
async fn second_submit_while_in_flight_is_ignored() {
    let mut h = harness();
    h.composer.set_text("hello");

    let first = h.composer.begin_submit();
    let second = h.composer.begin_submit();

    assert!(matches!(second, SubmitStart::Ignored(SubmitSkip::InFlight)));
    let SubmitStart::Dispatched(pending) = first else {
        panic!("first submit should dispatch");
    };
    let completion = pending.send().await;
    h.composer.finish_submit(completion);

    assert_eq!(h.sender.calls(), 1);
}

#[tokio::test]
async fn cancelled_submit_does_not_leave_the_composer_in_flight() {
    let mut composer = composer_with_sender(Arc::new(HangingSender));
    composer.set_text("hello");

    let outcome = tokio::time::timeout(Duration::from_millis(20), composer.submit()).await;

    assert!(outcome.is_err(), "hanging send should time out");
    assert!(!composer.is_submitting());
    assert!(matches!(composer.begin_submit(), SubmitStart::Dispatched(_)));
    assert_eq!(composer.text(), "hello");
}

#[tokio::test]
async fn dropping_a_dispatched_submit_returns_to_idle() {
    let mut h = harness();
    h.composer.set_text("hello");

    let SubmitStart::Dispatched(pending) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    let abandoned = pending.ticket();
    assert!(h.composer.is_submitting());
    drop(pending);

    assert!(!h.composer.is_submitting());
    let SubmitStart::Dispatched(retry) = h.composer.begin_submit() else {
        panic!("retry should dispatch");
    };
    assert_ne!(retry.ticket(), abandoned);

    let completion = retry.send().await;
    assert!(matches!(
        h.composer.finish_submit(completion),
        SubmitResolution::Delivered(_)
    ));
    assert_eq!(h.sender.calls(), 1);
}

#[tokio::test]
async fn late_completion_of_an_abandoned_submit_is_stale() {
    let mut h = harness();
    h.composer.set_text("first");

    let SubmitStart::Dispatched(first) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    let stale_ticket = first.ticket();
    drop(first);

    h.composer.set_text("second");
    let SubmitStart::Dispatched(second) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };

    let mut late = second.send().await;
    late.ticket = stale_ticket;
    assert!(matches!(h.composer.finish_submit(late), SubmitResolution::Stale));
    assert!(h.composer.is_submitting());
    assert_eq!(h.composer.text(), "second");
}

#[tokio::test]
async fn missing_session_returns_blocked_run_without_sending() {
    let mut h = harness();
    h.session.sign_out();
    h.composer.set_text("  keep my draft ");
    h.composer
        .add_files(vec![file("a.png", "image/png", 10)], AttachmentSource::Picker);

    let run = match h.composer.begin_submit() {
        SubmitStart::Blocked(run) => run,
        _ => panic!("expected a blocked run"),
    };

    assert_eq!(run.status, RunStatus::Blocked);
    assert_eq!(run.user_input, "  keep my draft ");
    assert_eq!(run.final_output, None);
    assert!(run.output_artifacts.is_empty());
    assert_eq!(h.sender.calls(), 0);
    assert!(!h.composer.is_submitting());
    assert_eq!(h.composer.text(), "  keep my draft ");
    assert_eq!(h.composer.attachments().len(), 1);
}

#[tokio::test]
async fn blocked_check_runs_before_empty_check() {
    let mut h = harness();
    h.session.sign_out();

    assert!(matches!(h.composer.begin_submit(), SubmitStart::Blocked(_)));
}

#[tokio::test]
async fn empty_or_whitespace_draft_is_ignored() {
    let mut h = harness();
    assert!(matches!(
        h.composer.begin_submit(),
        SubmitStart::Ignored(SubmitSkip::Empty)
    ));

    h.composer.set_text(" \n\t ");
    assert!(matches!(
        h.composer.begin_submit(),
        SubmitStart::Ignored(SubmitSkip::Empty)
    ));
    assert!(!h.composer.is_submitting());
    assert_eq!(h.sender.calls(), 0);
}

#[tokio::test]
async fn send_is_enabled_only_for_content_while_idle() {
    let mut h = harness();
    assert!(!h.composer.can_submit());

    h.composer.set_text("   \n");
    assert!(!h.composer.can_submit());

    h.composer.set_text("draft");
    assert!(h.composer.can_submit());

    h.composer.set_text("");
    h.composer
        .add_files(vec![file("a.png", "image/png", 10)], AttachmentSource::Picker);
    assert!(h.composer.can_submit());

    let SubmitStart::Dispatched(pending) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    assert!(!h.composer.can_submit());

    let completion = pending.send().await;
    h.composer.finish_submit(completion);
    assert!(!h.composer.can_submit());
}

#[tokio::test]
async fn attachments_alone_are_enough_to_submit() {
    let mut h = harness();
    h.composer.add_files(
        vec![file("a.png", "image/png", 10), file("b.pdf", "application/pdf", 20)],
        AttachmentSource::Picker,
    );
    let urls = h.previews.created();

    let run = h.composer.submit().await;

    assert!(run.is_some());
    let request = &h.sender.requests()[0];
    assert_eq!(request.user_input, "");
    let sent_names = request.files.iter().map(AttachmentFile::name).collect::<Vec<_>>();
    assert_eq!(sent_names, vec!["a.png", "b.pdf"]);
    let preview_urls = request
        .file_previews
        .as_ref()
        .expect("previews accompany files")
        .iter()
        .map(|preview| preview.preview_url.clone())
        .collect::<Vec<_>>();
    assert_eq!(preview_urls, urls);
}

#[tokio::test]
async fn success_releases_every_preview_exactly_once() {
    let mut h = harness();
    h.composer.set_text("with files");
    h.composer.add_files(
        vec![
            file("a.png", "image/png", 1),
            file("b.txt", "text/plain", 1),
            file("c.csv", "text/csv", 1),
        ],
        AttachmentSource::Picker,
    );

    let run = h.composer.submit().await;

    assert!(run.is_some());
    assert!(h.composer.attachments().is_empty());
    for url in h.previews.created() {
        assert_eq!(h.previews.revocations_of(&url), 1, "{url}");
    }

    drop(h.composer);
    for url in h.previews.created() {
        assert_eq!(h.previews.revocations_of(&url), 1, "{url}");
    }
}

#[tokio::test]
async fn failure_keeps_draft_and_allows_retry() {
    let mut h = harness();
    h.composer.set_text("retry me");
    h.composer
        .add_files(vec![file("a.png", "image/png", 1)], AttachmentSource::Picker);
    h.sender.fail_next(transport_error());
    let urls_before = h.previews.created();

    let SubmitStart::Dispatched(pending) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    let resolution = h.composer.finish_submit(pending.send().await);

    assert!(matches!(
        resolution,
        SubmitResolution::Failed(SendError::Transport { .. })
    ));
    assert!(!h.composer.is_submitting());
    assert_eq!(h.composer.text(), "retry me");
    assert_eq!(staged_names(&h.composer), vec!["a.png"]);
    assert_eq!(h.previews.live(), urls_before);

    let retried = h.composer.submit().await;
    assert!(retried.is_some());
    assert_eq!(h.sender.calls(), 2);
    assert_eq!(h.sender.requests()[1].user_input, "retry me");
}

#[tokio::test]
async fn edits_after_dispatch_do_not_change_the_request() {
    let mut h = harness();
    h.composer.set_text("original");
    h.composer
        .add_files(vec![file("a.png", "image/png", 1)], AttachmentSource::Picker);

    let SubmitStart::Dispatched(pending) = h.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    h.composer.set_text("edited while sending");
    h.composer
        .add_files(vec![file("late.txt", "text/plain", 1)], AttachmentSource::Picker);
    h.composer.remove_attachment(0);

    assert_eq!(pending.request().user_input, "original");
    let completion = pending.send().await;
    h.composer.finish_submit(completion);

    let request = &h.sender.requests()[0];
    assert_eq!(request.files.len(), 1);
    assert_eq!(request.files[0].name(), "a.png");
    assert!(h.composer.attachments().is_empty());
    assert!(h.previews.live().is_empty());
}

#[tokio::test]
async fn stale_completion_is_ignored() {
    let mut first = harness();
    let mut second = harness();
    first.composer.set_text("one");
    second.composer.set_text("two");

    let SubmitStart::Dispatched(pending) = first.composer.begin_submit() else {
        panic!("expected dispatch");
    };
    let completion = pending.send().await;

    // Composers are independent, so a completion from one means nothing to the other.
    let mut foreign = completion;
    foreign.ticket = SubmitTicket(99);
    assert!(matches!(
        second.composer.finish_submit(foreign),
        SubmitResolution::Stale
    ));
    assert_eq!(second.composer.text(), "two");
    assert!(first.composer.is_submitting());
}

#[test]
fn teardown_releases_outstanding_previews() {
    let mut h = harness();
    h.composer.add_files(
        vec![file("a.png", "image/png", 1), file("b.png", "image/png", 1)],
        AttachmentSource::Picker,
    );
    h.composer.remove_attachment(0);
    let previews = Arc::clone(&h.previews);

    drop(h.composer);

    assert!(previews.live().is_empty());
    for url in previews.created() {
        assert_eq!(previews.revocations_of(&url), 1, "{url}");
    }
}

struct DeniedCamera;

impl CameraDevice for DeniedCamera {
    fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>> {
        Box::pin(async move {
            Err(CameraError::AccessDenied {
                stage: "test",
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        })
    }
}

struct ReadyCamera;

impl CameraDevice for ReadyCamera {
    fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>> {
        Box::pin(async move { Ok(CameraLease::new(())) })
    }
}

#[tokio::test]
async fn camera_probe_runs_once_and_gates_capture() {
    let mut h = harness_with_camera(Arc::new(DeniedCamera));
    assert_eq!(h.composer.camera_support(), CameraSupport::Unknown);
    assert_eq!(h.composer.request_camera_capture(), Ok(()));

    let probe = h.composer.start_camera_probe().expect("first probe");
    assert!(h.composer.start_camera_probe().is_none());

    let support = probe.run().await;
    h.composer.apply_camera_support(support);

    assert_eq!(h.composer.camera_support(), CameraSupport::Unsupported);
    assert_eq!(
        h.composer.request_camera_capture(),
        Err(Notice::CameraUnavailable)
    );

    h.composer.apply_camera_support(CameraSupport::Supported);
    assert_eq!(h.composer.camera_support(), CameraSupport::Unsupported);
}

#[tokio::test]
async fn working_camera_enables_capture() {
    let mut h = harness_with_camera(Arc::new(ReadyCamera));

    let probe = h.composer.start_camera_probe().expect("first probe");
    h.composer.apply_camera_support(probe.run().await);

    assert_eq!(h.composer.camera_support(), CameraSupport::Supported);
    assert_eq!(h.composer.request_camera_capture(), Ok(()));
}
