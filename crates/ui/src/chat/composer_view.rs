use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable, WindowExt,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    notification::Notification,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use zova_composer::{
    AttachmentSource, CameraDevice, CameraSupport, Composer, ComposerDeps, ConversationId,
    MemoryPreviewStore, MessageSender, Notice, NoticeLevel, PreviewUrl, SendError,
    SessionSource, StagedAttachment, SubmitCompletion, SubmitResolution, SubmitStart, format_size,
};

use crate::chat::events::{RunCreated, SubmitBlocked};
use crate::files::{LoadedBatch, load_attachments};

/// Collaborators the host hands to a composer view.
pub struct ComposerViewDeps {
    pub previews: Arc<MemoryPreviewStore>,
    pub sender: Arc<dyn MessageSender>,
    pub session: Arc<dyn SessionSource>,
    pub camera: Arc<dyn CameraDevice>,
    pub conversation_id: Option<ConversationId>,
}

/// Text input, attachment strip and send action around one [`Composer`].
pub struct ComposerView {
    composer: Composer,
    previews: Arc<MemoryPreviewStore>,
    thumbnails: HashMap<PreviewUrl, Arc<Image>>,
    input_state: Entity<InputState>,
    pending_newline: bool,
    probe_task: Option<Task<()>>,
    pick_task: Option<Task<()>>,
    load_task: Option<Task<()>>,
    send_task: Option<Task<()>>,
}

impl EventEmitter<RunCreated> for ComposerView {}
impl EventEmitter<SubmitBlocked> for ComposerView {}

impl ComposerView {
    pub fn new(deps: ComposerViewDeps, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Ask anything, or attach files...")
                .auto_grow(3, 10)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, state, event: &InputEvent, window, cx| {
                if let InputEvent::Change { .. } = event {
                    let text = state.read(cx).value().to_string();
                    this.composer.set_text(text);
                    cx.notify();
                    return;
                }

                if let InputEvent::PressEnter { secondary } = event {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter already inserted the newline; swallow its PressEnter.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.handle_submit(window, cx);
                    }
                }
            },
        )
        .detach();

        let mut composer = Composer::new(ComposerDeps {
            previews: deps.previews.clone(),
            sender: deps.sender,
            session: deps.session,
            camera: deps.camera,
        });
        composer.set_conversation_id(deps.conversation_id);

        let mut this = Self {
            composer,
            previews: deps.previews,
            thumbnails: HashMap::new(),
            input_state,
            pending_newline: false,
            probe_task: None,
            pick_task: None,
            load_task: None,
            send_task: None,
        };
        this.spawn_camera_probe(cx);
        this
    }

    fn spawn_camera_probe(&mut self, cx: &mut Context<Self>) {
        let Some(probe) = self.composer.start_camera_probe() else {
            return;
        };

        let probe = Tokio::spawn(cx, probe.run());
        self.probe_task = Some(cx.spawn(async move |this, cx| {
            let support = match probe.await {
                Ok(support) => support,
                Err(error) => {
                    tracing::warn!(error = %error, "camera probe task failed");
                    CameraSupport::Unsupported
                }
            };

            let _ = this.update(cx, |this, cx| {
                this.composer.apply_camera_support(support);
                cx.notify();
            });
        }));
    }

    fn handle_shift_enter(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.pending_newline = true;
        self.input_state.update(cx, |state, cx| {
            state.insert("\n", window, cx);
        });
        cx.notify();
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let text = self.input_state.read(cx).value().to_string();
        self.composer.set_text(text);

        match self.composer.begin_submit() {
            SubmitStart::Blocked(run) => {
                push_notice(&Notice::SignInRequired, window, cx);
                cx.emit(SubmitBlocked { run });
            }
            SubmitStart::Ignored(skip) => {
                tracing::debug!(?skip, "submit ignored");
            }
            SubmitStart::Dispatched(pending) => {
                let ticket = pending.ticket();
                let send = Tokio::spawn(cx, pending.send());
                self.send_task = Some(cx.spawn_in(window, async move |this, cx| {
                    let completion = match send.await {
                        Ok(completion) => completion,
                        Err(error) => SubmitCompletion {
                            ticket,
                            result: Err(SendError::Transport {
                                stage: "join-send-task",
                                message: error.to_string(),
                            }),
                        },
                    };

                    let _ = this.update_in(cx, |this, window, cx| {
                        this.apply_completion(completion, window, cx);
                    });
                }));
            }
        }

        cx.notify();
    }

    fn apply_completion(
        &mut self,
        completion: SubmitCompletion,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        match self.composer.finish_submit(completion) {
            SubmitResolution::Delivered(run) => {
                self.input_state.update(cx, |state, cx| {
                    state.set_value("", window, cx);
                });
                self.pending_newline = false;
                self.prune_thumbnails();
                cx.emit(RunCreated { run });
            }
            SubmitResolution::Failed(error) => {
                window.push_notification(
                    Notification::error(format!("Message was not sent: {error}")),
                    cx,
                );
            }
            SubmitResolution::Stale => {}
        }

        cx.notify();
    }

    fn pick_files(&mut self, source: AttachmentSource, window: &mut Window, cx: &mut Context<Self>) {
        if source == AttachmentSource::Camera
            && let Err(notice) = self.composer.request_camera_capture()
        {
            push_notice(&notice, window, cx);
            return;
        }

        let paths = cx.prompt_for_paths(PathPromptOptions {
            files: true,
            directories: false,
            multiple: true,
            prompt: None,
        });

        self.pick_task = Some(cx.spawn_in(window, async move |this, cx| {
            let paths = match paths.await {
                Ok(Ok(Some(paths))) => paths,
                Ok(Ok(None)) | Err(_) => return,
                Ok(Err(error)) => {
                    tracing::warn!(error = %error, "file prompt failed");
                    return;
                }
            };

            let _ = this.update_in(cx, |this, window, cx| {
                this.load_paths(paths, source, window, cx);
            });
        }));
    }

    fn load_paths(
        &mut self,
        paths: Vec<PathBuf>,
        source: AttachmentSource,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let load = Tokio::spawn(cx, load_attachments(paths));
        self.load_task = Some(cx.spawn_in(window, async move |this, cx| {
            let batch = match load.await {
                Ok(batch) => batch,
                Err(error) => {
                    tracing::error!(error = %error, "attachment load task failed");
                    return;
                }
            };

            let _ = this.update_in(cx, |this, window, cx| {
                this.stage_batch(batch, source, window, cx);
            });
        }));
    }

    fn stage_batch(
        &mut self,
        batch: LoadedBatch,
        source: AttachmentSource,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        if !batch.failures.is_empty() {
            window.push_notification(
                Notification::warning(format!(
                    "{} selected file(s) could not be read.",
                    batch.failures.len()
                )),
                cx,
            );
        }

        if let Some(notice) = self.composer.add_files(batch.files, source) {
            push_notice(&notice, window, cx);
        }

        let decoded = self
            .composer
            .attachments()
            .iter()
            .filter(|attachment| !self.thumbnails.contains_key(attachment.preview_url()))
            .filter_map(|attachment| {
                let image = self.decode_thumbnail(attachment)?;
                Some((attachment.preview_url().clone(), image))
            })
            .collect::<Vec<_>>();
        self.thumbnails.extend(decoded);
        cx.notify();
    }

    fn remove_attachment(&mut self, index: usize, cx: &mut Context<Self>) {
        if self.composer.remove_attachment(index) {
            self.prune_thumbnails();
            cx.notify();
        }
    }

    fn decode_thumbnail(&self, attachment: &StagedAttachment) -> Option<Arc<Image>> {
        let format = match attachment.file().media_type() {
            "image/png" => ImageFormat::Png,
            "image/jpeg" => ImageFormat::Jpeg,
            "image/gif" => ImageFormat::Gif,
            "image/webp" => ImageFormat::Webp,
            _ => return None,
        };
        let bytes = self.previews.resolve(attachment.preview_url())?;
        if bytes.is_empty() {
            return None;
        }
        Some(Arc::new(Image::from_bytes(format, bytes.to_vec())))
    }

    /// Drops decoded thumbnails whose preview is no longer staged.
    fn prune_thumbnails(&mut self) {
        let staged = self
            .composer
            .attachments()
            .iter()
            .map(StagedAttachment::preview_url)
            .collect::<Vec<_>>();
        self.thumbnails.retain(|url, _| staged.contains(&url));
    }

    fn render_attachment(
        &self,
        index: usize,
        attachment: &StagedAttachment,
        cx: &Context<Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let file = attachment.file();
        let thumbnail = self.thumbnails.get(attachment.preview_url()).cloned();

        h_flex()
            .id(("attachment", index))
            .gap_2()
            .px_2()
            .py_1()
            .rounded_md()
            .border_1()
            .border_color(theme.border)
            .bg(theme.muted)
            .map(|chip| match thumbnail {
                Some(image) => chip.child(img(image).size(px(32.)).rounded_sm()),
                None => chip.child(
                    div()
                        .px_1()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child(attachment.kind().label()),
                ),
            })
            .child(
                v_flex()
                    .max_w(px(180.))
                    .overflow_hidden()
                    .child(div().text_sm().truncate().child(file.name().to_string()))
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(format_size(file.size())),
                    ),
            )
            .child(
                Button::new(("remove-attachment", index))
                    .ghost()
                    .xsmall()
                    .icon(IconName::CircleX)
                    .on_click(cx.listener(move |this, _, _window, cx| {
                        this.remove_attachment(index, cx);
                    })),
            )
            .into_any_element()
    }
}

fn push_notice(notice: &Notice, window: &mut Window, cx: &mut App) {
    let notification = match notice.level() {
        NoticeLevel::Warning => Notification::warning(notice.message()),
        NoticeLevel::Error => Notification::error(notice.message()),
    };
    window.push_notification(notification, cx);
}

impl Render for ComposerView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let submitting = self.composer.is_submitting();
        let can_submit = self.composer.can_submit();
        let attachments = self
            .composer
            .attachments()
            .iter()
            .enumerate()
            .map(|(index, attachment)| self.render_attachment(index, attachment, cx))
            .collect::<Vec<_>>();

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .when(!attachments.is_empty(), |el| {
                el.child(
                    h_flex()
                        .id("composer-attachments")
                        .flex_wrap()
                        .gap_2()
                        .children(attachments),
                )
            })
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        if event.keystroke.key == "enter" && event.keystroke.modifiers.shift {
                            this.handle_shift_enter(window, cx);
                        }
                    }))
                    .child(Input::new(&self.input_state).w_full()),
            )
            .child(
                h_flex()
                    .w_full()
                    .justify_between()
                    .child(
                        h_flex()
                            .gap_1()
                            .child(
                                Button::new("attach-files")
                                    .ghost()
                                    .small()
                                    .icon(IconName::Plus)
                                    .child("Attach")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.pick_files(AttachmentSource::Picker, window, cx);
                                    })),
                            )
                            .child(
                                Button::new("attach-camera")
                                    .ghost()
                                    .small()
                                    .child("Camera")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.pick_files(AttachmentSource::Camera, window, cx);
                                    })),
                            ),
                    )
                    .child(
                        Button::new("send")
                            .small()
                            .primary()
                            .icon(IconName::ArrowUp)
                            .child(if submitting { "Sending" } else { "Send" })
                            .disabled(!can_submit)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.handle_submit(window, cx);
                            })),
                    ),
            )
    }
}
