use std::sync::Arc;

use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use zova_composer::{
    BoxFuture, MemoryPreviewStore, MessageSender, RunLike, SendError, SendRequest, SendResult,
    SessionSlot, platform_camera,
};
use zova_llm::RigRunSender;

use crate::chat::composer_view::{ComposerView, ComposerViewDeps};
use crate::chat::events::{RunCreated, SubmitBlocked};
use crate::chat::run_list::RunList;
use crate::settings::ComposerSettings;

/// Stand-in collaborator used when no provider could be built from settings.
struct UnconfiguredSender {
    reason: String,
}

impl MessageSender for UnconfiguredSender {
    fn send_message<'a>(&'a self, _request: SendRequest) -> BoxFuture<'a, SendResult<RunLike>> {
        Box::pin(async move {
            Err(SendError::Provider {
                stage: "unconfigured-provider",
                message: self.reason.clone(),
            })
        })
    }
}

/// Conversation pane: the run list above a composer.
pub struct ChatView {
    run_list: Entity<RunList>,
    composer: Entity<ComposerView>,
    session: Arc<SessionSlot>,
    provider_label: SharedString,
}

impl ChatView {
    pub fn new(settings: &ComposerSettings, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let run_list = cx.new(RunList::new);
        let session = Arc::new(SessionSlot::new(settings.session_token()));

        let deps = ComposerViewDeps {
            previews: Arc::new(MemoryPreviewStore::new()),
            sender: Self::build_sender(settings),
            session: session.clone(),
            camera: platform_camera(),
            conversation_id: settings.conversation_id(),
        };
        let composer = cx.new(|cx| ComposerView::new(deps, window, cx));

        cx.subscribe(&composer, |this, _, event: &RunCreated, cx| {
            this.append_run(event.run.clone(), cx);
        })
        .detach();

        cx.subscribe(&composer, |this, _, event: &SubmitBlocked, cx| {
            this.append_run(event.run.clone(), cx);
        })
        .detach();

        Self {
            run_list,
            composer,
            session,
            provider_label: format!("{} · {}", settings.provider_id, settings.model_name).into(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_signed_in()
    }

    pub fn provider_label(&self) -> SharedString {
        self.provider_label.clone()
    }

    fn build_sender(settings: &ComposerSettings) -> Arc<dyn MessageSender> {
        let Some(config) = settings.to_provider_config() else {
            tracing::info!("no API key configured; submits will be blocked");
            return Arc::new(UnconfiguredSender {
                reason: "no API key configured".to_string(),
            });
        };

        match RigRunSender::new(config) {
            Ok(sender) => {
                tracing::info!(
                    provider_id = %settings.provider_id,
                    model_id = %settings.model_name,
                    "initialized provider from settings"
                );
                Arc::new(sender)
            }
            Err(error) => {
                tracing::error!(error = %error, "failed to initialize provider");
                Arc::new(UnconfiguredSender {
                    reason: error.to_string(),
                })
            }
        }
    }

    fn append_run(&mut self, run: RunLike, cx: &mut Context<Self>) {
        self.run_list.update(cx, |run_list, cx| run_list.push(run, cx));
        cx.notify();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-run-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.run_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-composer")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.composer.clone()),
            )
    }
}
