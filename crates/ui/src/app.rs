use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{ActiveTheme, h_flex, v_flex};

use crate::chat::ChatView;
use crate::settings::ComposerSettings;

#[cfg(target_os = "macos")]
const TRAFFIC_LIGHT_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const TRAFFIC_LIGHT_PADDING: f32 = 16.0;

fn header_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

/// Header text for the session that decides whether submits go out or come back blocked.
fn session_status(signed_in: bool) -> &'static str {
    if signed_in {
        "Signed in"
    } else {
        "Signed out: messages will not be sent"
    }
}

gpui::actions!(shell, [Quit]);

/// Root view: session header, chat pane and the notification layer.
pub struct ZovaShell {
    notification_list: Entity<NotificationList>,
    chat_view: Entity<ChatView>,
}

impl ZovaShell {
    pub fn new(
        settings: &ComposerSettings,
        notification_list: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(settings, window, cx));

        Self {
            notification_list,
            chat_view,
        }
    }

    fn render_header(&self, height: Pixels, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let chat_view = self.chat_view.read(cx);
        let signed_in = chat_view.is_signed_in();
        let status_color = if signed_in {
            theme.muted_foreground
        } else {
            theme.danger
        };

        h_flex()
            .id("session-header")
            .window_control_area(WindowControlArea::Drag)
            .w_full()
            .h(height)
            .flex_shrink_0()
            .pl(px(TRAFFIC_LIGHT_PADDING))
            .pr_4()
            .gap_3()
            .items_center()
            .justify_end()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(
                div()
                    .id("session-status")
                    .text_xs()
                    .text_color(status_color)
                    .child(session_status(signed_in)),
            )
            .child(
                div()
                    .id("session-provider")
                    .px_2()
                    .py_1()
                    .rounded_full()
                    .bg(theme.muted)
                    .text_xs()
                    .text_color(theme.muted_foreground)
                    .child(chat_view.provider_label()),
            )
    }
}

impl Render for ZovaShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let height = header_height(window);

        v_flex()
            .size_full()
            .bg(cx.theme().background)
            .child(self.render_header(height, cx))
            .child(
                div()
                    .id("shell-body")
                    .flex_1()
                    .min_h_0()
                    .overflow_hidden()
                    .child(self.chat_view.clone()),
            )
            .child(self.notification_list.clone())
    }
}
