use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, v_flex};
use zova_composer::{ArtifactData, RunLike, RunStatus, TextPayload};

/// Runs produced by this window's composer, oldest first.
pub struct RunList {
    runs: Vec<RunLike>,
    scroll_handle: ScrollHandle,
}

impl RunList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            runs: Vec::new(),
            scroll_handle: ScrollHandle::new(),
        }
    }

    pub fn push(&mut self, run: RunLike, cx: &mut Context<Self>) {
        tracing::debug!(run_id = %run.id, status = run.status.label(), "run appended");
        self.runs.push(run);
        self.scroll_handle.scroll_to_bottom();
        cx.notify();
    }

    fn render_run(&self, index: usize, run: &RunLike, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let status_color = match run.status {
            RunStatus::Blocked | RunStatus::Failed => theme.danger,
            RunStatus::Pending | RunStatus::Running => theme.muted_foreground,
            RunStatus::Completed => theme.primary,
        };
        let sent_files = run
            .files
            .iter()
            .map(|sent| sent.file.name().to_string())
            .collect::<Vec<_>>();
        let body = artifact_text(run);

        v_flex()
            .id(("run", index))
            .w_full()
            .gap_2()
            .p_3()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .child(
                h_flex()
                    .justify_between()
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.foreground)
                            .child(run.user_input.clone()),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(status_color)
                            .child(run.status.label()),
                    ),
            )
            .when(!sent_files.is_empty(), |el| {
                el.child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child(format!("Attached: {}", sent_files.join(", "))),
                )
            })
            .when_some(body, |el, body| {
                el.child(div().text_sm().text_color(theme.foreground).child(body))
            })
            .when(run.is_blocked(), |el| {
                el.child(
                    div()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child("Not sent. Add an API key to your settings to sign in."),
                )
            })
            .when_some(run.error.clone(), |el, error| {
                el.child(div().text_xs().text_color(theme.danger).child(error))
            })
            .into_any_element()
    }
}

/// Text to show under a run: the final output, else its text artifacts joined.
fn artifact_text(run: &RunLike) -> Option<String> {
    if let Some(output) = run.final_output.as_ref().filter(|output| !output.is_empty()) {
        return Some(output.clone());
    }

    let texts = run
        .output_artifacts
        .iter()
        .filter_map(|artifact| match &artifact.data {
            ArtifactData::Text(TextPayload::Plain(text)) => Some(text.clone()),
            ArtifactData::Text(TextPayload::Structured(data)) => Some(data.content.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();

    (!texts.is_empty()).then(|| texts.join("\n\n"))
}

impl Render for RunList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let runs = self
            .runs
            .iter()
            .enumerate()
            .map(|(index, run)| self.render_run(index, run, cx))
            .collect::<Vec<_>>();

        v_flex()
            .id("run-list")
            .size_full()
            .gap_3()
            .p_4()
            .overflow_y_scroll()
            .track_scroll(&self.scroll_handle)
            .when(runs.is_empty(), |el| {
                el.items_center().justify_center().child(
                    div()
                        .text_sm()
                        .text_color(theme.muted_foreground)
                        .child("Send a message to start a run."),
                )
            })
            .children(runs)
    }
}
