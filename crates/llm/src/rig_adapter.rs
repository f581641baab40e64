use chrono::{DateTime, Utc};
use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use zova_composer::{
    BoxFuture, InputFile, MessageSender, OutputArtifact, RunId, RunLike, RunStatus, SendError,
    SendRequest, SendResult, SentFile,
};

use crate::prompt::build_prompt;
use crate::provider::{
    CompletionsFailedSnafu, HttpClientSnafu, MissingApiKeySnafu, OPENAI_PROVIDER_ID,
    ProviderConfig, ProviderError, ProviderResult, UnsupportedProviderSnafu,
};

/// Sends one composed message as a single OpenAI completion and reports the
/// reply as a completed run.
pub struct RigRunSender {
    config: ProviderConfig,
}

impl RigRunSender {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            config.provider_id == OPENAI_PROVIDER_ID,
            UnsupportedProviderSnafu {
                stage: "rig-sender-new",
                provider_id: config.provider_id.clone(),
            }
        );
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-sender-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    async fn complete(config: &ProviderConfig, prompt: String) -> ProviderResult<String> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(config.model_id.clone());

        let mut builder = model.completion_request(RigMessage::user(prompt));
        if let Some(preamble) = &config.preamble {
            builder = builder.preamble(preamble.clone());
        }
        if let Some(max_tokens) = config.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let mut stream = builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })?;

        let mut output = String::new();
        while let Some(item) = stream.next().await {
            let item = item.context(CompletionsFailedSnafu {
                stage: "stream-chunk",
            })?;
            // Reasoning and tool-call chunks are not part of the final answer.
            if let StreamedAssistantContent::Text(text) = item {
                output.push_str(&text.text);
            }
        }

        Ok(output)
    }

    async fn send(&self, request: SendRequest) -> SendResult<RunLike> {
        let started_at = Utc::now();
        let prompt = build_prompt(&request);
        let timeout = self.config.request_timeout;

        tracing::debug!(
            provider_id = %self.config.provider_id,
            model_id = %self.config.model_id,
            conversation_id = ?request.conversation_id,
            files = request.files.len(),
            prompt_chars = prompt.len(),
            "sending composed message"
        );

        let output = match tokio::time::timeout(timeout, Self::complete(&self.config, prompt)).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                tracing::error!(
                    provider_id = %self.config.provider_id,
                    model_id = %self.config.model_id,
                    error = %error,
                    "provider completion failed"
                );
                return Err(provider_failure(error));
            }
            Err(_) => {
                return Err(SendError::TimedOut {
                    stage: "rig-send",
                    timeout,
                });
            }
        };

        if output.trim().is_empty() {
            tracing::warn!(
                provider_id = %self.config.provider_id,
                model_id = %self.config.model_id,
                "provider returned no text"
            );
        }

        Ok(completed_run(request, output, started_at))
    }
}

impl MessageSender for RigRunSender {
    fn send_message<'a>(&'a self, request: SendRequest) -> BoxFuture<'a, SendResult<RunLike>> {
        Box::pin(self.send(request))
    }
}

fn provider_failure(error: ProviderError) -> SendError {
    SendError::Provider {
        stage: "rig-send",
        message: error.to_string(),
    }
}

const EMPTY_REPLY: &str = "the model returned an empty reply";

/// Assembles the run for a finished completion.
///
/// Input file records are numbered from 1 in staging order and point at the
/// preview each file was shown under. A reply with no text is recorded as a
/// failed run carrying an error.
pub fn completed_run(
    request: SendRequest,
    output: String,
    started_at: DateTime<Utc>,
) -> RunLike {
    let SendRequest {
        user_input,
        file_previews,
        ..
    } = request;

    let files = file_previews
        .unwrap_or_default()
        .into_iter()
        .map(SentFile::from)
        .collect::<Vec<_>>();

    let input_files = files
        .iter()
        .zip(1u64..)
        .map(|(sent, id)| InputFile {
            id,
            run: 0,
            file: sent.preview_url.to_string(),
            file_type: sent.file.kind(),
            description: Some(sent.file.name().to_string()),
        })
        .collect();

    let (status, output_artifacts, final_output, error) = if output.trim().is_empty() {
        (RunStatus::Failed, Vec::new(), None, Some(EMPTY_REPLY.to_string()))
    } else {
        (
            RunStatus::Completed,
            vec![OutputArtifact::text(output.clone())],
            Some(output),
            None,
        )
    };

    RunLike {
        id: RunId::local(),
        user_input,
        status,
        final_output,
        input_files,
        output_artifacts,
        started_at,
        completed_at: Some(Utc::now()),
        error,
        files,
    }
}
