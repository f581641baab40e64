use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::{AttachmentFile, AttachmentKind};
use crate::preview::PreviewUrl;

/// Backends number their runs; locally synthesized runs use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunId {
    Number(u64),
    Text(String),
}

impl RunId {
    /// Fresh identifier for a run that never reached a backend.
    pub fn local() -> Self {
        Self::Text(format!("local-{}", Uuid::now_v7()))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(raw) => write!(formatter, "{raw}"),
            Self::Text(raw) => formatter.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Never sent: the composer had no authenticated session.
    Blocked,
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Server-side record of one uploaded input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub id: u64,
    pub run: u64,
    pub file: String,
    pub file_type: AttachmentKind,
    #[serde(default)]
    pub description: Option<String>,
}

/// A file that went out with a run, with the preview it was shown under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFile {
    pub file: AttachmentFile,
    pub preview_url: PreviewUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Text artifacts arrive either as a bare string or as a structured body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextPayload {
    Plain(String),
    Structured(TextData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub x: Vec<Cell>,
    pub y: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfReportData {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// Artifact body keyed by its `artifact_type` tag.
///
/// Progress, link and list payloads are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifact_type", content = "data", rename_all = "snake_case")]
pub enum ArtifactData {
    Text(TextPayload),
    Chart(ChartData),
    Table(TableData),
    PdfReport(PdfReportData),
    Progress(serde_json::Value),
    Link(serde_json::Value),
    List(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub data: ArtifactData,
}

impl OutputArtifact {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: None,
            data: ArtifactData::Text(TextPayload::Plain(content.into())),
        }
    }
}

/// One user submission and whatever the backend has produced for it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLike {
    pub id: RunId,
    pub user_input: String,
    pub status: RunStatus,
    #[serde(default)]
    pub final_output: Option<String>,
    #[serde(default)]
    pub input_files: Vec<InputFile>,
    #[serde(default)]
    pub output_artifacts: Vec<OutputArtifact>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Local echo of what was sent; never part of the wire format.
    #[serde(skip)]
    pub files: Vec<SentFile>,
}

impl RunLike {
    /// Run synthesized for a submit attempted without a session.
    pub fn blocked(user_input: impl Into<String>) -> Self {
        Self {
            id: RunId::local(),
            user_input: user_input.into(),
            status: RunStatus::Blocked,
            final_output: None,
            input_files: Vec::new(),
            output_artifacts: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            files: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == RunStatus::Blocked
    }
}
