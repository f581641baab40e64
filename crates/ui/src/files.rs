use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use zova_composer::{AttachmentFile, MAX_ATTACHMENT_BYTES, guess_media_type};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadError {
    #[snafu(display("failed to read metadata for {path:?} on `{stage}`: {source}"))]
    ReadMetadata {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read {path:?} on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Files read from one picker selection, in selection order.
#[derive(Debug, Default)]
pub struct LoadedBatch {
    pub files: Vec<AttachmentFile>,
    pub failures: Vec<LoadError>,
}

/// Loads picked paths into attachment files.
///
/// Files over the attachment limit are not read; they keep their declared size
/// so validation can still report them.
pub async fn load_attachments(paths: Vec<PathBuf>) -> LoadedBatch {
    let mut batch = LoadedBatch::default();

    for path in paths {
        match load_attachment(&path).await {
            Ok(file) => batch.files.push(file),
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "skipping unreadable attachment");
                batch.failures.push(error);
            }
        }
    }

    batch
}

async fn load_attachment(path: &Path) -> Result<AttachmentFile, LoadError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = guess_media_type(&name);

    let metadata = tokio::fs::metadata(path).await.context(ReadMetadataSnafu {
        stage: "stat-attachment",
        path: path.to_path_buf(),
    })?;

    if metadata.len() > MAX_ATTACHMENT_BYTES {
        return Ok(AttachmentFile::declared(name, media_type, metadata.len()));
    }

    let bytes = tokio::fs::read(path).await.context(ReadFileSnafu {
        stage: "read-attachment",
        path: path.to_path_buf(),
    })?;

    Ok(AttachmentFile::new(name, media_type, bytes))
}
