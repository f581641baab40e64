use std::time::Duration;

use snafu::Snafu;

/// Failure of the send collaborator. The draft is kept when one comes back.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SendError {
    #[snafu(display("transport failed on `{stage}`: {message}"))]
    Transport {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("provider failed on `{stage}`: {message}"))]
    Provider {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("send timed out after {timeout:?} on `{stage}`"))]
    TimedOut {
        stage: &'static str,
        timeout: Duration,
    },
}

pub type SendResult<T> = Result<T, SendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CameraError {
    #[snafu(display("no camera is available on `{stage}`"))]
    Unavailable { stage: &'static str },
    #[snafu(display("camera access was denied on `{stage}`: {source}"))]
    AccessDenied {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type CameraResult<T> = Result<T, CameraError>;
