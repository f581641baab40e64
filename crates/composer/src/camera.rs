use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snafu::ResultExt;

use crate::error::{AccessDeniedSnafu, CameraResult, UnavailableSnafu};
use crate::send::BoxFuture;

/// Camera capability as far as the composer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraSupport {
    #[default]
    Unknown,
    Supported,
    Unsupported,
}

impl CameraSupport {
    pub fn is_resolved(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Exclusive hold on the camera; dropping it releases the device.
pub struct CameraLease {
    _device: Box<dyn Any + Send>,
}

impl CameraLease {
    pub fn new(device: impl Any + Send) -> Self {
        Self {
            _device: Box::new(device),
        }
    }
}

impl fmt::Debug for CameraLease {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("CameraLease")
    }
}

pub trait CameraDevice: Send + Sync {
    fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>>;
}

/// One-shot capability probe handed out by the composer at construction.
pub struct CameraProbe {
    device: Arc<dyn CameraDevice>,
}

impl CameraProbe {
    pub(crate) fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self { device }
    }

    /// Acquires the device and releases it immediately.
    pub async fn run(self) -> CameraSupport {
        match self.device.acquire().await {
            Ok(lease) => {
                drop(lease);
                tracing::info!("camera probe succeeded");
                CameraSupport::Supported
            }
            Err(error) => {
                tracing::info!(error = %error, "camera probe failed; capture disabled");
                CameraSupport::Unsupported
            }
        }
    }
}

/// Host without any camera capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl CameraDevice for NoCamera {
    fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>> {
        Box::pin(async move { UnavailableSnafu { stage: "no-camera" }.fail::<CameraLease>() })
    }
}

/// V4L-style device node; opening it is the acquisition.
#[derive(Debug, Clone)]
pub struct DeviceNodeCamera {
    path: PathBuf,
}

impl DeviceNodeCamera {
    pub const DEFAULT_PATH: &'static str = "/dev/video0";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for DeviceNodeCamera {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATH)
    }
}

impl CameraDevice for DeviceNodeCamera {
    fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>> {
        Box::pin(open_device_node(&self.path))
    }
}

async fn open_device_node(path: &Path) -> CameraResult<CameraLease> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return UnavailableSnafu {
            stage: "camera-device-missing",
        }
        .fail();
    }

    let file = tokio::fs::File::open(path).await.context(AccessDeniedSnafu {
        stage: "camera-device-open",
    })?;
    Ok(CameraLease::new(file))
}

/// Camera device for the current platform.
pub fn platform_camera() -> Arc<dyn CameraDevice> {
    if cfg!(target_os = "linux") {
        Arc::new(DeviceNodeCamera::default())
    } else {
        Arc::new(NoCamera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRelease(Arc<AtomicUsize>);

    impl Drop for CountingRelease {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct WorkingCamera {
        released: Arc<AtomicUsize>,
    }

    impl CameraDevice for WorkingCamera {
        fn acquire<'a>(&'a self) -> BoxFuture<'a, CameraResult<CameraLease>> {
            let released = Arc::clone(&self.released);
            Box::pin(async move {
                Ok::<_, crate::error::CameraError>(CameraLease::new(CountingRelease(released)))
            })
        }
    }

    #[tokio::test]
    async fn probe_releases_the_device_it_acquired() {
        let released = Arc::new(AtomicUsize::new(0));
        let probe = CameraProbe::new(Arc::new(WorkingCamera {
            released: Arc::clone(&released),
        }));

        assert_eq!(probe.run().await, CameraSupport::Supported);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_without_camera_reports_unsupported() {
        let probe = CameraProbe::new(Arc::new(NoCamera));
        assert_eq!(probe.run().await, CameraSupport::Unsupported);
    }

    #[tokio::test]
    async fn missing_device_node_is_unavailable() {
        let camera = DeviceNodeCamera::new("/definitely/not/a/camera/node");
        let result = camera.acquire().await;
        assert!(matches!(
            result,
            Err(crate::error::CameraError::Unavailable { .. })
        ));
    }
}
