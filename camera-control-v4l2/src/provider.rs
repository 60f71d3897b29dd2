use std::path::{Path, PathBuf};

use async_trait::async_trait;

use camera_control_core::models::attributes::CameraPosition;
use camera_control_core::models::capabilities::DeviceInfo;
use camera_control_core::models::error::SetupError;
use camera_control_core::traits::device_provider::DeviceProvider;

use crate::device_enumerator::DeviceEnumerator;
use crate::permissions::check_device_access;
use crate::v4l2_device::V4l2CaptureDevice;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProviderEntry {
    position: CameraPosition,
    path: PathBuf,
    name: String,
}

/// Hands out V4L2 cameras by position.
///
/// Nodes are opened on tokio's blocking pool since the ioctls involved can
/// stall on slow USB devices.
#[derive(Debug, Clone)]
pub struct V4l2Provider {
    entries: Vec<ProviderEntry>,
    output_dir: PathBuf,
}

impl Default for V4l2Provider {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            output_dir: std::env::temp_dir(),
        }
    }
}

impl V4l2Provider {
    /// Provider over every capture node found on the system.
    pub fn discover() -> Self {
        let entries: Vec<ProviderEntry> = DeviceEnumerator::list_positioned()
            .into_iter()
            .map(|(position, node)| ProviderEntry {
                position,
                path: node.path,
                name: node.name,
            })
            .collect();
        log::info!("found {} V4L2 capture node(s)", entries.len());
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Serve `position` from the node at `path`, replacing any node already
    /// assigned to it.
    pub fn with_device(mut self, position: CameraPosition, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.entries.retain(|entry| entry.position != position);
        self.entries.push(ProviderEntry {
            position,
            name: path.display().to_string(),
            path,
        });
        self
    }

    /// Directory recordings are written to. Defaults to the system temp dir.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.output_dir
    }

    fn entry(&self, position: CameraPosition) -> Option<&ProviderEntry> {
        self.entries.iter().find(|entry| entry.position == position)
    }
}

#[async_trait]
impl DeviceProvider for V4l2Provider {
    type Device = V4l2CaptureDevice;

    fn available_devices(&self) -> Vec<DeviceInfo> {
        self.entries
            .iter()
            .map(|entry| DeviceInfo {
                id: entry.path.display().to_string(),
                name: entry.name.clone(),
                position: entry.position,
            })
            .collect()
    }

    async fn acquire(&self, position: CameraPosition) -> Result<V4l2CaptureDevice, SetupError> {
        let entry = self.entry(position).ok_or(SetupError::NoDevice(position))?;
        let path = entry.path.clone();
        let output_dir = self.output_dir.clone();

        tokio::task::spawn_blocking(move || {
            check_device_access(&path, position)?;
            V4l2CaptureDevice::open(&path, position, &output_dir)
        })
        .await
        .map_err(|e| {
            log::error!("opening {:?} camera panicked: {}", position, e);
            SetupError::NoDevice(position)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_devices_are_listed() {
        let provider = V4l2Provider::default()
            .with_device(CameraPosition::Front, "/dev/video0")
            .with_device(CameraPosition::Back, "/dev/video2");

        let devices = provider.available_devices();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "/dev/video0");
        assert_eq!(devices[1].position, CameraPosition::Back);
    }

    #[test]
    fn reassigning_a_position_replaces_the_node() {
        let provider = V4l2Provider::default()
            .with_device(CameraPosition::Back, "/dev/video0")
            .with_device(CameraPosition::Back, "/dev/video4");

        let devices = provider.available_devices();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, "/dev/video4");
    }

    #[test]
    fn output_dir_defaults_to_temp() {
        let provider = V4l2Provider::default();
        assert_eq!(provider.recordings_dir(), std::env::temp_dir());

        let provider = provider.output_dir("/var/tmp/captures");
        assert_eq!(provider.recordings_dir(), Path::new("/var/tmp/captures"));
    }

    #[tokio::test]
    async fn unassigned_position_has_no_device() {
        let provider = V4l2Provider::default().with_device(CameraPosition::Front, "/dev/video0");

        let result = provider.acquire(CameraPosition::Back).await;

        assert_eq!(result.err(), Some(SetupError::NoDevice(CameraPosition::Back)));
    }

    #[tokio::test]
    async fn missing_node_has_no_device() {
        let provider =
            V4l2Provider::default().with_device(CameraPosition::Back, "/nonexistent/video9");

        let result = provider.acquire(CameraPosition::Back).await;

        assert_eq!(result.err(), Some(SetupError::NoDevice(CameraPosition::Back)));
    }
}
