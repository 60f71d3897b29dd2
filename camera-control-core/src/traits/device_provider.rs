use async_trait::async_trait;

use crate::models::attributes::CameraPosition;
use crate::models::capabilities::DeviceInfo;
use crate::models::error::SetupError;
use crate::traits::capture_device::CaptureDevice;

/// Source of physical devices, one per camera position.
///
/// Implemented by:
/// - `V4l2Provider` (Linux)
/// - `MockProvider`
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    type Device: CaptureDevice;

    /// Devices that could currently be acquired.
    fn available_devices(&self) -> Vec<DeviceInfo>;

    /// Acquire the device for `position`. May suspend while permission is
    /// requested or the device is opened.
    async fn acquire(&self, position: CameraPosition) -> Result<Self::Device, SetupError>;
}
