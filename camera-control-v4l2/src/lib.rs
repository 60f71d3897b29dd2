//! # camera-control-v4l2
//!
//! Linux V4L2 backend for camera-control.
//!
//! Provides:
//! - `V4l2Provider`: `DeviceProvider` over `/dev/video*` capture nodes
//! - `V4l2CaptureDevice`: `CaptureDevice` driving formats and camera controls
//! - `FrameRecorder`: background thread streaming frames to a file
//! - `DeviceEnumerator`: capture node discovery
//! - `controls`: control IDs and raw-value conversions
//! - `permissions`: device node access check
//!
//! ## Platform Requirements
//! - Linux with V4L2 (`videodev2`) drivers
//! - Read/write access to the video nodes, usually via the `video` group
//!
//! ## Usage
//! ```ignore
//! use camera_control_core::{CameraConfiguration, CameraHandle, CameraSession};
//! use camera_control_v4l2::V4l2Provider;
//!
//! let provider = V4l2Provider::discover().output_dir("/var/tmp/captures");
//! let session = CameraSession::new(provider, CameraConfiguration::default())?;
//! let (camera, _task) = CameraHandle::spawn(session);
//! camera.setup().await?;
//! camera.start().await?;
//! ```

pub mod controls;
pub mod permissions;

#[cfg(target_os = "linux")]
pub mod device_enumerator;
#[cfg(target_os = "linux")]
pub mod provider;
#[cfg(target_os = "linux")]
pub mod recorder;
#[cfg(target_os = "linux")]
pub mod v4l2_device;

#[cfg(target_os = "linux")]
pub use device_enumerator::{CaptureNode, DeviceEnumerator};
#[cfg(target_os = "linux")]
pub use provider::V4l2Provider;
#[cfg(target_os = "linux")]
pub use recorder::FrameRecorder;
#[cfg(target_os = "linux")]
pub use v4l2_device::V4l2CaptureDevice;
