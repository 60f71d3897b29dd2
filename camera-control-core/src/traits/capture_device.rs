use std::time::Duration;

use crate::models::attributes::{ExposureMode, FlashMode, HdrMode, LightMode, Resolution};
use crate::models::capabilities::{CapabilityBounds, DeviceInfo};
use crate::models::error::{DeviceError, WriteError};
use crate::models::media::{RawImage, RecordedVideo};

/// Exposure values the device is currently running with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedExposure {
    pub duration: Duration,
    pub iso: f32,
}

/// Per-shot options for a still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSettings {
    /// Effective flash; always `Off` on devices without a flash.
    pub flash_mode: FlashMode,
    pub hdr_mode: HdrMode,
}

/// Options for a video recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSettings {
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub include_audio: bool,
}

/// Capability-set abstraction over a physical camera.
///
/// Implemented by:
/// - `V4l2CaptureDevice` (Linux, `camera-control-v4l2`)
/// - `MockDevice` (deterministic in-memory double)
///
/// Setters reject values outside [`CaptureDevice::bounds`] with a
/// `ValidationError`; they never clamp. Dropping the device releases it.
pub trait CaptureDevice: Send {
    /// Identity of the physical device.
    fn info(&self) -> DeviceInfo;

    /// Capability bounds of the active format. Queried on every call since
    /// they change with resolution.
    fn bounds(&self) -> CapabilityBounds;

    fn light_mode(&self) -> LightMode;

    fn hdr_mode(&self) -> HdrMode;

    /// Exposure currently in effect, whatever the exposure mode.
    fn observed_exposure(&self) -> ObservedExposure;

    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), WriteError>;

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), WriteError>;

    fn set_zoom_factor(&mut self, factor: f64) -> Result<(), WriteError>;

    fn set_light_mode(&mut self, mode: LightMode) -> Result<(), WriteError>;

    fn set_hdr_mode(&mut self, mode: HdrMode) -> Result<(), WriteError>;

    /// Switch to one of the automatic or locked modes.
    ///
    /// `ExposureMode::Custom` is rejected here; use `set_custom_exposure`.
    fn set_exposure_mode(&mut self, mode: ExposureMode) -> Result<(), WriteError>;

    /// Enter custom exposure with both parameters applied together.
    fn set_custom_exposure(&mut self, duration: Duration, iso: f32) -> Result<(), WriteError>;

    fn set_exposure_target_bias(&mut self, bias: f32) -> Result<(), WriteError>;

    /// Take a single still frame.
    fn capture_photo(&mut self, settings: &PhotoSettings) -> Result<RawImage, DeviceError>;

    fn start_recording(&mut self, settings: &RecordingSettings) -> Result<(), DeviceError>;

    /// Finish the recording started by `start_recording`.
    fn stop_recording(&mut self) -> Result<RecordedVideo, DeviceError>;
}
