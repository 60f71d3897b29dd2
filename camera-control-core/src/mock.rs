//! Deterministic in-memory device for testing without hardware.
//!
//! `MockProvider` hands out `MockDevice`s built from per-position
//! `MockSpec`s. Failures are injected and observed through `MockControls`,
//! which stays shared with every device the provider creates.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::attributes::{
    CameraPosition, ExposureMode, FlashMode, HdrMode, LightMode, Resolution,
};
use crate::models::capabilities::{Bounds, CapabilityBounds, DeviceInfo, Field};
use crate::models::error::{DeviceError, SetupError, ValidationError, WriteError};
use crate::models::media::{RawImage, RecordedVideo};
use crate::traits::capture_device::{
    CaptureDevice, ObservedExposure, PhotoSettings, RecordingSettings,
};
use crate::traits::device_provider::DeviceProvider;

/// Mock operations that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Acquire,
    Resolution,
    FrameRate,
    Zoom,
    Light,
    Hdr,
    ExposureMode,
    CustomExposure,
    TargetBias,
    CapturePhoto,
    StartRecording,
    StopRecording,
}

impl MockOperation {
    fn field(self) -> Option<Field> {
        match self {
            Self::Resolution => Some(Field::Resolution),
            Self::FrameRate => Some(Field::FrameRate),
            Self::Zoom => Some(Field::ZoomFactor),
            Self::Light => Some(Field::LightMode),
            Self::Hdr => Some(Field::HdrMode),
            Self::ExposureMode | Self::CustomExposure => Some(Field::ExposureMode),
            Self::TargetBias => Some(Field::ExposureTargetBias),
            Self::Acquire | Self::CapturePhoto | Self::StartRecording | Self::StopRecording => None,
        }
    }
}

/// Something that happened to a mock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Acquired(CameraPosition),
    Released(CameraPosition),
    Wrote(MockOperation),
}

#[derive(Debug, Default)]
struct MockState {
    failures: Vec<MockOperation>,
    events: Vec<MockEvent>,
    live_devices: usize,
    permission_denied: bool,
}

/// Shared handle for injecting failures into mock devices and reading
/// their event log.
#[derive(Debug, Clone, Default)]
pub struct MockControls {
    state: Arc<Mutex<MockState>>,
}

impl MockControls {
    /// Make the next `operation` fail with a device-level error.
    pub fn fail_next(&self, operation: MockOperation) {
        self.state.lock().failures.push(operation);
    }

    pub fn deny_permission(&self, denied: bool) {
        self.state.lock().permission_denied = denied;
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Devices acquired and not yet released. Unaffected by `clear_events`.
    pub fn live_devices(&self) -> usize {
        self.state.lock().live_devices
    }

    fn permission_denied(&self) -> bool {
        self.state.lock().permission_denied
    }

    fn take_failure(&self, operation: MockOperation) -> bool {
        let mut state = self.state.lock();
        match state.failures.iter().position(|op| *op == operation) {
            Some(index) => {
                state.failures.remove(index);
                true
            }
            None => false,
        }
    }

    fn record(&self, event: MockEvent) {
        let mut state = self.state.lock();
        match event {
            MockEvent::Acquired(_) => state.live_devices += 1,
            MockEvent::Released(_) => {
                state.live_devices = state.live_devices.saturating_sub(1)
            }
            MockEvent::Wrote(_) => {}
        }
        state.events.push(event);
    }
}

/// Static description of a mock camera.
#[derive(Debug, Clone)]
pub struct MockSpec {
    pub info: DeviceInfo,
    pub bounds: CapabilityBounds,
    /// Frame-rate envelope per format, overriding `bounds.frame_rate`.
    pub frame_rates: BTreeMap<Resolution, Bounds<u32>>,
    pub observed: ObservedExposure,
}

impl MockSpec {
    /// Rear camera: flash, torch, 10x zoom, every preset, 30 fps cap at 4K.
    pub fn back() -> Self {
        let mut frame_rates = BTreeMap::new();
        frame_rates.insert(Resolution::Uhd3840x2160, Bounds::new(1, 30));

        Self {
            info: DeviceInfo {
                id: "mock-back".into(),
                name: "Mock Back Camera".into(),
                position: CameraPosition::Back,
            },
            bounds: CapabilityBounds {
                exposure_duration: Bounds::new(Duration::from_micros(125), Duration::from_secs(1)),
                iso: Bounds::new(50.0, 3200.0),
                exposure_target_bias: Bounds::new(-8.0, 8.0),
                frame_rate: Bounds::new(1, 60),
                zoom: Bounds::new(1.0, 10.0),
                has_flash: true,
                has_torch: true,
                hdr_modes: vec![HdrMode::Auto, HdrMode::On, HdrMode::Off],
                exposure_modes: vec![
                    ExposureMode::Locked,
                    ExposureMode::AutoExpose,
                    ExposureMode::ContinuousAutoExposure,
                    ExposureMode::Custom,
                ],
                resolutions: Resolution::ALL.to_vec(),
            },
            frame_rates,
            observed: ObservedExposure {
                duration: Duration::from_micros(16_667),
                iso: 100.0,
            },
        }
    }

    /// Front camera: no flash or torch, 4x zoom, up to 1080p.
    pub fn front() -> Self {
        Self {
            info: DeviceInfo {
                id: "mock-front".into(),
                name: "Mock Front Camera".into(),
                position: CameraPosition::Front,
            },
            bounds: CapabilityBounds {
                exposure_duration: Bounds::new(
                    Duration::from_micros(250),
                    Duration::from_millis(500),
                ),
                iso: Bounds::new(34.0, 2176.0),
                exposure_target_bias: Bounds::new(-8.0, 8.0),
                frame_rate: Bounds::new(1, 60),
                zoom: Bounds::new(1.0, 4.0),
                has_flash: false,
                has_torch: false,
                hdr_modes: vec![HdrMode::On, HdrMode::Off],
                exposure_modes: vec![
                    ExposureMode::Locked,
                    ExposureMode::AutoExpose,
                    ExposureMode::ContinuousAutoExposure,
                    ExposureMode::Custom,
                ],
                resolutions: vec![
                    Resolution::Vga640x480,
                    Resolution::Hd1280x720,
                    Resolution::Hd1920x1080,
                ],
            },
            frame_rates: BTreeMap::new(),
            observed: ObservedExposure {
                duration: Duration::from_micros(16_667),
                iso: 100.0,
            },
        }
    }

    pub fn with_frame_rate(mut self, resolution: Resolution, frame_rate: Bounds<u32>) -> Self {
        self.frame_rates.insert(resolution, frame_rate);
        self
    }
}

/// Mock capture device backed by a `MockSpec`.
pub struct MockDevice {
    spec: MockSpec,
    controls: MockControls,
    resolution: Resolution,
    frame_rate: u32,
    zoom_factor: f64,
    light_mode: LightMode,
    hdr_mode: HdrMode,
    exposure_mode: ExposureMode,
    exposure: ObservedExposure,
    target_bias: f32,
    recording: Option<RecordingSettings>,
    recordings: u64,
}

impl MockDevice {
    pub fn new(spec: MockSpec, controls: MockControls) -> Self {
        let resolution = spec
            .bounds
            .resolutions
            .first()
            .copied()
            .unwrap_or_default();
        let exposure = spec.observed;
        Self {
            spec,
            controls,
            resolution,
            frame_rate: 30,
            zoom_factor: 1.0,
            light_mode: LightMode::Off,
            hdr_mode: HdrMode::Off,
            exposure_mode: ExposureMode::ContinuousAutoExposure,
            exposure,
            target_bias: 0.0,
            recording: None,
            recordings: 0,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn zoom_factor(&self) -> f64 {
        self.zoom_factor
    }

    pub fn exposure_mode(&self) -> ExposureMode {
        self.exposure_mode
    }

    pub fn target_bias(&self) -> f32 {
        self.target_bias
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Fails with a device error if `operation` was armed, then logs the write.
    fn write(&self, operation: MockOperation) -> Result<(), WriteError> {
        if self.controls.take_failure(operation) {
            return Err(injected(operation).into());
        }
        self.controls.record(MockEvent::Wrote(operation));
        Ok(())
    }
}

fn injected(operation: MockOperation) -> DeviceError {
    match operation.field() {
        Some(field) => DeviceError::Rejected {
            field,
            reason: "injected failure".into(),
        },
        None => DeviceError::CaptureFailed("injected failure".into()),
    }
}

fn unsupported(field: Field, value: impl std::fmt::Debug) -> WriteError {
    ValidationError::Unsupported {
        field,
        value: format!("{value:?}"),
    }
    .into()
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.controls
            .record(MockEvent::Released(self.spec.info.position));
    }
}

impl CaptureDevice for MockDevice {
    fn info(&self) -> DeviceInfo {
        self.spec.info.clone()
    }

    fn bounds(&self) -> CapabilityBounds {
        let mut bounds = self.spec.bounds.clone();
        if let Some(frame_rate) = self.spec.frame_rates.get(&self.resolution) {
            bounds.frame_rate = *frame_rate;
        }
        bounds
    }

    fn light_mode(&self) -> LightMode {
        self.light_mode
    }

    fn hdr_mode(&self) -> HdrMode {
        self.hdr_mode
    }

    fn observed_exposure(&self) -> ObservedExposure {
        self.exposure
    }

    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), WriteError> {
        if !self.spec.bounds.supports_resolution(resolution) {
            return Err(unsupported(Field::Resolution, resolution));
        }
        self.write(MockOperation::Resolution)?;
        self.resolution = resolution;
        Ok(())
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), WriteError> {
        self.bounds().frame_rate.check(Field::FrameRate, fps)?;
        self.write(MockOperation::FrameRate)?;
        self.frame_rate = fps;
        Ok(())
    }

    fn set_zoom_factor(&mut self, factor: f64) -> Result<(), WriteError> {
        self.spec.bounds.zoom.check(Field::ZoomFactor, factor)?;
        self.write(MockOperation::Zoom)?;
        self.zoom_factor = factor;
        Ok(())
    }

    fn set_light_mode(&mut self, mode: LightMode) -> Result<(), WriteError> {
        if mode == LightMode::On && !self.spec.bounds.has_torch {
            return Err(unsupported(Field::LightMode, mode));
        }
        self.write(MockOperation::Light)?;
        self.light_mode = mode;
        Ok(())
    }

    fn set_hdr_mode(&mut self, mode: HdrMode) -> Result<(), WriteError> {
        if !self.spec.bounds.supports_hdr_mode(mode) {
            return Err(unsupported(Field::HdrMode, mode));
        }
        self.write(MockOperation::Hdr)?;
        self.hdr_mode = mode;
        Ok(())
    }

    fn set_exposure_mode(&mut self, mode: ExposureMode) -> Result<(), WriteError> {
        if mode == ExposureMode::Custom {
            return Err(ValidationError::InconsistentExposure(
                "custom exposure needs duration and ISO together".into(),
            )
            .into());
        }
        if !self.spec.bounds.supports_exposure_mode(mode) {
            return Err(unsupported(Field::ExposureMode, mode));
        }
        self.write(MockOperation::ExposureMode)?;
        self.exposure_mode = mode;
        Ok(())
    }

    fn set_custom_exposure(&mut self, duration: Duration, iso: f32) -> Result<(), WriteError> {
        if !self.spec.bounds.supports_exposure_mode(ExposureMode::Custom) {
            return Err(unsupported(Field::ExposureMode, ExposureMode::Custom));
        }
        self.spec
            .bounds
            .exposure_duration
            .check(Field::ExposureDuration, duration)?;
        self.spec.bounds.iso.check(Field::Iso, iso)?;
        self.write(MockOperation::CustomExposure)?;
        self.exposure_mode = ExposureMode::Custom;
        self.exposure = ObservedExposure { duration, iso };
        Ok(())
    }

    fn set_exposure_target_bias(&mut self, bias: f32) -> Result<(), WriteError> {
        self.spec
            .bounds
            .exposure_target_bias
            .check(Field::ExposureTargetBias, bias)?;
        self.write(MockOperation::TargetBias)?;
        self.target_bias = bias;
        Ok(())
    }

    fn capture_photo(&mut self, settings: &PhotoSettings) -> Result<RawImage, DeviceError> {
        if self.recording.is_some() {
            return Err(DeviceError::InsufficientResources(
                "recording in progress".into(),
            ));
        }
        if self.controls.take_failure(MockOperation::CapturePhoto) {
            return Err(injected(MockOperation::CapturePhoto));
        }
        self.controls
            .record(MockEvent::Wrote(MockOperation::CapturePhoto));

        // JPEG SOI, a flash marker byte, EOI
        let flash = u8::from(settings.flash_mode != FlashMode::Off);
        Ok(RawImage {
            width: self.resolution.width(),
            height: self.resolution.height(),
            pixel_format: "MJPG".into(),
            data: vec![0xFF, 0xD8, flash, 0xFF, 0xD9],
        })
    }

    fn start_recording(&mut self, settings: &RecordingSettings) -> Result<(), DeviceError> {
        if self.recording.is_some() {
            return Err(DeviceError::InsufficientResources(
                "already recording".into(),
            ));
        }
        if self.controls.take_failure(MockOperation::StartRecording) {
            return Err(injected(MockOperation::StartRecording));
        }
        self.controls
            .record(MockEvent::Wrote(MockOperation::StartRecording));
        self.recording = Some(*settings);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<RecordedVideo, DeviceError> {
        let settings = self
            .recording
            .take()
            .ok_or_else(|| DeviceError::CaptureFailed("no recording in progress".into()))?;
        if self.controls.take_failure(MockOperation::StopRecording) {
            return Err(injected(MockOperation::StopRecording));
        }
        self.controls
            .record(MockEvent::Wrote(MockOperation::StopRecording));

        // Every mock recording is one second long.
        self.recordings += 1;
        Ok(RecordedVideo {
            location: PathBuf::from(format!(
                "memory/{}-recording-{}.mjpeg",
                self.spec.info.id, self.recordings
            )),
            duration: Duration::from_secs(1),
            frame_count: u64::from(settings.frame_rate),
            has_audio: settings.include_audio,
        })
    }
}

/// Provider of mock devices, one per configured position.
pub struct MockProvider {
    specs: Vec<MockSpec>,
    controls: MockControls,
    latency: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Back and front mock cameras, no acquisition latency.
    pub fn new() -> Self {
        Self {
            specs: vec![MockSpec::back(), MockSpec::front()],
            controls: MockControls::default(),
            latency: Duration::ZERO,
        }
    }

    /// Replace the spec for the spec's position.
    pub fn with_spec(mut self, spec: MockSpec) -> Self {
        self.specs
            .retain(|s| s.info.position != spec.info.position);
        self.specs.push(spec);
        self
    }

    pub fn without(mut self, position: CameraPosition) -> Self {
        self.specs.retain(|s| s.info.position != position);
        self
    }

    /// Delay every acquisition, simulating a slow device open.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn controls(&self) -> MockControls {
        self.controls.clone()
    }
}

#[async_trait]
impl DeviceProvider for MockProvider {
    type Device = MockDevice;

    fn available_devices(&self) -> Vec<DeviceInfo> {
        self.specs.iter().map(|s| s.info.clone()).collect()
    }

    async fn acquire(&self, position: CameraPosition) -> Result<MockDevice, SetupError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.controls.permission_denied() {
            return Err(SetupError::PermissionDenied);
        }
        if self.controls.take_failure(MockOperation::Acquire) {
            return Err(SetupError::NoDevice(position));
        }
        let spec = self
            .specs
            .iter()
            .find(|s| s.info.position == position)
            .ok_or(SetupError::NoDevice(position))?;

        self.controls.record(MockEvent::Acquired(position));
        Ok(MockDevice::new(spec.clone(), self.controls.clone()))
    }
}
