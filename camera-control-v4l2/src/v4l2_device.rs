//! `CaptureDevice` over a V4L2 video node.
//!
//! Formats and frame intervals are read with the `VIDIOC_ENUM_*` ioctls,
//! camera controls through `VIDIOC_G/S_CTRL`. Stills are grabbed from a
//! short-lived mmap stream; recordings run on a [`FrameRecorder`] thread.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::control::{self, Control, Value};
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use camera_control_core::models::attributes::{
    CameraPosition, ExposureMode, HdrMode, LightMode, Resolution,
};
use camera_control_core::models::capabilities::{Bounds, CapabilityBounds, DeviceInfo, Field};
use camera_control_core::models::error::{DeviceError, SetupError, ValidationError, WriteError};
use camera_control_core::models::media::{RawImage, RecordedVideo};
use camera_control_core::traits::capture_device::{
    CaptureDevice, ObservedExposure, PhotoSettings, RecordingSettings,
};

use crate::controls::*;
use crate::permissions::access_error;
use crate::recorder::{stalled, FrameRecorder, FRAME_TIMEOUT};

/// Pixel formats tried in order when opening a device.
const PREFERRED_FORMATS: [&[u8; 4]; 2] = [b"MJPG", b"YUYV"];
const PHOTO_BUFFERS: u32 = 2;
/// Frames dropped before a still so auto exposure can settle.
const WARMUP_FRAMES: usize = 3;
const DEFAULT_FRAME_RATE: u32 = 30;
const ENODEV: i32 = 19;

/// A camera opened through its `/dev/video*` node.
pub struct V4l2CaptureDevice {
    info: DeviceInfo,
    device: Arc<Device>,
    controls: ControlTable,
    fourcc: FourCC,
    resolution: Resolution,
    resolutions: Vec<Resolution>,
    frame_rate: u32,
    frame_rate_bounds: Bounds<u32>,
    light_mode: LightMode,
    hdr_mode: HdrMode,
    exposure_mode: ExposureMode,
    output_dir: PathBuf,
    recorder: Option<FrameRecorder>,
}

impl V4l2CaptureDevice {
    /// Open the node at `path` as the camera for `position`. Recordings are
    /// written to `output_dir`.
    pub fn open(
        path: &Path,
        position: CameraPosition,
        output_dir: &Path,
    ) -> Result<Self, SetupError> {
        let device = Device::with_path(path).map_err(|e| {
            log::warn!("cannot open {}: {}", path.display(), e);
            access_error(&e, position)
        })?;
        let caps = device
            .query_caps()
            .map_err(|_| SetupError::NoDevice(position))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            log::warn!("{} cannot capture video", path.display());
            return Err(SetupError::NoDevice(position));
        }

        let format = device.format().map_err(|e| {
            SetupError::ConfigurationRejected(rejected(Field::Resolution)(e))
        })?;
        let fourcc = preferred_fourcc(&device).unwrap_or(format.fourcc);
        let resolution = Resolution::from_size(format.width, format.height).unwrap_or_default();
        let resolutions = supported_resolutions(&device, fourcc);
        let frame_rate = device
            .params()
            .ok()
            .and_then(|params| {
                fps_from_interval(params.interval.numerator, params.interval.denominator)
            })
            .unwrap_or(DEFAULT_FRAME_RATE);
        let frame_rate_bounds = query_frame_rate_bounds(&device, fourcc, resolution)
            .unwrap_or_else(|| Bounds::fixed(frame_rate));
        let controls = control_table(&device);

        log::info!(
            "opened {} ({}) as {:?} camera: {} controls, resolutions {:?}",
            caps.card,
            path.display(),
            position,
            controls.len(),
            resolutions
        );

        Ok(Self {
            info: DeviceInfo {
                id: path.display().to_string(),
                name: caps.card,
                position,
            },
            device: Arc::new(device),
            controls,
            fourcc,
            resolution,
            resolutions,
            frame_rate,
            frame_rate_bounds,
            light_mode: LightMode::Off,
            hdr_mode: HdrMode::Off,
            exposure_mode: ExposureMode::ContinuousAutoExposure,
            output_dir: output_dir.to_path_buf(),
            recorder: None,
        })
    }

    fn read(&self, id: u32) -> Option<i64> {
        match self.device.control(id) {
            Ok(Control {
                value: Value::Integer(value),
                ..
            }) => Some(value),
            Ok(Control {
                value: Value::Boolean(value),
                ..
            }) => Some(i64::from(value)),
            Ok(_) => None,
            Err(e) => {
                log::debug!("reading control {:#x} failed: {}", id, e);
                None
            }
        }
    }

    fn write(&self, field: Field, id: u32, value: i64) -> Result<(), DeviceError> {
        let value = match self.controls.get(id) {
            Some(spec) if spec.boolean => Value::Boolean(value != 0),
            _ => Value::Integer(value),
        };
        self.device
            .set_control(Control { id, value })
            .map_err(rejected(field))
    }

    /// Write `value` if the device has the control; a missing control is
    /// a no-op.
    fn write_if_present(&self, field: Field, id: u32, value: i64) -> Result<(), DeviceError> {
        if self.controls.contains(id) {
            self.write(field, id, value)
        } else {
            Ok(())
        }
    }

    fn ensure_idle(&self, operation: &str) -> Result<(), DeviceError> {
        if self.recorder.is_some() {
            return Err(DeviceError::InsufficientResources(format!(
                "cannot {} while recording",
                operation
            )));
        }
        Ok(())
    }
}

impl CaptureDevice for V4l2CaptureDevice {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn bounds(&self) -> CapabilityBounds {
        CapabilityBounds {
            exposure_duration: self.controls.exposure_bounds(),
            iso: self.controls.iso_bounds(),
            exposure_target_bias: self.controls.bias_bounds(),
            frame_rate: self.frame_rate_bounds,
            zoom: self.controls.zoom_bounds(),
            has_flash: false,
            has_torch: self.controls.has_torch(),
            hdr_modes: self.controls.hdr_modes(),
            exposure_modes: self.controls.exposure_modes(),
            resolutions: self.resolutions.clone(),
        }
    }

    fn light_mode(&self) -> LightMode {
        self.light_mode
    }

    fn hdr_mode(&self) -> HdrMode {
        self.hdr_mode
    }

    fn observed_exposure(&self) -> ObservedExposure {
        let duration = self
            .read(CID_EXPOSURE_ABSOLUTE)
            .map(exposure_duration)
            .unwrap_or_else(|| self.controls.exposure_bounds().min);
        let iso = self
            .controls
            .iso_control()
            .and_then(|id| self.read(id))
            .map(|raw| raw as f32)
            .unwrap_or_else(|| self.controls.iso_bounds().min);
        ObservedExposure { duration, iso }
    }

    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), WriteError> {
        if !self.resolutions.contains(&resolution) {
            return Err(unsupported(Field::Resolution, resolution));
        }
        self.ensure_idle("change resolution")?;

        let mut format = self.device.format().map_err(rejected(Field::Resolution))?;
        format.width = resolution.width();
        format.height = resolution.height();
        format.fourcc = self.fourcc;
        let applied = self
            .device
            .set_format(&format)
            .map_err(rejected(Field::Resolution))?;
        if applied.width != resolution.width() || applied.height != resolution.height() {
            return Err(DeviceError::Rejected {
                field: Field::Resolution,
                reason: format!("driver chose {}x{}", applied.width, applied.height),
            }
            .into());
        }

        self.fourcc = applied.fourcc;
        self.resolution = resolution;
        self.frame_rate_bounds = query_frame_rate_bounds(&self.device, self.fourcc, resolution)
            .unwrap_or_else(|| Bounds::fixed(self.frame_rate));
        log::debug!(
            "{} format {:?}, frame rates {:?}",
            self.info.id,
            resolution,
            self.frame_rate_bounds
        );
        Ok(())
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), WriteError> {
        self.frame_rate_bounds.check(Field::FrameRate, fps)?;
        self.device
            .set_params(&Parameters::with_fps(fps))
            .map_err(rejected(Field::FrameRate))?;
        self.frame_rate = fps;
        Ok(())
    }

    fn set_zoom_factor(&mut self, factor: f64) -> Result<(), WriteError> {
        self.controls.zoom_bounds().check(Field::ZoomFactor, factor)?;
        if let Some(spec) = self.controls.get(CID_ZOOM_ABSOLUTE) {
            let raw = zoom_raw(factor, spec.range);
            self.write(Field::ZoomFactor, CID_ZOOM_ABSOLUTE, raw)?;
        }
        Ok(())
    }

    fn set_light_mode(&mut self, mode: LightMode) -> Result<(), WriteError> {
        if mode == LightMode::On && !self.controls.has_torch() {
            return Err(unsupported(Field::LightMode, mode));
        }
        let raw = match mode {
            LightMode::On => FLASH_LED_MODE_TORCH,
            LightMode::Off => FLASH_LED_MODE_NONE,
        };
        self.write_if_present(Field::LightMode, CID_FLASH_LED_MODE, raw)?;
        self.light_mode = mode;
        Ok(())
    }

    fn set_hdr_mode(&mut self, mode: HdrMode) -> Result<(), WriteError> {
        if !self.controls.hdr_modes().contains(&mode) {
            return Err(unsupported(Field::HdrMode, mode));
        }
        let raw = i64::from(mode == HdrMode::On);
        self.write_if_present(Field::HdrMode, CID_WIDE_DYNAMIC_RANGE, raw)?;
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
        if !self.controls.exposure_modes().contains(&mode) {
            return Err(unsupported(Field::ExposureMode, mode));
        }

        if let Some(auto) = self.controls.continuous_auto_value() {
            self.write(Field::ExposureMode, CID_EXPOSURE_AUTO, auto)?;
        }
        let lock = match mode {
            ExposureMode::Locked => LOCK_EXPOSURE,
            _ => 0,
        };
        self.write_if_present(Field::ExposureMode, CID_3A_LOCK, lock)?;
        self.exposure_mode = mode;
        Ok(())
    }

    fn set_custom_exposure(&mut self, duration: Duration, iso: f32) -> Result<(), WriteError> {
        if !self.controls.exposure_modes().contains(&ExposureMode::Custom) {
            return Err(unsupported(Field::ExposureMode, ExposureMode::Custom));
        }
        self.controls
            .exposure_bounds()
            .check(Field::ExposureDuration, duration)?;
        self.controls.iso_bounds().check(Field::Iso, iso)?;

        self.write_if_present(Field::ExposureMode, CID_3A_LOCK, 0)?;
        self.write(Field::ExposureMode, CID_EXPOSURE_AUTO, EXPOSURE_MANUAL)?;
        self.write(
            Field::ExposureDuration,
            CID_EXPOSURE_ABSOLUTE,
            exposure_raw(duration),
        )?;
        if let Some(id) = self.controls.iso_control() {
            self.write(Field::Iso, id, iso_raw(iso))?;
        }
        self.exposure_mode = ExposureMode::Custom;
        Ok(())
    }

    fn set_exposure_target_bias(&mut self, bias: f32) -> Result<(), WriteError> {
        self.controls
            .bias_bounds()
            .check(Field::ExposureTargetBias, bias)?;
        self.write_if_present(Field::ExposureTargetBias, CID_AUTO_EXPOSURE_BIAS, bias_raw(bias))?;
        Ok(())
    }

    fn capture_photo(&mut self, settings: &PhotoSettings) -> Result<RawImage, DeviceError> {
        self.ensure_idle("take a photo")?;
        log::debug!("capturing still from {} with {:?}", self.info.id, settings);

        let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, PHOTO_BUFFERS)
            .map_err(capture_failed)?;
        stream.set_timeout(FRAME_TIMEOUT);
        for _ in 0..WARMUP_FRAMES {
            stream.next().map_err(capture_failed)?;
        }
        let (buf, meta) = stream.next().map_err(capture_failed)?;
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };

        Ok(RawImage {
            width: self.resolution.width(),
            height: self.resolution.height(),
            pixel_format: String::from_utf8_lossy(&self.fourcc.repr).into_owned(),
            data: buf[..used].to_vec(),
        })
    }

    fn start_recording(&mut self, settings: &RecordingSettings) -> Result<(), DeviceError> {
        self.ensure_idle("start a recording")?;
        if settings.include_audio {
            log::debug!("{} has no audio input, recording video only", self.info.id);
        }
        let recorder =
            FrameRecorder::start(Arc::clone(&self.device), &self.output_dir, self.fourcc)?;
        self.recorder = Some(recorder);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<RecordedVideo, DeviceError> {
        let recorder = self
            .recorder
            .take()
            .ok_or_else(|| DeviceError::CaptureFailed("no recording in progress".into()))?;
        recorder.stop()
    }
}

impl Drop for V4l2CaptureDevice {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            log::warn!(
                "{} released while recording to {}",
                self.info.id,
                recorder.location().display()
            );
            let _ = recorder.stop();
        }
        log::debug!("released {}", self.info.id);
    }
}

fn unsupported(field: Field, value: impl Debug) -> WriteError {
    ValidationError::Unsupported {
        field,
        value: format!("{value:?}"),
    }
    .into()
}

fn rejected(field: Field) -> impl Fn(io::Error) -> DeviceError {
    move |e| match e.raw_os_error() {
        Some(ENODEV) => DeviceError::Disconnected,
        _ => DeviceError::Rejected {
            field,
            reason: e.to_string(),
        },
    }
}

fn capture_failed(e: io::Error) -> DeviceError {
    match (e.raw_os_error(), e.kind()) {
        (Some(ENODEV), _) => DeviceError::Disconnected,
        (_, io::ErrorKind::TimedOut) => DeviceError::CaptureFailed(stalled().to_string()),
        _ => DeviceError::CaptureFailed(e.to_string()),
    }
}

fn preferred_fourcc(device: &Device) -> Option<FourCC> {
    let formats = device.enum_formats().ok()?;
    PREFERRED_FORMATS
        .into_iter()
        .map(FourCC::new)
        .find(|fourcc| formats.iter().any(|desc| desc.fourcc == *fourcc))
        .or_else(|| formats.first().map(|desc| desc.fourcc))
}

/// Presets the device can produce in `fourcc`.
fn supported_resolutions(device: &Device, fourcc: FourCC) -> Vec<Resolution> {
    let sizes = match device.enum_framesizes(fourcc) {
        Ok(sizes) => sizes,
        Err(e) => {
            log::warn!("cannot enumerate frame sizes: {}", e);
            return Vec::new();
        }
    };

    Resolution::ALL
        .into_iter()
        .filter(|resolution| {
            let (width, height) = (resolution.width(), resolution.height());
            sizes.iter().any(|size| match &size.size {
                FrameSizeEnum::Discrete(discrete) => {
                    discrete.width == width && discrete.height == height
                }
                FrameSizeEnum::Stepwise(step) => {
                    (step.min_width..=step.max_width).contains(&width)
                        && (step.min_height..=step.max_height).contains(&height)
                }
            })
        })
        .collect()
}

fn query_frame_rate_bounds(
    device: &Device,
    fourcc: FourCC,
    resolution: Resolution,
) -> Option<Bounds<u32>> {
    let intervals = device
        .enum_frameintervals(fourcc, resolution.width(), resolution.height())
        .ok()?;
    let fractions = intervals
        .into_iter()
        .flat_map(|interval| match interval.interval {
            FrameIntervalEnum::Discrete(fraction) => {
                vec![(fraction.numerator, fraction.denominator)]
            }
            FrameIntervalEnum::Stepwise(step) => vec![
                (step.min.numerator, step.min.denominator),
                (step.max.numerator, step.max.denominator),
            ],
        });
    frame_rate_bounds(fractions)
}

fn control_table(device: &Device) -> ControlTable {
    let mut table = ControlTable::new();
    let descriptions = match device.query_controls() {
        Ok(descriptions) => descriptions,
        Err(e) => {
            log::warn!("cannot query controls: {}", e);
            return table;
        }
    };

    for desc in descriptions {
        let spec = match desc.typ {
            control::Type::Boolean => ControlSpec::boolean(),
            control::Type::Menu | control::Type::IntegerMenu => ControlSpec::menu(
                desc.items
                    .iter()
                    .flatten()
                    .map(|(index, _)| i64::from(*index)),
            ),
            _ => ControlSpec::integer(desc.minimum, desc.maximum),
        };
        table.insert(desc.id, spec);
    }
    table
}
