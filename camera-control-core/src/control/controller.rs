use std::fmt::Debug;
use std::time::Duration;

use crate::models::attributes::{
    AttributeSnapshot, CameraFilter, ExposureMode, FlashMode, HdrMode, LightMode, OutputType,
    Resolution,
};
use crate::models::capabilities::{CapabilityBounds, Field};
use crate::models::diagnostics::ControlDiagnostics;
use crate::models::error::{
    CameraError, ControlError, DeviceError, SetupError, ValidationError, WriteError,
};
use crate::traits::capture_device::CaptureDevice;

/// Validates configuration requests against the bound device and keeps the
/// attribute snapshot in step with it.
///
/// Validated setters reject out-of-range input and leave the snapshot
/// untouched; a device-level failure only records `error`. Snapshot-only
/// setters cannot fail.
pub struct DeviceController<D> {
    device: Option<D>,
    attributes: AttributeSnapshot,
    diagnostics: ControlDiagnostics,
}

impl<D: CaptureDevice> DeviceController<D> {
    pub fn new(attributes: AttributeSnapshot) -> Self {
        Self {
            device: None,
            attributes,
            diagnostics: ControlDiagnostics::default(),
        }
    }

    pub fn attributes(&self) -> &AttributeSnapshot {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut AttributeSnapshot {
        &mut self.attributes
    }

    pub fn diagnostics(&self) -> &ControlDiagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut ControlDiagnostics {
        &mut self.diagnostics
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub(crate) fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    pub fn is_bound(&self) -> bool {
        self.device.is_some()
    }

    /// Bounds of the bound device in its active format.
    pub fn bounds(&self) -> Option<CapabilityBounds> {
        self.device.as_ref().map(CaptureDevice::bounds)
    }

    /// Bind a freshly acquired device and push the configured attributes
    /// onto it, clamping values the device cannot honour.
    ///
    /// On failure the device is dropped and the snapshot is left untouched.
    pub fn bind(&mut self, mut device: D) -> Result<(), SetupError> {
        let info = device.info();
        let mut next = self.attributes.clone();
        next.camera_position = info.position;

        device
            .set_resolution(next.resolution)
            .map_err(|err| match err {
                WriteError::Validation(_) => SetupError::FormatUnsupported(next.resolution),
                WriteError::Device(err) => SetupError::ConfigurationRejected(err),
            })?;
        let clamped =
            reconcile(&mut device, &mut next).map_err(SetupError::ConfigurationRejected)?;

        log::info!(
            "bound {} ({}) at {:?}, {clamped} value(s) clamped",
            info.name,
            info.id,
            info.position
        );
        self.diagnostics.values_clamped += clamped;
        self.attributes = next;
        self.device = Some(device);
        Ok(())
    }

    /// Release the bound device. The caller drops it to tear it down.
    pub fn unbind(&mut self) -> Option<D> {
        self.device.take()
    }

    // --- Validated operations ---

    pub fn set_zoom_factor(&mut self, factor: f64) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        bounds
            .zoom
            .check(Field::ZoomFactor, factor)
            .map_err(|err| self.reject(err))?;
        self.apply(
            |device| device.set_zoom_factor(factor),
            |attrs| attrs.zoom_factor = factor,
        )
    }

    pub fn set_frame_rate(&mut self, fps: u32) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        bounds
            .frame_rate
            .check(Field::FrameRate, fps)
            .map_err(|err| self.reject(err))?;
        self.apply(
            |device| device.set_frame_rate(fps),
            |attrs| attrs.frame_rate = fps,
        )
    }

    pub fn set_light_mode(&mut self, mode: LightMode) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        if mode == LightMode::On && !bounds.has_torch {
            return Err(self.reject(unsupported(Field::LightMode, mode)));
        }
        self.apply(
            |device| device.set_light_mode(mode),
            |attrs| attrs.light_mode = mode,
        )
    }

    pub fn set_hdr_mode(&mut self, mode: HdrMode) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        if !bounds.supports_hdr_mode(mode) {
            return Err(self.reject(unsupported(Field::HdrMode, mode)));
        }
        self.apply(
            |device| device.set_hdr_mode(mode),
            |attrs| attrs.hdr_mode = mode,
        )
    }

    /// Enter custom exposure with `duration`, paired with the configured ISO
    /// or, if none was configured, the ISO the device is running at.
    pub fn set_exposure_duration(&mut self, duration: Duration) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        if !bounds.supports_exposure_mode(ExposureMode::Custom) {
            return Err(self.reject(unsupported(Field::ExposureMode, ExposureMode::Custom)));
        }
        bounds
            .exposure_duration
            .check(Field::ExposureDuration, duration)
            .map_err(|err| self.reject(err))?;

        let observed = self.require_device()?.observed_exposure();
        let iso = self
            .attributes
            .camera_exposure
            .iso
            .unwrap_or_else(|| bounds.iso.clamp(observed.iso));
        bounds
            .iso
            .check(Field::Iso, iso)
            .map_err(|err| self.reject(err))?;

        self.apply_custom_exposure(duration, iso)
    }

    /// Enter custom exposure with `iso`, paired with the configured duration
    /// or, if none was configured, the duration the device is running at.
    pub fn set_iso(&mut self, iso: f32) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        if !bounds.supports_exposure_mode(ExposureMode::Custom) {
            return Err(self.reject(unsupported(Field::ExposureMode, ExposureMode::Custom)));
        }
        bounds
            .iso
            .check(Field::Iso, iso)
            .map_err(|err| self.reject(err))?;

        let observed = self.require_device()?.observed_exposure();
        let duration = self
            .attributes
            .camera_exposure
            .duration
            .unwrap_or_else(|| bounds.exposure_duration.clamp(observed.duration));
        bounds
            .exposure_duration
            .check(Field::ExposureDuration, duration)
            .map_err(|err| self.reject(err))?;

        self.apply_custom_exposure(duration, iso)
    }

    pub fn set_exposure_target_bias(&mut self, bias: f32) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        bounds
            .exposure_target_bias
            .check(Field::ExposureTargetBias, bias)
            .map_err(|err| self.reject(err))?;
        self.apply(
            |device| device.set_exposure_target_bias(bias),
            |attrs| attrs.camera_exposure.target_bias = bias,
        )
    }

    pub fn set_exposure_mode(&mut self, mode: ExposureMode) -> Result<(), ControlError> {
        let bounds = self.require_bounds()?;
        if !bounds.supports_exposure_mode(mode) {
            return Err(self.reject(unsupported(Field::ExposureMode, mode)));
        }
        if mode != ExposureMode::Custom {
            return self.apply(
                |device| device.set_exposure_mode(mode),
                |attrs| attrs.camera_exposure.mode = mode,
            );
        }

        let exposure = self.attributes.camera_exposure;
        let (Some(duration), Some(iso)) = (exposure.duration, exposure.iso) else {
            return Err(self.reject(ValidationError::InconsistentExposure(
                "custom exposure needs both duration and ISO".into(),
            )));
        };
        bounds
            .exposure_duration
            .check(Field::ExposureDuration, duration)
            .map_err(|err| self.reject(err))?;
        bounds
            .iso
            .check(Field::Iso, iso)
            .map_err(|err| self.reject(err))?;
        self.apply_custom_exposure(duration, iso)
    }

    // --- Snapshot-only operations ---

    pub fn set_output_type(&mut self, output_type: OutputType) {
        self.attributes.output_type = output_type;
        self.succeeded();
    }

    pub fn set_flash_mode(&mut self, mode: FlashMode) {
        self.attributes.flash_mode = mode;
        self.succeeded();
    }

    pub fn set_camera_filters(&mut self, filters: Vec<CameraFilter>) {
        self.attributes.camera_filters = filters;
        self.succeeded();
    }

    pub fn set_mirror_output(&mut self, mirror: bool) {
        self.attributes.mirror_output = mirror;
        self.succeeded();
    }

    pub fn set_grid_visibility(&mut self, visible: bool) {
        self.attributes.is_grid_visible = visible;
        self.succeeded();
    }

    /// Switch format and re-fit zoom, frame rate and exposure into the
    /// bounds of the new format.
    ///
    /// Without a bound device only the snapshot changes; the preset is
    /// applied at the next bind. A refusal is recorded in `error` and the
    /// device is put back into the snapshot's format. A device that cannot
    /// be restored is released.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        let Some(device) = self.device.as_mut() else {
            self.attributes.resolution = resolution;
            self.succeeded();
            return;
        };

        let mut next = self.attributes.clone();
        next.resolution = resolution;
        let result = device
            .set_resolution(resolution)
            .map_err(into_device_error(Field::Resolution))
            .and_then(|()| reconcile(device, &mut next));

        match result {
            Ok(clamped) => {
                self.diagnostics.values_clamped += clamped;
                self.attributes = next;
                self.succeeded();
            }
            Err(err) => {
                let previous = self.attributes.resolution;
                let mut current = self.attributes.clone();
                let restored = device
                    .set_resolution(previous)
                    .map_err(into_device_error(Field::Resolution))
                    .and_then(|()| reconcile(device, &mut current));
                if let Err(restore_err) = restored {
                    log::error!(
                        "cannot restore format {previous:?}: {restore_err}, releasing device"
                    );
                    self.device = None;
                }
                self.fail(err);
            }
        }
    }

    // --- Internal helpers ---

    fn require_device(&self) -> Result<&D, ControlError> {
        self.device.as_ref().ok_or(ControlError::NotReady)
    }

    fn require_bounds(&self) -> Result<CapabilityBounds, ControlError> {
        self.require_device().map(CaptureDevice::bounds)
    }

    fn apply_custom_exposure(&mut self, duration: Duration, iso: f32) -> Result<(), ControlError> {
        self.apply(
            |device| device.set_custom_exposure(duration, iso),
            |attrs| {
                attrs.camera_exposure.duration = Some(duration);
                attrs.camera_exposure.iso = Some(iso);
                attrs.camera_exposure.mode = ExposureMode::Custom;
            },
        )
    }

    /// Write to the device, then update the snapshot only if the write held.
    fn apply(
        &mut self,
        write: impl FnOnce(&mut D) -> Result<(), WriteError>,
        update: impl FnOnce(&mut AttributeSnapshot),
    ) -> Result<(), ControlError> {
        let device = self.device.as_mut().ok_or(ControlError::NotReady)?;
        match write(device) {
            Ok(()) => {
                update(&mut self.attributes);
                self.succeeded();
                Ok(())
            }
            Err(WriteError::Validation(err)) => Err(self.reject(err)),
            Err(WriteError::Device(err)) => Err(self.fail(err)),
        }
    }

    pub(crate) fn succeeded(&mut self) {
        self.attributes.error = None;
        self.diagnostics.operations_applied += 1;
    }

    pub(crate) fn fail(&mut self, err: DeviceError) -> ControlError {
        log::warn!("device operation failed: {err}");
        self.diagnostics.device_failures += 1;
        self.attributes.error = Some(CameraError::Device(err.clone()));
        ControlError::Device(err)
    }

    fn reject(&mut self, err: ValidationError) -> ControlError {
        log::debug!("rejected: {err}");
        self.diagnostics.validation_rejections += 1;
        ControlError::Validation(err)
    }
}

fn unsupported(field: Field, value: impl Debug) -> ValidationError {
    ValidationError::Unsupported {
        field,
        value: format!("{value:?}"),
    }
}

fn into_device_error(field: Field) -> impl Fn(WriteError) -> DeviceError {
    move |err| match err {
        WriteError::Device(err) => err,
        WriteError::Validation(err) => DeviceError::Rejected {
            field,
            reason: err.to_string(),
        },
    }
}

fn note_clamp<T: PartialEq + Debug>(field: Field, requested: T, applied: T) -> u64 {
    if requested == applied {
        0
    } else {
        log::info!("{field} {requested:?} clamped to {applied:?}");
        1
    }
}

/// Fit `attrs` into the device's current bounds and push every
/// device-backed value onto it. Returns the number of clamped values.
fn reconcile<D: CaptureDevice>(
    device: &mut D,
    attrs: &mut AttributeSnapshot,
) -> Result<u64, DeviceError> {
    let bounds = device.bounds();
    let mut clamped = 0;

    let zoom = bounds.zoom.clamp(attrs.zoom_factor);
    clamped += note_clamp(Field::ZoomFactor, attrs.zoom_factor, zoom);
    device
        .set_zoom_factor(zoom)
        .map_err(into_device_error(Field::ZoomFactor))?;
    attrs.zoom_factor = zoom;

    let fps = bounds.frame_rate.clamp(attrs.frame_rate);
    clamped += note_clamp(Field::FrameRate, attrs.frame_rate, fps);
    device
        .set_frame_rate(fps)
        .map_err(into_device_error(Field::FrameRate))?;
    attrs.frame_rate = fps;

    let exposure = &mut attrs.camera_exposure;
    if let Some(duration) = exposure.duration {
        let fitted = bounds.exposure_duration.clamp(duration);
        clamped += note_clamp(Field::ExposureDuration, duration, fitted);
        exposure.duration = Some(fitted);
    }
    if let Some(iso) = exposure.iso {
        let fitted = bounds.iso.clamp(iso);
        clamped += note_clamp(Field::Iso, iso, fitted);
        exposure.iso = Some(fitted);
    }

    let bias = bounds.exposure_target_bias.clamp(exposure.target_bias);
    clamped += note_clamp(Field::ExposureTargetBias, exposure.target_bias, bias);
    device
        .set_exposure_target_bias(bias)
        .map_err(into_device_error(Field::ExposureTargetBias))?;
    exposure.target_bias = bias;

    match (exposure.mode, exposure.duration, exposure.iso) {
        (ExposureMode::Custom, Some(duration), Some(iso))
            if bounds.supports_exposure_mode(ExposureMode::Custom) =>
        {
            device
                .set_custom_exposure(duration, iso)
                .map_err(into_device_error(Field::ExposureMode))?;
        }
        (mode, _, _) if mode != ExposureMode::Custom && bounds.supports_exposure_mode(mode) => {
            device
                .set_exposure_mode(mode)
                .map_err(into_device_error(Field::ExposureMode))?;
        }
        (mode, _, _) => {
            let fallback = ExposureMode::ContinuousAutoExposure;
            clamped += note_clamp(Field::ExposureMode, mode, fallback);
            exposure.mode = fallback;
            if bounds.supports_exposure_mode(fallback) {
                device
                    .set_exposure_mode(fallback)
                    .map_err(into_device_error(Field::ExposureMode))?;
            }
        }
    }

    let light = if bounds.has_torch {
        attrs.light_mode
    } else {
        LightMode::Off
    };
    clamped += note_clamp(Field::LightMode, attrs.light_mode, light);
    device
        .set_light_mode(light)
        .map_err(into_device_error(Field::LightMode))?;
    attrs.light_mode = light;

    let hdr = if bounds.supports_hdr_mode(attrs.hdr_mode) {
        attrs.hdr_mode
    } else {
        HdrMode::Off
    };
    clamped += note_clamp(Field::HdrMode, attrs.hdr_mode, hdr);
    device
        .set_hdr_mode(hdr)
        .map_err(into_device_error(Field::HdrMode))?;
    attrs.hdr_mode = hdr;

    Ok(clamped)
}
