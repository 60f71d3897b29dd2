use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::attributes::{CameraPosition, ExposureMode, HdrMode, Resolution};
use super::error::ValidationError;

/// A configurable attribute, as named in validation and device errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    CameraPosition,
    ZoomFactor,
    LightMode,
    Resolution,
    FrameRate,
    ExposureDuration,
    ExposureTargetBias,
    Iso,
    ExposureMode,
    HdrMode,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CameraPosition => "camera position",
            Self::ZoomFactor => "zoom factor",
            Self::LightMode => "light mode",
            Self::Resolution => "resolution",
            Self::FrameRate => "frame rate",
            Self::ExposureDuration => "exposure duration",
            Self::ExposureTargetBias => "exposure target bias",
            Self::Iso => "ISO",
            Self::ExposureMode => "exposure mode",
            Self::HdrMode => "HDR mode",
        };
        f.write_str(name)
    }
}

/// Numeric value that can be range-checked and reported in an error.
pub trait BoundValue: PartialOrd + Copy {
    /// The value as reported in `ValidationError::OutOfRange`.
    fn to_report(self) -> f64;
}

impl BoundValue for f64 {
    fn to_report(self) -> f64 {
        self
    }
}

impl BoundValue for f32 {
    fn to_report(self) -> f64 {
        f64::from(self)
    }
}

impl BoundValue for u32 {
    fn to_report(self) -> f64 {
        f64::from(self)
    }
}

/// Durations are reported in seconds.
impl BoundValue for Duration {
    fn to_report(self) -> f64 {
        self.as_secs_f64()
    }
}

/// Inclusive `[min, max]` range declared by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: BoundValue> Bounds<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// A range containing exactly one value.
    pub fn fixed(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// `false` for NaN.
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// Nearest value inside the range.
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    /// Returns `value` if it lies within the range, otherwise an
    /// `OutOfRange` error naming `field`.
    pub fn check(&self, field: Field, value: T) -> Result<T, ValidationError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(ValidationError::OutOfRange {
                field,
                value: value.to_report(),
                min: self.min.to_report(),
                max: self.max.to_report(),
            })
        }
    }
}

/// What the active device can do in its active format.
///
/// Bounds are re-queried whenever the format or the device changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityBounds {
    pub exposure_duration: Bounds<Duration>,
    pub iso: Bounds<f32>,
    pub exposure_target_bias: Bounds<f32>,
    pub frame_rate: Bounds<u32>,
    pub zoom: Bounds<f64>,
    pub has_flash: bool,
    pub has_torch: bool,
    pub hdr_modes: Vec<HdrMode>,
    pub exposure_modes: Vec<ExposureMode>,
    pub resolutions: Vec<Resolution>,
}

impl CapabilityBounds {
    pub fn supports_hdr_mode(&self, mode: HdrMode) -> bool {
        mode == HdrMode::Off || self.hdr_modes.contains(&mode)
    }

    pub fn supports_exposure_mode(&self, mode: ExposureMode) -> bool {
        self.exposure_modes.contains(&mode)
    }

    pub fn supports_resolution(&self, resolution: Resolution) -> bool {
        self.resolutions.contains(&resolution)
    }
}

/// Identity of a physical capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub position: CameraPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let bounds = Bounds::new(1.0f64, 4.0);
        assert!(bounds.contains(1.0));
        assert!(bounds.contains(4.0));
        assert!(!bounds.contains(4.000_001));
        assert!(!bounds.contains(f64::NAN));
    }

    #[test]
    fn clamp_picks_nearest_bound() {
        let bounds = Bounds::new(15u32, 60);
        assert_eq!(bounds.clamp(120), 60);
        assert_eq!(bounds.clamp(1), 15);
        assert_eq!(bounds.clamp(30), 30);
    }

    #[test]
    fn check_reports_field_value_and_range() {
        let bounds = Bounds::new(Duration::from_millis(1), Duration::from_millis(500));
        let err = bounds
            .check(Field::ExposureDuration, Duration::from_secs(2))
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: Field::ExposureDuration,
                value: 2.0,
                min: 0.001,
                max: 0.5,
            }
        );
        let message = err.to_string();
        assert!(message.contains("exposure duration"));
        assert!(message.contains("0.5"));
    }

    #[test]
    fn hdr_off_is_always_supported() {
        let bounds = CapabilityBounds {
            exposure_duration: Bounds::fixed(Duration::from_millis(10)),
            iso: Bounds::fixed(100.0),
            exposure_target_bias: Bounds::fixed(0.0),
            frame_rate: Bounds::fixed(30),
            zoom: Bounds::fixed(1.0),
            has_flash: false,
            has_torch: false,
            hdr_modes: Vec::new(),
            exposure_modes: vec![ExposureMode::ContinuousAutoExposure],
            resolutions: vec![Resolution::Vga640x480],
        };
        assert!(bounds.supports_hdr_mode(HdrMode::Off));
        assert!(!bounds.supports_hdr_mode(HdrMode::Auto));
        assert!(bounds.supports_resolution(Resolution::Vga640x480));
        assert!(!bounds.supports_exposure_mode(ExposureMode::Custom));
    }
}
