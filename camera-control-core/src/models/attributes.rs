use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::CameraError;
use super::media::MediaResult;
use super::orientation::{DeviceOrientation, FrameOrientation};

/// Which capture path a shutter press takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Photo,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    Front,
    #[default]
    Back,
}

/// Single-shot illumination during photo capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    On,
    #[default]
    Off,
    Auto,
}

/// Continuous illumination (torch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    On,
    #[default]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdrMode {
    Auto,
    On,
    #[default]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExposureMode {
    Locked,
    AutoExpose,
    #[default]
    ContinuousAutoExposure,
    Custom,
}

/// Capture format preset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    Vga640x480,
    Hd1280x720,
    #[default]
    Hd1920x1080,
    Uhd3840x2160,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::Vga640x480,
        Resolution::Hd1280x720,
        Resolution::Hd1920x1080,
        Resolution::Uhd3840x2160,
    ];

    pub fn width(self) -> u32 {
        match self {
            Self::Vga640x480 => 640,
            Self::Hd1280x720 => 1280,
            Self::Hd1920x1080 => 1920,
            Self::Uhd3840x2160 => 3840,
        }
    }

    pub fn height(self) -> u32 {
        match self {
            Self::Vga640x480 => 480,
            Self::Hd1280x720 => 720,
            Self::Hd1920x1080 => 1080,
            Self::Uhd3840x2160 => 2160,
        }
    }

    /// Preset matching an exact frame size, if any.
    pub fn from_size(width: u32, height: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.width() == width && r.height() == height)
    }
}

/// Exposure parameters as configured by the caller.
///
/// `duration` and `iso` stay `None` until explicitly set; a custom exposure
/// needs both.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraExposure {
    pub duration: Option<Duration>,
    pub target_bias: f32,
    pub iso: Option<f32>,
    pub mode: ExposureMode,
}

/// A filter applied to output frames, in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFilter {
    pub name: String,
    pub parameters: BTreeMap<String, f64>,
}

impl CameraFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// The single record of configured and observed camera state.
///
/// Written only on the control sequence; callers receive copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSnapshot {
    pub output_type: OutputType,
    pub camera_position: CameraPosition,
    pub zoom_factor: f64,
    pub flash_mode: FlashMode,
    pub light_mode: LightMode,
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub camera_exposure: CameraExposure,
    pub hdr_mode: HdrMode,
    pub camera_filters: Vec<CameraFilter>,
    pub mirror_output: bool,
    pub is_grid_visible: bool,
    pub device_orientation: DeviceOrientation,
    pub frame_orientation: FrameOrientation,
    pub orientation_locked: bool,
    pub user_blocked_screen_rotation: bool,
    pub is_recording: bool,
    pub captured_media: Option<MediaResult>,
    pub captured_processed_media: Option<MediaResult>,
    pub error: Option<CameraError>,
}

impl Default for AttributeSnapshot {
    fn default() -> Self {
        Self {
            output_type: OutputType::Photo,
            camera_position: CameraPosition::Back,
            zoom_factor: 1.0,
            flash_mode: FlashMode::Off,
            light_mode: LightMode::Off,
            resolution: Resolution::Hd1920x1080,
            frame_rate: 30,
            camera_exposure: CameraExposure::default(),
            hdr_mode: HdrMode::Off,
            camera_filters: Vec::new(),
            mirror_output: false,
            is_grid_visible: true,
            device_orientation: DeviceOrientation::Portrait,
            frame_orientation: FrameOrientation::Right,
            orientation_locked: false,
            user_blocked_screen_rotation: false,
            is_recording: false,
            captured_media: None,
            captured_processed_media: None,
            error: None,
        }
    }
}

impl AttributeSnapshot {
    /// Whether a captured result is waiting for retake or accept.
    pub fn has_pending_media(&self) -> bool {
        self.captured_media.is_some()
    }
}
