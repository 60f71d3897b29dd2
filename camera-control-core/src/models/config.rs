use std::sync::Arc;

use super::super::traits::camera_delegate::CameraDelegate;
use super::attributes::{
    AttributeSnapshot, CameraFilter, CameraPosition, FlashMode, HdrMode, LightMode, OutputType,
    Resolution,
};

/// Options for a camera session. Unset options take the documented defaults.
#[derive(Clone)]
pub struct CameraConfiguration {
    /// Observer notified of state changes, captures and errors (default: none).
    pub delegate: Option<Arc<dyn CameraDelegate>>,

    /// Whether video recordings should include an audio track (default: true).
    pub is_audio_available: bool,

    /// Capture path taken by the shutter (default: photo).
    pub output_type: OutputType,

    /// Camera acquired by the first setup (default: back).
    pub camera_position: CameraPosition,

    /// Format preset applied at setup (default: 1920x1080).
    pub resolution: Resolution,

    /// Frames per second (default: 30). Clamped to the device at setup.
    pub frame_rate: u32,

    /// Initial zoom (default: 1.0). Clamped to the device at setup.
    pub zoom_factor: f64,

    pub flash_mode: FlashMode,
    pub light_mode: LightMode,
    pub hdr_mode: HdrMode,
    pub camera_filters: Vec<CameraFilter>,
    pub mirror_output: bool,

    /// Show the composition grid overlay (default: true).
    pub is_grid_visible: bool,

    /// Start with frame orientation frozen (default: false).
    pub orientation_locked: bool,
}

impl CameraConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.zoom_factor.is_finite() || self.zoom_factor < 1.0 {
            return Err(format!("zoom factor must be at least 1.0, got {}", self.zoom_factor));
        }
        if self.frame_rate == 0 {
            return Err("frame rate must be positive".into());
        }
        Ok(())
    }

    /// Snapshot a session starts from before any device is bound.
    pub fn initial_attributes(&self) -> AttributeSnapshot {
        AttributeSnapshot {
            output_type: self.output_type,
            camera_position: self.camera_position,
            zoom_factor: self.zoom_factor,
            flash_mode: self.flash_mode,
            light_mode: self.light_mode,
            resolution: self.resolution,
            frame_rate: self.frame_rate,
            hdr_mode: self.hdr_mode,
            camera_filters: self.camera_filters.clone(),
            mirror_output: self.mirror_output,
            is_grid_visible: self.is_grid_visible,
            orientation_locked: self.orientation_locked,
            ..AttributeSnapshot::default()
        }
    }
}

impl Default for CameraConfiguration {
    fn default() -> Self {
        Self {
            delegate: None,
            is_audio_available: true,
            output_type: OutputType::Photo,
            camera_position: CameraPosition::Back,
            resolution: Resolution::Hd1920x1080,
            frame_rate: 30,
            zoom_factor: 1.0,
            flash_mode: FlashMode::Off,
            light_mode: LightMode::Off,
            hdr_mode: HdrMode::Off,
            camera_filters: Vec::new(),
            mirror_output: false,
            is_grid_visible: true,
            orientation_locked: false,
        }
    }
}
