use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::attributes::{AttributeSnapshot, CameraFilter, CameraPosition};
use super::orientation::FrameOrientation;

/// Still frame as delivered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    /// FourCC-style pixel format tag, e.g. `"MJPG"` or `"YUYV"`.
    pub pixel_format: String,
    pub data: Vec<u8>,
}

/// Finished recording as delivered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedVideo {
    pub location: PathBuf,
    pub duration: Duration,
    pub frame_count: u64,
    pub has_audio: bool,
}

/// Capture-time context attached to every media result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub id: String,
    pub captured_at: String,
    pub camera_position: CameraPosition,
    pub frame_orientation: FrameOrientation,
    pub mirrored: bool,
    pub filters: Vec<CameraFilter>,
}

impl MediaMetadata {
    /// Metadata for a capture taken with the given attributes.
    pub fn from_attributes(attributes: &AttributeSnapshot) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            captured_at: chrono::Utc::now().to_rfc3339(),
            camera_position: attributes.camera_position,
            frame_orientation: attributes.frame_orientation,
            mirrored: attributes.mirror_output,
            filters: attributes.camera_filters.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedImage {
    pub metadata: MediaMetadata,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoReference {
    pub metadata: MediaMetadata,
    pub location: PathBuf,
    pub duration: Duration,
    pub frame_count: u64,
    pub has_audio: bool,
}

/// Immutable result of a capture: exactly one variant is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaResult {
    Image(CapturedImage),
    Video(VideoReference),
}

impl MediaResult {
    pub fn image(metadata: MediaMetadata, raw: RawImage) -> Self {
        Self::Image(CapturedImage {
            metadata,
            width: raw.width,
            height: raw.height,
            pixel_format: raw.pixel_format,
            data: raw.data,
        })
    }

    pub fn video(metadata: MediaMetadata, recording: RecordedVideo) -> Self {
        Self::Video(VideoReference {
            metadata,
            location: recording.location,
            duration: recording.duration,
            frame_count: recording.frame_count,
            has_audio: recording.has_audio,
        })
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    pub fn as_image(&self) -> Option<&CapturedImage> {
        match self {
            Self::Image(image) => Some(image),
            Self::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoReference> {
        match self {
            Self::Video(video) => Some(video),
            Self::Image(_) => None,
        }
    }

    pub fn metadata(&self) -> &MediaMetadata {
        match self {
            Self::Image(image) => &image.metadata,
            Self::Video(video) => &video.metadata,
        }
    }
}
