use serde::{Deserialize, Serialize};

/// Physical orientation reported by the host's motion sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

/// Orientation applied to captured pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOrientation {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl DeviceOrientation {
    /// Frame orientation for this device orientation.
    ///
    /// Sensors are mounted landscape, so a portrait device produces frames
    /// rotated to the right. `FaceUp` and `FaceDown` carry no rotation
    /// information and map to `None`.
    pub fn frame_orientation(self) -> Option<FrameOrientation> {
        match self {
            Self::Portrait => Some(FrameOrientation::Right),
            Self::PortraitUpsideDown => Some(FrameOrientation::Left),
            Self::LandscapeLeft => Some(FrameOrientation::Up),
            Self::LandscapeRight => Some(FrameOrientation::Down),
            Self::FaceUp | Self::FaceDown => None,
        }
    }

    pub fn is_flat(self) -> bool {
        matches!(self, Self::FaceUp | Self::FaceDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_map_to_frame_orientation() {
        assert_eq!(DeviceOrientation::Portrait.frame_orientation(), Some(FrameOrientation::Right));
        assert_eq!(
            DeviceOrientation::PortraitUpsideDown.frame_orientation(),
            Some(FrameOrientation::Left)
        );
        assert_eq!(DeviceOrientation::LandscapeLeft.frame_orientation(), Some(FrameOrientation::Up));
        assert_eq!(DeviceOrientation::LandscapeRight.frame_orientation(), Some(FrameOrientation::Down));
    }

    #[test]
    fn flat_orientations_are_unmapped() {
        assert!(DeviceOrientation::FaceUp.frame_orientation().is_none());
        assert!(DeviceOrientation::FaceDown.frame_orientation().is_none());
        assert!(DeviceOrientation::FaceDown.is_flat());
        assert!(!DeviceOrientation::Portrait.is_flat());
    }

    #[test]
    fn default_frame_matches_default_device_orientation() {
        assert_eq!(
            DeviceOrientation::default().frame_orientation(),
            Some(FrameOrientation::default())
        );
    }
}
