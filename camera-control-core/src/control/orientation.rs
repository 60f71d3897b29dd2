use crate::models::attributes::AttributeSnapshot;
use crate::models::orientation::DeviceOrientation;

/// Derives frame orientation from physical rotation events under the
/// orientation lock.
///
/// Stateless: the last mapped frame orientation lives in the snapshot, so
/// flat orientations simply leave it in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrientationTracker;

impl OrientationTracker {
    /// Apply a rotation event. Returns `false` when the lock swallowed it.
    pub fn handle_event(
        &self,
        attributes: &mut AttributeSnapshot,
        orientation: DeviceOrientation,
    ) -> bool {
        if attributes.orientation_locked {
            log::debug!("orientation {orientation:?} ignored, locked");
            return false;
        }

        attributes.device_orientation = orientation;
        if let Some(frame) = orientation.frame_orientation() {
            attributes.frame_orientation = frame;
        }
        true
    }

    /// Freeze or release both orientation fields.
    pub fn set_locked(&self, attributes: &mut AttributeSnapshot, locked: bool) {
        attributes.orientation_locked = locked;
    }

    /// Record the host's system-level rotation block. Independent of the lock.
    pub fn observe_rotation_blocked(&self, attributes: &mut AttributeSnapshot, blocked: bool) {
        attributes.user_blocked_screen_rotation = blocked;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::orientation::FrameOrientation;

    #[test]
    fn maps_rotations_to_frame_orientation() {
        let tracker = OrientationTracker;
        let mut attrs = AttributeSnapshot::default();

        let cases = [
            (DeviceOrientation::LandscapeLeft, FrameOrientation::Up),
            (DeviceOrientation::LandscapeRight, FrameOrientation::Down),
            (DeviceOrientation::PortraitUpsideDown, FrameOrientation::Left),
            (DeviceOrientation::Portrait, FrameOrientation::Right),
        ];
        for (device, frame) in cases {
            assert!(tracker.handle_event(&mut attrs, device));
            assert_eq!(attrs.device_orientation, device);
            assert_eq!(attrs.frame_orientation, frame);
        }
    }

    #[test]
    fn flat_orientations_keep_last_frame_orientation() {
        let tracker = OrientationTracker;
        let mut attrs = AttributeSnapshot::default();
        tracker.handle_event(&mut attrs, DeviceOrientation::LandscapeLeft);

        tracker.handle_event(&mut attrs, DeviceOrientation::FaceUp);
        tracker.handle_event(&mut attrs, DeviceOrientation::FaceDown);

        assert_eq!(attrs.device_orientation, DeviceOrientation::FaceDown);
        assert_eq!(attrs.frame_orientation, FrameOrientation::Up);
    }

    #[test]
    fn lock_freezes_both_fields() {
        let tracker = OrientationTracker;
        let mut attrs = AttributeSnapshot::default();
        tracker.set_locked(&mut attrs, true);

        for orientation in [
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::FaceUp,
            DeviceOrientation::PortraitUpsideDown,
            DeviceOrientation::LandscapeRight,
        ] {
            assert!(!tracker.handle_event(&mut attrs, orientation));
        }

        assert_eq!(attrs.device_orientation, DeviceOrientation::Portrait);
        assert_eq!(attrs.frame_orientation, FrameOrientation::Right);

        tracker.set_locked(&mut attrs, false);
        assert!(tracker.handle_event(&mut attrs, DeviceOrientation::LandscapeRight));
        assert_eq!(attrs.frame_orientation, FrameOrientation::Down);
    }

    #[test]
    fn rotation_block_is_independent_of_lock() {
        let tracker = OrientationTracker;
        let mut attrs = AttributeSnapshot::default();

        tracker.observe_rotation_blocked(&mut attrs, true);

        assert!(attrs.user_blocked_screen_rotation);
        assert!(!attrs.orientation_locked);
        assert!(tracker.handle_event(&mut attrs, DeviceOrientation::LandscapeLeft));
    }
}
