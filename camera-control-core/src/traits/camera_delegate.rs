use crate::models::error::CameraError;
use crate::models::media::MediaResult;
use crate::models::state::LifecycleState;

/// Event sink for camera session notifications.
///
/// All methods are called on the control sequence, after the state
/// transition they report. Implementations should marshal to the UI thread
/// if needed and must not block.
pub trait CameraDelegate: Send + Sync {
    /// Called when the session lifecycle state changes.
    fn on_state_changed(&self, _state: &LifecycleState) {}

    /// Called once when a capture produces a result.
    fn on_media_captured(&self, _media: &MediaResult) {}

    /// Called once when a pending result is accepted. Receives the
    /// processed variant when one was attached, otherwise the raw result.
    fn on_capture_confirmed(&self, _media: &MediaResult) {}

    /// Called when a device or setup failure is recorded.
    fn on_error(&self, _error: &CameraError) {}
}
