//! # camera-control-core
//!
//! Platform-agnostic camera device-control core.
//!
//! Holds the single authoritative attribute snapshot, validates configuration
//! against the capability bounds of whichever device is bound, derives frame
//! orientation from rotation events, and turns shutter presses into media
//! results. Platform backends (Linux V4L2) implement the `CaptureDevice` and
//! `DeviceProvider` traits and plug into the generic `CameraSession`.
//!
//! ## Architecture
//!
//! ```text
//! camera-control-core (this crate)
//! ├── traits/       ← CaptureDevice, DeviceProvider, CameraDelegate
//! ├── models/       ← AttributeSnapshot, CapabilityBounds, MediaResult, errors, etc.
//! ├── control/      ← DeviceController, OrientationTracker, CaptureOutputPipeline
//! ├── session/      ← SessionLifecycle, CameraSession, CameraHandle (control sequence)
//! └── mock          ← MockProvider / MockDevice for hardware-free testing
//! ```

pub mod control;
pub mod mock;
pub mod models;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use control::capture::{CaptureOutcome, CaptureOutputPipeline};
pub use control::controller::DeviceController;
pub use control::orientation::OrientationTracker;
pub use models::attributes::{
    AttributeSnapshot, CameraExposure, CameraFilter, CameraPosition, ExposureMode, FlashMode,
    HdrMode, LightMode, OutputType, Resolution,
};
pub use models::capabilities::{Bounds, CapabilityBounds, DeviceInfo, Field};
pub use models::config::CameraConfiguration;
pub use models::diagnostics::ControlDiagnostics;
pub use models::error::{
    CameraError, ControlError, DeviceError, SetupError, ValidationError, WriteError,
};
pub use models::media::{
    CapturedImage, MediaMetadata, MediaResult, RawImage, RecordedVideo, VideoReference,
};
pub use models::orientation::{DeviceOrientation, FrameOrientation};
pub use models::state::LifecycleState;
pub use session::camera::{CameraSession, ConfigChange};
pub use session::handle::{CameraHandle, Pending};
pub use session::lifecycle::SessionLifecycle;
pub use traits::camera_delegate::CameraDelegate;
pub use traits::capture_device::{CaptureDevice, ObservedExposure, PhotoSettings, RecordingSettings};
pub use traits::device_provider::DeviceProvider;
