use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::attributes::{CameraPosition, Resolution};
use super::capabilities::Field;

/// A requested value the active device cannot accept.
///
/// Always recoverable; the attribute snapshot is never touched.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("{field} {value} outside valid range [{min}, {max}]")]
    OutOfRange {
        field: Field,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} {value} not supported by the active device")]
    Unsupported { field: Field, value: String },

    #[error("inconsistent exposure: {0}")]
    InconsistentExposure(String),
}

/// Hardware or session rejected an otherwise valid request.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceError {
    #[error("device rejected {field}: {reason}")]
    Rejected { field: Field, reason: String },

    #[error("output not connected")]
    OutputNotConnected,

    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("device disconnected")]
    Disconnected,
}

/// A device could not be acquired or configured during setup.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no {0:?} camera available")]
    NoDevice(CameraPosition),

    #[error("format {0:?} not supported")]
    FormatUnsupported(Resolution),

    #[error("configuration rejected: {0}")]
    ConfigurationRejected(DeviceError),
}

/// Failure of a single capability write on a device.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Failure recorded into `AttributeSnapshot::error`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

/// Error returned by control operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("camera session not ready")]
    NotReady,

    #[error("video recording in progress")]
    RecordingInProgress,

    #[error("no captured media pending")]
    NoPendingMedia,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("camera control sequence closed")]
    SessionClosed,
}

impl ControlError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
