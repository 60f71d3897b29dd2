//! Camera device node access check.
//!
//! Linux has no consent prompt for cameras; access is granted through the
//! device node's permissions, usually membership of the `video` group.
//! Opening the node read/write up front turns a permission problem into
//! `SetupError::PermissionDenied` instead of an opaque ioctl failure later.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use camera_control_core::models::attributes::CameraPosition;
use camera_control_core::models::error::SetupError;

/// Check that the node at `path` can be opened for capture.
pub fn check_device_access(path: &Path, position: CameraPosition) -> Result<(), SetupError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|err| {
            log::warn!("cannot open {}: {err}", path.display());
            access_error(&err, position)
        })
}

/// Map an open failure onto the setup taxonomy.
pub fn access_error(err: &io::Error, position: CameraPosition) -> SetupError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => SetupError::PermissionDenied,
        _ => SetupError::NoDevice(position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_map_to_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);

        assert_eq!(
            access_error(&err, CameraPosition::Back),
            SetupError::PermissionDenied
        );
    }

    #[test]
    fn other_errors_mean_no_device() {
        let err = io::Error::from(io::ErrorKind::NotFound);

        assert_eq!(
            access_error(&err, CameraPosition::Front),
            SetupError::NoDevice(CameraPosition::Front)
        );
    }

    #[test]
    fn missing_node_is_reported_as_no_device() {
        let result = check_device_access(
            Path::new("/nonexistent/video-node"),
            CameraPosition::Back,
        );

        assert_eq!(result, Err(SetupError::NoDevice(CameraPosition::Back)));
    }
}
