//! V4L2 capture node enumeration.
//!
//! Lists `/dev/video*` nodes that expose the `VIDEO_CAPTURE` capability and
//! assigns camera positions in node order: the first capture node is the
//! front camera, the second the back camera.

use std::path::PathBuf;

use v4l::capability::Flags;
use v4l::Device;

use camera_control_core::models::attributes::CameraPosition;

use crate::controls::position_for_node;

/// A video node that can capture frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureNode {
    pub index: usize,
    pub path: PathBuf,
    pub name: String,
}

/// Camera enumerator over the V4L2 device nodes.
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    /// List capture-capable nodes, ordered by node index.
    ///
    /// Metadata-only nodes that UVC drivers register next to each camera are
    /// skipped, as are nodes that cannot be opened.
    pub fn list_capture_nodes() -> Vec<CaptureNode> {
        let mut nodes: Vec<CaptureNode> = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let path = node.path().to_path_buf();
                let device = Device::with_path(&path)
                    .map_err(|e| log::debug!("skipping {}: {}", path.display(), e))
                    .ok()?;
                let caps = device.query_caps().ok()?;
                if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                    return None;
                }
                Some(CaptureNode {
                    index: node.index(),
                    path,
                    name: caps.card,
                })
            })
            .collect();
        nodes.sort_by_key(|node| node.index);
        nodes
    }

    /// Capture nodes paired with the position each one serves.
    pub fn list_positioned() -> Vec<(CameraPosition, CaptureNode)> {
        Self::list_capture_nodes()
            .into_iter()
            .enumerate()
            .filter_map(|(order, node)| position_for_node(order).map(|position| (position, node)))
            .collect()
    }
}
