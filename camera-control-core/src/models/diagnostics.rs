use serde::Serialize;

/// Counters for debugging a camera session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControlDiagnostics {
    pub operations_applied: u64,
    pub validation_rejections: u64,
    pub device_failures: u64,
    pub values_clamped: u64,
    pub photos_captured: u64,
    pub videos_recorded: u64,
    pub orientation_events: u64,
    pub orientation_events_ignored: u64,
    pub setups: u64,
}
