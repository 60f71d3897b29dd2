use serde::{Deserialize, Serialize};

use super::error::SetupError;

/// Session lifecycle state machine.
///
/// State transitions:
/// ```text
/// uninitialized → configuring → running ↔ stopped
///                      ↓
///                   failed → configuring (retry)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Configuring,
    Running,
    Stopped,
    Failed(SetupError),
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether a device is bound and configuration operations may be issued.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Configuring => "configuring",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attributes::CameraPosition;

    #[test]
    fn serializes_under_its_name() {
        let json = serde_json::to_string(&LifecycleState::Running).unwrap();
        assert_eq!(json, r#"{"state":"running"}"#);
    }

    #[test]
    fn failed_state_carries_setup_error() {
        let state = LifecycleState::Failed(SetupError::NoDevice(CameraPosition::Front));

        let json = serde_json::to_string(&state).unwrap();
        let back: LifecycleState = serde_json::from_str(&json).unwrap();

        assert!(json.contains(r#""state":"failed""#));
        assert_eq!(back, state);
        assert_eq!(back.name(), "failed");
    }
}
