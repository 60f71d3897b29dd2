use crate::models::error::{ControlError, SetupError};
use crate::models::state::LifecycleState;

/// Lifecycle state machine of a camera session.
///
/// Each transition returns whether the state actually changed so the
/// owner can decide whether to notify observers.
#[derive(Debug, Default)]
pub struct SessionLifecycle {
    state: LifecycleState,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Enter `Configuring`. Allowed from every state; setup doubles as a
    /// retry after failure and as a full reset after retake.
    pub fn begin_setup(&mut self) -> bool {
        self.transition(LifecycleState::Configuring)
    }

    pub fn finish_setup(&mut self) -> bool {
        self.transition(LifecycleState::Running)
    }

    pub fn fail(&mut self, err: SetupError) -> bool {
        self.transition(LifecycleState::Failed(err))
    }

    /// Resume the live feed. Idempotent while running.
    pub fn start(&mut self) -> Result<bool, ControlError> {
        match self.state {
            LifecycleState::Running => Ok(false),
            LifecycleState::Stopped => Ok(self.transition(LifecycleState::Running)),
            _ => Err(ControlError::NotReady),
        }
    }

    /// Pause the live feed without releasing the device. Idempotent while
    /// stopped.
    pub fn stop(&mut self) -> Result<bool, ControlError> {
        match self.state {
            LifecycleState::Stopped => Ok(false),
            LifecycleState::Running => Ok(self.transition(LifecycleState::Stopped)),
            _ => Err(ControlError::NotReady),
        }
    }

    fn transition(&mut self, next: LifecycleState) -> bool {
        if self.state == next {
            return false;
        }
        log::debug!("lifecycle {} -> {}", self.state.name(), next.name());
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attributes::CameraPosition;

    #[test]
    fn setup_ends_running() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(lifecycle.state(), &LifecycleState::Uninitialized);

        assert!(lifecycle.begin_setup());
        assert_eq!(lifecycle.state(), &LifecycleState::Configuring);
        assert!(lifecycle.finish_setup());
        assert!(lifecycle.state().is_running());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.begin_setup();
        lifecycle.finish_setup();

        assert_eq!(lifecycle.start(), Ok(false));
        assert_eq!(lifecycle.stop(), Ok(true));
        assert_eq!(lifecycle.stop(), Ok(false));
        assert_eq!(lifecycle.state(), &LifecycleState::Stopped);
        assert_eq!(lifecycle.start(), Ok(true));
        assert!(lifecycle.state().is_running());
    }

    #[test]
    fn start_requires_setup() {
        let mut lifecycle = SessionLifecycle::new();

        assert_eq!(lifecycle.start(), Err(ControlError::NotReady));
        assert_eq!(lifecycle.stop(), Err(ControlError::NotReady));
    }

    #[test]
    fn failed_setup_can_be_retried() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.begin_setup();
        lifecycle.fail(SetupError::NoDevice(CameraPosition::Front));

        assert!(lifecycle.state().is_failed());
        assert_eq!(lifecycle.start(), Err(ControlError::NotReady));
        assert!(lifecycle.begin_setup());
        assert!(lifecycle.finish_setup());
        assert!(lifecycle.state().is_ready());
    }
}
