use std::sync::Arc;
use std::time::Duration;

use crate::control::capture::{CaptureOutcome, CaptureOutputPipeline};
use crate::control::controller::DeviceController;
use crate::control::orientation::OrientationTracker;
use crate::models::attributes::{
    AttributeSnapshot, CameraFilter, CameraPosition, ExposureMode, FlashMode, HdrMode, LightMode,
    OutputType, Resolution,
};
use crate::models::capabilities::DeviceInfo;
use crate::models::config::CameraConfiguration;
use crate::models::diagnostics::ControlDiagnostics;
use crate::models::error::{CameraError, ControlError, SetupError};
use crate::models::media::MediaResult;
use crate::models::orientation::DeviceOrientation;
use crate::models::state::LifecycleState;
use crate::session::lifecycle::SessionLifecycle;
use crate::traits::camera_delegate::CameraDelegate;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::device_provider::DeviceProvider;

/// A single configuration request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigChange {
    OutputType(OutputType),
    ZoomFactor(f64),
    FlashMode(FlashMode),
    LightMode(LightMode),
    Resolution(Resolution),
    FrameRate(u32),
    ExposureDuration(Duration),
    ExposureTargetBias(f32),
    Iso(f32),
    ExposureMode(ExposureMode),
    HdrMode(HdrMode),
    CameraFilters(Vec<CameraFilter>),
    MirrorOutput(bool),
    GridVisibility(bool),
    OrientationLocked(bool),
    ScreenRotationBlocked(bool),
}

/// Single owner of a camera session: lifecycle, bound device, snapshot.
///
/// Generic over the device backend via `DeviceProvider`. Every method
/// takes `&mut self`, so ordering is whatever the owner imposes;
/// `CameraHandle` puts a session behind a command queue.
///
/// ```text
/// [DeviceProvider] → acquire → [DeviceController] ← ConfigChange
///                                   │     ↑
///                      [OrientationTracker] [CaptureOutputPipeline]
///                                   ↓
///                          AttributeSnapshot → CameraDelegate
/// ```
pub struct CameraSession<P: DeviceProvider> {
    provider: P,
    controller: DeviceController<P::Device>,
    orientation: OrientationTracker,
    pipeline: CaptureOutputPipeline,
    lifecycle: SessionLifecycle,
    delegate: Option<Arc<dyn CameraDelegate>>,
}

impl<P: DeviceProvider> CameraSession<P> {
    pub fn new(provider: P, config: CameraConfiguration) -> Result<Self, ControlError> {
        config.validate().map_err(ControlError::InvalidConfiguration)?;

        Ok(Self {
            provider,
            controller: DeviceController::new(config.initial_attributes()),
            orientation: OrientationTracker,
            pipeline: CaptureOutputPipeline::new(config.is_audio_available),
            lifecycle: SessionLifecycle::new(),
            delegate: config.delegate,
        })
    }

    pub fn attributes(&self) -> &AttributeSnapshot {
        self.controller.attributes()
    }

    pub fn state(&self) -> &LifecycleState {
        self.lifecycle.state()
    }

    pub fn diagnostics(&self) -> ControlDiagnostics {
        self.controller.diagnostics().clone()
    }

    pub fn available_devices(&self) -> Vec<DeviceInfo> {
        self.provider.available_devices()
    }

    /// Acquire and configure the device for the configured position.
    /// Transitions: any → configuring → running, or → failed.
    ///
    /// A bound device is torn down before the new one is acquired.
    pub async fn setup(&mut self) -> Result<(), ControlError> {
        self.teardown();
        self.set_state(SessionLifecycle::begin_setup);
        self.controller.diagnostics_mut().setups += 1;

        let position = self.controller.attributes().camera_position;
        match self.bind(position).await {
            Ok(()) => {
                self.controller.succeeded();
                self.set_state(SessionLifecycle::finish_setup);
                Ok(())
            }
            Err(err) => {
                log::error!("camera setup failed: {err}");
                self.record_error(CameraError::Setup(err.clone()));
                let failed = err.clone();
                self.set_state(move |lifecycle| lifecycle.fail(failed));
                Err(ControlError::Setup(err))
            }
        }
    }

    pub fn start(&mut self) -> Result<(), ControlError> {
        if self.lifecycle.start()? {
            self.notify_state();
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ControlError> {
        if self.lifecycle.stop()? {
            self.notify_state();
        }
        Ok(())
    }

    pub fn apply(&mut self, change: ConfigChange) -> Result<(), ControlError> {
        let failures = self.controller.diagnostics().device_failures;
        let controller = &mut self.controller;

        let result = match change {
            ConfigChange::OutputType(output_type) => {
                controller.set_output_type(output_type);
                Ok(())
            }
            ConfigChange::ZoomFactor(factor) => controller.set_zoom_factor(factor),
            ConfigChange::FlashMode(mode) => {
                controller.set_flash_mode(mode);
                Ok(())
            }
            ConfigChange::LightMode(mode) => controller.set_light_mode(mode),
            ConfigChange::Resolution(resolution) => {
                controller.set_resolution(resolution);
                Ok(())
            }
            ConfigChange::FrameRate(fps) => controller.set_frame_rate(fps),
            ConfigChange::ExposureDuration(duration) => {
                controller.set_exposure_duration(duration)
            }
            ConfigChange::ExposureTargetBias(bias) => controller.set_exposure_target_bias(bias),
            ConfigChange::Iso(iso) => controller.set_iso(iso),
            ConfigChange::ExposureMode(mode) => controller.set_exposure_mode(mode),
            ConfigChange::HdrMode(mode) => controller.set_hdr_mode(mode),
            ConfigChange::CameraFilters(filters) => {
                controller.set_camera_filters(filters);
                Ok(())
            }
            ConfigChange::MirrorOutput(mirror) => {
                controller.set_mirror_output(mirror);
                Ok(())
            }
            ConfigChange::GridVisibility(visible) => {
                controller.set_grid_visibility(visible);
                Ok(())
            }
            ConfigChange::OrientationLocked(locked) => {
                self.orientation.set_locked(controller.attributes_mut(), locked);
                controller.succeeded();
                Ok(())
            }
            ConfigChange::ScreenRotationBlocked(blocked) => {
                self.orientation
                    .observe_rotation_blocked(controller.attributes_mut(), blocked);
                Ok(())
            }
        };

        self.report_device_failure(failures);
        result
    }

    /// Switch to the camera at `position`, clamping configured values into
    /// the new device's bounds.
    ///
    /// When the new camera cannot be brought up the previous one is
    /// restored; only if that also fails does the session enter `Failed`.
    pub async fn set_camera_position(
        &mut self,
        position: CameraPosition,
    ) -> Result<(), ControlError> {
        if !self.lifecycle.state().is_ready() {
            return Err(ControlError::NotReady);
        }
        let current = self.controller.attributes().camera_position;
        if position == current {
            return Ok(());
        }
        if self.controller.attributes().is_recording {
            return Err(ControlError::RecordingInProgress);
        }

        self.teardown();
        match self.bind(position).await {
            Ok(()) => {
                log::debug!("switched camera {current:?} -> {position:?}");
                self.controller.succeeded();
                Ok(())
            }
            Err(err) => {
                log::warn!("switch to {position:?} failed: {err}, restoring {current:?}");
                if let Err(restore_err) = self.bind(current).await {
                    log::error!("could not restore {current:?} camera: {restore_err}");
                    self.set_state(move |lifecycle| lifecycle.fail(restore_err));
                }
                self.record_error(CameraError::Setup(err.clone()));
                Err(ControlError::Setup(err))
            }
        }
    }

    /// Feed a physical rotation event. Ignored unless a device is bound.
    pub fn handle_orientation(&mut self, orientation: DeviceOrientation) {
        let handled = self.lifecycle.state().is_ready()
            && self
                .orientation
                .handle_event(self.controller.attributes_mut(), orientation);

        let diagnostics = self.controller.diagnostics_mut();
        if handled {
            diagnostics.orientation_events += 1;
        } else {
            diagnostics.orientation_events_ignored += 1;
        }
    }

    pub fn capture_output(&mut self) -> Result<CaptureOutcome, ControlError> {
        if self.controller.attributes().has_pending_media() {
            return Ok(CaptureOutcome::MediaPending);
        }
        if !self.lifecycle.state().is_running() {
            return Err(ControlError::NotReady);
        }

        let failures = self.controller.diagnostics().device_failures;
        let outcome = self.pipeline.capture_output(&mut self.controller);
        self.report_device_failure(failures);

        if let (Ok(CaptureOutcome::Captured(media)), Some(delegate)) = (&outcome, &self.delegate) {
            delegate.on_media_captured(media);
        }
        outcome
    }

    /// Drop the pending result and rebuild the live feed from scratch.
    pub async fn retake(&mut self) -> Result<(), ControlError> {
        self.pipeline.discard(&mut self.controller);
        self.setup().await?;
        self.start()
    }

    /// Confirm the pending result and hand it back, processed variant first.
    pub fn accept(&mut self) -> Result<MediaResult, ControlError> {
        let confirmed = self.pipeline.accept(&mut self.controller)?;
        if let Some(ref delegate) = self.delegate {
            delegate.on_capture_confirmed(&confirmed);
        }
        Ok(confirmed)
    }

    pub fn set_processed_media(&mut self, media: MediaResult) -> Result<(), ControlError> {
        self.pipeline.attach_processed(&mut self.controller, media)
    }

    /// Release the device, abandoning any recording in flight.
    pub fn teardown(&mut self) {
        if let Some(device) = self.controller.unbind() {
            log::debug!("releasing {}", device.info().name);
            drop(device);
        }
        self.controller.attributes_mut().is_recording = false;
    }

    async fn bind(&mut self, position: CameraPosition) -> Result<(), SetupError> {
        let device = self.provider.acquire(position).await?;
        self.controller.bind(device)
    }

    fn record_error(&mut self, error: CameraError) {
        self.controller.attributes_mut().error = Some(error.clone());
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(&error);
        }
    }

    /// Notify the delegate if the controller recorded a device failure
    /// since `failures_before`.
    fn report_device_failure(&self, failures_before: u64) {
        if self.controller.diagnostics().device_failures == failures_before {
            return;
        }
        let error = &self.controller.attributes().error;
        if let (Some(delegate), Some(error)) = (&self.delegate, error) {
            delegate.on_error(error);
        }
    }

    fn set_state(&mut self, transition: impl FnOnce(&mut SessionLifecycle) -> bool) {
        if transition(&mut self.lifecycle) {
            self.notify_state();
        }
    }

    fn notify_state(&self) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(self.lifecycle.state());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEvent, MockOperation, MockProvider, MockSpec};
    use crate::models::capabilities::Bounds;
    use crate::models::error::DeviceError;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDelegate {
        states: Mutex<Vec<String>>,
        captured: Mutex<Vec<MediaResult>>,
        confirmed: Mutex<Vec<MediaResult>>,
        errors: Mutex<Vec<CameraError>>,
    }

    impl CameraDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: &LifecycleState) {
            self.states.lock().push(state.name().to_string());
        }

        fn on_media_captured(&self, media: &MediaResult) {
            self.captured.lock().push(media.clone());
        }

        fn on_capture_confirmed(&self, media: &MediaResult) {
            self.confirmed.lock().push(media.clone());
        }

        fn on_error(&self, error: &CameraError) {
            self.errors.lock().push(error.clone());
        }
    }

    fn session_with(
        provider: MockProvider,
        config: CameraConfiguration,
    ) -> (CameraSession<MockProvider>, Arc<RecordingDelegate>) {
        let delegate = Arc::new(RecordingDelegate::default());
        let config = CameraConfiguration {
            delegate: Some(delegate.clone()),
            ..config
        };
        (CameraSession::new(provider, config).unwrap(), delegate)
    }

    async fn running(
        config: CameraConfiguration,
    ) -> (CameraSession<MockProvider>, Arc<RecordingDelegate>) {
        let (mut session, delegate) = session_with(MockProvider::new(), config);
        session.setup().await.unwrap();
        (session, delegate)
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = CameraConfiguration {
            frame_rate: 0,
            ..Default::default()
        };

        let result = CameraSession::new(MockProvider::new(), config);

        assert!(matches!(result, Err(ControlError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn setup_reports_transitions() {
        let (session, delegate) = running(CameraConfiguration::default()).await;

        assert!(session.state().is_running());
        assert_eq!(*delegate.states.lock(), vec!["configuring", "running"]);
        assert_eq!(session.diagnostics().setups, 1);
    }

    #[tokio::test]
    async fn setup_failure_is_recorded() {
        let provider = MockProvider::new();
        provider.controls().deny_permission(true);
        let (mut session, delegate) = session_with(provider, CameraConfiguration::default());

        let err = session.setup().await.unwrap_err();

        assert_eq!(err, ControlError::Setup(SetupError::PermissionDenied));
        assert_eq!(
            session.state(),
            &LifecycleState::Failed(SetupError::PermissionDenied)
        );
        assert_eq!(
            session.attributes().error,
            Some(CameraError::Setup(SetupError::PermissionDenied))
        );
        assert_eq!(delegate.errors.lock().len(), 1);
        assert_eq!(session.start(), Err(ControlError::NotReady));
    }

    #[tokio::test]
    async fn retry_after_failure_clears_error() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        controls.fail_next(MockOperation::Acquire);
        let (mut session, _) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap_err();

        session.setup().await.unwrap();

        assert!(session.state().is_running());
        assert!(session.attributes().error.is_none());
    }

    #[tokio::test]
    async fn operations_before_setup_are_not_ready() {
        let (mut session, _) = session_with(MockProvider::new(), CameraConfiguration::default());

        assert_eq!(
            session.apply(ConfigChange::ZoomFactor(2.0)),
            Err(ControlError::NotReady)
        );
        assert_eq!(
            session.set_camera_position(CameraPosition::Front).await,
            Err(ControlError::NotReady)
        );
        assert_eq!(session.capture_output(), Err(ControlError::NotReady));

        // snapshot-only operations work in every state
        session.apply(ConfigChange::MirrorOutput(true)).unwrap();
        assert!(session.attributes().mirror_output);
    }

    #[tokio::test]
    async fn position_switch_clamps_zoom() {
        let (mut session, _) = running(CameraConfiguration::default()).await;
        session.apply(ConfigChange::ZoomFactor(8.0)).unwrap();

        session
            .set_camera_position(CameraPosition::Front)
            .await
            .unwrap();

        let attrs = session.attributes();
        assert_eq!(attrs.camera_position, CameraPosition::Front);
        assert_relative_eq!(attrs.zoom_factor, 4.0);
    }

    #[tokio::test]
    async fn position_switch_releases_old_device_first() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        let (mut session, _) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        controls.clear_events();

        session
            .set_camera_position(CameraPosition::Front)
            .await
            .unwrap();

        let lifecycle: Vec<_> = controls
            .events()
            .into_iter()
            .filter(|e| !matches!(e, MockEvent::Wrote(_)))
            .collect();
        assert_eq!(
            lifecycle,
            vec![
                MockEvent::Released(CameraPosition::Back),
                MockEvent::Acquired(CameraPosition::Front),
            ]
        );
        assert_eq!(controls.live_devices(), 1);
    }

    #[tokio::test]
    async fn failed_switch_restores_previous_camera() {
        let provider = MockProvider::new().without(CameraPosition::Front);
        let controls = provider.controls();
        let (mut session, delegate) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        session.apply(ConfigChange::ZoomFactor(6.0)).unwrap();

        let err = session
            .set_camera_position(CameraPosition::Front)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ControlError::Setup(SetupError::NoDevice(CameraPosition::Front))
        );
        assert!(session.state().is_running());
        let attrs = session.attributes();
        assert_eq!(attrs.camera_position, CameraPosition::Back);
        assert_relative_eq!(attrs.zoom_factor, 6.0);
        assert!(attrs.error.is_some());
        assert_eq!(delegate.errors.lock().len(), 1);
        assert_eq!(controls.live_devices(), 1);
    }

    #[tokio::test]
    async fn failed_restore_fails_session() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        let (mut session, _) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        // both the switch and the restore fail
        controls.fail_next(MockOperation::Acquire);
        controls.fail_next(MockOperation::Acquire);

        session
            .set_camera_position(CameraPosition::Front)
            .await
            .unwrap_err();

        assert!(session.state().is_failed());
        assert_eq!(controls.live_devices(), 0);
    }

    #[tokio::test]
    async fn same_position_is_a_noop() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        let (mut session, _) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        controls.clear_events();

        session
            .set_camera_position(CameraPosition::Back)
            .await
            .unwrap();

        assert!(controls.events().is_empty());
    }

    #[tokio::test]
    async fn position_switch_blocked_while_recording() {
        let (mut session, _) = running(CameraConfiguration {
            output_type: OutputType::Video,
            ..Default::default()
        })
        .await;
        session.capture_output().unwrap();

        let err = session
            .set_camera_position(CameraPosition::Front)
            .await
            .unwrap_err();

        assert_eq!(err, ControlError::RecordingInProgress);
        assert!(session.attributes().is_recording);
    }

    #[tokio::test]
    async fn orientation_ignored_until_ready() {
        let (mut session, _) = session_with(MockProvider::new(), CameraConfiguration::default());

        session.handle_orientation(DeviceOrientation::LandscapeLeft);
        assert_eq!(
            session.attributes().device_orientation,
            DeviceOrientation::Portrait
        );

        session.setup().await.unwrap();
        session.handle_orientation(DeviceOrientation::LandscapeLeft);
        assert_eq!(
            session.attributes().device_orientation,
            DeviceOrientation::LandscapeLeft
        );

        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.orientation_events, 1);
        assert_eq!(diagnostics.orientation_events_ignored, 1);
    }

    #[tokio::test]
    async fn locked_orientation_freezes_frame_orientation() {
        let (mut session, _) = running(CameraConfiguration::default()).await;
        session.apply(ConfigChange::OrientationLocked(true)).unwrap();
        let before = session.attributes().frame_orientation;

        for orientation in [
            DeviceOrientation::LandscapeLeft,
            DeviceOrientation::LandscapeRight,
            DeviceOrientation::PortraitUpsideDown,
        ] {
            session.handle_orientation(orientation);
        }

        assert_eq!(session.attributes().frame_orientation, before);
    }

    #[tokio::test]
    async fn capture_fires_raw_callback_and_accept_fires_confirmed() {
        let (mut session, delegate) = running(CameraConfiguration::default()).await;

        let outcome = session.capture_output().unwrap();
        assert!(matches!(outcome, CaptureOutcome::Captured(ref m) if m.is_image()));
        assert_eq!(delegate.captured.lock().len(), 1);
        assert!(delegate.confirmed.lock().is_empty());

        let confirmed = session.accept().unwrap();
        assert!(confirmed.is_image());
        assert_eq!(delegate.captured.lock().len(), 1);
        assert_eq!(delegate.confirmed.lock().len(), 1);
        assert!(!session.attributes().has_pending_media());
    }

    #[tokio::test]
    async fn capture_requires_running() {
        let (mut session, _) = running(CameraConfiguration::default()).await;
        session.stop().unwrap();

        assert_eq!(session.capture_output(), Err(ControlError::NotReady));
    }

    #[tokio::test]
    async fn capture_failure_notifies_delegate() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        let (mut session, delegate) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        controls.fail_next(MockOperation::CapturePhoto);

        let err = session.capture_output().unwrap_err();

        assert!(matches!(err, ControlError::Device(DeviceError::CaptureFailed(_))));
        assert!(session.attributes().captured_media.is_none());
        assert_eq!(delegate.errors.lock().len(), 1);
        assert!(delegate.captured.lock().is_empty());
    }

    #[tokio::test]
    async fn retake_resets_to_running() {
        let (mut session, _) = running(CameraConfiguration::default()).await;
        session.capture_output().unwrap();
        session.stop().unwrap();

        session.retake().await.unwrap();

        assert!(session.state().is_running());
        assert!(session.attributes().captured_media.is_none());
        assert!(session.attributes().captured_processed_media.is_none());
        assert_eq!(session.diagnostics().setups, 2);
    }

    #[tokio::test]
    async fn retake_while_recording_abandons_recording() {
        let (mut session, _) = running(CameraConfiguration {
            output_type: OutputType::Video,
            ..Default::default()
        })
        .await;
        session.capture_output().unwrap();

        session.retake().await.unwrap();

        assert!(!session.attributes().is_recording);
        assert_eq!(
            session.capture_output().unwrap(),
            CaptureOutcome::RecordingStarted
        );
    }

    #[tokio::test]
    async fn resolution_change_refits_into_new_bounds() {
        let provider = MockProvider::new().with_spec(
            MockSpec::back().with_frame_rate(Resolution::Hd1280x720, Bounds::new(1, 24)),
        );
        let (mut session, _) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();

        session
            .apply(ConfigChange::Resolution(Resolution::Hd1280x720))
            .unwrap();

        assert_eq!(session.attributes().resolution, Resolution::Hd1280x720);
        assert_eq!(session.attributes().frame_rate, 24);
        assert_eq!(session.diagnostics().values_clamped, 1);
    }

    #[tokio::test]
    async fn device_failure_on_apply_notifies_delegate() {
        let provider = MockProvider::new();
        let controls = provider.controls();
        let (mut session, delegate) = session_with(provider, CameraConfiguration::default());
        session.setup().await.unwrap();
        controls.fail_next(MockOperation::Hdr);

        let err = session.apply(ConfigChange::HdrMode(HdrMode::On)).unwrap_err();

        assert!(matches!(err, ControlError::Device(_)));
        assert_eq!(session.attributes().hdr_mode, HdrMode::Off);
        assert_eq!(delegate.errors.lock().len(), 1);

        // validation failures are not reported
        session.apply(ConfigChange::FrameRate(0)).unwrap_err();
        assert_eq!(delegate.errors.lock().len(), 1);
    }

    #[tokio::test]
    async fn lists_provider_devices() {
        let (session, _) = session_with(
            MockProvider::new().without(CameraPosition::Front),
            CameraConfiguration::default(),
        );

        let devices = session.available_devices();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].position, CameraPosition::Back);
    }
}
