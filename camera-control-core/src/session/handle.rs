use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::control::capture::CaptureOutcome;
use crate::models::attributes::{
    AttributeSnapshot, CameraFilter, CameraPosition, ExposureMode, FlashMode, HdrMode, LightMode,
    OutputType, Resolution,
};
use crate::models::capabilities::DeviceInfo;
use crate::models::diagnostics::ControlDiagnostics;
use crate::models::error::ControlError;
use crate::models::media::MediaResult;
use crate::models::orientation::DeviceOrientation;
use crate::models::state::LifecycleState;
use crate::session::camera::{CameraSession, ConfigChange};
use crate::traits::device_provider::DeviceProvider;

type Reply<T> = oneshot::Sender<Result<T, ControlError>>;

enum Command {
    Setup(Reply<()>),
    Start(Reply<()>),
    Stop(Reply<()>),
    Apply(ConfigChange, Reply<()>),
    SetCameraPosition(CameraPosition, Reply<()>),
    Orientation(DeviceOrientation),
    Capture(Reply<CaptureOutcome>),
    Retake(Reply<()>),
    Accept(Reply<MediaResult>),
    SetProcessedMedia(MediaResult, Reply<()>),
    AvailableDevices(Reply<Vec<DeviceInfo>>),
    Diagnostics(Reply<ControlDiagnostics>),
    Shutdown(Reply<()>),
}

/// Reply to a queued command. Resolves to `SessionClosed` if the control
/// sequence stopped before answering.
#[must_use = "the command is queued either way; await to observe its result"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, ControlError>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, ControlError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(ControlError::SessionClosed)))
    }
}

/// Cloneable front door onto a camera session running on its own task.
///
/// Commands are queued at call time, so the order of calls is the order in
/// which they run, whichever task issued them. Readers get immutable
/// copies of the snapshot.
///
/// ```text
/// CameraHandle ─┐
/// CameraHandle ─┼→ mpsc<Command> → [control task: CameraSession] ─→ watch<AttributeSnapshot>
/// CameraHandle ─┘                                                └→ watch<LifecycleState>
/// ```
#[derive(Clone)]
pub struct CameraHandle {
    commands: mpsc::UnboundedSender<Command>,
    attributes: watch::Receiver<AttributeSnapshot>,
    state: watch::Receiver<LifecycleState>,
}

impl CameraHandle {
    /// Move `session` onto a new control task. Must be called within a
    /// tokio runtime.
    pub fn spawn<P>(session: CameraSession<P>) -> (Self, JoinHandle<()>)
    where
        P: DeviceProvider + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (attributes_tx, attributes) = watch::channel(session.attributes().clone());
        let (state_tx, state) = watch::channel(session.state().clone());

        let publisher = Publisher {
            attributes: attributes_tx,
            state: state_tx,
        };
        let task = tokio::spawn(run(session, rx, publisher));

        (
            Self {
                commands,
                attributes,
                state,
            },
            task,
        )
    }

    /// Copy of the current snapshot.
    pub fn attributes(&self) -> AttributeSnapshot {
        self.attributes.borrow().clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    /// Receiver notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<AttributeSnapshot> {
        self.attributes.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.clone()
    }

    pub fn setup(&self) -> Pending<()> {
        self.request(Command::Setup)
    }

    pub fn start(&self) -> Pending<()> {
        self.request(Command::Start)
    }

    pub fn stop(&self) -> Pending<()> {
        self.request(Command::Stop)
    }

    pub fn apply(&self, change: ConfigChange) -> Pending<()> {
        self.request(|reply| Command::Apply(change, reply))
    }

    pub fn set_output_type(&self, output_type: OutputType) -> Pending<()> {
        self.apply(ConfigChange::OutputType(output_type))
    }

    pub fn set_camera_position(&self, position: CameraPosition) -> Pending<()> {
        self.request(|reply| Command::SetCameraPosition(position, reply))
    }

    pub fn set_zoom_factor(&self, factor: f64) -> Pending<()> {
        self.apply(ConfigChange::ZoomFactor(factor))
    }

    pub fn set_flash_mode(&self, mode: FlashMode) -> Pending<()> {
        self.apply(ConfigChange::FlashMode(mode))
    }

    pub fn set_light_mode(&self, mode: LightMode) -> Pending<()> {
        self.apply(ConfigChange::LightMode(mode))
    }

    pub fn set_resolution(&self, resolution: Resolution) -> Pending<()> {
        self.apply(ConfigChange::Resolution(resolution))
    }

    pub fn set_frame_rate(&self, fps: u32) -> Pending<()> {
        self.apply(ConfigChange::FrameRate(fps))
    }

    pub fn set_exposure_duration(&self, duration: Duration) -> Pending<()> {
        self.apply(ConfigChange::ExposureDuration(duration))
    }

    pub fn set_exposure_target_bias(&self, bias: f32) -> Pending<()> {
        self.apply(ConfigChange::ExposureTargetBias(bias))
    }

    pub fn set_iso(&self, iso: f32) -> Pending<()> {
        self.apply(ConfigChange::Iso(iso))
    }

    pub fn set_exposure_mode(&self, mode: ExposureMode) -> Pending<()> {
        self.apply(ConfigChange::ExposureMode(mode))
    }

    pub fn set_hdr_mode(&self, mode: HdrMode) -> Pending<()> {
        self.apply(ConfigChange::HdrMode(mode))
    }

    pub fn set_camera_filters(&self, filters: Vec<CameraFilter>) -> Pending<()> {
        self.apply(ConfigChange::CameraFilters(filters))
    }

    pub fn set_mirror_output(&self, mirror: bool) -> Pending<()> {
        self.apply(ConfigChange::MirrorOutput(mirror))
    }

    pub fn set_grid_visibility(&self, visible: bool) -> Pending<()> {
        self.apply(ConfigChange::GridVisibility(visible))
    }

    pub fn set_orientation_locked(&self, locked: bool) -> Pending<()> {
        self.apply(ConfigChange::OrientationLocked(locked))
    }

    pub fn observe_screen_rotation_blocked(&self, blocked: bool) -> Pending<()> {
        self.apply(ConfigChange::ScreenRotationBlocked(blocked))
    }

    /// Queue a physical rotation event. Never fails and has no reply.
    pub fn handle_orientation(&self, orientation: DeviceOrientation) {
        if self.commands.send(Command::Orientation(orientation)).is_err() {
            log::debug!("orientation {orientation:?} dropped, control sequence closed");
        }
    }

    pub fn capture_output(&self) -> Pending<CaptureOutcome> {
        self.request(Command::Capture)
    }

    pub fn retake(&self) -> Pending<()> {
        self.request(Command::Retake)
    }

    pub fn accept(&self) -> Pending<MediaResult> {
        self.request(Command::Accept)
    }

    pub fn set_processed_media(&self, media: MediaResult) -> Pending<()> {
        self.request(|reply| Command::SetProcessedMedia(media, reply))
    }

    pub fn available_devices(&self) -> Pending<Vec<DeviceInfo>> {
        self.request(Command::AvailableDevices)
    }

    pub fn diagnostics(&self) -> Pending<ControlDiagnostics> {
        self.request(Command::Diagnostics)
    }

    /// Release the device and stop the control task. Commands queued
    /// earlier still run; later ones resolve to `SessionClosed`.
    pub fn shutdown(&self) -> Pending<()> {
        self.request(Command::Shutdown)
    }

    fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Pending<T> {
        let (reply, rx) = oneshot::channel();
        // A closed queue drops the reply sender, which resolves `rx`.
        let _ = self.commands.send(command(reply));
        Pending { rx }
    }
}

struct Publisher {
    attributes: watch::Sender<AttributeSnapshot>,
    state: watch::Sender<LifecycleState>,
}

impl Publisher {
    fn publish<P: DeviceProvider>(&self, session: &CameraSession<P>) {
        self.attributes.send_if_modified(|current| {
            if current == session.attributes() {
                return false;
            }
            *current = session.attributes().clone();
            true
        });
        self.state.send_if_modified(|current| {
            if current == session.state() {
                return false;
            }
            *current = session.state().clone();
            true
        });
    }

    /// Publish before replying so a caller that awaited the reply reads
    /// the updated snapshot.
    fn respond<P: DeviceProvider, T>(
        &self,
        session: &CameraSession<P>,
        reply: Reply<T>,
        result: Result<T, ControlError>,
    ) {
        self.publish(session);
        let _ = reply.send(result);
    }
}

async fn run<P: DeviceProvider>(
    mut session: CameraSession<P>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    publisher: Publisher,
) {
    log::debug!("camera control sequence started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Setup(reply) => {
                let result = session.setup().await;
                publisher.respond(&session, reply, result);
            }
            Command::Start(reply) => {
                let result = session.start();
                publisher.respond(&session, reply, result);
            }
            Command::Stop(reply) => {
                let result = session.stop();
                publisher.respond(&session, reply, result);
            }
            Command::Apply(change, reply) => {
                let result = session.apply(change);
                publisher.respond(&session, reply, result);
            }
            Command::SetCameraPosition(position, reply) => {
                let result = session.set_camera_position(position).await;
                publisher.respond(&session, reply, result);
            }
            Command::Orientation(orientation) => {
                session.handle_orientation(orientation);
                publisher.publish(&session);
            }
            Command::Capture(reply) => {
                let result = session.capture_output();
                publisher.respond(&session, reply, result);
            }
            Command::Retake(reply) => {
                let result = session.retake().await;
                publisher.respond(&session, reply, result);
            }
            Command::Accept(reply) => {
                let result = session.accept();
                publisher.respond(&session, reply, result);
            }
            Command::SetProcessedMedia(media, reply) => {
                let result = session.set_processed_media(media);
                publisher.respond(&session, reply, result);
            }
            Command::AvailableDevices(reply) => {
                let _ = reply.send(Ok(session.available_devices()));
            }
            Command::Diagnostics(reply) => {
                let _ = reply.send(Ok(session.diagnostics()));
            }
            Command::Shutdown(reply) => {
                commands.close();
                session.teardown();
                publisher.respond(&session, reply, Ok(()));
                break;
            }
        }
    }

    session.teardown();
    log::debug!("camera control sequence stopped");
}
