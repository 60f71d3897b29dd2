//! Background frame recorder.
//!
//! Streams frames from the device on a dedicated thread and appends them to
//! a file: concatenated JPEG frames for `MJPG` (playable as Motion JPEG), raw
//! frames for any other pixel format.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::{Device, FourCC};

use camera_control_core::models::error::DeviceError;
use camera_control_core::models::media::RecordedVideo;

const STREAM_BUFFERS: u32 = 4;
/// Longest wait for a single frame. Bounds how long `stop` can block.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(500);

/// A recording in progress.
pub struct FrameRecorder {
    location: PathBuf,
    running: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    started: Instant,
    handle: Mutex<Option<thread::JoinHandle<io::Result<()>>>>,
}

impl FrameRecorder {
    /// Open the output file in `output_dir` and start streaming into it.
    pub fn start(
        device: Arc<Device>,
        output_dir: &Path,
        fourcc: FourCC,
    ) -> Result<Self, DeviceError> {
        let extension = if fourcc == FourCC::new(b"MJPG") {
            "mjpeg"
        } else {
            "raw"
        };
        let location = output_dir.join(format!("recording_{}.{}", uuid::Uuid::new_v4(), extension));
        let file = File::create(&location).map_err(|e| {
            DeviceError::CaptureFailed(format!("cannot create {}: {}", location.display(), e))
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(AtomicU64::new(0));
        let thread_running = Arc::clone(&running);
        let thread_frames = Arc::clone(&frames);

        let handle = thread::Builder::new()
            .name("v4l2-recorder".into())
            .spawn(move || {
                let result = record_loop(&device, file, &thread_running, &thread_frames);
                if let Err(e) = &result {
                    log::error!("recording error: {}", e);
                }
                thread_running.store(false, Ordering::SeqCst);
                result
            })
            .map_err(|e| {
                DeviceError::InsufficientResources(format!("failed to spawn recorder: {}", e))
            })?;

        log::info!("recording to {}", location.display());
        Ok(Self {
            location,
            running,
            frames,
            started: Instant::now(),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Stop streaming, flush the file and describe the result.
    pub fn stop(&self) -> Result<RecordedVideo, DeviceError> {
        self.running.store(false, Ordering::SeqCst);
        let duration = self.started.elapsed();
        let joined = self.handle.lock().take().map(|handle| handle.join());

        match joined {
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(e))) => return Err(DeviceError::CaptureFailed(e.to_string())),
            Some(Err(_)) => {
                return Err(DeviceError::CaptureFailed("recorder thread panicked".into()))
            }
            None => return Err(DeviceError::CaptureFailed("recording already stopped".into())),
        }

        let frame_count = self.frames.load(Ordering::SeqCst);
        log::info!(
            "recorded {} frames in {:.1}s to {}",
            frame_count,
            duration.as_secs_f64(),
            self.location.display()
        );
        Ok(RecordedVideo {
            location: self.location.clone(),
            duration,
            frame_count,
            has_audio: false,
        })
    }
}

impl Drop for FrameRecorder {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

fn record_loop(
    device: &Device,
    file: File,
    running: &AtomicBool,
    frames: &AtomicU64,
) -> io::Result<()> {
    let mut stream = Stream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)?;
    stream.set_timeout(FRAME_TIMEOUT);
    let mut writer = BufWriter::new(file);

    while running.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(frame) => frame,
            Err(e) => {
                wait_ended(e, running.load(Ordering::SeqCst))?;
                break;
            }
        };
        // Some drivers leave bytesused at zero for fixed-size formats.
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        writer.write_all(&buf[..used])?;
        frames.fetch_add(1, Ordering::SeqCst);
    }

    writer.flush()
}

/// Classify a failed frame wait. A timeout after `stop` is a clean end;
/// a timeout while still running means the camera stalled.
///
/// The mmap stream cannot be polled again after a timed-out dequeue, so
/// every failure ends the loop.
pub(crate) fn wait_ended(err: io::Error, running: bool) -> io::Result<()> {
    match err.kind() {
        io::ErrorKind::TimedOut if !running => Ok(()),
        io::ErrorKind::TimedOut => Err(stalled()),
        _ => Err(err),
    }
}

pub(crate) fn stalled() -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("no frame within {}ms", FRAME_TIMEOUT.as_millis()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_after_stop_ends_cleanly() {
        let err = io::Error::from(io::ErrorKind::TimedOut);

        assert!(wait_ended(err, false).is_ok());
    }

    #[test]
    fn timeout_while_running_is_a_stall() {
        let err = io::Error::from(io::ErrorKind::TimedOut);

        let result = wait_ended(err, true).unwrap_err();

        assert_eq!(result.kind(), io::ErrorKind::TimedOut);
        assert!(result.to_string().contains("500ms"));
    }

    #[test]
    fn other_errors_pass_through() {
        let err = io::Error::from(io::ErrorKind::BrokenPipe);

        let result = wait_ended(err, false).unwrap_err();

        assert_eq!(result.kind(), io::ErrorKind::BrokenPipe);
    }
}
