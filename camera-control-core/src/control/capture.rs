use crate::control::controller::DeviceController;
use crate::models::attributes::{FlashMode, OutputType};
use crate::models::error::ControlError;
use crate::models::media::{MediaMetadata, MediaResult};
use crate::traits::capture_device::{CaptureDevice, PhotoSettings, RecordingSettings};

/// What a shutter press did.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// A previous result is awaiting retake or accept; nothing happened.
    MediaPending,
    /// Video recording began; the next capture stops it.
    RecordingStarted,
    /// A photo was taken or a recording finished.
    Captured(MediaResult),
}

/// Turns shutter presses into media results stored in the snapshot.
///
/// Photo output is a single-shot trigger; video output toggles between
/// starting and stopping a recording.
#[derive(Debug, Clone)]
pub struct CaptureOutputPipeline {
    include_audio: bool,
}

impl CaptureOutputPipeline {
    pub fn new(include_audio: bool) -> Self {
        Self { include_audio }
    }

    pub fn capture_output<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
    ) -> Result<CaptureOutcome, ControlError> {
        let attrs = controller.attributes();
        if attrs.has_pending_media() {
            return Ok(CaptureOutcome::MediaPending);
        }
        if !controller.is_bound() {
            return Err(ControlError::NotReady);
        }

        let (recording, output_type) = (attrs.is_recording, attrs.output_type);
        if recording {
            return self.finish_recording(controller).map(CaptureOutcome::Captured);
        }
        match output_type {
            OutputType::Photo => self.take_photo(controller).map(CaptureOutcome::Captured),
            OutputType::Video => self
                .start_recording(controller)
                .map(|()| CaptureOutcome::RecordingStarted),
        }
    }

    /// Clear the pending result and its processed variant.
    pub fn discard<D: CaptureDevice>(&self, controller: &mut DeviceController<D>) {
        let attrs = controller.attributes_mut();
        attrs.captured_media = None;
        attrs.captured_processed_media = None;
    }

    /// Attach the caller's processed variant of the pending result.
    pub fn attach_processed<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
        media: MediaResult,
    ) -> Result<(), ControlError> {
        if !controller.attributes().has_pending_media() {
            return Err(ControlError::NoPendingMedia);
        }
        controller.attributes_mut().captured_processed_media = Some(media);
        controller.succeeded();
        Ok(())
    }

    /// Take the pending result out of the snapshot, preferring the
    /// processed variant.
    pub fn accept<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
    ) -> Result<MediaResult, ControlError> {
        let attrs = controller.attributes_mut();
        let raw = attrs.captured_media.take().ok_or(ControlError::NoPendingMedia)?;
        let confirmed = attrs.captured_processed_media.take().unwrap_or(raw);
        controller.succeeded();
        Ok(confirmed)
    }

    fn take_photo<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
    ) -> Result<MediaResult, ControlError> {
        let attrs = controller.attributes();
        let mut settings = PhotoSettings {
            flash_mode: attrs.flash_mode,
            hdr_mode: attrs.hdr_mode,
        };

        let Some(device) = controller.device_mut() else {
            return Err(ControlError::NotReady);
        };
        if !device.bounds().has_flash {
            settings.flash_mode = FlashMode::Off;
        }
        let raw = match device.capture_photo(&settings) {
            Ok(raw) => raw,
            Err(err) => return Err(controller.fail(err)),
        };

        log::debug!("captured {}x{} {} image", raw.width, raw.height, raw.pixel_format);
        let metadata = MediaMetadata::from_attributes(controller.attributes());
        let media = MediaResult::image(metadata, raw);
        controller.attributes_mut().captured_media = Some(media.clone());
        controller.diagnostics_mut().photos_captured += 1;
        controller.succeeded();
        Ok(media)
    }

    fn start_recording<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
    ) -> Result<(), ControlError> {
        let attrs = controller.attributes();
        let settings = RecordingSettings {
            resolution: attrs.resolution,
            frame_rate: attrs.frame_rate,
            include_audio: self.include_audio,
        };

        let Some(device) = controller.device_mut() else {
            return Err(ControlError::NotReady);
        };
        if let Err(err) = device.start_recording(&settings) {
            return Err(controller.fail(err));
        }

        log::debug!(
            "recording started at {:?}, {} fps",
            settings.resolution,
            settings.frame_rate
        );
        controller.attributes_mut().is_recording = true;
        controller.succeeded();
        Ok(())
    }

    fn finish_recording<D: CaptureDevice>(
        &self,
        controller: &mut DeviceController<D>,
    ) -> Result<MediaResult, ControlError> {
        let Some(device) = controller.device_mut() else {
            return Err(ControlError::NotReady);
        };
        let result = device.stop_recording();
        controller.attributes_mut().is_recording = false;
        let recording = match result {
            Ok(recording) => recording,
            Err(err) => return Err(controller.fail(err)),
        };

        log::debug!(
            "recording stopped: {} frames in {:?}",
            recording.frame_count,
            recording.duration
        );
        let metadata = MediaMetadata::from_attributes(controller.attributes());
        let media = MediaResult::video(metadata, recording);
        controller.attributes_mut().captured_media = Some(media.clone());
        controller.diagnostics_mut().videos_recorded += 1;
        controller.succeeded();
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockControls, MockDevice, MockOperation, MockSpec};
    use crate::models::attributes::AttributeSnapshot;
    use crate::models::error::{CameraError, DeviceError};
    use crate::models::media::RawImage;

    fn bound(spec: MockSpec, output_type: OutputType) -> (DeviceController<MockDevice>, MockControls) {
        let controls = MockControls::default();
        let mut controller = DeviceController::new(AttributeSnapshot {
            output_type,
            ..AttributeSnapshot::default()
        });
        controller
            .bind(MockDevice::new(spec, controls.clone()))
            .unwrap();
        (controller, controls)
    }

    #[test]
    fn photo_produces_one_image() {
        let (mut controller, _) = bound(MockSpec::back(), OutputType::Photo);
        let pipeline = CaptureOutputPipeline::new(true);

        let outcome = pipeline.capture_output(&mut controller).unwrap();

        let CaptureOutcome::Captured(media) = outcome else {
            panic!("expected a captured image");
        };
        let image = media.as_image().unwrap();
        assert_eq!((image.width, image.height), (1920, 1080));
        assert_eq!(controller.attributes().captured_media, Some(media));
        assert_eq!(controller.diagnostics().photos_captured, 1);
    }

    #[test]
    fn pending_media_makes_capture_a_noop() {
        let (mut controller, controls) = bound(MockSpec::back(), OutputType::Photo);
        let pipeline = CaptureOutputPipeline::new(true);
        pipeline.capture_output(&mut controller).unwrap();
        let before = controller.attributes().clone();
        controls.clear_events();

        let outcome = pipeline.capture_output(&mut controller).unwrap();

        assert_eq!(outcome, CaptureOutcome::MediaPending);
        assert_eq!(controller.attributes(), &before);
        assert!(controls.events().is_empty());
    }

    #[test]
    fn video_toggles_between_start_and_stop() {
        let (mut controller, _) = bound(MockSpec::back(), OutputType::Video);
        let pipeline = CaptureOutputPipeline::new(false);

        let first = pipeline.capture_output(&mut controller).unwrap();
        assert_eq!(first, CaptureOutcome::RecordingStarted);
        assert!(controller.attributes().is_recording);
        assert!(controller.device().unwrap().is_recording());
        assert!(controller.attributes().captured_media.is_none());

        let second = pipeline.capture_output(&mut controller).unwrap();
        let CaptureOutcome::Captured(media) = second else {
            panic!("expected a finished recording");
        };
        let video = media.as_video().unwrap();
        assert!(!video.has_audio);
        assert_eq!(video.frame_count, 30);
        assert!(!controller.attributes().is_recording);
        assert!(!controller.device().unwrap().is_recording());
        assert_eq!(controller.diagnostics().videos_recorded, 1);
    }

    #[test]
    fn capture_while_recording_stops_even_in_photo_mode() {
        let (mut controller, _) = bound(MockSpec::back(), OutputType::Video);
        let pipeline = CaptureOutputPipeline::new(true);
        pipeline.capture_output(&mut controller).unwrap();
        controller.set_output_type(OutputType::Photo);

        let outcome = pipeline.capture_output(&mut controller).unwrap();

        assert!(matches!(outcome, CaptureOutcome::Captured(ref m) if m.is_video()));
    }

    #[test]
    fn capture_failure_records_error_and_no_media() {
        let (mut controller, controls) = bound(MockSpec::back(), OutputType::Photo);
        controls.fail_next(MockOperation::CapturePhoto);
        let pipeline = CaptureOutputPipeline::new(true);

        let err = pipeline.capture_output(&mut controller).unwrap_err();

        assert!(matches!(err, ControlError::Device(DeviceError::CaptureFailed(_))));
        assert!(controller.attributes().captured_media.is_none());
        assert!(matches!(controller.attributes().error, Some(CameraError::Device(_))));
    }

    #[test]
    fn failed_stop_ends_recording_state() {
        let (mut controller, controls) = bound(MockSpec::back(), OutputType::Video);
        let pipeline = CaptureOutputPipeline::new(true);
        pipeline.capture_output(&mut controller).unwrap();
        controls.fail_next(MockOperation::StopRecording);

        assert!(pipeline.capture_output(&mut controller).is_err());

        assert!(!controller.attributes().is_recording);
        assert!(controller.attributes().captured_media.is_none());
    }

    #[test]
    fn flash_is_off_without_flash_unit() {
        let (mut controller, _) = bound(MockSpec::front(), OutputType::Photo);
        controller.set_flash_mode(FlashMode::On);
        let pipeline = CaptureOutputPipeline::new(true);

        let CaptureOutcome::Captured(media) = pipeline.capture_output(&mut controller).unwrap() else {
            panic!("expected a captured image");
        };

        // mock encodes the effective flash in the third byte
        assert_eq!(media.as_image().unwrap().data[2], 0);
        assert_eq!(controller.attributes().flash_mode, FlashMode::On);
    }

    #[test]
    fn accept_prefers_processed_variant() {
        let (mut controller, _) = bound(MockSpec::back(), OutputType::Photo);
        let pipeline = CaptureOutputPipeline::new(true);
        let CaptureOutcome::Captured(raw) = pipeline.capture_output(&mut controller).unwrap() else {
            panic!("expected a captured image");
        };
        let MediaResult::Image(mut processed) = raw.clone() else {
            panic!("expected an image");
        };
        processed.data = vec![1, 2, 3];
        let processed = MediaResult::Image(processed);

        pipeline.attach_processed(&mut controller, processed.clone()).unwrap();
        let confirmed = pipeline.accept(&mut controller).unwrap();

        assert_eq!(confirmed, processed);
        assert!(controller.attributes().captured_media.is_none());
        assert!(controller.attributes().captured_processed_media.is_none());
        assert_eq!(pipeline.accept(&mut controller), Err(ControlError::NoPendingMedia));
    }

    #[test]
    fn processed_media_needs_pending_result() {
        let (mut controller, _) = bound(MockSpec::back(), OutputType::Photo);
        let pipeline = CaptureOutputPipeline::new(true);
        let media = MediaResult::image(
            MediaMetadata::from_attributes(controller.attributes()),
            RawImage {
                width: 1,
                height: 1,
                pixel_format: "MJPG".into(),
                data: vec![],
            },
        );

        assert_eq!(
            pipeline.attach_processed(&mut controller, media),
            Err(ControlError::NoPendingMedia)
        );
    }
}
