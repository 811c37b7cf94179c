//! Motion-triggered recording loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDateTime};
use log::{info, warn};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::session::DetectionSession;
use crate::traits::CameraDevice;

/// Recording state as reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No recording in progress.
    Idle,
    /// A recording is being written.
    Recording,
}

/// Outcome of one control cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Motion appeared; a new recording was started at this path.
    Started(PathBuf),
    /// Motion ended; the recording was stopped.
    Stopped,
    /// Nothing changed.
    Unchanged(RecordingState),
    /// Detection is disabled; no frames were captured.
    Skipped,
}

/// File name for a recording started at `timestamp`.
///
/// `video<YYYY-MM-DD-HHMMSS>.<ext>`, with `-<suffix>` before the extension
/// when `suffix` is non-zero.
pub fn recording_file_name(timestamp: &NaiveDateTime, extension: &str, suffix: u32) -> String {
    let stamp = timestamp.format("%Y-%m-%d-%H%M%S");
    if suffix == 0 {
        format!("video{stamp}.{extension}")
    } else {
        format!("video{stamp}-{suffix}.{extension}")
    }
}

/// First recording path in `dir` for `timestamp` that does not exist yet.
pub fn unique_recording_path(dir: &Path, timestamp: &NaiveDateTime, extension: &str) -> PathBuf {
    (0..u32::MAX)
        .map(|suffix| dir.join(recording_file_name(timestamp, extension, suffix)))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(recording_file_name(timestamp, extension, 0)))
}

/// Drives detect → start/stop recording cycles and owns cleanup.
///
/// Owns the camera and the detection session. Cleanup runs at most once,
/// either from [`run`](Self::run), an explicit [`shutdown`](Self::shutdown)
/// or on drop.
pub struct RecordingController<C: CameraDevice> {
    camera: C,
    session: DetectionSession<C>,
    config: ControllerConfig,
    closed: bool,
}

impl<C: CameraDevice> RecordingController<C> {
    /// Create a controller around an opened camera.
    pub fn new(camera: C, config: ControllerConfig) -> Self {
        let session = DetectionSession::new(config.detection.clone());
        Self {
            camera,
            session,
            config,
            closed: false,
        }
    }

    /// The camera device.
    pub const fn camera(&self) -> &C {
        &self.camera
    }

    /// The detection session.
    pub const fn session(&self) -> &DetectionSession<C> {
        &self.session
    }

    /// Mutable access to the detection session, e.g. to toggle `enabled`.
    pub fn session_mut(&mut self) -> &mut DetectionSession<C> {
        &mut self.session
    }

    /// Current recording state.
    pub fn state(&self) -> RecordingState {
        if self.camera.is_recording() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    /// Select the configured algorithm and initialize it.
    pub fn start(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("controller already shut down"));
        }
        self.session.select_algorithm(&self.config.algorithm);
        self.session.init(&self.camera)
    }

    /// Run one detection cycle and apply the result.
    pub fn step(&mut self) -> Result<Transition> {
        if !self.session.enabled {
            return Ok(Transition::Skipped);
        }
        let detected = self.session.detect(&mut self.camera)?;
        self.apply(detected)
    }

    /// Apply one detection result to the recording state.
    ///
    /// A new detection while recording does not restart the recording.
    pub fn apply(&mut self, detected: bool) -> Result<Transition> {
        match (self.state(), detected) {
            (RecordingState::Idle, true) => {
                let path = self.next_recording_path();
                self.camera.start_recording(&path)?;
                info!("start recording {}", path.display());
                Ok(Transition::Started(path))
            }
            (RecordingState::Recording, false) => {
                self.camera.stop_recording()?;
                info!("stop recording");
                Ok(Transition::Stopped)
            }
            (state, _) => Ok(Transition::Unchanged(state)),
        }
    }

    /// Run until `shutdown` is set or a cycle fails, then clean up.
    ///
    /// The flag is checked between cycles; a cycle in progress always
    /// completes. A loop error takes precedence over cleanup errors.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let outcome = self.start().and_then(|()| self.run_loop(shutdown));
        let cleanup = self.shutdown();
        outcome.and(cleanup)
    }

    fn run_loop(&mut self, shutdown: &AtomicBool) -> Result<()> {
        while !shutdown.load(Ordering::SeqCst) {
            self.step()?;
        }
        info!("shutdown requested");
        Ok(())
    }

    /// Stop any recording, finalize detection and close the camera.
    ///
    /// Every step runs even if an earlier one fails; the first failure is
    /// returned. Calls after the first are no-ops.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        if self.camera.is_recording() {
            note_failure(&mut first_error, "stop recording", self.camera.stop_recording());
        }
        // buffers are released while the camera is still open
        note_failure(&mut first_error, "finalize detection", self.session.finalize());
        note_failure(&mut first_error, "close camera", self.camera.close());
        info!("done closing");

        first_error.map_or(Ok(()), Err)
    }

    fn next_recording_path(&self) -> PathBuf {
        let extension = self.camera.format().fourcc.container_extension();
        unique_recording_path(
            &self.config.output_dir,
            &Local::now().naive_local(),
            extension,
        )
    }
}

impl<C: CameraDevice> Drop for RecordingController<C> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("cleanup on drop failed: {err}");
        }
    }
}

fn note_failure(first: &mut Option<Error>, step: &str, result: Result<()>) {
    if let Err(err) = result {
        warn!("{step} failed during cleanup: {err}");
        if first.is_none() {
            *first = Some(err);
        }
    }
}
