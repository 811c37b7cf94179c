//! Hand-off between a camera's capture thread and its consumers.
//!
//! The capture thread publishes every frame the driver delivers. While a
//! recorder is attached each published frame is appended to it, so the
//! recording stays continuous no matter how slowly frames are consumed.
//! Consumers only ever see the newest frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::recording::Recorder;
use crate::traits::FrameMetadata;

/// One frame copied out of the driver's buffer.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Frame bytes.
    pub data: Vec<u8>,
    /// Driver metadata for the frame.
    pub metadata: FrameMetadata,
}

#[derive(Default)]
struct FeedState {
    latest: Option<CapturedFrame>,
    // frames published so far; the latest frame has this serial
    published: u64,
    recorder: Option<Recorder>,
    failure: Option<Error>,
    closed: bool,
}

/// Newest-frame slot plus the active recorder, shared with a producer thread.
#[derive(Default)]
pub struct FrameFeed {
    state: Mutex<FeedState>,
    frame_ready: Condvar,
    stop_requested: AtomicBool,
}

impl FrameFeed {
    /// Create an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a frame, appending it to the recorder first.
    ///
    /// Returns the storage of the replaced frame so the producer can reuse
    /// it. A recorder write failure is returned and the frame is dropped.
    pub fn publish(&self, frame: CapturedFrame) -> Result<Vec<u8>> {
        let mut state = self.lock();
        if let Some(recorder) = state.recorder.as_mut() {
            recorder.write_frame(&frame.data)?;
        }
        state.published += 1;
        let replaced = state.latest.replace(frame).map(|old| old.data);
        drop(state);
        self.frame_ready.notify_all();
        Ok(replaced.unwrap_or_default())
    }

    /// Mark the producer as finished, optionally with the error that ended it.
    pub fn close(&self, failure: Option<Error>) {
        let mut state = self.lock();
        state.closed = true;
        if state.failure.is_none() {
            state.failure = failure;
        }
        drop(state);
        self.frame_ready.notify_all();
    }

    /// Ask the producer to stop after its current frame.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Whether [`request_stop`](Self::request_stop) was called.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Serial of the newest published frame, 0 before the first one.
    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Wait for a frame newer than serial `after` and hand the newest one to
    /// `consume`.
    ///
    /// Returns the serial of the consumed frame. A producer failure is
    /// reported once; afterwards a closed feed yields `InvalidState`.
    pub fn wait_newer<F>(&self, after: u64, consume: F) -> Result<u64>
    where
        F: FnOnce(&CapturedFrame) -> Result<()>,
    {
        let mut state = self.lock();
        loop {
            if let Some(err) = state.failure.take() {
                return Err(err);
            }
            if state.published > after {
                if let Some(frame) = state.latest.as_ref() {
                    consume(frame)?;
                    return Ok(state.published);
                }
            }
            if state.closed {
                return Err(Error::InvalidState("capture stopped"));
            }
            state = self
                .frame_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Attach a recorder; every frame published from now on is written to it.
    pub fn attach_recorder(&self, recorder: Recorder) {
        self.lock().recorder = Some(recorder);
    }

    /// Detach the active recorder, if any.
    pub fn detach_recorder(&self) -> Option<Recorder> {
        self.lock().recorder.take()
    }

    /// Whether a recorder is attached.
    pub fn is_recording(&self) -> bool {
        self.lock().recorder.is_some()
    }
}
