//! Motion detection algorithms.
//!
//! [`MotionDetector`] implements three-frame differencing: a pixel only
//! counts as moving when it changed between both consecutive frame pairs,
//! which rejects single-frame sensor noise while still catching sustained
//! motion.

use log::debug;

use crate::buffer::FrameBuffer;
use crate::config::DetectionConfig;
use crate::error::{Error, Result};
use crate::traits::{CameraDevice, CapturePort};
use crate::vision;

/// A motion detection algorithm driven by a [`DetectionSession`].
///
/// The camera is passed to every call instead of being stored, so the
/// controller keeps sole ownership of the device.
///
/// [`DetectionSession`]: crate::session::DetectionSession
pub trait DetectionAlgorithm<C: CameraDevice + ?Sized> {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Acquire the resources needed by [`detect`](Self::detect).
    fn initialize(&mut self, camera: &C) -> Result<()>;

    /// Run one detection cycle.
    fn detect(&mut self, camera: &mut C) -> Result<bool>;

    /// Release everything acquired by `initialize`. Safe to call when
    /// `initialize` failed or never ran.
    fn finalize(&mut self);
}

/// Frame subtraction motion detector owning three rotating capture buffers.
pub struct MotionDetector {
    config: DetectionConfig,
    frames: Option<[FrameBuffer; 3]>,
    last_score: Option<u64>,
}

impl MotionDetector {
    /// Identifier used to select this algorithm.
    pub const NAME: &'static str = "frame subtraction";

    /// Create an uninitialized detector.
    #[must_use]
    pub const fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            frames: None,
            last_score: None,
        }
    }

    /// Whether the capture buffers are currently allocated.
    pub const fn is_initialized(&self) -> bool {
        self.frames.is_some()
    }

    /// Filtered pixel sum from the most recent detection cycle.
    pub const fn last_score(&self) -> Option<u64> {
        self.last_score
    }

    /// Score three captured frames, oldest first.
    ///
    /// Returns the pixel sum of the filtered binary motion mask.
    pub fn score(&self, frames: &[FrameBuffer; 3]) -> Result<u64> {
        let [first, second, third] = frames;
        let gray1 = vision::to_grayscale(first)?;
        let gray2 = vision::to_grayscale(second)?;
        let gray3 = vision::to_grayscale(third)?;

        let diff_a = vision::abs_diff(&gray1, &gray2)?;
        let diff_b = vision::abs_diff(&gray2, &gray3)?;
        let combined = vision::bitwise_and(&diff_a, &diff_b)?;

        let binary = vision::threshold(
            &combined,
            self.config.binarize_threshold,
            self.config.pixel_max,
        );
        let filtered = vision::median_filter(&binary, self.config.median_kernel)?;

        Ok(vision::sum(&filtered))
    }

    fn capture_and_score<C: CameraDevice + ?Sized>(
        &self,
        frames: &mut [FrameBuffer; 3],
        camera: &mut C,
    ) -> Result<u64> {
        // strictly sequential: frames[0] is the oldest
        for frame in frames.iter_mut() {
            camera.capture(frame, CapturePort::Video)?;
        }
        self.score(frames)
    }
}

impl<C: CameraDevice + ?Sized> DetectionAlgorithm<C> for MotionDetector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(&mut self, camera: &C) -> Result<()> {
        if self.frames.is_some() {
            return Err(Error::InvalidState("detector already initialized"));
        }
        self.config.validate()?;

        // a failed allocation drops the buffers allocated before it
        let frames = [
            camera.allocate_buffer()?,
            camera.allocate_buffer()?,
            camera.allocate_buffer()?,
        ];
        self.frames = Some(frames);
        Ok(())
    }

    fn detect(&mut self, camera: &mut C) -> Result<bool> {
        let mut frames = self
            .frames
            .take()
            .ok_or(Error::InvalidState("detector not initialized"))?;

        let result = self.capture_and_score(&mut frames, camera);

        for frame in &mut frames {
            frame.truncate();
        }
        self.frames = Some(frames);

        let score = result?;
        self.last_score = Some(score);

        let detected = score > self.config.motion_threshold;
        debug!("frame subtraction score {score}: detected={detected}");
        Ok(detected)
    }

    fn finalize(&mut self) {
        self.frames = None;
        self.last_score = None;
    }
}
