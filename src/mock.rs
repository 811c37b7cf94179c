//! Mock device implementation for testing without hardware.

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};
use crate::traits::{
    CameraDevice, CapturePort, DeviceCapabilities, Format, FourCC, FrameMetadata,
};

/// Mock device replaying a scripted sequence of frames.
///
/// Every call is counted so tests can assert on the exact interaction.
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    frames: VecDeque<Vec<u8>>,
    sequence: u32,
    recording: Option<PathBuf>,
    closed: bool,
    allocations: Cell<usize>,
    fail_allocation_at: Option<usize>,
    fail_start_recording: bool,
    fail_stop_recording: bool,
    /// Paths passed to successful `start_recording` calls.
    pub recordings: Vec<PathBuf>,
    /// Ports used by each successful capture.
    pub captures: Vec<CapturePort>,
    /// Number of `stop_recording` calls that stopped an active recording.
    pub stop_calls: usize,
    /// Number of `close` calls.
    pub close_calls: usize,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with a small BGR format and no frames.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Camera".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::new(64, 48, FourCC::BGR3),
            frames: VecDeque::new(),
            sequence: 0,
            recording: None,
            closed: false,
            allocations: Cell::new(0),
            fail_allocation_at: None,
            fail_start_recording: false,
            fail_stop_recording: false,
            recordings: Vec::new(),
            captures: Vec::new(),
            stop_calls: 0,
            close_calls: 0,
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Queue frames generated from `patterns`, in order.
    #[must_use]
    pub fn with_patterns(mut self, patterns: &[TestPattern]) -> Self {
        for pattern in patterns {
            self.push_pattern(*pattern);
        }
        self
    }

    /// Fail the `n`th buffer allocation (0-based).
    #[must_use]
    pub fn fail_allocation_at(mut self, n: usize) -> Self {
        self.fail_allocation_at = Some(n);
        self
    }

    /// Make `start_recording` fail.
    #[must_use]
    pub fn fail_start_recording(mut self) -> Self {
        self.fail_start_recording = true;
        self
    }

    /// Make `stop_recording` fail (the device still ends up idle).
    #[must_use]
    pub fn fail_stop_recording(mut self) -> Self {
        self.fail_stop_recording = true;
        self
    }

    /// Queue one frame generated from `pattern`.
    pub fn push_pattern(&mut self, pattern: TestPattern) {
        let frame = generate_test_frame(&self.format, pattern);
        self.frames.push_back(frame);
    }

    /// Number of frames still queued.
    pub fn remaining_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of buffer allocations attempted.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Whether `close` has been called.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CameraDevice for MockDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> &Format {
        &self.format
    }

    fn frame_rate(&self) -> u32 {
        30
    }

    fn allocate_buffer(&self) -> Result<FrameBuffer> {
        let n = self.allocations.get();
        self.allocations.set(n + 1);
        if self.fail_allocation_at == Some(n) {
            return Err(Error::Allocation {
                bytes: self.format.size as usize,
            });
        }
        FrameBuffer::allocate(&self.format)
    }

    fn capture(&mut self, buffer: &mut FrameBuffer, port: CapturePort) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState("device closed"));
        }
        if !buffer.is_empty() {
            return Err(Error::BufferNotTruncated);
        }

        let data = self
            .frames
            .pop_front()
            .ok_or_else(|| Error::Capture("frame script exhausted".to_owned()))?;

        let seq = self.sequence;
        self.sequence += 1;

        buffer.fill(
            &data,
            FrameMetadata {
                sequence: seq,
                timestamp: Duration::from_millis(u64::from(seq) * 33), // ~30fps
                bytes_used: self.format.size,
            },
        )?;
        self.captures.push(port);
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.recording.is_some() {
            return Ok(());
        }
        if self.fail_start_recording {
            return Err(Error::RecordingIo {
                path: path.to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.recording = Some(path.to_path_buf());
        self.recordings.push(path.to_path_buf());
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let Some(path) = self.recording.take() else {
            return Ok(());
        };
        self.stop_calls += 1;
        if self.fail_stop_recording {
            return Err(Error::RecordingIo {
                path,
                source: std::io::Error::other("flush failed"),
            });
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.closed = true;
        Ok(())
    }
}

/// Test pattern types for mock frame generation.
///
/// Levels are neutral grey so the grayscale value equals the level.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Uniform frame at the given level.
    Solid(u8),
    /// Uniform background with a square block at a different level.
    Block {
        /// Background level.
        background: u8,
        /// Block level.
        level: u8,
        /// Left edge of the block.
        x: u32,
        /// Top edge of the block.
        y: u32,
        /// Side length of the block.
        size: u32,
    },
}

impl TestPattern {
    fn level_at(self, x: u32, y: u32) -> u8 {
        match self {
            Self::Solid(level) => level,
            Self::Block {
                background,
                level,
                x: x0,
                y: y0,
                size,
            } => {
                if (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y) {
                    level
                } else {
                    background
                }
            }
        }
    }
}

/// Generate test frame data based on pattern.
fn generate_test_frame(format: &Format, pattern: TestPattern) -> Vec<u8> {
    let mut data = Vec::with_capacity(format.size as usize);

    for y in 0..format.height {
        for x in 0..format.width {
            let level = pattern.level_at(x, y);
            match format.fourcc {
                FourCC::YUYV => {
                    // Y then alternating neutral U/V
                    data.push(level);
                    data.push(128);
                }
                _ => data.extend_from_slice(&[level, level, level]),
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert_eq!(device.format().fourcc, FourCC::BGR3);
    }

    #[test]
    fn test_mock_capture_sequence() {
        let mut device =
            MockDevice::new().with_patterns(&[TestPattern::Solid(1), TestPattern::Solid(2)]);
        let mut buffer = device.allocate_buffer().expect("allocate should succeed");

        device.capture(&mut buffer, CapturePort::Video).expect("first capture");
        assert_eq!(buffer.metadata().map(|m| m.sequence), Some(0));
        assert_eq!(buffer.data().first(), Some(&1));

        buffer.truncate();
        device.capture(&mut buffer, CapturePort::Video).expect("second capture");
        assert_eq!(buffer.metadata().map(|m| m.sequence), Some(1));

        buffer.truncate();
        let err = device.capture(&mut buffer, CapturePort::Video).expect_err("exhausted");
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn test_block_pattern() {
        let format = Format::new(8, 8, FourCC::BGR3);
        let pattern = TestPattern::Block {
            background: 10,
            level: 200,
            x: 2,
            y: 2,
            size: 3,
        };
        let data = generate_test_frame(&format, pattern);
        assert_eq!(data.len(), 8 * 8 * 3);
        assert_eq!(data.first(), Some(&10));
        // pixel (3, 3)
        assert_eq!(data.get((3 * 8 + 3) * 3), Some(&200));
    }

    #[test]
    fn test_yuyv_pattern() {
        let format = Format::new(4, 2, FourCC::YUYV);
        let data = generate_test_frame(&format, TestPattern::Solid(77));
        assert_eq!(data.len(), 16);
        assert_eq!(&data[..4], &[77, 128, 77, 128]);
    }

    #[test]
    fn test_recording_is_idempotent() {
        let mut device = MockDevice::new();
        device.stop_recording().expect("stop while idle is a no-op");
        assert_eq!(device.stop_calls, 0);

        device.start_recording(Path::new("a.bgr")).expect("start");
        device.start_recording(Path::new("b.bgr")).expect("start while recording");
        assert_eq!(device.recordings, vec![PathBuf::from("a.bgr")]);

        device.stop_recording().expect("stop");
        assert!(!device.is_recording());
        assert_eq!(device.stop_calls, 1);
    }
}
