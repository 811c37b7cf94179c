//! Core traits and types for the camera abstraction.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};

/// Pixel format representation (e.g., YUYV, MJPG, BGR3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// YUYV pixel format (4:2:2 packed).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPEG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// BGR3 pixel format (24-bit BGR).
    pub const BGR3: Self = Self::new(b"BGR3");

    /// Bytes per pixel for packed formats, `None` for compressed ones.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> Option<u32> {
        match &self.0 {
            b"YUYV" => Some(2),
            b"RGB3" | b"BGR3" => Some(3),
            _ => None,
        }
    }

    /// File extension used for recordings in this pixel format.
    #[must_use]
    pub const fn container_extension(self) -> &'static str {
        match &self.0 {
            b"YUYV" => "yuv",
            b"MJPG" => "mjpeg",
            b"RGB3" => "rgb",
            b"BGR3" => "bgr",
            _ => "raw",
        }
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl FromStr for FourCC {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidConfig(format!("FourCC must be 4 bytes, got {s:?}")))?;
        Ok(Self(code))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride), zero for compressed formats.
    pub stride: u32,
    /// Total frame size in bytes (upper bound for compressed formats).
    pub size: u32,
}

impl Format {
    /// Create a new format specification.
    ///
    /// Compressed formats get a size bound of three bytes per pixel.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let (stride, size) = match fourcc.bytes_per_pixel() {
            Some(bpp) => (width * bpp, width * bpp * height),
            None => (0, width * height * 3),
        };
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Metadata for a captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Frame sequence number.
    pub sequence: u32,
    /// Capture timestamp.
    pub timestamp: Duration,
    /// Actual bytes used in the frame buffer.
    pub bytes_used: u32,
}

/// Capture path used for a single frame grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePort {
    /// Newest frame from the continuous stream, lowest latency.
    #[default]
    Video,
    /// Waits for a frame delivered after the request.
    Still,
}

/// Abstraction over the camera: frame grabs plus continuous recording.
///
/// Resolution, pixel format and frame rate are fixed when the device is
/// constructed and shared by every capture and recording call.
pub trait CameraDevice {
    /// Get device capabilities.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Format delivered by every capture.
    fn format(&self) -> &Format;

    /// Frame rate the device was configured with.
    fn frame_rate(&self) -> u32;

    /// Allocate a capture target bound to this device's format.
    fn allocate_buffer(&self) -> Result<FrameBuffer> {
        FrameBuffer::allocate(self.format())
    }

    /// Capture one frame into `buffer`, which must be empty.
    fn capture(&mut self, buffer: &mut FrameBuffer, port: CapturePort) -> Result<()>;

    /// Start continuous recording to `path`. No-op while already recording.
    fn start_recording(&mut self, path: &Path) -> Result<()>;

    /// Stop the current recording. No-op while idle.
    fn stop_recording(&mut self) -> Result<()>;

    /// Whether a recording is in progress.
    fn is_recording(&self) -> bool;

    /// Release the device. Captures after closing fail.
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_format_sizes() {
        let yuyv = Format::new(640, 480, FourCC::YUYV);
        assert_eq!(yuyv.stride, 1280);
        assert_eq!(yuyv.size, 640 * 480 * 2);

        let bgr = Format::new(1920, 1080, FourCC::BGR3);
        assert_eq!(bgr.stride, 1920 * 3);
        assert_eq!(bgr.size, 1920 * 1080 * 3);
    }

    #[test]
    fn test_compressed_format_size_bound() {
        let mjpg = Format::new(320, 240, FourCC::MJPG);
        assert_eq!(mjpg.stride, 0);
        assert_eq!(mjpg.size, 320 * 240 * 3);
    }

    #[test]
    fn test_fourcc_parse() {
        let fourcc: FourCC = "MJPG".parse().expect("valid fourcc");
        assert_eq!(fourcc, FourCC::MJPG);
        assert_eq!(fourcc.to_string(), "MJPG");
        assert!("YUV".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_container_extension() {
        assert_eq!(FourCC::YUYV.container_extension(), "yuv");
        assert_eq!(FourCC::MJPG.container_extension(), "mjpeg");
        assert_eq!(FourCC::new(b"H264").container_extension(), "raw");
    }
}
