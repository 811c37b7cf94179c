//! Construction-time parameters for the camera, detector and controller.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::traits::{Format, FourCC};

/// Camera device settings, fixed for the lifetime of the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device index (e.g., 0 for /dev/video0).
    pub device_index: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Requested pixel format.
    pub fourcc: FourCC,
    /// Number of mmap buffers for the capture stream.
    pub buffer_count: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 1920,
            height: 1080,
            frame_rate: 30,
            fourcc: FourCC::YUYV,
            buffer_count: 4,
        }
    }
}

impl CameraConfig {
    /// Format requested from the driver.
    #[must_use]
    pub const fn format(&self) -> Format {
        Format::new(self.width, self.height, self.fourcc)
    }
}

/// Frame subtraction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionConfig {
    /// Difference level at which a pixel counts as changed.
    pub binarize_threshold: u8,
    /// Value written for changed pixels.
    pub pixel_max: u8,
    /// Side length of the median filter window. Must be odd.
    pub median_kernel: u32,
    /// Motion is reported when the filtered pixel sum exceeds this value.
    pub motion_threshold: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            binarize_threshold: 30,
            pixel_max: 255,
            median_kernel: 7,
            motion_threshold: 0,
        }
    }
}

impl DetectionConfig {
    /// Check that the parameters describe a usable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.median_kernel == 0 || self.median_kernel % 2 == 0 {
            return Err(Error::InvalidConfig(format!(
                "median_kernel must be odd and positive, got {}",
                self.median_kernel
            )));
        }
        if self.pixel_max == 0 {
            return Err(Error::InvalidConfig("pixel_max must be non-zero".to_owned()));
        }
        Ok(())
    }
}

/// Recording controller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Directory recordings are written to.
    pub output_dir: PathBuf,
    /// Name of the detection algorithm to select at startup.
    pub algorithm: String,
    /// Detection parameters handed to the session.
    pub detection: DetectionConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            algorithm: "frame subtraction".to_owned(),
            detection: DetectionConfig::default(),
        }
    }
}
