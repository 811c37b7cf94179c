//! Error type shared by the camera, detection and recording layers.

use std::path::PathBuf;

use thiserror::Error;

use crate::traits::Format;

/// Error type for capture, detection and recording operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to open the camera device.
    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),
    /// Requested format is not supported by the device.
    #[error("Format not supported: {0:?}")]
    FormatNotSupported(Format),
    /// A frame buffer could not be allocated.
    #[error("Failed to allocate {bytes} byte frame buffer")]
    Allocation {
        /// Requested buffer size.
        bytes: usize,
    },
    /// Detection was used before an algorithm was selected.
    #[error("No detection algorithm selected")]
    NotConfigured,
    /// Operation is not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),
    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Frame capture failed.
    #[error("Capture failed: {0}")]
    Capture(String),
    /// Capture target still holds the previous frame.
    #[error("Frame buffer must be truncated before reuse")]
    BufferNotTruncated,
    /// Capture target was allocated for a different format.
    #[error("Frame buffer format {buffer:?} does not match device format {device:?}")]
    FormatMismatch {
        /// Format the buffer was allocated for.
        buffer: Format,
        /// Format the device delivers.
        device: Format,
    },
    /// Image processing failed (dimension mismatch, undecodable frame).
    #[error("Vision error: {0}")]
    Vision(String),
    /// Recording could not be started or stopped.
    #[error("Recording to {path} failed: {source}")]
    RecordingIo {
        /// Output file of the recording.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for capture, detection and recording operations.
pub type Result<T> = std::result::Result<T, Error>;
