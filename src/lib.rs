//! Pi-Cam-Motion: motion-triggered video recording for V4L2 cameras
//!
//! Detection uses three-frame differencing: the per-pixel differences of two
//! consecutive frame pairs are ANDed, binarized and median filtered, and any
//! surviving pixel counts as motion. A [`RecordingController`] starts a
//! recording when motion appears and stops it when motion ends.
//!
//! The camera sits behind the [`CameraDevice`] trait so the detection and
//! recording logic can run against a synthetic frame source.

pub mod buffer;
pub mod config;
pub mod controller;
pub mod detector;
pub mod device;
pub mod error;
pub mod feed;
pub mod recording;
pub mod session;
pub mod traits;
pub mod vision;

#[cfg(test)]
pub mod mock;

pub use buffer::FrameBuffer;
pub use config::{CameraConfig, ControllerConfig, DetectionConfig};
pub use controller::{RecordingController, RecordingState, Transition};
pub use detector::{DetectionAlgorithm, MotionDetector};
pub use device::V4L2Device;
pub use error::{Error, Result};
pub use session::{AlgorithmKind, DetectionSession};
pub use traits::{CameraDevice, CapturePort, DeviceCapabilities, Format, FourCC, FrameMetadata};
