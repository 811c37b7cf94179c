//! V4L2 device implementation using the v4l crate.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use v4l::buffer::{Metadata, Type};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use crate::buffer::FrameBuffer;
use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::feed::{CapturedFrame, FrameFeed};
use crate::recording::Recorder;
use crate::traits::{
    CameraDevice, CapturePort, DeviceCapabilities, Format, FourCC, FrameMetadata,
};

/// Longest wait for the driver to deliver a frame.
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// V4L2 camera with an mmap capture stream.
///
/// A capture thread dequeues every frame the driver delivers. Recording is
/// done in software: while a recording is active each of those frames is
/// appended to the output file. [`CameraDevice::capture`] returns the
/// newest frame not handed out before.
pub struct V4L2Device {
    feed: Arc<FrameFeed>,
    worker: Option<JoinHandle<()>>,
    device: Option<Device>,
    capabilities: DeviceCapabilities,
    format: Format,
    frame_rate: u32,
    // serial of the last frame handed to a caller
    delivered: u64,
}

impl V4L2Device {
    /// Open and configure the device described by `config`.
    ///
    /// The driver may adjust the resolution; the negotiated format is the
    /// one reported by [`CameraDevice::format`]. A different pixel format
    /// is rejected.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let device = Device::new(config.device_index as usize)
            .map_err(|err| Error::DeviceOpenFailed(err.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|err| Error::DeviceOpenFailed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };
        if !capabilities.can_capture || !capabilities.can_stream {
            return Err(Error::DeviceOpenFailed(format!(
                "{} cannot stream video",
                capabilities.card
            )));
        }

        let format = negotiate_format(&device, &config.format())?;
        let frame_rate = negotiate_frame_rate(&device, config.frame_rate);

        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, config.buffer_count)
            .map_err(|err| Error::DeviceOpenFailed(err.to_string()))?;
        stream.set_timeout(DEQUEUE_TIMEOUT);

        let feed = Arc::new(FrameFeed::new());
        let worker = {
            let feed = Arc::clone(&feed);
            thread::Builder::new()
                .name("v4l2-capture".to_owned())
                .spawn(move || capture_loop(stream, &feed))
                .map_err(|err| Error::DeviceOpenFailed(err.to_string()))?
        };

        info!(
            "opened {} ({}): {}x{} {} @ {} fps",
            capabilities.card,
            capabilities.driver,
            format.width,
            format.height,
            format.fourcc,
            frame_rate
        );

        Ok(Self {
            feed,
            worker: Some(worker),
            device: Some(device),
            capabilities,
            format,
            frame_rate,
            delivered: 0,
        })
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn stop_capture(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.feed.request_stop();
        worker
            .join()
            .map_err(|_| Error::Capture("capture thread panicked".to_owned()))
    }
}

/// Dequeue frames until a stop is requested or the stream fails.
///
/// The stream is dropped here, on the capture thread, which stops it.
fn capture_loop(mut stream: Stream<'static>, feed: &FrameFeed) {
    let mut spare = Vec::new();
    while !feed.stop_requested() {
        let frame = match stream.next() {
            Ok((buf, meta)) => {
                spare.clear();
                spare.extend_from_slice(used_bytes(buf, meta.bytesused));
                CapturedFrame {
                    data: std::mem::take(&mut spare),
                    metadata: frame_metadata(meta),
                }
            }
            Err(err) => {
                warn!("capture stopped: {err}");
                feed.close(Some(Error::Capture(err.to_string())));
                return;
            }
        };
        match feed.publish(frame) {
            Ok(storage) => spare = storage,
            Err(err) => {
                warn!("recording stopped capture: {err}");
                feed.close(Some(err));
                return;
            }
        }
    }
    feed.close(None);
}

fn used_bytes(buf: &[u8], bytesused: u32) -> &[u8] {
    match bytesused {
        0 => buf,
        n => buf.get(..n as usize).unwrap_or(buf),
    }
}

fn frame_metadata(meta: &Metadata) -> FrameMetadata {
    // Safe conversions: V4L2 timestamps are always non-negative in practice
    #[allow(clippy::cast_sign_loss)]
    let secs = meta.timestamp.sec.max(0) as u64;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let nanos = (meta.timestamp.usec.max(0) as u32).saturating_mul(1000);

    FrameMetadata {
        sequence: meta.sequence,
        timestamp: Duration::new(secs, nanos),
        bytes_used: meta.bytesused,
    }
}

fn negotiate_format(device: &Device, requested: &Format) -> Result<Format> {
    let mut fmt = device
        .format()
        .map_err(|err| Error::DeviceOpenFailed(err.to_string()))?;

    fmt.width = requested.width;
    fmt.height = requested.height;
    fmt.fourcc = requested.fourcc.into();

    let fmt = device
        .set_format(&fmt)
        .map_err(|_| Error::FormatNotSupported(requested.clone()))?;

    let actual = Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    };

    if actual.fourcc != requested.fourcc {
        return Err(Error::FormatNotSupported(requested.clone()));
    }
    if (actual.width, actual.height) != (requested.width, requested.height) {
        warn!(
            "driver adjusted resolution from {}x{} to {}x{}",
            requested.width, requested.height, actual.width, actual.height
        );
    }
    Ok(actual)
}

fn negotiate_frame_rate(device: &Device, fps: u32) -> u32 {
    match device.set_params(&Parameters::with_fps(fps)) {
        Ok(params) if params.interval.numerator > 0 => {
            params.interval.denominator / params.interval.numerator
        }
        Ok(_) => fps,
        Err(err) => {
            warn!("failed to set {fps} fps: {err}");
            fps
        }
    }
}

impl CameraDevice for V4L2Device {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn format(&self) -> &Format {
        &self.format
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn capture(&mut self, buffer: &mut FrameBuffer, port: CapturePort) -> Result<()> {
        if buffer.format() != &self.format {
            return Err(Error::FormatMismatch {
                buffer: buffer.format().clone(),
                device: self.format.clone(),
            });
        }
        if !buffer.is_empty() {
            return Err(Error::BufferNotTruncated);
        }

        if !self.is_open() {
            return Err(Error::InvalidState("device closed"));
        }

        // Video: newest frame not handed out yet. Still: a frame that
        // arrives after this call.
        let after = match port {
            CapturePort::Video => self.delivered,
            CapturePort::Still => self.delivered.max(self.feed.published()),
        };
        self.delivered = self.feed.wait_newer(after, |frame| {
            buffer.fill(&frame.data, frame.metadata.clone())
        })?;
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.feed.is_recording() {
            return Ok(());
        }
        if !self.is_open() {
            return Err(Error::InvalidState("device closed"));
        }
        self.feed.attach_recorder(Recorder::create(path)?);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let Some(recorder) = self.feed.detach_recorder() else {
            return Ok(());
        };
        let summary = recorder.finish()?;
        info!(
            "wrote {} frames ({} bytes) to {}",
            summary.frames,
            summary.bytes,
            summary.path.display()
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.feed.is_recording()
    }

    fn close(&mut self) -> Result<()> {
        let recording = self.stop_recording();
        let capture = self.stop_capture();
        if self.device.take().is_some() {
            info!("closed {}", self.capabilities.card);
        }
        recording.and(capture)
    }
}

impl Drop for V4L2Device {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("closing {} on drop failed: {err}", self.capabilities.card);
        }
    }
}
