//! Reusable capture target bound to a camera format.

use crate::error::{Error, Result};
use crate::traits::{Format, FrameMetadata};

/// A reusable pixel buffer holding at most one captured frame.
///
/// The buffer is allocated once for a fixed [`Format`] and reused for every
/// capture. After the frame has been read it must be [truncated](Self::truncate)
/// before it can be filled again.
#[derive(Debug)]
pub struct FrameBuffer {
    format: Format,
    data: Vec<u8>,
    metadata: Option<FrameMetadata>,
}

impl FrameBuffer {
    /// Allocate an empty buffer large enough for one frame of `format`.
    pub fn allocate(format: &Format) -> Result<Self> {
        let bytes = format.size as usize;
        if bytes == 0 {
            return Err(Error::Allocation { bytes });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| Error::Allocation { bytes })?;

        Ok(Self {
            format: format.clone(),
            data,
            metadata: None,
        })
    }

    /// Store a captured frame.
    ///
    /// Packed formats must deliver at least one full frame; extra trailing
    /// bytes (driver padding) are dropped.
    pub fn fill(&mut self, bytes: &[u8], metadata: FrameMetadata) -> Result<()> {
        if !self.is_empty() {
            return Err(Error::BufferNotTruncated);
        }

        let frame = if self.format.fourcc.bytes_per_pixel().is_some() {
            let expected = self.format.size as usize;
            bytes.get(..expected).ok_or_else(|| {
                Error::Capture(format!(
                    "short frame: got {} bytes, expected {expected}",
                    bytes.len()
                ))
            })?
        } else {
            bytes
        };

        self.data.extend_from_slice(frame);
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Empty the buffer so it can be used as a capture target again.
    pub fn truncate(&mut self) {
        self.data.clear();
        self.metadata = None;
    }

    /// Whether the buffer currently holds no frame.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw bytes of the captured frame.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Metadata of the captured frame, if any.
    pub fn metadata(&self) -> Option<&FrameMetadata> {
        self.metadata.as_ref()
    }

    /// Format this buffer was allocated for.
    pub fn format(&self) -> &Format {
        &self.format
    }
}
