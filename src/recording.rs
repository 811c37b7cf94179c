//! Frame stream writer backing device-side recording.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Totals for a finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Output file.
    pub path: PathBuf,
    /// Frames written.
    pub frames: u64,
    /// Bytes written.
    pub bytes: u64,
}

/// Appends captured frames, back to back, to a single output file.
///
/// The file holds the device's native frame stream (raw YUYV/RGB planes or
/// concatenated JPEGs for MJPG), which `ffmpeg -f rawvideo` or `-f mjpeg`
/// can read directly.
pub struct Recorder {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
    bytes: u64,
}

impl Recorder {
    /// Create the output file. Fails if it already exists.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| Error::RecordingIo {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            frames: 0,
            bytes: 0,
        })
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one frame.
    pub fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .map_err(|source| Error::RecordingIo {
                path: self.path.clone(),
                source,
            })?;
        self.frames += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }

    /// Flush and sync the file.
    pub fn finish(mut self) -> Result<RecordingSummary> {
        let path = self.path.clone();
        self.writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all())
            .map_err(|source| Error::RecordingIo {
                path: path.clone(),
                source,
            })?;

        Ok(RecordingSummary {
            path,
            frames: self.frames,
            bytes: self.bytes,
        })
    }
}
