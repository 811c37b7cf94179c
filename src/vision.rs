//! Image primitives used by the motion detector.
//!
//! All operations work on single-channel 8-bit images (`image::GrayImage`)
//! and allocate a fresh output image.

use image::{GrayImage, ImageFormat};

use crate::buffer::FrameBuffer;
use crate::error::{Error, Result};
use crate::traits::{Format, FourCC};

// BT.601 luma weights in 14-bit fixed point.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const WEIGHT_SHIFT: u32 = 14;

/// Convert a captured frame to a single-channel intensity image.
pub fn to_grayscale(buffer: &FrameBuffer) -> Result<GrayImage> {
    if buffer.is_empty() {
        return Err(Error::Vision("cannot convert an empty frame".to_owned()));
    }

    let format = buffer.format();
    let data = buffer.data();

    let luma: Vec<u8> = match format.fourcc {
        FourCC::BGR3 => packed_rows(data, format, 3)
            .flat_map(|row| row.chunks_exact(3))
            .map(|px| match *px {
                [b, g, r] => luma(r, g, b),
                _ => 0,
            })
            .collect(),
        FourCC::RGB3 => packed_rows(data, format, 3)
            .flat_map(|row| row.chunks_exact(3))
            .map(|px| match *px {
                [r, g, b] => luma(r, g, b),
                _ => 0,
            })
            .collect(),
        // [Y0 U Y1 V]: every even byte is a luma sample
        FourCC::YUYV => packed_rows(data, format, 2)
            .flat_map(|row| row.iter().step_by(2).copied())
            .collect(),
        FourCC::MJPG => {
            let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                .map_err(|err| Error::Vision(format!("JPEG decode failed: {err}")))?
                .to_rgb8();
            if decoded.dimensions() != (format.width, format.height) {
                return Err(Error::Vision(format!(
                    "decoded frame is {}x{}, expected {}x{}",
                    decoded.width(),
                    decoded.height(),
                    format.width,
                    format.height
                )));
            }
            decoded
                .pixels()
                .map(|px| {
                    let [r, g, b] = px.0;
                    luma(r, g, b)
                })
                .collect()
        }
        other => {
            return Err(Error::Vision(format!(
                "no grayscale conversion for {other}"
            )))
        }
    };

    GrayImage::from_raw(format.width, format.height, luma).ok_or_else(|| {
        Error::Vision(format!(
            "frame too small for {}x{}",
            format.width, format.height
        ))
    })
}

/// Rows of a packed frame with any stride padding stripped.
fn packed_rows<'a>(
    data: &'a [u8],
    format: &Format,
    bytes_per_pixel: usize,
) -> impl Iterator<Item = &'a [u8]> {
    let row_bytes = format.width as usize * bytes_per_pixel;
    let stride = (format.stride as usize).max(row_bytes).max(1);
    data.chunks(stride)
        .take(format.height as usize)
        .filter_map(move |row| row.get(..row_bytes))
}

#[allow(clippy::cast_possible_truncation)]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * R_WEIGHT + u32::from(g) * G_WEIGHT + u32::from(b) * B_WEIGHT;
    ((weighted + (1 << (WEIGHT_SHIFT - 1))) >> WEIGHT_SHIFT).min(255) as u8
}

/// Per-pixel absolute difference `|a - b|`.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    zip_with(a, b, u8::abs_diff)
}

/// Per-pixel bitwise AND.
pub fn bitwise_and(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    zip_with(a, b, |x, y| x & y)
}

fn zip_with<F>(a: &GrayImage, b: &GrayImage, op: F) -> Result<GrayImage>
where
    F: Fn(u8, u8) -> u8,
{
    if a.dimensions() != b.dimensions() {
        return Err(Error::Vision(format!(
            "image sizes differ: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }

    let out = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| op(x, y))
        .collect();
    GrayImage::from_raw(a.width(), a.height(), out)
        .ok_or_else(|| Error::Vision("image buffer size mismatch".to_owned()))
}

/// Binarize: pixels `>= threshold` become `max_value`, all others 0.
pub fn threshold(image: &GrayImage, threshold: u8, max_value: u8) -> GrayImage {
    let mut out = image.clone();
    for px in out.iter_mut() {
        *px = if *px >= threshold { max_value } else { 0 };
    }
    out
}

/// `kernel`×`kernel` median filter with replicated borders.
///
/// Uses a per-row sliding histogram, so the cost per pixel is linear in
/// `kernel` rather than quadratic.
pub fn median_filter(image: &GrayImage, kernel: u32) -> Result<GrayImage> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(Error::InvalidConfig(format!(
            "median kernel must be odd and positive, got {kernel}"
        )));
    }

    let (width, height) = image.dimensions();
    if kernel == 1 || width == 0 || height == 0 {
        return Ok(image.clone());
    }

    let radius = i64::from(kernel / 2);
    let rank = kernel * kernel / 2;
    let src = image.as_raw();
    let max_x = i64::from(width) - 1;
    let max_y = i64::from(height) - 1;

    let sample = |x: i64, y: i64| -> u8 {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let idx = (y.clamp(0, max_y) * i64::from(width) + x.clamp(0, max_x)) as usize;
        src.get(idx).copied().unwrap_or(0)
    };

    let mut out = Vec::with_capacity(src.len());
    for y in 0..i64::from(height) {
        let mut hist = Histogram::default();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                hist.add(sample(dx, y + dy));
            }
        }
        out.push(hist.nth(rank));

        for x in 1..=max_x {
            for dy in -radius..=radius {
                hist.remove(sample(x - 1 - radius, y + dy));
                hist.add(sample(x + radius, y + dy));
            }
            out.push(hist.nth(rank));
        }
    }

    GrayImage::from_raw(width, height, out)
        .ok_or_else(|| Error::Vision("median output size mismatch".to_owned()))
}

struct Histogram([u32; 256]);

impl Default for Histogram {
    fn default() -> Self {
        Self([0; 256])
    }
}

impl Histogram {
    fn add(&mut self, value: u8) {
        if let Some(bin) = self.0.get_mut(usize::from(value)) {
            *bin += 1;
        }
    }

    fn remove(&mut self, value: u8) {
        if let Some(bin) = self.0.get_mut(usize::from(value)) {
            *bin = bin.saturating_sub(1);
        }
    }

    /// Value at 0-based position `rank` in sorted order.
    fn nth(&self, rank: u32) -> u8 {
        let mut seen = 0u32;
        for (value, &count) in (0..=u8::MAX).zip(self.0.iter()) {
            seen += count;
            if seen > rank {
                return value;
            }
        }
        u8::MAX
    }
}

/// Sum of all pixel values.
pub fn sum(image: &GrayImage) -> u64 {
    image.as_raw().iter().map(|&px| u64::from(px)).sum()
}
