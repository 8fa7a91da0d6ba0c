//! Intensity transform engine
//!
//! Converts a slice's raw samples into an 8-bit raster under a window/level.
//! Everything here is pure: repeated calls with identical inputs produce
//! byte-identical output, which is what lets rendered images be cached or
//! fingerprinted further up the stack.

use image::ImageEncoder;

use crate::error::{PrismError, Result};
use crate::ingest::SliceRecord;

/// Intensity range mapped onto the visible 0-255 grayscale range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLevel {
    pub center: f64,
    pub width: f64,
}

/// An 8-bit grayscale raster produced by [`render`]
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Raster encodings offered over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Resolve the effective window for a render call.
///
/// An explicit (center, width) pair wins; otherwise the record's stored
/// default applies; otherwise the window is derived from the true-intensity
/// distribution as [min, max], with the width clamped to at least 1.
pub fn resolve_window(
    record: &SliceRecord,
    center: Option<f64>,
    width: Option<f64>,
) -> Result<WindowLevel> {
    if let (Some(center), Some(width)) = (center, width) {
        if width <= 0.0 {
            return Err(PrismError::InvalidWindow { width });
        }
        return Ok(WindowLevel { center, width });
    }

    if let Some(window) = record.default_window {
        if window.width > 0.0 {
            return Ok(window);
        }
    }

    Ok(auto_window(record))
}

/// Derive a window from the sample distribution: center = (min+max)/2,
/// width = max-min clamped to >= 1.
pub fn auto_window(record: &SliceRecord) -> WindowLevel {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for i in 0..record.sample_count() {
        let value = true_intensity(record, i);
        if value < min {
            min = value;
        }
        if value > max {
            max = value;
        }
    }
    if !min.is_finite() || !max.is_finite() {
        // Empty raster; any window renders nothing
        return WindowLevel {
            center: 0.0,
            width: 1.0,
        };
    }
    WindowLevel {
        center: (min + max) / 2.0,
        width: (max - min).max(1.0),
    }
}

/// Render a slice to an 8-bit raster under the given (or derived) window.
///
/// True intensity = rescale_slope * sample + rescale_intercept; the window
/// [center - width/2, center + width/2] maps linearly onto [0, 255] with
/// clamping. MONOCHROME1 data is inverted so the lowest intensity renders
/// white, matching how the source equipment intends it to be shown.
pub fn render(
    record: &SliceRecord,
    center: Option<f64>,
    width: Option<f64>,
) -> Result<Raster> {
    record.validate_geometry()?;
    let window = resolve_window(record, center, width)?;

    let lo = window.center - window.width / 2.0;
    let span = window.width;

    let mut pixels = Vec::with_capacity(record.sample_count());
    for i in 0..record.sample_count() {
        let value = true_intensity(record, i);
        let norm = ((value - lo) / span).clamp(0.0, 1.0);
        let mut out = (norm * 255.0).round() as u8;
        if record.inverted {
            out = 255 - out;
        }
        pixels.push(out);
    }

    Ok(Raster {
        width: record.columns as u32,
        height: record.rows as u32,
        pixels,
    })
}

/// Encode a raster as PNG or JPEG bytes
pub fn encode(raster: &Raster, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    match format {
        OutputFormat::Png => {
            let enc = image::codecs::png::PngEncoder::new(&mut buf);
            enc.write_image(
                &raster.pixels,
                raster.width,
                raster.height,
                image::ColorType::L8,
            )
            .map_err(|e| PrismError::consistency(format!("png encode: {}", e)))?;
        }
        OutputFormat::Jpeg => {
            let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90);
            enc.write_image(
                &raster.pixels,
                raster.width,
                raster.height,
                image::ColorType::L8,
            )
            .map_err(|e| PrismError::consistency(format!("jpeg encode: {}", e)))?;
        }
    }
    Ok(buf)
}

/// Render with derived defaults and return PNG bytes; the shape the
/// interpretation sampler wants.
pub fn render_default_png(record: &SliceRecord) -> Result<Vec<u8>> {
    let raster = render(record, None, None)?;
    encode(&raster, OutputFormat::Png)
}

/// One sample as its true (rescaled) intensity
fn true_intensity(record: &SliceRecord, index: usize) -> f64 {
    let raw = raw_sample(record, index);
    record.rescale_slope * raw as f64 + record.rescale_intercept
}

/// Read one raw sample at its native depth and signedness (little-endian)
fn raw_sample(record: &SliceRecord, index: usize) -> i32 {
    match (record.bits_allocated, record.signed) {
        (8, false) => record.pixel_data[index] as i32,
        (8, true) => record.pixel_data[index] as i8 as i32,
        (16, false) => {
            let offset = index * 2;
            u16::from_le_bytes([record.pixel_data[offset], record.pixel_data[offset + 1]]) as i32
        }
        (16, true) => {
            let offset = index * 2;
            i16::from_le_bytes([record.pixel_data[offset], record.pixel_data[offset + 1]]) as i32
        }
        // Ingest only admits 8- and 16-bit grayscale
        _ => 0,
    }
}
