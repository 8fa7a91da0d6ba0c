//! Record ingestor: one uploaded file in, one validated slice record out
//!
//! Parsing reads tags and pixel data at their native bit depth; rescale
//! slope/intercept are stored on the record but never applied here, so the
//! sample buffer stays canonical for the renderer and for content
//! fingerprinting. Nothing in this module touches shared state.

use std::io::Cursor;

use dicom_dictionary_std::tags;
use dicom_object::DefaultDicomObject;
use dicom_pixeldata::PixelDecoder;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PrismError, Result};
use crate::render::WindowLevel;

/// One parsed 2D cross-sectional image instance.
///
/// The pixel buffer is owned exclusively by the hierarchy's slice entry once
/// ingested; the renderer borrows it read-only per call.
#[derive(Debug, Clone)]
pub struct SliceRecord {
    // === Identifiers ===
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_uid: String,
    pub series_uid: String,
    pub sop_uid: String,

    // === Ordering keys ===
    pub instance_number: Option<i32>,
    pub slice_location: Option<f64>,

    // === Pixel geometry ===
    pub rows: u16,
    pub columns: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    /// Pixel Representation 1 = two's-complement samples
    pub signed: bool,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// MONOCHROME1: lowest sample renders white
    pub inverted: bool,
    /// Default window from the dataset, when present
    pub default_window: Option<WindowLevel>,

    // === Descriptive tags ===
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub body_part: Option<String>,
    pub slice_thickness: Option<f64>,
    pub pixel_spacing: Option<[f64; 2]>,

    // === Provenance ===
    /// Upload-relative path of the source file
    pub source_path: String,
    /// Storage key assigned at ingest
    pub file_id: String,

    /// Raw samples at native depth, little-endian, one frame
    pub pixel_data: Vec<u8>,
}

impl SliceRecord {
    /// Bytes per stored sample (1 for 8-bit, 2 for 16-bit data)
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated as usize).div_ceil(8)
    }

    /// Number of samples in one frame
    pub fn sample_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Check the rows x columns x bytes-per-sample == buffer length invariant
    pub fn validate_geometry(&self) -> Result<()> {
        let expected = self.sample_count() * self.bytes_per_sample();
        if self.pixel_data.len() != expected {
            return Err(PrismError::consistency(format!(
                "pixel buffer is {} bytes, geometry {}x{}x{} requires {}",
                self.pixel_data.len(),
                self.rows,
                self.columns,
                self.bytes_per_sample(),
                expected
            )));
        }
        Ok(())
    }
}

/// Patient/body-part hints recovered from the upload-relative path.
///
/// Uploads preserve folder structure (patient/body_location/file.dcm); these
/// only ever fill descriptive fields the dataset itself leaves blank.
#[derive(Debug, Default)]
struct PathHints {
    patient_folder: Option<String>,
    body_location: Option<String>,
}

/// Parse one uploaded file into a [`SliceRecord`].
///
/// Accepts Part-10 streams with or without the 128-byte preamble. Returns
/// `UnparsableRecord` when the stream has no DICOM structure or no usable
/// pixel data, `MissingRequiredTag` when the study/series/instance
/// identifiers cannot be determined.
pub fn parse_slice(bytes: &[u8], relative_path: &str) -> Result<SliceRecord> {
    let payload = part10_payload(bytes).ok_or_else(|| {
        PrismError::UnparsableRecord("no DICM marker in byte stream".to_string())
    })?;

    let obj = dicom_object::from_reader(Cursor::new(payload))
        .map_err(|e| PrismError::UnparsableRecord(format!("failed to parse dataset: {}", e)))?;

    let hints = split_path_hints(relative_path);

    // Identifiers first; everything else is best-effort
    let study_uid = string_tag(&obj, tags::STUDY_INSTANCE_UID)
        .ok_or(PrismError::MissingRequiredTag("StudyInstanceUID"))?;
    let series_uid = string_tag(&obj, tags::SERIES_INSTANCE_UID)
        .ok_or(PrismError::MissingRequiredTag("SeriesInstanceUID"))?;
    let sop_uid = string_tag(&obj, tags::SOP_INSTANCE_UID)
        .ok_or(PrismError::MissingRequiredTag("SOPInstanceUID"))?;

    let patient_name = string_tag(&obj, tags::PATIENT_NAME);
    let patient_id = string_tag(&obj, tags::PATIENT_ID)
        .or_else(|| patient_name.clone())
        .or_else(|| hints.patient_folder.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    // Grayscale single-sample images only
    let samples_per_pixel = int_tag(&obj, tags::SAMPLES_PER_PIXEL).unwrap_or(1);
    if samples_per_pixel != 1 {
        return Err(PrismError::UnparsableRecord(format!(
            "unsupported samples per pixel: {}",
            samples_per_pixel
        )));
    }

    let photometric = string_tag(&obj, tags::PHOTOMETRIC_INTERPRETATION)
        .unwrap_or_else(|| "MONOCHROME2".to_string());
    let inverted = match photometric.as_str() {
        "MONOCHROME1" => true,
        "MONOCHROME2" => false,
        other => {
            return Err(PrismError::UnparsableRecord(format!(
                "unsupported photometric interpretation: {}",
                other
            )))
        }
    };

    let rows = int_tag(&obj, tags::ROWS)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| PrismError::UnparsableRecord("missing Rows".to_string()))?;
    let columns = int_tag(&obj, tags::COLUMNS)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| PrismError::UnparsableRecord("missing Columns".to_string()))?;
    let bits_allocated = int_tag(&obj, tags::BITS_ALLOCATED)
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(16);
    if bits_allocated != 8 && bits_allocated != 16 {
        return Err(PrismError::UnparsableRecord(format!(
            "unsupported bits allocated: {}",
            bits_allocated
        )));
    }
    let bits_stored = int_tag(&obj, tags::BITS_STORED)
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(bits_allocated);
    let signed = int_tag(&obj, tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;

    let pixel_data = decode_pixels(&obj, rows, columns, bits_allocated)?;

    let default_window = match (
        float_tag(&obj, tags::WINDOW_CENTER),
        float_tag(&obj, tags::WINDOW_WIDTH),
    ) {
        (Some(center), Some(width)) if width > 0.0 => Some(WindowLevel { center, width }),
        _ => None,
    };

    let record = SliceRecord {
        patient_id,
        patient_name,
        study_uid,
        series_uid,
        sop_uid,
        instance_number: int_tag(&obj, tags::INSTANCE_NUMBER),
        slice_location: float_tag(&obj, tags::SLICE_LOCATION),
        rows,
        columns,
        bits_allocated,
        bits_stored,
        signed,
        rescale_slope: float_tag(&obj, tags::RESCALE_SLOPE).unwrap_or(1.0),
        rescale_intercept: float_tag(&obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        inverted,
        default_window,
        study_date: string_tag(&obj, tags::STUDY_DATE),
        study_description: string_tag(&obj, tags::STUDY_DESCRIPTION),
        series_number: int_tag(&obj, tags::SERIES_NUMBER),
        series_description: string_tag(&obj, tags::SERIES_DESCRIPTION)
            .or_else(|| hints.body_location.clone()),
        modality: string_tag(&obj, tags::MODALITY),
        body_part: string_tag(&obj, tags::BODY_PART_EXAMINED).or(hints.body_location),
        slice_thickness: float_tag(&obj, tags::SLICE_THICKNESS),
        pixel_spacing: pixel_spacing_tag(&obj),
        source_path: relative_path.to_string(),
        file_id: Uuid::new_v4().to_string(),
        pixel_data,
    };

    record.validate_geometry()?;

    debug!(
        sop_uid = %record.sop_uid,
        series_uid = %record.series_uid,
        rows = record.rows,
        columns = record.columns,
        "parsed slice record"
    );

    Ok(record)
}

/// Locate the dataset within a Part-10 stream, with or without preamble
fn part10_payload(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() > 132 && &bytes[128..132] == b"DICM" {
        Some(&bytes[128..])
    } else if bytes.len() > 4 && &bytes[..4] == b"DICM" {
        Some(bytes)
    } else {
        None
    }
}

/// Decode pixel data to a native-depth little-endian buffer, keeping only the
/// first frame when the dataset is multi-frame.
fn decode_pixels(
    obj: &DefaultDicomObject,
    rows: u16,
    columns: u16,
    bits_allocated: u16,
) -> Result<Vec<u8>> {
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| PrismError::UnparsableRecord(format!("no decodable pixel data: {}", e)))?;

    let frame_len =
        rows as usize * columns as usize * (bits_allocated as usize).div_ceil(8);
    let data = decoded.data();
    if data.len() < frame_len {
        return Err(PrismError::consistency(format!(
            "decoded pixel data is {} bytes, expected at least {}",
            data.len(),
            frame_len
        )));
    }
    Ok(data[..frame_len].to_vec())
}

fn split_path_hints(relative_path: &str) -> PathHints {
    let normalized = relative_path.replace('\\', "/");
    let parts: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    match parts.len() {
        0 | 1 => PathHints::default(),
        2 => PathHints {
            patient_folder: Some(parts[0].to_string()),
            body_location: Some(parts[0].to_string()),
        },
        _ => PathHints {
            patient_folder: Some(parts[0].to_string()),
            body_location: Some(parts[1].to_string()),
        },
    }
}

fn string_tag(obj: &DefaultDicomObject, tag: dicom_core::Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches(['\0', ' ']).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn int_tag(obj: &DefaultDicomObject, tag: dicom_core::Tag) -> Option<i32> {
    obj.element(tag).ok().and_then(|e| e.to_int::<i32>().ok())
}

/// First value of a possibly multi-valued numeric element (WindowCenter and
/// friends may carry several values)
fn float_tag(obj: &DefaultDicomObject, tag: dicom_core::Tag) -> Option<f64> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .and_then(|values| values.first().copied())
}

fn pixel_spacing_tag(obj: &DefaultDicomObject) -> Option<[f64; 2]> {
    let values = obj
        .element(tags::PIXEL_SPACING)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())?;
    match values.as_slice() {
        [row, col, ..] => Some([*row, *col]),
        [single] => Some([*single, *single]),
        _ => None,
    }
}
