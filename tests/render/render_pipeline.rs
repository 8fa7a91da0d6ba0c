//! From uploaded bytes to an encoded viewport image

#[path = "../common/mod.rs"]
mod common;

use common::SyntheticSlice;
use prism::error::PrismError;
use prism::ingest::parse_slice;
use prism::render::{self, OutputFormat};

#[test]
fn renders_a_parsed_slice_to_png() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .window(128.0, 256.0)
        .part10();
    let record = parse_slice(&bytes, "p/chest/1.dcm").expect("parse slice");

    let raster = render::render(&record, None, None).expect("render");
    assert_eq!(raster.width, 2);
    assert_eq!(raster.height, 2);
    // Window [0, 256] maps each sample v to round(v / 256 * 255)
    assert_eq!(raster.pixels, vec![0, 64, 128, 254]);

    let png = render::encode(&raster, OutputFormat::Png).expect("encode png");
    let decoded = image::load_from_memory(&png).expect("decode png").to_luma8();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert_eq!(decoded.into_raw(), vec![0, 64, 128, 254]);
}

#[test]
fn explicit_window_overrides_the_stored_default() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .window(128.0, 256.0)
        .part10();
    let record = parse_slice(&bytes, "p/chest/1.dcm").expect("parse slice");

    // Narrow window centered on 64: 0 clamps low, 128+ clamp high
    let raster = render::render(&record, Some(64.0), Some(2.0)).expect("render");
    assert_eq!(raster.pixels[0], 0);
    assert_eq!(raster.pixels[2], 255);
    assert_eq!(raster.pixels[3], 255);
}

#[test]
fn jpeg_encoding_produces_a_decodable_image() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1").part10();
    let record = parse_slice(&bytes, "p/chest/1.dcm").expect("parse slice");

    let raster = render::render(&record, None, None).expect("render");
    let jpeg = render::encode(&raster, OutputFormat::Jpeg).expect("encode jpeg");
    let decoded = image::load_from_memory(&jpeg).expect("decode jpeg");
    assert_eq!(decoded.to_luma8().dimensions(), (2, 2));
}

#[test]
fn zero_width_window_is_rejected() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1").part10();
    let record = parse_slice(&bytes, "p/chest/1.dcm").expect("parse slice");

    let err = render::render(&record, Some(100.0), Some(0.0)).unwrap_err();
    assert!(matches!(err, PrismError::InvalidWindow { .. }));
}

#[test]
fn rendering_is_deterministic_end_to_end() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .window(128.0, 256.0)
        .part10();
    let record = parse_slice(&bytes, "p/chest/1.dcm").expect("parse slice");

    let first = render::render_default_png(&record).expect("render");
    let second = render::render_default_png(&record).expect("render");
    assert_eq!(first, second);
}
