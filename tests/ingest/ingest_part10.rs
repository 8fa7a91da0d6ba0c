//! Parsing uploaded Part-10 bytes into slice records

#[path = "../common/mod.rs"]
mod common;

use common::SyntheticSlice;
use prism::error::PrismError;
use prism::ingest::parse_slice;

#[test]
fn parses_a_complete_ct_slice() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .instance(7)
        .window(128.0, 256.0)
        .part10();

    let record = parse_slice(&bytes, "alice/chest/ct_007.dcm").expect("parse slice");

    assert_eq!(record.study_uid, "study-1");
    assert_eq!(record.series_uid, "series-1");
    assert_eq!(record.sop_uid, "sop-1");
    assert_eq!(record.patient_id, "PAT001");
    assert_eq!(record.instance_number, Some(7));
    assert_eq!(record.modality.as_deref(), Some("CT"));
    assert_eq!(record.rows, 2);
    assert_eq!(record.columns, 2);
    assert_eq!(record.bits_allocated, 8);
    assert!(!record.signed);
    assert!(!record.inverted);
    assert_eq!(record.pixel_data, vec![0, 64, 128, 255]);
    assert_eq!(record.source_path, "alice/chest/ct_007.dcm");
    assert!(!record.file_id.is_empty());

    let window = record.default_window.expect("stored window");
    assert_eq!(window.center, 128.0);
    assert_eq!(window.width, 256.0);
}

#[test]
fn missing_study_uid_names_the_tag() {
    let mut slice = SyntheticSlice::new("study-1", "series-1", "sop-1");
    slice.study_uid = String::new();
    let bytes = slice.part10();

    let err = parse_slice(&bytes, "a.dcm").unwrap_err();
    match err {
        PrismError::MissingRequiredTag(tag) => assert_eq!(tag, "StudyInstanceUID"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn missing_series_uid_names_the_tag() {
    let mut slice = SyntheticSlice::new("study-1", "series-1", "sop-1");
    slice.series_uid = String::new();
    let bytes = slice.part10();

    let err = parse_slice(&bytes, "a.dcm").unwrap_err();
    match err {
        PrismError::MissingRequiredTag(tag) => assert_eq!(tag, "SeriesInstanceUID"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn garbage_bytes_are_unparsable() {
    let err = parse_slice(b"this is not a dicom file at all", "junk.bin").unwrap_err();
    assert!(matches!(err, PrismError::UnparsableRecord(_)));
}

#[test]
fn truncated_preamble_is_unparsable() {
    let bytes = SyntheticSlice::new("s", "se", "so").part10();
    let err = parse_slice(&bytes[..64], "cut.dcm").unwrap_err();
    assert!(matches!(err, PrismError::UnparsableRecord(_)));
}

#[test]
fn patient_falls_back_to_top_level_folder() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .no_patient()
        .part10();

    let record = parse_slice(&bytes, "bob/left_knee/img0001.dcm").expect("parse slice");
    assert_eq!(record.patient_id, "bob");
    assert_eq!(record.body_part.as_deref(), Some("left_knee"));
}

#[test]
fn patient_tag_wins_over_folder_name() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1").part10();
    let record = parse_slice(&bytes, "bob/left_knee/img0001.dcm").expect("parse slice");
    assert_eq!(record.patient_id, "PAT001");
}

#[test]
fn pathless_upload_without_patient_is_unknown() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1")
        .no_patient()
        .part10();
    let record = parse_slice(&bytes, "img0001.dcm").expect("parse slice");
    assert_eq!(record.patient_id, "UNKNOWN");
}

#[test]
fn monochrome1_sets_the_inversion_flag() {
    let mut slice = SyntheticSlice::new("study-1", "series-1", "sop-1");
    slice.photometric = "MONOCHROME1";
    let record = parse_slice(&slice.part10(), "a.dcm").expect("parse slice");
    assert!(record.inverted);
}

#[test]
fn color_images_are_rejected() {
    let mut slice = SyntheticSlice::new("study-1", "series-1", "sop-1");
    slice.photometric = "RGB";
    let err = parse_slice(&slice.part10(), "a.dcm").unwrap_err();
    assert!(matches!(err, PrismError::UnparsableRecord(_)));
}

#[test]
fn rescale_tags_are_read() {
    let mut slice = SyntheticSlice::new("study-1", "series-1", "sop-1");
    slice.rescale = Some((2.0, -1024.0));
    let record = parse_slice(&slice.part10(), "a.dcm").expect("parse slice");
    assert_eq!(record.rescale_slope, 2.0);
    assert_eq!(record.rescale_intercept, -1024.0);
}

#[test]
fn rescale_defaults_to_identity() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1").part10();
    let record = parse_slice(&bytes, "a.dcm").expect("parse slice");
    assert_eq!(record.rescale_slope, 1.0);
    assert_eq!(record.rescale_intercept, 0.0);
}

#[test]
fn file_ids_are_unique_per_parse() {
    let bytes = SyntheticSlice::new("study-1", "series-1", "sop-1").part10();
    let a = parse_slice(&bytes, "a.dcm").expect("parse slice");
    let b = parse_slice(&bytes, "a.dcm").expect("parse slice");
    assert_ne!(a.file_id, b.file_id);
}
