//! Shared helpers for integration tests: synthetic Part-10 slice files

use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, Tag, VR};
use dicom_dictionary_std::uids;
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;

/// Builder for a small single-frame grayscale slice
pub struct SyntheticSlice {
    pub study_uid: String,
    pub series_uid: String,
    pub sop_uid: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub instance_number: Option<i32>,
    pub slice_location: Option<f64>,
    pub rows: u16,
    pub columns: u16,
    pub photometric: &'static str,
    pub modality: &'static str,
    pub window: Option<(f64, f64)>,
    pub rescale: Option<(f64, f64)>,
    /// 8-bit samples, row-major, rows * columns of them
    pub pixels: Vec<u8>,
}

impl SyntheticSlice {
    pub fn new(study_uid: &str, series_uid: &str, sop_uid: &str) -> Self {
        Self {
            study_uid: study_uid.to_string(),
            series_uid: series_uid.to_string(),
            sop_uid: sop_uid.to_string(),
            patient_id: Some("PAT001".to_string()),
            patient_name: Some("DOE^JANE".to_string()),
            instance_number: None,
            slice_location: None,
            rows: 2,
            columns: 2,
            photometric: "MONOCHROME2",
            modality: "CT",
            window: None,
            rescale: None,
            pixels: vec![0, 64, 128, 255],
        }
    }

    pub fn instance(mut self, n: i32) -> Self {
        self.instance_number = Some(n);
        self
    }

    pub fn pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = pixels;
        self
    }

    pub fn window(mut self, center: f64, width: f64) -> Self {
        self.window = Some((center, width));
        self
    }

    pub fn no_patient(mut self) -> Self {
        self.patient_id = None;
        self.patient_name = None;
        self
    }

    /// Encode as Part-10 bytes, preamble and file meta included
    pub fn part10(&self) -> Vec<u8> {
        let mut obj = InMemDicomObject::new_empty();
        let put = |o: &mut InMemDicomObject, tag: Tag, vr: VR, val: PrimitiveValue| {
            o.put(DataElement::new(tag, vr, val));
        };

        put(&mut obj, Tag(0x0008, 0x0016), VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE));
        put(&mut obj, Tag(0x0008, 0x0018), VR::UI, PrimitiveValue::from(self.sop_uid.as_str()));
        put(&mut obj, Tag(0x0020, 0x000D), VR::UI, PrimitiveValue::from(self.study_uid.as_str()));
        put(&mut obj, Tag(0x0020, 0x000E), VR::UI, PrimitiveValue::from(self.series_uid.as_str()));
        put(&mut obj, Tag(0x0008, 0x0060), VR::CS, PrimitiveValue::from(self.modality));

        if let Some(patient_id) = &self.patient_id {
            put(&mut obj, Tag(0x0010, 0x0020), VR::LO, PrimitiveValue::from(patient_id.as_str()));
        }
        if let Some(patient_name) = &self.patient_name {
            put(&mut obj, Tag(0x0010, 0x0010), VR::PN, PrimitiveValue::from(patient_name.as_str()));
        }
        if let Some(n) = self.instance_number {
            put(&mut obj, Tag(0x0020, 0x0013), VR::IS, PrimitiveValue::from(n.to_string()));
        }
        if let Some(loc) = self.slice_location {
            put(&mut obj, Tag(0x0020, 0x1041), VR::DS, PrimitiveValue::from(loc.to_string()));
        }
        if let Some((center, width)) = self.window {
            put(&mut obj, Tag(0x0028, 0x1050), VR::DS, PrimitiveValue::from(center.to_string()));
            put(&mut obj, Tag(0x0028, 0x1051), VR::DS, PrimitiveValue::from(width.to_string()));
        }
        if let Some((slope, intercept)) = self.rescale {
            put(&mut obj, Tag(0x0028, 0x1053), VR::DS, PrimitiveValue::from(slope.to_string()));
            put(&mut obj, Tag(0x0028, 0x1052), VR::DS, PrimitiveValue::from(intercept.to_string()));
        }

        put(&mut obj, Tag(0x0028, 0x0002), VR::US, PrimitiveValue::from(1u16));
        put(&mut obj, Tag(0x0028, 0x0004), VR::CS, PrimitiveValue::from(self.photometric));
        put(&mut obj, Tag(0x0028, 0x0010), VR::US, PrimitiveValue::from(self.rows));
        put(&mut obj, Tag(0x0028, 0x0011), VR::US, PrimitiveValue::from(self.columns));
        put(&mut obj, Tag(0x0028, 0x0100), VR::US, PrimitiveValue::from(8u16));
        put(&mut obj, Tag(0x0028, 0x0101), VR::US, PrimitiveValue::from(8u16));
        put(&mut obj, Tag(0x0028, 0x0102), VR::US, PrimitiveValue::from(7u16));
        put(&mut obj, Tag(0x0028, 0x0103), VR::US, PrimitiveValue::from(0u16));
        put(
            &mut obj,
            Tag(0x7FE0, 0x0010),
            VR::OB,
            PrimitiveValue::U8(self.pixels.clone().into()),
        );

        let file_obj = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE),
            )
            .expect("build file meta");

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("slice.dcm");
        file_obj.write_to_file(&path).expect("write dicom file");
        std::fs::read(&path).expect("read dicom file back")
    }
}
