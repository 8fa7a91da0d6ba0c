//! Hierarchy organizer: the patient/study/series/slice index
//!
//! One process-scoped store, created empty at startup and passed explicitly
//! to whoever needs it. Mutation is serialized per series; cross-series
//! bookkeeping takes a short-held lock over the index structure only, never
//! over a series' slice data. Queries hand out snapshots so callers never
//! observe a partially-updated sequence.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{KeyKind, PrismError, Result};
use crate::ingest::SliceRecord;

/// Where an ingested record landed in the hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub patient_key: String,
    pub study_key: String,
    pub series_key: String,
    /// Position of the slice in the series' ordered sequence
    pub slice_position: usize,
}

/// Listing row for one study
#[derive(Debug, Clone, Serialize)]
pub struct StudySummary {
    pub study_uid: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub study_description: Option<String>,
    pub series_count: usize,
}

/// Listing row for one series
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub series_uid: String,
    pub study_uid: String,
    pub series_number: Option<i32>,
    pub series_description: Option<String>,
    pub modality: Option<String>,
    pub body_part: Option<String>,
    pub slice_count: usize,
}

/// One consistent view of a series taken under a single lock acquisition
#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    pub summary: SeriesSummary,
    pub records: Vec<Arc<SliceRecord>>,
    pub fingerprint: String,
}

/// Listing row for one slice
#[derive(Debug, Clone, Serialize)]
pub struct SliceSummary {
    pub sop_uid: String,
    pub series_uid: String,
    pub study_uid: String,
    pub instance_number: Option<i32>,
    pub slice_location: Option<f64>,
    pub rows: u16,
    pub columns: u16,
    pub source_path: String,
}

struct StudyEntry {
    study_uid: String,
    patient_id: String,
    patient_name: Option<String>,
    study_date: Option<String>,
    study_description: Option<String>,
    /// Series insertion order, preserved for listing
    series_order: Vec<String>,
}

struct SliceEntry {
    /// Monotonic per-series upload sequence; final ordering tiebreaker
    seq: u64,
    record: Arc<SliceRecord>,
}

struct SeriesEntry {
    series_uid: String,
    study_uid: String,
    series_number: Option<i32>,
    series_description: Option<String>,
    modality: Option<String>,
    body_part: Option<String>,
    slices: Vec<SliceEntry>,
    next_seq: u64,
}

impl SeriesEntry {
    /// Sort ascending by (instance number, slice location, upload order).
    /// Absent keys sort last so partially-tagged series stay stable.
    fn sort_slices(&mut self) {
        self.slices.sort_by(|a, b| {
            let by_instance = option_cmp(a.record.instance_number, b.record.instance_number);
            if by_instance != Ordering::Equal {
                return by_instance;
            }
            let by_location = match (a.record.slice_location, b.record.slice_location) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if by_location != Ordering::Equal {
                return by_location;
            }
            a.seq.cmp(&b.seq)
        });
    }

    fn position_of(&self, sop_uid: &str) -> usize {
        self.slices
            .iter()
            .position(|s| s.record.sop_uid == sop_uid)
            .unwrap_or(0)
    }

    fn summary(&self) -> SeriesSummary {
        SeriesSummary {
            series_uid: self.series_uid.clone(),
            study_uid: self.study_uid.clone(),
            series_number: self.series_number,
            series_description: self.series_description.clone(),
            modality: self.modality.clone(),
            body_part: self.body_part.clone(),
            slice_count: self.slices.len(),
        }
    }
}

fn option_cmp<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Default)]
struct IndexState {
    /// Study insertion order, preserved for listing
    study_order: Vec<String>,
    studies: HashMap<String, StudyEntry>,
    /// Each series guards its own slice sequence
    series: HashMap<String, Arc<RwLock<SeriesEntry>>>,
    /// SOP instance uid -> owning series uid (SOP uids are globally unique)
    slices: HashMap<String, String>,
}

/// The process-wide hierarchy index
#[derive(Default)]
pub struct HierarchyStore {
    index: RwLock<IndexState>,
}

impl HierarchyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one parsed slice record.
    ///
    /// Idempotent per SOP instance uid: re-ingesting replaces the stored
    /// record in place, keeping its upload-order tiebreaker; the sequence is
    /// re-sorted only when ordering keys may have moved it.
    pub fn ingest(&self, record: SliceRecord) -> Result<IngestOutcome> {
        let record = Arc::new(record);
        let patient_key = record.patient_id.clone();
        let study_key = record.study_uid.clone();
        let series_key = record.series_uid.clone();

        // Short-held index lock: study/series bookkeeping and the SOP map.
        let (series_handle, displaced) = {
            let mut index = self.index.write().expect("hierarchy index poisoned");

            if !index.studies.contains_key(&study_key) {
                index.study_order.push(study_key.clone());
                index.studies.insert(
                    study_key.clone(),
                    StudyEntry {
                        study_uid: study_key.clone(),
                        patient_id: record.patient_id.clone(),
                        patient_name: record.patient_name.clone(),
                        study_date: record.study_date.clone(),
                        study_description: record.study_description.clone(),
                        series_order: Vec::new(),
                    },
                );
                info!(study_uid = %study_key, "registered new study");
            }

            if !index.series.contains_key(&series_key) {
                index.series.insert(
                    series_key.clone(),
                    Arc::new(RwLock::new(SeriesEntry {
                        series_uid: series_key.clone(),
                        study_uid: study_key.clone(),
                        series_number: record.series_number,
                        series_description: record.series_description.clone(),
                        modality: record.modality.clone(),
                        body_part: record.body_part.clone(),
                        slices: Vec::new(),
                        next_seq: 0,
                    })),
                );
                let study = index
                    .studies
                    .get_mut(&study_key)
                    .expect("study registered above");
                study.series_order.push(series_key.clone());
                debug!(series_uid = %series_key, study_uid = %study_key, "registered new series");
            }

            // A re-ingest that moved the SOP uid to a different series has to
            // evict it from the old one.
            let displaced = match index.slices.get(&record.sop_uid) {
                Some(old_series) if *old_series != series_key => {
                    index.series.get(old_series).cloned()
                }
                _ => None,
            };
            index
                .slices
                .insert(record.sop_uid.clone(), series_key.clone());

            let handle = index
                .series
                .get(&series_key)
                .cloned()
                .expect("series registered above");
            (handle, displaced)
        };

        if let Some(old_series) = displaced {
            let mut entry = old_series.write().expect("series lock poisoned");
            entry.slices.retain(|s| s.record.sop_uid != record.sop_uid);
        }

        // Per-series exclusive section: insert or replace, then order.
        let slice_position = {
            let mut entry = series_handle.write().expect("series lock poisoned");

            match entry
                .slices
                .iter_mut()
                .find(|s| s.record.sop_uid == record.sop_uid)
            {
                Some(existing) => {
                    let keys_changed = existing.record.instance_number != record.instance_number
                        || existing.record.slice_location != record.slice_location;
                    existing.record = Arc::clone(&record);
                    if keys_changed {
                        entry.sort_slices();
                    }
                }
                None => {
                    let seq = entry.next_seq;
                    entry.next_seq += 1;
                    entry.slices.push(SliceEntry {
                        seq,
                        record: Arc::clone(&record),
                    });
                    entry.sort_slices();
                }
            }

            entry.position_of(&record.sop_uid)
        };

        Ok(IngestOutcome {
            patient_key,
            study_key,
            series_key,
            slice_position,
        })
    }

    /// Snapshot of all studies in upload order
    pub fn list_studies(&self) -> Vec<StudySummary> {
        let index = self.index.read().expect("hierarchy index poisoned");
        index
            .study_order
            .iter()
            .filter_map(|uid| index.studies.get(uid))
            .map(|study| StudySummary {
                study_uid: study.study_uid.clone(),
                patient_id: study.patient_id.clone(),
                patient_name: study.patient_name.clone(),
                study_date: study.study_date.clone(),
                study_description: study.study_description.clone(),
                series_count: study.series_order.len(),
            })
            .collect()
    }

    /// Snapshot of a study's series in insertion order
    pub fn list_series(&self, study_uid: &str) -> Result<Vec<SeriesSummary>> {
        let handles: Vec<Arc<RwLock<SeriesEntry>>> = {
            let index = self.index.read().expect("hierarchy index poisoned");
            let study = index
                .studies
                .get(study_uid)
                .ok_or_else(|| PrismError::unknown_key(KeyKind::Study, study_uid))?;
            study
                .series_order
                .iter()
                .filter_map(|uid| index.series.get(uid).cloned())
                .collect()
        };

        Ok(handles
            .iter()
            .map(|h| h.read().expect("series lock poisoned").summary())
            .collect())
    }

    /// Snapshot of a series' slices in display order
    pub fn list_slices(&self, series_uid: &str) -> Result<Vec<SliceSummary>> {
        let entry = self.series_handle(series_uid)?;
        let entry = entry.read().expect("series lock poisoned");
        Ok(entry
            .slices
            .iter()
            .map(|s| SliceSummary {
                sop_uid: s.record.sop_uid.clone(),
                series_uid: s.record.series_uid.clone(),
                study_uid: s.record.study_uid.clone(),
                instance_number: s.record.instance_number,
                slice_location: s.record.slice_location,
                rows: s.record.rows,
                columns: s.record.columns,
                source_path: s.record.source_path.clone(),
            })
            .collect())
    }

    /// Ordered snapshot of a series' records, for rendering or sampling
    /// Summary, ordered records, and content fingerprint taken under one lock
    /// acquisition, so the fingerprint always describes exactly the records
    /// returned even while ingests land concurrently.
    pub fn series_snapshot(&self, series_uid: &str, sample_count: usize) -> Result<SeriesSnapshot> {
        let entry = self.series_handle(series_uid)?;
        let entry = entry.read().expect("series lock poisoned");
        let records: Vec<Arc<SliceRecord>> =
            entry.slices.iter().map(|s| Arc::clone(&s.record)).collect();
        Ok(SeriesSnapshot {
            summary: entry.summary(),
            fingerprint: fingerprint_records(&entry.series_uid, &records, sample_count),
            records,
        })
    }

    /// Look up one slice record by SOP instance uid
    pub fn slice(&self, sop_uid: &str) -> Result<Arc<SliceRecord>> {
        let series_uid = {
            let index = self.index.read().expect("hierarchy index poisoned");
            index
                .slices
                .get(sop_uid)
                .cloned()
                .ok_or_else(|| PrismError::unknown_key(KeyKind::Slice, sop_uid))?
        };
        let entry = self.series_handle(&series_uid)?;
        let entry = entry.read().expect("series lock poisoned");
        entry
            .slices
            .iter()
            .find(|s| s.record.sop_uid == sop_uid)
            .map(|s| Arc::clone(&s.record))
            .ok_or_else(|| PrismError::unknown_key(KeyKind::Slice, sop_uid))
    }

    /// Content fingerprint of a series' current slice sequence.
    ///
    /// Covers the ordered SOP uids plus the pixel buffers of an evenly-spaced
    /// sample of slices, so re-uploading altered content changes the key even
    /// when the series uid stays the same.
    pub fn fingerprint(&self, series_uid: &str, sample_count: usize) -> Result<String> {
        Ok(self.series_snapshot(series_uid, sample_count)?.fingerprint)
    }

    fn series_handle(&self, series_uid: &str) -> Result<Arc<RwLock<SeriesEntry>>> {
        let index = self.index.read().expect("hierarchy index poisoned");
        index
            .series
            .get(series_uid)
            .cloned()
            .ok_or_else(|| PrismError::unknown_key(KeyKind::Series, series_uid))
    }
}

fn fingerprint_records(series_uid: &str, records: &[Arc<SliceRecord>], sample_count: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(series_uid.as_bytes());
    hasher.update((records.len() as u64).to_le_bytes());
    for r in records {
        hasher.update(r.sop_uid.as_bytes());
        hasher.update([0u8]);
    }
    for i in evenly_spaced_indices(records.len(), sample_count) {
        hasher.update(&records[i].pixel_data);
    }
    format!("{:x}", hasher.finalize())
}

/// Indices of an evenly-spaced sample of `count` items out of `len`,
/// endpoints included; the whole range when `len <= count`.
pub fn evenly_spaced_indices(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if len <= count {
        return (0..len).collect();
    }
    if count == 1 {
        return vec![0];
    }
    (0..count)
        .map(|i| i * (len - 1) / (count - 1))
        .collect()
}
