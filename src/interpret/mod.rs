//! Series interpretation: sampling, caching, and the provider round trip
//!
//! Results are cached under a content fingerprint of the series, so a
//! re-upload with different pixel data misses naturally. Concurrent requests
//! for the same fingerprint are collapsed into one provider call; failures
//! are handed to every waiter of that attempt and never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use interp::{Interpretation, Interpreter, SampledImage, TokenUsage};

use crate::error::{PrismError, Result};
use crate::hierarchy::{evenly_spaced_indices, HierarchyStore};
use crate::ingest::SliceRecord;
use crate::render;

pub const DISCLAIMER: &str = "Educational/research use only. Not for clinical decisions.";

/// One cached provider response
#[derive(Debug)]
pub struct StoredInterpretation {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
    pub generated_at: DateTime<Utc>,
}

impl StoredInterpretation {
    fn from_provider(interpretation: Interpretation) -> Self {
        Self {
            text: interpretation.text,
            model: interpretation.model,
            usage: interpretation.usage,
            generated_at: Utc::now(),
        }
    }
}

/// Response body for the interpret endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InterpretationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    pub disclaimer: &'static str,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl InterpretationResult {
    fn from_stored(stored: &StoredInterpretation, from_cache: bool) -> Self {
        Self {
            success: true,
            interpretation: Some(stored.text.clone()),
            error: None,
            model: Some(stored.model.clone()),
            usage: Some(stored.usage.clone()),
            disclaimer: DISCLAIMER,
            from_cache,
            generated_at: Some(stored.generated_at.to_rfc3339()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            interpretation: None,
            error: Some(message.into()),
            model: None,
            usage: None,
            disclaimer: DISCLAIMER,
            from_cache: false,
            generated_at: None,
        }
    }
}

type SharedOutcome = std::result::Result<Arc<StoredInterpretation>, Arc<PrismError>>;

enum Slot {
    Ready(Arc<StoredInterpretation>),
    Pending {
        ticket: u64,
        rx: watch::Receiver<Option<SharedOutcome>>,
        /// Previous Ready value, kept so a failed refresh does not evict it
        prev: Option<Arc<StoredInterpretation>>,
    },
}

/// What a cache lookup produced
#[derive(Debug)]
pub struct CacheOutcome {
    pub stored: Arc<StoredInterpretation>,
    pub from_cache: bool,
}

/// Fingerprint-keyed single-flight cache over provider responses
#[derive(Default)]
pub struct InterpretationCache {
    slots: Mutex<HashMap<String, Slot>>,
    tickets: AtomicU64,
}

impl InterpretationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, or run `compute` to fill it.
    ///
    /// At most one computation runs per key at a time; later callers wait on
    /// its outcome. `force_refresh` skips the cached value but still joins an
    /// in-flight computation rather than starting a second one. A failed
    /// computation is reported to the callers of that attempt and leaves the
    /// previous cached value (if any) in place.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        force_refresh: bool,
        compute: F,
    ) -> Result<CacheOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredInterpretation>>,
    {
        loop {
            let claim = {
                let mut slots = self.slots.lock().expect("cache lock poisoned");
                match slots.get(key) {
                    Some(Slot::Ready(stored)) if !force_refresh => {
                        return Ok(CacheOutcome {
                            stored: Arc::clone(stored),
                            from_cache: true,
                        });
                    }
                    Some(Slot::Pending { rx, prev, .. }) => {
                        // A non-refresh reader can still be served by the
                        // value a refresh is replacing.
                        if !force_refresh {
                            if let Some(prev) = prev {
                                return Ok(CacheOutcome {
                                    stored: Arc::clone(prev),
                                    from_cache: true,
                                });
                            }
                        }
                        Claim::Join(rx.clone())
                    }
                    other => {
                        let prev = match other {
                            Some(Slot::Ready(stored)) => Some(Arc::clone(stored)),
                            _ => None,
                        };
                        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        slots.insert(
                            key.to_string(),
                            Slot::Pending {
                                ticket,
                                rx,
                                prev: prev.clone(),
                            },
                        );
                        Claim::Compute { ticket, tx, prev }
                    }
                }
            };

            match claim {
                Claim::Join(mut rx) => {
                    debug!(key, "joining in-flight interpretation");
                    loop {
                        let outcome = rx.borrow().clone();
                        if let Some(outcome) = outcome {
                            return match outcome {
                                Ok(stored) => Ok(CacheOutcome {
                                    stored,
                                    from_cache: true,
                                }),
                                Err(err) => Err(clone_for_waiter(&err)),
                            };
                        }
                        if rx.changed().await.is_err() {
                            // Computation was dropped without publishing;
                            // start over from the top.
                            break;
                        }
                    }
                }
                Claim::Compute { ticket, tx, prev } => {
                    let guard = PendingGuard {
                        cache: self,
                        key: key.to_string(),
                        ticket,
                        prev,
                        armed: true,
                    };
                    return self.run_compute(key, guard, tx, compute).await;
                }
            }
        }
    }

    async fn run_compute<F, Fut>(
        &self,
        key: &str,
        mut guard: PendingGuard<'_>,
        tx: watch::Sender<Option<SharedOutcome>>,
        compute: F,
    ) -> Result<CacheOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredInterpretation>>,
    {
        match compute().await {
            Ok(stored) => {
                let stored = Arc::new(stored);
                {
                    let mut slots = self.slots.lock().expect("cache lock poisoned");
                    slots.insert(key.to_string(), Slot::Ready(Arc::clone(&stored)));
                }
                guard.armed = false;
                let _ = tx.send(Some(Ok(Arc::clone(&stored))));
                Ok(CacheOutcome {
                    stored,
                    from_cache: false,
                })
            }
            Err(err) => {
                // Failures are never cached; restore whatever was there.
                drop(guard);
                let err = Arc::new(err);
                let _ = tx.send(Some(Err(Arc::clone(&err))));
                Err(clone_for_waiter(&err))
            }
        }
    }
}

enum Claim {
    Join(watch::Receiver<Option<SharedOutcome>>),
    Compute {
        ticket: u64,
        tx: watch::Sender<Option<SharedOutcome>>,
        prev: Option<Arc<StoredInterpretation>>,
    },
}

/// Clears the pending slot if the computation never published, putting the
/// displaced Ready value back. Covers cancellation as well as failure.
struct PendingGuard<'a> {
    cache: &'a InterpretationCache,
    key: String,
    ticket: u64,
    prev: Option<Arc<StoredInterpretation>>,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.cache.slots.lock().expect("cache lock poisoned");
        let ours = matches!(
            slots.get(&self.key),
            Some(Slot::Pending { ticket, .. }) if *ticket == self.ticket
        );
        if ours {
            match self.prev.take() {
                Some(prev) => {
                    slots.insert(self.key.clone(), Slot::Ready(prev));
                }
                None => {
                    slots.remove(&self.key);
                }
            }
        }
    }
}

/// Provider errors are not cloneable as-is; waiters get an equivalent.
fn clone_for_waiter(err: &PrismError) -> PrismError {
    match err {
        PrismError::ProviderUnavailable(msg) => PrismError::ProviderUnavailable(msg.clone()),
        PrismError::ProviderError(msg) => PrismError::ProviderError(msg.clone()),
        PrismError::InternalConsistency(msg) => PrismError::InternalConsistency(msg.clone()),
        other => PrismError::ProviderError(other.to_string()),
    }
}

/// Interpret a whole series: sample evenly-spaced slices, render them, and
/// send the batch to the provider, going through the fingerprint cache.
pub async fn interpret_series(
    store: &HierarchyStore,
    cache: &InterpretationCache,
    interpreter: &dyn Interpreter,
    series_uid: &str,
    sample_count: usize,
    refresh: bool,
    context: Option<&str>,
) -> Result<InterpretationResult> {
    // One snapshot keeps the fingerprint and the records it was computed
    // from consistent even when an ingest lands mid-request.
    let snapshot = store.series_snapshot(series_uid, sample_count)?;
    if snapshot.records.is_empty() {
        return Err(PrismError::consistency("series has no slices"));
    }
    let fingerprint = snapshot.fingerprint;
    let records = snapshot.records;
    let modality = snapshot
        .summary
        .modality
        .unwrap_or_else(|| "CT".to_string());

    let outcome = cache
        .get_or_compute(&fingerprint, refresh, || async {
            let indices = evenly_spaced_indices(records.len(), sample_count);
            info!(
                series_uid,
                sampled = indices.len(),
                total = records.len(),
                "requesting series interpretation"
            );
            let mut images = Vec::with_capacity(indices.len());
            for i in indices {
                let png = render::render_default_png(&records[i])?;
                images.push(SampledImage::png(BASE64.encode(png)));
            }
            let interpretation = interpreter.interpret(&images, &modality, context).await?;
            Ok(StoredInterpretation::from_provider(interpretation))
        })
        .await?;

    Ok(InterpretationResult::from_stored(
        &outcome.stored,
        outcome.from_cache,
    ))
}

/// Interpret a single slice, cached under its own content fingerprint.
pub async fn interpret_single(
    cache: &InterpretationCache,
    interpreter: &dyn Interpreter,
    record: &SliceRecord,
    refresh: bool,
    context: Option<&str>,
) -> Result<InterpretationResult> {
    let fingerprint = slice_fingerprint(record);
    let modality = record.modality.clone().unwrap_or_else(|| "CT".to_string());

    let outcome = cache
        .get_or_compute(&fingerprint, refresh, || async {
            let png = render::render_default_png(record)?;
            let images = vec![SampledImage::png(BASE64.encode(png))];
            let interpretation = interpreter.interpret(&images, &modality, context).await?;
            Ok(StoredInterpretation::from_provider(interpretation))
        })
        .await?;

    Ok(InterpretationResult::from_stored(
        &outcome.stored,
        outcome.from_cache,
    ))
}

fn slice_fingerprint(record: &SliceRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.sop_uid.as_bytes());
    hasher.update([0u8]);
    hasher.update(&record.pixel_data);
    format!("{:x}", hasher.finalize())
}

/// Availability snapshot for the status endpoint
#[derive(Debug, Serialize)]
pub struct InterpreterStatus {
    pub available: bool,
    pub model: String,
    pub cached_results: usize,
}

pub fn status(
    interpreter: &dyn Interpreter,
    model: &str,
    cache: &InterpretationCache,
) -> InterpreterStatus {
    let available = interpreter.is_available();
    if !available {
        warn!("interpretation provider has no credentials configured");
    }
    InterpreterStatus {
        available,
        model: model.to_string(),
        cached_results: cache.len(),
    }
}
