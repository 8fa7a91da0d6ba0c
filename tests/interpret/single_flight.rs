//! Concurrent interpretation requests collapse into one provider call

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use common::SyntheticSlice;
use interp::{InterpError, Interpretation, Interpreter, SampledImage, TokenUsage};
use prism::error::PrismError;
use prism::hierarchy::HierarchyStore;
use prism::ingest::parse_slice;
use prism::interpret::{self, InterpretationCache};

struct MockInterpreter {
    calls: AtomicUsize,
    fail: bool,
    available: bool,
    gate: Option<watch::Receiver<bool>>,
}

impl MockInterpreter {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            available: true,
            gate: None,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    fn gated(gate: watch::Receiver<bool>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::ok()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interpreter for MockInterpreter {
    async fn interpret(
        &self,
        images: &[SampledImage],
        modality: &str,
        _context: Option<&str>,
    ) -> interp::Result<Interpretation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            while !*gate.borrow_and_update() {
                gate.changed().await.expect("gate dropped");
            }
        }
        if self.fail {
            return Err(InterpError::provider("mock provider failure"));
        }
        Ok(Interpretation {
            text: format!("{} images of a {} scan look unremarkable", images.len(), modality),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
        })
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

fn seeded_store(slice_count: i32) -> HierarchyStore {
    let store = HierarchyStore::new();
    for i in 1..=slice_count {
        let bytes = SyntheticSlice::new("study-1", "series-1", &format!("sop-{}", i))
            .instance(i)
            .window(128.0, 256.0)
            .part10();
        let record = parse_slice(&bytes, &format!("p/chest/{}.dcm", i)).expect("parse slice");
        store.ingest(record).expect("ingest record");
    }
    store
}

#[tokio::test]
async fn eight_concurrent_requests_one_provider_call() {
    let store = Arc::new(seeded_store(3));
    let cache = Arc::new(InterpretationCache::new());
    let (gate_tx, gate_rx) = watch::channel(false);
    let interpreter = Arc::new(MockInterpreter::gated(gate_rx));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let cache = Arc::clone(&cache);
        let interpreter = Arc::clone(&interpreter);
        handles.push(tokio::spawn(async move {
            interpret::interpret_series(
                &store,
                &cache,
                interpreter.as_ref(),
                "series-1",
                5,
                false,
                None,
            )
            .await
        }));
    }

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    gate_tx.send(true).expect("open gate");

    let mut fresh = 0;
    for handle in handles {
        let result = handle.await.expect("join").expect("interpretation");
        assert!(result.success);
        if !result.from_cache {
            fresh += 1;
        }
    }
    assert_eq!(interpreter.call_count(), 1);
    assert_eq!(fresh, 1);
}

#[tokio::test]
async fn provider_failure_reaches_every_waiter_and_is_not_cached() {
    let store = seeded_store(2);
    let cache = InterpretationCache::new();
    let interpreter = MockInterpreter::failing();

    let err = interpret::interpret_series(&store, &cache, &interpreter, "series-1", 5, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::ProviderError(_)));
    assert!(cache.is_empty());

    // A later request retries rather than replaying the failure
    let err = interpret::interpret_series(&store, &cache, &interpreter, "series-1", 5, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::ProviderError(_)));
    assert_eq!(interpreter.call_count(), 2);
}

#[tokio::test]
async fn sampling_is_capped_at_the_configured_count() {
    let store = seeded_store(12);
    let cache = InterpretationCache::new();
    let interpreter = MockInterpreter::ok();

    let result = interpret::interpret_series(&store, &cache, &interpreter, "series-1", 5, false, None)
        .await
        .expect("interpretation");
    assert!(result.success);
    assert_eq!(
        result.interpretation.as_deref(),
        Some("5 images of a CT scan look unremarkable")
    );
}

#[tokio::test]
async fn unknown_series_never_reaches_the_provider() {
    let store = seeded_store(1);
    let cache = InterpretationCache::new();
    let interpreter = MockInterpreter::ok();

    let err = interpret::interpret_series(&store, &cache, &interpreter, "missing", 5, false, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::UnknownKey { .. }));
    assert_eq!(interpreter.call_count(), 0);
}

#[tokio::test]
async fn single_slice_interpretation_caches_by_content() {
    let store = seeded_store(1);
    let cache = InterpretationCache::new();
    let interpreter = MockInterpreter::ok();
    let record = store.slice("sop-1").expect("slice");

    let first = interpret::interpret_single(&cache, &interpreter, &record, false, None)
        .await
        .expect("interpretation");
    assert!(!first.from_cache);

    let second = interpret::interpret_single(&cache, &interpreter, &record, false, None)
        .await
        .expect("interpretation");
    assert!(second.from_cache);
    assert_eq!(interpreter.call_count(), 1);
}
