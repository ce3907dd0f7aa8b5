// Tests for request_comparison: short-circuit, size guard, generations

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use delta::compare::{
    CompareEngine, ComparisonOutcome, ComparisonReport, Disallowed, FileBuffer, FileSlot,
};
use delta::diff::{ByteComparator, DiffCallback, DiffEngine, DiffError, DiffResult};
use delta::hash::{Algorithm, DigestResult};
use tokio::sync::mpsc::UnboundedReceiver;

/// Wraps the real engine and counts invocations
struct CountingComparator {
    inner: DiffEngine,
    calls: AtomicUsize,
}

impl CountingComparator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: DiffEngine::new(4).unwrap(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ByteComparator for CountingComparator {
    fn compare_with(&self, a: Arc<[u8]>, b: Arc<[u8]>, on_complete: DiffCallback) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compare_with(a, b, on_complete);
    }
}

/// Holds callbacks until the test releases them, in any order
#[derive(Default)]
struct GatedComparator {
    pending: Mutex<Vec<DiffCallback>>,
}

impl GatedComparator {
    fn release(&self, index: usize, result: DiffResult<Vec<usize>>) {
        let callback = self.pending.lock().unwrap().remove(index);
        callback(result);
    }

    fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl ByteComparator for GatedComparator {
    fn compare_with(&self, _a: Arc<[u8]>, _b: Arc<[u8]>, on_complete: DiffCallback) {
        self.pending.lock().unwrap().push(on_complete);
    }
}

fn buffer(name: &str, bytes: &[u8]) -> FileBuffer {
    FileBuffer::new(name, bytes.to_vec())
}

fn sha256_digest(path: &str, hex: &str) -> DigestResult {
    DigestResult::from_digests(path, 0, [(Algorithm::Sha256, hex.to_string())])
}

async fn next(rx: &mut UnboundedReceiver<ComparisonReport>) -> ComparisonReport {
    rx.recv().await.expect("engine should deliver a report")
}

#[tokio::test]
async fn test_equal_digests_short_circuit_without_diffing() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    // Distinct content, digests stubbed to collide
    let a = buffer("a.bin", b"AAAA");
    let b = buffer("b.bin", b"BBBB");
    let digest_a = sha256_digest("a.bin", "deadbeef");
    let digest_b = sha256_digest("b.bin", "deadbeef");

    assert!(engine.should_short_circuit(Some(&digest_a), Some(&digest_b)));
    let generation = engine.request_comparison(Some(&a), Some(&b), Some(&digest_a), Some(&digest_b));

    let report = next(&mut rx).await;
    assert_eq!(report.generation, generation);
    assert_eq!(
        report.outcome,
        ComparisonOutcome::ShortCircuited {
            algorithm: Algorithm::Sha256
        }
    );
    assert!(report.outcome.is_identical());
    assert_eq!(comparator.calls(), 0);
}

#[tokio::test]
async fn test_size_guard_blocks_large_buffers() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));
    let engine = engine.with_size_limit(1024 * 1024);

    let big = buffer("big.bin", &vec![7u8; 2 * 1024 * 1024]);
    let small = buffer("small.bin", &[1u8; 10]);

    assert!(!engine.is_comparison_allowed(Some(&big), Some(&small)));
    engine.request_comparison(Some(&big), Some(&small), None, None);

    let report = next(&mut rx).await;
    assert_eq!(
        report.outcome,
        ComparisonOutcome::Disallowed {
            reason: Disallowed::TooLarge {
                slot: FileSlot::First,
                len: 2 * 1024 * 1024,
                limit: 1024 * 1024,
            }
        }
    );
    assert!(report.outcome.offsets().is_none());
    assert_eq!(comparator.calls(), 0);
}

#[tokio::test]
async fn test_size_guard_checked_before_short_circuit() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));
    let engine = engine.with_size_limit(4);

    let a = buffer("a", b"0123456789");
    let b = buffer("b", b"0123456789");
    let digest = sha256_digest("a", "00");
    engine.request_comparison(Some(&a), Some(&b), Some(&digest), Some(&digest));

    let report = next(&mut rx).await;
    assert!(matches!(report.outcome, ComparisonOutcome::Disallowed { .. }));
}

#[tokio::test]
async fn test_missing_buffer_is_reported() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"abc");
    engine.request_comparison(Some(&a), None, None, None);

    let report = next(&mut rx).await;
    assert_eq!(
        report.outcome,
        ComparisonOutcome::Disallowed {
            reason: Disallowed::MissingBuffer {
                slot: FileSlot::Second
            }
        }
    );
    assert_eq!(comparator.calls(), 0);
}

#[tokio::test]
async fn test_different_digests_run_the_diff() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"ABCD");
    let b = buffer("b", b"ABXD");
    let digest_a = sha256_digest("a", "01");
    let digest_b = sha256_digest("b", "02");

    let generation = engine.request_comparison(Some(&a), Some(&b), Some(&digest_a), Some(&digest_b));
    let report = next(&mut rx).await;

    assert_eq!(report.generation, generation);
    assert_eq!(report.outcome, ComparisonOutcome::Compared { offsets: vec![2] });
    assert_eq!(comparator.calls(), 1);
}

#[tokio::test]
async fn test_failed_digests_do_not_short_circuit() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"ABC");
    let b = buffer("b", b"ABCDE");
    let failed = DigestResult::failed("a", &[Algorithm::Sha256], "Permission denied");

    engine.request_comparison(Some(&a), Some(&b), Some(&failed), Some(&failed));
    let report = next(&mut rx).await;

    assert_eq!(report.outcome.offsets(), Some(&[3usize, 4][..]));
    assert_eq!(comparator.calls(), 1);
}

#[tokio::test]
async fn test_identical_content_compares_empty() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"same bytes");
    let b = buffer("b", b"same bytes");
    engine.request_comparison(Some(&a), Some(&b), None, None);

    let report = next(&mut rx).await;
    assert_eq!(report.outcome, ComparisonOutcome::Compared { offsets: vec![] });
    assert!(report.outcome.is_identical());
}

#[tokio::test]
async fn test_newer_request_wins_when_older_finishes_last() {
    let comparator = Arc::new(GatedComparator::default());
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"one");
    let b = buffer("b", b"two");
    let first = engine.request_comparison(Some(&a), Some(&b), None, None);
    let second = engine.request_comparison(Some(&a), Some(&b), None, None);
    assert!(second > first);
    assert_eq!(comparator.pending(), 2);

    // Newer finishes first, then the stale one
    comparator.release(1, Ok(vec![1, 2]));
    comparator.release(0, Ok(vec![99]));

    let report = next(&mut rx).await;
    assert_eq!(report.generation, second);
    assert_eq!(report.outcome, ComparisonOutcome::Compared { offsets: vec![1, 2] });
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_stale_result_dropped_when_it_finishes_first() {
    let comparator = Arc::new(GatedComparator::default());
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"one");
    let b = buffer("b", b"two");
    engine.request_comparison(Some(&a), Some(&b), None, None);
    let latest = engine.request_comparison(Some(&a), Some(&b), None, None);

    comparator.release(0, Ok(vec![99]));
    assert!(rx.try_recv().is_err());

    comparator.release(0, Ok(vec![0, 1, 2]));
    let report = next(&mut rx).await;
    assert_eq!(report.generation, latest);
    assert_eq!(engine.latest_generation(), latest);
}

#[tokio::test]
async fn test_supersede_discards_in_flight_result() {
    let comparator = Arc::new(GatedComparator::default());
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"x");
    let b = buffer("b", b"y");
    engine.request_comparison(Some(&a), Some(&b), None, None);
    engine.supersede();

    comparator.release(0, Ok(vec![0]));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_comparison_failure_is_distinct() {
    let comparator = Arc::new(GatedComparator::default());
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"x");
    let b = buffer("b", b"y");
    engine.request_comparison(Some(&a), Some(&b), None, None);

    let error = DiffError::ChunkFailed {
        start: 0,
        end: 1,
        reason: "boom".to_string(),
    };
    comparator.release(0, Err(error.clone()));

    let report = next(&mut rx).await;
    assert_eq!(report.outcome, ComparisonOutcome::Failed { error });
    assert!(report.outcome.offsets().is_none());
    assert!(!report.outcome.is_identical());
}

#[tokio::test]
async fn test_non_cryptographic_short_circuit_is_honoured() {
    let comparator = CountingComparator::new();
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));
    let engine = engine.with_short_circuit_algorithm(Algorithm::Xxh3);

    let a = buffer("a", b"1");
    let b = buffer("b", b"2");
    let digest = DigestResult::from_digests("a", 1, [(Algorithm::Xxh3, "abcd".to_string())]);
    engine.request_comparison(Some(&a), Some(&b), Some(&digest), Some(&digest));

    let report = next(&mut rx).await;
    assert_eq!(
        report.outcome,
        ComparisonOutcome::ShortCircuited {
            algorithm: Algorithm::Xxh3
        }
    );
    assert_eq!(comparator.calls(), 0);
}

#[tokio::test]
async fn test_decline_supersedes_in_flight_comparison() {
    let comparator = Arc::new(GatedComparator::default());
    let (engine, mut rx) = CompareEngine::new(Arc::clone(&comparator));

    let a = buffer("a", b"x");
    let b = buffer("b", b"y");
    engine.request_comparison(Some(&a), Some(&b), None, None);

    let reason = engine.check_lengths(2 * 1024 * 1024, 3).unwrap_err();
    let generation = engine.decline(reason.clone());

    comparator.release(0, Ok(vec![0]));
    let report = next(&mut rx).await;
    assert_eq!(report.generation, generation);
    assert_eq!(report.outcome, ComparisonOutcome::Disallowed { reason });
    assert!(rx.try_recv().is_err());
}
