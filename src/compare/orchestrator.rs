//! Comparison orchestration for a pair of files.
//!
//! [`CompareEngine`] decides whether a byte comparison is needed at all
//! (digest short-circuit), whether it is allowed (size guard), and relays the
//! diff engine's asynchronous result to the caller tagged with the request
//! generation. Only the newest generation is ever delivered.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::buffer::{FileBuffer, FileSlot};
use crate::config::{DeltaConfig, DEFAULT_SIZE_LIMIT};
use crate::diff::{ByteComparator, DiffEngine, DiffError, DiffOffset, DiffResult};
use crate::hash::{Algorithm, DigestResult};

/// Monotonically increasing tag of a comparison request.
pub type Generation = u64;

/// Why a full comparison was declined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
pub enum Disallowed {
    #[error("{slot} is not loaded\nSuggestion: Load both files before comparing")]
    MissingBuffer { slot: FileSlot },

    #[error("{slot} is {len} bytes, above the comparison limit of {limit} bytes\nSuggestion: Raise size_limit_bytes or compare digests only")]
    TooLarge { slot: FileSlot, len: u64, limit: u64 },
}

/// What happened to one comparison request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Bytes were compared; an empty list means identical.
    Compared { offsets: Vec<DiffOffset> },
    /// Digests already proved equality; no bytes were compared.
    ShortCircuited { algorithm: Algorithm },
    /// The size guard or a missing buffer declined the request.
    Disallowed { reason: Disallowed },
    /// The comparison itself failed.
    Failed { error: DiffError },
}

impl ComparisonOutcome {
    /// Differing offsets, when the outcome defines them.
    pub fn offsets(&self) -> Option<&[DiffOffset]> {
        match self {
            ComparisonOutcome::Compared { offsets } => Some(offsets),
            ComparisonOutcome::ShortCircuited { .. } => Some(&[]),
            ComparisonOutcome::Disallowed { .. } | ComparisonOutcome::Failed { .. } => None,
        }
    }

    pub fn is_identical(&self) -> bool {
        self.offsets().is_some_and(|offsets| offsets.is_empty())
    }
}

/// A delivered outcome and the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    pub generation: Generation,
    pub outcome: ComparisonOutcome,
}

/// Digest equality of the two loaded slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DigestStatus {
    /// At least one side has no digests yet.
    Pending,
    /// At least one side's hash run failed.
    Failed,
    Match,
    Mismatch,
}

/// True iff both digests are present, successful and equal for `algorithm`.
pub fn should_short_circuit(
    digest_a: Option<&DigestResult>,
    digest_b: Option<&DigestResult>,
    algorithm: Algorithm,
) -> bool {
    match (
        digest_a.and_then(|d| d.hex(algorithm)),
        digest_b.and_then(|d| d.hex(algorithm)),
    ) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Size guard: both buffers present and neither longer than `size_limit`.
pub fn check_comparison_allowed(
    buffer_a: Option<&FileBuffer>,
    buffer_b: Option<&FileBuffer>,
    size_limit: u64,
) -> Result<(), Disallowed> {
    let a = buffer_a.ok_or(Disallowed::MissingBuffer {
        slot: FileSlot::First,
    })?;
    let b = buffer_b.ok_or(Disallowed::MissingBuffer {
        slot: FileSlot::Second,
    })?;
    check_lengths_allowed(a.len() as u64, b.len() as u64, size_limit)
}

/// Size guard on lengths alone, so callers can decline before loading anything.
pub fn check_lengths_allowed(len_a: u64, len_b: u64, size_limit: u64) -> Result<(), Disallowed> {
    for (slot, len) in [(FileSlot::First, len_a), (FileSlot::Second, len_b)] {
        if len > size_limit {
            return Err(Disallowed::TooLarge {
                slot,
                len,
                limit: size_limit,
            });
        }
    }
    Ok(())
}

pub fn is_comparison_allowed(
    buffer_a: Option<&FileBuffer>,
    buffer_b: Option<&FileBuffer>,
    size_limit: u64,
) -> bool {
    check_comparison_allowed(buffer_a, buffer_b, size_limit).is_ok()
}

#[derive(Default)]
struct SlotState {
    buffer: Option<FileBuffer>,
    digests: Option<DigestResult>,
}

// Generation bump and delivery share one lock so an older result can never
// be sent after a newer one.
struct Delivery {
    latest: Generation,
    tx: mpsc::UnboundedSender<ComparisonReport>,
}

impl Delivery {
    fn deliver(delivery: &Mutex<Delivery>, report: ComparisonReport) {
        let guard = delivery.lock().unwrap_or_else(PoisonError::into_inner);
        if report.generation != guard.latest {
            debug!(
                generation = report.generation,
                latest = guard.latest,
                "dropping superseded comparison result"
            );
            return;
        }
        if guard.tx.send(report).is_err() {
            debug!("comparison receiver closed");
        }
    }
}

/// Orchestrates digest short-circuiting, the size guard and diff delivery
/// for one file pair.
pub struct CompareEngine<C = DiffEngine> {
    comparator: Arc<C>,
    size_limit: u64,
    short_circuit: Algorithm,
    slots: Mutex<[SlotState; 2]>,
    delivery: Arc<Mutex<Delivery>>,
}

impl CompareEngine<DiffEngine> {
    /// Build the default pipeline from configuration.
    pub fn from_config(
        config: &DeltaConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ComparisonReport>), DiffError> {
        let diff = DiffEngine::new(config.worker_count())?;
        let (engine, rx) = Self::new(Arc::new(diff));
        let short_circuit = config.short_circuit_algorithm().unwrap_or(Algorithm::Sha256);
        Ok((
            engine
                .with_size_limit(config.size_limit_bytes)
                .with_short_circuit_algorithm(short_circuit),
            rx,
        ))
    }
}

impl<C: ByteComparator + 'static> CompareEngine<C> {
    /// Results are delivered on the returned receiver.
    pub fn new(comparator: Arc<C>) -> (Self, mpsc::UnboundedReceiver<ComparisonReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            comparator,
            size_limit: DEFAULT_SIZE_LIMIT,
            short_circuit: Algorithm::Sha256,
            slots: Mutex::new(Default::default()),
            delivery: Arc::new(Mutex::new(Delivery { latest: 0, tx })),
        };
        (engine, rx)
    }

    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn with_short_circuit_algorithm(mut self, algorithm: Algorithm) -> Self {
        if !algorithm.is_cryptographic() {
            warn!(
                algorithm = %algorithm,
                "short-circuit uses a non-cryptographic digest; equal digests may hide differing bytes"
            );
        }
        self.short_circuit = algorithm;
        self
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    pub fn short_circuit_algorithm(&self) -> Algorithm {
        self.short_circuit
    }

    pub fn should_short_circuit(
        &self,
        digest_a: Option<&DigestResult>,
        digest_b: Option<&DigestResult>,
    ) -> bool {
        should_short_circuit(digest_a, digest_b, self.short_circuit)
    }

    pub fn is_comparison_allowed(
        &self,
        buffer_a: Option<&FileBuffer>,
        buffer_b: Option<&FileBuffer>,
    ) -> bool {
        is_comparison_allowed(buffer_a, buffer_b, self.size_limit)
    }

    /// Newest generation issued so far (0 before any request).
    pub fn latest_generation(&self) -> Generation {
        self.delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
    }

    /// Invalidate any in-flight comparison without starting a new one.
    pub fn supersede(&self) -> Generation {
        let mut guard = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        guard.latest += 1;
        guard.latest
    }

    /// Request a comparison of two buffers.
    ///
    /// The outcome arrives on the receiver tagged with the returned
    /// generation. Disallowed and short-circuited requests are answered
    /// immediately without touching the comparator.
    pub fn request_comparison(
        &self,
        buffer_a: Option<&FileBuffer>,
        buffer_b: Option<&FileBuffer>,
        digest_a: Option<&DigestResult>,
        digest_b: Option<&DigestResult>,
    ) -> Generation {
        let generation = self.supersede();

        if let Err(reason) = check_comparison_allowed(buffer_a, buffer_b, self.size_limit) {
            debug!(generation, %reason, "comparison declined");
            self.deliver(generation, ComparisonOutcome::Disallowed { reason });
            return generation;
        }

        if self.should_short_circuit(digest_a, digest_b) {
            debug!(generation, algorithm = %self.short_circuit, "digests equal, skipping byte comparison");
            self.deliver(
                generation,
                ComparisonOutcome::ShortCircuited {
                    algorithm: self.short_circuit,
                },
            );
            return generation;
        }

        // Both present: checked above
        let (Some(a), Some(b)) = (buffer_a, buffer_b) else {
            return generation;
        };

        debug!(generation, len_a = a.len(), len_b = b.len(), "comparison requested");
        let delivery = Arc::clone(&self.delivery);
        self.comparator.compare_with(
            a.shared(),
            b.shared(),
            Box::new(move |result: DiffResult<Vec<DiffOffset>>| {
                let outcome = match result {
                    Ok(offsets) => ComparisonOutcome::Compared { offsets },
                    Err(error) => ComparisonOutcome::Failed { error },
                };
                Delivery::deliver(&delivery, ComparisonReport { generation, outcome });
            }),
        );
        generation
    }

    /// Size guard on file lengths known before loading.
    pub fn check_lengths(&self, len_a: u64, len_b: u64) -> Result<(), Disallowed> {
        check_lengths_allowed(len_a, len_b, self.size_limit)
    }

    /// Answer with `reason` without touching buffers or the comparator.
    /// Supersedes any in-flight comparison like a normal request.
    pub fn decline(&self, reason: Disallowed) -> Generation {
        let generation = self.supersede();
        debug!(generation, %reason, "comparison declined");
        self.deliver(generation, ComparisonOutcome::Disallowed { reason });
        generation
    }

    fn deliver(&self, generation: Generation, outcome: ComparisonOutcome) {
        Delivery::deliver(&self.delivery, ComparisonReport { generation, outcome });
    }

    /// Replace the content of `slot`. Its digests are cleared and any
    /// in-flight comparison is superseded.
    pub fn set_buffer(&self, slot: FileSlot, buffer: FileBuffer) {
        {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let state = &mut slots[slot.index()];
            state.buffer = Some(buffer);
            state.digests = None;
        }
        self.supersede();
    }

    /// Attach digests to `slot`. Ignored (returns false) when they were
    /// computed for a different path than the one currently loaded.
    pub fn set_digests(&self, slot: FileSlot, digests: DigestResult) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut slots[slot.index()];
        if let Some(buffer) = &state.buffer {
            if buffer.path() != digests.path {
                debug!(
                    slot = %slot,
                    loaded = %buffer.path().display(),
                    digested = %digests.path.display(),
                    "ignoring digests for a replaced file"
                );
                return false;
            }
        }
        state.digests = Some(digests);
        true
    }

    pub fn clear(&self, slot: FileSlot) {
        {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots[slot.index()] = SlotState::default();
        }
        self.supersede();
    }

    pub fn buffer(&self, slot: FileSlot) -> Option<FileBuffer> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots[slot.index()].buffer.clone()
    }

    pub fn digests(&self, slot: FileSlot) -> Option<DigestResult> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots[slot.index()].digests.clone()
    }

    /// Whether the loaded slots pass the size guard.
    pub fn comparison_allowed(&self) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        self.is_comparison_allowed(slots[0].buffer.as_ref(), slots[1].buffer.as_ref())
    }

    pub fn digest_status(&self) -> DigestStatus {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(a), Some(b)) = (slots[0].digests.as_ref(), slots[1].digests.as_ref()) else {
            return DigestStatus::Pending;
        };
        if a.is_failed() || b.is_failed() {
            return DigestStatus::Failed;
        }
        match (a.hex(self.short_circuit), b.hex(self.short_circuit)) {
            (Some(x), Some(y)) if x == y => DigestStatus::Match,
            (Some(_), Some(_)) => DigestStatus::Mismatch,
            _ => DigestStatus::Pending,
        }
    }

    /// Request a comparison of whatever the two slots currently hold.
    pub fn compare_loaded(&self) -> Generation {
        let (buffer_a, buffer_b, digest_a, digest_b) = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            (
                slots[0].buffer.clone(),
                slots[1].buffer.clone(),
                slots[0].digests.clone(),
                slots[1].digests.clone(),
            )
        };
        self.request_comparison(
            buffer_a.as_ref(),
            buffer_b.as_ref(),
            digest_a.as_ref(),
            digest_b.as_ref(),
        )
    }
}
