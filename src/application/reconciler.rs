//! Content reconciler: the only path between editors and the content store.
//!
//! Loads are total and always yield a displayable, order-normalized snapshot.
//! Saves pass the default-content gate first and are then either written at
//! once or parked in a single debounce slot, where a newer save replaces the
//! parked one. Every write attempt publishes exactly one [`SaveEvent`].
//!
//! Per pending save the slot moves `Idle → Pending → Writing → Idle`. Re-arming
//! while pending swaps the parked snapshot and restarts the timer. Once the
//! timer has fired the write can no longer be cancelled, and writes are
//! serialized so two delete/insert pairs never interleave.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::content::ContentSnapshot;
use crate::domain::ordering::normalize_order;
use crate::util::lock::mutex_lock;

use super::classifier::{ClassifyError, DefaultClassifier, Verdict};
use super::events::{SaveEvent, SaveEvents, SaveTrigger};
use super::interchange::{self, InterchangeError};
use super::repos::ContentRepo;

const SOURCE: &str = "application::reconciler";

const DEFAULT_DEBOUNCE_MS: u64 = 1000;
const DEFAULT_EVENT_CAPACITY: usize = 16;

pub(crate) const METRIC_SAVE_BLOCKED: &str = "blockvault_save_blocked_total";
pub(crate) const METRIC_SAVE_WRITTEN: &str = "blockvault_save_written_total";
pub(crate) const METRIC_SAVE_FAILED: &str = "blockvault_save_failed_total";
pub(crate) const METRIC_SAVE_SUPERSEDED: &str = "blockvault_save_superseded_total";
pub(crate) const METRIC_LOAD_BASELINE: &str = "blockvault_load_baseline_total";

/// Behavioural switches for a [`ContentReconciler`].
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Quiet period before a non-immediate save is written.
    pub debounce: Duration,
    /// Refuse stored records that classify as default and show the baseline.
    pub reject_default_on_load: bool,
    /// Let `reset` overwrite the stored record with the baseline.
    pub reset_persists: bool,
    /// Buffered save events per subscriber.
    pub event_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            reject_default_on_load: true,
            reset_persists: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&crate::config::ReconcilerSettings> for ReconcilerConfig {
    fn from(settings: &crate::config::ReconcilerSettings) -> Self {
        Self {
            debounce: settings.debounce,
            reject_default_on_load: settings.reject_default_on_load,
            reset_persists: settings.reset_persists,
            event_capacity: settings.event_capacity.get(),
        }
    }
}

/// Why a save never reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    DefaultContent,
    Empty,
    /// Block ids are not unique.
    InvalidSnapshot,
}

impl BlockReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockReason::DefaultContent => "default_content",
            BlockReason::Empty => "empty",
            BlockReason::InvalidSnapshot => "invalid_snapshot",
        }
    }
}

/// What `save` did with a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Rejected by the gate; the store was not contacted.
    Blocked(BlockReason),
    /// Parked in the debounce slot.
    Scheduled,
    /// Written to the store.
    Written,
    /// The store rejected the write.
    Failed { error: String },
}

/// Why the baseline was returned instead of stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineReason {
    NoRecord,
    DefaultStored,
    StoreError,
}

impl BaselineReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BaselineReason::NoRecord => "no_record",
            BaselineReason::DefaultStored => "default_stored",
            BaselineReason::StoreError => "store_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Stored,
    Baseline(BaselineReason),
}

/// A loaded snapshot together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub snapshot: ContentSnapshot,
    pub source: ContentSource,
}

struct PendingSave {
    snapshot: ContentSnapshot,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceSlot {
    generation: u64,
    pending: Option<PendingSave>,
}

struct Inner {
    repo: Arc<dyn ContentRepo>,
    classifier: DefaultClassifier,
    baseline: ContentSnapshot,
    config: ReconcilerConfig,
    events: SaveEvents,
    slot: Mutex<DebounceSlot>,
    write_lock: AsyncMutex<()>,
}

/// Mediates every load and save of one content record.
///
/// Cloning yields another handle to the same debounce slot and event channel.
#[derive(Clone)]
pub struct ContentReconciler {
    inner: Arc<Inner>,
}

impl ContentReconciler {
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        classifier: DefaultClassifier,
        baseline: ContentSnapshot,
        config: ReconcilerConfig,
    ) -> Self {
        let events = SaveEvents::new(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                repo,
                classifier,
                baseline: normalize_order(&baseline),
                config,
                events,
                slot: Mutex::new(DebounceSlot::default()),
                write_lock: AsyncMutex::new(()),
            }),
        }
    }

    /// Receive one [`SaveEvent`] per write attempt from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    pub fn classifier(&self) -> &DefaultClassifier {
        &self.inner.classifier
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Score `snapshot` with the configured classifier.
    pub fn verdict(&self, snapshot: &ContentSnapshot) -> Result<Verdict, ClassifyError> {
        self.inner.classifier.evaluate(snapshot)
    }

    /// Pure order normalization, see [`normalize_order`].
    pub fn normalize_order(&self, snapshot: &ContentSnapshot) -> ContentSnapshot {
        normalize_order(snapshot)
    }

    /// The normalized baseline for first paint, without touching the store.
    pub fn display_baseline(&self) -> ContentSnapshot {
        self.inner.baseline.clone()
    }

    /// Load the content to display. Never fails.
    pub async fn load(&self) -> ContentSnapshot {
        self.load_with_source().await.snapshot
    }

    /// Load the content to display and report where it came from.
    pub async fn load_with_source(&self) -> Loaded {
        match self.inner.repo.load_content().await {
            Ok(Some(stored)) => {
                if self.inner.config.reject_default_on_load
                    && self.inner.classifier.is_default(&stored)
                {
                    warn!("Stored content looks like the baseline; not trusting it");
                    return self.baseline_loaded(BaselineReason::DefaultStored);
                }
                info!(blocks = stored.blocks.len(), "Loaded stored content");
                Loaded {
                    snapshot: normalize_order(&stored),
                    source: ContentSource::Stored,
                }
            }
            Ok(None) => {
                info!("No stored content; showing baseline");
                self.baseline_loaded(BaselineReason::NoRecord)
            }
            Err(err) => {
                error!(error = %err, "Failed to load stored content; showing baseline");
                self.baseline_loaded(BaselineReason::StoreError)
            }
        }
    }

    fn baseline_loaded(&self, reason: BaselineReason) -> Loaded {
        counter!(METRIC_LOAD_BASELINE, "reason" => reason.as_str()).increment(1);
        Loaded {
            snapshot: self.display_baseline(),
            source: ContentSource::Baseline(reason),
        }
    }

    /// Whether the store currently holds a record that would be displayed.
    pub async fn sync_with_store(&self) -> bool {
        match self.inner.repo.load_content().await {
            Ok(Some(stored)) => {
                !(self.inner.config.reject_default_on_load
                    && self.inner.classifier.is_default(&stored))
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "Store sync check failed");
                false
            }
        }
    }

    /// Persist `snapshot` now or after the debounce period.
    ///
    /// Default-looking, empty and malformed snapshots are dropped before any
    /// store contact and without an event. A debounced save replaces any save still
    /// waiting in the slot; an immediate save cancels it.
    pub async fn save(&self, snapshot: ContentSnapshot, immediate: bool) -> SaveOutcome {
        if let Some(reason) = self.gate(&snapshot) {
            counter!(METRIC_SAVE_BLOCKED, "reason" => reason.as_str()).increment(1);
            warn!(reason = reason.as_str(), "Save blocked");
            return SaveOutcome::Blocked(reason);
        }

        if immediate {
            self.inner.cancel_pending("immediate save");
            return self.inner.write(&snapshot, SaveTrigger::Immediate).await;
        }

        self.arm(snapshot);
        SaveOutcome::Scheduled
    }

    fn gate(&self, snapshot: &ContentSnapshot) -> Option<BlockReason> {
        if self.inner.classifier.is_default(snapshot) {
            return Some(BlockReason::DefaultContent);
        }
        if snapshot.is_empty() {
            return Some(BlockReason::Empty);
        }
        if let Err(err) = snapshot.validate() {
            warn!(error = %err, "Snapshot failed validation");
            return Some(BlockReason::InvalidSnapshot);
        }
        None
    }

    fn arm(&self, snapshot: ContentSnapshot) {
        let mut slot = mutex_lock(&self.inner.slot, SOURCE, "arm");
        slot.generation += 1;
        let generation = slot.generation;

        if let Some(previous) = slot.pending.take() {
            previous.timer.abort();
            counter!(METRIC_SAVE_SUPERSEDED).increment(1);
        }

        let inner = Arc::clone(&self.inner);
        let delay = self.inner.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(snapshot) = inner.take_due(generation) {
                inner.write(&snapshot, SaveTrigger::Debounced).await;
            }
        });

        slot.pending = Some(PendingSave { snapshot, timer });
    }

    /// Whether a debounced save is waiting for its timer.
    pub fn has_pending(&self) -> bool {
        mutex_lock(&self.inner.slot, SOURCE, "has_pending")
            .pending
            .is_some()
    }

    /// Write the waiting debounced save now, if any.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let pending = mutex_lock(&self.inner.slot, SOURCE, "flush").pending.take()?;
        pending.timer.abort();
        Some(self.inner.write(&pending.snapshot, SaveTrigger::Flush).await)
    }

    /// The normalized baseline; also stored when `reset_persists` is set.
    pub async fn reset(&self) -> ContentSnapshot {
        let baseline = self.display_baseline();
        if self.inner.config.reset_persists {
            self.inner.cancel_pending("reset");
            self.inner.write(&baseline, SaveTrigger::Reset).await;
        } else {
            info!("Reset to baseline for display only");
        }
        baseline
    }

    /// Load the current content and render it as interchange text.
    pub async fn export_current(&self) -> Result<String, InterchangeError> {
        let snapshot = self.load().await;
        interchange::export_content(&snapshot)
    }

    /// Parse interchange text and save it through the gate.
    ///
    /// Nothing is saved when the text is invalid.
    pub async fn import_and_save(
        &self,
        text: &str,
        immediate: bool,
    ) -> Result<SaveOutcome, InterchangeError> {
        let snapshot = interchange::import_content(text)?;
        Ok(self.save(snapshot, immediate).await)
    }
}

impl Inner {
    fn take_due(&self, generation: u64) -> Option<ContentSnapshot> {
        let mut slot = mutex_lock(&self.slot, SOURCE, "take_due");
        if slot.generation != generation {
            return None;
        }
        slot.pending.take().map(|pending| pending.snapshot)
    }

    fn cancel_pending(&self, cause: &'static str) {
        let mut slot = mutex_lock(&self.slot, SOURCE, "cancel_pending");
        slot.generation += 1;
        if let Some(previous) = slot.pending.take() {
            previous.timer.abort();
            counter!(METRIC_SAVE_SUPERSEDED).increment(1);
            info!(cause, "Discarded pending debounced save");
        }
    }

    async fn write(&self, snapshot: &ContentSnapshot, trigger: SaveTrigger) -> SaveOutcome {
        let result = {
            let _guard = self.write_lock.lock().await;
            self.repo.replace_content(snapshot).await
        };

        match result {
            Ok(()) => {
                counter!(METRIC_SAVE_WRITTEN, "trigger" => trigger.as_str()).increment(1);
                info!(
                    trigger = trigger.as_str(),
                    blocks = snapshot.blocks.len(),
                    "Content saved"
                );
                self.events.publish(SaveEvent::succeeded(trigger));
                SaveOutcome::Written
            }
            Err(err) => {
                counter!(METRIC_SAVE_FAILED, "trigger" => trigger.as_str()).increment(1);
                error!(trigger = trigger.as_str(), error = %err, "Content save failed");
                let error = err.to_string();
                self.events.publish(SaveEvent::failed(trigger, error.clone()));
                SaveOutcome::Failed { error }
            }
        }
    }
}
