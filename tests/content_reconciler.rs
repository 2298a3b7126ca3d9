//! End-to-end behaviour of the content reconciler against an in-memory store.
//!
//! The store records every call so tests can assert on exactly what reached
//! persistence, including the calls that must never happen.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;

use blockvault::application::classifier::{DefaultClassifier, FallbackPolicy, RuleTable};
use blockvault::application::events::SaveTrigger;
use blockvault::application::reconciler::{
    BaselineReason, BlockReason, ContentReconciler, ContentSource, ReconcilerConfig, SaveOutcome,
};
use blockvault::application::repos::{ContentRepo, RepoError};
use blockvault::domain::baseline;
use blockvault::domain::content::{Block, BlockType, ContentSnapshot};
use blockvault::domain::ordering::normalize_order;
use blockvault::infra::db::UnconfiguredContentStore;

#[derive(Default)]
struct MemoryStore {
    stored: Mutex<Option<ContentSnapshot>>,
    writes: Mutex<Vec<ContentSnapshot>>,
    loads: AtomicUsize,
    fail_loads: bool,
}

impl MemoryStore {
    fn with_record(snapshot: ContentSnapshot) -> Self {
        Self {
            stored: Mutex::new(Some(snapshot)),
            ..Default::default()
        }
    }

    fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Default::default()
        }
    }

    fn writes(&self) -> Vec<ContentSnapshot> {
        self.writes.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst) + self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentRepo for MemoryStore {
    async fn load_content(&self) -> Result<Option<ContentSnapshot>, RepoError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn replace_content(&self, snapshot: &ContentSnapshot) -> Result<(), RepoError> {
        self.writes.lock().unwrap().push(snapshot.clone());
        *self.stored.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}

fn reconciler_for(store: Arc<dyn ContentRepo>) -> ContentReconciler {
    ContentReconciler::new(
        store,
        DefaultClassifier::standard(),
        baseline::builtin().expect("baseline"),
        ReconcilerConfig::default(),
    )
}

fn customised(hero_title: &str) -> ContentSnapshot {
    ContentSnapshot::new(vec![
        Block::new("hero", BlockType::Hero, hero_title),
        Block::new("can-module", BlockType::Module, "CAN").with_price("2700"),
        Block::new("abs", BlockType::Custom, "ABS Block").with_order(99),
        Block::new("contacts", BlockType::Contacts, "Contacts"),
    ])
}

#[tokio::test]
async fn default_content_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());
    let baseline = baseline::builtin().expect("baseline");

    for immediate in [true, false] {
        let outcome = reconciler.save(baseline.clone(), immediate).await;
        assert_eq!(outcome, SaveOutcome::Blocked(BlockReason::DefaultContent));
    }

    assert!(!reconciler.has_pending());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn empty_content_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());

    let outcome = reconciler.save(ContentSnapshot::default(), true).await;

    assert_eq!(outcome, SaveOutcome::Blocked(BlockReason::Empty));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn baseline_with_repeated_custom_ids_is_still_blocked() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());
    let mut snapshot = baseline::builtin().expect("baseline");
    snapshot.blocks.push(Block::new("x", BlockType::Custom, "a"));
    snapshot.blocks.push(Block::new("x", BlockType::Custom, "b"));

    let outcome = reconciler.save(snapshot, true).await;

    assert_eq!(outcome, SaveOutcome::Blocked(BlockReason::DefaultContent));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn content_with_repeated_ids_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());
    let mut snapshot = customised("ABS Service");
    snapshot
        .blocks
        .push(Block::new("abs", BlockType::Custom, "Second ABS"));

    let outcome = reconciler.save(snapshot, false).await;

    assert_eq!(outcome, SaveOutcome::Blocked(BlockReason::InvalidSnapshot));
    assert!(!reconciler.has_pending());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn strict_fallback_blocks_unclassifiable_content() {
    let store = Arc::new(MemoryStore::default());
    let classifier = DefaultClassifier::new(
        RuleTable::standard(),
        NonZeroU32::new(3).expect("non-zero"),
        FallbackPolicy::Strict,
    )
    .expect("valid classifier");
    let reconciler = ContentReconciler::new(
        store.clone(),
        classifier,
        baseline::builtin().expect("baseline"),
        ReconcilerConfig::default(),
    );
    let mut snapshot = customised("ABS Service");
    snapshot
        .blocks
        .push(Block::new("hero", BlockType::Hero, "Another hero"));

    let outcome = reconciler.save(snapshot, true).await;

    assert_eq!(outcome, SaveOutcome::Blocked(BlockReason::DefaultContent));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn immediate_save_writes_once_and_reports_success() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());
    let mut events = reconciler.subscribe();

    let outcome = reconciler.save(customised("ABS Service"), true).await;
    assert_eq!(outcome, SaveOutcome::Written);

    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], customised("ABS Service"));

    let event = events.recv().await.expect("save event");
    assert!(event.success);
    assert!(event.error.is_none());
    assert_eq!(event.trigger, SaveTrigger::Immediate);
}

#[tokio::test(start_paused = true)]
async fn debounced_saves_collapse_into_the_last_snapshot() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());
    let mut events = reconciler.subscribe();

    assert_eq!(
        reconciler.save(customised("First draft"), false).await,
        SaveOutcome::Scheduled
    );
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        reconciler.save(customised("Second draft"), false).await,
        SaveOutcome::Scheduled
    );

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(store.writes().is_empty(), "timer restarts on every save");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].blocks[0].title, "Second draft");
    assert!(!reconciler.has_pending());

    let event = events.recv().await.expect("save event");
    assert!(event.success);
    assert_eq!(event.trigger, SaveTrigger::Debounced);
}

#[tokio::test]
async fn missing_record_loads_the_normalized_baseline() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());

    let loaded = reconciler.load_with_source().await;

    assert_eq!(
        loaded.source,
        ContentSource::Baseline(BaselineReason::NoRecord)
    );
    assert_eq!(loaded.snapshot, reconciler.display_baseline());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn unconfigured_store_shows_baseline_without_writing() {
    let reconciler = reconciler_for(Arc::new(UnconfiguredContentStore));
    let mut events = reconciler.subscribe();

    let loaded = reconciler.load_with_source().await;
    assert_eq!(
        loaded.source,
        ContentSource::Baseline(BaselineReason::NoRecord)
    );
    assert!(!reconciler.sync_with_store().await);

    let outcome = reconciler.save(customised("Offline edit"), true).await;
    assert!(matches!(outcome, SaveOutcome::Failed { .. }));

    let event = events.recv().await.expect("save event");
    assert!(!event.success);
    assert!(event.error.is_some());
}

#[tokio::test]
async fn load_failure_falls_back_to_baseline() {
    let store = Arc::new(MemoryStore::failing_loads());
    let reconciler = reconciler_for(store.clone());

    let loaded = reconciler.load_with_source().await;

    assert_eq!(
        loaded.source,
        ContentSource::Baseline(BaselineReason::StoreError)
    );
    assert_eq!(loaded.snapshot, reconciler.display_baseline());
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn stored_default_content_is_not_trusted() {
    let stored = baseline::builtin().expect("baseline");
    let store = Arc::new(MemoryStore::with_record(stored));
    let reconciler = reconciler_for(store.clone());

    let loaded = reconciler.load_with_source().await;

    assert_eq!(
        loaded.source,
        ContentSource::Baseline(BaselineReason::DefaultStored)
    );
    assert!(!reconciler.sync_with_store().await);
}

#[tokio::test]
async fn stored_custom_block_is_placed_after_system_blocks() {
    let store = Arc::new(MemoryStore::with_record(customised("ABS Service")));
    let reconciler = reconciler_for(store);

    let loaded = reconciler.load_with_source().await;
    assert_eq!(loaded.source, ContentSource::Stored);

    let snapshot = loaded.snapshot;
    let abs = snapshot.block("abs").expect("custom block");
    assert_eq!(abs.title, "ABS Block");
    assert_eq!(abs.order, 7);
    assert_eq!(snapshot.block("hero").expect("hero").order, 1);
    assert_eq!(snapshot.block("can-module").expect("module").order, 4);
    assert_eq!(snapshot.block("contacts").expect("contacts").order, 51);

    let sequence: Vec<&str> = snapshot.blocks.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(sequence, ["hero", "can-module", "abs", "contacts"]);
}

#[test]
fn normalization_is_idempotent() {
    let mut snapshot = customised("ABS Service");
    snapshot
        .blocks
        .push(Block::new("tuning", BlockType::Custom, "Chip tuning").with_order(3));
    snapshot
        .blocks
        .push(Block::new("promo", BlockType::Other("banner".into()), "Sale").with_order(20));

    let once = normalize_order(&snapshot);
    let twice = normalize_order(&once);

    assert_eq!(once, twice);
    assert_eq!(once.block("tuning").expect("custom").order, 8);
    assert_eq!(once.block("promo").expect("other").order, 20);
}

#[tokio::test]
async fn loaded_content_survives_export_and_import() {
    let store = Arc::new(MemoryStore::with_record(customised("ABS Service")));
    let reconciler = reconciler_for(store.clone());

    let loaded = reconciler.load().await;
    let text = reconciler.export_current().await.expect("export");
    let outcome = reconciler
        .import_and_save(&text, true)
        .await
        .expect("import");

    assert_eq!(outcome, SaveOutcome::Written);
    assert_eq!(store.writes(), vec![loaded]);
}

#[tokio::test]
async fn invalid_import_changes_nothing() {
    let store = Arc::new(MemoryStore::default());
    let reconciler = reconciler_for(store.clone());

    let result = reconciler.import_and_save("not json", true).await;

    assert!(result.is_err());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn reset_is_display_only_by_default() {
    let store = Arc::new(MemoryStore::with_record(customised("ABS Service")));
    let reconciler = reconciler_for(store.clone());

    let reset = reconciler.reset().await;

    assert_eq!(reset, reconciler.display_baseline());
    assert!(store.writes().is_empty());
    assert_eq!(reconciler.load_with_source().await.source, ContentSource::Stored);
}
