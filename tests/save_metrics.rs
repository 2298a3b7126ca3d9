use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;

use blockvault::application::classifier::DefaultClassifier;
use blockvault::application::reconciler::{ContentReconciler, ReconcilerConfig, SaveOutcome};
use blockvault::domain::baseline;
use blockvault::domain::content::{Block, BlockType, ContentSnapshot};
use blockvault::infra::db::UnconfiguredContentStore;

fn edited(title: &str) -> ContentSnapshot {
    ContentSnapshot::new(vec![
        Block::new("hero", BlockType::Hero, title),
        Block::new("abs", BlockType::Custom, "ABS Block"),
    ])
}

#[tokio::test]
async fn reconciler_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let reconciler = ContentReconciler::new(
        Arc::new(UnconfiguredContentStore),
        DefaultClassifier::standard(),
        baseline::builtin().expect("baseline"),
        ReconcilerConfig::default(),
    );

    // Baseline fallback on load
    let _ = reconciler.load().await;

    // Gate rejection
    let outcome = reconciler
        .save(baseline::builtin().expect("baseline"), true)
        .await;
    assert!(matches!(outcome, SaveOutcome::Blocked(_)));

    // Superseded debounced save, then a failed flush
    reconciler.save(edited("First"), false).await;
    reconciler.save(edited("Second"), false).await;
    let flushed = reconciler.flush().await;
    assert!(matches!(flushed, Some(SaveOutcome::Failed { .. })));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "blockvault_load_baseline_total",
        "blockvault_save_blocked_total",
        "blockvault_save_superseded_total",
        "blockvault_save_failed_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
    assert!(!names.contains("blockvault_save_written_total"));
}
