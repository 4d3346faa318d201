//! Integration tests for the rigging lifecycle manager over the memory store.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rigforge_core::error::CoreError;
use rigforge_core::metadata::{AnimationClipSet, AnimationSets, AssetMetadata, RigType};
use rigforge_core::rigging::{RigOutcome, RiggingPhase, DEADLINE_EXCEEDED_ERROR};
use rigforge_core::types::TaskId;
use rigforge_db::{AssetStore, MemoryStore, StoreError};
use rigforge_events::bus::{
    EventBus, ASSET_SAVED, RIGGING_COMPLETED, RIGGING_ENQUEUED, RIGGING_EXPIRED, RIGGING_STARTED,
};
use rigforge_pipeline::{DeadlineSweeper, LifecycleConfig, RiggingLifecycle};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    lifecycle: Arc<RiggingLifecycle>,
    store: Arc<MemoryStore>,
    events: Arc<EventBus>,
}

fn harness_with(config: LifecycleConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(EventBus::default());
    let lifecycle = Arc::new(RiggingLifecycle::new(
        store.clone(),
        Arc::clone(&events),
        config,
    ));
    Harness {
        lifecycle,
        store,
        events,
    }
}

fn harness() -> Harness {
    harness_with(LifecycleConfig::default())
}

async fn seed(h: &Harness, id: &str) {
    h.store
        .put(id, AssetMetadata::generated(id, id))
        .await
        .unwrap();
}

fn outcome() -> RigOutcome {
    RigOutcome {
        rig_type: RigType::HumanoidStandard,
        character_height: Some(1.8),
        animations: AnimationSets::basic(AnimationClipSet::new().with_clip("walking", "w.anim")),
        rigged_model_path: "r.glb".into(),
        tpose_model_path: "t.glb".into(),
        animation_compatibility: Default::default(),
    }
}

fn task_of(snapshot: &rigforge_core::rigging::RiggingSnapshot) -> TaskId {
    snapshot
        .rigging
        .as_ref()
        .and_then(|r| r.rigging_task_id.clone())
        .expect("snapshot should carry a task id")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_happy_path_then_late_fail_is_invalid() {
    let h = harness();
    seed(&h, "A").await;

    let pending = h.lifecycle.enqueue("A").await.unwrap();
    assert_eq!(pending.phase, RiggingPhase::Pending);
    let rigging = pending.rigging.as_ref().unwrap();
    assert!(rigging.rigging_attempted);
    let t1 = task_of(&pending);

    let processing = h.lifecycle.start("A", t1.clone(), None).await.unwrap();
    assert_eq!(processing.phase, RiggingPhase::Processing);

    let completed = h
        .lifecycle
        .succeed("A", t1.clone(), outcome())
        .await
        .unwrap();
    assert_eq!(completed.phase, RiggingPhase::Completed);
    let rigging = completed.rigging.as_ref().unwrap();
    assert!(rigging.is_rigged);
    assert!(rigging.supports_animation);
    assert_eq!(rigging.character_height, Some(1.8));

    let err = h.lifecycle.fail("A", t1, "timeout").await.unwrap_err();
    assert_matches!(
        err,
        StoreError::Core(CoreError::InvalidTransition {
            operation: "fail",
            state: RiggingPhase::Completed
        })
    );
    assert_eq!(
        h.lifecycle.query("A").await.unwrap().phase,
        RiggingPhase::Completed
    );
}

#[tokio::test]
async fn double_enqueue_is_rejected_and_original_task_survives() {
    let h = harness();
    seed(&h, "B").await;

    let t1 = task_of(&h.lifecycle.enqueue("B").await.unwrap());

    let err = h.lifecycle.enqueue("B").await.unwrap_err();
    assert_matches!(
        err,
        StoreError::Core(CoreError::InvalidTransition {
            state: RiggingPhase::Pending,
            ..
        })
    );
    let snapshot = h.lifecycle.query("B").await.unwrap();
    assert_eq!(snapshot.phase, RiggingPhase::Pending);
    assert_eq!(task_of(&snapshot), t1);

    let started = h.lifecycle.start("B", t1, None).await.unwrap();
    assert_eq!(started.phase, RiggingPhase::Processing);
}

#[tokio::test]
async fn late_success_from_superseded_job_is_stale_no_op() {
    let h = harness();
    seed(&h, "C").await;

    let t1 = task_of(&h.lifecycle.enqueue("C").await.unwrap());
    let failed = h.lifecycle.fail("C", t1.clone(), "err").await.unwrap();
    assert_eq!(failed.phase, RiggingPhase::Failed);

    let t2 = task_of(&h.lifecycle.enqueue("C").await.unwrap());
    assert_ne!(t1, t2);
    let before = h.store.get("C").await.unwrap();

    let err = h
        .lifecycle
        .succeed("C", t1.clone(), outcome())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        StoreError::Core(CoreError::StaleTask { expected: Some(ref e), ref received })
            if *e == t2 && *received == t1
    );

    assert_eq!(h.store.get("C").await.unwrap(), before);
    let snapshot = h.lifecycle.query("C").await.unwrap();
    assert_eq!(snapshot.phase, RiggingPhase::Pending);
    assert_eq!(task_of(&snapshot), t2);
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mismatched_task_leaves_record_unchanged() {
    let h = harness();
    seed(&h, "a").await;
    let t1 = task_of(&h.lifecycle.enqueue("a").await.unwrap());
    h.lifecycle.start("a", t1, None).await.unwrap();
    let before = h.store.get("a").await.unwrap();

    let bogus = TaskId::from("rig_bogus");
    assert_matches!(
        h.lifecycle.fail("a", bogus.clone(), "x").await,
        Err(StoreError::Core(CoreError::StaleTask { .. }))
    );
    assert_matches!(
        h.lifecycle.succeed("a", bogus, outcome()).await,
        Err(StoreError::Core(CoreError::StaleTask { .. }))
    );

    assert_eq!(h.store.get("a").await.unwrap(), before);
}

#[tokio::test]
async fn transitions_on_missing_asset_are_not_found() {
    let h = harness();
    assert_matches!(
        h.lifecycle.enqueue("ghost").await,
        Err(StoreError::Core(CoreError::NotFound { .. }))
    );
    assert_matches!(
        h.lifecycle.query("ghost").await,
        Err(StoreError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn invalid_outcome_is_rejected_atomically() {
    let h = harness();
    seed(&h, "a").await;
    let t1 = task_of(&h.lifecycle.enqueue("a").await.unwrap());
    h.lifecycle.start("a", t1.clone(), None).await.unwrap();
    let before = h.store.get("a").await.unwrap();

    let mut bad = outcome();
    bad.character_height = None;
    assert_matches!(
        h.lifecycle.succeed("a", t1, bad).await,
        Err(StoreError::Core(CoreError::Validation(_)))
    );
    assert_eq!(h.store.get("a").await.unwrap(), before);
}

#[tokio::test]
async fn start_rejects_deadline_in_the_past() {
    let h = harness();
    seed(&h, "a").await;
    let t1 = task_of(&h.lifecycle.enqueue("a").await.unwrap());

    let err = h
        .lifecycle
        .start("a", t1, Some(Utc::now() - Duration::seconds(5)))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));
    assert_eq!(
        h.lifecycle.query("a").await.unwrap().phase,
        RiggingPhase::Pending
    );
}

#[tokio::test]
async fn superseded_start_with_expired_deadline_is_stale() {
    let h = harness();
    seed(&h, "C").await;

    let t1 = task_of(&h.lifecycle.enqueue("C").await.unwrap());
    h.lifecycle.fail("C", t1.clone(), "err").await.unwrap();
    let t2 = task_of(&h.lifecycle.enqueue("C").await.unwrap());
    let before = h.store.get("C").await.unwrap();

    let err = h
        .lifecycle
        .start("C", t1, Some(Utc::now() - Duration::seconds(5)))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        StoreError::Core(CoreError::StaleTask { expected: Some(ref e), .. }) if *e == t2
    );
    assert_eq!(h.store.get("C").await.unwrap(), before);
}

#[tokio::test]
async fn superseded_fail_with_blank_error_is_stale() {
    let h = harness();
    seed(&h, "C").await;

    let t1 = task_of(&h.lifecycle.enqueue("C").await.unwrap());
    h.lifecycle.fail("C", t1.clone(), "err").await.unwrap();
    task_of(&h.lifecycle.enqueue("C").await.unwrap());
    let before = h.store.get("C").await.unwrap();

    assert_matches!(
        h.lifecycle.fail("C", t1, "").await,
        Err(StoreError::Core(CoreError::StaleTask { .. }))
    );
    assert_eq!(h.store.get("C").await.unwrap(), before);
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_creates_and_updates_descriptive_fields() {
    let h = harness();
    let mut asset = AssetMetadata::placeholder("hero", "Hero");
    let saved = h.lifecycle.save("hero", asset.clone()).await.unwrap();
    assert!(saved.is_placeholder);

    asset.is_placeholder = false;
    asset.name = "Hero v2".into();
    let saved = h.lifecycle.save("hero", asset).await.unwrap();
    assert!(!saved.is_placeholder);
    assert_eq!(h.lifecycle.generated_count().await.unwrap(), 1);
}

#[tokio::test]
async fn save_cannot_forge_lifecycle_state() {
    let h = harness();
    seed(&h, "a").await;
    let t1 = task_of(&h.lifecycle.enqueue("a").await.unwrap());

    let mut forged = h.store.get("a").await.unwrap();
    if let Some(rigging) = forged.rigging.as_mut() {
        rigging.rigging_task_id = Some(TaskId::from("rig_forged"));
    }
    assert_matches!(
        h.lifecycle.save("a", forged).await,
        Err(StoreError::Core(CoreError::Validation(_)))
    );

    let snapshot = h.lifecycle.query("a").await.unwrap();
    assert_eq!(task_of(&snapshot), t1);
}

#[tokio::test]
async fn save_keeps_lifecycle_state_when_record_is_echoed_back() {
    let h = harness();
    seed(&h, "a").await;
    h.lifecycle.enqueue("a").await.unwrap();

    let mut echoed = h.store.get("a").await.unwrap();
    echoed.name = "renamed".into();
    let saved = h.lifecycle.save("a", echoed).await.unwrap();
    assert_eq!(saved.name, "renamed");
    assert_eq!(saved.rigging_phase(), RiggingPhase::Pending);
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn counts_track_committed_state() {
    let h = harness();
    h.store
        .put("p", AssetMetadata::placeholder("p", "p"))
        .await
        .unwrap();
    seed(&h, "g1").await;
    seed(&h, "g2").await;

    let t = task_of(&h.lifecycle.enqueue("g1").await.unwrap());
    h.lifecycle.start("g1", t.clone(), None).await.unwrap();
    h.lifecycle.succeed("g1", t, outcome()).await.unwrap();

    assert_eq!(h.lifecycle.total_count().await.unwrap(), 3);
    assert_eq!(h.lifecycle.generated_count().await.unwrap(), 2);
    assert_eq!(h.lifecycle.rigged_count().await.unwrap(), 1);

    let stats = h.lifecycle.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.generated, 2);
    assert_eq!(stats.rigged, 1);
    assert_eq!(stats.rigging.get(RiggingPhase::Unrigged), 2);
}

#[tokio::test]
async fn concurrent_lifecycles_on_distinct_assets_all_complete() {
    let h = harness();
    for i in 0..20 {
        seed(&h, &format!("asset-{i}")).await;
    }

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let lifecycle = Arc::clone(&h.lifecycle);
            tokio::spawn(async move {
                let id = format!("asset-{i}");
                let task = task_of(&lifecycle.enqueue(&id).await?);
                lifecycle.start(&id, task.clone(), None).await?;
                lifecycle.succeed(&id, task, outcome()).await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(h.lifecycle.rigged_count().await.unwrap(), 20);
    assert_eq!(h.lifecycle.generated_count().await.unwrap(), 20);
}

#[tokio::test]
async fn racing_enqueues_on_one_asset_admit_exactly_one() {
    let h = harness();
    seed(&h, "hot").await;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let lifecycle = Arc::clone(&h.lifecycle);
            tokio::spawn(async move { lifecycle.enqueue("hot").await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(StoreError::Core(CoreError::InvalidTransition { .. }))
    )));

    let snapshot = h.lifecycle.query("hot").await.unwrap();
    assert_eq!(task_of(&snapshot), task_of(winners[0]));
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn configured_timeout_sets_deadline() {
    let h = harness_with(LifecycleConfig {
        processing_timeout: Some(Duration::minutes(10)),
    });
    seed(&h, "a").await;
    let t = task_of(&h.lifecycle.enqueue("a").await.unwrap());

    let before = Utc::now();
    let started = h.lifecycle.start("a", t, None).await.unwrap();
    let deadline = started
        .rigging
        .as_ref()
        .and_then(|r| r.processing_deadline)
        .unwrap();
    assert!(deadline >= before + Duration::minutes(10));
}

#[tokio::test]
async fn expire_overdue_fails_only_jobs_past_deadline() {
    let h = harness();
    seed(&h, "due").await;
    seed(&h, "later").await;
    seed(&h, "open").await;

    let soon = Utc::now() + Duration::seconds(1);
    let t_due = task_of(&h.lifecycle.enqueue("due").await.unwrap());
    h.lifecycle.start("due", t_due, Some(soon)).await.unwrap();

    let t_later = task_of(&h.lifecycle.enqueue("later").await.unwrap());
    h.lifecycle
        .start("later", t_later, Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();

    let t_open = task_of(&h.lifecycle.enqueue("open").await.unwrap());
    h.lifecycle.start("open", t_open, None).await.unwrap();

    let expired = h
        .lifecycle
        .expire_overdue(soon + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(expired, vec!["due".to_string()]);

    let due = h.lifecycle.query("due").await.unwrap();
    assert_eq!(due.phase, RiggingPhase::Failed);
    assert_eq!(
        due.rigging.unwrap().rigging_error.as_deref(),
        Some(DEADLINE_EXCEEDED_ERROR)
    );
    assert_eq!(
        h.lifecycle.query("later").await.unwrap().phase,
        RiggingPhase::Processing
    );
    assert_eq!(
        h.lifecycle.query("open").await.unwrap().phase,
        RiggingPhase::Processing
    );
}

#[tokio::test]
async fn sweeper_stops_on_cancel() {
    let h = harness();
    let sweeper = DeadlineSweeper::new(Arc::clone(&h.lifecycle), StdDuration::from_millis(10));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    tokio::time::sleep(StdDuration::from_millis(30)).await;
    cancel.cancel();
    tokio::time::timeout(StdDuration::from_secs(1), handle)
        .await
        .expect("sweeper should exit after cancellation")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn committed_transitions_publish_events_and_rejections_do_not() {
    let h = harness();
    let mut rx = h.events.subscribe();

    h.lifecycle
        .save("a", AssetMetadata::generated("a", "a"))
        .await
        .unwrap();
    let t = task_of(&h.lifecycle.enqueue("a").await.unwrap());
    assert!(h.lifecycle.enqueue("a").await.is_err());
    h.lifecycle.start("a", t.clone(), None).await.unwrap();
    h.lifecycle.succeed("a", t.clone(), outcome()).await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.asset_id, "a");
        types.push(event.event_type);
    }
    assert_eq!(
        types,
        vec![ASSET_SAVED, RIGGING_ENQUEUED, RIGGING_STARTED, RIGGING_COMPLETED]
    );
}

#[tokio::test]
async fn expiry_publishes_expired_event() {
    let h = harness();
    seed(&h, "a").await;
    let t = task_of(&h.lifecycle.enqueue("a").await.unwrap());
    let deadline = Utc::now() + Duration::seconds(1);
    h.lifecycle.start("a", t.clone(), Some(deadline)).await.unwrap();

    let mut rx = h.events.subscribe();
    h.lifecycle
        .expire_overdue(deadline + Duration::seconds(1))
        .await
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, RIGGING_EXPIRED);
    assert_eq!(event.task_id, Some(t));
    assert_eq!(event.phase, Some(RiggingPhase::Failed));
}
