//! Multi-run simulations through the real store and analysis.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use rentwatch::dashboard::{build_router, DashboardState};
use rentwatch::engine::Orchestrator;
use rentwatch::storage::{RunFilter, RunStore};
use rentwatch::types::{CycleOutcome, NoResultReason, Observation, RunRecord};

use crate::fakes::{
    cleanup, july, temp_db_path, FakeFetcher, RecordingNotifier, Scripted, SEARCH_URL,
};

async fn orchestrator(
    path: &std::path::Path,
    fetcher: &FakeFetcher,
    notifier: &RecordingNotifier,
) -> Orchestrator {
    let store = RunStore::open(path).await.unwrap();
    Orchestrator::new(
        Box::new(fetcher.clone()),
        Box::new(notifier.clone()),
        store,
        0.25,
    )
}

#[tokio::test]
async fn test_price_series_alerts_only_when_cheap() {
    let path = temp_db_path();
    let fetcher = FakeFetcher::per_day_series(&[50.0, 60.0, 70.0, 80.0, 52.0]);
    let notifier = RecordingNotifier::new();
    let orch = orchestrator(&path, &fetcher, &notifier).await;

    let mut cheap = Vec::new();
    for _ in 0..5 {
        let outcome = orch.run_once().await.unwrap();
        cheap.push(outcome.report().unwrap().evaluation.cheap);
    }

    // Runs 1-2 are cold start. Run 3: p25 of [50,60,70] is 55. Run 4: p25 of
    // [50,60,70,80] is 57.5. Run 5: p25 of [50,52,60,70,80] is 52.
    assert_eq!(cheap, vec![true, true, false, false, true]);

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 3);
    assert_eq!(alerts[0].threshold, None);
    assert_eq!(alerts[1].threshold, None);
    assert_eq!(alerts[2].threshold, Some(52.0));
    assert_eq!(alerts[2].price_per_day, 52.0);
    assert_eq!(alerts[2].total_price, 364.0);
    assert_eq!(alerts[2].url, SEARCH_URL);

    let runs = orch.store().list(&RunFilter::window(&july())).await.unwrap();
    assert_eq!(runs.len(), 5);
    assert!(runs.windows(2).all(|w| w[0].run_at <= w[1].run_at && w[0].id < w[1].id));

    cleanup(&path);
}

#[tokio::test]
async fn test_failed_and_empty_fetches_leave_no_trace() {
    let path = temp_db_path();
    let fetcher = FakeFetcher::new(
        july(),
        7,
        vec![
            Scripted::Prices(vec![350.0, 420.0]),
            Scripted::Error("operation timed out".into()),
            Scripted::Prices(Vec::new()),
            Scripted::Prices(vec![420.0]),
        ],
    );
    let notifier = RecordingNotifier::new();
    let orch = orchestrator(&path, &fetcher, &notifier).await;

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(orch.run_once().await.unwrap());
    }

    assert!(matches!(outcomes[0], CycleOutcome::Completed(_)));
    assert!(matches!(
        &outcomes[1],
        CycleOutcome::NoResult(NoResultReason::FetchFailed(msg)) if msg.contains("timed out")
    ));
    assert_eq!(outcomes[2], CycleOutcome::NoResult(NoResultReason::NoOffers));
    let last = outcomes[3].report().unwrap();
    assert_eq!(last.stats.count, 2);

    assert_eq!(fetcher.calls(), 4);
    assert_eq!(orch.store().count(&RunFilter::all()).await.unwrap(), 2);
    // Both stored runs were still in cold start.
    assert_eq!(notifier.alerts().len(), 2);

    cleanup(&path);
}

#[tokio::test]
async fn test_history_survives_restart() {
    let path = temp_db_path();
    let notifier = RecordingNotifier::new();

    {
        let fetcher = FakeFetcher::per_day_series(&[40.0, 45.0, 50.0]);
        let orch = orchestrator(&path, &fetcher, &notifier).await;
        for _ in 0..3 {
            orch.run_once().await.unwrap();
        }
    }

    let fetcher = FakeFetcher::per_day_series(&[90.0]);
    let orch = orchestrator(&path, &fetcher, &notifier).await;
    let outcome = orch.run_once().await.unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.stats.count, 4);
    assert!(!report.evaluation.cheap);
    assert_eq!(notifier.alerts().len(), 2);

    cleanup(&path);
}

#[tokio::test]
async fn test_notifier_failure_keeps_run() {
    let path = temp_db_path();
    let fetcher = FakeFetcher::per_day_series(&[30.0]);
    let notifier = RecordingNotifier::failing();
    let orch = orchestrator(&path, &fetcher, &notifier).await;

    let outcome = orch.run_once().await.unwrap();

    let report = outcome.report().unwrap();
    assert!(report.evaluation.cheap);
    assert!(!report.notified);
    assert_eq!(notifier.alerts().len(), 1);
    assert_eq!(orch.store().count(&RunFilter::all()).await.unwrap(), 1);

    cleanup(&path);
}

#[tokio::test]
async fn test_watch_keeps_polling() {
    let path = temp_db_path();
    let fetcher = FakeFetcher::per_day_series(&[50.0, 55.0, 60.0, 65.0, 70.0, 75.0]);
    let notifier = RecordingNotifier::new();
    let orch = orchestrator(&path, &fetcher, &notifier).await;

    let mut cycles = 0usize;
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        orch.watch(Duration::from_millis(20), |_| cycles += 1),
    )
    .await;

    // The loop only ends on a storage error, so the timeout always fires.
    assert!(result.is_err());
    assert!(cycles >= 2, "only {cycles} cycles ran");
    assert!(fetcher.calls() >= cycles);

    cleanup(&path);
}

#[tokio::test]
async fn test_once_json_record_is_accepted_by_ingest() {
    let path = temp_db_path();
    let store = RunStore::open(&path).await.unwrap();
    let app = build_router(Arc::new(DashboardState::new(store.clone(), july(), 0.25)));

    let obs = Observation::from_prices(&july(), 7, SEARCH_URL, vec![266.0, 301.0]);
    let record = RunRecord::from_observation(&obs, Utc::now());
    let body = serde_json::to_string(&record).unwrap();

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ingest")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let runs = store.list(&RunFilter::window(&july())).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].min_total_price, Some(266.0));
    assert_eq!(runs[0].min_price_per_day, Some(38.0));
    assert_eq!(runs[0].num_offers, 2);
    assert_eq!(runs[0].url.as_deref(), Some(SEARCH_URL));

    cleanup(&path);
}
