//! End-to-end scan attempts against the in-memory store

use a11y_analysis::{AnalysisError, Analyzer, AnalyzerChain};
use a11y_core::{OrchestratorError, ScanConfig, ScanOrchestrator, ScanRequest};
use a11y_store::{MemoryStore, ScanStore};
use a11y_test_utils::{
    empty_link, low_contrast, missing_alt, seed_project, seed_results, seed_scan, FailPoint,
    FailingStore, ScriptedAnalyzer,
};
use a11y_types::{ScanStatus, Severity};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const URL: &str = "https://shop.example.com";

fn chain(analyzers: Vec<Arc<dyn Analyzer>>) -> AnalyzerChain {
    AnalyzerChain::new(analyzers).unwrap()
}

fn fast_config() -> ScanConfig {
    ScanConfig::new()
        .with_scan_timeout(5)
        .with_finalize_retries(3, 0)
}

#[tokio::test]
async fn falls_back_to_next_strategy() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let primary = Arc::new(ScriptedAnalyzer::failing(
        "axe-service",
        AnalysisError::Network("connection refused".into()),
    ));
    let secondary = Arc::new(ScriptedAnalyzer::succeeding(
        "browser",
        vec![missing_alt(URL), low_contrast(URL)],
    ));
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![primary.clone() as Arc<dyn Analyzer>, secondary.clone()]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(done.analysis_method.as_deref(), Some("browser"));
    let summary = done.summary.unwrap();
    assert_eq!((summary.critical, summary.serious, summary.total), (1, 1, 2));
    assert!(done.error.is_none());
    assert!(done.completed_at.is_some());
    assert_eq!((primary.calls(), secondary.calls()), (1, 1));
    assert_eq!(store.result_count(done.id), 2);
}

#[tokio::test]
async fn exhausted_chain_fails_scan_with_every_reason() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![
            ScriptedAnalyzer::failing("axe-service", AnalysisError::Network("down".into()))
                .into_arc(),
            ScriptedAnalyzer::failing("browser", AnalysisError::Timeout { secs: 90 }).into_arc(),
        ]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Failed);
    assert_eq!(
        done.error.as_deref(),
        Some(
            "all analysis strategies failed: axe-service: network error: down; \
             browser: timed out after 90s"
        )
    );
    assert!(done.summary.is_none());
    assert!(done.analysis_method.is_none());
    assert_eq!(store.result_count(done.id), 0);
    assert_eq!(orchestrator.stats().failed, 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_fails_scan() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![
            ScriptedAnalyzer::sleeping("browser", Duration::from_secs(600)).into_arc(),
        ]),
        fast_config().with_scan_timeout(30),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("scan timed out after 30s"));
}

#[tokio::test]
async fn panicking_analyzer_fails_scan() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![ScriptedAnalyzer::panicking("browser", "engine crashed").into_arc()]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("scan task panicked: engine crashed"));
    assert_eq!(orchestrator.stats().panicked, 1);

    // the scan id is free again
    let again = orchestrator
        .start_scan(ScanRequest::rescan(project.id, done.id, URL))
        .await
        .unwrap();
    assert_eq!(again.scan.status, ScanStatus::InProgress);
    assert!(again.scan.error.is_none());
    let _ = again.handle.wait().await;
}

#[tokio::test]
async fn persistence_failure_fails_scan_without_partial_writes() {
    let memory = MemoryStore::new();
    let store = FailingStore::new(Arc::new(memory.clone()));
    let project = seed_project(&store, "Shop", &[URL]).await;
    store.fail(FailPoint::Commit);

    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![
            ScriptedAnalyzer::succeeding("browser", vec![missing_alt(URL)]).into_arc(),
        ]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.starts_with("failed to persist findings: failed to commit findings"), "{error}");
    assert_eq!(memory.result_count(done.id), 0);
    assert_eq!(store.hits(FailPoint::Commit), 1);
}

#[tokio::test]
async fn terminal_status_write_is_retried() {
    let store = FailingStore::new(Arc::new(MemoryStore::new()));
    let project = seed_project(&store, "Shop", &[URL]).await;
    store.fail_times(FailPoint::TransitionTo(ScanStatus::Completed), 2);

    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![ScriptedAnalyzer::succeeding("browser", Vec::new()).into_arc()]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::new_scan(project.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(store.hits(FailPoint::TransitionTo(ScanStatus::Completed)), 2);
}

#[tokio::test]
async fn rescan_reconciles_and_preserves_identity() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let scan = seed_scan(&store, project.id, URL, ScanStatus::Completed).await;
    let stale = a11y_test_utils::finding(URL, "Heading levels should only increase by one", Severity::Moderate);
    let before = seed_results(
        &store,
        scan.id,
        vec![missing_alt(URL).with_help("old help"), stale],
    )
    .await;
    let alt_id = before[0].id;
    let alt_created = before[0].created_at;

    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![ScriptedAnalyzer::succeeding(
            "axe-service",
            vec![missing_alt(URL).with_help("new help"), low_contrast(URL)],
        )
        .into_arc()]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::rescan(project.id, scan.id, URL))
        .await
        .unwrap();
    assert_eq!(started.scan.id, scan.id);
    assert_eq!(started.scan.status, ScanStatus::InProgress);
    assert!(started.scan.completed_at.is_none());
    assert!(started.scan.summary.is_none());
    assert!(started.scan.analysis_method.is_none());

    let done = started.handle.wait().await.unwrap();
    assert_eq!(done.status, ScanStatus::Completed);
    assert_eq!(done.analysis_method.as_deref(), Some("axe-service"));

    let after = store.list_results_for_scan(scan.id).await.unwrap();
    assert_eq!(after.len(), 2);
    let alt = after.iter().find(|f| f.severity == Severity::Critical).unwrap();
    assert_eq!(alt.id, alt_id);
    assert_eq!(alt.created_at, alt_created);
    assert_eq!(alt.help.as_deref(), Some("new help"));
    assert!(after.iter().any(|f| f.message.contains("color contrast")));
    assert!(!after.iter().any(|f| f.message.contains("Heading")));
}

#[tokio::test]
async fn rescan_of_running_scan_conflicts() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let running = seed_scan(&store, project.id, URL, ScanStatus::InProgress).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![ScriptedAnalyzer::succeeding("browser", Vec::new()).into_arc()]),
        fast_config(),
    );

    let err = orchestrator
        .start_scan(ScanRequest::rescan(project.id, running.id, URL))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict(_)), "{err}");
    assert_eq!(store.get_scan(running.id).await.unwrap().status, ScanStatus::InProgress);
}

#[tokio::test]
async fn project_rescan_conflicts_while_a_scan_is_active() {
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL, "https://shop.example.com/cart"]).await;
    seed_scan(&store, project.id, URL, ScanStatus::Completed).await;
    seed_scan(&store, project.id, "https://shop.example.com/cart", ScanStatus::Pending).await;
    let analyzer = Arc::new(ScriptedAnalyzer::succeeding("browser", Vec::new()));
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![analyzer.clone() as Arc<dyn Analyzer>]),
        fast_config(),
    );

    let err = orchestrator.rescan_project(project.id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Conflict(_)));
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn project_rescan_reuses_latest_scan_per_url() {
    let cart = "https://shop.example.com/cart";
    let store = MemoryStore::new();
    let project = seed_project(&store, "Shop", &[URL, cart]).await;
    let older = seed_scan(&store, project.id, URL, ScanStatus::Failed).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let latest = seed_scan(&store, project.id, URL, ScanStatus::Completed).await;

    let analyzer = Arc::new(ScriptedAnalyzer::succeeding("browser", vec![missing_alt(URL)]));
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![analyzer.clone() as Arc<dyn Analyzer>]),
        fast_config(),
    );

    let started = orchestrator.rescan_project(project.id).await.unwrap();
    assert_eq!(started.len(), 2);
    assert_eq!(started[0].scan.id, latest.id);
    assert_ne!(started[0].scan.id, older.id);
    assert_eq!(started[1].scan.url, cart);

    for s in started {
        assert_eq!(s.handle.wait().await.unwrap().status, ScanStatus::Completed);
    }
    assert_eq!(analyzer.calls(), 2);
    // three scan records: two for the home page, one new for the cart
    assert_eq!(store.list_scans_for_project(project.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let store = MemoryStore::new();
    let urls: Vec<String> = (0..4).map(|i| format!("{URL}/{i}")).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let project = seed_project(&store, "Shop", &refs).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![
            ScriptedAnalyzer::sleeping("browser", Duration::from_millis(50)).into_arc(),
        ]),
        fast_config().with_max_concurrent_scans(1),
    );

    let started = orchestrator.rescan_project(project.id).await.unwrap();
    assert_eq!(started.len(), 4);
    for s in started {
        assert_eq!(s.handle.wait().await.unwrap().status, ScanStatus::Completed);
    }
    let stats = orchestrator.stats();
    assert_eq!((stats.started, stats.completed, stats.active), (4, 4, 0));
}

/// Rescan whose plan deletes, inserts and patches, failing at `point`
async fn rescan_failing_at(point: FailPoint) {
    let memory = MemoryStore::new();
    let store = FailingStore::new(Arc::new(memory.clone()));
    let project = seed_project(&store, "Shop", &[URL]).await;
    let scan = seed_scan(&store, project.id, URL, ScanStatus::Completed).await;
    let before = seed_results(
        &store,
        scan.id,
        vec![missing_alt(URL).with_help("old help"), empty_link(URL)],
    )
    .await;
    store.fail(point);

    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![ScriptedAnalyzer::succeeding(
            "axe-service",
            vec![missing_alt(URL).with_help("new help"), low_contrast(URL)],
        )
        .into_arc()]),
        fast_config(),
    );

    let started = orchestrator
        .start_scan(ScanRequest::rescan(project.id, scan.id, URL))
        .await
        .unwrap();
    let done = started.handle.wait().await.unwrap();

    assert_eq!(done.status, ScanStatus::Failed);
    assert!(done.summary.is_none());
    let error = done.error.unwrap();
    assert!(error.starts_with("failed to persist findings"), "{error}");
    assert_eq!(store.hits(point), 1);

    let mut after = memory.list_results_for_scan(scan.id).await.unwrap();
    let mut expected = before.clone();
    after.sort_by_key(|f| f.id);
    expected.sort_by_key(|f| f.id);
    assert_eq!(after, expected);
    assert!(!after.iter().any(|f| f.message.contains("color contrast")));
}

#[tokio::test]
async fn rescan_insert_failure_keeps_previous_findings() {
    rescan_failing_at(FailPoint::Insert).await;
}

#[tokio::test]
async fn rescan_update_failure_keeps_previous_findings() {
    rescan_failing_at(FailPoint::Update).await;
}

#[tokio::test]
async fn rescan_delete_failure_keeps_previous_findings() {
    rescan_failing_at(FailPoint::Delete).await;
}

#[tokio::test]
async fn rescan_of_scan_from_another_project_is_not_found() {
    let store = MemoryStore::new();
    let shop = seed_project(&store, "Shop", &[URL]).await;
    let blog = seed_project(&store, "Blog", &["https://blog.example.com"]).await;
    let blog_scan =
        seed_scan(&store, blog.id, "https://blog.example.com", ScanStatus::Completed).await;
    let analyzer = Arc::new(ScriptedAnalyzer::succeeding("browser", Vec::new()));
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![analyzer.clone() as Arc<dyn Analyzer>]),
        fast_config(),
    );

    let err = orchestrator
        .start_scan(ScanRequest::rescan(shop.id, blog_scan.id, URL))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound { entity: "scan", .. }), "{err}");
    assert_eq!(
        store.get_scan(blog_scan.id).await.unwrap().status,
        ScanStatus::Completed
    );
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn concurrent_project_rescans_start_each_url_once() {
    let store = FailingStore::new(Arc::new(MemoryStore::new()));
    store.yield_on_reads();
    let project = seed_project(&store, "Shop", &[URL]).await;
    let orchestrator = ScanOrchestrator::new(
        Arc::new(store.clone()),
        chain(vec![
            ScriptedAnalyzer::sleeping("browser", Duration::from_millis(20)).into_arc(),
        ]),
        fast_config(),
    );

    let (first, second) = tokio::join!(
        orchestrator.rescan_project(project.id),
        orchestrator.rescan_project(project.id)
    );

    let (winner, loser) = match (first, second) {
        (Ok(started), Err(err)) | (Err(err), Ok(started)) => (started, err),
        (first, second) => panic!("expected exactly one rescan to start: {first:?} / {second:?}"),
    };
    assert!(matches!(loser, OrchestratorError::Conflict(_)), "{loser}");
    assert_eq!(winner.len(), 1);
    assert_eq!(store.list_scans_for_project(project.id).await.unwrap().len(), 1);

    for s in winner {
        assert_eq!(s.handle.wait().await.unwrap().status, ScanStatus::Completed);
    }
}
