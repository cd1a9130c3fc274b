//! Testing utilities for the A11y Dashboard workspace
//!
//! Shared fixtures, scripted analyzers and fault-injecting stores.

#![allow(missing_docs)]

use a11y_analysis::{AnalysisError, AnalysisOutcome, Analyzer};
use a11y_store::{ResultTransaction, ScanStore, StoreError};
use a11y_types::{
    ComplianceOptions, Finding, FindingId, NewFinding, NewProject, NewScan, Project, ProjectId,
    ProjectUrl, ResultPatch, Scan, ScanId, ScanStatus, ScanUpdate, Severity,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn finding(url: &str, message: &str, severity: Severity) -> NewFinding {
    NewFinding::new(url, message, severity).with_tags(["wcag2a"])
}

pub fn missing_alt(url: &str) -> NewFinding {
    finding(url, "Images must have alternate text", Severity::Critical)
        .with_element("<img src=\"logo.png\">")
        .with_impact("critical")
        .with_help("https://dequeuniversity.com/rules/axe/4.8/image-alt")
        .with_details(serde_json::json!({ "ruleId": "image-alt" }))
}

pub fn low_contrast(url: &str) -> NewFinding {
    NewFinding::new(url, "Elements must have sufficient color contrast", Severity::Serious)
        .with_element("<p class=\"muted\">")
        .with_impact("serious")
        .with_tags(["wcag2aa", "wcag143"])
        .with_details(serde_json::json!({ "ruleId": "color-contrast" }))
}

pub fn empty_link(url: &str) -> NewFinding {
    finding(url, "Links must have discernible text", Severity::Serious)
        .with_element("<a href=\"/\"></a>")
}

/// Create a project tracking `urls`
pub async fn seed_project(store: &dyn ScanStore, name: &str, urls: &[&str]) -> Project {
    store
        .create_project(NewProject::new(name).with_urls(urls.iter().copied()))
        .await
        .unwrap()
}

/// Create a scan already in `status`, walking the allowed transitions
pub async fn seed_scan(
    store: &dyn ScanStore,
    project_id: ProjectId,
    url: &str,
    status: ScanStatus,
) -> Scan {
    let scan = store.create_scan(NewScan::new(project_id, url)).await.unwrap();
    if status == ScanStatus::Pending {
        return scan;
    }
    let now = Utc::now();
    let running = store
        .transition_scan(scan.id, &[ScanStatus::Pending], ScanUpdate::started(now))
        .await
        .unwrap();
    let update = match status {
        ScanStatus::Completed => ScanUpdate::completed(Default::default(), "seed", now),
        ScanStatus::Failed => ScanUpdate::failed("seeded failure", now),
        ScanStatus::Pending | ScanStatus::InProgress => return running,
    };
    store
        .transition_scan(scan.id, &[ScanStatus::InProgress], update)
        .await
        .unwrap()
}

/// Persist findings onto a scan in one committed transaction
pub async fn seed_results(
    store: &dyn ScanStore,
    scan_id: ScanId,
    results: Vec<NewFinding>,
) -> Vec<Finding> {
    let now = Utc::now();
    let rows: Vec<Finding> = results
        .into_iter()
        .map(|r| Finding::from_new(scan_id, r, now))
        .collect();
    let mut tx = store.begin(scan_id).await.unwrap();
    tx.bulk_insert_results(rows.clone()).await.unwrap();
    tx.commit().await.unwrap();
    rows
}

// ---------------------------------------------------------------------------
// Scripted analyzer
// ---------------------------------------------------------------------------

/// What a scripted analyzer does on one call
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Vec<NewFinding>),
    Fail(AnalysisError),
    Panic(String),
    /// Sleep, then run the inner step
    Delay(Duration, Box<Step>),
}

/// Analyzer replaying a script of steps
///
/// The last step repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedAnalyzer {
    name: &'static str,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(name: &'static str, findings: Vec<NewFinding>) -> Self {
        Self::new(name).then(Step::Succeed(findings))
    }

    pub fn failing(name: &'static str, error: AnalysisError) -> Self {
        Self::new(name).then(Step::Fail(error))
    }

    pub fn panicking(name: &'static str, message: &str) -> Self {
        Self::new(name).then(Step::Panic(message.to_string()))
    }

    pub fn sleeping(name: &'static str, delay: Duration) -> Self {
        Self::new(name).then(Step::Delay(delay, Box::new(Step::Succeed(Vec::new()))))
    }

    #[must_use]
    pub fn then(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }

    #[must_use]
    pub fn then_succeed(self, findings: Vec<NewFinding>) -> Self {
        self.then(Step::Succeed(findings))
    }

    #[must_use]
    pub fn then_fail(self, error: AnalysisError) -> Self {
        self.then(Step::Fail(error))
    }

    pub fn into_arc(self) -> Arc<dyn Analyzer> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    fn next_step(&self) -> Step {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last
                .clone()
                .unwrap_or_else(|| Step::Fail(AnalysisError::Unavailable("empty script".into()))),
        }
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn analyze(
        &self,
        url: &str,
        _options: &ComplianceOptions,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());

        let mut step = self.next_step();
        loop {
            match step {
                Step::Succeed(findings) => return Ok(AnalysisOutcome::from_results(findings)),
                Step::Fail(error) => return Err(error),
                Step::Panic(message) => panic!("{message}"),
                Step::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    step = *inner;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fault-injecting store
// ---------------------------------------------------------------------------

/// Store operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateScan,
    GetScan,
    Begin,
    ListResults,
    Insert,
    Delete,
    Update,
    Commit,
    /// `transition_scan` whose update moves the scan to this status
    TransitionTo(ScanStatus),
}

#[derive(Debug, Default)]
struct Faults {
    /// `None` fails forever, `Some(n)` fails the next `n` calls
    armed: Mutex<HashMap<FailPoint, Option<usize>>>,
    hits: Mutex<HashMap<FailPoint, usize>>,
    /// Yield to the scheduler before project reads
    yield_reads: AtomicBool,
}

impl Faults {
    async fn pause(&self) {
        if self.yield_reads.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let mut armed = self.armed.lock();
        let fire = match armed.get_mut(&point) {
            None => false,
            Some(None) => true,
            Some(Some(0)) => false,
            Some(Some(n)) => {
                *n -= 1;
                true
            }
        };
        if fire {
            *self.hits.lock().entry(point).or_default() += 1;
            return Err(StoreError::Database(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

/// Store wrapper failing selected operations
#[derive(Clone)]
pub struct FailingStore {
    inner: Arc<dyn ScanStore>,
    faults: Arc<Faults>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn ScanStore>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Fail `point` on every call
    pub fn fail(&self, point: FailPoint) -> &Self {
        self.faults.armed.lock().insert(point, None);
        self
    }

    /// Fail `point` for the next `times` calls
    pub fn fail_times(&self, point: FailPoint, times: usize) -> &Self {
        self.faults.armed.lock().insert(point, Some(times));
        self
    }

    /// Yield before every project read so concurrent callers interleave
    pub fn yield_on_reads(&self) -> &Self {
        self.faults.yield_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn heal(&self, point: FailPoint) {
        self.faults.armed.lock().remove(&point);
    }

    pub fn hits(&self, point: FailPoint) -> usize {
        self.faults.hits.lock().get(&point).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ScanStore for FailingStore {
    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        self.inner.create_project(project).await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        self.faults.pause().await;
        self.inner.get_project(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.inner.list_projects().await
    }

    async fn add_urls(
        &self,
        project_id: ProjectId,
        urls: &[String],
    ) -> Result<Vec<ProjectUrl>, StoreError> {
        self.inner.add_urls(project_id, urls).await
    }

    async fn list_urls(&self, project_id: ProjectId) -> Result<Vec<ProjectUrl>, StoreError> {
        self.faults.pause().await;
        self.inner.list_urls(project_id).await
    }

    async fn create_scan(&self, scan: NewScan) -> Result<Scan, StoreError> {
        self.faults.check(FailPoint::CreateScan)?;
        self.inner.create_scan(scan).await
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.faults.check(FailPoint::GetScan)?;
        self.inner.get_scan(id).await
    }

    async fn update_scan(&self, id: ScanId, update: ScanUpdate) -> Result<Scan, StoreError> {
        self.inner.update_scan(id, update).await
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        expected: &[ScanStatus],
        update: ScanUpdate,
    ) -> Result<Scan, StoreError> {
        if let Some(to) = update.status {
            self.faults.check(FailPoint::TransitionTo(to))?;
        }
        self.inner.transition_scan(id, expected, update).await
    }

    async fn list_scans_for_project(&self, project_id: ProjectId) -> Result<Vec<Scan>, StoreError> {
        self.faults.pause().await;
        self.inner.list_scans_for_project(project_id).await
    }

    async fn list_results_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>, StoreError> {
        self.inner.list_results_for_scan(scan_id).await
    }

    async fn begin(&self, scan_id: ScanId) -> Result<Box<dyn ResultTransaction>, StoreError> {
        self.faults.check(FailPoint::Begin)?;
        let inner = self.inner.begin(scan_id).await?;
        Ok(Box::new(FailingTransaction {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FailingTransaction {
    inner: Box<dyn ResultTransaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl ResultTransaction for FailingTransaction {
    fn scan_id(&self) -> ScanId {
        self.inner.scan_id()
    }

    async fn list_results(&mut self) -> Result<Vec<Finding>, StoreError> {
        self.faults.check(FailPoint::ListResults)?;
        self.inner.list_results().await
    }

    async fn bulk_insert_results(&mut self, results: Vec<Finding>) -> Result<u64, StoreError> {
        self.faults.check(FailPoint::Insert)?;
        self.inner.bulk_insert_results(results).await
    }

    async fn bulk_delete_results(&mut self, ids: &[FindingId]) -> Result<u64, StoreError> {
        self.faults.check(FailPoint::Delete)?;
        self.inner.bulk_delete_results(ids).await
    }

    async fn bulk_update_results(&mut self, patches: &[ResultPatch]) -> Result<u64, StoreError> {
        self.faults.check(FailPoint::Update)?;
        self.inner.bulk_update_results(patches).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if let Err(e) = self.faults.check(FailPoint::Commit) {
            // the uncommitted inner transaction is discarded
            self.inner.rollback().await?;
            return Err(e);
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
