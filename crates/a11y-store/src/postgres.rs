//! Postgres store (sqlx)
//!
//! A [`ResultTransaction`] holds a database transaction that locks its scan
//! row with `SELECT ... FOR UPDATE`, so concurrent writers to one scan's
//! findings are serialized by the database.

use crate::error::StoreError;
use crate::gateway::{ResultTransaction, ScanStore};
use a11y_types::{
    ComplianceOptions, FieldChange, Finding, FindingId, NewProject, NewScan, Project, ProjectId,
    ProjectUrl, ResultPatch, Scan, ScanId, ScanStatus, ScanSummary, ScanUpdate, UrlId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

/// Rows per multi-row INSERT, well under the bind parameter limit
const INSERT_CHUNK: usize = 1000;

const SCAN_COLUMNS: &str = "id, project_id, url, status, started_at, completed_at, \
     critical_count, serious_count, moderate_count, minor_count, total_count, \
     analysis_method, error, created_at, updated_at";

const FINDING_COLUMNS: &str = "id, scan_id, url, message, element, severity, impact, help, \
     element_path, tags, details, created_at, updated_at";

#[derive(FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    compliance: Option<Json<ComplianceOptions>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            compliance: row.compliance.map(|c| c.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UrlRow {
    id: Uuid,
    project_id: Uuid,
    url: String,
    created_at: DateTime<Utc>,
}

impl From<UrlRow> for ProjectUrl {
    fn from(row: UrlRow) -> Self {
        Self {
            id: row.id.into(),
            project_id: row.project_id.into(),
            url: row.url,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ScanRow {
    id: Uuid,
    project_id: Uuid,
    url: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    critical_count: Option<i32>,
    serious_count: Option<i32>,
    moderate_count: Option<i32>,
    minor_count: Option<i32>,
    total_count: Option<i32>,
    analysis_method: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn count(value: Option<i32>) -> u32 {
    value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

fn column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl TryFrom<ScanRow> for Scan {
    type Error = StoreError;

    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        let status: ScanStatus = row
            .status
            .parse()
            .map_err(|e: a11y_types::ParseError| StoreError::Database(e.to_string()))?;
        let summary = row.total_count.map(|total| ScanSummary {
            critical: count(row.critical_count),
            serious: count(row.serious_count),
            moderate: count(row.moderate_count),
            minor: count(row.minor_count),
            total: count(Some(total)),
        });
        Ok(Self {
            id: row.id.into(),
            project_id: row.project_id.into(),
            url: row.url,
            status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            summary,
            analysis_method: row.analysis_method,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FindingRow {
    id: Uuid,
    scan_id: Uuid,
    url: String,
    message: String,
    element: Option<String>,
    severity: String,
    impact: Option<String>,
    help: Option<String>,
    element_path: Option<String>,
    tags: Vec<String>,
    details: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FindingRow> for Finding {
    type Error = StoreError;

    fn try_from(row: FindingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            scan_id: row.scan_id.into(),
            url: row.url,
            message: row.message,
            element: row.element,
            severity: row
                .severity
                .parse()
                .map_err(|e: a11y_types::ParseError| StoreError::Database(e.to_string()))?,
            impact: row.impact,
            help: row.help,
            element_path: row.element_path,
            tags: row.tags,
            details: row.details,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn findings(rows: Vec<FindingRow>) -> Result<Vec<Finding>, StoreError> {
    rows.into_iter().map(Finding::try_from).collect()
}

/// [`ScanStore`] backed by Postgres
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool
    #[inline]
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if the pool cannot connect.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply pending migrations
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Underlying pool
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_project(
        tx: &mut Transaction<'static, Postgres>,
        id: ProjectId,
    ) -> Result<(), StoreError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn insert_urls(
        tx: &mut Transaction<'static, Postgres>,
        project_id: ProjectId,
        urls: &[String],
    ) -> Result<Vec<ProjectUrl>, StoreError> {
        for (i, url) in urls.iter().enumerate() {
            if urls[..i].contains(url) {
                return Err(StoreError::DuplicateUrl(url.clone()));
            }
        }
        let taken: Option<(String,)> =
            sqlx::query_as("SELECT url FROM project_urls WHERE url = ANY($1) LIMIT 1")
                .bind(urls)
                .fetch_optional(&mut **tx)
                .await?;
        if let Some((url,)) = taken {
            return Err(StoreError::DuplicateUrl(url));
        }

        let now = Utc::now();
        let mut rows = Vec::with_capacity(urls.len());
        for url in urls {
            let row = ProjectUrl {
                id: UrlId::new(),
                project_id,
                url: url.clone(),
                created_at: now,
            };
            sqlx::query(
                "INSERT INTO project_urls (id, project_id, url, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id.as_uuid())
            .bind(project_id.as_uuid())
            .bind(&row.url)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    async fn lock_scan(
        tx: &mut Transaction<'static, Postgres>,
        id: ScanId,
    ) -> Result<Scan, StoreError> {
        let row: Option<ScanRow> =
            sqlx::query_as(&format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1 FOR UPDATE"))
                .bind(id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;
        row.ok_or_else(|| StoreError::not_found("scan", id))?
            .try_into()
    }

    async fn write_scan(
        tx: &mut Transaction<'static, Postgres>,
        scan: &Scan,
    ) -> Result<(), StoreError> {
        let summary = scan.summary;
        sqlx::query(
            "UPDATE scans SET url = $2, status = $3, started_at = $4, completed_at = $5, \
             critical_count = $6, serious_count = $7, moderate_count = $8, minor_count = $9, \
             total_count = $10, analysis_method = $11, error = $12, updated_at = $13 \
             WHERE id = $1",
        )
        .bind(scan.id.as_uuid())
        .bind(&scan.url)
        .bind(scan.status.as_str())
        .bind(scan.started_at)
        .bind(scan.completed_at)
        .bind(summary.map(|s| column(s.critical)))
        .bind(summary.map(|s| column(s.serious)))
        .bind(summary.map(|s| column(s.moderate)))
        .bind(summary.map(|s| column(s.minor)))
        .bind(summary.map(|s| column(s.total)))
        .bind(&scan.analysis_method)
        .bind(&scan.error)
        .bind(scan.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ScanStore for PgStore {
    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let record = Project {
            id: ProjectId::new(),
            name: project.name,
            compliance: project.compliance_options,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO projects (id, name, compliance, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id.as_uuid())
        .bind(&record.name)
        .bind(record.compliance.map(Json))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        Self::insert_urls(&mut tx, record.id, &project.urls).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, name, compliance, created_at, updated_at FROM projects WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Project::from)
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            "SELECT id, name, compliance, created_at, updated_at FROM projects \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn add_urls(
        &self,
        project_id: ProjectId,
        urls: &[String],
    ) -> Result<Vec<ProjectUrl>, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_project(&mut tx, project_id).await?;
        let rows = Self::insert_urls(&mut tx, project_id, urls).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn list_urls(&self, project_id: ProjectId) -> Result<Vec<ProjectUrl>, StoreError> {
        // distinguishes an unknown project from one without urls
        self.get_project(project_id).await?;
        let rows: Vec<UrlRow> = sqlx::query_as(
            "SELECT id, project_id, url, created_at FROM project_urls \
             WHERE project_id = $1 ORDER BY seq",
        )
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProjectUrl::from).collect())
    }

    async fn create_scan(&self, scan: NewScan) -> Result<Scan, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_project(&mut tx, scan.project_id).await?;
        let record = Scan::pending(scan.project_id, scan.url, Utc::now());
        sqlx::query(
            "INSERT INTO scans (id, project_id, url, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id.as_uuid())
        .bind(record.project_id.as_uuid())
        .bind(&record.url)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn get_scan(&self, id: ScanId) -> Result<Scan, StoreError> {
        let row: Option<ScanRow> =
            sqlx::query_as(&format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or_else(|| StoreError::not_found("scan", id))?
            .try_into()
    }

    async fn update_scan(&self, id: ScanId, update: ScanUpdate) -> Result<Scan, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut scan = Self::lock_scan(&mut tx, id).await?;
        update.apply_to(&mut scan);
        Self::write_scan(&mut tx, &scan).await?;
        tx.commit().await?;
        Ok(scan)
    }

    async fn transition_scan(
        &self,
        id: ScanId,
        expected: &[ScanStatus],
        update: ScanUpdate,
    ) -> Result<Scan, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut scan = Self::lock_scan(&mut tx, id).await?;

        let allowed = expected.contains(&scan.status)
            && update
                .status
                .map_or(true, |to| scan.status.can_transition_to(to));
        if !allowed {
            return Err(StoreError::StatusConflict {
                scan_id: id,
                actual: scan.status,
                expected: expected.to_vec(),
            });
        }

        update.apply_to(&mut scan);
        Self::write_scan(&mut tx, &scan).await?;
        tx.commit().await?;
        Ok(scan)
    }

    async fn list_scans_for_project(&self, project_id: ProjectId) -> Result<Vec<Scan>, StoreError> {
        self.get_project(project_id).await?;
        let rows: Vec<ScanRow> = sqlx::query_as(&format!(
            "SELECT {SCAN_COLUMNS} FROM scans WHERE project_id = $1 ORDER BY created_at"
        ))
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Scan::try_from).collect()
    }

    async fn list_results_for_scan(&self, scan_id: ScanId) -> Result<Vec<Finding>, StoreError> {
        self.get_scan(scan_id).await?;
        let rows: Vec<FindingRow> = sqlx::query_as(&format!(
            "SELECT {FINDING_COLUMNS} FROM scan_results WHERE scan_id = $1 ORDER BY seq"
        ))
        .bind(scan_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        findings(rows)
    }

    async fn begin(&self, scan_id: ScanId) -> Result<Box<dyn ResultTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_scan(&mut tx, scan_id).await?;
        Ok(Box::new(PgTransaction { tx, scan_id }))
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
    scan_id: ScanId,
}

#[async_trait]
impl ResultTransaction for PgTransaction {
    fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    async fn list_results(&mut self) -> Result<Vec<Finding>, StoreError> {
        let rows: Vec<FindingRow> = sqlx::query_as(&format!(
            "SELECT {FINDING_COLUMNS} FROM scan_results WHERE scan_id = $1 ORDER BY seq"
        ))
        .bind(self.scan_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;
        findings(rows)
    }

    async fn bulk_insert_results(&mut self, results: Vec<Finding>) -> Result<u64, StoreError> {
        if let Some(foreign) = results.iter().find(|f| f.scan_id != self.scan_id) {
            return Err(StoreError::InvalidWrite(format!(
                "finding {} belongs to scan {}, not {}",
                foreign.id, foreign.scan_id, self.scan_id
            )));
        }

        let mut inserted = 0;
        for chunk in results.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(format!("INSERT INTO scan_results ({FINDING_COLUMNS}) "));
            builder.push_values(chunk, |mut row, f| {
                row.push_bind(f.id.as_uuid())
                    .push_bind(f.scan_id.as_uuid())
                    .push_bind(&f.url)
                    .push_bind(&f.message)
                    .push_bind(&f.element)
                    .push_bind(f.severity.as_str())
                    .push_bind(&f.impact)
                    .push_bind(&f.help)
                    .push_bind(&f.element_path)
                    .push_bind(&f.tags)
                    .push_bind(&f.details)
                    .push_bind(f.created_at)
                    .push_bind(f.updated_at);
            });
            inserted += builder.build().execute(&mut *self.tx).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn bulk_delete_results(&mut self, ids: &[FindingId]) -> Result<u64, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(FindingId::as_uuid).collect();
        let deleted = sqlx::query("DELETE FROM scan_results WHERE scan_id = $1 AND id = ANY($2)")
            .bind(self.scan_id.as_uuid())
            .bind(&uuids)
            .execute(&mut *self.tx)
            .await?
            .rows_affected();
        if deleted != ids.len() as u64 {
            return Err(StoreError::InvalidWrite(format!(
                "deleted {deleted} of {} findings",
                ids.len()
            )));
        }
        Ok(deleted)
    }

    async fn bulk_update_results(&mut self, patches: &[ResultPatch]) -> Result<u64, StoreError> {
        let mut updated = 0;
        for patch in patches {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new("UPDATE scan_results SET updated_at = ");
            builder.push_bind(patch.updated_at);
            for change in &patch.changes {
                match change {
                    FieldChange::Help(v) => builder.push(", help = ").push_bind(v.clone()),
                    FieldChange::Impact(v) => builder.push(", impact = ").push_bind(v.clone()),
                    FieldChange::Tags(v) => builder.push(", tags = ").push_bind(v.clone()),
                    FieldChange::ElementPath(v) => {
                        builder.push(", element_path = ").push_bind(v.clone())
                    }
                    FieldChange::Details(v) => builder.push(", details = ").push_bind(v.clone()),
                };
            }
            builder
                .push(" WHERE id = ")
                .push_bind(patch.id.as_uuid())
                .push(" AND scan_id = ")
                .push_bind(self.scan_id.as_uuid());

            let affected = builder.build().execute(&mut *self.tx).await?.rows_affected();
            if affected == 0 {
                return Err(StoreError::not_found("finding", patch.id));
            }
            updated += affected;
        }
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
