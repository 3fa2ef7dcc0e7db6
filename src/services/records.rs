// Record service: the single owner of the in-memory record list.
//
// Reads go remote first. A successful read replaces the cache (and the disk
// snapshot when one is configured). A failed read either surfaces or, with
// fallback enabled, serves the cached list flagged as stale. Writes are
// remote-only; the cache follows a successful write and is never touched on
// failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::AppError;
use crate::gateway::RecordGateway;
use crate::records::{
    next_task_number, prepare_new_record, prepare_update, validate_required, Category, Record,
    RecordQuery, RecordSubmission,
};

/// Records plus whether they came from the cache instead of the backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordList {
    pub records: Vec<Record>,
    pub stale: bool,
}

pub struct RecordService {
    gateway: Arc<dyn RecordGateway>,
    cache: RwLock<Vec<Record>>,
    fallback_to_cache: bool,
    snapshot_path: Option<PathBuf>,
}

impl RecordService {
    pub fn new(
        gateway: Arc<dyn RecordGateway>,
        fallback_to_cache: bool,
        snapshot_path: Option<PathBuf>,
    ) -> Self {
        let cached = snapshot_path
            .as_deref()
            .map(load_snapshot)
            .unwrap_or_default();
        Self {
            gateway,
            cache: RwLock::new(cached),
            fallback_to_cache,
            snapshot_path,
        }
    }

    /// Last list seen from the backend.
    pub fn cached(&self) -> Vec<Record> {
        self.cache.read().clone()
    }

    pub async fn list(&self) -> Result<RecordList, AppError> {
        match self.gateway.list().await {
            Ok(records) => {
                self.replace_cache(records.clone()).await;
                Ok(RecordList {
                    records,
                    stale: false,
                })
            }
            Err(e) if self.fallback_to_cache => {
                log::warn!("Record list failed, serving cache: {}", e);
                Ok(RecordList {
                    records: self.cached(),
                    stale: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// List, then filter and sort the way the record table does.
    pub async fn query(&self, query: &RecordQuery) -> Result<RecordList, AppError> {
        let list = self.list().await?;
        Ok(RecordList {
            records: query.apply(&list.records),
            stale: list.stale,
        })
    }

    pub async fn next_task_number(&self, category: &str) -> Result<u32, AppError> {
        let category = Category::resolve(category, None);
        let list = self.list().await?;
        Ok(next_task_number(&list.records, &category))
    }

    pub async fn create(&self, submission: RecordSubmission) -> Result<Record, AppError> {
        precheck(&submission)?;
        let now = Utc::now();
        self.insert_with(|existing| prepare_new_record(submission, existing, now))
            .await
    }

    /// Build a new record against the current list, then store it.
    pub async fn insert_with<F>(&self, build: F) -> Result<Record, AppError>
    where
        F: FnOnce(&[Record]) -> Result<Record, AppError> + Send,
    {
        let existing = self.list().await?.records;
        let record = build(&existing)?;

        let stored = self.gateway.create(&record).await?;
        log::info!(
            "Created record {} ({} #{})",
            stored.id,
            stored.input.category,
            stored.input.task_no
        );

        let snapshot = {
            let mut cache = self.cache.write();
            cache.insert(0, stored.clone());
            self.render_snapshot(&cache)
        };
        self.write_snapshot(snapshot).await;
        Ok(stored)
    }

    pub async fn update(&self, id: &str, submission: RecordSubmission) -> Result<Record, AppError> {
        precheck(&submission)?;
        let existing = self.list().await?.records;
        let current = existing
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("record {}", id)))?;
        let record = prepare_update(current, submission, &existing)?;

        let stored = self.gateway.update(id, &record).await?;
        log::info!("Updated record {}", id);

        let snapshot = {
            let mut cache = self.cache.write();
            if let Some(slot) = cache.iter_mut().find(|r| r.id == id) {
                *slot = stored.clone();
            }
            self.render_snapshot(&cache)
        };
        self.write_snapshot(snapshot).await;
        Ok(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.gateway.delete(id).await?;
        log::info!("Deleted record {}", id);

        let snapshot = {
            let mut cache = self.cache.write();
            cache.retain(|r| r.id != id);
            self.render_snapshot(&cache)
        };
        self.write_snapshot(snapshot).await;
        Ok(())
    }

    async fn replace_cache(&self, records: Vec<Record>) {
        let snapshot = {
            let mut cache = self.cache.write();
            *cache = records;
            self.render_snapshot(&cache)
        };
        self.write_snapshot(snapshot).await;
    }

    /// Serialize the cache while the lock is held; the write happens after.
    fn render_snapshot(&self, records: &[Record]) -> Option<String> {
        let path = self.snapshot_path.as_deref()?;
        match serde_json::to_string_pretty(records) {
            Ok(content) => Some(content),
            Err(e) => {
                log::warn!("Failed to serialize record snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Snapshot failures are logged, never surfaced: the backend holds the truth.
    async fn write_snapshot(&self, content: Option<String>) {
        let (Some(path), Some(content)) = (self.snapshot_path.as_deref(), content) else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, content).await {
            log::warn!("Failed to write record snapshot {}: {}", path.display(), e);
        }
    }
}

/// Reject a submission with blank required fields before any backend call.
fn precheck(submission: &RecordSubmission) -> Result<(), AppError> {
    let mut input = submission.input.clone();
    input.category = Category::resolve(&input.category, submission.custom_category.as_deref());
    let errors = validate_required(&input);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn load_snapshot(path: &Path) -> Vec<Record> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(records) => records,
        Err(e) => {
            log::warn!("Ignoring unreadable record snapshot {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::gateway::fakes::MemoryRecords;
    use crate::records::RecordInput;

    fn stored(id: &str, category: &str, task_no: &str, created_at: &str) -> Record {
        Record {
            id: id.into(),
            input: RecordInput {
                category: category.into(),
                task_no: task_no.into(),
                receipt_date: "2024-03-01".into(),
                requester: "Kim".into(),
                request_content: "Fix".into(),
                sm_manager: "Lee".into(),
                request_team: "Ops".into(),
                ..Default::default()
            },
            created_at: created_at.into(),
        }
    }

    fn submission(category: &str) -> RecordSubmission {
        RecordSubmission::from(RecordInput {
            category: category.into(),
            receipt_date: "2024-03-15".into(),
            requester: "Park".into(),
            request_content: "Dashboard filter broken".into(),
            sm_manager: "Lee".into(),
            request_team: "Sales".into(),
            work_time_hours: "4".into(),
            ..Default::default()
        })
    }

    fn service(gateway: Arc<MemoryRecords>, fallback: bool) -> RecordService {
        RecordService::new(gateway, fallback, None)
    }

    #[tokio::test]
    async fn create_numbers_derives_and_stores() {
        let gateway = Arc::new(MemoryRecords::with_rows(vec![
            stored("a", "Plan", "3", "2024-03-01T00:00:00Z"),
            stored("b", "Plan", "7", "2024-03-02T00:00:00Z"),
            stored("c", "Dashboard", "9", "2024-03-03T00:00:00Z"),
        ]));
        let svc = service(gateway.clone(), false);

        let record = svc.create(submission("Plan")).await.unwrap();
        assert_eq!(record.input.task_no, "8");
        assert_eq!(record.input.year, "2024");
        assert_eq!(record.input.target_month, "2024-03");
        assert_eq!(record.input.start_date, "2024-03-15");
        assert_eq!(record.input.total_mm, "0.024");
        assert_eq!(gateway.rows.lock().len(), 4);
        assert_eq!(svc.cached()[0].id, record.id);
    }

    #[tokio::test]
    async fn invalid_submission_never_reaches_the_gateway() {
        let gateway = Arc::new(MemoryRecords::default());
        let svc = service(gateway.clone(), false);

        let mut bad = submission("Plan");
        bad.input.requester.clear();
        bad.input.sm_manager = "   ".into();
        match svc.create(bad).await {
            Err(AppError::Validation(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn offline_list_without_fallback_surfaces_error() {
        let gateway = Arc::new(MemoryRecords::default());
        gateway.set_offline(true);
        let svc = service(gateway, false);
        assert!(matches!(svc.list().await, Err(AppError::Network(_))));
    }

    #[tokio::test]
    async fn offline_list_with_fallback_serves_stale_cache() {
        let gateway = Arc::new(MemoryRecords::with_rows(vec![stored(
            "a",
            "Plan",
            "1",
            "2024-03-01T00:00:00Z",
        )]));
        let svc = service(gateway.clone(), true);
        let fresh = svc.list().await.unwrap();
        assert!(!fresh.stale);

        gateway.set_offline(true);
        let stale = svc.list().await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.records.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let gateway = Arc::new(MemoryRecords::with_rows(vec![stored(
            "a",
            "Plan",
            "1",
            "2024-03-01T00:00:00Z",
        )]));
        let svc = service(gateway.clone(), true);
        svc.list().await.unwrap();

        gateway.set_offline(true);
        assert!(svc.create(submission("Plan")).await.is_err());
        assert!(svc.delete("a").await.is_err());
        assert_eq!(svc.cached().len(), 1);
    }

    #[tokio::test]
    async fn update_keeps_identity_and_renumbers_on_category_move() {
        let gateway = Arc::new(MemoryRecords::with_rows(vec![
            stored("a", "Plan", "2", "2024-03-01T00:00:00Z"),
            stored("b", "Dashboard", "5", "2024-03-02T00:00:00Z"),
        ]));
        let svc = service(gateway.clone(), false);

        let mut moved = submission("Dashboard");
        moved.input.task_no = "2".into();
        let updated = svc.update("a", moved).await.unwrap();
        assert_eq!(updated.id, "a");
        assert_eq!(updated.created_at, "2024-03-01T00:00:00Z");
        assert_eq!(updated.input.task_no, "6");
    }

    #[tokio::test]
    async fn update_receipt_date_cascades_to_schedule() {
        let gateway = Arc::new(MemoryRecords::default());
        let svc = service(gateway.clone(), false);
        let created = svc.create(submission("Plan")).await.unwrap();

        let mut edited = RecordSubmission::from(created.input.clone());
        edited.input.receipt_date = "2024-04-01".into();
        let updated = svc.update(&created.id, edited).await.unwrap();

        assert_eq!(updated.input.target_month, "2024-04");
        assert_eq!(updated.input.start_date, "2024-04-01");
        assert_eq!(updated.input.expected_deploy_date, "2024-04-01");
        assert_eq!(updated.input.actual_deploy_date, "2024-04-01");
        assert_eq!(gateway.rows.lock()[0].input.start_date, "2024-04-01");
    }

    #[tokio::test]
    async fn snapshot_follows_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let svc = RecordService::new(
            Arc::new(MemoryRecords::default()),
            true,
            Some(path.clone()),
        );
        let created = svc.create(submission("Plan")).await.unwrap();

        let mut edited = RecordSubmission::from(created.input.clone());
        edited.input.note = "patched".into();
        svc.update(&created.id, edited).await.unwrap();

        let saved: Vec<Record> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].input.note, "patched");
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let svc = service(Arc::new(MemoryRecords::default()), false);
        assert!(matches!(
            svc.update("missing", submission("Plan")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn custom_category_numbers_independently() {
        let gateway = Arc::new(MemoryRecords::with_rows(vec![stored(
            "a",
            "Infra",
            "4",
            "2024-03-01T00:00:00Z",
        )]));
        let svc = service(gateway, false);

        let mut custom = submission("Other");
        custom.custom_category = Some("Infra".into());
        let record = svc.create(custom).await.unwrap();
        assert_eq!(record.input.category, "Infra");
        assert_eq!(record.input.task_no, "5");
        assert_eq!(svc.next_task_number("Plan").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let gateway = Arc::new(MemoryRecords::with_rows(vec![stored(
            "a",
            "Plan",
            "1",
            "2024-03-01T00:00:00Z",
        )]));

        RecordService::new(gateway.clone(), true, Some(path.clone()))
            .list()
            .await
            .unwrap();
        assert!(path.exists());

        gateway.set_offline(true);
        let restarted = RecordService::new(gateway, true, Some(path));
        let list = restarted.list().await.unwrap();
        assert!(list.stale);
        assert_eq!(list.records[0].id, "a");
    }
}
