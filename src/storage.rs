use crate::models::ReportRow;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode reports: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only table of weekly reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, row: ReportRow) -> Result<(), StoreError>;

    /// Every stored row, ascending by date. Rows sharing a date keep their
    /// insertion order.
    async fn list_all(&self) -> Result<Vec<ReportRow>, StoreError>;
}

fn sorted_by_date(rows: &[ReportRow]) -> Vec<ReportRow> {
    let mut rows = rows.to_vec();
    rows.sort_by_key(|row| row.date);
    rows
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ReportRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert(&self, row: ReportRow) -> Result<(), StoreError> {
        self.rows.lock().await.push(row);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ReportRow>, StoreError> {
        Ok(sorted_by_date(&self.rows.lock().await))
    }
}

/// Rows kept in memory and mirrored to a pretty-printed JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
    rows: Mutex<Vec<ReportRow>>,
}

impl JsonFileStore {
    /// Loads the report file at `path`, creating its directory if needed.
    ///
    /// Rows that cannot be read are skipped. When that happens the original
    /// file is first renamed to `<name>.corrupt-<timestamp>` and the readable
    /// rows are written back, so later inserts never overwrite history that
    /// failed to load.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent).await?;
        }

        let loaded = load_rows(&path).await?;
        if loaded.skipped > 0 {
            let backup = quarantine(&path).await?;
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                skipped = loaded.skipped,
                kept = loaded.rows.len(),
                "report file had unreadable rows; original moved aside"
            );
            persist_rows(&path, &loaded.rows).await?;
        }

        info!(path = %path.display(), rows = loaded.rows.len(), "report store opened");
        Ok(Self {
            path,
            rows: Mutex::new(loaded.rows),
        })
    }
}

#[async_trait]
impl ReportStore for JsonFileStore {
    async fn insert(&self, row: ReportRow) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.push(row);

        if let Err(err) = persist_rows(&self.path, &rows).await {
            // A row that never reached disk is not kept.
            rows.pop();
            return Err(err);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ReportRow>, StoreError> {
        Ok(sorted_by_date(&self.rows.lock().await))
    }
}

struct LoadedRows {
    rows: Vec<ReportRow>,
    skipped: usize,
}

async fn load_rows(path: &Path) -> Result<LoadedRows, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LoadedRows {
                rows: Vec::new(),
                skipped: 0,
            });
        }
        Err(err) => {
            error!("failed to read report file: {err}");
            return Err(err.into());
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
        Ok(values) => values,
        Err(err) => {
            error!("report file is not a JSON array: {err}");
            return Ok(LoadedRows {
                rows: Vec::new(),
                skipped: 1,
            });
        }
    };

    let mut rows = Vec::with_capacity(values.len());
    let mut skipped = 0;
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<ReportRow>(value) {
            Ok(row) => rows.push(row),
            Err(err) => {
                error!("skipping unreadable report at index {position}: {err}");
                skipped += 1;
            }
        }
    }

    Ok(LoadedRows { rows, skipped })
}

async fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.f")));
    let backup = path.with_file_name(name);
    fs::rename(path, &backup).await?;
    Ok(backup)
}

async fn persist_rows(path: &Path, rows: &[ReportRow]) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(rows)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(y: i32, m: u32, d: u32, rep: &str) -> ReportRow {
        ReportRow {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            branch: "ACS".to_string(),
            rep: rep.to_string(),
            one_time_quotes: 2,
            one_time_sales: 1,
            weekly_quotes: 0,
            weekly_sales: 0,
            biweekly_quotes: 0,
            biweekly_sales: 0,
            monthly_quotes: 0,
            monthly_sales: 0,
        }
    }

    fn unique_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("kpi_store_{tag}_{}_{}", std::process::id(), nanos));
        path.push("reports.json");
        path
    }

    #[tokio::test]
    async fn memory_store_lists_by_date_keeping_insert_order_for_ties() {
        let store = MemoryStore::new();
        store.insert(row(2024, 2, 1, "Kari")).await.unwrap();
        store.insert(row(2023, 12, 31, "Ashley")).await.unwrap();
        store.insert(row(2024, 2, 1, "Ronda")).await.unwrap();

        let reps: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.rep)
            .collect();
        assert_eq!(reps, vec!["Ashley", "Kari", "Ronda"]);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = unique_path("reopen");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            assert!(store.list_all().await.unwrap().is_empty());
            store.insert(row(2024, 1, 8, "Lisa")).await.unwrap();
            store.insert(row(2024, 1, 1, "Kari")).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let rows = reopened.list_all().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rep, "Kari");
        assert_eq!(rows[1].rep, "Lisa");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    fn backups(path: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|entry| {
                entry
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("reports.json.corrupt-"))
            })
            .collect()
    }

    #[tokio::test]
    async fn file_store_keeps_readable_rows_when_one_is_bad() {
        let path = unique_path("bad_row");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let original = serde_json::to_vec_pretty(&serde_json::json!([
            row(2024, 1, 1, "Kari"),
            { "date": "", "branch": "ACS", "rep": "Ashley", "one_time_quotes": 3 },
            row(2024, 1, 8, "Lisa"),
        ]))
        .unwrap();
        std::fs::write(&path, &original).unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);

        store.insert(row(2024, 1, 15, "Ronda")).await.unwrap();
        let on_disk: Vec<ReportRow> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let reps: Vec<_> = on_disk.into_iter().map(|row| row.rep).collect();
        assert_eq!(reps, vec!["Kari", "Lisa", "Ronda"]);

        let backups = backups(&path);
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read(&backups[0]).unwrap(), original);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn file_store_moves_unparsable_file_aside() {
        let path = unique_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());

        let backups = backups(&path);
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read(&backups[0]).unwrap(), b"{ not json");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn file_store_reopen_of_clean_file_makes_no_backup() {
        let path = unique_path("clean");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.insert(row(2024, 1, 1, "Kari")).await.unwrap();
        }

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);
        assert!(backups(&path).is_empty());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
