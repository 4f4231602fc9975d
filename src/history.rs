//! Append-only healing history boundary.
//!
//! The orchestrator reads recent successes once per run to bias strategy
//! order, and appends one record after the outcome is final. It never holds
//! state of its own between runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::{ServiceError, ServiceKind};
use crate::types::StrategyKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub original_locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healed_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    pub confidence: f64,
    pub success: bool,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> Result<(), ServiceError>;

    /// Most recent successful records for `original_locator`, newest first.
    async fn recent_successes(
        &self,
        original_locator: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, ServiceError>;
}

fn newest_successes<'a>(
    records: impl DoubleEndedIterator<Item = &'a HistoryRecord>,
    original_locator: &str,
    limit: usize,
) -> Vec<HistoryRecord> {
    records
        .rev()
        .filter(|r| r.success && r.original_locator == original_locator)
        .take(limit)
        .cloned()
        .collect()
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<HistoryRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn records(&self) -> Vec<HistoryRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, record: HistoryRecord) -> Result<(), ServiceError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn recent_successes(
        &self,
        original_locator: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, ServiceError> {
        let records = self.records.read().await;
        Ok(newest_successes(records.iter(), original_locator, limit))
    }
}

/// One JSON record per line. Unparseable lines are skipped with a warning.
#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, err: std::io::Error) -> ServiceError {
        ServiceError::transient(
            ServiceKind::HistoryStore,
            format!("{}: {err}", self.path.display()),
        )
    }

    async fn read_all(&self) -> Result<Vec<HistoryRecord>, ServiceError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %self.path.display(), line = n + 1, error = %e, "skipping bad history line");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), ServiceError> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| ServiceError::permanent(ServiceKind::HistoryStore, e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))
    }

    async fn recent_successes(
        &self,
        original_locator: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, ServiceError> {
        let records = self.read_all().await?;
        Ok(newest_successes(records.iter(), original_locator, limit))
    }
}
