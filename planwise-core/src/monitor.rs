use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::Plan;
use crate::sqlite::configure_connection;

const METRICS_SCHEMA: &str = include_str!("../../sql/search_metrics.sql");

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to open metrics database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("metrics execution error: {0}")]
    Execute(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// One answered search: the question and the package names shown for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchMetric {
    pub question: String,
    pub recommended_package_names: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

impl SearchMetric {
    pub fn new(question: impl Into<String>, plans: &[Plan]) -> Self {
        Self {
            question: question.into(),
            recommended_package_names: plans
                .iter()
                .map(|plan| plan.package_name.clone())
                .collect(),
            recorded_at: Utc::now(),
        }
    }
}

/// Write-only destination for search metrics.
pub trait MetricsSink: Send + Sync {
    fn record_search(&self, metric: &SearchMetric) -> Result<(), MonitorError>;
}

#[derive(Debug, Clone)]
pub struct SqliteMetricsStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteMetricsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, MonitorError> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            MonitorError::Open {
                source,
                path: self.path.clone(),
            }
        })?;
        configure_connection(&conn).map_err(|source| MonitorError::Open {
            source,
            path: self.path.clone(),
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> Result<(), MonitorError> {
        let conn = self.open()?;
        conn.execute_batch(METRICS_SCHEMA)?;
        Ok(())
    }

    /// Most recent searches first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SearchMetric>, MonitorError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT question, recommended_package_names, recorded_at
             FROM search_metrics ORDER BY recorded_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, NaiveDateTime>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(question, names, recorded_at)| {
                Ok(SearchMetric {
                    question,
                    recommended_package_names: serde_json::from_str(&names)?,
                    recorded_at: Utc.from_utc_datetime(&recorded_at),
                })
            })
            .collect()
    }
}

impl MetricsSink for SqliteMetricsStore {
    fn record_search(&self, metric: &SearchMetric) -> Result<(), MonitorError> {
        let names = serde_json::to_string(&metric.recommended_package_names)?;
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO search_metrics (question, recommended_package_names, recorded_at)
             VALUES (?1, ?2, ?3)",
            params![&metric.question, names, metric.recorded_at.naive_utc()],
        )?;
        Ok(())
    }
}

/// Keeps metrics in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    records: Mutex<Vec<SearchMetric>>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SearchMetric> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn record_search(&self, metric: &SearchMetric) -> Result<(), MonitorError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| MonitorError::Unavailable("memory sink poisoned".into()))?;
        records.push(metric.clone());
        Ok(())
    }
}
