use std::path::PathBuf;

use thiserror::Error;

use super::normalize::Dimension;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("plan store path not configured")]
    MissingStore,
    #[error("failed to open database at {path}: {source}")]
    OpenDatabase {
        path: PathBuf,
        source: rusqlite::Error,
    },
}

pub type PlanResult<T> = std::result::Result<T, PlanError>;

/// A filter request that cannot describe any range. Never a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FilterError {
    #[error("invalid range [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },
    #[error("invalid {dimension} range [{min}, {max}]")]
    InvalidDimensionRange {
        dimension: Dimension,
        min: f64,
        max: f64,
    },
}

pub type FilterResult<T> = std::result::Result<T, FilterError>;
