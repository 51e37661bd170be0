//! Error types for coupon ingestion
//!
//! Ingestion never aborts a run on these: [`IngestError`] skips a file and
//! [`WriteError`] drops a batch. Only startup failures in [`crate::db`] are fatal.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::db::DbError;

/// Per-file input failures; the file is skipped and the run continues
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("No numeric source tag at the end of file name '{0}'")]
    MissingSourceTag(String),

    #[error("Source tag '{tag}' in file name '{name}' must be a positive integer")]
    InvalidSourceTag { name: String, tag: String },

    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-batch write failures; the batch is logged and dropped
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{0}")]
    Store(#[from] DbError),

    #[error("Bulk insert did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Write admission gate is closed")]
    GateClosed,
}
