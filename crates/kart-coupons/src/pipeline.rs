//! File-by-file ingestion driver
//!
//! Each configured file is streamed line by line through the normalizer and
//! the batch builder; sealed batches go to the bounded writer. A file is only
//! reported once every batch dispatched for it has returned, and the next file
//! is not opened before that.

use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{info, warn};

use crate::batch::BatchBuilder;
use crate::config::LoaderConfig;
use crate::error::IngestError;
use crate::normalize::LineNormalizer;
use crate::source::{SourceFile, SourceTag};
use crate::store::CouponStore;
use crate::writer::{BulkWriter, WriteSummary};

/// Totals for one file that was read (fully or up to a scan fault)
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file: String,
    /// Normalized records read from the file
    pub records: u64,
    #[serde(flatten)]
    pub writes: WriteSummary,
    /// Set when reading stopped early; records before the fault were still written
    pub scan_warning: Option<String>,
}

/// What happened to one configured file
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Loaded(FileSummary),
    Skipped { file: String, reason: String },
}

/// Result of a whole run, in file order
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub files: Vec<FileOutcome>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn loaded(&self) -> impl Iterator<Item = &FileSummary> {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Loaded(summary) => Some(summary),
            FileOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.files
            .iter()
            .filter(|outcome| matches!(outcome, FileOutcome::Skipped { .. }))
            .count()
    }

    pub fn rows_attempted(&self) -> u64 {
        self.loaded().map(|s| s.writes.rows_attempted).sum()
    }

    pub fn rows_confirmed(&self) -> u64 {
        self.loaded().map(|s| s.writes.rows_confirmed).sum()
    }

    pub fn batches_failed(&self) -> u64 {
        self.loaded().map(|s| s.writes.batches_failed).sum()
    }
}

/// Drives ingestion of the configured source files into a [`CouponStore`]
pub struct CouponLoader {
    config: LoaderConfig,
    writer: BulkWriter,
    normalizer: LineNormalizer,
}

impl CouponLoader {
    pub fn new(store: Arc<dyn CouponStore>, config: LoaderConfig) -> Self {
        let writer = BulkWriter::new(
            store,
            config.max_workers,
            Duration::from_secs(config.write_timeout_secs),
        );
        let normalizer = LineNormalizer::new(config.max_code_len);
        Self {
            config,
            writer,
            normalizer,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Process every configured file in order
    ///
    /// Files that cannot be resolved or opened are skipped with a warning.
    pub async fn run(&self) -> RunSummary {
        let start = Instant::now();
        let mut files = Vec::with_capacity(self.config.files.len());

        info!(
            data_dir = %self.config.data_dir.display(),
            files = self.config.files.len(),
            batch_size = self.config.batch_size,
            max_workers = self.writer.max_in_flight(),
            "Starting coupon ingestion"
        );

        for name in &self.config.files {
            let outcome = match SourceFile::resolve(&self.config.data_dir, name) {
                Ok(source) => match self.process_source(&source).await {
                    Ok(summary) => FileOutcome::Loaded(summary),
                    Err(e) => skip(name, e),
                },
                Err(e) => skip(name, e),
            };
            files.push(outcome);
        }

        let summary = RunSummary {
            files,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            loaded = summary.loaded().count(),
            skipped = summary.skipped_count(),
            rows_attempted = summary.rows_attempted(),
            batches_failed = summary.batches_failed(),
            elapsed_secs = summary.elapsed_secs,
            "Coupon ingestion finished"
        );

        summary
    }

    /// Open one resolved file and ingest it
    pub async fn process_source(&self, source: &SourceFile) -> Result<FileSummary, IngestError> {
        let file = tokio::fs::File::open(&source.path)
            .await
            .map_err(|e| IngestError::Open {
                path: source.path.clone(),
                source: e,
            })?;

        Ok(self.ingest_reader(file, source.tag, &source.name).await)
    }

    /// Stream `reader` into the store under `tag`
    ///
    /// A scan fault (over-long line, I/O error, invalid UTF-8) stops reading;
    /// everything read up to that point is still batched and written.
    pub async fn ingest_reader<R>(&self, reader: R, tag: SourceTag, label: &str) -> FileSummary
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(self.config.max_line_bytes),
        );
        let mut builder = BatchBuilder::new(tag, self.config.batch_size);
        let mut session = self.writer.session(tag);
        let mut records = 0u64;
        let mut scan_warning = None;

        info!(file = label, file_tag = tag, "Processing source file");

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        file = label,
                        file_tag = tag,
                        records_read = records,
                        error = %e,
                        "Stopped reading source file; keeping records read so far"
                    );
                    scan_warning = Some(e.to_string());
                    break;
                },
            };

            let Some(code) = self.normalizer.normalize(&line) else {
                continue;
            };
            records += 1;

            if let Some(batch) = builder.append(code) {
                session.dispatch(batch).await;
            }
        }

        if let Some(batch) = builder.flush() {
            session.dispatch(batch).await;
        }

        let writes = session.drain().await;

        info!(
            file = label,
            file_tag = tag,
            records,
            batches = writes.batches_dispatched,
            failed = writes.batches_failed,
            rows = writes.rows_attempted,
            elapsed_ms = (writes.elapsed_secs * 1000.0) as u64,
            rows_per_sec = writes.rows_per_sec.round(),
            "Source file complete"
        );

        FileSummary {
            file: label.to_string(),
            records,
            writes,
            scan_warning,
        }
    }
}

fn skip(name: &str, error: IngestError) -> FileOutcome {
    warn!(file = name, error = %error, "Skipping source file");
    FileOutcome::Skipped {
        file: name.to_string(),
        reason: error.to_string(),
    }
}
