//! Bounded bulk writer
//!
//! Sealed batches are written by spawned tasks, at most `max_in_flight` at a
//! time. A task takes a permit from the admission gate before it is spawned and
//! gives it back when its insert returns, so a saturated gate makes
//! [`WriteSession::dispatch`] wait and pushes back on the file reader.
//!
//! Failed batches are logged and dropped; nothing is retried and no other batch
//! is affected. A batch's rows count as attempted from the moment it is
//! dispatched, so crashed or timed-out writes still show up in the totals.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::batch::Batch;
use crate::error::WriteError;
use crate::source::SourceTag;
use crate::store::CouponStore;

/// Rows per second, or zero when no time has elapsed
pub fn throughput(rows: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        rows as f64 / secs
    } else {
        0.0
    }
}

/// Shared writer: owns the store handle and the admission gate
#[derive(Clone)]
pub struct BulkWriter {
    store: Arc<dyn CouponStore>,
    gate: Arc<Semaphore>,
    max_in_flight: usize,
    write_timeout: Duration,
}

impl BulkWriter {
    pub fn new(store: Arc<dyn CouponStore>, max_in_flight: usize, write_timeout: Duration) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            store,
            gate: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            write_timeout,
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Start tracking the writes for one file
    pub fn session(&self, file_tag: SourceTag) -> WriteSession {
        WriteSession {
            store: Arc::clone(&self.store),
            gate: Arc::clone(&self.gate),
            write_timeout: self.write_timeout,
            file_tag,
            tasks: JoinSet::new(),
            rows_attempted: AtomicU64::new(0),
            batches_dispatched: 0,
            batches_failed: 0,
            rows_confirmed: 0,
            started: Instant::now(),
        }
    }
}

/// Outcome of one batch write
#[derive(Debug)]
pub struct BatchReport {
    pub file_tag: SourceTag,
    pub sequence: u64,
    pub rows: usize,
    pub elapsed: Duration,
    pub result: Result<u64, WriteError>,
}

/// Per-file totals once every dispatched batch has returned
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteSummary {
    pub file_tag: SourceTag,
    pub batches_dispatched: u64,
    pub batches_failed: u64,
    /// Rows of every dispatched batch, whether or not the insert succeeded
    pub rows_attempted: u64,
    /// Rows the store reported as written
    pub rows_confirmed: u64,
    pub elapsed_secs: f64,
    pub rows_per_sec: f64,
}

/// In-flight writes for a single file
pub struct WriteSession {
    store: Arc<dyn CouponStore>,
    gate: Arc<Semaphore>,
    write_timeout: Duration,
    file_tag: SourceTag,
    tasks: JoinSet<BatchReport>,
    rows_attempted: AtomicU64,
    batches_dispatched: u64,
    batches_failed: u64,
    rows_confirmed: u64,
    started: Instant,
}

impl WriteSession {
    /// Hand a sealed batch to a write task, waiting for a free slot first
    ///
    /// Blocks while all `max_in_flight` slots are taken. The batch is counted
    /// as dispatched once a slot is granted (or the gate turns out closed), so
    /// dropping this future while it waits leaves the totals untouched.
    pub async fn dispatch(&mut self, batch: Batch) {
        self.reap_finished();

        let acquired = Arc::clone(&self.gate).acquire_owned().await;
        self.batches_dispatched += 1;
        self.rows_attempted
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let permit = match acquired {
            Ok(permit) => permit,
            Err(_) => {
                error!(
                    file_tag = self.file_tag,
                    batch = batch.sequence(),
                    rows = batch.len(),
                    error = %WriteError::GateClosed,
                    "Could not dispatch batch; dropping it"
                );
                self.batches_failed += 1;
                return;
            },
        };

        debug!(
            file_tag = self.file_tag,
            batch = batch.sequence(),
            rows = batch.len(),
            available = self.gate.available_permits(),
            "Dispatching batch"
        );

        let store = Arc::clone(&self.store);
        let write_timeout = self.write_timeout;

        self.tasks.spawn(async move {
            let report = write_batch(store.as_ref(), &batch, write_timeout).await;
            drop(permit);
            report
        });
    }

    /// Batches whose task has not been collected yet
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every dispatched batch to return and total the results
    pub async fn drain(mut self) -> WriteSummary {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }

        let elapsed = self.started.elapsed();
        let rows_attempted = self.rows_attempted.load(Ordering::Relaxed);

        WriteSummary {
            file_tag: self.file_tag,
            batches_dispatched: self.batches_dispatched,
            batches_failed: self.batches_failed,
            rows_attempted,
            rows_confirmed: self.rows_confirmed,
            elapsed_secs: elapsed.as_secs_f64(),
            rows_per_sec: throughput(rows_attempted, elapsed),
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: Result<BatchReport, JoinError>) {
        match joined {
            Ok(report) => match report.result {
                Ok(rows) => self.rows_confirmed += rows,
                Err(_) => self.batches_failed += 1,
            },
            Err(e) => {
                error!(file_tag = self.file_tag, error = %e, "Write task did not complete");
                self.batches_failed += 1;
            },
        }
    }
}

/// Write one batch under `deadline` and log the outcome
pub async fn write_batch(store: &dyn CouponStore, batch: &Batch, deadline: Duration) -> BatchReport {
    let start = Instant::now();
    let keys = batch.stored_keys();

    let result = match tokio::time::timeout(deadline, store.bulk_insert(&keys)).await {
        Ok(Ok(rows)) => Ok(rows),
        Ok(Err(e)) => Err(WriteError::from(e)),
        Err(_) => Err(WriteError::Timeout(deadline)),
    };

    let elapsed = start.elapsed();
    match &result {
        Ok(rows) => info!(
            file_tag = batch.file_tag(),
            batch = batch.sequence(),
            rows = *rows,
            elapsed_ms = elapsed.as_millis() as u64,
            rows_per_sec = throughput(batch.len() as u64, elapsed).round(),
            "Batch written"
        ),
        Err(e) => error!(
            file_tag = batch.file_tag(),
            batch = batch.sequence(),
            rows = batch.len(),
            error = %e,
            "Batch insert failed; dropping batch"
        ),
    }

    BatchReport {
        file_tag: batch.file_tag(),
        sequence: batch.sequence(),
        rows: batch.len(),
        elapsed,
        result,
    }
}
