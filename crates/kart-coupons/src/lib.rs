//! Kart Coupons Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk ingestion of coupon source files and the majority validity check used
//! when orders are placed.
//!
//! # Pipeline
//!
//! Each source file is streamed through a [`normalize::LineNormalizer`] and a
//! [`batch::BatchBuilder`]; sealed batches are written by a
//! [`writer::BulkWriter`] with a capped number of concurrent bulk inserts.
//! Rows are stored as `<code>-<tag>`, where the tag is the numeric suffix of the
//! source file name.
//!
//! # Validity
//!
//! [`validity::CouponValidator`] treats a code as valid when it was seen in at
//! least two of the three source files. [`order_gate::OrderCouponGate`] applies
//! that check to incoming orders.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kart_coupons::{config::Config, db, pipeline::CouponLoader, store::PgCouponStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     let loader = CouponLoader::new(Arc::new(PgCouponStore::new(pool)), config.loader);
//!     let summary = loader.run().await;
//!     println!("{} rows attempted", summary.rows_attempted());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod normalize;
pub mod order_gate;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod validity;
pub mod writer;

pub use error::{IngestError, WriteError};
pub use order_gate::{OrderCouponGate, OrderError};
pub use pipeline::{CouponLoader, RunSummary};
pub use store::{CouponStore, MemoryCouponStore, PgCouponStore};
pub use validity::{CouponValidator, ValidityVerdict};
