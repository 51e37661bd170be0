//! Coupon storage
//!
//! The pipeline and the validity check only need two things from storage:
//! a bulk insert of composite keys and a point lookup by key. [`CouponStore`]
//! captures exactly that, with a Postgres implementation for production and an
//! in-memory multiset for dry runs and tests.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::db::DbResult;

const COPY_COUPONS: &str = "COPY coupons (id) FROM STDIN";
const FIND_COUPON: &str = "SELECT 1 FROM coupons WHERE id = $1 LIMIT 1";

/// Minimal storage contract for coupon keys
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Insert every key as its own row; returns the number of rows written
    async fn bulk_insert(&self, keys: &[String]) -> DbResult<u64>;

    /// Whether at least one row with this key exists
    async fn contains(&self, key: &str) -> DbResult<bool>;
}

/// Postgres-backed store using `COPY ... FROM STDIN` for inserts
#[derive(Debug, Clone)]
pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn bulk_insert(&self, keys: &[String]) -> DbResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let payload = copy_payload(keys);

        // Released back to the pool when `conn` drops, on every path out of here.
        let mut conn = self.pool.acquire().await?;
        let mut copy = conn.copy_in_raw(COPY_COUPONS).await?;

        let sent = copy.send(payload).await.map(|_| ());
        if let Err(e) = sent {
            // the send failure is the one worth reporting
            let _ = copy.abort(e.to_string()).await;
            return Err(e.into());
        }

        Ok(copy.finish().await?)
    }

    async fn contains(&self, key: &str) -> DbResult<bool> {
        let found: Option<i32> = sqlx::query_scalar(FIND_COUPON)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

/// Text-format COPY body: one escaped key per line
fn copy_payload(keys: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(keys.iter().map(|k| k.len() + 1).sum());
    for key in keys {
        for ch in key.chars() {
            match ch {
                '\\' => out.extend_from_slice(b"\\\\"),
                '\n' => out.extend_from_slice(b"\\n"),
                '\r' => out.extend_from_slice(b"\\r"),
                '\t' => out.extend_from_slice(b"\\t"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                },
            }
        }
        out.push(b'\n');
    }
    out
}

/// In-process multiset of coupon keys
///
/// Behaves like the `coupons` table: duplicate keys are kept as separate rows.
#[derive(Debug, Default)]
pub struct MemoryCouponStore {
    rows: Mutex<HashMap<String, u64>>,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows stored under `key`
    pub async fn count(&self, key: &str) -> u64 {
        self.rows.lock().await.get(key).copied().unwrap_or(0)
    }

    /// Total rows across all keys
    pub async fn total_rows(&self) -> u64 {
        self.rows.lock().await.values().sum()
    }

    /// Number of distinct keys
    pub async fn distinct_keys(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn bulk_insert(&self, keys: &[String]) -> DbResult<u64> {
        let mut rows = self.rows.lock().await;
        for key in keys {
            *rows.entry(key.clone()).or_insert(0) += 1;
        }
        Ok(keys.len() as u64)
    }

    async fn contains(&self, key: &str) -> DbResult<bool> {
        Ok(self.rows.lock().await.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_copy_payload_one_line_per_key() {
        let payload = copy_payload(&keys(&["abc12345-1", "toolongcod-1"]));
        assert_eq!(payload, b"abc12345-1\ntoolongcod-1\n");
    }

    #[test]
    fn test_copy_payload_escapes_control_characters() {
        let payload = copy_payload(&keys(&["a\tb-1", "c\\d-2"]));
        assert_eq!(payload, b"a\\tb-1\nc\\\\d-2\n");
    }

    #[test]
    fn test_copy_payload_keeps_utf8() {
        let payload = copy_payload(&keys(&["café-3"]));
        assert_eq!(String::from_utf8(payload).unwrap(), "café-3\n");
    }

    #[tokio::test]
    async fn test_memory_store_keeps_duplicates() {
        let store = MemoryCouponStore::new();
        let written = store
            .bulk_insert(&keys(&["abc-1", "abc-1", "abc-2"]))
            .await
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(store.count("abc-1").await, 2);
        assert_eq!(store.total_rows().await, 3);
        assert_eq!(store.distinct_keys().await, 2);
    }

    #[tokio::test]
    async fn test_memory_store_contains() {
        let store = MemoryCouponStore::new();
        store.bulk_insert(&keys(&["FIFTYOFF-1"])).await.unwrap();

        assert!(store.contains("FIFTYOFF-1").await.unwrap());
        assert!(!store.contains("FIFTYOFF-2").await.unwrap());
        assert!(!store.contains("FIFTYOFF").await.unwrap());
    }
}
