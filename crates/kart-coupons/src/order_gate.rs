//! Coupon admission for order creation

use thiserror::Error;
use tracing::info;

use crate::validity::CouponValidator;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Coupon code '{0}' is not valid")]
    InvalidCoupon(String),
}

/// Checked before an order carrying a coupon is accepted
#[derive(Clone)]
pub struct OrderCouponGate {
    validator: CouponValidator,
}

impl OrderCouponGate {
    pub fn new(validator: CouponValidator) -> Self {
        Self { validator }
    }

    /// Orders without a coupon, or with an empty one, pass without probing storage
    pub async fn admit(&self, coupon: Option<&str>) -> Result<(), OrderError> {
        let code = match coupon {
            Some(code) if !code.is_empty() => code,
            _ => return Ok(()),
        };

        if self.validator.is_valid(code).await {
            Ok(())
        } else {
            info!(coupon = code, "Rejecting order with invalid coupon");
            Err(OrderError::InvalidCoupon(code.to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db::DbResult;
    use crate::store::{CouponStore, MemoryCouponStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingStore {
        probes: AtomicUsize,
    }

    #[async_trait]
    impl CouponStore for CountingStore {
        async fn bulk_insert(&self, keys: &[String]) -> DbResult<u64> {
            Ok(keys.len() as u64)
        }

        async fn contains(&self, _key: &str) -> DbResult<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    async fn gate_with(keys: &[&str]) -> OrderCouponGate {
        let store = Arc::new(MemoryCouponStore::new());
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        store.bulk_insert(&keys).await.unwrap();
        OrderCouponGate::new(CouponValidator::with_tags(store, 3, 2).unwrap())
    }

    #[tokio::test]
    async fn test_valid_coupon_admitted() {
        let gate = gate_with(&["FIFTYOFF-1", "FIFTYOFF-3"]).await;
        assert_eq!(gate.admit(Some("FIFTYOFF")).await, Ok(()));
    }

    #[tokio::test]
    async fn test_invalid_coupon_rejected() {
        let gate = gate_with(&["ONEOFF-2"]).await;
        assert_eq!(
            gate.admit(Some("ONEOFF")).await,
            Err(OrderError::InvalidCoupon("ONEOFF".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_coupon_skips_probe() {
        let store = Arc::new(CountingStore::default());
        let gate = OrderCouponGate::new(CouponValidator::with_tags(store.clone(), 3, 2).unwrap());

        assert!(gate.admit(None).await.is_ok());
        assert!(gate.admit(Some("")).await.is_ok());
        assert_eq!(store.probes.load(Ordering::SeqCst), 0);

        assert!(gate.admit(Some("X")).await.is_err());
        assert_eq!(store.probes.load(Ordering::SeqCst), 3);
    }
}
