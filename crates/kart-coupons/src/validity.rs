//! Majority validity check
//!
//! A coupon is valid when the stored multiset holds `<code>-<tag>` for at least
//! `min_matches` distinct tags out of `1..=source_tags`. Probes run concurrently
//! and a failed probe counts as not found, so a full storage outage makes every
//! coupon invalid.

use futures::future::join_all;
use kart_common::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ValidityConfig;
use crate::source::{coupon_key, SourceTag};
use crate::store::CouponStore;

/// Result of checking one code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidityVerdict {
    pub code: String,
    /// Tags the code was found under, ascending
    pub matched_tags: Vec<SourceTag>,
    pub required: usize,
    pub valid: bool,
}

#[derive(Clone)]
pub struct CouponValidator {
    store: Arc<dyn CouponStore>,
    source_tags: SourceTag,
    min_matches: usize,
}

impl CouponValidator {
    /// Fails when `min_matches` is zero or larger than the tag universe
    pub fn new(store: Arc<dyn CouponStore>, config: &ValidityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            source_tags: config.source_tags,
            min_matches: config.min_matches,
        })
    }

    pub fn with_tags(
        store: Arc<dyn CouponStore>,
        source_tags: SourceTag,
        min_matches: usize,
    ) -> Result<Self> {
        Self::new(
            store,
            &ValidityConfig {
                source_tags,
                min_matches,
            },
        )
    }

    /// Probe every source tag for `code`, as given
    pub async fn verdict(&self, code: &str) -> ValidityVerdict {
        let probes = (1..=self.source_tags).map(|tag| self.probe(code, tag));
        let matched_tags: Vec<SourceTag> = join_all(probes).await.into_iter().flatten().collect();

        let valid = matched_tags.len() >= self.min_matches;
        debug!(
            code,
            matched = matched_tags.len(),
            required = self.min_matches,
            valid,
            "Coupon checked"
        );

        ValidityVerdict {
            code: code.to_string(),
            matched_tags,
            required: self.min_matches,
            valid,
        }
    }

    pub async fn is_valid(&self, code: &str) -> bool {
        self.verdict(code).await.valid
    }

    async fn probe(&self, code: &str, tag: SourceTag) -> Option<SourceTag> {
        let key = coupon_key(code, tag);
        match self.store.contains(&key).await {
            Ok(true) => Some(tag),
            Ok(false) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Coupon probe failed; treating as not found");
                None
            },
        }
    }
}
