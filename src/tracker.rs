//! Compute-unit tracker.
//!
//! Accumulates the CU a provider served a subscription on a given chain during
//! the current month. Entries are versioned by the subscription block, which
//! stays constant for the whole month, so every payment in the month lands on
//! the same version. A second version only appears after the month rolls over
//! and before the previous month has been settled.

use crate::error::Result;
use crate::store::key::{
    cu_tracker_key, decode_cu_tracker_key, subscription_prefix, validate_component,
};
use crate::store::VersionedStore;
use crate::types::{Amount, TrackedCu};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One tracked-CU entry of a subscription, as collected for settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCuInfo {
    /// Provider account address.
    pub provider: String,
    /// Chain (resource) identifier.
    pub chain_id: String,
    /// CU tracked for the month.
    pub tracked_cu: u64,
    /// Subscription block the entry was recorded at.
    pub block: u64,
}

/// Per-subscription CU accumulator backed by a versioned store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuTracker {
    store: VersionedStore<TrackedCu>,
}

impl CuTracker {
    /// Create an empty tracker retaining at most `max_versions` per key.
    #[must_use]
    pub fn new(max_versions: usize) -> Self {
        Self {
            store: VersionedStore::with_max_versions(max_versions),
        }
    }

    /// Get the CU tracked for (sub, provider, chain) at exactly `sub_block`.
    ///
    /// A missing entry, or an entry recorded at another block, is not an
    /// error: it means nothing was tracked yet, so `(0, false)` is returned.
    #[must_use]
    pub fn get_tracked_cu(
        &self,
        sub: &str,
        provider: &str,
        chain_id: &str,
        sub_block: u64,
    ) -> (u64, bool, String) {
        let key = cu_tracker_key(sub, provider, chain_id);
        match self.store.find(&key, sub_block) {
            Some(found) if found.block == sub_block => (found.value.cu, true, key),
            _ => (0, false, key),
        }
    }

    /// Add `cu_to_add` to the counter of (sub, provider, chain) for `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier cannot be encoded into a key or if a
    /// new entry cannot be appended.
    pub fn add_tracked_cu(
        &mut self,
        sub: &str,
        provider: &str,
        chain_id: &str,
        cu_to_add: u64,
        block: u64,
    ) -> Result<()> {
        validate_component("subscription", sub)?;
        validate_component("provider", provider)?;
        validate_component("chain id", chain_id)?;

        let (cu, found, key) = self.get_tracked_cu(sub, provider, chain_id, block);

        if found {
            self.store.modify(
                &key,
                block,
                TrackedCu {
                    cu: cu.saturating_add(cu_to_add),
                },
            )?;
        } else {
            self.store
                .append(&key, block, TrackedCu { cu: cu_to_add })
                .map_err(|e| {
                    warn!(
                        "Cannot create tracked CU entry {:?} at block {} (adding {} CU): {}",
                        key, block, cu_to_add, e
                    );
                    e
                })?;
        }

        debug!(
            "Added {} tracked CU (sub={}, provider={}, chain={}, block={})",
            cu_to_add, sub, provider, chain_id, block
        );

        Ok(())
    }

    /// All tracked-CU keys that belong to `sub`, in key order.
    #[must_use]
    pub fn sub_tracked_cu_indices(&self, sub: &str) -> Vec<String> {
        self.store.keys_with_prefix(&subscription_prefix(sub))
    }

    /// Collect the entries of `sub` recorded at `block` and their CU total.
    ///
    /// Entries that only exist at another block (e.g. the following month)
    /// are skipped. The total is summed as an [`Amount`] so it is exact even
    /// when several counters are close to `u64::MAX`.
    #[must_use]
    pub fn sub_tracked_cu_info(&self, sub: &str, block: u64) -> (Vec<TrackedCuInfo>, Amount) {
        let mut list = Vec::new();
        let mut total: Amount = 0;

        for key in self.sub_tracked_cu_indices(sub) {
            let Some(decoded) = decode_cu_tracker_key(&key) else {
                warn!("Skipping malformed tracked CU key {:?}", key);
                continue;
            };

            let (cu, found, _) =
                self.get_tracked_cu(sub, decoded.provider, decoded.chain_id, block);
            if !found {
                warn!(
                    "No tracked CU at block {} (sub={}, provider={}, chain={})",
                    block, sub, decoded.provider, decoded.chain_id
                );
                continue;
            }

            list.push(TrackedCuInfo {
                provider: decoded.provider.to_string(),
                chain_id: decoded.chain_id.to_string(),
                tracked_cu: cu,
                block,
            });
            total += Amount::from(cu);
        }

        (list, total)
    }

    /// Remove the entry of `info` recorded at `sub_block`.
    ///
    /// The version is removed even when the following month already has one,
    /// so a settled month can never be found again. Nothing recorded at
    /// `sub_block` is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses the removal.
    pub fn reset_cu_tracker(&mut self, sub: &str, info: &TrackedCuInfo, sub_block: u64) -> Result<()> {
        let key = cu_tracker_key(sub, &info.provider, &info.chain_id);
        let Some(found) = self.store.find(&key, sub_block) else {
            return Ok(());
        };
        if found.block != sub_block {
            return Ok(());
        }
        if !found.is_latest {
            debug!(
                "Removing superseded tracked CU {:?} at block {}",
                key, sub_block
            );
        }
        self.store.remove_version(&key, sub_block)
    }

    /// Number of versions held for (sub, provider, chain).
    #[must_use]
    pub fn version_count(&self, sub: &str, provider: &str, chain_id: &str) -> usize {
        self.store.version_count(&cu_tracker_key(sub, provider, chain_id))
    }

    /// Check if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
