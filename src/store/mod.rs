//! Versioned entry store.
//!
//! Every key holds a short, block-ordered list of versions. Lookups are made
//! "as of" a block: the version effective at a block is the newest one whose
//! block is at or below it. Writes at higher blocks never change what an
//! older block resolves to, which is what lets the previous month be settled
//! while usage for the new month is already being recorded.
//!
//! ```text
//! key ──► [ (block 100, v1) , (block 250, v2) ]
//!                 ▲                  ▲
//!   find(key, 180)┘    find(key, 300)┘ (latest)
//! ```

pub mod key;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Default number of versions retained per key.
pub const DEFAULT_MAX_VERSIONS: usize = 2;

/// A single version of a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version<V> {
    /// Block at which this version became effective.
    pub block: u64,
    /// Stored value.
    pub value: V,
}

/// Result of an "as of block" lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found<'a, V> {
    /// Block of the version that was found.
    pub block: u64,
    /// The value of that version.
    pub value: &'a V,
    /// Whether the version is the newest one held for the key.
    pub is_latest: bool,
}

/// Keyed store of block-versioned values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedStore<V> {
    entries: BTreeMap<String, Vec<Version<V>>>,
    max_versions: usize,
}

impl<V> VersionedStore<V> {
    /// Create an empty store retaining the default number of versions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_versions(DEFAULT_MAX_VERSIONS)
    }

    /// Create an empty store retaining at most `max_versions` per key.
    #[must_use]
    pub fn with_max_versions(max_versions: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_versions: max_versions.max(1),
        }
    }

    /// Maximum versions retained per key.
    #[must_use]
    pub fn max_versions(&self) -> usize {
        self.max_versions
    }

    /// Append a new version for `key` effective from `block`.
    ///
    /// When the key already holds `max_versions` versions the oldest one is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a version already exists at `block` or if `block`
    /// is older than the latest version of the key.
    pub fn append(&mut self, key: &str, block: u64, value: V) -> Result<()> {
        let versions = self.entries.entry(key.to_string()).or_default();

        if let Some(latest) = versions.last() {
            if latest.block == block {
                return Err(Error::Store(format!(
                    "entry {key:?} already exists at block {block}"
                )));
            }
            if latest.block > block {
                return Err(Error::Store(format!(
                    "cannot append {key:?} at block {block}: latest version is at block {}",
                    latest.block
                )));
            }
        }

        versions.push(Version { block, value });

        if versions.len() > self.max_versions {
            let excess = versions.len() - self.max_versions;
            let pruned: Vec<u64> = versions.drain(..excess).map(|v| v.block).collect();
            debug!("Pruned versions {:?} of {:?}", pruned, key);
        }

        Ok(())
    }

    /// Overwrite the value of the version effective at `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if no version of `key` is effective at `block`.
    pub fn modify(&mut self, key: &str, block: u64, value: V) -> Result<()> {
        let versions = self
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::Store(format!("entry {key:?} not found")))?;

        let idx = versions.partition_point(|v| v.block <= block);
        if idx == 0 {
            return Err(Error::Store(format!(
                "no version of {key:?} effective at block {block}"
            )));
        }
        versions[idx - 1].value = value;
        Ok(())
    }

    /// Look up the version of `key` effective at `block`.
    #[must_use]
    pub fn find(&self, key: &str, block: u64) -> Option<Found<'_, V>> {
        let versions = self.entries.get(key)?;
        let idx = versions.partition_point(|v| v.block <= block);
        if idx == 0 {
            return None;
        }
        let version = &versions[idx - 1];
        Some(Found {
            block: version.block,
            value: &version.value,
            is_latest: idx == versions.len(),
        })
    }


    /// Delete the version of `key` effective at `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if no version is effective at `block` or if that
    /// version is not the latest one.
    pub fn delete(&mut self, key: &str, block: u64) -> Result<()> {
        let versions = self
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::Store(format!("entry {key:?} not found")))?;

        let idx = versions.partition_point(|v| v.block <= block);
        if idx == 0 {
            return Err(Error::Store(format!(
                "no version of {key:?} effective at block {block}"
            )));
        }
        if idx != versions.len() {
            return Err(Error::Store(format!(
                "version of {key:?} at block {} is not the latest",
                versions[idx - 1].block
            )));
        }

        versions.pop();
        if versions.is_empty() {
            self.entries.remove(key);
        }
        Ok(())
    }

    /// Remove the version of `key` recorded exactly at `block`.
    ///
    /// Unlike [`delete`](Self::delete) this also removes a version that has
    /// been superseded. Lookups at `block` afterwards resolve to the version
    /// preceding it, if any, and never to the removed one.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` has no version at exactly `block`.
    pub fn remove_version(&mut self, key: &str, block: u64) -> Result<()> {
        let versions = self
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::Store(format!("entry {key:?} not found")))?;

        let idx = versions
            .binary_search_by_key(&block, |v| v.block)
            .map_err(|_| Error::Store(format!("no version of {key:?} at block {block}")))?;

        versions.remove(idx);
        if versions.is_empty() {
            self.entries.remove(key);
        }
        Ok(())
    }

    /// All keys starting with `prefix`, in ascending order.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of versions currently held for `key`.
    #[must_use]
    pub fn version_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    /// Number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for VersionedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
