//! Composite store keys.
//!
//! Keys are the identifiers joined by a single separator, so that every entry
//! of a subscription can be enumerated by scanning the subscription prefix.

use crate::error::{Error, Result};

/// Separator between key components.
pub const KEY_SEPARATOR: char = ' ';

/// Decoded tracked-CU key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuTrackerKey<'a> {
    /// Subscription (consumer) identifier.
    pub sub: &'a str,
    /// Provider account address.
    pub provider: &'a str,
    /// Chain (resource) identifier.
    pub chain_id: &'a str,
}

/// Reject components that would corrupt the key layout.
///
/// # Errors
///
/// Returns an error if the component is empty or contains the separator.
pub fn validate_component(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Store(format!("empty {name} in store key")));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(Error::Store(format!(
            "{name} {value:?} contains the key separator"
        )));
    }
    Ok(())
}

/// Build the tracked-CU key for (sub, provider, chain).
#[must_use]
pub fn cu_tracker_key(sub: &str, provider: &str, chain_id: &str) -> String {
    format!("{sub}{KEY_SEPARATOR}{provider}{KEY_SEPARATOR}{chain_id}")
}

/// Prefix shared by every key that belongs to `sub`.
///
/// The trailing separator keeps `sub1` from matching `sub10`.
#[must_use]
pub fn subscription_prefix(sub: &str) -> String {
    format!("{sub}{KEY_SEPARATOR}")
}

/// Split a tracked-CU key back into its components.
#[must_use]
pub fn decode_cu_tracker_key(key: &str) -> Option<CuTrackerKey<'_>> {
    let mut parts = key.splitn(3, KEY_SEPARATOR);
    let sub = parts.next()?;
    let provider = parts.next()?;
    let chain_id = parts.next()?;
    if sub.is_empty() || provider.is_empty() || chain_id.is_empty() {
        return None;
    }
    Some(CuTrackerKey {
        sub,
        provider,
        chain_id,
    })
}

/// Build the adjustment key for (sub, provider).
#[must_use]
pub fn adjustment_key(sub: &str, provider: &str) -> String {
    format!("{sub}{KEY_SEPARATOR}{provider}")
}

/// Extract the provider from an adjustment key.
#[must_use]
pub fn decode_adjustment_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}
