//! CU tracker timer payload.
//!
//! The scheduler stores one timer per subscription: the key is the raw
//! subscription identifier and the value is a MessagePack-encoded
//! [`CuTrackerTimerData`].

use crate::error::{Error, Result};
use crate::types::CuTrackerTimerData;

/// A decoded settlement trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementTrigger {
    /// Subscription (consumer) identifier.
    pub sub: String,
    /// Month block and credit snapshot.
    pub data: CuTrackerTimerData,
}

impl SettlementTrigger {
    /// Create a trigger.
    #[must_use]
    pub fn new(sub: impl Into<String>, data: CuTrackerTimerData) -> Self {
        Self {
            sub: sub.into(),
            data,
        }
    }

    /// Decode a timer key and payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTrigger`] if the key is not a UTF-8
    /// identifier or the payload cannot be decoded.
    pub fn decode(key: &[u8], data: &[u8]) -> Result<Self> {
        let sub = std::str::from_utf8(key).map_err(|e| {
            Error::InvalidTrigger(format!("subscription key {} is not UTF-8: {e}", hex::encode(key)))
        })?;
        if sub.is_empty() {
            return Err(Error::InvalidTrigger("empty subscription key".to_string()));
        }

        let data: CuTrackerTimerData = rmp_serde::from_slice(data)
            .map_err(|e| Error::InvalidTrigger(format!("invalid timer data for {sub}: {e}")))?;

        Ok(Self::new(sub, data))
    }

    /// Encode into a timer key and payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let data = rmp_serde::to_vec_named(&self.data)?;
        Ok((self.sub.as_bytes().to_vec(), data))
    }
}
