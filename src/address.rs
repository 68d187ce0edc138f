//! Provider account address validation.
//!
//! Addresses are bech32 strings `<prefix>1<data><checksum>`. Parsing checks
//! the checksum, the human-readable prefix and the decoded payload length,
//! so a mistyped address is rejected rather than paid.

use crate::error::{Error, Result};
use bech32::primitives::decode::CheckedHrpstring;
use bech32::Bech32;
use std::fmt;

/// Maximum decoded payload length of an account address.
const MAX_ADDRESS_BYTES: usize = 255;

/// A validated provider account address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderAddress(String);

impl ProviderAddress {
    /// Parse `address`, requiring the human-readable part to equal `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is not valid bech32,
    /// has another prefix or carries an empty or oversized payload.
    pub fn parse(address: &str, prefix: &str) -> Result<Self> {
        let checked = CheckedHrpstring::new::<Bech32>(address)
            .map_err(|e| Error::InvalidAddress(format!("{address}: {e}")))?;

        let hrp = checked.hrp().to_lowercase();
        if hrp != prefix {
            return Err(Error::InvalidAddress(format!(
                "{address}: expected prefix {prefix:?}, got {hrp:?}"
            )));
        }

        let len = checked.byte_iter().count();
        if len == 0 {
            return Err(Error::InvalidAddress(format!("{address}: empty payload")));
        }
        if len > MAX_ADDRESS_BYTES {
            return Err(Error::InvalidAddress(format!(
                "{address}: payload of {len} bytes exceeds {MAX_ADDRESS_BYTES}"
            )));
        }

        Ok(Self(address.to_string()))
    }

    /// The address as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
