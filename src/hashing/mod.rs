//! Privacy-preserving names for per-address artifacts.
//!
//! A [`LocationKey`] is the full 256-bit BLAKE3 digest of the address, hex
//! encoded. It names files in the imagery working area so raw addresses never
//! appear in storage paths. BLAKE3 is a cryptographic hash: recovering the
//! address from a key is infeasible, and the full-width digest makes collisions
//! between distinct addresses negligible.

use std::fmt;

/// Length of a [`LocationKey`] in hex characters.
pub const LOCATION_KEY_LEN: usize = blake3::OUT_LEN * 2;

/// Opaque, storage-safe identifier derived from an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey(String);

impl LocationKey {
    /// Returns the lowercase hex digest.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the working-area file name for this key (`"{key}.png"`).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, crate::constants::SNAPSHOT_EXTENSION)
    }

    /// Returns a short prefix suitable for log fields.
    #[inline]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives the [`LocationKey`] for `address`.
#[inline]
pub fn hash_address(address: &str) -> LocationKey {
    LocationKey(blake3::hash(address.as_bytes()).to_hex().to_string())
}
