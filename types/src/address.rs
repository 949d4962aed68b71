//! Account address type, rendered as `0x` + 64 hex digits.

use crate::error::TypesError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 32;

/// A 32-byte account address.
///
/// Voters, proposal creators and the recipient of a relinquished capability
/// are all identified by an `Address`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    pub fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse an address from hex, with or without the `0x` prefix.
    ///
    /// Short inputs are left-padded with zeros, so `0x1` and
    /// `0x000...001` denote the same address.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        parse_padded_hex(s)
            .map(Self)
            .map_err(|reason| TypesError::InvalidAddress(format!("{s}: {reason}")))
    }

    /// Return the full `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Decode up to 32 bytes of hex into a left-padded array.
pub(crate) fn parse_padded_hex(s: &str) -> Result<[u8; ADDRESS_LENGTH], String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Err("empty".to_string());
    }
    if digits.len() > ADDRESS_LENGTH * 2 {
        return Err(format!("too long ({} hex digits)", digits.len()));
    }
    let padded = format!("{:0>width$}", digits, width = ADDRESS_LENGTH * 2);
    let mut out = [0u8; ADDRESS_LENGTH];
    hex::decode_to_slice(&padded, &mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
