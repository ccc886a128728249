//! Shared type definitions for the dicehouse engine

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Identifier of a game record
pub type GameId = u64;

/// Amount in the smallest denomination of the staking currency
pub type Amount = u64;

/// Account identity (32-byte public key hash)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an account id from a human-readable label.
    ///
    /// Used for well-known accounts such as the default custody account.
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        Self(digest.into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(value: &str) -> Result<Self, String> {
        let bytes = hex::decode(value.trim_start_matches("0x"))
            .map_err(|e| format!("invalid account hex: {}", e))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "account id must be 32 bytes".to_string())?;
        Ok(Self(array))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "AccountId({}..{})", &hex[..8], &hex[56..])
    }
}

impl FromStr for AccountId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_hex_round_trip() {
        let account = AccountId::new([7u8; 32]);
        let parsed: AccountId = account.to_hex().parse().unwrap();
        assert_eq!(parsed, account);

        let prefixed = AccountId::from_hex(&format!("0x{}", account.to_hex())).unwrap();
        assert_eq!(prefixed, account);
    }

    #[test]
    fn test_account_rejects_short_hex() {
        assert!(AccountId::from_hex("abcd").is_err());
        assert!(AccountId::from_hex("zz").is_err());
    }

    #[test]
    fn test_account_serializes_as_hex_string() {
        let account = AccountId::new([1u8; 32]);
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
    }

    #[test]
    fn test_label_accounts_are_stable() {
        assert_eq!(AccountId::from_label("custody"), AccountId::from_label("custody"));
        assert_ne!(AccountId::from_label("custody"), AccountId::from_label("house"));
    }
}
