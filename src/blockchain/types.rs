//! Chain-specific types and error definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length in bytes of addresses and object ids.
pub const ADDRESS_LENGTH: usize = 32;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The ledger has no record (yet) of the requested item.
    #[error("Not found on ledger: {0}")]
    NotFound(String),

    /// Malformed address or object id.
    #[error("Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// Malformed Move type tag.
    #[error("Invalid type tag '{0}'")]
    InvalidTypeTag(String),

    /// Invalid private key format or derivation error.
    #[error("Key error: {0}")]
    Key(String),

    /// Encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

fn parse_hex32(value: &str) -> BlockchainResult<[u8; ADDRESS_LENGTH]> {
    let invalid = |reason: &str| BlockchainError::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let hex_part = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if hex_part.is_empty() {
        return Err(invalid("empty"));
    }
    if hex_part.len() > ADDRESS_LENGTH * 2 {
        return Err(invalid("longer than 32 bytes"));
    }
    // Short forms such as "0x6" are left-padded.
    let padded = format!("{:0>64}", hex_part);
    let mut out = [0u8; ADDRESS_LENGTH];
    hex::decode_to_slice(&padded, &mut out).map_err(|e| invalid(&e.to_string()))?;
    Ok(out)
}

macro_rules! hex32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; ADDRESS_LENGTH]);

        impl $name {
            pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

            pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = BlockchainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hex32(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        // Human-readable formats carry the hex string; binary formats (BCS)
        // carry the raw 32 bytes.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    <[u8; ADDRESS_LENGTH]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

hex32_newtype!(
    /// Account address derived from a public key.
    Address
);

hex32_newtype!(
    /// Identifier of an on-chain object (room, vault, coin, position...).
    ObjectId
);

/// Transaction digest as reported by the ledger (base58 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxDigest(pub String);

impl fmt::Display for TxDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxDigest {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A struct type tag such as `0x2::sui::SUI`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeTag {
    pub address: Address,
    pub module: String,
    pub name: String,
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TypeTag {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split("::").collect();
        if parts.len() != 3 || !is_identifier(parts[1]) || !is_identifier(parts[2]) {
            return Err(BlockchainError::InvalidTypeTag(s.to_string()));
        }
        let address = parts[0]
            .parse()
            .map_err(|_| BlockchainError::InvalidTypeTag(s.to_string()))?;
        Ok(Self {
            address,
            module: parts[1].to_string(),
            name: parts[2].to_string(),
        })
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)
    }
}

/// An object created by an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObject {
    pub object_id: ObjectId,
    /// Fully-qualified Move type of the object, when the ledger reports it.
    pub object_type: Option<String>,
}

impl CreatedObject {
    /// Whether the object's Move type ends with `::<module>::<name>`.
    pub fn is_type(&self, module: &str, name: &str) -> bool {
        let suffix = format!("::{}::{}", module, name);
        self.object_type
            .as_deref()
            .map(|t| t.split('<').next().unwrap_or(t).ends_with(&suffix))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_object_id_is_padded() {
        let clock: ObjectId = "0x6".parse().unwrap();
        assert_eq!(clock.0[31], 6);
        assert_eq!(
            clock.to_string(),
            format!("0x{}6", "0".repeat(63))
        );
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!("".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
        assert!(format!("0x{}", "a".repeat(65)).parse::<Address>().is_err());
    }

    #[test]
    fn test_address_json_is_hex_string() {
        let addr: Address = "0x1".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"0x{}1\"", "0".repeat(63)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_address_bcs_is_raw_bytes() {
        let addr = Address::from_bytes([7u8; 32]);
        assert_eq!(bcs::to_bytes(&addr).unwrap(), vec![7u8; 32]);
    }

    #[test]
    fn test_type_tag_parse() {
        let tag: TypeTag = "0x2::sui::SUI".parse().unwrap();
        assert_eq!(tag.module, "sui");
        assert_eq!(tag.name, "SUI");
        assert!("0x2::sui".parse::<TypeTag>().is_err());
        assert!("0x2::9sui::SUI".parse::<TypeTag>().is_err());
    }

    #[test]
    fn test_created_object_type_match() {
        let obj = CreatedObject {
            object_id: ObjectId::ZERO,
            object_type: Some("0xabc::money_race::PlayerPosition<0x2::usdc::USDC>".to_string()),
        };
        assert!(obj.is_type("money_race", "PlayerPosition"));
        assert!(!obj.is_type("money_race", "Room"));
    }
}
