//! Deterministic keypair derivation and transaction signing.
//!
//! # Security
//! - Seeds are derived from the identity subject with a salted SHA-256
//! - Secret material is zeroized on drop and never logged
//! - `Debug` output carries the address only

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bech32::{FromBase32, ToBase32, Variant};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::blockchain::types::{Address, BlockchainError, BlockchainResult};

/// Default salt mixed into the identity subject before hashing.
pub const DEFAULT_DERIVATION_SALT: &str = "moneyrace.zklogin.v1";

/// Signature scheme flag for Ed25519.
pub const ED25519_FLAG: u8 = 0x00;

/// Human-readable part of bech32-encoded private keys.
pub const PRIVATE_KEY_HRP: &str = "suiprivkey";

/// Intent prefix for transaction data: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Serialized signature length: flag || signature || public key.
const SERIALIZED_SIGNATURE_LEN: usize = 1 + 64 + 32;

type Blake2b256 = Blake2b<U32>;

/// Map an identity subject to a 32-byte seed.
///
/// The same `(subject, salt)` pair always yields the same seed.
pub fn derive_seed(subject: &str, salt: &str) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(subject.as_bytes());
    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&hasher.finalize());
    seed
}

/// Compute the account address of an Ed25519 public key.
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Address::from_bytes(out)
}

fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// An Ed25519 keypair together with its account address.
#[derive(Clone)]
pub struct DerivedKeypair {
    signing_key: SigningKey,
    address: Address,
}

impl DerivedKeypair {
    /// Build a keypair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let address = address_from_public_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Derive the keypair owned by an identity subject.
    pub fn from_subject(subject: &str, salt: &str) -> BlockchainResult<Self> {
        if subject.trim().is_empty() {
            return Err(BlockchainError::Key("empty identity subject".to_string()));
        }
        let seed = derive_seed(subject, salt);
        Ok(Self::from_seed(&seed))
    }

    /// Parse a bech32 `suiprivkey...` string.
    pub fn from_secret(encoded: &str) -> BlockchainResult<Self> {
        let (hrp, data, _variant) = bech32::decode(encoded)
            .map_err(|e| BlockchainError::Key(format!("Failed to decode private key: {}", e)))?;
        if hrp != PRIVATE_KEY_HRP {
            return Err(BlockchainError::Key("Invalid private key prefix".to_string()));
        }
        let bytes = Zeroizing::new(
            Vec::<u8>::from_base32(&data)
                .map_err(|e| BlockchainError::Key(format!("Failed to convert private key: {}", e)))?,
        );
        if bytes.len() != 33 || bytes[0] != ED25519_FLAG {
            return Err(BlockchainError::Key("Invalid Ed25519 private key".to_string()));
        }
        let mut seed = Zeroizing::new([0u8; 32]);
        seed.copy_from_slice(&bytes[1..]);
        Ok(Self::from_seed(&seed))
    }

    /// Encode the secret as `suiprivkey...` (`flag || seed`).
    pub fn encode_secret(&self) -> BlockchainResult<Zeroizing<String>> {
        let mut payload = Zeroizing::new(Vec::with_capacity(33));
        payload.push(ED25519_FLAG);
        payload.extend_from_slice(&self.signing_key.to_bytes());
        bech32::encode(PRIVATE_KEY_HRP, payload.to_base32(), Variant::Bech32)
            .map(Zeroizing::new)
            .map_err(|e| BlockchainError::Key(format!("Failed to encode private key: {}", e)))
    }

    /// The account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Hex-encoded public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    /// Sign BCS transaction bytes under the transaction intent.
    ///
    /// Returns the base64 serialized signature `flag || sig || pubkey`.
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let digest = intent_digest(tx_bytes);
        let signature: Signature = self.signing_key.sign(&digest);

        let mut serialized = Vec::with_capacity(SERIALIZED_SIGNATURE_LEN);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        STANDARD.encode(serialized)
    }
}

impl std::fmt::Debug for DerivedKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Check a serialized transaction signature against an expected signer.
pub fn verify_transaction_signature(address: &Address, tx_bytes: &[u8], signature_b64: &str) -> bool {
    let raw = match STANDARD.decode(signature_b64) {
        Ok(raw) => raw,
        Err(_) => return false,
    };
    if raw.len() != SERIALIZED_SIGNATURE_LEN || raw[0] != ED25519_FLAG {
        return false;
    }
    let sig_bytes: [u8; 64] = match raw[1..65].try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let pk_bytes: [u8; 32] = match raw[65..].try_into() {
        Ok(b) => b,
        Err(_) => return false,
    };
    if &address_from_public_key(&pk_bytes) != address {
        return false;
    }
    let vk = match VerifyingKey::from_bytes(&pk_bytes) {
        Ok(v) => v,
        Err(_) => return false,
    };
    vk.verify(&intent_digest(tx_bytes), &Signature::from_bytes(&sig_bytes))
        .is_ok()
}
