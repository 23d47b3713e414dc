//! SeedVault - Derives identity material and signatures from one 32-byte secret.
//!
//! ```text
//! secret (32 random bytes, hex)
//!     │
//!     ├── SHA256(secret ‖ "address_salt")[..20] ──→ address (40 hex)
//!     ├── SHA256(secret ‖ "pubkey_salt") ─────────→ public identity (64 hex)
//!     └── SHA256(secret ‖ "signing_key") ─────────→ HMAC-SHA256 key ──→ signature
//! ```
//!
//! All derivations hash the hex form of the secret followed by the domain salt,
//! which is what the remote ledger recomputes when it checks a signature.
//! The signing key is a one-way function of the same secret as the address, so
//! the scheme is symmetric: it authenticates, it does not provide
//! non-repudiation.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SECRET_LEN: usize = 32;
pub const ADDRESS_LEN: usize = 20;

const ADDRESS_SALT: &str = "address_salt";
const PUBKEY_SALT: &str = "pubkey_salt";
const SIGNING_SALT: &str = "signing_key";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("random source unavailable: {0}")]
    RandomUnavailable(String),

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("canonical serialization failed: {0}")]
    Serialization(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// The wallet secret. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> VaultResult<Self> {
        let mut bytes = hex::decode(value.trim())
            .map_err(|e| VaultError::InvalidSecret(e.to_string()))?;
        if bytes.len() != SECRET_LEN {
            let got = bytes.len();
            bytes.zeroize();
            return Err(VaultError::InvalidSecret(format!(
                "expected {SECRET_LEN} bytes, got {got}"
            )));
        }
        let mut out = [0u8; SECRET_LEN];
        out.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Secret::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Generate a fresh secret from the OS random source.
pub fn generate_secret() -> VaultResult<Secret> {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| VaultError::RandomUnavailable(e.to_string()))?;
    let secret = Secret(bytes);
    bytes.zeroize();
    Ok(secret)
}

fn salted_digest(secret: &Secret, salt: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    let mut secret_hex = secret.to_hex();
    hasher.update(secret_hex.as_bytes());
    hasher.update(salt.as_bytes());
    secret_hex.zeroize();
    hasher.finalize().into()
}

/// 20-byte address, hex encoded.
pub fn derive_address(secret: &Secret) -> String {
    hex::encode(&salted_digest(secret, ADDRESS_SALT)[..ADDRESS_LEN])
}

/// Full 32-byte digest used as the wallet's public identity.
pub fn derive_identity(secret: &Secret) -> String {
    hex::encode(salted_digest(secret, PUBKEY_SALT))
}

/// Compact JSON of `message`; field order follows the type's declaration.
pub fn canonical_bytes<T: Serialize + ?Sized>(message: &T) -> VaultResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| VaultError::Serialization(e.to_string()))
}

fn signing_mac(secret: &Secret) -> VaultResult<HmacSha256> {
    let mut key = salted_digest(secret, SIGNING_SALT);
    let mac = HmacSha256::new_from_slice(&key).map_err(|e| VaultError::InvalidSecret(e.to_string()));
    key.zeroize();
    mac
}

/// HMAC-SHA256 over the canonical serialization of `message`, hex encoded.
///
/// Deterministic: identical messages produce identical signatures, so callers
/// rely on the message's own timestamp and nonce for uniqueness.
pub fn sign<T: Serialize + ?Sized>(secret: &Secret, message: &T) -> VaultResult<String> {
    let bytes = canonical_bytes(message)?;
    let mut mac = signing_mac(secret)?;
    mac.update(&bytes);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature produced by [`sign`].
pub fn verify<T: Serialize + ?Sized>(secret: &Secret, message: &T, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else { return false };
    let Ok(bytes) = canonical_bytes(message) else { return false };
    let Ok(mut mac) = signing_mac(secret) else { return false };
    mac.update(&bytes);
    mac.verify_slice(&expected).is_ok()
}
