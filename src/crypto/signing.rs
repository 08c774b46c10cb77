//! Identity key material for the oracle pool.
//!
//! Every pooled oracle owns an Ed25519 key pair derived deterministically
//! from a single operator-supplied seed, so the pool is reproducible across
//! restarts without persisting any per-identity secret.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

/// Domain separator mixed into per-slot key derivation.
const DERIVATION_CONTEXT: &[u8] = b"surety-oracle/identity/v1";

/// Number of public-key hash bytes kept for the address.
const ADDRESS_LEN: usize = 20;

/// Signing key plus the ledger address derived from it.
#[derive(Debug, Clone)]
pub struct IdentityKey {
    signing: SigningKey,
    address: String,
}

impl IdentityKey {
    /// Derive the key for one pool slot: SHA-256(context || seed || slot).
    pub fn derive(seed: &[u8; 32], slot: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_CONTEXT);
        hasher.update(seed);
        hasher.update(slot.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        Self::from_secret_bytes(&digest)
    }

    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(secret);
        let address = derive_address(&signing.verifying_key());
        Self { signing, address }
    }

    /// Ledger address: hex of the first 20 bytes of SHA-256(public key).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().to_bytes())
    }

    /// Sign arbitrary payload bytes, returning the hex-encoded signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.signing.sign(payload).to_bytes())
    }
}

fn derive_address(public_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(public_key.to_bytes());
    format!("0x{}", hex::encode(&digest[..ADDRESS_LEN]))
}
