//! Pooled oracle identities.
//!
//! A pool slot is created before registration, registered once, and never
//! mutated afterward. Slots whose registration failed carry no index
//! triple and are excluded from fan-out.

use crate::crypto::IdentityKey;
use crate::ledger::{IndexTriple, OracleRegistration, OracleRequest, OracleSubmission};

#[derive(Debug, Clone)]
pub struct OracleIdentity {
    key: IdentityKey,
    slot: u32,
    indexes: Option<IndexTriple>,
}

impl OracleIdentity {
    pub fn new(key: IdentityKey, slot: u32) -> Self {
        Self {
            key,
            slot,
            indexes: None,
        }
    }

    pub fn address(&self) -> &str {
        self.key.address()
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn indexes(&self) -> Option<IndexTriple> {
        self.indexes
    }

    /// Record the triple the ledger assigned. Immutable once set.
    pub fn set_indexes(&mut self, indexes: IndexTriple) {
        self.indexes = Some(indexes);
    }

    /// A slot is usable for fan-out only once it holds a valid triple.
    pub fn is_usable(&self) -> bool {
        self.indexes.is_some()
    }

    /// Build the signed registration transaction for this identity.
    pub fn registration(&self, stake: u64) -> OracleRegistration {
        let payload = format!("register:{}:{}", self.address(), stake);
        OracleRegistration {
            address: self.address().to_string(),
            public_key: self.key.public_key_hex(),
            stake,
            signature: self.key.sign(payload.as_bytes()),
        }
    }

    /// Build one signed submission attempt for (this identity, index).
    pub fn submission(
        &self,
        index: u8,
        request: &OracleRequest,
        status_code: u8,
    ) -> OracleSubmission {
        let payload = format!(
            "response:{}:{}:{}:{}:{}:{}",
            self.address(),
            index,
            request.airline,
            request.flight,
            request.timestamp,
            status_code
        );
        OracleSubmission {
            address: self.address().to_string(),
            index,
            airline: request.airline.clone(),
            flight: request.flight.clone(),
            timestamp: request.timestamp,
            status_code,
            signature: self.key.sign(payload.as_bytes()),
        }
    }
}

/// Derive the full identity pool from the operator seed.
pub fn build_pool(seed: &[u8; 32], size: u32) -> Vec<OracleIdentity> {
    (0..size)
        .map(|slot| OracleIdentity::new(IdentityKey::derive(seed, slot), slot))
        .collect()
}
