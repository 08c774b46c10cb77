//! Cryptographic utilities: identity keys and payload signing.

pub mod signing;

pub use signing::IdentityKey;
