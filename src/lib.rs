//! Surety Oracle Relay
//!
//! Off-chain oracle relay for the Surety flight-insurance ledger. The
//! relay registers a fixed pool of oracle identities against the on-chain
//! registry, then listens for status requests and has every identity
//! holding a matching index submit a response. The ledger tallies
//! responses per index and finalizes a flight status once a quorum of
//! matching responses is reached; the relay's contract is best-effort
//! broadcast, not guaranteed delivery.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Relay entrypoint
//! ├── config.rs      - Configuration management
//! ├── crypto/        - Identity keys and payload signing
//! │   └── signing.rs - Ed25519 derivation and signatures
//! ├── ledger/        - Ledger adapter
//! │   ├── client.rs  - RPC client (register, indexes, submit)
//! │   ├── events.rs  - Request event subscription with reconnect
//! │   ├── error.rs   - Error taxonomy
//! │   └── types.rs   - Requests, index triples, status codes
//! ├── oracle/        - Pool and coordination
//! │   ├── identity.rs    - Pooled identities
//! │   └── coordinator.rs - Registration and request fan-out
//! └── api/           - HTTP status surface
//!     └── web.rs     - /api, /health, /status
//! ```

pub mod api;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod oracle;

// Re-export main types for convenience
pub use api::{create_relay_router, RelayApiState};
pub use config::RelayConfig;
pub use crypto::IdentityKey;
pub use ledger::{
    FlightStatus, HttpLedgerClient, IndexTriple, LedgerError, LedgerRpc, ListenerConfig,
    OracleRegistration, OracleRequest, OracleSubmission, RequestListener, SubmissionAck,
};
pub use oracle::{build_pool, OracleCoordinator, OracleIdentity, RelayPhase};
