//! Ledger adapter: RPC client, typed error contract and the request
//! event subscription.

pub mod client;
pub mod error;
pub mod events;
pub mod types;

pub use client::{HttpLedgerClient, LedgerRpc, OracleRegistration, OracleSubmission, SubmissionAck};
pub use error::LedgerError;
pub use events::{ListenerConfig, RequestListener};
pub use types::{FlightStatus, IndexTriple, OracleRequest};
