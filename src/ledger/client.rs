//! RPC client for the insurance ledger.
//!
//! Translates relay intents into ledger calls with a uniform failure
//! contract:
//! - oracle registration (stake-bearing, not idempotent)
//! - index lookup for an already-registered identity
//! - signed response submission
//!
//! This client never retries internally. Registration must not be retried
//! at all, and submission retry policy belongs to the coordinator, whose
//! contract is best-effort broadcast.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, warn};

use super::error::LedgerError;
use super::types::IndexTriple;

/// Registration transaction body. The signature covers the canonical
/// payload produced by [`crate::oracle::OracleIdentity::sign_registration`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleRegistration {
    pub address: String,
    pub public_key: String,
    pub stake: u64,
    pub signature: String,
}

/// Signed response submission for one (identity, index, request) attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSubmission {
    pub address: String,
    pub index: u8,
    pub airline: String,
    pub flight: String,
    pub timestamp: u64,
    pub status_code: u8,
    pub signature: String,
}

/// Acknowledgment returned by the ledger for an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub accepted: bool,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    indexes: IndexTriple,
}

#[derive(Debug, Deserialize)]
struct IndexesResponse {
    indexes: IndexTriple,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Ledger operations the coordinator depends on.
///
/// The trait seam exists so tests can drive the coordinator against an
/// in-memory ledger; production uses [`HttpLedgerClient`].
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Submit a registration transaction carrying the fixed stake.
    /// Returns the three indexes the ledger assigned.
    async fn register_oracle(
        &self,
        registration: &OracleRegistration,
    ) -> Result<IndexTriple, LedgerError>;

    /// Look up the index triple of an already-registered identity.
    async fn my_indexes(&self, address: &str) -> Result<IndexTriple, LedgerError>;

    /// Submit one signed response. Rejected when the index does not match
    /// the request's open index set.
    async fn submit_response(
        &self,
        submission: &OracleSubmission,
    ) -> Result<SubmissionAck, LedgerError>;
}

/// HTTP implementation of [`LedgerRpc`] against the ledger's RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    rpc_url: String,
    http_client: Client,
}

impl HttpLedgerClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent("surety-oracle/0.1")
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Probe the ledger endpoint. Used once at startup: an unreachable
    /// ledger is the only submission-path condition that is fatal.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.rpc_url);

        match self.http_client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("Ledger health check failed with status: {}", resp.status());
                false
            }
            Err(e) => {
                error!("Ledger health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerClient {
    async fn register_oracle(
        &self,
        registration: &OracleRegistration,
    ) -> Result<IndexTriple, LedgerError> {
        let url = format!("{}/oracle/v1/register", self.rpc_url);

        let resp = self
            .http_client
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| LedgerError::Registration(format!("transport: {e}")))?;

        match resp.status() {
            s if s.is_success() => {
                let body: RegisterResponse = resp
                    .json()
                    .await
                    .map_err(|e| LedgerError::Registration(format!("malformed response: {e}")))?;
                Ok(body.indexes)
            }
            StatusCode::CONFLICT => Err(LedgerError::AlreadyRegistered),
            _ => Err(LedgerError::Registration(error_detail(resp).await)),
        }
    }

    async fn my_indexes(&self, address: &str) -> Result<IndexTriple, LedgerError> {
        let url = format!("{}/oracle/v1/indexes/{}", self.rpc_url, address);

        let resp = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Registration(format!("transport: {e}")))?;

        if !resp.status().is_success() {
            return Err(LedgerError::Registration(error_detail(resp).await));
        }

        let body: IndexesResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::Registration(format!("malformed response: {e}")))?;
        Ok(body.indexes)
    }

    async fn submit_response(
        &self,
        submission: &OracleSubmission,
    ) -> Result<SubmissionAck, LedgerError> {
        let url = format!("{}/oracle/v1/response", self.rpc_url);

        let resp = self
            .http_client
            .post(&url)
            .json(submission)
            .send()
            .await
            .map_err(|e| LedgerError::Submission(format!("transport: {e}")))?;

        match resp.status() {
            s if s.is_success() => resp
                .json()
                .await
                .map_err(|e| LedgerError::Submission(format!("malformed response: {e}"))),
            StatusCode::CONFLICT => Err(LedgerError::SubmissionRejected {
                index: submission.index,
            }),
            _ => Err(LedgerError::Submission(error_detail(resp).await)),
        }
    }
}

/// Pull a human-readable reason out of a failed ledger response.
async fn error_detail(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => match serde_json::from_str::<ErrorBody>(&body) {
            Ok(parsed) => parsed.error,
            Err(_) if !body.is_empty() => format!("{status}: {body}"),
            Err(_) => status.to_string(),
        },
        Err(_) => status.to_string(),
    }
}
