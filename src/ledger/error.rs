use thiserror::Error;

/// Error categories for ledger operations.
///
/// Nothing in this taxonomy is fatal to the relay process: registration
/// failures exclude a single pool slot, submission failures are discarded
/// per attempt, and stream failures trigger resubscription.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Registration transaction rejected (insufficient stake, capacity,
    /// malformed payload). The caller must not retry: re-registration is
    /// not idempotent on the ledger.
    #[error("registration rejected: {0}")]
    Registration(String),

    /// The identity already holds a registration. Its index triple is
    /// still recoverable via an index lookup.
    #[error("identity already registered")]
    AlreadyRegistered,

    /// The submitted index does not match the request's open index set.
    /// Expected for roughly two of every three attempts per identity.
    #[error("submission rejected: index {index} not open for this request")]
    SubmissionRejected { index: u8 },

    /// Transport or execution failure while submitting a response.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Event subscription dropped or could not be established.
    #[error("event stream error: {0}")]
    Stream(String),
}

impl LedgerError {
    /// True for the expected index-mismatch rejection, which is logged at
    /// debug level only.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::SubmissionRejected { .. })
    }
}
