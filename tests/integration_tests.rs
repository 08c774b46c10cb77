//! Integration tests for the oracle relay.
//!
//! These tests drive the coordinator against an in-memory ledger and
//! verify the registration and fan-out protocol: attempt counts, failure
//! isolation, pool shrinkage, and index-match acceptance.

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use surety_oracle::ledger::{
    IndexTriple, LedgerError, LedgerRpc, OracleRegistration, OracleRequest, OracleSubmission,
    SubmissionAck,
};
use surety_oracle::oracle::{build_pool, OracleCoordinator, RelayPhase};

// ============================================================================
// Test Helpers
// ============================================================================

const SEED: [u8; 32] = [42u8; 32];
const STAKE: u64 = 1_000_000_000;
const STATUS_ON_TIME: u8 = 10;

/// In-memory ledger with configurable acceptance and failure behavior.
struct MockLedger {
    /// Submissions are accepted only when the index equals this value.
    open_index: Option<u8>,
    /// Registration calls (by arrival order) that are refused.
    failing_slots: HashSet<usize>,
    /// Submissions for this index fail at the transport level.
    transport_failing_index: Option<u8>,
    /// Assign uniformly random triples instead of the rotating pattern.
    random_indexes: bool,
    rng: Mutex<StdRng>,
    registrations: AtomicUsize,
    attempts: Mutex<Vec<(String, u8)>>,
    assigned: Mutex<HashMap<String, IndexTriple>>,
}

impl MockLedger {
    fn new() -> Self {
        Self {
            open_index: None,
            failing_slots: HashSet::new(),
            transport_failing_index: None,
            random_indexes: false,
            rng: Mutex::new(StdRng::seed_from_u64(7)),
            registrations: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            assigned: Mutex::new(HashMap::new()),
        }
    }

    fn with_open_index(mut self, index: u8) -> Self {
        self.open_index = Some(index);
        self
    }

    fn with_failing_slot(mut self, slot: usize) -> Self {
        self.failing_slots.insert(slot);
        self
    }

    fn with_transport_failure_on(mut self, index: u8) -> Self {
        self.transport_failing_index = Some(index);
        self
    }

    fn with_random_indexes(mut self) -> Self {
        self.random_indexes = true;
        self
    }

    /// Seed an assignment as if the identity had registered in an earlier
    /// process lifetime.
    fn with_existing_registration(self, address: &str, indexes: IndexTriple) -> Self {
        self.assigned
            .lock()
            .unwrap()
            .insert(address.to_string(), indexes);
        self
    }

    fn registration_calls(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn attempts_for(&self, address: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .count()
    }

    fn assigned_count(&self) -> usize {
        self.assigned.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn register_oracle(
        &self,
        registration: &OracleRegistration,
    ) -> Result<IndexTriple, LedgerError> {
        let call = self.registrations.fetch_add(1, Ordering::SeqCst);

        if self.failing_slots.contains(&call) {
            return Err(LedgerError::Registration(
                "insufficient stake".to_string(),
            ));
        }

        let mut assigned = self.assigned.lock().unwrap();
        if assigned.contains_key(&registration.address) {
            return Err(LedgerError::AlreadyRegistered);
        }

        let triple = if self.random_indexes {
            let mut rng = self.rng.lock().unwrap();
            IndexTriple([
                rng.gen_range(0..10),
                rng.gen_range(0..10),
                rng.gen_range(0..10),
            ])
        } else {
            // Rotating pattern: slots 0..19 together cover every value in
            // 0..10, so any open index finds at least one match.
            IndexTriple([
                (call % 10) as u8,
                ((call + 3) % 10) as u8,
                ((call + 7) % 10) as u8,
            ])
        };

        assigned.insert(registration.address.clone(), triple);
        Ok(triple)
    }

    async fn my_indexes(&self, address: &str) -> Result<IndexTriple, LedgerError> {
        self.assigned
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| LedgerError::Registration("identity is not registered".to_string()))
    }

    async fn submit_response(
        &self,
        submission: &OracleSubmission,
    ) -> Result<SubmissionAck, LedgerError> {
        self.attempts
            .lock()
            .unwrap()
            .push((submission.address.clone(), submission.index));

        if self.transport_failing_index == Some(submission.index) {
            return Err(LedgerError::Submission("gas exhausted".to_string()));
        }

        match self.open_index {
            Some(open) if submission.index == open => Ok(SubmissionAck {
                accepted: true,
                tx_hash: Some(format!("0x{:016x}", self.attempt_count())),
            }),
            _ => Err(LedgerError::SubmissionRejected {
                index: submission.index,
            }),
        }
    }
}

fn request() -> OracleRequest {
    OracleRequest {
        airline: "0xa1".to_string(),
        flight: "AB100".to_string(),
        timestamp: 1_700_000_000,
        block: 1,
    }
}

async fn registered_coordinator(
    mock: Arc<MockLedger>,
    pool_size: u32,
) -> Arc<OracleCoordinator> {
    let coordinator = Arc::new(OracleCoordinator::new(
        mock,
        build_pool(&SEED, pool_size),
        STAKE,
        STATUS_ON_TIME,
    ));
    coordinator.register_all().await;
    coordinator
}

// ============================================================================
// Registration
// ============================================================================

mod registration {
    use super::*;

    #[tokio::test]
    async fn test_full_pool_registers_with_three_indexes_each() {
        let mock = Arc::new(MockLedger::new());
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.pool_counts().await, (20, 20));
        assert_eq!(mock.registration_calls(), 20);
        assert_eq!(mock.assigned_count(), 20);
    }

    #[tokio::test]
    async fn test_failure_for_one_slot_does_not_abort_the_rest() {
        let mock = Arc::new(MockLedger::new().with_failing_slot(5));
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        // Every slot was still attempted, in order.
        assert_eq!(mock.registration_calls(), 20);
        assert_eq!(coordinator.pool_counts().await, (19, 20));
    }

    #[tokio::test]
    async fn test_multiple_failures_shrink_but_never_stop_the_pool() {
        let mock = Arc::new(
            MockLedger::new()
                .with_failing_slot(0)
                .with_failing_slot(7)
                .with_failing_slot(19),
        );
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(mock.registration_calls(), 20);
        assert_eq!(coordinator.pool_counts().await, (17, 20));
    }

    #[tokio::test]
    async fn test_already_registered_slot_recovers_its_indexes() {
        let pool = build_pool(&SEED, 20);
        let known = IndexTriple([2, 5, 8]);
        let mock = Arc::new(
            MockLedger::new().with_existing_registration(pool[0].address(), known),
        );

        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        // The slot is usable via the index lookup, not re-registered.
        assert_eq!(coordinator.pool_counts().await, (20, 20));
        assert_eq!(mock.assigned_count(), 20);
    }
}

// ============================================================================
// Fan-out
// ============================================================================

mod fan_out {
    use super::*;

    #[tokio::test]
    async fn test_request_dispatches_pool_times_three_attempts() {
        let mock = Arc::new(MockLedger::new().with_open_index(7));
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        let dispatched = coordinator.fan_out(&request()).await;

        assert_eq!(dispatched, 60);
        assert_eq!(mock.attempt_count(), 60);

        let stats = coordinator.stats();
        assert_eq!(stats.attempts_dispatched, 60);
        // The rotating assignment covers every index value across 20
        // identities, so the open index is always matched at least once.
        assert!(stats.accepted >= 1);
        assert_eq!(stats.accepted + stats.rejected, 60);
    }

    #[tokio::test]
    async fn test_shrunken_pool_dispatches_fewer_attempts() {
        let mock = Arc::new(MockLedger::new().with_failing_slot(5));
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.fan_out(&request()).await, 57);
        assert_eq!(mock.attempt_count(), 57);
    }

    #[tokio::test]
    async fn test_rejections_never_suppress_sibling_attempts() {
        // No open index: the ledger rejects every single attempt.
        let mock = Arc::new(MockLedger::new());
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.fan_out(&request()).await, 60);
        assert_eq!(mock.attempt_count(), 60);

        let stats = coordinator.stats();
        assert_eq!(stats.rejected, 60);
        assert_eq!(stats.accepted, 0);

        // Each identity still placed one attempt per index it holds.
        let pool = build_pool(&SEED, 20);
        for identity in &pool {
            assert_eq!(mock.attempts_for(identity.address()), 3);
        }
    }

    #[tokio::test]
    async fn test_transport_failures_are_isolated_per_attempt() {
        let mock = Arc::new(
            MockLedger::new()
                .with_open_index(7)
                .with_transport_failure_on(4),
        );
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.fan_out(&request()).await, 60);
        assert_eq!(mock.attempt_count(), 60);

        let stats = coordinator.stats();
        assert!(stats.failed >= 1);
        assert_eq!(stats.accepted + stats.rejected + stats.failed, 60);
    }

    #[tokio::test]
    async fn test_duplicate_requests_fan_out_independently() {
        let mock = Arc::new(MockLedger::new());
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.fan_out(&request()).await, 60);
        assert_eq!(coordinator.fan_out(&request()).await, 60);
        assert_eq!(mock.attempt_count(), 120);
        assert_eq!(coordinator.stats().attempts_dispatched, 120);
    }

    #[tokio::test]
    async fn test_random_index_assignment_still_dispatches_everything() {
        let mock = Arc::new(
            MockLedger::new()
                .with_random_indexes()
                .with_open_index(3),
        );
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        assert_eq!(coordinator.fan_out(&request()).await, 60);
        assert_eq!(mock.attempt_count(), 60);
    }
}

// ============================================================================
// Stream consumption
// ============================================================================

mod stream {
    use super::*;

    #[tokio::test]
    async fn test_run_drives_fan_out_from_the_request_stream() {
        let mock = Arc::new(MockLedger::new());
        let coordinator = registered_coordinator(Arc::clone(&mock), 20).await;

        let (sender, receiver) = broadcast::channel(16);
        let run = tokio::spawn(Arc::clone(&coordinator).run(receiver));

        sender.send(request()).unwrap();
        sender
            .send(OracleRequest {
                flight: "CD200".to_string(),
                ..request()
            })
            .unwrap();

        // Fan-outs are detached from the consumer; poll until both land.
        for _ in 0..100 {
            if mock.attempt_count() == 120 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mock.attempt_count(), 120);
        assert_eq!(coordinator.stats().requests_seen, 2);

        // Closing the stream stops the coordinator.
        drop(sender);
        run.await.unwrap();
        assert_eq!(coordinator.phase().await, RelayPhase::Stopped);
    }
}
