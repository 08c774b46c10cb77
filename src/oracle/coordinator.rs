//! Oracle coordinator: owns the identity pool and drives the
//! registration + fan-out protocol.
//!
//! Lifecycle: `Uninitialized` → `register_all` → `Registering` →
//! `Listening`. Every request observed on the stream triggers one
//! detached fan-out: one submission attempt per (usable identity, index)
//! pair, dispatched concurrently. The fan-out never blocks the stream
//! consumer and never fails the process; mismatched-index rejections are
//! the expected common case and are discarded at debug level.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ledger::{LedgerError, LedgerRpc, OracleRequest, OracleSubmission};
use crate::oracle::identity::OracleIdentity;

/// Process-wide coordinator state, observable via the status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    Uninitialized,
    Registering,
    Listening,
    Stopped,
}

impl std::fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            RelayPhase::Uninitialized => "uninitialized",
            RelayPhase::Registering => "registering",
            RelayPhase::Listening => "listening",
            RelayPhase::Stopped => "stopped",
        };
        write!(f, "{phase}")
    }
}

#[derive(Debug, Default)]
struct RelayStats {
    requests_seen: AtomicU64,
    attempts_dispatched: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelayStatsSnapshot {
    pub requests_seen: u64,
    pub attempts_dispatched: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
}

enum AttemptOutcome {
    Accepted,
    Rejected,
    Failed,
}

pub struct OracleCoordinator {
    ledger: Arc<dyn LedgerRpc>,
    pool: RwLock<Vec<OracleIdentity>>,
    phase: RwLock<RelayPhase>,
    stats: RelayStats,
    shutdown: Arc<RwLock<bool>>,
    stake: u64,
    status_code: u8,
}

impl OracleCoordinator {
    /// `status_code` is the fixed value submitted for every response; the
    /// relay deliberately never derives it from real flight data.
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        pool: Vec<OracleIdentity>,
        stake: u64,
        status_code: u8,
    ) -> Self {
        Self {
            ledger,
            pool: RwLock::new(pool),
            phase: RwLock::new(RelayPhase::Uninitialized),
            stats: RelayStats::default(),
            shutdown: Arc::new(RwLock::new(false)),
            stake,
            status_code,
        }
    }

    /// Register every pool slot sequentially, paying the fixed stake.
    ///
    /// Registration transactions are serialized by nonce ordering on the
    /// ledger side, so slots are processed one at a time. A failed slot is
    /// logged and excluded from fan-out; the pass itself never fails.
    pub async fn register_all(&self) {
        *self.phase.write().await = RelayPhase::Registering;

        let mut pool = self.pool.write().await;
        let total = pool.len();
        info!("Registering {} oracle identities", total);

        for identity in pool.iter_mut() {
            let registration = identity.registration(self.stake);
            match self.ledger.register_oracle(&registration).await {
                Ok(indexes) => {
                    info!("Oracle registered: {} -> {}", identity.address(), indexes);
                    identity.set_indexes(indexes);
                }
                Err(LedgerError::AlreadyRegistered) => {
                    // The assignment is durable on the ledger; recover it
                    // instead of discarding the slot.
                    match self.ledger.my_indexes(identity.address()).await {
                        Ok(indexes) => {
                            info!(
                                "Oracle {} already registered, recovered indexes {}",
                                identity.address(),
                                indexes
                            );
                            identity.set_indexes(indexes);
                        }
                        Err(e) => {
                            warn!(
                                "Oracle {} already registered but index lookup failed, \
                                 excluding from fan-out: {}",
                                identity.address(),
                                e
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Registration failed for oracle {} (slot {}), excluding from fan-out: {}",
                        identity.address(),
                        identity.slot(),
                        e
                    );
                }
            }
        }

        let usable = pool.iter().filter(|i| i.is_usable()).count();
        drop(pool);

        if usable == 0 {
            warn!("No usable oracle identities; relay will observe requests without responding");
        }
        info!(
            "Registration pass complete: {}/{} identities usable",
            usable, total
        );
    }

    /// Consume the request stream until it closes or shutdown is raised.
    ///
    /// Each request is handed to a detached fan-out task, so a slow ledger
    /// never stalls the stream consumer.
    pub async fn run(self: Arc<Self>, mut receiver: broadcast::Receiver<OracleRequest>) {
        *self.phase.write().await = RelayPhase::Listening;
        info!("Coordinator listening for status requests");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            match receiver.recv().await {
                Ok(request) => {
                    self.stats.requests_seen.fetch_add(1, Ordering::Relaxed);
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        coordinator.fan_out(&request).await;
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Request consumer lagged; {} requests dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("Request stream closed");
                    break;
                }
            }
        }

        *self.phase.write().await = RelayPhase::Stopped;
    }

    /// Dispatch one submission attempt per (usable identity, index) pair
    /// for this request. Returns the number of attempts dispatched.
    ///
    /// Attempts run concurrently and fail independently: a rejection or
    /// transport error on one attempt never cancels a sibling.
    pub async fn fan_out(&self, request: &OracleRequest) -> usize {
        let submissions: Vec<OracleSubmission> = {
            let pool = self.pool.read().await;
            let mut submissions = Vec::new();
            for identity in pool.iter() {
                let Some(triple) = identity.indexes() else {
                    continue;
                };
                for index in triple.iter() {
                    submissions.push(identity.submission(index, request, self.status_code));
                }
            }
            submissions
        };

        let dispatched = submissions.len();
        self.stats
            .attempts_dispatched
            .fetch_add(dispatched as u64, Ordering::Relaxed);
        debug!(
            "Fanning out {} submission attempts for flight {} @ {}",
            dispatched, request.flight, request.timestamp
        );

        let mut attempts = Vec::with_capacity(dispatched);
        for submission in submissions {
            let ledger = Arc::clone(&self.ledger);
            attempts.push(tokio::spawn(async move {
                match ledger.submit_response(&submission).await {
                    Ok(ack) if ack.accepted => {
                        debug!(
                            "Submission accepted: oracle {} index {}",
                            submission.address, submission.index
                        );
                        AttemptOutcome::Accepted
                    }
                    Ok(_) => AttemptOutcome::Rejected,
                    Err(e) if e.is_rejection() => {
                        debug!(
                            "Submission rejected: oracle {} index {}",
                            submission.address, submission.index
                        );
                        AttemptOutcome::Rejected
                    }
                    Err(e) => {
                        warn!(
                            "Submission failed for oracle {} index {}: {}",
                            submission.address, submission.index, e
                        );
                        AttemptOutcome::Failed
                    }
                }
            }));
        }

        for attempt in attempts {
            match attempt.await {
                Ok(AttemptOutcome::Accepted) => {
                    self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                }
                Ok(AttemptOutcome::Rejected) => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                }
                Ok(AttemptOutcome::Failed) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!("Submission task aborted: {}", e);
                }
            }
        }

        debug!(
            "Fan-out complete for flight {} @ {}: {} attempts",
            request.flight, request.timestamp, dispatched
        );

        dispatched
    }

    pub async fn stop(&self) {
        let mut shutdown = self.shutdown.write().await;
        *shutdown = true;
        *self.phase.write().await = RelayPhase::Stopped;
        info!("Coordinator stop requested");
    }

    pub async fn phase(&self) -> RelayPhase {
        *self.phase.read().await
    }

    /// (usable, total) slot counts.
    pub async fn pool_counts(&self) -> (usize, usize) {
        let pool = self.pool.read().await;
        let usable = pool.iter().filter(|i| i.is_usable()).count();
        (usable, pool.len())
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            requests_seen: self.stats.requests_seen.load(Ordering::Relaxed),
            attempts_dispatched: self.stats.attempts_dispatched.load(Ordering::Relaxed),
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}
