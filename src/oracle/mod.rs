//! Oracle pool and coordination logic.

pub mod coordinator;
pub mod identity;

pub use coordinator::{OracleCoordinator, RelayPhase, RelayStatsSnapshot};
pub use identity::{build_pool, OracleIdentity};
