use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::ledger::FlightStatus;

/// Configuration for the Surety oracle relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Status HTTP server configuration
    pub server: ServerConfig,
    /// Ledger endpoint configuration
    pub ledger: LedgerConfig,
    /// Oracle pool configuration
    pub oracle: OracleConfig,
    /// Request event stream configuration
    pub stream: StreamConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the status server to
    pub host: String,
    /// Port to bind the status server to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Ledger RPC endpoint
    pub rpc_url: String,
    /// Ledger event stream endpoint
    pub ws_url: String,
    /// Transport timeout for RPC calls
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Number of identities in the pool
    pub pool_size: u32,
    /// Stake paid with each registration, in base currency units
    pub stake: u64,
    /// Fixed status code submitted for every response. The relay never
    /// derives this from real flight data; changing it changes the
    /// ledger's tallying outcome.
    pub status_code: u8,
    /// Identity derivation seed, 64 hex chars - MUST come from environment
    pub seed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Block to begin the request subscription at
    pub from_block: u64,
    /// Base reconnect delay after a stream error
    pub reconnect_delay_secs: u64,
    /// Cap for the doubling reconnect delay
    pub max_reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

/// One native currency unit in base denomination.
pub const DEFAULT_STAKE: u64 = 1_000_000_000;

/// Default pool cardinality, matching the reference deployment.
pub const DEFAULT_POOL_SIZE: u32 = 20;

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8585,
            },
            ledger: LedgerConfig {
                rpc_url: "http://127.0.0.1:26657".to_string(),
                ws_url: "ws://127.0.0.1:26657/websocket".to_string(),
                timeout_secs: 30,
            },
            oracle: OracleConfig {
                pool_size: DEFAULT_POOL_SIZE,
                stake: DEFAULT_STAKE,
                status_code: FlightStatus::OnTime.code(),
                seed: String::new(), // Must be set via environment
            },
            stream: StreamConfig {
                from_block: 0,
                reconnect_delay_secs: 1,
                max_reconnect_delay_secs: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("SURETY_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = env::var("SURETY_PORT") {
            config.server.port = port.parse().context("Invalid SURETY_PORT value")?;
        }

        if let Ok(rpc_url) = env::var("SURETY_LEDGER_RPC_URL") {
            config.ledger.rpc_url = rpc_url;
        }

        if let Ok(ws_url) = env::var("SURETY_LEDGER_WS_URL") {
            config.ledger.ws_url = ws_url;
        }

        if let Ok(timeout) = env::var("SURETY_LEDGER_TIMEOUT_SECS") {
            config.ledger.timeout_secs = timeout
                .parse()
                .context("Invalid SURETY_LEDGER_TIMEOUT_SECS value")?;
        }

        if let Ok(pool_size) = env::var("SURETY_POOL_SIZE") {
            config.oracle.pool_size = pool_size
                .parse()
                .context("Invalid SURETY_POOL_SIZE value")?;
        }

        if let Ok(stake) = env::var("SURETY_STAKE") {
            config.oracle.stake = stake.parse().context("Invalid SURETY_STAKE value")?;
        }

        if let Ok(status_code) = env::var("SURETY_STATUS_CODE") {
            config.oracle.status_code = status_code
                .parse()
                .context("Invalid SURETY_STATUS_CODE value")?;
        }

        config.oracle.seed = env::var("SURETY_ORACLE_SEED")
            .context("SURETY_ORACLE_SEED environment variable is required")?;

        if let Ok(from_block) = env::var("SURETY_FROM_BLOCK") {
            config.stream.from_block = from_block
                .parse()
                .context("Invalid SURETY_FROM_BLOCK value")?;
        }

        if let Ok(delay) = env::var("SURETY_RECONNECT_DELAY_SECS") {
            config.stream.reconnect_delay_secs = delay
                .parse()
                .context("Invalid SURETY_RECONNECT_DELAY_SECS value")?;
        }

        if let Ok(delay) = env::var("SURETY_MAX_RECONNECT_DELAY_SECS") {
            config.stream.max_reconnect_delay_secs = delay
                .parse()
                .context("Invalid SURETY_MAX_RECONNECT_DELAY_SECS value")?;
        }

        if let Ok(level) = env::var("SURETY_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if !self.ledger.rpc_url.starts_with("http://") && !self.ledger.rpc_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "Ledger RPC URL must be http(s): {}",
                self.ledger.rpc_url
            ));
        }

        if !self.ledger.ws_url.starts_with("ws://") && !self.ledger.ws_url.starts_with("wss://") {
            return Err(anyhow::anyhow!(
                "Ledger WS URL must be ws(s): {}",
                self.ledger.ws_url
            ));
        }

        if self.oracle.pool_size == 0 {
            return Err(anyhow::anyhow!("Pool size must be at least 1"));
        }

        if self.oracle.stake == 0 {
            return Err(anyhow::anyhow!("Stake must be non-zero"));
        }

        if FlightStatus::from_code(self.oracle.status_code).is_none() {
            return Err(anyhow::anyhow!(
                "Unknown status code {} (known codes: 0, 10, 20, 30, 40, 50)",
                self.oracle.status_code
            ));
        }

        self.decode_seed()?;

        Ok(())
    }

    /// Decode the identity derivation seed.
    pub fn decode_seed(&self) -> Result<[u8; 32]> {
        let bytes = hex::decode(self.seed_trimmed())
            .context("SURETY_ORACLE_SEED must be hex-encoded")?;
        bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("SURETY_ORACLE_SEED must decode to exactly 32 bytes"))
    }

    fn seed_trimmed(&self) -> &str {
        self.oracle
            .seed
            .strip_prefix("0x")
            .unwrap_or(&self.oracle.seed)
    }
}
