//! Wire types shared between the ledger client, the event listener and the
//! coordinator.

use serde::{Deserialize, Serialize};

/// The three index values the ledger assigns to an oracle at registration.
///
/// Indexes partition oracle responses for tallying; an identity may only
/// respond to a request whose open index set contains one of its three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTriple(pub [u8; 3]);

impl IndexTriple {
    pub fn contains(&self, index: u8) -> bool {
        self.0.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for IndexTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.0[0], self.0[1], self.0[2])
    }
}

/// A status request observed on the ledger's event stream.
///
/// Requests are not deduplicated: a duplicate on-chain event produces a
/// duplicate fan-out, which the ledger's own tallying tolerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    /// Airline account the status query is about.
    pub airline: String,
    /// Flight code, e.g. "AB100".
    pub flight: String,
    /// Scheduled departure as a unix timestamp.
    pub timestamp: u64,
    /// Block height the event was observed at.
    pub block: u64,
}

/// Flight status codes as defined by the insurance ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatus {
    pub fn code(&self) -> u8 {
        match self {
            FlightStatus::Unknown => 0,
            FlightStatus::OnTime => 10,
            FlightStatus::LateAirline => 20,
            FlightStatus::LateWeather => 30,
            FlightStatus::LateTechnical => 40,
            FlightStatus::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_triple_contains() {
        let triple = IndexTriple([2, 5, 9]);
        assert!(triple.contains(5));
        assert!(!triple.contains(3));
        assert_eq!(triple.iter().count(), 3);
    }

    #[test]
    fn test_status_code_round_trip() {
        for status in [
            FlightStatus::Unknown,
            FlightStatus::OnTime,
            FlightStatus::LateAirline,
            FlightStatus::LateWeather,
            FlightStatus::LateTechnical,
            FlightStatus::LateOther,
        ] {
            assert_eq!(FlightStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(FlightStatus::from_code(11), None);
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"airline":"0xab","flight":"AB100","timestamp":1700000000,"block":42}"#;
        let request: OracleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.flight, "AB100");
        assert_eq!(request.timestamp, 1_700_000_000);
    }
}
