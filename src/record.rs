use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::ErrorCategory;

/// The outcome of one individual request within a round.
///
/// Records are created by the attacker, consumed by the metrics accumulator
/// and the result sink, and never mutated after creation. When persistence is
/// enabled each record becomes one JSON line in the round's results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Sequence number assigned when the request was issued.
    pub seq: u64,

    /// HTTP method of the attacked target.
    pub method: String,

    /// Attacked URL.
    pub url: String,

    /// Response status code; 0 when the request never produced a response.
    pub status: u16,

    /// Request start time, unix milliseconds.
    pub timestamp_ms: u64,

    /// Time from issuing the request to draining the response body, in
    /// microseconds.
    pub latency_us: u64,

    /// Response body size in bytes.
    pub bytes_in: u64,

    /// Failure description: transport errors carry their category label,
    /// non-success responses their status line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRecord {
    /// A request succeeded if it produced a 2xx/3xx response and no error.
    pub fn success(&self) -> bool {
        self.error.is_none() && ErrorCategory::from_status_code(self.status).is_none()
    }

    /// End of the request (start + latency), unix milliseconds.
    pub fn end_ms(&self) -> u64 {
        self.timestamp_ms + self.latency_us / 1_000
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: u16, error: Option<&str>) -> ResultRecord {
        ResultRecord {
            seq: 0,
            method: "GET".to_string(),
            url: "http://127.0.0.1/".to_string(),
            status,
            timestamp_ms: 1_000,
            latency_us: 2_500,
            bytes_in: 64,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn two_hundreds_and_redirects_succeed() {
        assert!(record(200, None).success());
        assert!(record(302, None).success());
    }

    #[test]
    fn error_statuses_fail() {
        assert!(!record(404, Some("HTTP 404 Not Found")).success());
        assert!(!record(500, Some("HTTP 500 Internal Server Error")).success());
        assert!(!record(0, Some("timeout_error: deadline exceeded")).success());
    }

    #[test]
    fn end_includes_latency() {
        assert_eq!(record(200, None).end_ms(), 1_002);
    }

    #[test]
    fn serializes_as_one_json_object() {
        let json = serde_json::to_string(&record(200, None)).unwrap();
        assert!(!json.contains('\n'));
        let back: ResultRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record(200, None));
    }

    #[test]
    fn error_field_omitted_when_absent() {
        let json = serde_json::to_string(&record(200, None)).unwrap();
        assert!(!json.contains("error"));
    }
}
