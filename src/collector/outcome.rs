//! Classification of a single status poll.

use crate::types::ObservationFacts;
use std::fmt;

/// What one poll produced. Everything except `Success` counts as a scrape error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(ObservationFacts),
    /// HTTP 429 / 503: the remote quota is exhausted.
    QuotaExceeded {
        status: u16,
        retry_after: Option<String>,
        remaining: Option<String>,
    },
    /// Any other non-2xx status.
    RemoteError { status: u16 },
    /// Connect failure, reset, or the per-call timeout.
    TransportError { message: String },
    /// 2xx with a body that is not a status document.
    DecodeError { message: String },
}

impl FetchOutcome {
    /// Stable class name used in logs.
    pub fn class(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::QuotaExceeded { .. } => "quota_exceeded",
            FetchOutcome::RemoteError { .. } => "remote_error",
            FetchOutcome::TransportError { .. } => "transport_error",
            FetchOutcome::DecodeError { .. } => "decode_error",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, FetchOutcome::QuotaExceeded { .. })
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(facts) => write!(f, "ok ({} players)", facts.player_count),
            FetchOutcome::QuotaExceeded {
                status,
                retry_after,
                remaining,
            } => write!(
                f,
                "rate limit exceeded (HTTP {}), retry after: {}, remaining: {}",
                status,
                retry_after.as_deref().unwrap_or("-"),
                remaining.as_deref().unwrap_or("-")
            ),
            FetchOutcome::RemoteError { status } => write!(f, "unexpected status code {}", status),
            FetchOutcome::TransportError { message } => write!(f, "transport failure: {}", message),
            FetchOutcome::DecodeError { message } => {
                write!(f, "failed to decode status document: {}", message)
            }
        }
    }
}
