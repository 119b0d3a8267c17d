//! One bounded, metered status poll per entity.

use crate::collector::outcome::FetchOutcome;
use crate::resilience::QuotaLimiter;
use crate::telemetry::ExporterMetrics;
use crate::transport::HttpTransport;
use crate::types::{ObservationFacts, StatusResponse, TrackedEntity};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Seam between the cycle loop and the network.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Poll `entity` once. Per-entity failures are outcomes; `Err` is reserved
    /// for cancellation.
    async fn fetch(
        &self,
        entity: &TrackedEntity,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome>;
}

/// HTTP status fetcher gated by the shared quota limiter.
pub struct EntityFetcher {
    transport: HttpTransport,
    limiter: Arc<QuotaLimiter>,
    metrics: ExporterMetrics,
}

impl EntityFetcher {
    pub fn new(
        transport: HttpTransport,
        limiter: Arc<QuotaLimiter>,
        metrics: ExporterMetrics,
    ) -> Self {
        Self {
            transport,
            limiter,
            metrics,
        }
    }

    async fn poll(&self, entity: &TrackedEntity) -> FetchOutcome {
        let response = match self.transport.get(&entity.poll_url).await {
            Ok(r) => r,
            Err(e) => {
                return FetchOutcome::TransportError {
                    message: e.to_string(),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            if code == 429 || code == 503 {
                let headers = response.headers();
                return FetchOutcome::QuotaExceeded {
                    status: code,
                    retry_after: header_first(headers, &["retry-after"]),
                    remaining: header_first(headers, &["x-ratelimit-remaining"]),
                };
            }
            return FetchOutcome::RemoteError { status: code };
        }

        // A body that never arrives is a transport fault, not a decode fault.
        let body = match self.transport.read_body(response).await {
            Ok(b) => b,
            Err(e) => {
                return FetchOutcome::TransportError {
                    message: format!("failed to read response body: {}", e),
                }
            }
        };

        match serde_json::from_str::<StatusResponse>(&body) {
            Ok(resp) => FetchOutcome::Success(ObservationFacts::from(resp)),
            Err(e) => FetchOutcome::DecodeError {
                message: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl StatusFetcher for EntityFetcher {
    async fn fetch(
        &self,
        entity: &TrackedEntity,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        self.limiter.acquire(cancel).await?;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(crate::Error::cancelled("entity_fetcher")),
            outcome = self.poll(entity) => outcome,
        };

        if outcome.is_success() {
            debug!(server = %entity.name, "status poll succeeded");
        } else {
            self.metrics.record_scrape_error(&entity.name);
            if outcome.is_quota_exceeded() {
                warn!(server = %entity.name, "⚠️  {}", outcome);
            }
        }
        Ok(outcome)
    }
}

fn header_first(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    for name in names {
        if let Some(v) = headers.get(*name) {
            if let Ok(s) = v.to_str() {
                let s = s.trim();
                if !s.is_empty() {
                    return Some(s.to_string());
                }
            }
        }
    }
    None
}
