//! Mock status API and server-list fixtures for integration tests

use mockito::{Mock, Server, ServerGuard};
use prometheus::proto::MetricFamily;
use serde_json::json;
use squad_metrics_exporter::collector::{Collector, CollectorConfig, EntityFetcher};
use squad_metrics_exporter::registry::FileEntitySource;
use squad_metrics_exporter::resilience::{BackoffConfig, QuotaLimiter};
use squad_metrics_exporter::server::AppState;
use squad_metrics_exporter::telemetry::{ExporterMetrics, MetricPublisher};
use squad_metrics_exporter::transport::{HttpTransport, TransportConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Body of a healthy status response.
pub fn status_body(name: &str, players: u64, map: &str, mode: &str, play_time: u64) -> String {
    json!({
        "data": {
            "type": "server",
            "id": "1234",
            "attributes": {
                "name": name,
                "players": players,
                "details": {
                    "map": map,
                    "gameMode": mode,
                    "squad_playTime": play_time,
                    "squad_teamOne": "US",
                    "squad_teamTwo": "RU"
                }
            }
        }
    })
    .to_string()
}

/// Test fixture that manages a mock status API and the server list file
pub struct StatusServerFixture {
    pub server: ServerGuard,
    pub servers_file: NamedTempFile,
    pub limiter: Arc<QuotaLimiter>,
}

impl StatusServerFixture {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
            servers_file: NamedTempFile::new().unwrap(),
            limiter: Arc::new(QuotaLimiter::new(Default::default())),
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/servers/{}", self.server.url(), name.to_lowercase())
    }

    fn path(name: &str) -> String {
        format!("/servers/{}", name.to_lowercase())
    }

    /// (Re)write the server list with one entry per name, pointing at the mock.
    pub fn write_servers(&self, names: &[&str]) {
        let list: Vec<_> = names
            .iter()
            .map(|n| json!({ "Name": n, "Url": self.url(n) }))
            .collect();
        std::fs::write(self.servers_file.path(), serde_json::to_string(&list).unwrap()).unwrap();
    }

    pub fn write_raw_servers(&self, content: &str) {
        std::fs::write(self.servers_file.path(), content).unwrap();
    }

    fn status_mock(&mut self, name: &str, map: &str, players: u64) -> Mock {
        self.server
            .mock("GET", Self::path(name).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(status_body(&format!("[EU] {}", name), players, map, "RAAS", 600))
    }

    /// Create a mock for a successful status response (expected once)
    pub async fn mock_status(&mut self, name: &str, map: &str, players: u64) -> Mock {
        self.status_mock(name, map, players).create_async().await
    }

    /// Same as `mock_status`, expecting exactly `hits` requests
    pub async fn mock_status_hits(
        &mut self,
        name: &str,
        map: &str,
        players: u64,
        hits: usize,
    ) -> Mock {
        self.status_mock(name, map, players)
            .expect(hits)
            .create_async()
            .await
    }

    /// Create a mock with an arbitrary body and status
    pub async fn mock_raw(&mut self, name: &str, status: usize, body: &str) -> Mock {
        self.server
            .mock("GET", Self::path(name).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a quota rejection
    pub async fn mock_quota(&mut self, name: &str, status: usize) -> Mock {
        self.server
            .mock("GET", Self::path(name).as_str())
            .with_status(status)
            .with_header("retry-after", "30")
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"errors":[{"code":"rate_limit"}]}"#)
            .create_async()
            .await
    }

    pub fn fetcher(&self, metrics: &ExporterMetrics) -> Arc<EntityFetcher> {
        let transport =
            HttpTransport::new(&TransportConfig::default().with_timeout(Duration::from_secs(5)))
                .unwrap();
        Arc::new(EntityFetcher::new(
            transport,
            self.limiter.clone(),
            metrics.clone(),
        ))
    }

    /// A collector wired to the mock API and the server list file.
    pub fn collector(&self, backoff: BackoffConfig) -> (Collector, ExporterMetrics) {
        let metrics = ExporterMetrics::new().unwrap();
        let collector = Collector::new(
            Arc::new(FileEntitySource::new(self.servers_file.path())),
            self.fetcher(&metrics),
            MetricPublisher::new(metrics.clone()),
            CollectorConfig::new().with_backoff(backoff),
        );
        (collector, metrics)
    }

    /// Router state sharing the collector's status and the fixture's limiter.
    pub fn app_state(&self, collector: &Collector, metrics: ExporterMetrics) -> AppState {
        AppState::new(
            metrics,
            collector.status_handle(),
            self.limiter.clone(),
            "servers.json",
        )
    }
}

/// A server that accepts, reads the request, writes `prefix` and then goes quiet
/// with the connection held open.
pub async fn stalling_server(prefix: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(prefix).await;
            held.push(socket);
        }
    });
    addr
}

/// Value of the single series in `family` whose labels include all of `labels`.
pub fn series_value(
    metrics: &ExporterMetrics,
    family: &str,
    labels: &[(&str, &str)],
) -> Option<f64> {
    let families: Vec<MetricFamily> = metrics.registry().gather();
    families
        .iter()
        .filter(|f| f.get_name() == family)
        .flat_map(|f| f.get_metric().iter())
        .find(|m| {
            labels.iter().all(|(name, value)| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == *name && l.get_value() == *value)
            })
        })
        .map(|m| {
            if m.has_counter() {
                m.get_counter().get_value()
            } else {
                m.get_gauge().get_value()
            }
        })
}

/// Number of live series in `family` for one server.
pub fn series_count(metrics: &ExporterMetrics, family: &str, server: &str) -> usize {
    let families: Vec<MetricFamily> = metrics.registry().gather();
    families
        .iter()
        .filter(|f| f.get_name() == family)
        .flat_map(|f| f.get_metric().iter())
        .filter(|m| {
            m.get_label()
                .iter()
                .any(|l| l.get_name() == "server_short_name" && l.get_value() == server)
        })
        .count()
}
