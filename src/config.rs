//! Process configuration.
//!
//! Everything comes from the environment; unset or unparsable values fall
//! back to the defaults below (with a warning for the unparsable case).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | 8080 |
//! | `BIND_ADDR` | 0.0.0.0 |
//! | `SERVERS_FILE` | servers.json |
//! | `SQUAD_HTTP_TIMEOUT_SECS` | 10 |
//! | `SQUAD_QUOTA_BURST` | 15 |
//! | `SQUAD_QUOTA_REFILL_MS` | 1000 |
//! | `SQUAD_COOLING_WINDOW_SECS` | 30 |
//! | `SQUAD_ABORT_ON_QUOTA` | true |
//! | `SQUAD_PROXY_URL` | unset |

use crate::collector::CollectorConfig;
use crate::resilience::{BackoffConfig, QuotaBudget};
use crate::transport::TransportConfig;
use crate::{Error, ErrorContext, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub servers_file: PathBuf,
    pub http_timeout: Duration,
    pub quota_burst: u32,
    pub quota_refill: Duration,
    pub cooling_window: Duration,
    pub abort_on_quota: bool,
    pub proxy_url: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            servers_file: PathBuf::from("servers.json"),
            http_timeout: Duration::from_secs(10),
            quota_burst: 15,
            quota_refill: Duration::from_millis(1000),
            cooling_window: Duration::from_secs(30),
            abort_on_quota: true,
            proxy_url: None,
        }
    }
}

impl ExporterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            port: parse_or(&lookup, "PORT", d.port),
            bind_addr: parse_or(&lookup, "BIND_ADDR", d.bind_addr),
            servers_file: non_empty(&lookup, "SERVERS_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.servers_file),
            http_timeout: Duration::from_secs(
                parse_or(&lookup, "SQUAD_HTTP_TIMEOUT_SECS", d.http_timeout.as_secs()).max(1),
            ),
            quota_burst: parse_or(&lookup, "SQUAD_QUOTA_BURST", d.quota_burst).max(1),
            quota_refill: Duration::from_millis(
                parse_or(
                    &lookup,
                    "SQUAD_QUOTA_REFILL_MS",
                    d.quota_refill.as_millis() as u64,
                )
                .max(1),
            ),
            cooling_window: Duration::from_secs(parse_or(
                &lookup,
                "SQUAD_COOLING_WINDOW_SECS",
                d.cooling_window.as_secs(),
            )),
            abort_on_quota: parse_bool_or(&lookup, "SQUAD_ABORT_ON_QUOTA", d.abort_on_quota),
            proxy_url: non_empty(&lookup, "SQUAD_PROXY_URL"),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_servers_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.servers_file = path.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_quota(mut self, burst: u32, refill: Duration) -> Self {
        self.quota_burst = burst;
        self.quota_refill = refill;
        self
    }

    pub fn with_cooling_window(mut self, window: Duration) -> Self {
        self.cooling_window = window;
        self
    }

    pub fn with_abort_on_quota(mut self, abort: bool) -> Self {
        self.abort_on_quota = abort;
        self
    }

    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn quota_budget(&self) -> QuotaBudget {
        QuotaBudget::new()
            .with_capacity(self.quota_burst)
            .with_refill_interval(self.quota_refill)
    }

    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new()
            .with_cooling_window(self.cooling_window)
            .with_abort_cycle_on_quota(self.abort_on_quota)
    }

    pub fn transport(&self) -> TransportConfig {
        let cfg = TransportConfig::default().with_timeout(self.http_timeout);
        match &self.proxy_url {
            Some(url) => cfg.with_proxy_url(url.clone()),
            None => cfg,
        }
    }

    pub fn collector(&self, initial_entity_count: usize) -> CollectorConfig {
        CollectorConfig::new()
            .with_budget(self.quota_budget())
            .with_backoff(self.backoff())
            .with_initial_entity_count(initial_entity_count)
    }

    /// Reject combinations that cannot work at all.
    pub fn validate(&self) -> Result<()> {
        if self.servers_file.as_os_str().is_empty() {
            return Err(Error::configuration_with_context(
                "server list path is empty",
                ErrorContext::new()
                    .with_field_path("SERVERS_FILE")
                    .with_source("config"),
            ));
        }
        if let Some(proxy) = &self.proxy_url {
            url::Url::parse(proxy).map_err(|e| {
                Error::configuration_with_context(
                    "invalid proxy URL",
                    ErrorContext::new()
                        .with_field_path("SQUAD_PROXY_URL")
                        .with_details(e.to_string())
                        .with_source("config"),
                )
            })?;
        }
        Ok(())
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match non_empty(lookup, key) {
        None => default,
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid value, using default {}", default);
            default
        }),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key).map(|v| v.to_ascii_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %v, "invalid boolean, using default {}", default);
                default
            }
        },
    }
}
