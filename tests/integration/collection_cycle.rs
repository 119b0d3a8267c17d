//! End-to-end collection cycles against a mock status API

use crate::integration::mock_server::{
    series_count, series_value, stalling_server, status_body, StatusServerFixture,
};
use squad_metrics_exporter::collector::{CycleStatus, StatusFetcher};
use squad_metrics_exporter::resilience::{BackoffConfig, GovernorState, QuotaBudget, QuotaLimiter};
use squad_metrics_exporter::telemetry::ExporterMetrics;
use squad_metrics_exporter::transport::{HttpTransport, TransportConfig};
use squad_metrics_exporter::{EntityFetcher, FetchOutcome, TrackedEntity};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_status_document_published_end_to_end() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Bravo"]);
    let mock = fx
        .mock_raw(
            "Bravo",
            200,
            &status_body("[EU] Bravo | Fresh maps", 42, "Logar", "AAS", 930),
        )
        .await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());

    let report = collector.run_cycle(&CancellationToken::new()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.successes, 1);

    let bravo = ("server_short_name", "Bravo");
    assert_eq!(series_value(&metrics, "squad_player_count", &[bravo]), Some(42.0));
    assert_eq!(series_value(&metrics, "squad_play_time_seconds", &[bravo]), Some(930.0));
    assert_eq!(
        series_value(
            &metrics,
            "squad_server_info",
            &[bravo, ("server_full_name", "[EU] Bravo | Fresh maps")]
        ),
        Some(1.0)
    );
    assert_eq!(
        series_value(&metrics, "squad_current_map", &[bravo, ("map_name", "Logar")]),
        Some(1.0)
    );
    assert_eq!(
        series_value(&metrics, "squad_current_game_mode", &[bravo, ("game_mode", "AAS")]),
        Some(1.0)
    );
    assert_eq!(
        series_value(
            &metrics,
            "squad_current_teams",
            &[bravo, ("team_one", "US"), ("team_two", "RU")]
        ),
        Some(1.0)
    );
    assert_eq!(metrics.scrape_error_count("Bravo"), 0);
}

#[tokio::test]
async fn test_quota_rejection_aborts_cycle_and_cools() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha", "Bravo", "Charlie", "Delta", "Echo"]);
    let alpha = fx.mock_status("Alpha", "Narva", 10).await;
    let bravo = fx.mock_status("Bravo", "Logar", 42).await;
    let charlie = fx.mock_quota("Charlie", 429).await;
    let delta = fx.mock_status_hits("Delta", "Gorodok", 5, 0).await;
    let echo = fx.mock_status_hits("Echo", "Kohat", 7, 0).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    let report = collector.run_cycle(&cancel).await.unwrap();

    assert_eq!(report.status, CycleStatus::AbortedOnQuota);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.successes, 2);
    assert_eq!(report.quota_hits, 1);
    assert_eq!(metrics.scrape_error_count("Charlie"), 1);
    assert_eq!(collector.governor().consecutive_quota_hits(), 1);

    // Inside the cooling window nothing is fetched at all.
    let report = collector.run_cycle(&cancel).await.unwrap();
    assert_eq!(report.status, CycleStatus::SkippedCooling);
    assert_eq!(report.attempted, 0);
    assert_eq!(collector.governor().state(), GovernorState::Cooling);

    alpha.assert_async().await;
    bravo.assert_async().await;
    charlie.assert_async().await;
    delta.assert_async().await;
    echo.assert_async().await;
}

#[tokio::test]
async fn test_quota_rejection_surfaces_hints() {
    let mut fx = StatusServerFixture::new().await;
    let _m429 = fx.mock_quota("Charlie", 429).await;
    let _m503 = fx.mock_quota("Delta", 503).await;
    let metrics = ExporterMetrics::new().unwrap();
    let fetcher = fx.fetcher(&metrics);
    let cancel = CancellationToken::new();

    let outcome = fetcher
        .fetch(&TrackedEntity::new("Charlie", fx.url("Charlie")), &cancel)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        FetchOutcome::QuotaExceeded {
            status: 429,
            retry_after: Some("30".into()),
            remaining: Some("0".into()),
        }
    );

    let outcome = fetcher
        .fetch(&TrackedEntity::new("Delta", fx.url("Delta")), &cancel)
        .await
        .unwrap();
    assert!(outcome.is_quota_exceeded());
    assert_eq!(metrics.scrape_error_count("Delta"), 1);
}

#[tokio::test]
async fn test_remote_and_decode_errors_are_counted() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha", "Bravo", "Charlie", "Delta"]);
    let _a = fx.mock_raw("Alpha", 500, "upstream exploded").await;
    let _b = fx.mock_raw("Bravo", 200, "<html>maintenance</html>").await;
    let _c = fx
        .mock_raw("Charlie", 200, r#"{"data":{"attributes":{"players":"many"}}}"#)
        .await;
    let _d = fx.mock_status("Delta", "Logar", 30).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());

    let report = collector.run_cycle(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.attempted, 4);
    assert_eq!(report.failures, 3);
    assert_eq!(report.successes, 1);
    assert_eq!(report.quota_hits, 0);
    for name in ["Alpha", "Bravo", "Charlie"] {
        assert_eq!(metrics.scrape_error_count(name), 1, "{}", name);
        assert_eq!(series_count(&metrics, "squad_player_count", name), 0, "{}", name);
    }
    assert_eq!(collector.governor().state(), GovernorState::Normal);
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_state() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha"]);
    let ok = fx.mock_status("Alpha", "Narva", 64).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    collector.run_cycle(&cancel).await.unwrap();
    ok.remove_async().await;
    let _err = fx.mock_raw("Alpha", 502, "bad gateway").await;
    let report = collector.run_cycle(&cancel).await.unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(metrics.scrape_error_count("Alpha"), 1);
    let alpha = ("server_short_name", "Alpha");
    assert_eq!(series_value(&metrics, "squad_player_count", &[alpha]), Some(64.0));
    assert_eq!(
        series_value(&metrics, "squad_current_map", &[alpha, ("map_name", "Narva")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_map_change_replaces_series() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha"]);
    let narva = fx.mock_status("Alpha", "Narva", 64).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    collector.run_cycle(&cancel).await.unwrap();
    narva.remove_async().await;
    let _yeho = fx.mock_status("Alpha", "Yehorivka", 70).await;
    collector.run_cycle(&cancel).await.unwrap();

    let alpha = ("server_short_name", "Alpha");
    assert_eq!(series_count(&metrics, "squad_current_map", "Alpha"), 1);
    assert_eq!(
        series_value(&metrics, "squad_current_map", &[alpha, ("map_name", "Yehorivka")]),
        Some(1.0)
    );
    assert_eq!(
        series_value(&metrics, "squad_current_map", &[alpha, ("map_name", "Narva")]),
        None
    );
    let rendered = metrics.render().unwrap();
    assert!(!rendered.contains("Narva"));
}

#[tokio::test]
async fn test_server_list_edits_apply_next_cycle() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha", "Bravo"]);
    let _a = fx.mock_status("Alpha", "Narva", 10).await;
    let _b = fx.mock_status("Bravo", "Logar", 20).await;
    let _c = fx.mock_status("Charlie", "Kohat", 30).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    collector.run_cycle(&cancel).await.unwrap();
    assert_eq!(collector.period(), Duration::from_secs(4));

    fx.write_servers(&["Bravo", "Charlie"]);
    let report = collector.run_cycle(&cancel).await.unwrap();
    assert_eq!(report.successes, 2);
    assert_eq!(series_count(&metrics, "squad_player_count", "Alpha"), 0);
    assert_eq!(series_count(&metrics, "squad_player_count", "Charlie"), 1);

    fx.write_servers(&["Alpha", "Bravo", "Charlie"]);
    collector.run_cycle(&cancel).await.unwrap();
    assert_eq!(collector.period(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_broken_server_list_skips_cycle() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha"]);
    let alpha = fx.mock_status("Alpha", "Narva", 64).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    collector.run_cycle(&cancel).await.unwrap();
    fx.write_raw_servers("[{\"Name\": \"Alpha\", ");
    let report = collector.run_cycle(&cancel).await.unwrap();

    assert_eq!(report.status, CycleStatus::ReloadFailed);
    alpha.assert_async().await;
    assert_eq!(
        series_value(&metrics, "squad_player_count", &[("server_short_name", "Alpha")]),
        Some(64.0)
    );
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    let metrics = ExporterMetrics::new().unwrap();
    let fetcher = fetcher_with_timeout(&metrics, Duration::from_secs(2));

    let outcome = fetcher
        .fetch(
            &TrackedEntity::new("Ghost", "http://127.0.0.1:9/status"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.class(), "transport_error");
    assert_eq!(metrics.scrape_error_count("Ghost"), 1);
}

fn fetcher_with_timeout(metrics: &ExporterMetrics, timeout: Duration) -> EntityFetcher {
    let transport = HttpTransport::new(&TransportConfig::default().with_timeout(timeout)).unwrap();
    EntityFetcher::new(
        transport,
        Arc::new(QuotaLimiter::new(QuotaBudget::default())),
        metrics.clone(),
    )
}

#[tokio::test]
async fn test_silent_server_times_out_as_transport_error() {
    let addr = stalling_server(b"").await;
    let metrics = ExporterMetrics::new().unwrap();
    let fetcher = fetcher_with_timeout(&metrics, Duration::from_secs(1));

    let started = std::time::Instant::now();
    let outcome = fetcher
        .fetch(
            &TrackedEntity::new("Silent", format!("http://{}/status", addr)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.class(), "transport_error");
    assert!(outcome.to_string().contains("timed out"), "{}", outcome);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(metrics.scrape_error_count("Silent"), 1);
}

#[tokio::test]
async fn test_stalled_body_times_out_as_transport_error() {
    // Headers promise 200 bytes, only the first few ever arrive.
    let addr = stalling_server(
        b"HTTP/1.1 200 OK\r\n\
          content-type: application/json\r\n\
          content-length: 200\r\n\r\n\
          {\"data\"",
    )
    .await;
    let metrics = ExporterMetrics::new().unwrap();
    let fetcher = fetcher_with_timeout(&metrics, Duration::from_secs(1));

    let outcome = fetcher
        .fetch(
            &TrackedEntity::new("Stalled", format!("http://{}/status", addr)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.class(), "transport_error");
    assert!(outcome.to_string().contains("response body"), "{}", outcome);
    assert_eq!(metrics.scrape_error_count("Stalled"), 1);
}

#[tokio::test]
async fn test_null_details_replace_previous_map() {
    let mut fx = StatusServerFixture::new().await;
    fx.write_servers(&["Alpha"]);
    let narva = fx.mock_status("Alpha", "Narva", 64).await;
    let (mut collector, metrics) = fx.collector(BackoffConfig::default());
    let cancel = CancellationToken::new();

    collector.run_cycle(&cancel).await.unwrap();
    narva.remove_async().await;
    let _empty = fx
        .mock_raw(
            "Alpha",
            200,
            r#"{"data":{"attributes":{"name":"[EU] Alpha","players":0,"details":null}}}"#,
        )
        .await;
    let report = collector.run_cycle(&cancel).await.unwrap();

    assert_eq!(report.successes, 1);
    assert_eq!(metrics.scrape_error_count("Alpha"), 0);
    let alpha = ("server_short_name", "Alpha");
    assert_eq!(series_value(&metrics, "squad_player_count", &[alpha]), Some(0.0));
    assert_eq!(series_count(&metrics, "squad_current_map", "Alpha"), 1);
    assert_eq!(
        series_value(&metrics, "squad_current_map", &[alpha, ("map_name", "")]),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_cancel_while_waiting_for_quota() {
    let mut fx = StatusServerFixture::new().await;
    let mock = fx.mock_status_hits("Alpha", "Narva", 1, 0).await;
    let metrics = ExporterMetrics::new().unwrap();
    let transport = HttpTransport::new(&TransportConfig::default()).unwrap();
    let limiter = Arc::new(QuotaLimiter::new(
        QuotaBudget::new()
            .with_capacity(1)
            .with_refill_interval(Duration::from_secs(3600)),
    ));
    assert!(limiter.try_acquire().await);
    let fetcher = EntityFetcher::new(transport, limiter, metrics.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = fetcher
        .fetch(&TrackedEntity::new("Alpha", fx.url("Alpha")), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(metrics.scrape_error_count("Alpha"), 0);
    mock.assert_async().await;
}
