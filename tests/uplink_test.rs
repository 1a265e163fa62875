// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the collector uplink client
//!
//! A wiremock collector stands in for the remote endpoint; the tests verify
//! the wire body and the fire-and-forget failure handling.

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rust_solar_scada::config::UplinkConfig;
use rust_solar_scada::scada::{ScadaSnapshot, SystemStatus};
use rust_solar_scada::uplink::{CollectorClient, UplinkError, UplinkPayload};

fn test_config(collector_url: String) -> UplinkConfig {
    UplinkConfig {
        enabled: true,
        collector_url,
        device_id: "SOLAR-GW-001".to_string(),
        timeout_ms: 1000,
    }
}

fn test_payload() -> UplinkPayload {
    let snapshot = ScadaSnapshot {
        current_rms_amps: 5.0,
        ac_power_kw: 1.1,
        total_energy_kwh: 0.25,
        system_status: SystemStatus::Online,
        ..ScadaSnapshot::default()
    };
    UplinkPayload::new("SOLAR-GW-001", 65_000, 5.0, 1.1, &snapshot)
}

#[tokio::test]
async fn send_posts_the_expected_wire_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/energy-data"))
        .and(body_partial_json(serde_json::json!({
            "device_id": "SOLAR-GW-001",
            "current": 5.0,
            "power": 1100.0,
            "ac_power_kw": 1.1,
            "total_energy_kwh": 0.25,
            "system_status": 1,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        CollectorClient::from_config(&test_config(format!("{}/api/energy-data", server.uri())))
            .unwrap();
    client.send(&test_payload()).await.unwrap();
}

#[tokio::test]
async fn timestamp_is_derived_from_uptime() {
    let payload = test_payload();
    // 65 s of uptime against the synthetic epoch
    assert_eq!(payload.timestamp, "2024-01-01T00:01:05.000Z");
}

#[tokio::test]
async fn rejected_payload_surfaces_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client =
        CollectorClient::from_config(&test_config(format!("{}/api/energy-data", server.uri())))
            .unwrap();
    match client.send(&test_payload()).await {
        Err(UplinkError::Rejected(status)) => assert_eq!(status, 500),
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unreachable_collector_is_an_error_not_a_panic() {
    // Nothing listens on this port
    let client = CollectorClient::from_config(&test_config(
        "http://127.0.0.1:59999/api/energy-data".to_string(),
    ))
    .unwrap();
    assert!(matches!(
        client.send(&test_payload()).await,
        Err(UplinkError::Transport(_))
    ));
}

#[tokio::test]
async fn invalid_collector_url_is_rejected_at_construction() {
    assert!(matches!(
        CollectorClient::from_config(&test_config("not a url".to_string())),
        Err(UplinkError::InvalidUrl(_))
    ));
}
