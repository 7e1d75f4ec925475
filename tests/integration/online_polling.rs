//! Live polling: accumulation order, failure policies and cancellation

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use transit_data_loader::collector::{CollectorConfig, CollectorError, SampleFailurePolicy};
use transit_data_loader::endpoints::VehicleKind;
use transit_data_loader::output::OutputError;
use transit_data_loader::shutdown::ShutdownCoordinator;

use crate::support::{
    collector, positions, query_param, read_json, Reply, ScriptedTransport, VEHICLES,
};

fn vehicle(lines: &str, number: &str) -> Value {
    json!({
        "Lines": lines,
        "VehicleNumber": number,
        "Lat": 52.2297,
        "Lon": 21.0122,
        "Time": "2024-03-01 12:00:00",
    })
}

#[tokio::test]
async fn samples_are_concatenated_in_call_order() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().script(
        VEHICLES,
        [
            positions(&[vehicle("520", "1001")]),
            positions(&[vehicle("520", "1002"), vehicle("4", "2001")]),
            positions(&[vehicle("180", "3001")]),
        ],
    ));

    let report = collector(&transport, dir.path())
        .download_online_data(3, "buses.json")
        .await
        .unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.records, 4);
    assert!(!report.cancelled);
    assert_eq!(
        read_json(&dir.path().join("buses.json")),
        json!([
            vehicle("520", "1001"),
            vehicle("520", "1002"),
            vehicle("4", "2001"),
            vehicle("180", "3001"),
        ])
    );
    assert_eq!(transport.calls_to(VEHICLES), 3);
}

#[tokio::test]
async fn default_poll_requests_buses() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().always(VEHICLES, positions(&[])));

    collector(&transport, dir.path())
        .download_online_data(1, "buses.json")
        .await
        .unwrap();

    let url = &transport.calls()[0];
    assert_eq!(query_param(url, "type").as_deref(), Some("1"));
    assert_eq!(
        query_param(url, "resource_id").as_deref(),
        Some("f2e5503e-927d-4ad3-9500-4ab9e55deb59")
    );
    assert_eq!(query_param(url, "apikey").as_deref(), Some("K123"));
}

#[tokio::test]
async fn tram_poll_requests_type_two() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().always(VEHICLES, positions(&[])));

    collector(&transport, dir.path())
        .with_config(CollectorConfig {
            poll_wait: Duration::ZERO,
            vehicle_kind: VehicleKind::Tram,
            ..CollectorConfig::default()
        })
        .download_online_data(1, "trams.json")
        .await
        .unwrap();

    assert_eq!(query_param(&transport.calls()[0], "type").as_deref(), Some("2"));
}

#[tokio::test]
async fn failed_sample_is_skipped() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(VEHICLES, [positions(&[vehicle("520", "1001")])])
            // Three rejections use up the attempt budget of the second sample
            .script(VEHICLES, [Reply::Rejected, Reply::Rejected, Reply::Rejected])
            .script(VEHICLES, [positions(&[vehicle("180", "3001")])]),
    );

    let report = collector(&transport, dir.path())
        .download_online_data(3, "buses.json")
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.attempted(), 3);
    assert_eq!(
        read_json(&dir.path().join("buses.json")),
        json!([vehicle("520", "1001"), vehicle("180", "3001")])
    );
}

#[tokio::test]
async fn result_that_is_not_an_array_counts_as_failed_sample() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(VEHICLES, [Reply::Json(json!({ "result": "Brak danych" }))])
            .script(VEHICLES, [positions(&[vehicle("520", "1001")])]),
    );

    let report = collector(&transport, dir.path())
        .download_online_data(2, "buses.json")
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(
        read_json(&dir.path().join("buses.json")),
        json!([vehicle("520", "1001")])
    );
}

#[tokio::test]
async fn abort_policy_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(VEHICLES, [positions(&[vehicle("520", "1001")])])
            .script(VEHICLES, [Reply::Status(500)])
            .always(VEHICLES, positions(&[vehicle("180", "3001")])),
    );

    let err = collector(&transport, dir.path())
        .with_config(CollectorConfig {
            poll_wait: Duration::ZERO,
            on_sample_failure: SampleFailurePolicy::Abort,
            ..CollectorConfig::default()
        })
        .download_online_data(3, "buses.json")
        .await
        .unwrap_err();

    assert!(
        matches!(err, CollectorError::PollAborted { iteration: 1, .. }),
        "unexpected error: {err:?}"
    );
    assert!(!dir.path().join("buses.json").exists());
    assert_eq!(transport.calls_to(VEHICLES), 2);
}

#[tokio::test]
async fn zero_intervals_writes_empty_array() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new());

    let report = collector(&transport, dir.path())
        .download_online_data(0, "buses.json")
        .await
        .unwrap();

    assert_eq!(report.attempted(), 0);
    assert_eq!(read_json(&dir.path().join("buses.json")), json!([]));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn output_replaces_previous_file_with_one_array() {
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("buses.json");
    std::fs::write(&destination, "[{\"stale\": true}]\n[{\"stale\": true}]").unwrap();
    let transport = Arc::new(
        ScriptedTransport::new().always(VEHICLES, positions(&[vehicle("520", "1001")])),
    );

    collector(&transport, dir.path())
        .download_online_data(2, "buses.json")
        .await
        .unwrap();

    assert_eq!(
        read_json(&destination),
        json!([vehicle("520", "1001"), vehicle("520", "1001")])
    );
}

#[tokio::test]
async fn shutdown_flushes_collected_samples() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let transport = Arc::new(
        ScriptedTransport::new()
            .always(VEHICLES, positions(&[vehicle("520", "1001")]))
            .on_call({
                let shutdown = shutdown.clone();
                move |call| {
                    if call == 2 {
                        shutdown.request_shutdown();
                    }
                }
            }),
    );

    let poll = collector(&transport, dir.path())
        .with_config(CollectorConfig {
            poll_wait: Duration::from_secs(3600),
            ..CollectorConfig::default()
        })
        .with_shutdown(shutdown.clone());

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        poll.download_online_data(10, "buses.json"),
    )
    .await
    .expect("shutdown should interrupt the wait between samples")
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.succeeded, 2);
    assert_eq!(transport.calls_to(VEHICLES), 2);
    assert_eq!(
        read_json(&dir.path().join("buses.json")),
        json!([vehicle("520", "1001"), vehicle("520", "1001")])
    );
}

#[tokio::test]
async fn shutdown_before_start_writes_empty_array() {
    let dir = TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let transport = Arc::new(ScriptedTransport::new().always(VEHICLES, positions(&[])));

    let report = collector(&transport, dir.path())
        .with_shutdown(shutdown)
        .download_online_data(5, "buses.json")
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.attempted(), 0);
    assert_eq!(read_json(&dir.path().join("buses.json")), json!([]));
}

#[tokio::test]
async fn output_in_missing_subdirectory_is_created() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new().always(VEHICLES, positions(&[vehicle("520", "1001")])),
    );

    let report = collector(&transport, dir.path())
        .download_online_data(3, "sub/buses.json")
        .await
        .unwrap();

    assert_eq!(report.succeeded, 3);
    assert_eq!(
        read_json(&dir.path().join("sub").join("buses.json")),
        json!([vehicle("520", "1001"), vehicle("520", "1001"), vehicle("520", "1001")])
    );
}

#[tokio::test]
async fn unwritable_destination_fails_before_sampling() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("blocker"), "not a directory").unwrap();
    let transport = Arc::new(ScriptedTransport::new().always(VEHICLES, positions(&[])));

    let err = collector(&transport, dir.path())
        .download_online_data(3, "blocker/buses.json")
        .await
        .unwrap_err();

    assert!(
        matches!(err, CollectorError::Output(OutputError::NotADirectory(_))),
        "unexpected error: {err:?}"
    );
    assert!(transport.calls().is_empty());
}
