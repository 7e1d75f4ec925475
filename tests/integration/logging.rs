//! Logging and tracing

use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

use crate::support::{collector, positions, Reply, ScriptedTransport, API_KEY, DICTIONARY, VEHICLES};

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `future` on a current-thread runtime with logs captured at `filter`.
fn capture_logs<F: std::future::Future>(filter: &str, json: bool, future: F) -> String {
    let logs = CapturedLogs::default();
    let writer = {
        let logs = logs.clone();
        move || logs.clone()
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(writer)
        .with_ansi(false);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    if json {
        tracing::subscriber::with_default(builder.json().finish(), || runtime.block_on(future));
    } else {
        tracing::subscriber::with_default(builder.finish(), || runtime.block_on(future));
    }
    logs.text()
}

#[test]
fn retries_are_logged_with_attempt_numbers() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().script(
        VEHICLES,
        [Reply::Timeout, positions(&[])],
    ));
    let collector = collector(&transport, dir.path());

    let logs = capture_logs("transit_data_loader=debug", false, async {
        collector
            .download_online_data(1, "buses.json")
            .await
            .unwrap();
    });

    assert!(
        logs.contains("Retrying (attempt 2/3) after request timeout"),
        "missing retry line in:\n{logs}"
    );
    assert!(logs.contains("Live polling finished"));
}

#[test]
fn api_key_stays_out_of_logs() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(
        ScriptedTransport::new()
            .always(DICTIONARY, Reply::Rejected)
            .always(VEHICLES, positions(&[])),
    );
    let mut collector = collector(&transport, dir.path());

    let logs = capture_logs("transit_data_loader=trace", false, async {
        let _ = collector.download_basic_data().await;
        collector
            .download_online_data(2, "buses.json")
            .await
            .unwrap();
    });

    assert!(logs.contains("public_transport_dictionary"));
    assert!(!logs.contains(API_KEY), "API key leaked into logs:\n{logs}");
}

#[test]
fn json_format_emits_one_object_per_line() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(ScriptedTransport::new().always(VEHICLES, positions(&[])));
    let collector = collector(&transport, dir.path());

    let logs = capture_logs("transit_data_loader=info", true, async {
        collector
            .download_online_data(1, "buses.json")
            .await
            .unwrap();
    });

    let lines: Vec<_> = logs.lines().filter(|l| !l.trim().is_empty()).collect();
    assert!(!lines.is_empty());
    for line in lines {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(event.get("level").is_some());
        assert!(event.get("fields").is_some());
    }
}
