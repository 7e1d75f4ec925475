//! Scripted transport and collector fixtures shared by the integration tests

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use transit_data_loader::collector::{Collector, CollectorConfig};
use transit_data_loader::endpoints::{ApiKey, EndpointTable};
use transit_data_loader::fetcher::{
    ApiFetcher, HttpTransport, RetryPolicy, TransportFailure, TransportResponse, REJECTION_SENTINEL,
};
use transit_data_loader::output::DataDir;

pub const MOCK_BASE_URL: &str = "http://mock.local/api/action/";
pub const API_KEY: &str = "K123";

/// Action path segments of the mock endpoint table.
pub const DICTIONARY: &str = "public_transport_dictionary";
pub const DBSTORE: &str = "dbstore_get";
pub const ROUTES: &str = "public_transport_routes";
pub const VEHICLES: &str = "busestrams_get";
pub const TIMETABLE: &str = "dbtimetable_get";

/// One scripted answer of the mock server.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 OK with this JSON body
    Json(Value),
    /// 200 OK with this raw body
    Raw(String),
    /// The API's "bad method or parameters" response
    Rejected,
    /// Non-2xx status with an empty body
    Status(u16),
    /// Request timed out
    Timeout,
    /// Connection refused
    Offline,
}

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// [`HttpTransport`] answering from per-action queues.
///
/// Requests are routed by the last path segment of the URL. A queue is
/// consumed front to back; once empty, the action's `always` reply is used,
/// and unscripted requests fail as [`Reply::Offline`].
#[derive(Default)]
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Url>>,
    hook: Option<CallHook>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next requests to `action` with `replies`, in order.
    pub fn script(self, action: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Answer every request to `action` not covered by a script with `reply`.
    pub fn always(self, action: &str, reply: Reply) -> Self {
        self.fallback
            .lock()
            .unwrap()
            .insert(action.to_string(), reply);
        self
    }

    /// Run `hook` with the 1-based call number before answering each request.
    pub fn on_call(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Every requested URL, in call order.
    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests sent to `action`.
    pub fn calls_to(&self, action: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| action_of(url) == action)
            .count()
    }

    fn next_reply(&self, action: &str) -> Reply {
        if let Some(reply) = self
            .queues
            .lock()
            .unwrap()
            .get_mut(action)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.fallback
            .lock()
            .unwrap()
            .get(action)
            .cloned()
            .unwrap_or(Reply::Offline)
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, TransportFailure> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(url.clone());
            calls.len()
        };
        if let Some(hook) = &self.hook {
            hook(call);
        }

        match self.next_reply(&action_of(url)) {
            Reply::Json(value) => Ok(TransportResponse::ok(serde_json::to_vec(&value).unwrap())),
            Reply::Raw(body) => Ok(TransportResponse::ok(body)),
            Reply::Rejected => Ok(TransportResponse::ok(
                serde_json::to_vec(&json!({ "result": REJECTION_SENTINEL })).unwrap(),
            )),
            Reply::Status(status) => Ok(TransportResponse {
                status,
                body: Vec::new(),
            }),
            Reply::Timeout => Err(TransportFailure::Timeout("operation timed out".to_string())),
            Reply::Offline => Err(TransportFailure::Other("connection refused".to_string())),
        }
    }
}

fn action_of(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_string()
}

/// Value of query parameter `name` in `url`, decoded.
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Live positions payload carrying `records`.
pub fn positions(records: &[Value]) -> Reply {
    Reply::Json(json!({ "result": records }))
}

/// Fetcher over `transport` with no backoff.
pub fn fetcher(transport: &Arc<ScriptedTransport>, max_attempts: u32) -> ApiFetcher {
    ApiFetcher::new(transport.clone(), RetryPolicy::new(max_attempts, Duration::ZERO))
}

/// Collector over `transport` writing into `dir`, polling without waits.
pub fn collector(transport: &Arc<ScriptedTransport>, dir: &Path) -> Collector {
    Collector::new(
        fetcher(transport, 3),
        EndpointTable::with_base_url(MOCK_BASE_URL),
        ApiKey::new(API_KEY),
        DataDir::prepare(dir).unwrap(),
    )
    .with_config(CollectorConfig {
        poll_wait: Duration::ZERO,
        ..CollectorConfig::default()
    })
}

/// Parse the JSON document at `path`.
pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Any URL of the mock table.
pub fn mock_url(action: &str) -> Url {
    Url::parse(MOCK_BASE_URL)
        .unwrap()
        .join(action)
        .unwrap()
}
