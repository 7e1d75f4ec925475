//! Endpoint table for the Warsaw open-data API
//!
//! All endpoints differ only in their action path, a resource identifier and
//! a handful of query parameters, so they are configuration rather than
//! code. [`WARSAW_ENDPOINTS`] holds the public values; tests inject a table
//! with a local base URL.
//!
//! Every URL carries the `apikey` query parameter. Values are
//! percent-encoded as RFC 3986 components, so a space becomes `%20`.

use reqwest::Url;
use std::fmt;

use crate::fetcher::{FetchError, FetchResult};

/// Opaque API key. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key as issued by the API portal.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for building request URLs only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Vehicle family served by the live positions endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum VehicleKind {
    /// Buses (`type=1`)
    #[default]
    Bus,
    /// Trams (`type=2`)
    Tram,
}

impl VehicleKind {
    /// Value of the `type` query parameter.
    pub fn type_param(&self) -> &'static str {
        match self {
            Self::Bus => "1",
            Self::Tram => "2",
        }
    }
}

/// Logical endpoints of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Public transport dictionary (symbols and abbreviations)
    Dictionary,
    /// Stop metadata from the generic data store
    StopsMetadata,
    /// Route listing per line
    Routes,
    /// Live vehicle positions
    VehiclePositions,
    /// Stop group lookup by name
    StopLookup,
    /// Lines serving a stop
    LinesLookup,
    /// Timetable of a line at a stop
    ScheduleLookup,
}

impl Endpoint {
    /// Short stable name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dictionary => "dictionary",
            Self::StopsMetadata => "stops_metadata",
            Self::Routes => "routes",
            Self::VehiclePositions => "vehicle_positions",
            Self::StopLookup => "stop_lookup",
            Self::LinesLookup => "lines_lookup",
            Self::ScheduleLookup => "schedule_lookup",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Paths and resource identifiers of the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTable {
    /// Base URL all action paths are joined onto
    pub base_url: String,
    /// Action path of the dictionary endpoint
    pub dictionary_action: String,
    /// Action path of the generic data store
    pub dbstore_action: String,
    /// Action path of the routes endpoint
    pub routes_action: String,
    /// Action path of the live positions endpoint
    pub vehicles_action: String,
    /// Action path of the timetable endpoint
    pub timetable_action: String,
    /// Data store resource holding stop metadata
    pub stops_resource_id: String,
    /// Resource id of the live positions feed
    pub vehicles_resource_id: String,
    /// Timetable resource for stop lookup by name
    pub stop_lookup_id: String,
    /// Timetable resource for lines at a stop
    pub lines_lookup_id: String,
    /// Timetable resource for schedules
    pub schedule_lookup_id: String,
}

/// Base URL of the public API.
pub const DEFAULT_BASE_URL: &str = "https://api.um.warszawa.pl/api/action/";

/// Public API configuration.
pub static WARSAW_ENDPOINTS: once_cell::sync::Lazy<EndpointTable> =
    once_cell::sync::Lazy::new(|| EndpointTable::with_base_url(DEFAULT_BASE_URL));

impl EndpointTable {
    /// Public API paths and identifiers under a different base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            dictionary_action: "public_transport_dictionary/".to_string(),
            dbstore_action: "dbstore_get/".to_string(),
            routes_action: "public_transport_routes/".to_string(),
            vehicles_action: "busestrams_get/".to_string(),
            timetable_action: "dbtimetable_get/".to_string(),
            stops_resource_id: "1c08a38c-ae09-46d2-8926-4f9d25cb0630".to_string(),
            vehicles_resource_id: "f2e5503e-927d-4ad3-9500-4ab9e55deb59".to_string(),
            stop_lookup_id: "b27f4c17-5c50-4a5b-89dd-236b282bc499".to_string(),
            lines_lookup_id: "88cd555f-6f31-43ca-9de4-66c479ad5942".to_string(),
            schedule_lookup_id: "e923fa0e-d96c-43f9-ae6e-60518c9f3238".to_string(),
        }
    }

    /// Action path and fixed query parameters of `endpoint`.
    fn route(&self, endpoint: Endpoint) -> (&str, Vec<(&'static str, &str)>) {
        match endpoint {
            Endpoint::Dictionary => (self.dictionary_action.as_str(), Vec::new()),
            Endpoint::StopsMetadata => (
                self.dbstore_action.as_str(),
                vec![("id", self.stops_resource_id.as_str())],
            ),
            Endpoint::Routes => (self.routes_action.as_str(), Vec::new()),
            Endpoint::VehiclePositions => (
                self.vehicles_action.as_str(),
                vec![("resource_id", self.vehicles_resource_id.as_str())],
            ),
            Endpoint::StopLookup => (
                self.timetable_action.as_str(),
                vec![("id", self.stop_lookup_id.as_str())],
            ),
            // Served without the trailing slash the stop lookup uses
            Endpoint::LinesLookup => (
                self.timetable_action.trim_end_matches('/'),
                vec![("id", self.lines_lookup_id.as_str())],
            ),
            Endpoint::ScheduleLookup => (
                self.timetable_action.trim_end_matches('/'),
                vec![("id", self.schedule_lookup_id.as_str())],
            ),
        }
    }

    /// Build the request URL for `endpoint` with extra query `params`.
    pub fn url(
        &self,
        endpoint: Endpoint,
        api_key: &ApiKey,
        params: &[(&str, &str)],
    ) -> FetchResult<Url> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        let (action, fixed) = self.route(endpoint);
        let mut url = base
            .join(action)
            .map_err(|e| FetchError::InvalidUrl(format!("{action}: {e}")))?;

        let mut pairs: Vec<(&str, &str)> = fixed;
        pairs.extend_from_slice(params);
        pairs.push(("apikey", api_key.expose()));
        let query = pairs
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));

        Ok(url)
    }

    /// Bound to an API key.
    pub fn bind<'a>(&'a self, api_key: &'a ApiKey) -> BoundEndpoints<'a> {
        BoundEndpoints {
            table: self,
            api_key,
        }
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        WARSAW_ENDPOINTS.clone()
    }
}

/// [`EndpointTable`] paired with a key, with one constructor per request.
#[derive(Debug, Clone, Copy)]
pub struct BoundEndpoints<'a> {
    table: &'a EndpointTable,
    api_key: &'a ApiKey,
}

impl BoundEndpoints<'_> {
    /// Dictionary of stop and line symbols.
    pub fn dictionary(&self) -> FetchResult<Url> {
        self.table.url(Endpoint::Dictionary, self.api_key, &[])
    }

    /// Stop metadata (coordinates, names, directions).
    pub fn stops_metadata(&self) -> FetchResult<Url> {
        self.table.url(Endpoint::StopsMetadata, self.api_key, &[])
    }

    /// Routes of every line.
    pub fn routes(&self) -> FetchResult<Url> {
        self.table.url(Endpoint::Routes, self.api_key, &[])
    }

    /// Current positions of all vehicles of `kind`.
    pub fn vehicle_positions(&self, kind: VehicleKind) -> FetchResult<Url> {
        self.table.url(
            Endpoint::VehiclePositions,
            self.api_key,
            &[("type", kind.type_param())],
        )
    }

    /// Stop group id lookup by stop name.
    pub fn stop_lookup(&self, name: &str) -> FetchResult<Url> {
        self.table
            .url(Endpoint::StopLookup, self.api_key, &[("name", name)])
    }

    /// Lines serving stop `stop_id`/`stop_nr`.
    pub fn lines_lookup(&self, stop_id: &str, stop_nr: &str) -> FetchResult<Url> {
        self.table.url(
            Endpoint::LinesLookup,
            self.api_key,
            &[("busstopId", stop_id), ("busstopNr", stop_nr)],
        )
    }

    /// Timetable of `line` at stop `stop_id`/`stop_nr`.
    pub fn schedule_lookup(&self, stop_id: &str, stop_nr: &str, line: &str) -> FetchResult<Url> {
        self.table.url(
            Endpoint::ScheduleLookup,
            self.api_key,
            &[("busstopId", stop_id), ("busstopNr", stop_nr), ("line", line)],
        )
    }
}

/// URL without its query string, safe to log.
pub fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}
