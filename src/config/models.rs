//! Configuration data structures for Plexus.
//!
//! These types map directly to the YAML (also JSON / TOML) configuration
//! file. They are intentionally serde‑friendly and include defaults so that
//! minimal configs remain concise. Defaults cascade downwards: a backend
//! inherits its encoding and URL pattern from its endpoint, and an endpoint
//! inherits its timeout and encoding from the root config.
use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

const DEFAULT_PORT: &str = "8080";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SERVICE_NAME: &str = "api-aggregator";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_METHOD: &str = "GET";

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

/// Wire encoding of a backend response body.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Xml,
    Yaml,
}

impl Encoding {
    /// Media type used for both `Accept` and derived `Content-Type` headers.
    pub fn content_type(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Xml => "application/xml",
            Encoding::Yaml => "application/yaml",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Json => write!(f, "json"),
            Encoding::Xml => write!(f, "xml"),
            Encoding::Yaml => write!(f, "yaml"),
        }
    }
}

/// Output format of the structured logger.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

impl LogFormat {
    /// Lenient parse used for the environment override: anything other than
    /// `console` selects JSON, matching the logger's own fallback.
    pub fn parse_lenient(value: &str) -> Self {
        if value.eq_ignore_ascii_case("console") {
            LogFormat::Console
        } else {
            LogFormat::Json
        }
    }
}

/// Root service configuration. Immutable after load; replaced wholesale on
/// reload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Global timeout applied to endpoints that do not declare their own.
    #[serde(default = "default_timeout", with = "duration_str")]
    pub timeout: Duration,

    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_shutdown_timeout", with = "duration_str")]
    pub shutdown_timeout: Duration,

    // Telemetry wiring flags; consumed by the telemetry seam.
    #[serde(default)]
    pub tracing_enabled: bool,
    #[serde(default)]
    pub tracing_endpoint: String,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            tracing_enabled: false,
            tracing_endpoint: String::new(),
            metrics_enabled: false,
            service_name: default_service_name(),
            endpoints: Vec::new(),
        }
    }
}

/// A single public endpoint: method + path pattern fanning out to one or
/// more backends.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Endpoint {
    /// Path pattern, may include `{name}` captures (e.g. `/users/{id}`).
    pub endpoint: String,

    #[serde(default = "default_method")]
    pub method: String,

    /// Overrides the global timeout for this endpoint.
    #[serde(default, with = "opt_duration_str")]
    pub timeout: Option<Duration>,

    /// Default encoding for this endpoint's backends.
    #[serde(default)]
    pub encoding: Option<Encoding>,

    #[serde(default)]
    pub backends: Vec<Backend>,
}

impl Endpoint {
    /// Effective timeout after the default cascade has run.
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Effective encoding after the default cascade has run.
    pub fn encoding(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }
}

/// One outbound target of an endpoint: host + URL pattern + encoding +
/// transformation directives.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Backend {
    /// URL prefix of the backend service, e.g. `http://users.internal:8080`.
    pub host: String,

    /// Outbound path pattern; `{name}` captures are substituted from the
    /// inbound path parameters. Defaults to the endpoint path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,

    /// Overrides the endpoint encoding for this backend.
    #[serde(default)]
    pub encoding: Option<Encoding>,

    /// Inbound headers dropped before calling this backend (case-insensitive).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_headers: Vec<String>,

    /// Wrap the transformed response under this top-level key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Extract this dot-path from the response before filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Keep only these dot-paths. When non-empty, `deny` is ignored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    /// Remove these dot-paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
    /// Rename old dot-path → new dot-path. Directives apply in sorted key
    /// order, so the last-sorted entry wins when two map to the same path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mapping: BTreeMap<String, String>,
    /// Append the transformed response into an array under this key.
    /// Takes precedence over `group` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concat: Option<String>,
}

impl Backend {
    pub fn encoding(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }

    pub fn url_pattern(&self) -> &str {
        self.url_pattern.as_deref().unwrap_or("")
    }
}

impl Config {
    /// Run the default cascade: endpoint timeout/method/encoding fall back
    /// to the root values, backend encoding/url_pattern fall back to the
    /// endpoint values. Methods are normalized to uppercase.
    pub fn apply_defaults(&mut self) {
        let global_timeout = self.timeout;
        for endpoint in &mut self.endpoints {
            if endpoint.timeout.is_none() {
                endpoint.timeout = Some(global_timeout);
            }
            if endpoint.method.is_empty() {
                endpoint.method = default_method();
            }
            endpoint.method = endpoint.method.to_ascii_uppercase();
            if endpoint.encoding.is_none() {
                endpoint.encoding = Some(Encoding::default());
            }
            let endpoint_encoding = endpoint.encoding;
            let endpoint_path = endpoint.endpoint.clone();
            for backend in &mut endpoint.backends {
                if backend.encoding.is_none() {
                    backend.encoding = endpoint_encoding;
                }
                if backend.url_pattern.is_none() {
                    backend.url_pattern = Some(endpoint_path.clone());
                }
            }
        }
    }
}

/// Durations are written as humantime strings (`10s`, `250ms`, `1m`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod opt_duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
