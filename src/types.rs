//! Core types and errors for the profiler prober.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors that can occur during scanning.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A single probe could not be delivered.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// Raised inside a discovery module; the scan carries on with the next one.
    #[error("Module error: {0}")]
    Module(String),

    /// A precondition the whole scan depends on failed.
    #[error("{0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Correlation token carried by a probe and copied into its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token(String);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl Token {
    /// A process-unique token.
    pub fn fresh() -> Self {
        Self(format!("p{}", NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP method of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// One outbound request: the unit of scan work.
///
/// Probes are built by a module and never mutated once they are enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub token: Token,
    pub url: String,
    pub method: Method,
    pub params: Vec<(String, String)>,
}

impl Probe {
    /// A GET probe with a fresh correlation token.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            token: Token::fresh(),
            url: url.into(),
            method: Method::Get,
            params: Vec::new(),
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Replace the correlation token.
    pub fn with_token(mut self, token: impl Into<Token>) -> Self {
        self.token = token.into();
        self
    }
}

/// What the transport got back for a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    /// `X-Debug-Token` header, set by the profiler on every debug response.
    pub debug_token: Option<String>,
    pub body: String,
}

/// Outcome of one executed probe, produced exactly once by the worker that ran it.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub token: Token,
    pub outcome: std::result::Result<Response, String>,
}

impl ProbeResult {
    pub fn response(&self) -> Option<&Response> {
        self.outcome.as_ref().ok()
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }
}

/// One direct request issued against the target, kept for the final report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub method: Method,
    pub url: String,
    pub status: u16,
    pub debug_token: Option<String>,
}

/// A user found in the request logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub password: String,
    pub role: Option<String>,
    pub cookies: Vec<(String, String)>,
    pub session: Option<String>,
    /// Debug token of the logged request the credential came from.
    pub token: String,
}

impl Credential {
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }
}

// Identity is the name/password pair, several requests may carry the same login.
impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.password == other.password
    }
}

impl Eq for Credential {}

impl std::hash::Hash for Credential {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.password.hash(state);
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.password.is_empty() {
            write!(f, ":{}", self.password)?;
        }
        if let Some(ref role) = self.role {
            write!(f, " [{}]", role)?;
        }
        if !self.cookies.is_empty() {
            let cookies: Vec<String> = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " (cookies: {})", cookies.join("; "))?;
        }
        write!(
            f,
            " (session: {})",
            if self.has_session() { "yes" } else { "no" }
        )
    }
}

/// A saved artifact as listed in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub path: String,
    pub bytes: usize,
    pub sha256: String,
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
    pub insecure: bool,
    /// Requests per second, 0 disables throttling.
    pub rate_limit: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0".to_string(),
            headers: Vec::new(),
            insecure: false,
            rate_limit: 0,
        }
    }
}
